use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AdaptationConfig, SessionAdjustment, Severity};
use crate::models::{Phase, SessionType, TrainingPlan, TrainingSession, TrainingWeek};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentType {
    /// Move a missed key session onto a later rest day
    Reschedule,
    /// Trim the rest of the week after poor adherence
    ReduceVolume,
    /// Turn the rest of the week into a recovery week
    ConvertToRecovery,
    /// Mark a batch of missed sessions as skipped
    BulkSkip,
}

impl AdjustmentType {
    pub fn name(&self) -> &'static str {
        match self {
            AdjustmentType::Reschedule => "reschedule",
            AdjustmentType::ReduceVolume => "reduce-volume",
            AdjustmentType::ConvertToRecovery => "convert-to-recovery",
            AdjustmentType::BulkSkip => "bulk-skip",
        }
    }
}

impl std::fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentRecommendation {
    pub adjustment_type: AdjustmentType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub affected_session_ids: Vec<String>,
    pub adjustments: Vec<SessionAdjustment>,
}

/// Ranks plan adjustments from missed sessions and adherence in the current and previous week
pub struct PlanAdjustmentCalculator {
    config: AdaptationConfig,
}

impl PlanAdjustmentCalculator {
    pub fn new() -> Self {
        Self::with_config(AdaptationConfig::default())
    }

    pub fn with_config(config: AdaptationConfig) -> Self {
        PlanAdjustmentCalculator { config }
    }

    /// Recommendations sorted from most to least severe. Empty when `now` falls outside
    /// the plan or nothing needs attention.
    pub fn calculate(&self, plan: &TrainingPlan, now: DateTime<Utc>) -> Vec<AdjustmentRecommendation> {
        let today = now.date_naive();
        let Some(current_index) = plan.week_index_for(today) else {
            debug!(plan_id = %plan.id, %today, "Date outside plan, no adjustments");
            return Vec::new();
        };
        let current = &plan.weeks[current_index];
        let previous = current_index.checked_sub(1).map(|i| &plan.weeks[i]);

        let missed: Vec<&TrainingSession> = previous
            .into_iter()
            .chain(std::iter::once(current))
            .flat_map(|w| w.sessions.iter())
            .filter(|s| s.is_missed(today))
            .collect();

        let mut recommendations = Vec::new();

        match self.convert_to_recovery(plan, current, now) {
            Some(conversion) => recommendations.push(conversion),
            None => {
                recommendations.extend(self.reschedules(current, now));
                if let Some(previous) = previous {
                    recommendations.extend(self.reduce_volume(previous, current, now));
                }
            }
        }

        if missed.len() >= self.config.bulk_skip_threshold {
            recommendations.push(AdjustmentRecommendation {
                adjustment_type: AdjustmentType::BulkSkip,
                severity: Severity::Suggestion,
                title: format!("Mark {} missed sessions as skipped", missed.len()),
                description: "Clear missed sessions so completion tracking reflects the plan ahead"
                    .to_string(),
                affected_session_ids: missed.iter().map(|s| s.id.clone()).collect(),
                adjustments: Vec::new(),
            });
        }

        recommendations.sort_by(|a, b| b.severity.cmp(&a.severity));

        if !recommendations.is_empty() {
            info!(
                plan_id = %plan.id,
                week = current.week_number,
                count = recommendations.len(),
                "Plan adjustments recommended"
            );
        }
        recommendations
    }

    fn reschedules(&self, week: &TrainingWeek, now: DateTime<Utc>) -> Vec<AdjustmentRecommendation> {
        let today = now.date_naive();
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut recommendations = Vec::new();

        for missed in week
            .sessions
            .iter()
            .filter(|s| s.is_missed(today) && s.session_type.is_key())
        {
            let Some(slot) = week.sessions.iter().find(|s| {
                s.is_rest() && s.is_upcoming(today) && !claimed.contains(s.id.as_str())
            }) else {
                continue;
            };
            claimed.insert(slot.id.as_str());

            recommendations.push(AdjustmentRecommendation {
                adjustment_type: AdjustmentType::Reschedule,
                severity: Severity::Recommended,
                title: format!("Reschedule missed {}", missed.session_type),
                description: format!(
                    "Move the {} from {} to the rest day on {}",
                    missed.session_type, missed.date, slot.date
                ),
                affected_session_ids: vec![missed.id.clone(), slot.id.clone()],
                adjustments: vec![SessionAdjustment {
                    session_id: slot.id.clone(),
                    new_distance_km: Some(missed.planned_distance_km),
                    new_elevation_m: Some(missed.planned_elevation_m),
                    new_session_type: Some(missed.session_type),
                }],
            });
        }

        recommendations
    }

    fn reduce_volume(
        &self,
        previous: &TrainingWeek,
        current: &TrainingWeek,
        now: DateTime<Utc>,
    ) -> Option<AdjustmentRecommendation> {
        let rate = previous.completion_rate()?;
        if rate >= self.config.low_adherence_threshold {
            return None;
        }

        let today = now.date_naive();
        let upcoming: Vec<&TrainingSession> = current
            .non_rest_sessions()
            .filter(|s| s.is_upcoming(today))
            .collect();
        if upcoming.is_empty() {
            return None;
        }

        let keep = Decimal::ONE - self.config.volume_reduction;
        Some(AdjustmentRecommendation {
            adjustment_type: AdjustmentType::ReduceVolume,
            severity: Severity::Recommended,
            title: "Reduce this week's volume".to_string(),
            description: format!(
                "Only {}% of last week's sessions were completed; trim the remaining sessions by {}%",
                (rate * Decimal::ONE_HUNDRED).round(),
                (self.config.volume_reduction * Decimal::ONE_HUNDRED).round()
            ),
            affected_session_ids: upcoming.iter().map(|s| s.id.clone()).collect(),
            adjustments: upcoming
                .iter()
                .map(|s| SessionAdjustment {
                    session_id: s.id.clone(),
                    new_distance_km: Some(scale(s.planned_distance_km, keep, 1)),
                    new_elevation_m: Some(scale(s.planned_elevation_m, keep, 0)),
                    new_session_type: None,
                })
                .collect(),
        })
    }

    /// Urgent when nothing has been completed for `inactivity_days`, counted from the last
    /// completed session or from the first day of the plan
    fn convert_to_recovery(
        &self,
        plan: &TrainingPlan,
        current: &TrainingWeek,
        now: DateTime<Utc>,
    ) -> Option<AdjustmentRecommendation> {
        if current.is_recovery_week || current.phase == Phase::Recovery {
            return None;
        }

        let today = now.date_naive();
        let last_activity = plan
            .sessions()
            .filter(|s| s.completed && s.date <= today)
            .map(|s| s.date)
            .max()
            .or_else(|| plan.start_date())?;
        let idle_days = (today - last_activity).num_days();
        if idle_days < self.config.inactivity_days {
            return None;
        }

        let keep = Decimal::ONE - self.config.recovery_week_reduction;
        let upcoming: Vec<&TrainingSession> = current
            .non_rest_sessions()
            .filter(|s| s.is_upcoming(today))
            .collect();

        Some(AdjustmentRecommendation {
            adjustment_type: AdjustmentType::ConvertToRecovery,
            severity: Severity::Urgent,
            title: "Convert this week to a recovery week".to_string(),
            description: format!(
                "No completed sessions for {} days; ease back in with easy running only",
                idle_days
            ),
            affected_session_ids: upcoming.iter().map(|s| s.id.clone()).collect(),
            adjustments: upcoming
                .iter()
                .map(|s| SessionAdjustment {
                    session_id: s.id.clone(),
                    new_distance_km: Some(scale(s.planned_distance_km, keep, 1)),
                    new_elevation_m: Some(scale(s.planned_elevation_m, keep, 0)),
                    new_session_type: if s.session_type.is_easy() || !s.session_type.carries_distance() {
                        None
                    } else {
                        Some(SessionType::Easy)
                    },
                })
                .collect(),
        })
    }
}

impl Default for PlanAdjustmentCalculator {
    fn default() -> Self {
        Self::new()
    }
}

fn scale(value: Decimal, factor: Decimal, dp: u32) -> Decimal {
    (value * factor).round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptation::fixtures::{complete_before, monday, noon, plan, standard_week};
    use chrono::Duration;

    fn of_type(recs: &[AdjustmentRecommendation], t: AdjustmentType) -> Vec<&AdjustmentRecommendation> {
        recs.iter().filter(|r| r.adjustment_type == t).collect()
    }

    #[test]
    fn test_reschedule_missed_key_session() {
        let mut plan = plan(vec![standard_week(1), standard_week(2)]);
        complete_before(&mut plan, monday(2));
        // Wednesday of week 2: Tuesday intervals missed, Friday rest is free
        let now = noon(monday(2) + Duration::days(2));

        let recs = PlanAdjustmentCalculator::new().calculate(&plan, now);
        let reschedules = of_type(&recs, AdjustmentType::Reschedule);
        assert_eq!(reschedules.len(), 1);
        assert_eq!(
            reschedules[0].affected_session_ids,
            vec!["w2-d1".to_string(), "w2-d4".to_string()]
        );
        assert_eq!(reschedules[0].adjustments[0].new_session_type, Some(SessionType::Intervals));
    }

    #[test]
    fn test_no_reschedule_when_rest_slot_has_passed() {
        let mut plan = plan(vec![standard_week(1), standard_week(2)]);
        complete_before(&mut plan, monday(2) + Duration::days(5));
        plan.weeks[1].sessions[5].completed = false;
        // Sunday of week 2: Saturday long run missed, Friday rest already gone
        let now = noon(monday(2) + Duration::days(6));

        let recs = PlanAdjustmentCalculator::new().calculate(&plan, now);
        assert!(of_type(&recs, AdjustmentType::Reschedule).is_empty());
    }

    #[test]
    fn test_low_adherence_reduces_current_week() {
        let mut weeks = vec![standard_week(1), standard_week(2)];
        // Previous week: 1 of 4 non-rest sessions completed (25%)
        weeks[0].sessions.retain(|s| s.session_type != crate::models::SessionType::Recovery);
        weeks[0].sessions.push(crate::adaptation::fixtures::session(
            1,
            6,
            SessionType::Rest,
            Decimal::ZERO,
        ));
        weeks[0].sessions[1].completed = true;
        weeks[0].sessions[2].skipped = true;
        weeks[0].sessions[3].skipped = true;
        weeks[0].sessions[5].skipped = true;
        let plan = plan(weeks);

        // Thursday of week 2 with Tuesday and Wednesday done
        let mut plan = plan;
        plan.weeks[1].sessions[1].completed = true;
        plan.weeks[1].sessions[2].completed = true;
        let now = noon(monday(2) + Duration::days(3));

        let recs = PlanAdjustmentCalculator::new().calculate(&plan, now);
        let reduce = of_type(&recs, AdjustmentType::ReduceVolume);
        assert_eq!(reduce.len(), 1);
        assert_eq!(
            reduce[0].affected_session_ids,
            vec!["w2-d3".to_string(), "w2-d5".to_string(), "w2-d6".to_string()]
        );
        let long_run = reduce[0]
            .adjustments
            .iter()
            .find(|a| a.session_id == "w2-d5")
            .unwrap();
        assert_eq!(long_run.new_distance_km, Some(rust_decimal_macros::dec!(16)));
    }

    #[test]
    fn test_inactivity_converts_to_recovery_and_suppresses_others() {
        let mut weeks = vec![standard_week(1), standard_week(2), standard_week(3)];
        // Last completion on Tuesday of week 1; nothing since
        weeks[0].sessions[1].completed = true;
        let plan = plan(weeks);
        // Thursday of week 3: 16 days idle, Tuesday/Wednesday missed, Friday rest free,
        // previous week at 0% completion
        let now = noon(monday(3) + Duration::days(3));

        let recs = PlanAdjustmentCalculator::new().calculate(&plan, now);
        assert_eq!(recs[0].adjustment_type, AdjustmentType::ConvertToRecovery);
        assert_eq!(recs[0].severity, Severity::Urgent);
        assert!(of_type(&recs, AdjustmentType::Reschedule).is_empty());
        assert!(of_type(&recs, AdjustmentType::ReduceVolume).is_empty());
    }

    #[test]
    fn test_recovery_week_is_not_converted() {
        let mut weeks = vec![standard_week(1), standard_week(2)];
        weeks[1].is_recovery_week = true;
        let plan = plan(weeks);
        let now = noon(monday(2) + Duration::days(4));

        let recs = PlanAdjustmentCalculator::new().calculate(&plan, now);
        assert!(of_type(&recs, AdjustmentType::ConvertToRecovery).is_empty());
    }

    #[test]
    fn test_post_race_week_is_not_converted() {
        let mut weeks = vec![standard_week(1), standard_week(2), standard_week(3)];
        weeks[0].sessions[1].completed = true;
        // Loaded from an older file: recovery phase without the flag
        weeks[2].phase = Phase::Recovery;
        let plan = plan(weeks);
        let now = noon(monday(3) + Duration::days(3));

        let recs = PlanAdjustmentCalculator::new().calculate(&plan, now);
        assert!(of_type(&recs, AdjustmentType::ConvertToRecovery).is_empty());
    }

    #[test]
    fn test_bulk_skip_lists_missed_sessions() {
        let plan = plan(vec![standard_week(1)]);
        // Friday: Tuesday, Wednesday and Thursday missed
        let now = noon(monday(1) + Duration::days(4));

        let recs = PlanAdjustmentCalculator::new().calculate(&plan, now);
        let bulk = of_type(&recs, AdjustmentType::BulkSkip);
        assert_eq!(bulk.len(), 1);
        assert_eq!(bulk[0].severity, Severity::Suggestion);
        assert_eq!(
            bulk[0].affected_session_ids,
            vec!["w1-d1".to_string(), "w1-d2".to_string(), "w1-d3".to_string()]
        );
        assert_eq!(recs.last().unwrap().adjustment_type, AdjustmentType::BulkSkip);
    }

    #[test]
    fn test_nothing_outside_plan() {
        let plan = plan(vec![standard_week(1)]);
        let now = noon(monday(5));
        assert!(PlanAdjustmentCalculator::new().calculate(&plan, now).is_empty());
    }
}
