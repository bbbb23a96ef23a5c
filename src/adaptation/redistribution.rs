use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Days, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AdaptationConfig, SessionAdjustment, Severity};
use crate::models::{TrainingPlan, TrainingSession, TrainingWeek};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedistributionType {
    /// Add the missed distance and climbing to later sessions
    RedistributeVolume,
    /// Retype a later easy session to the missed quality workout
    ConvertEasyToQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionRecommendation {
    pub recommendation_type: RedistributionType,
    pub severity: Severity,
    pub missed_session_id: String,
    pub affected_session_ids: Vec<String>,
    pub adjustments: Vec<SessionAdjustment>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionResult {
    pub recommendations: Vec<RedistributionRecommendation>,
    /// Missed distance that no session could absorb within the cap
    pub unrecoverable_distance_km: Decimal,
    pub unrecoverable_elevation_m: Decimal,
}

/// Missed totals over a lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissedVolume {
    pub distance_km: Decimal,
    pub elevation_m: Decimal,
    pub session_count: usize,
}

/// Amount already added to a session by earlier recommendations in the same pass
#[derive(Debug, Clone, Copy, Default)]
struct Added {
    distance_km: Decimal,
    elevation_m: Decimal,
}

pub struct MissedSessionRedistributor {
    config: AdaptationConfig,
}

impl MissedSessionRedistributor {
    pub fn new() -> Self {
        Self::with_config(AdaptationConfig::default())
    }

    pub fn with_config(config: AdaptationConfig) -> Self {
        MissedSessionRedistributor { config }
    }

    /// Redistribution recommendations for missed sessions in the current and previous week.
    ///
    /// A miss with a free rest day still ahead in its week is left for rescheduling. Quality
    /// misses also retype a later easy session. Volume is spread over up to
    /// `max_redistribution_targets` later sessions of the same week, each capped at
    /// `redistribution_cap` of its own planned distance and elevation; what does not fit is
    /// reported as unrecoverable.
    pub fn analyze(
        &self,
        plan: &TrainingPlan,
        now: DateTime<Utc>,
        current_week_index: usize,
    ) -> RedistributionResult {
        let mut result = RedistributionResult {
            recommendations: Vec::new(),
            unrecoverable_distance_km: Decimal::ZERO,
            unrecoverable_elevation_m: Decimal::ZERO,
        };
        if current_week_index >= plan.weeks.len() {
            return result;
        }

        let first = current_week_index.saturating_sub(1);
        for week in &plan.weeks[first..=current_week_index] {
            self.analyze_week(week, now, &mut result);
        }

        if result.unrecoverable_distance_km > Decimal::ZERO
            || result.unrecoverable_elevation_m > Decimal::ZERO
        {
            warn!(
                plan_id = %plan.id,
                distance_km = %result.unrecoverable_distance_km,
                elevation_m = %result.unrecoverable_elevation_m,
                "Missed volume could not be redistributed"
            );
        }

        result
    }

    fn analyze_week(&self, week: &TrainingWeek, now: DateTime<Utc>, result: &mut RedistributionResult) {
        let today = now.date_naive();
        let upcoming: Vec<&TrainingSession> = week
            .sessions
            .iter()
            .filter(|s| s.is_upcoming(today))
            .collect();
        let has_rest_slot = upcoming.iter().any(|s| s.is_rest());

        let mut added: HashMap<&str, Added> = HashMap::new();
        let mut converted: HashSet<&str> = HashSet::new();

        for missed in week.sessions.iter().filter(|s| s.is_missed(today)) {
            if has_rest_slot {
                debug!(session_id = %missed.id, "Missed session can be rescheduled");
                continue;
            }

            if missed.session_type.is_quality() {
                if let Some(target) = upcoming
                    .iter()
                    .find(|s| s.session_type.is_easy() && !converted.contains(s.id.as_str()))
                {
                    converted.insert(target.id.as_str());
                    result.recommendations.push(RedistributionRecommendation {
                        recommendation_type: RedistributionType::ConvertEasyToQuality,
                        severity: Severity::Recommended,
                        missed_session_id: missed.id.clone(),
                        affected_session_ids: vec![target.id.clone()],
                        adjustments: vec![SessionAdjustment {
                            session_id: target.id.clone(),
                            new_distance_km: None,
                            new_elevation_m: None,
                            new_session_type: Some(missed.session_type),
                        }],
                        description: format!(
                            "Run the missed {} on {} instead of the planned {}",
                            missed.session_type, target.date, target.session_type
                        ),
                    });
                }
            }

            let targets: Vec<&TrainingSession> = upcoming
                .iter()
                .filter(|s| !s.is_rest() && s.planned_distance_km > Decimal::ZERO)
                .take(self.config.max_redistribution_targets)
                .copied()
                .collect();

            let distance_room: Vec<Decimal> = targets
                .iter()
                .map(|t| {
                    let used = added.get(t.id.as_str()).map(|a| a.distance_km).unwrap_or_default();
                    (t.planned_distance_km * self.config.redistribution_cap - used).max(Decimal::ZERO)
                })
                .collect();
            let elevation_room: Vec<Decimal> = targets
                .iter()
                .map(|t| {
                    let used = added.get(t.id.as_str()).map(|a| a.elevation_m).unwrap_or_default();
                    (t.planned_elevation_m * self.config.redistribution_cap - used).max(Decimal::ZERO)
                })
                .collect();

            let distance_parts = fill_up_to(missed.planned_distance_km, &distance_room);
            let elevation_parts = fill_up_to(missed.planned_elevation_m, &elevation_room);

            let placed_distance: Decimal = distance_parts.iter().sum();
            let placed_elevation: Decimal = elevation_parts.iter().sum();
            result.unrecoverable_distance_km += missed.planned_distance_km - placed_distance;
            result.unrecoverable_elevation_m += missed.planned_elevation_m - placed_elevation;

            let mut affected = Vec::new();
            let mut adjustments = Vec::new();
            for (i, target) in targets.iter().enumerate() {
                if distance_parts[i].is_zero() && elevation_parts[i].is_zero() {
                    continue;
                }
                let total = added.entry(target.id.as_str()).or_default();
                total.distance_km += distance_parts[i];
                total.elevation_m += elevation_parts[i];

                affected.push(target.id.clone());
                adjustments.push(SessionAdjustment {
                    session_id: target.id.clone(),
                    new_distance_km: Some(target.planned_distance_km + total.distance_km),
                    new_elevation_m: Some(target.planned_elevation_m + total.elevation_m),
                    new_session_type: None,
                });
            }

            if affected.is_empty() {
                continue;
            }

            result.recommendations.push(RedistributionRecommendation {
                recommendation_type: RedistributionType::RedistributeVolume,
                severity: if missed.session_type.is_key() {
                    Severity::Recommended
                } else {
                    Severity::Suggestion
                },
                missed_session_id: missed.id.clone(),
                affected_session_ids: affected,
                adjustments,
                description: format!(
                    "Spread {} km of the missed {} over the rest of the week",
                    placed_distance.normalize(),
                    missed.session_type
                ),
            });
        }
    }

    /// Distance and elevation of missed sessions in the `lookback_weeks` before today
    pub fn calculate_accumulated_missed_volume(
        &self,
        plan: &TrainingPlan,
        now: DateTime<Utc>,
        lookback_weeks: u32,
    ) -> MissedVolume {
        let today = now.date_naive();
        let window_start = today
            .checked_sub_days(Days::new(u64::from(lookback_weeks) * 7))
            .unwrap_or(today);

        plan.sessions()
            .filter(|s| s.date >= window_start && s.is_missed(today))
            .fold(
                MissedVolume {
                    distance_km: Decimal::ZERO,
                    elevation_m: Decimal::ZERO,
                    session_count: 0,
                },
                |mut total, s| {
                    total.distance_km += s.planned_distance_km;
                    total.elevation_m += s.planned_elevation_m;
                    total.session_count += 1;
                    total
                },
            )
    }
}

impl Default for MissedSessionRedistributor {
    fn default() -> Self {
        Self::new()
    }
}

/// Spread `amount` evenly over slots with the given room, topping up the others when a
/// slot fills. Parts are rounded toward zero at two decimals and never exceed their room.
fn fill_up_to(amount: Decimal, room: &[Decimal]) -> Vec<Decimal> {
    let mut parts = vec![Decimal::ZERO; room.len()];
    let mut remaining = amount.max(Decimal::ZERO);

    while remaining > Decimal::ZERO {
        let open: Vec<usize> = (0..room.len()).filter(|&i| room[i] > parts[i]).collect();
        if open.is_empty() {
            break;
        }

        let share = (remaining / Decimal::from(open.len()))
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);
        let mut progressed = false;

        if share.is_zero() {
            let i = open[0];
            let add = remaining.min(room[i] - parts[i]);
            parts[i] += add;
            remaining -= add;
            progressed = !add.is_zero();
        } else {
            for i in open {
                let add = share.min(room[i] - parts[i]);
                parts[i] += add;
                remaining -= add;
                progressed |= !add.is_zero();
            }
        }

        if !progressed {
            break;
        }
    }

    parts
}
