use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{SessionType, TrainingPlan};

/// Structural position of a session: week number, day offset from Monday and session type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgressKey {
    pub week_number: u32,
    pub day_offset: u32,
    pub session_type: SessionType,
}

/// Recorded facts about one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub key: ProgressKey,
    pub completed: bool,
    pub skipped: bool,
    pub linked_activity_id: Option<String>,
}

/// Carries completion, skip and activity links from an old plan onto a regenerated one
#[derive(Debug, Clone, Default)]
pub struct PlanProgressPreserver;

impl PlanProgressPreserver {
    pub fn new() -> Self {
        PlanProgressPreserver
    }

    /// Progress records for every session that is completed, skipped or linked
    pub fn snapshot(&self, plan: &TrainingPlan) -> Vec<SessionProgress> {
        plan.weeks
            .iter()
            .flat_map(|week| {
                week.sessions.iter().filter_map(move |session| {
                    if !session.has_progress() {
                        return None;
                    }
                    let day_offset = week.day_offset(session.date)?;
                    Some(SessionProgress {
                        key: ProgressKey {
                            week_number: week.week_number,
                            day_offset,
                            session_type: session.session_type,
                        },
                        completed: session.completed,
                        skipped: session.skipped,
                        linked_activity_id: session.linked_activity_id.clone(),
                    })
                })
            })
            .collect()
    }

    /// Apply `snapshots` to sessions of `plan` with the same key. Only the completion flag,
    /// skipped flag and linked activity are written. Returns the number of sessions restored.
    pub fn restore(&self, snapshots: &[SessionProgress], plan: &mut TrainingPlan) -> usize {
        let by_key: HashMap<ProgressKey, &SessionProgress> =
            snapshots.iter().map(|s| (s.key, s)).collect();
        let mut restored = 0;

        for week in plan.weeks.iter_mut() {
            let (week_number, start_date) = (week.week_number, week.start_date);
            for session in week.sessions.iter_mut() {
                let Ok(day_offset) = u32::try_from((session.date - start_date).num_days()) else {
                    continue;
                };
                let key = ProgressKey {
                    week_number,
                    day_offset,
                    session_type: session.session_type,
                };
                if let Some(progress) = by_key.get(&key) {
                    session.completed = progress.completed;
                    session.skipped = progress.skipped;
                    session.linked_activity_id = progress.linked_activity_id.clone();
                    restored += 1;
                }
            }
        }

        debug!(
            snapshots = snapshots.len(),
            restored,
            dropped = snapshots.len().saturating_sub(restored),
            "Restored session progress"
        );
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptation::fixtures::{plan, standard_week};

    fn fresh() -> TrainingPlan {
        plan(vec![standard_week(1), standard_week(2)])
    }

    #[test]
    fn test_snapshot_only_sessions_with_progress() {
        let mut old = fresh();
        old.weeks[0].sessions[1].completed = true;
        old.weeks[0].sessions[2].skipped = true;
        old.weeks[1].sessions[5].linked_activity_id = Some("act-9".to_string());

        let snapshots = PlanProgressPreserver::new().snapshot(&old);
        assert_eq!(snapshots.len(), 3);
        assert_eq!(
            snapshots[2].key,
            ProgressKey {
                week_number: 2,
                day_offset: 5,
                session_type: SessionType::LongRun
            }
        );
        assert!(PlanProgressPreserver::new().snapshot(&fresh()).is_empty());
    }

    #[test]
    fn test_round_trip_onto_identical_plan() {
        let mut old = fresh();
        old.weeks[0].sessions[1].completed = true;
        old.weeks[0].sessions[1].linked_activity_id = Some("act-1".to_string());
        old.weeks[0].sessions[3].skipped = true;

        let preserver = PlanProgressPreserver::new();
        let snapshots = preserver.snapshot(&old);
        let mut new_plan = fresh();
        let restored = preserver.restore(&snapshots, &mut new_plan);

        assert_eq!(restored, 2);
        assert_eq!(new_plan, old);
    }

    #[test]
    fn test_changed_structure_leaves_defaults() {
        let mut old = fresh();
        old.weeks[0].sessions[3].completed = true; // Tempo on Thursday
        old.weeks[0].sessions[5].completed = true; // Long run on Saturday

        let mut new_plan = fresh();
        new_plan.weeks[0].sessions[3].session_type = SessionType::VerticalGain;

        let preserver = PlanProgressPreserver::new();
        let restored = preserver.restore(&preserver.snapshot(&old), &mut new_plan);

        assert_eq!(restored, 1);
        assert!(!new_plan.weeks[0].sessions[3].completed);
        assert!(new_plan.weeks[0].sessions[5].completed);
    }

    #[test]
    fn test_restore_overwrites_only_progress_fields() {
        let mut old = fresh();
        old.weeks[1].sessions[2].completed = true;

        let mut new_plan = fresh();
        new_plan.weeks[1].sessions[2].planned_distance_km = rust_decimal_macros::dec!(11);
        let preserver = PlanProgressPreserver::new();
        preserver.restore(&preserver.snapshot(&old), &mut new_plan);

        let session = &new_plan.weeks[1].sessions[2];
        assert!(session.completed);
        assert_eq!(session.planned_distance_km, rust_decimal_macros::dec!(11));
    }
}
