use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::progress::PlanProgressPreserver;
use crate::error::{PlanError, Result};
use crate::models::{AthleteProfile, Race, RacePriority, TrainingPlan};
use crate::planning::{PlanRequest, TrainingPlanGenerator};

/// Produces a fresh plan for a request
#[async_trait]
pub trait PlanGenerationPort: Send + Sync {
    async fn generate_plan(&self, request: PlanRequest) -> Result<TrainingPlan>;
}

/// Read access to an athlete's race calendar
#[async_trait]
pub trait RaceRepository: Send + Sync {
    async fn races_for_athlete(&self, athlete_id: &str) -> Result<Vec<Race>>;
}

/// `PlanGenerationPort` backed by the in-process generator
pub struct LocalPlanGenerator {
    generator: TrainingPlanGenerator,
}

impl LocalPlanGenerator {
    pub fn new(generator: TrainingPlanGenerator) -> Self {
        Self { generator }
    }
}

impl Default for LocalPlanGenerator {
    fn default() -> Self {
        Self::new(TrainingPlanGenerator::new())
    }
}

#[async_trait]
impl PlanGenerationPort for LocalPlanGenerator {
    async fn generate_plan(&self, request: PlanRequest) -> Result<TrainingPlan> {
        self.generator.generate(&request)
    }
}

/// Race calendar held in memory, keyed by athlete
#[derive(Default)]
pub struct InMemoryRaceRepository {
    races: RwLock<HashMap<String, Vec<Race>>>,
}

impl InMemoryRaceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_races(athlete_id: &str, races: Vec<Race>) -> Self {
        let mut map = HashMap::new();
        map.insert(athlete_id.to_string(), races);
        Self {
            races: RwLock::new(map),
        }
    }

    /// Insert a race or replace the one with the same id
    pub async fn upsert(&self, athlete_id: &str, race: Race) {
        let mut races = self.races.write().await;
        let calendar = races.entry(athlete_id.to_string()).or_default();
        match calendar.iter_mut().find(|r| r.id == race.id) {
            Some(existing) => *existing = race,
            None => calendar.push(race),
        }
    }

    pub async fn remove(&self, athlete_id: &str, race_id: &str) -> bool {
        let mut races = self.races.write().await;
        let Some(calendar) = races.get_mut(athlete_id) else {
            return false;
        };
        let before = calendar.len();
        calendar.retain(|r| r.id != race_id);
        calendar.len() != before
    }
}

#[async_trait]
impl RaceRepository for InMemoryRaceRepository {
    async fn races_for_athlete(&self, athlete_id: &str) -> Result<Vec<Race>> {
        Ok(self
            .races
            .read()
            .await
            .get(athlete_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Difference between the races a plan was built around and the live calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceCalendarChange {
    Added {
        race_id: String,
        date: NaiveDate,
        priority: RacePriority,
    },
    Removed {
        race_id: String,
    },
    DateChanged {
        race_id: String,
        from: NaiveDate,
        to: NaiveDate,
    },
    PriorityChanged {
        race_id: String,
        from: RacePriority,
        to: RacePriority,
    },
    /// The target race no longer falls in the plan's final week
    TargetRaceMoved {
        race_id: String,
        date: NaiveDate,
    },
}

impl std::fmt::Display for RaceCalendarChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RaceCalendarChange::Added { race_id, date, priority } => {
                write!(f, "added {} ({:?}) on {}", race_id, priority, date)
            }
            RaceCalendarChange::Removed { race_id } => write!(f, "removed {}", race_id),
            RaceCalendarChange::DateChanged { race_id, from, to } => {
                write!(f, "{} moved from {} to {}", race_id, from, to)
            }
            RaceCalendarChange::PriorityChanged { race_id, from, to } => {
                write!(f, "{} priority {:?} -> {:?}", race_id, from, to)
            }
            RaceCalendarChange::TargetRaceMoved { race_id, date } => {
                write!(f, "target {} now on {}", race_id, date)
            }
        }
    }
}

/// Regenerated plan together with what triggered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanAdjustmentOutcome {
    pub plan: TrainingPlan,
    pub changes: Vec<RaceCalendarChange>,
    pub restored_sessions: usize,
}

/// Compare the plan's race snapshots with `races`. Only races between the plan's first day
/// and the target race are considered, matching what generation would pick up.
pub fn detect_calendar_changes(plan: &TrainingPlan, races: &[Race]) -> Vec<RaceCalendarChange> {
    let mut changes = Vec::new();
    let target = races.iter().find(|r| r.id == plan.target_race_id);

    if let (Some(target), Some(last_week)) = (target, plan.weeks.last()) {
        if !last_week.contains(target.date) {
            changes.push(RaceCalendarChange::TargetRaceMoved {
                race_id: target.id.clone(),
                date: target.date,
            });
        }
    }

    let (Some(window_start), Some(window_end)) = (
        plan.start_date(),
        target.map(|t| t.date).or_else(|| plan.end_date()),
    ) else {
        return changes;
    };

    let live: Vec<&Race> = races
        .iter()
        .filter(|r| r.id != plan.target_race_id && r.date >= window_start && r.date < window_end)
        .collect();

    for snapshot in &plan.intermediate_race_snapshots {
        match live.iter().find(|r| r.id == snapshot.race_id) {
            None => changes.push(RaceCalendarChange::Removed {
                race_id: snapshot.race_id.clone(),
            }),
            Some(race) => {
                if race.date != snapshot.date {
                    changes.push(RaceCalendarChange::DateChanged {
                        race_id: race.id.clone(),
                        from: snapshot.date,
                        to: race.date,
                    });
                }
                if race.priority != snapshot.priority {
                    changes.push(RaceCalendarChange::PriorityChanged {
                        race_id: race.id.clone(),
                        from: snapshot.priority,
                        to: race.priority,
                    });
                }
            }
        }
    }

    for race in live {
        if !plan
            .intermediate_race_snapshots
            .iter()
            .any(|s| s.race_id == race.id)
        {
            changes.push(RaceCalendarChange::Added {
                race_id: race.id.clone(),
                date: race.date,
                priority: race.priority,
            });
        }
    }

    changes
}

/// Regenerates a plan when the athlete's race calendar no longer matches it
pub struct PlanAutoAdjustmentService {
    generator: Arc<dyn PlanGenerationPort>,
    races: Arc<dyn RaceRepository>,
    preserver: PlanProgressPreserver,
}

impl PlanAutoAdjustmentService {
    pub fn new(generator: Arc<dyn PlanGenerationPort>, races: Arc<dyn RaceRepository>) -> Self {
        Self {
            generator,
            races,
            preserver: PlanProgressPreserver::new(),
        }
    }

    /// `Ok(None)` when the calendar still matches. Otherwise generate a replacement anchored
    /// on the old plan's first week, then carry recorded progress across. Collaborator
    /// failures are returned unchanged.
    pub async fn check_and_adjust(
        &self,
        plan: &TrainingPlan,
        athlete: &AthleteProfile,
        now: DateTime<Utc>,
    ) -> Result<Option<PlanAdjustmentOutcome>> {
        let races = self.races.races_for_athlete(&athlete.id).await?;
        let changes = detect_calendar_changes(plan, &races);
        if changes.is_empty() {
            debug!(plan_id = %plan.id, "Race calendar unchanged");
            return Ok(None);
        }

        for change in &changes {
            warn!(plan_id = %plan.id, %change, "Race calendar changed");
        }

        let target = races
            .iter()
            .find(|r| r.id == plan.target_race_id)
            .cloned()
            .ok_or_else(|| {
                PlanError::InvalidInput(format!(
                    "target race '{}' is no longer on the calendar",
                    plan.target_race_id
                ))
            })?;

        let request = PlanRequest {
            athlete: athlete.clone(),
            intermediate_races: races
                .iter()
                .filter(|r| r.id != target.id)
                .cloned()
                .collect(),
            race: target,
            now,
            max_increase_override: None,
            plan_start: plan.start_date(),
        };

        let mut replacement = self.generator.generate_plan(request).await?;
        let snapshots = self.preserver.snapshot(plan);
        let restored_sessions = self.preserver.restore(&snapshots, &mut replacement);

        info!(
            old_plan_id = %plan.id,
            new_plan_id = %replacement.id,
            changes = changes.len(),
            restored_sessions,
            "Plan regenerated after race calendar change"
        );

        Ok(Some(PlanAdjustmentOutcome {
            plan: replacement,
            changes,
            restored_sessions,
        }))
    }
}
