use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::phases::PhaseDistributor;
use super::sessions::SessionTemplateGenerator;
use super::skeleton::WeekSkeletonBuilder;
use super::volume::{VolumeCalculator, VolumeInputs};
use super::{week_start, PlanningConfig};
use crate::error::{PlanError, Result};
use crate::models::{AthleteProfile, IntermediateRaceSnapshot, Race, TrainingPlan};

/// Everything needed to generate a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub athlete: AthleteProfile,
    pub race: Race,
    /// Every other race on the athlete's calendar; only those inside the plan window are used
    #[serde(default)]
    pub intermediate_races: Vec<Race>,
    pub now: DateTime<Utc>,
    /// Replaces the configured progressive-overload cap for this plan
    #[serde(default)]
    pub max_increase_override: Option<Decimal>,
    /// Anchor week one on this date's week instead of the current one. Regeneration passes
    /// the old plan's start so week numbers stay aligned for progress restore.
    #[serde(default)]
    pub plan_start: Option<NaiveDate>,
}

/// Runs phase distribution, skeleton, volume and session generation in sequence
pub struct TrainingPlanGenerator {
    config: PlanningConfig,
    distributor: PhaseDistributor,
    skeleton_builder: WeekSkeletonBuilder,
    volume_calculator: VolumeCalculator,
    session_generator: SessionTemplateGenerator,
}

impl TrainingPlanGenerator {
    pub fn new() -> Self {
        Self::with_config(PlanningConfig::default())
    }

    pub fn with_config(config: PlanningConfig) -> Self {
        TrainingPlanGenerator {
            distributor: PhaseDistributor::with_config(config.clone()),
            skeleton_builder: WeekSkeletonBuilder::with_config(&config),
            volume_calculator: VolumeCalculator::with_config(config.clone()),
            session_generator: SessionTemplateGenerator::with_config(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &PlanningConfig {
        &self.config
    }

    pub fn generate(&self, request: &PlanRequest) -> Result<TrainingPlan> {
        let race = &request.race;
        let athlete = &request.athlete;
        let today = request.now.date_naive();

        if race.distance_km < Decimal::ZERO || race.elevation_gain_m < Decimal::ZERO {
            return Err(PlanError::InvalidInput(format!(
                "race '{}' has negative distance or elevation",
                race.id
            )));
        }
        if athlete.current_weekly_volume_km < Decimal::ZERO {
            return Err(PlanError::InvalidInput(format!(
                "athlete '{}' has negative weekly volume",
                athlete.id
            )));
        }

        let lead_weeks = (race.date - today).num_days().div_euclid(7);
        if lead_weeks < i64::from(self.config.min_lead_weeks) {
            return Err(PlanError::InsufficientLeadTime {
                weeks_available: lead_weeks,
                minimum_weeks: self.config.min_lead_weeks,
            });
        }

        let plan_start = week_start(request.plan_start.unwrap_or(today).min(race.date));
        let total_weeks = ((week_start(race.date) - plan_start).num_days() / 7 + 1) as u32;

        let mut intermediate: Vec<&Race> = request
            .intermediate_races
            .iter()
            .filter(|r| r.id != race.id && r.date >= plan_start && r.date < race.date)
            .collect();
        intermediate.sort_by_key(|r| r.date);
        let intermediate_owned: Vec<Race> = intermediate.iter().map(|r| (*r).clone()).collect();

        debug!(
            race_id = %race.id,
            total_weeks,
            intermediate = intermediate_owned.len(),
            "Planning window"
        );

        let allocations = self.distributor.distribute(
            total_weeks,
            race.distance_km,
            plan_start,
            &intermediate_owned,
        )?;
        let skeletons = self.skeleton_builder.build(race.date, &allocations);
        let volumes = self.volume_calculator.calculate(
            &skeletons,
            &VolumeInputs {
                current_weekly_volume_km: athlete.current_weekly_volume_km,
                race_distance_km: race.distance_km,
                race_elevation_gain_m: race.elevation_gain_m,
                experience: athlete.experience_level,
                max_increase_override: request.max_increase_override,
            },
        );

        let plan_id = format!("plan_{}_{}", race.id, request.now.timestamp());
        let weeks = skeletons
            .iter()
            .zip(&volumes)
            .map(|(skeleton, volume)| {
                let week_id = format!("{}-w{}", plan_id, skeleton.week_number);
                self.session_generator
                    .generate(&week_id, skeleton, volume, athlete.experience_level)
            })
            .collect();

        let plan = TrainingPlan {
            id: plan_id,
            athlete_id: athlete.id.clone(),
            target_race_id: race.id.clone(),
            created_at: request.now,
            weeks,
            intermediate_race_ids: intermediate_owned.iter().map(|r| r.id.clone()).collect(),
            intermediate_race_snapshots: intermediate_owned
                .iter()
                .map(IntermediateRaceSnapshot::from)
                .collect(),
        };

        info!(
            plan_id = %plan.id,
            athlete_id = %plan.athlete_id,
            weeks = plan.weeks.len(),
            total_km = %plan.total_distance_km(),
            "Generated training plan"
        );

        Ok(plan)
    }
}

impl Default for TrainingPlanGenerator {
    fn default() -> Self {
        Self::new()
    }
}
