use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::phases::{PhaseAllocation, RaceWeekOverride};
use super::{week_start, PlanningConfig};
use crate::models::Phase;

/// Dated week without volume or sessions yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSkeleton {
    pub week_number: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub phase: Phase,
    pub is_recovery_week: bool,
    pub race_override: Option<RaceWeekOverride>,
}

/// Lays phase allocations onto the calendar, ending with the race week.
/// Post-race weeks always carry the recovery flag.
pub struct WeekSkeletonBuilder {
    recovery_cadence: u32,
}

impl WeekSkeletonBuilder {
    pub fn new() -> Self {
        Self::with_config(&PlanningConfig::default())
    }

    pub fn with_config(config: &PlanningConfig) -> Self {
        WeekSkeletonBuilder {
            recovery_cadence: config.recovery_cadence,
        }
    }

    /// First Monday of a plan with `total_weeks` weeks whose last week contains `race_date`
    pub fn plan_start(race_date: NaiveDate, total_weeks: u32) -> NaiveDate {
        let race_monday = week_start(race_date);
        race_monday - Duration::weeks(i64::from(total_weeks.saturating_sub(1)))
    }

    pub fn build(&self, race_date: NaiveDate, allocations: &[PhaseAllocation]) -> Vec<WeekSkeleton> {
        let total_weeks: u32 = allocations.iter().map(|a| a.weeks).sum();
        let mut current = Self::plan_start(race_date, total_weeks);
        let mut weeks: Vec<WeekSkeleton> = Vec::with_capacity(total_weeks as usize);
        let mut week_number = 1;

        for allocation in allocations {
            for position in 0..allocation.weeks {
                let is_final_in_phase = position + 1 == allocation.weeks;
                let previous_was_override = weeks
                    .last()
                    .map(|w| w.race_override.is_some())
                    .unwrap_or(false);

                let on_cadence = self.recovery_cadence > 0
                    && week_number % self.recovery_cadence == 0
                    && matches!(allocation.phase, Phase::Base | Phase::Build | Phase::Peak)
                    && allocation.race_override.is_none()
                    && !is_final_in_phase
                    && !previous_was_override;
                let is_recovery_week = on_cadence
                    || matches!(
                        allocation.race_override,
                        Some(RaceWeekOverride::PostRaceRecovery { .. })
                    );

                weeks.push(WeekSkeleton {
                    week_number,
                    start_date: current,
                    end_date: current + Duration::days(6),
                    phase: allocation.phase,
                    is_recovery_week,
                    race_override: allocation.race_override.clone(),
                });

                current += Duration::weeks(1);
                week_number += 1;
            }
        }

        weeks
    }
}

impl Default for WeekSkeletonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
