use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PlanningConfig;
use crate::error::{PlanError, Result};
use crate::models::{Phase, Race, RacePriority};

/// Intermediate-race behaviour replacing a week's normal phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RaceWeekOverride {
    /// Week containing a tune-up race: mostly rest around the race day
    RaceWeek {
        race_id: String,
        race_date: NaiveDate,
        priority: RacePriority,
        distance_km: Decimal,
        elevation_gain_m: Decimal,
    },
    /// Week straight after a tune-up race: easy efforts only
    PostRaceRecovery { race_id: String },
}

impl RaceWeekOverride {
    pub fn phase(&self) -> Phase {
        match self {
            RaceWeekOverride::RaceWeek { .. } => Phase::Race,
            RaceWeekOverride::PostRaceRecovery { .. } => Phase::Recovery,
        }
    }
}

/// Consecutive weeks sharing a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAllocation {
    pub phase: Phase,
    pub weeks: u32,
    pub race_override: Option<RaceWeekOverride>,
}

/// Splits the weeks before a race into base, build, peak and taper
pub struct PhaseDistributor {
    config: PlanningConfig,
}

impl PhaseDistributor {
    pub fn new() -> Self {
        Self::with_config(PlanningConfig::default())
    }

    pub fn with_config(config: PlanningConfig) -> Self {
        PhaseDistributor { config }
    }

    /// Taper length by race distance, at most a quarter of the plan
    pub fn taper_weeks(&self, total_weeks: u32, race_distance_km: Decimal) -> u32 {
        let by_distance = if race_distance_km < dec!(30) {
            1
        } else if race_distance_km < dec!(80) {
            2
        } else {
            3
        };
        by_distance.min((total_weeks / 4).max(1))
    }

    /// Allocate `total_weeks` (starting on `plan_start`) to phases. Intermediate races
    /// inside the window replace their week with a race override and the following
    /// week with post-race recovery; taper weeks are never replaced.
    pub fn distribute(
        &self,
        total_weeks: u32,
        race_distance_km: Decimal,
        plan_start: NaiveDate,
        intermediate_races: &[Race],
    ) -> Result<Vec<PhaseAllocation>> {
        if total_weeks < self.config.min_lead_weeks {
            return Err(PlanError::InsufficientLeadTime {
                weeks_available: i64::from(total_weeks),
                minimum_weeks: self.config.min_lead_weeks,
            });
        }

        let taper = self.taper_weeks(total_weeks, race_distance_km);
        let remaining = total_weeks - taper;
        let mut peak = Self::share(total_weeks, self.config.peak_fraction);
        let mut build = Self::share(total_weeks, self.config.build_fraction);
        while build + peak >= remaining {
            if build > 1 {
                build -= 1;
            } else if peak > 1 {
                peak -= 1;
            } else {
                break;
            }
        }
        let base = remaining - build - peak;

        debug!(total_weeks, base, build, peak, taper, "Phase split");

        let mut timeline: Vec<(Phase, Option<RaceWeekOverride>)> = Vec::new();
        for (phase, count) in [
            (Phase::Base, base),
            (Phase::Build, build),
            (Phase::Peak, peak),
            (Phase::Taper, taper),
        ] {
            timeline.extend((0..count).map(|_| (phase, None)));
        }

        let mut races: Vec<&Race> = intermediate_races.iter().collect();
        races.sort_by_key(|r| r.date);

        for race in races {
            if race.date < plan_start {
                continue;
            }
            let index = ((race.date - plan_start).num_days() / 7) as usize;
            let Some((phase, existing)) = timeline.get(index) else {
                continue;
            };
            if *phase == Phase::Taper || matches!(existing, Some(RaceWeekOverride::RaceWeek { .. }))
            {
                debug!(race_id = %race.id, week = index + 1, "Intermediate race not overridden");
                continue;
            }

            timeline[index] = (
                Phase::Race,
                Some(RaceWeekOverride::RaceWeek {
                    race_id: race.id.clone(),
                    race_date: race.date,
                    priority: race.priority,
                    distance_km: race.distance_km,
                    elevation_gain_m: race.elevation_gain_m,
                }),
            );

            if let Some((next_phase, next_override)) = timeline.get(index + 1) {
                if *next_phase != Phase::Taper && next_override.is_none() {
                    timeline[index + 1] = (
                        Phase::Recovery,
                        Some(RaceWeekOverride::PostRaceRecovery {
                            race_id: race.id.clone(),
                        }),
                    );
                }
            }
        }

        Ok(Self::compress(timeline))
    }

    fn share(total_weeks: u32, fraction: Decimal) -> u32 {
        (Decimal::from(total_weeks) * fraction)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
            .unwrap_or(1)
            .max(1)
    }

    fn compress(timeline: Vec<(Phase, Option<RaceWeekOverride>)>) -> Vec<PhaseAllocation> {
        let mut allocations: Vec<PhaseAllocation> = Vec::new();

        for (phase, race_override) in timeline {
            match allocations.last_mut() {
                Some(last)
                    if last.phase == phase
                        && last.race_override.is_none()
                        && race_override.is_none() =>
                {
                    last.weeks += 1;
                }
                _ => allocations.push(PhaseAllocation {
                    phase,
                    weeks: 1,
                    race_override,
                }),
            }
        }

        allocations
    }
}

impl Default for PhaseDistributor {
    fn default() -> Self {
        Self::new()
    }
}
