use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::phases::RaceWeekOverride;
use super::skeleton::WeekSkeleton;
use super::PlanningConfig;
use crate::models::{ExperienceLevel, Phase, RacePriority};

/// Athlete and race figures that drive weekly volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeInputs {
    pub current_weekly_volume_km: Decimal,
    pub race_distance_km: Decimal,
    pub race_elevation_gain_m: Decimal,
    pub experience: ExperienceLevel,
    /// Replaces the configured progressive-overload cap
    pub max_increase_override: Option<Decimal>,
}

/// Volume targets for one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekVolume {
    pub week_number: u32,
    pub target_volume_km: Decimal,
    pub target_elevation_m: Decimal,
}

/// Assigns weekly distance and climbing targets under progressive-overload limits
pub struct VolumeCalculator {
    config: PlanningConfig,
}

impl VolumeCalculator {
    pub fn new() -> Self {
        Self::with_config(PlanningConfig::default())
    }

    pub fn with_config(config: PlanningConfig) -> Self {
        VolumeCalculator { config }
    }

    fn floor_km(value: Decimal) -> Decimal {
        value
            .max(Decimal::ZERO)
            .round_dp_with_strategy(1, RoundingStrategy::ToZero)
    }

    fn phase_fraction(&self, phase: Phase) -> Decimal {
        match phase {
            Phase::Base => self.config.base_peak_fraction,
            Phase::Build => self.config.build_peak_fraction,
            _ => self.config.peak_peak_fraction,
        }
    }

    fn shakeout_fraction(&self, priority: RacePriority) -> Decimal {
        match priority {
            RacePriority::A | RacePriority::B => self.config.race_week_shakeout_fraction,
            RacePriority::C => self.config.c_race_shakeout_fraction,
        }
    }

    /// Volume targets for every skeleton week, in order.
    ///
    /// Loading weeks (base/build/peak) ramp toward a phase fraction of the projected
    /// peak, never rising more than the overload cap above the previous loading week.
    /// Recovery, taper and race-override weeks leave that baseline untouched. A race week
    /// is sized by the race itself plus shakeouts and is not held to the overload cap.
    pub fn calculate(&self, skeletons: &[WeekSkeleton], inputs: &VolumeInputs) -> Vec<WeekVolume> {
        let cap = inputs
            .max_increase_override
            .unwrap_or(self.config.max_weekly_increase);
        let start_volume = inputs
            .current_weekly_volume_km
            .max(self.config.first_week_floor_km);
        let peak_volume = start_volume * self.config.peak_multipliers.get(inputs.experience);
        let gain_per_km = if inputs.race_distance_km > Decimal::ZERO {
            inputs.race_elevation_gain_m / inputs.race_distance_km
        } else {
            Decimal::ZERO
        };

        let taper_total = skeletons.iter().filter(|s| s.phase == Phase::Taper).count();
        let mut taper_index = 0usize;
        let mut baseline: Option<Decimal> = None;
        let mut highest = start_volume;
        let mut volumes = Vec::with_capacity(skeletons.len());

        let ramp = |previous: Option<Decimal>, goal: Decimal| -> Decimal {
            match previous {
                None => start_volume,
                Some(prev) if goal > prev => (prev * (Decimal::ONE + cap)).min(goal),
                Some(prev) => prev,
            }
        };

        for skeleton in skeletons {
            let reference = baseline.unwrap_or(start_volume);

            let (volume, elevation) = match &skeleton.race_override {
                Some(RaceWeekOverride::RaceWeek {
                    priority,
                    distance_km,
                    elevation_gain_m,
                    ..
                }) => {
                    let shakeout = reference * self.shakeout_fraction(*priority);
                    (Self::floor_km(*distance_km + shakeout), *elevation_gain_m)
                }
                Some(RaceWeekOverride::PostRaceRecovery { .. }) => {
                    // Below the race week too, even when the race itself was short
                    let race_week = volumes
                        .last()
                        .map(|v: &WeekVolume| v.target_volume_km)
                        .unwrap_or(reference);
                    let volume = Self::floor_km(
                        (reference * self.config.post_race_recovery_fraction)
                            .min(race_week * (Decimal::ONE - self.config.recovery_reduction)),
                    );
                    (volume, volume * gain_per_km)
                }
                None if skeleton.phase == Phase::Taper => {
                    taper_index += 1;
                    let step = Decimal::from(taper_index as u64) / Decimal::from(taper_total as u64);
                    let fraction =
                        Decimal::ONE - (Decimal::ONE - self.config.taper_final_fraction) * step;
                    let volume = Self::floor_km(highest * fraction);
                    (volume, volume * gain_per_km)
                }
                None if skeleton.is_recovery_week => {
                    let would_be = ramp(baseline, peak_volume * self.phase_fraction(skeleton.phase));
                    let volume =
                        Self::floor_km(would_be * (Decimal::ONE - self.config.recovery_reduction));
                    (volume, volume * gain_per_km)
                }
                None => {
                    let volume = Self::floor_km(ramp(
                        baseline,
                        peak_volume * self.phase_fraction(skeleton.phase),
                    ));
                    baseline = Some(volume);
                    highest = highest.max(volume);
                    (volume, volume * gain_per_km)
                }
            };

            let volume = if skeleton.week_number == 1 {
                volume.max(self.config.first_week_floor_km)
            } else {
                volume
            };

            debug!(
                week = skeleton.week_number,
                phase = %skeleton.phase,
                recovery = skeleton.is_recovery_week,
                volume_km = %volume,
                "Week volume"
            );

            volumes.push(WeekVolume {
                week_number: skeleton.week_number,
                target_volume_km: volume,
                target_elevation_m: elevation
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
            });
        }

        volumes
    }
}

impl Default for VolumeCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::phases::PhaseAllocation;
    use crate::planning::skeleton::WeekSkeletonBuilder;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn skeletons(phases: &[(Phase, u32)]) -> Vec<WeekSkeleton> {
        let allocations: Vec<PhaseAllocation> = phases
            .iter()
            .map(|(phase, weeks)| PhaseAllocation {
                phase: *phase,
                weeks: *weeks,
                race_override: None,
            })
            .collect();
        WeekSkeletonBuilder::new().build(NaiveDate::from_ymd_opt(2024, 10, 13).unwrap(), &allocations)
    }

    fn inputs(current: Decimal) -> VolumeInputs {
        VolumeInputs {
            current_weekly_volume_km: current,
            race_distance_km: dec!(42.2),
            race_elevation_gain_m: dec!(422),
            experience: ExperienceLevel::Intermediate,
            max_increase_override: None,
        }
    }

    fn is_loading(week: &WeekSkeleton) -> bool {
        !week.is_recovery_week && matches!(week.phase, Phase::Base | Phase::Build | Phase::Peak)
    }

    #[test]
    fn test_overload_cap_between_loading_weeks() {
        let weeks = skeletons(&[(Phase::Base, 7), (Phase::Build, 6), (Phase::Peak, 3), (Phase::Taper, 2)]);
        let volumes = VolumeCalculator::new().calculate(&weeks, &inputs(dec!(40)));

        for i in 1..weeks.len() {
            if is_loading(&weeks[i]) && is_loading(&weeks[i - 1]) {
                assert!(
                    volumes[i].target_volume_km <= volumes[i - 1].target_volume_km * dec!(1.10),
                    "week {}",
                    i + 1
                );
            }
        }
        assert_eq!(volumes[0].target_volume_km, dec!(40));
        assert!(volumes[1].target_volume_km > volumes[0].target_volume_km);
    }

    #[test]
    fn test_recovery_weeks_are_lower() {
        let weeks = skeletons(&[(Phase::Base, 7), (Phase::Build, 6), (Phase::Peak, 3), (Phase::Taper, 2)]);
        let volumes = VolumeCalculator::new().calculate(&weeks, &inputs(dec!(30)));

        let mut checked = 0;
        for i in 1..weeks.len() {
            if weeks[i].is_recovery_week {
                assert!(volumes[i].target_volume_km < volumes[i - 1].target_volume_km);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_taper_decays_monotonically() {
        let weeks = skeletons(&[(Phase::Base, 5), (Phase::Build, 4), (Phase::Peak, 2), (Phase::Taper, 3)]);
        let volumes = VolumeCalculator::new().calculate(&weeks, &inputs(dec!(50)));

        let taper: Vec<Decimal> = weeks
            .iter()
            .zip(&volumes)
            .filter(|(w, _)| w.phase == Phase::Taper)
            .map(|(_, v)| v.target_volume_km)
            .collect();
        assert_eq!(taper.len(), 3);
        assert!(taper.windows(2).all(|p| p[1] <= p[0]));

        let peak = volumes.iter().map(|v| v.target_volume_km).max().unwrap();
        assert_eq!(*taper.last().unwrap(), (peak * dec!(0.4)).round_dp_with_strategy(1, RoundingStrategy::ToZero));
    }

    fn with_tune_up(distance_km: Decimal) -> Vec<WeekSkeleton> {
        let base = |weeks| PhaseAllocation {
            phase: Phase::Base,
            weeks,
            race_override: None,
        };
        let allocations = vec![
            base(4),
            PhaseAllocation {
                phase: Phase::Race,
                weeks: 1,
                race_override: Some(RaceWeekOverride::RaceWeek {
                    race_id: "tune-up".to_string(),
                    race_date: NaiveDate::from_ymd_opt(2024, 8, 10).unwrap(),
                    priority: RacePriority::B,
                    distance_km,
                    elevation_gain_m: dec!(600),
                }),
            },
            PhaseAllocation {
                phase: Phase::Recovery,
                weeks: 1,
                race_override: Some(RaceWeekOverride::PostRaceRecovery {
                    race_id: "tune-up".to_string(),
                }),
            },
            PhaseAllocation {
                phase: Phase::Build,
                weeks: 4,
                race_override: None,
            },
            PhaseAllocation {
                phase: Phase::Taper,
                weeks: 1,
                race_override: None,
            },
        ];
        WeekSkeletonBuilder::new().build(NaiveDate::from_ymd_opt(2024, 10, 13).unwrap(), &allocations)
    }

    #[test]
    fn test_loading_resumes_from_last_loading_week_after_race() {
        let weeks = with_tune_up(dec!(50));
        let volumes = VolumeCalculator::new().calculate(&weeks, &inputs(dec!(20)));

        // Race week carries the race plus shakeouts: 50 + 25% of the 24 km base week
        assert_eq!(volumes[3].target_volume_km, dec!(24));
        assert_eq!(volumes[4].target_volume_km, dec!(56));

        assert!(weeks[5].is_recovery_week);
        assert!(volumes[5].target_volume_km < volumes[4].target_volume_km);

        // The build week after the post-race week ramps off week 4, not off the race
        assert!(volumes[6].target_volume_km <= volumes[3].target_volume_km * dec!(1.10));
        assert!(volumes[6].target_volume_km > volumes[5].target_volume_km);
    }

    #[test]
    fn test_post_race_week_below_short_race_week() {
        let weeks = with_tune_up(dec!(5));
        let volumes = VolumeCalculator::new().calculate(&weeks, &inputs(dec!(100)));

        // 5 km race + 30 km of shakeouts; 60% of the base week would be 72 km
        assert!(volumes[5].target_volume_km < volumes[4].target_volume_km);
        assert_eq!(
            volumes[5].target_volume_km,
            (volumes[4].target_volume_km * dec!(0.65)).round_dp_with_strategy(1, RoundingStrategy::ToZero)
        );
    }

    #[test]
    fn test_first_week_floor() {
        let weeks = skeletons(&[(Phase::Base, 3), (Phase::Build, 2), (Phase::Peak, 1), (Phase::Taper, 1)]);
        let volumes = VolumeCalculator::new().calculate(&weeks, &inputs(dec!(2)));
        assert_eq!(volumes[0].target_volume_km, dec!(10));
    }

    #[test]
    fn test_elevation_follows_race_ratio() {
        let weeks = skeletons(&[(Phase::Base, 3), (Phase::Build, 2), (Phase::Peak, 1), (Phase::Taper, 1)]);
        let mut race = inputs(dec!(40));
        race.race_elevation_gain_m = dec!(2110); // 50 m per km
        let volumes = VolumeCalculator::new().calculate(&weeks, &race);
        assert_eq!(volumes[0].target_elevation_m, dec!(2000));

        race.race_elevation_gain_m = dec!(0);
        let flat = VolumeCalculator::new().calculate(&weeks, &race);
        assert!(flat.iter().all(|v| v.target_elevation_m.is_zero()));
    }

    #[test]
    fn test_max_increase_override() {
        let weeks = skeletons(&[(Phase::Base, 3), (Phase::Build, 2), (Phase::Peak, 1), (Phase::Taper, 1)]);
        let mut conservative = inputs(dec!(40));
        conservative.max_increase_override = Some(dec!(0.05));
        let volumes = VolumeCalculator::new().calculate(&weeks, &conservative);
        assert_eq!(volumes[1].target_volume_km, dec!(42));
    }

    #[test]
    fn test_beginners_peak_lower_than_elite() {
        let weeks = skeletons(&[(Phase::Base, 8), (Phase::Build, 8), (Phase::Peak, 4), (Phase::Taper, 2)]);
        let mut beginner = inputs(dec!(30));
        beginner.experience = ExperienceLevel::Beginner;
        let mut elite = inputs(dec!(30));
        elite.experience = ExperienceLevel::Elite;

        let calculator = VolumeCalculator::new();
        let beginner_peak = calculator
            .calculate(&weeks, &beginner)
            .iter()
            .map(|v| v.target_volume_km)
            .max()
            .unwrap();
        let elite_peak = calculator
            .calculate(&weeks, &elite)
            .iter()
            .map(|v| v.target_volume_km)
            .max()
            .unwrap();

        assert!(beginner_peak <= dec!(42));
        assert!(elite_peak > beginner_peak);
    }
}
