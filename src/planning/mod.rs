//! Plan generation pipeline
//!
//! `TrainingPlanGenerator` runs phase distribution, week skeletons, volume targets and
//! session templates in sequence. Every stage is a pure function of its inputs.

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::ExperienceLevel;

pub mod generator;
pub mod phases;
pub mod sessions;
pub mod skeleton;
pub mod volume;

pub use generator::{PlanRequest, TrainingPlanGenerator};
pub use phases::{PhaseAllocation, PhaseDistributor, RaceWeekOverride};
pub use sessions::SessionTemplateGenerator;
pub use skeleton::{WeekSkeleton, WeekSkeletonBuilder};
pub use volume::{VolumeCalculator, VolumeInputs, WeekVolume};

/// Monday on or before `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Per-experience values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceTable {
    pub beginner: Decimal,
    pub intermediate: Decimal,
    pub advanced: Decimal,
    pub elite: Decimal,
}

impl ExperienceTable {
    pub fn get(&self, level: ExperienceLevel) -> Decimal {
        match level {
            ExperienceLevel::Beginner => self.beginner,
            ExperienceLevel::Intermediate => self.intermediate,
            ExperienceLevel::Advanced => self.advanced,
            ExperienceLevel::Elite => self.elite,
        }
    }
}

/// Plan generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Minimum whole weeks between today and the race
    pub min_lead_weeks: u32,

    /// Every Nth week is a recovery week
    pub recovery_cadence: u32,

    /// Share of the plan spent in build (base takes whatever build, peak and taper leave)
    pub build_fraction: Decimal,

    /// Share of the plan spent in peak
    pub peak_fraction: Decimal,

    /// Progressive overload cap (fractional week-over-week increase)
    pub max_weekly_increase: Decimal,

    /// Fraction removed from a recovery week's volume
    pub recovery_reduction: Decimal,

    /// Minimum volume for week one
    pub first_week_floor_km: Decimal,

    /// Final taper week volume as a fraction of peak
    pub taper_final_fraction: Decimal,

    /// Peak weekly volume as a multiple of current volume
    pub peak_multipliers: ExperienceTable,

    /// Fraction of peak volume aimed for during base
    pub base_peak_fraction: Decimal,

    /// Fraction of peak volume aimed for during build
    pub build_peak_fraction: Decimal,

    /// Fraction of peak volume aimed for during peak
    pub peak_peak_fraction: Decimal,

    /// Shakeout volume around an A/B tune-up race, as a fraction of baseline
    pub race_week_shakeout_fraction: Decimal,

    /// Shakeout volume around a C race
    pub c_race_shakeout_fraction: Decimal,

    /// Volume of the week after a tune-up race, as a fraction of baseline
    pub post_race_recovery_fraction: Decimal,

    /// Sessions at or above this duration get a nutrition note
    pub long_session_duration_seconds: u32,

    /// Sessions at or above this climbing get a nutrition note
    pub long_session_elevation_m: Decimal,

    /// Easy pace in minutes per kilometre
    pub easy_pace_min_per_km: ExperienceTable,

    /// Fixed duration of cross-training sessions
    pub cross_training_duration_seconds: u32,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        PlanningConfig {
            min_lead_weeks: 4,
            recovery_cadence: 3,
            build_fraction: dec!(0.35),
            peak_fraction: dec!(0.15),
            max_weekly_increase: dec!(0.10),
            recovery_reduction: dec!(0.35),
            first_week_floor_km: dec!(10),
            taper_final_fraction: dec!(0.40),
            peak_multipliers: ExperienceTable {
                beginner: dec!(1.4),
                intermediate: dec!(1.6),
                advanced: dec!(1.8),
                elite: dec!(2.0),
            },
            base_peak_fraction: dec!(0.75),
            build_peak_fraction: dec!(0.90),
            peak_peak_fraction: dec!(1.00),
            race_week_shakeout_fraction: dec!(0.25),
            c_race_shakeout_fraction: dec!(0.35),
            post_race_recovery_fraction: dec!(0.60),
            long_session_duration_seconds: 5400,
            long_session_elevation_m: dec!(800),
            easy_pace_min_per_km: ExperienceTable {
                beginner: dec!(7.0),
                intermediate: dec!(6.2),
                advanced: dec!(5.6),
                elite: dec!(5.0),
            },
            cross_training_duration_seconds: 3600,
        }
    }
}
