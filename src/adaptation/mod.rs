//! Keeping a live plan consistent with what the athlete actually did
//!
//! - `progress`: carry completion state across plan regeneration
//! - `redistribution`: move missed volume onto the remaining days of a week
//! - `adjustments`: ranked recommendations from missed sessions and adherence
//! - `auto_adjust`: regenerate when the race calendar changes

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::SessionType;

pub mod adjustments;
pub mod auto_adjust;
pub mod progress;
pub mod redistribution;

pub use adjustments::{AdjustmentRecommendation, AdjustmentType, PlanAdjustmentCalculator};
pub use auto_adjust::{
    detect_calendar_changes, InMemoryRaceRepository, LocalPlanGenerator, PlanAdjustmentOutcome,
    PlanAutoAdjustmentService, PlanGenerationPort, RaceCalendarChange, RaceRepository,
};
pub use progress::{PlanProgressPreserver, ProgressKey, SessionProgress};
pub use redistribution::{
    MissedSessionRedistributor, MissedVolume, RedistributionRecommendation, RedistributionResult,
    RedistributionType,
};

/// How strongly a recommendation should be acted on. Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Suggestion,
    Recommended,
    Urgent,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Suggestion => "suggestion",
            Severity::Recommended => "recommended",
            Severity::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Proposed new values for one session; `None` leaves the field as planned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAdjustment {
    pub session_id: String,
    pub new_distance_km: Option<Decimal>,
    pub new_elevation_m: Option<Decimal>,
    pub new_session_type: Option<SessionType>,
}

/// Thresholds for redistribution and adjustment recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    /// Largest share of a session's own planned distance (and elevation) it may absorb
    pub redistribution_cap: Decimal,

    /// Future sessions a single missed session may be spread across
    pub max_redistribution_targets: usize,

    /// Previous-week completion rate below which volume is reduced
    pub low_adherence_threshold: Decimal,

    /// Days without a completed session before a recovery week is suggested
    pub inactivity_days: i64,

    /// Missed sessions needed to suggest bulk skipping
    pub bulk_skip_threshold: usize,

    /// Fractional cut applied by a reduce-volume recommendation
    pub volume_reduction: Decimal,

    /// Fractional cut applied when converting a week to recovery
    pub recovery_week_reduction: Decimal,

    /// Default window for accumulated missed volume
    pub missed_volume_lookback_weeks: u32,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        AdaptationConfig {
            redistribution_cap: dec!(0.20),
            max_redistribution_targets: 3,
            low_adherence_threshold: dec!(0.50),
            inactivity_days: 7,
            bulk_skip_threshold: 3,
            volume_reduction: dec!(0.20),
            recovery_week_reduction: dec!(0.35),
            missed_volume_lookback_weeks: 2,
        }
    }
}
