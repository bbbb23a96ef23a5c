use crate::models::{Phase, TrainingPlan};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub mod csv;
pub mod json;
pub mod text;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Csv,
    Json,
    Text,
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] ::csv::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Distance and week count for one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub weeks: u32,
    pub distance_km: Decimal,
    pub elevation_m: Decimal,
}

/// Whole-plan totals used by the text and JSON reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub plan_id: String,
    pub athlete_id: String,
    pub target_race_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_weeks: usize,
    pub total_distance_km: Decimal,
    pub total_elevation_m: Decimal,
    pub peak_week_km: Decimal,
    pub session_count: usize,
    pub completed_sessions: usize,
    pub completion_rate: Option<Decimal>,
    pub phases: BTreeMap<Phase, PhaseSummary>,
}

impl PlanSummary {
    /// Summarize `plan`; the completion rate counts non-rest sessions before `today`
    pub fn from_plan(plan: &TrainingPlan, today: NaiveDate) -> Self {
        let mut phases: BTreeMap<Phase, PhaseSummary> = BTreeMap::new();
        for week in &plan.weeks {
            let entry = phases
                .entry(week.phase)
                .or_insert_with(|| PhaseSummary {
                    weeks: 0,
                    distance_km: Decimal::ZERO,
                    elevation_m: Decimal::ZERO,
                });
            entry.weeks += 1;
            entry.distance_km += week.target_volume_km;
            entry.elevation_m += week.target_elevation_m;
        }

        let non_rest: Vec<_> = plan.sessions().filter(|s| !s.is_rest()).collect();

        PlanSummary {
            plan_id: plan.id.clone(),
            athlete_id: plan.athlete_id.clone(),
            target_race_id: plan.target_race_id.clone(),
            start_date: plan.start_date(),
            end_date: plan.end_date(),
            total_weeks: plan.weeks.len(),
            total_distance_km: plan.total_distance_km(),
            total_elevation_m: plan.weeks.iter().map(|w| w.target_elevation_m).sum(),
            peak_week_km: plan
                .weeks
                .iter()
                .map(|w| w.target_volume_km)
                .max()
                .unwrap_or(Decimal::ZERO),
            session_count: non_rest.len(),
            completed_sessions: non_rest.iter().filter(|s| s.completed).count(),
            completion_rate: plan.completion_rate(today),
            phases,
        }
    }
}

/// Write `plan` to `output_path` in the requested format
pub fn export_plan<P: AsRef<Path>>(
    plan: &TrainingPlan,
    format: ExportFormat,
    today: NaiveDate,
    output_path: P,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Json => json::export_json(plan, &output_path)?,
        ExportFormat::Csv => csv::export_sessions(plan, &output_path)?,
        ExportFormat::Text => text::export_plan_report(plan, today, &output_path)?,
    }

    info!(
        plan_id = %plan.id,
        format = ?format,
        path = %output_path.as_ref().display(),
        "Plan exported"
    );
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{
        AthleteProfile, ExperienceLevel, Race, RacePriority, TerrainDifficulty, TrainingPlan,
    };
    use crate::planning::{PlanRequest, TrainingPlanGenerator};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    pub fn create_test_plan() -> TrainingPlan {
        let request = PlanRequest {
            athlete: AthleteProfile {
                id: "athlete-1".to_string(),
                name: "Test Runner".to_string(),
                experience_level: ExperienceLevel::Intermediate,
                current_weekly_volume_km: dec!(40),
                longest_run_km: dec!(20),
                age: None,
                weight_kg: None,
                resting_hr: None,
                max_hr: None,
            },
            race: Race {
                id: "race-1".to_string(),
                name: "Valley 50K".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
                distance_km: dec!(50),
                elevation_gain_m: dec!(2000),
                elevation_loss_m: dec!(2000),
                priority: RacePriority::A,
                terrain: TerrainDifficulty::Trail,
                checkpoints: Vec::new(),
            },
            intermediate_races: Vec::new(),
            now: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            max_increase_override: None,
            plan_start: None,
        };
        TrainingPlanGenerator::new().generate(&request).unwrap()
    }
}
