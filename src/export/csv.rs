use super::ExportError;
use crate::models::TrainingPlan;
use crate::training_load::FitnessSnapshot;
use chrono::NaiveDate;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io;
use std::path::Path;

/// One CSV row per planned day
#[derive(Debug, Serialize)]
struct SessionRow<'a> {
    week: u32,
    phase: &'static str,
    recovery_week: bool,
    date: NaiveDate,
    session_id: &'a str,
    session_type: &'static str,
    intensity: String,
    distance_km: Decimal,
    elevation_m: Decimal,
    duration_minutes: u32,
    hr_zone: Option<u8>,
    completed: bool,
    skipped: bool,
    description: &'a str,
}

/// Export every planned session, rest days included
pub fn export_sessions<P: AsRef<Path>>(plan: &TrainingPlan, output_path: P) -> Result<(), ExportError> {
    let file = std::fs::File::create(output_path)?;
    write_sessions(plan, file)
}

pub fn write_sessions<W: io::Write>(plan: &TrainingPlan, writer: W) -> Result<(), ExportError> {
    let mut csv_writer = Writer::from_writer(writer);

    for week in &plan.weeks {
        for session in &week.sessions {
            csv_writer.serialize(SessionRow {
                week: week.week_number,
                phase: week.phase.name(),
                recovery_week: week.is_recovery_week,
                date: session.date,
                session_id: &session.id,
                session_type: session.session_type.name(),
                intensity: format!("{:?}", session.intensity),
                distance_km: session.planned_distance_km,
                elevation_m: session.planned_elevation_m,
                duration_minutes: session.planned_duration_seconds / 60,
                hr_zone: session.target_heart_rate_zone,
                completed: session.completed,
                skipped: session.skipped,
                description: &session.description,
            })?;
        }
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export a fitness/fatigue series (suitable for spreadsheet plotting)
pub fn export_fitness_series<P: AsRef<Path>>(
    series: &[FitnessSnapshot],
    output_path: P,
) -> Result<(), ExportError> {
    let mut csv_writer = Writer::from_path(output_path)?;

    csv_writer.write_record([
        "date",
        "fitness",
        "fatigue",
        "form",
        "daily_load",
        "weekly_volume_km",
        "acute_to_chronic_ratio",
    ])?;

    for snapshot in series {
        csv_writer.write_record(&[
            snapshot.date.format("%Y-%m-%d").to_string(),
            snapshot.fitness.round_dp(1).to_string(),
            snapshot.fatigue.round_dp(1).to_string(),
            snapshot.form.round_dp(1).to_string(),
            snapshot.daily_load.round_dp(1).to_string(),
            snapshot.weekly_volume_km.to_string(),
            snapshot.acute_to_chronic_ratio.round_dp(2).to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}
