use super::{ExportError, PlanSummary};
use crate::adaptation::{AdjustmentRecommendation, RedistributionResult, Severity};
use crate::models::{Phase, TrainingPlan, TrainingWeek};
use crate::training_load::{AcrZone, FitnessSnapshot, FormInterpretation};
use chrono::NaiveDate;
use colored::*;
use rust_decimal::Decimal;
use std::io::Write;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct WeekRow {
    #[tabled(rename = "Week")]
    week: u32,
    #[tabled(rename = "Starts")]
    start: NaiveDate,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Volume (km)")]
    volume: Decimal,
    #[tabled(rename = "Climb (m)")]
    elevation: Decimal,
    #[tabled(rename = "Long (km)")]
    long_run: Decimal,
    #[tabled(rename = "Done")]
    done: String,
}

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Session")]
    session_type: String,
    #[tabled(rename = "km")]
    distance: Decimal,
    #[tabled(rename = "m+")]
    elevation: Decimal,
    #[tabled(rename = "Min")]
    minutes: u32,
    #[tabled(rename = "Description")]
    description: String,
}

#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Sessions")]
    sessions: usize,
    #[tabled(rename = "Details")]
    details: String,
}

fn week_row(week: &TrainingWeek) -> WeekRow {
    let non_rest = week.non_rest_sessions().count();
    let completed = week.non_rest_sessions().filter(|s| s.completed).count();
    let phase = if week.is_recovery_week && week.phase != Phase::Recovery {
        format!("{} (recovery)", week.phase)
    } else {
        week.phase.to_string()
    };

    WeekRow {
        week: week.week_number,
        start: week.start_date,
        phase,
        volume: week.target_volume_km,
        elevation: week.target_elevation_m,
        long_run: week
            .sessions
            .iter()
            .map(|s| s.planned_distance_km)
            .max()
            .unwrap_or(Decimal::ZERO),
        done: format!("{}/{}", completed, non_rest),
    }
}

/// Week-by-week overview of a plan
pub fn render_plan_table(plan: &TrainingPlan) -> String {
    let rows: Vec<WeekRow> = plan.weeks.iter().map(week_row).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Day-by-day sessions of one week
pub fn render_week(week: &TrainingWeek) -> String {
    let rows: Vec<SessionRow> = week
        .sessions
        .iter()
        .map(|s| SessionRow {
            date: s.date.format("%a %d %b").to_string(),
            session_type: s.session_type.to_string(),
            distance: s.planned_distance_km,
            elevation: s.planned_elevation_m,
            minutes: s.planned_duration_seconds / 60,
            description: s.description.clone(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

fn colored_severity(severity: Severity) -> String {
    match severity {
        Severity::Urgent => severity.name().red().bold().to_string(),
        Severity::Recommended => severity.name().yellow().to_string(),
        Severity::Suggestion => severity.name().cyan().to_string(),
    }
}

/// Adjustment recommendations, strongest first as produced by the calculator
pub fn render_adjustments(recommendations: &[AdjustmentRecommendation]) -> String {
    if recommendations.is_empty() {
        return "No adjustments needed".green().to_string();
    }

    let rows: Vec<RecommendationRow> = recommendations
        .iter()
        .map(|r| RecommendationRow {
            severity: colored_severity(r.severity),
            action: r.title.clone(),
            sessions: r.affected_session_ids.len(),
            details: r.description.clone(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn render_redistribution(result: &RedistributionResult) -> String {
    let mut out = if result.recommendations.is_empty() {
        "Nothing to redistribute".green().to_string()
    } else {
        let rows: Vec<RecommendationRow> = result
            .recommendations
            .iter()
            .map(|r| RecommendationRow {
                severity: colored_severity(r.severity),
                action: format!("{:?}", r.recommendation_type),
                sessions: r.affected_session_ids.len(),
                details: r.description.clone(),
            })
            .collect();
        Table::new(rows).with(Style::rounded()).to_string()
    };

    if result.unrecoverable_distance_km > Decimal::ZERO {
        out.push('\n');
        out.push_str(
            &format!(
                "Unrecoverable: {} km / {} m",
                result.unrecoverable_distance_km, result.unrecoverable_elevation_m
            )
            .yellow()
            .to_string(),
        );
    }
    out
}

/// Fitness, fatigue and form with their interpretations
pub fn render_fitness(snapshot: &FitnessSnapshot) -> String {
    let form = FormInterpretation::from_form(snapshot.form);
    let acr = AcrZone::from_ratio(snapshot.acute_to_chronic_ratio);
    let acr_label = match acr {
        AcrZone::Undertraining => "undertraining".cyan(),
        AcrZone::Optimal => "optimal".green(),
        AcrZone::Elevated => "elevated".yellow(),
        AcrZone::HighRisk => "high risk".red().bold(),
    };

    let mut lines = vec![
        format!("{}", format!("Fitness as of {}", snapshot.date).bold()),
        format!("  Fitness: {:.1}", snapshot.fitness),
        format!("  Fatigue: {:.1}", snapshot.fatigue),
        format!("  Form:    {:.1} ({})", snapshot.form, form.description()),
        format!("  Acute:chronic ratio: {:.2} ({})", snapshot.acute_to_chronic_ratio, acr_label),
        format!(
            "  Last 7 days: {} km, {} m",
            snapshot.weekly_volume_km, snapshot.weekly_elevation_m
        ),
    ];
    if snapshot.monotony > Decimal::ZERO {
        lines.push(format!(
            "  Monotony: {:.2}  Strain: {:.0}",
            snapshot.monotony, snapshot.strain
        ));
    }
    lines.join("\n")
}

/// Plain-text plan report; no terminal colors so the file stays readable anywhere
pub fn export_plan_report<P: AsRef<Path>>(
    plan: &TrainingPlan,
    today: NaiveDate,
    output_path: P,
) -> Result<(), ExportError> {
    let summary = PlanSummary::from_plan(plan, today);
    let mut file = std::fs::File::create(output_path)?;

    writeln!(file, "TRAINING PLAN {}", summary.plan_id)?;
    writeln!(file, "Athlete: {}", summary.athlete_id)?;
    writeln!(file, "Target race: {}", summary.target_race_id)?;
    if let (Some(start), Some(end)) = (summary.start_date, summary.end_date) {
        writeln!(file, "Period: {} to {}", start, end)?;
    }
    writeln!(file)?;

    writeln!(file, "Weeks: {}", summary.total_weeks)?;
    writeln!(file, "Total distance: {} km", summary.total_distance_km)?;
    writeln!(file, "Total climbing: {} m", summary.total_elevation_m)?;
    writeln!(file, "Peak week: {} km", summary.peak_week_km)?;
    match summary.completion_rate {
        Some(rate) => writeln!(
            file,
            "Completed: {}/{} ({:.0}% of past sessions)",
            summary.completed_sessions,
            summary.session_count,
            rate * Decimal::from(100)
        )?,
        None => writeln!(file, "Completed: {}/{}", summary.completed_sessions, summary.session_count)?,
    }
    writeln!(file)?;

    writeln!(file, "PHASES")?;
    for (phase, totals) in &summary.phases {
        writeln!(
            file,
            "{:<10} {:>3} weeks {:>8} km {:>8} m",
            phase.name(),
            totals.weeks,
            totals.distance_km,
            totals.elevation_m
        )?;
    }
    writeln!(file)?;

    writeln!(file, "{}", render_plan_table(plan))?;

    Ok(())
}
