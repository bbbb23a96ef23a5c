use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use peakplan::adaptation::{
    InMemoryRaceRepository, LocalPlanGenerator, MissedSessionRedistributor,
    PlanAdjustmentCalculator, PlanAutoAdjustmentService,
};
use peakplan::config::EngineConfig;
use peakplan::export::{self, csv as csv_export, json as json_export, text, ExportFormat};
use peakplan::logging::init_logging;
use peakplan::models::{Activity, AthleteProfile, Race, TrainingPlan};
use peakplan::planning::{PlanRequest, TrainingPlanGenerator};
use peakplan::training_load::TrainingLoadModel;
use peakplan::PlanError;

/// peakplan - Adaptive periodized training plans
///
/// Builds week-by-week plans towards a target race and keeps them in step with
/// missed sessions and race calendar changes.
#[derive(Parser)]
#[command(name = "peakplan")]
#[command(version)]
#[command(about = "Adaptive periodized training plan engine", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fitness, fatigue and form from an activity history
    Fitness {
        /// Activities as a JSON array
        #[arg(short, long)]
        activities: PathBuf,

        /// Evaluation date (YYYY-MM-DD, default: today)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Write the daily series from this date to CSV
        #[arg(long, requires = "series_out")]
        series_from: Option<NaiveDate>,

        /// Output path for the daily series
        #[arg(long)]
        series_out: Option<PathBuf>,
    },

    /// Generate a plan from a JSON plan request
    Generate {
        /// Plan request (athlete, race, intermediate races)
        #[arg(short, long)]
        request: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format (json, csv, text)
        #[arg(short = 'f', long, default_value = "json")]
        format: String,
    },

    /// Display a plan, or one of its weeks
    Show {
        /// Plan JSON file
        #[arg(short, long)]
        plan: PathBuf,

        /// Week number to expand into sessions
        #[arg(short, long)]
        week: Option<u32>,
    },

    /// Recommend adjustments from missed sessions and adherence
    Adjust {
        #[arg(short, long)]
        plan: PathBuf,

        /// Evaluation instant (RFC 3339 or YYYY-MM-DD, default: now)
        #[arg(long)]
        now: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputMode::Table)]
        output: OutputMode,
    },

    /// Spread missed volume over the remaining sessions of the week
    Redistribute {
        #[arg(short, long)]
        plan: PathBuf,

        #[arg(long)]
        now: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputMode::Table)]
        output: OutputMode,
    },

    /// Total missed distance and climbing over recent weeks
    Missed {
        #[arg(short, long)]
        plan: PathBuf,

        #[arg(long)]
        now: Option<String>,

        /// Lookback window in weeks (default from config)
        #[arg(short, long)]
        weeks: Option<u32>,
    },

    /// Regenerate a plan if the race calendar no longer matches it
    SyncRaces {
        #[arg(short, long)]
        plan: PathBuf,

        /// Athlete profile JSON
        #[arg(short, long)]
        athlete: PathBuf,

        /// Current race calendar as a JSON array
        #[arg(short, long)]
        races: PathBuf,

        #[arg(long)]
        now: Option<String>,

        /// Where to write the regenerated plan (default: overwrite --plan)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputMode {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load_or_default(),
    };

    let mut log_config = config.logging.clone();
    log_config.level = log_config.level.raised_by(cli.verbose);
    init_logging(&log_config)?;

    match run(cli, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Some(plan_error) = e.downcast_ref::<PlanError>() {
                eprintln!("{} {}", "error:".red().bold(), plan_error.user_message());
                std::process::exit(1);
            }
            Err(e)
        }
    }
}

async fn run(cli: Cli, config: EngineConfig) -> Result<()> {
    match cli.command {
        Commands::Fitness {
            activities,
            as_of,
            series_from,
            series_out,
        } => {
            let activities: Vec<Activity> = read_json(&activities)?;
            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let model = TrainingLoadModel::with_config(config.load.clone());

            let snapshot = model.compute_snapshot(&activities, as_of);
            println!("{}", text::render_fitness(&snapshot));

            if let Ok(baseline) = model.estimate_baseline(&activities, as_of, 4) {
                println!(
                    "  Baseline: {} km/week, longest run {} km",
                    baseline.weekly_volume_km, baseline.longest_run_km
                );
            }

            if let (Some(from), Some(out)) = (series_from, series_out) {
                let series = model.compute_series(&activities, from, as_of)?;
                csv_export::export_fitness_series(&series, &out)?;
                println!("{} {}", "✓ Series written to".green(), out.display());
            }
        }

        Commands::Generate {
            request,
            output,
            format,
        } => {
            let request: PlanRequest = read_json(&request)?;
            let format: ExportFormat = format.parse()?;
            let generator = TrainingPlanGenerator::with_config(config.planning.clone());
            let plan = generator.generate(&request)?;

            match output {
                Some(path) => {
                    export::export_plan(&plan, format, request.now.date_naive(), &path)?;
                    println!(
                        "{} {} ({} weeks) to {}",
                        "✓ Plan".green().bold(),
                        plan.id,
                        plan.weeks.len(),
                        path.display()
                    );
                }
                None => match format {
                    ExportFormat::Json => println!("{}", json_export::to_pretty_string(&plan)?),
                    ExportFormat::Csv => csv_export::write_sessions(&plan, std::io::stdout())?,
                    ExportFormat::Text => println!("{}", text::render_plan_table(&plan)),
                },
            }
        }

        Commands::Show { plan, week } => {
            let plan = load_plan(&plan)?;
            match week {
                Some(number) => {
                    let week = plan
                        .weeks
                        .iter()
                        .find(|w| w.week_number == number)
                        .with_context(|| format!("Plan has no week {}", number))?;
                    println!(
                        "{}",
                        format!("Week {} - {} ({} km)", week.week_number, week.phase, week.target_volume_km)
                            .bold()
                    );
                    println!("{}", text::render_week(week));
                }
                None => println!("{}", text::render_plan_table(&plan)),
            }
        }

        Commands::Adjust { plan, now, output } => {
            let plan = load_plan(&plan)?;
            let now = parse_now(now.as_deref())?;
            let calculator = PlanAdjustmentCalculator::with_config(config.adaptation.clone());
            let recommendations = calculator.calculate(&plan, now);

            match output {
                OutputMode::Table => println!("{}", text::render_adjustments(&recommendations)),
                OutputMode::Json => println!("{}", json_export::to_pretty_string(&recommendations)?),
            }
        }

        Commands::Redistribute { plan, now, output } => {
            let plan = load_plan(&plan)?;
            let now = parse_now(now.as_deref())?;
            let current_week = plan
                .week_index_for(now.date_naive())
                .context("The evaluation date is outside the plan")?;
            let redistributor = MissedSessionRedistributor::with_config(config.adaptation.clone());
            let result = redistributor.analyze(&plan, now, current_week);

            match output {
                OutputMode::Table => println!("{}", text::render_redistribution(&result)),
                OutputMode::Json => println!("{}", json_export::to_pretty_string(&result)?),
            }
        }

        Commands::Missed { plan, now, weeks } => {
            let plan = load_plan(&plan)?;
            let now = parse_now(now.as_deref())?;
            let weeks = weeks.unwrap_or(config.adaptation.missed_volume_lookback_weeks);
            let redistributor = MissedSessionRedistributor::with_config(config.adaptation.clone());
            let missed = redistributor.calculate_accumulated_missed_volume(&plan, now, weeks);

            println!(
                "Missed over {} week(s): {} session(s), {} km, {} m",
                weeks, missed.session_count, missed.distance_km, missed.elevation_m
            );
        }

        Commands::SyncRaces {
            plan: plan_path,
            athlete,
            races,
            now,
            output,
        } => {
            let plan = load_plan(&plan_path)?;
            let athlete: AthleteProfile = read_json(&athlete)?;
            let races: Vec<Race> = read_json(&races)?;
            let now = parse_now(now.as_deref())?;

            let service = PlanAutoAdjustmentService::new(
                Arc::new(LocalPlanGenerator::new(TrainingPlanGenerator::with_config(
                    config.planning.clone(),
                ))),
                Arc::new(InMemoryRaceRepository::with_races(&athlete.id, races)),
            );

            match service.check_and_adjust(&plan, &athlete, now).await? {
                None => println!("{}", "✓ Plan matches the race calendar".green()),
                Some(outcome) => {
                    for change in &outcome.changes {
                        println!("  {}", change.to_string().yellow());
                    }
                    let path = output.unwrap_or(plan_path);
                    json_export::export_json(&outcome.plan, &path)?;
                    println!(
                        "{} {} ({} sessions carried over) to {}",
                        "✓ Regenerated".green().bold(),
                        outcome.plan.id,
                        outcome.restored_sessions,
                        path.display()
                    );
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => print!("{}", toml::to_string_pretty(&config)?),
            ConfigAction::Path => println!("{}", EngineConfig::default_config_path().display()),
            ConfigAction::Init { force } => {
                let path = cli.config.unwrap_or_else(EngineConfig::default_config_path);
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
                }
                EngineConfig::default().save_to_file(&path)?;
                println!("{} {}", "✓ Configuration written to".green(), path.display());
            }
        },
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_plan(path: &Path) -> Result<TrainingPlan> {
    json_export::load_plan(path).with_context(|| format!("Failed to load plan {}", path.display()))
}

/// RFC 3339 instant, or a bare date taken at noon UTC
fn parse_now(value: Option<&str>) -> Result<DateTime<Utc>> {
    let Some(value) = value else {
        return Ok(Utc::now());
    };
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date or timestamp: {}", value))?;
    date.and_hms_opt(12, 0, 0)
        .map(|dt| dt.and_utc())
        .context("Invalid time of day")
}
