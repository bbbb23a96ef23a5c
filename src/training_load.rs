use crate::error::{PlanError, Result};
use crate::models::{Activity, SportType};
use chrono::{Days, NaiveDate};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::debug;

/// Aggregated load and volume for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLoad {
    /// Date of the training day
    pub date: NaiveDate,

    /// Total load for the day (sum of all activities)
    pub total_load: Decimal,

    /// Distance covered across all activities (km)
    pub distance_km: Decimal,

    /// Elevation gain across all activities (m)
    pub elevation_gain_m: Decimal,

    /// Moving time across all activities
    pub duration_seconds: u64,

    /// Number of activities recorded on this day
    pub activity_count: u16,
}

/// Fitness/fatigue/form picture of an athlete on a given date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessSnapshot {
    /// Date these metrics are calculated for
    pub date: NaiveDate,

    /// Chronic training load (42-day exponential moving average)
    pub fitness: Decimal,

    /// Acute training load (7-day exponential moving average)
    pub fatigue: Decimal,

    /// Fitness minus fatigue
    pub form: Decimal,

    /// Load recorded on `date`
    pub daily_load: Decimal,

    /// Distance over the trailing window
    pub weekly_volume_km: Decimal,

    /// Elevation gain over the trailing window
    pub weekly_elevation_m: Decimal,

    /// Moving time over the trailing window
    pub weekly_duration_seconds: u64,

    /// Fatigue divided by fitness, zero when fitness is zero
    pub acute_to_chronic_ratio: Decimal,

    /// Mean over standard deviation of daily load in the trailing window
    pub monotony: Decimal,

    /// Trailing window load multiplied by monotony
    pub strain: Decimal,
}

impl FitnessSnapshot {
    /// All-zero snapshot used when there is no history
    pub fn empty(date: NaiveDate) -> Self {
        FitnessSnapshot {
            date,
            fitness: Decimal::ZERO,
            fatigue: Decimal::ZERO,
            form: Decimal::ZERO,
            daily_load: Decimal::ZERO,
            weekly_volume_km: Decimal::ZERO,
            weekly_elevation_m: Decimal::ZERO,
            weekly_duration_seconds: 0,
            acute_to_chronic_ratio: Decimal::ZERO,
            monotony: Decimal::ZERO,
            strain: Decimal::ZERO,
        }
    }
}

/// Training load model configuration with customizable time constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingLoadConfig {
    /// Fitness time constant in days (default: 42)
    pub ctl_time_constant: u16,

    /// Fatigue time constant in days (default: 7)
    pub atl_time_constant: u16,

    /// Trailing window for weekly sums and monotony (default: 7)
    pub trailing_window_days: u16,
}

impl Default for TrainingLoadConfig {
    fn default() -> Self {
        TrainingLoadConfig {
            ctl_time_constant: 42,
            atl_time_constant: 7,
            trailing_window_days: 7,
        }
    }
}

/// Form interpretation ranges
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormInterpretation {
    VeryFresh,    // +25 and above
    Fresh,        // +5 to +25
    Neutral,      // -10 to +5
    Fatigued,     // -30 to -10
    VeryFatigued, // Below -30
}

impl FormInterpretation {
    pub fn from_form(form: Decimal) -> Self {
        if form >= Decimal::from(25) {
            FormInterpretation::VeryFresh
        } else if form >= Decimal::from(5) {
            FormInterpretation::Fresh
        } else if form >= Decimal::from(-10) {
            FormInterpretation::Neutral
        } else if form >= Decimal::from(-30) {
            FormInterpretation::Fatigued
        } else {
            FormInterpretation::VeryFatigued
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FormInterpretation::VeryFresh => "Very fresh (may be losing fitness)",
            FormInterpretation::Fresh => "Fresh and ready for hard training or racing",
            FormInterpretation::Neutral => "Neutral (normal training)",
            FormInterpretation::Fatigued => "Fatigued (monitor closely)",
            FormInterpretation::VeryFatigued => "Very fatigued (rest needed)",
        }
    }
}

/// Acute:chronic ratio bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcrZone {
    Undertraining,
    Optimal,
    Elevated,
    HighRisk,
}

impl AcrZone {
    pub fn from_ratio(ratio: Decimal) -> Self {
        if ratio < dec!(0.8) {
            AcrZone::Undertraining
        } else if ratio <= dec!(1.3) {
            AcrZone::Optimal
        } else if ratio <= dec!(1.5) {
            AcrZone::Elevated
        } else {
            AcrZone::HighRisk
        }
    }
}

/// Recent running capacity derived from history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingBaseline {
    pub weekly_volume_km: Decimal,
    pub longest_run_km: Decimal,
    pub activity_count: usize,
    pub weeks_observed: u32,
}

/// Turns activity history into daily load and fitness/fatigue signals
pub struct TrainingLoadModel {
    config: TrainingLoadConfig,
}

impl TrainingLoadModel {
    pub fn new() -> Self {
        TrainingLoadModel {
            config: TrainingLoadConfig::default(),
        }
    }

    pub fn with_config(config: TrainingLoadConfig) -> Self {
        TrainingLoadModel { config }
    }

    /// Load of a single activity: the stress score when recorded, otherwise a
    /// sport-specific effort formula
    pub fn activity_load(&self, activity: &Activity) -> Decimal {
        if let Some(score) = activity.stress_score {
            return score;
        }

        let climbing = activity.elevation_gain_m / dec!(100);
        match activity.sport.unwrap_or(SportType::Running) {
            sport if sport.is_foot_based() => activity.distance_km + climbing,
            SportType::Cycling => activity.distance_km / dec!(3) + climbing,
            SportType::Swimming => activity.distance_km * dec!(4),
            _ => Decimal::from(activity.duration_seconds) / dec!(3600) * dec!(30),
        }
    }

    /// Aggregate same-day activities, ignoring anything after `as_of`
    pub fn aggregate_daily_loads(
        &self,
        activities: &[Activity],
        as_of: NaiveDate,
    ) -> BTreeMap<NaiveDate, DailyLoad> {
        let mut daily: BTreeMap<NaiveDate, DailyLoad> = BTreeMap::new();

        for activity in activities.iter().filter(|a| a.date <= as_of) {
            let load = self.activity_load(activity);

            daily
                .entry(activity.date)
                .and_modify(|day| {
                    day.total_load += load;
                    day.distance_km += activity.distance_km;
                    day.elevation_gain_m += activity.elevation_gain_m;
                    day.duration_seconds += u64::from(activity.duration_seconds);
                    day.activity_count += 1;
                })
                .or_insert(DailyLoad {
                    date: activity.date,
                    total_load: load,
                    distance_km: activity.distance_km,
                    elevation_gain_m: activity.elevation_gain_m,
                    duration_seconds: u64::from(activity.duration_seconds),
                    activity_count: 1,
                });
        }

        daily
    }

    /// Snapshot as of one date. Empty history yields an all-zero snapshot.
    pub fn compute_snapshot(&self, activities: &[Activity], as_of: NaiveDate) -> FitnessSnapshot {
        let daily = self.aggregate_daily_loads(activities, as_of);
        let Some(first_day) = daily.keys().next().copied() else {
            return FitnessSnapshot::empty(as_of);
        };

        self.walk(&daily, first_day, as_of, as_of)
            .pop()
            .unwrap_or_else(|| FitnessSnapshot::empty(as_of))
    }

    /// One snapshot per day from `start` to `end` inclusive
    pub fn compute_series(
        &self,
        activities: &[Activity],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FitnessSnapshot>> {
        if start > end {
            return Err(PlanError::InvalidInput(
                "Series start date must not be after end date".to_string(),
            ));
        }

        let daily = self.aggregate_daily_loads(activities, end);
        let first_day = daily.keys().next().copied().unwrap_or(start).min(start);

        Ok(self.walk(&daily, first_day, start, end))
    }

    /// Evaluate the moving averages day by day, emitting snapshots from `emit_from`
    fn walk(
        &self,
        daily: &BTreeMap<NaiveDate, DailyLoad>,
        first_day: NaiveDate,
        emit_from: NaiveDate,
        end: NaiveDate,
    ) -> Vec<FitnessSnapshot> {
        let ctl_constant = Decimal::from(self.config.ctl_time_constant.max(1));
        let atl_constant = Decimal::from(self.config.atl_time_constant.max(1));

        let mut fitness = Decimal::ZERO;
        let mut fatigue = Decimal::ZERO;
        let mut series = Vec::new();
        let mut current = first_day;

        while current <= end {
            let load = daily
                .get(&current)
                .map(|d| d.total_load)
                .unwrap_or(Decimal::ZERO);

            fitness += (load - fitness) / ctl_constant;
            fatigue += (load - fatigue) / atl_constant;

            if current >= emit_from {
                series.push(self.snapshot_for(daily, current, load, fitness, fatigue));
            }

            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }

        debug!(
            days = series.len(),
            fitness = %fitness.round_dp(2),
            fatigue = %fatigue.round_dp(2),
            "Training load walk complete"
        );

        series
    }

    fn snapshot_for(
        &self,
        daily: &BTreeMap<NaiveDate, DailyLoad>,
        date: NaiveDate,
        daily_load: Decimal,
        fitness: Decimal,
        fatigue: Decimal,
    ) -> FitnessSnapshot {
        let window = u64::from(self.config.trailing_window_days.max(1));
        let window_start = date
            .checked_sub_days(Days::new(window - 1))
            .unwrap_or(date);

        let mut weekly_volume_km = Decimal::ZERO;
        let mut weekly_elevation_m = Decimal::ZERO;
        let mut weekly_duration_seconds = 0u64;
        let mut window_loads = vec![0.0f64; window as usize];

        for (day, entry) in daily.range(window_start..=date) {
            weekly_volume_km += entry.distance_km;
            weekly_elevation_m += entry.elevation_gain_m;
            weekly_duration_seconds += entry.duration_seconds;
            let slot = (*day - window_start).num_days() as usize;
            if let Some(value) = window_loads.get_mut(slot) {
                *value = entry.total_load.to_f64().unwrap_or(0.0);
            }
        }

        let monotony = Self::monotony(&window_loads);
        let window_load: Decimal = daily
            .range(window_start..=date)
            .map(|(_, d)| d.total_load)
            .sum();

        let acute_to_chronic_ratio = if fitness.is_zero() {
            Decimal::ZERO
        } else {
            fatigue / fitness
        };

        FitnessSnapshot {
            date,
            fitness,
            fatigue,
            form: fitness - fatigue,
            daily_load,
            weekly_volume_km,
            weekly_elevation_m,
            weekly_duration_seconds,
            acute_to_chronic_ratio,
            monotony,
            strain: window_load * monotony,
        }
    }

    /// Mean / population standard deviation; zero when there is no load or no variance
    fn monotony(loads: &[f64]) -> Decimal {
        if loads.is_empty() || loads.iter().all(|l| *l == 0.0) {
            return Decimal::ZERO;
        }

        let mean = loads.iter().mean();
        let std_dev = loads.iter().population_std_dev();
        if !std_dev.is_finite() || std_dev <= f64::EPSILON {
            return Decimal::ZERO;
        }

        Decimal::from_f64(mean / std_dev)
            .map(|m| m.round_dp(4))
            .unwrap_or(Decimal::ZERO)
    }

    /// Average weekly running volume and longest run over the trailing `weeks`
    pub fn estimate_baseline(
        &self,
        activities: &[Activity],
        as_of: NaiveDate,
        weeks: u32,
    ) -> Result<TrainingBaseline> {
        let weeks = weeks.max(1);
        let window_start = as_of
            .checked_sub_days(Days::new(u64::from(weeks) * 7))
            .unwrap_or(as_of);

        let runs: Vec<&Activity> = activities
            .iter()
            .filter(|a| a.date > window_start && a.date <= as_of)
            .filter(|a| a.sport.map_or(true, |s| s.is_foot_based()))
            .collect();

        if runs.is_empty() {
            return Err(PlanError::insufficient_data(
                "training baseline",
                format!("no running activities in the {} weeks before {}", weeks, as_of),
            ));
        }

        let total: Decimal = runs.iter().map(|a| a.distance_km).sum();
        let longest = runs
            .iter()
            .map(|a| a.distance_km)
            .max()
            .unwrap_or(Decimal::ZERO);

        Ok(TrainingBaseline {
            weekly_volume_km: (total / Decimal::from(weeks)).round_dp(1),
            longest_run_km: longest,
            activity_count: runs.len(),
            weeks_observed: weeks,
        })
    }
}

impl Default for TrainingLoadModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(date: NaiveDate, km: Decimal, gain: Decimal) -> Activity {
        Activity {
            id: format!("run_{}", date.format("%Y%m%d")),
            date,
            distance_km: km,
            elevation_gain_m: gain,
            elevation_loss_m: gain,
            duration_seconds: 3600,
            stress_score: None,
            sport: Some(SportType::Running),
            linked_race_id: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    #[test]
    fn test_effort_weighted_run_load() {
        let model = TrainingLoadModel::new();
        let activity = run(day(1), dec!(10), dec!(200));
        assert_eq!(model.activity_load(&activity), dec!(12));
    }

    #[test]
    fn test_sport_specific_formulas() {
        let model = TrainingLoadModel::new();

        let mut ride = run(day(1), dec!(30), dec!(300));
        ride.sport = Some(SportType::Cycling);
        assert_eq!(model.activity_load(&ride), dec!(13));

        let mut swim = run(day(1), dec!(2), dec!(0));
        swim.sport = Some(SportType::Swimming);
        assert_eq!(model.activity_load(&swim), dec!(8));

        let mut yoga = run(day(1), dec!(0), dec!(0));
        yoga.sport = Some(SportType::Yoga);
        yoga.duration_seconds = 5400;
        assert_eq!(model.activity_load(&yoga), dec!(45));

        let mut unknown = run(day(1), dec!(5), dec!(100));
        unknown.sport = None;
        assert_eq!(model.activity_load(&unknown), dec!(6));
    }

    #[test]
    fn test_stress_score_overrides_formula() {
        let model = TrainingLoadModel::new();
        let mut activity = run(day(1), dec!(10), dec!(200));
        activity.stress_score = Some(dec!(85));
        assert_eq!(model.activity_load(&activity), dec!(85));
    }

    #[test]
    fn test_same_day_aggregation() {
        let model = TrainingLoadModel::new();
        let activities = vec![run(day(2), dec!(10), dec!(0)), run(day(2), dec!(5), dec!(100))];

        let daily = model.aggregate_daily_loads(&activities, day(30));
        assert_eq!(daily.len(), 1);
        let entry = daily.get(&day(2)).unwrap();
        assert_eq!(entry.total_load, dec!(16));
        assert_eq!(entry.activity_count, 2);
        assert_eq!(entry.distance_km, dec!(15));
    }

    #[test]
    fn test_empty_history_is_zero_snapshot() {
        let model = TrainingLoadModel::new();
        let snapshot = model.compute_snapshot(&[], day(10));
        assert_eq!(snapshot, FitnessSnapshot::empty(day(10)));
    }

    #[test]
    fn test_single_day_ema() {
        let model = TrainingLoadModel::new();
        let snapshot = model.compute_snapshot(&[run(day(1), dec!(10), dec!(200))], day(1));

        assert_eq!(snapshot.daily_load, dec!(12));
        assert_eq!(snapshot.fitness, dec!(12) / dec!(42));
        assert_eq!(snapshot.fatigue, dec!(12) / dec!(7));
        assert_eq!(snapshot.form, snapshot.fitness - snapshot.fatigue);
        assert_eq!(
            snapshot.acute_to_chronic_ratio,
            snapshot.fatigue / snapshot.fitness
        );
        assert_eq!(snapshot.weekly_volume_km, dec!(10));
        assert_eq!(snapshot.weekly_elevation_m, dec!(200));
    }

    #[test]
    fn test_fatigue_decays_faster_than_fitness() {
        let model = TrainingLoadModel::new();
        let activities: Vec<Activity> = (1..=14).map(|d| run(day(d), dec!(10), dec!(0))).collect();

        let loaded = model.compute_snapshot(&activities, day(14));
        let rested = model.compute_snapshot(&activities, day(24));

        assert!(loaded.fatigue > loaded.fitness);
        assert!(rested.fatigue < loaded.fatigue);
        assert!(rested.form > loaded.form);
        assert_eq!(rested.weekly_volume_km, Decimal::ZERO);
        assert_eq!(rested.monotony, Decimal::ZERO);
    }

    #[test]
    fn test_activities_after_as_of_are_ignored() {
        let model = TrainingLoadModel::new();
        let activities = vec![run(day(20), dec!(10), dec!(0))];
        let snapshot = model.compute_snapshot(&activities, day(10));
        assert_eq!(snapshot, FitnessSnapshot::empty(day(10)));
    }

    #[test]
    fn test_monotony_constant_load_is_zero() {
        let model = TrainingLoadModel::new();
        let activities: Vec<Activity> = (1..=7).map(|d| run(day(d), dec!(8), dec!(0))).collect();
        let snapshot = model.compute_snapshot(&activities, day(7));
        assert_eq!(snapshot.monotony, Decimal::ZERO);
        assert_eq!(snapshot.strain, Decimal::ZERO);
    }

    #[test]
    fn test_monotony_varied_load() {
        let model = TrainingLoadModel::new();
        // Loads 10 and 0 alternating: mean 40/7, population sd > 0
        let activities: Vec<Activity> = [1, 3, 5, 7]
            .iter()
            .map(|d| run(day(*d), dec!(10), dec!(0)))
            .collect();
        let snapshot = model.compute_snapshot(&activities, day(7));

        assert!(snapshot.monotony > Decimal::ZERO);
        assert_eq!(snapshot.strain, dec!(40) * snapshot.monotony);
    }

    #[test]
    fn test_series_matches_snapshots() {
        let model = TrainingLoadModel::new();
        let activities: Vec<Activity> = (1..=10)
            .map(|d| run(day(d), Decimal::from(d), dec!(50)))
            .collect();

        let series = model.compute_series(&activities, day(5), day(12)).unwrap();
        assert_eq!(series.len(), 8);

        for snapshot in &series {
            let single = model.compute_snapshot(&activities, snapshot.date);
            assert_eq!(snapshot.fitness, single.fitness);
            assert_eq!(snapshot.fatigue, single.fatigue);
        }

        assert!(model.compute_series(&activities, day(12), day(5)).is_err());
    }

    #[test]
    fn test_form_interpretation() {
        assert_eq!(FormInterpretation::from_form(dec!(30)), FormInterpretation::VeryFresh);
        assert_eq!(FormInterpretation::from_form(dec!(10)), FormInterpretation::Fresh);
        assert_eq!(FormInterpretation::from_form(dec!(0)), FormInterpretation::Neutral);
        assert_eq!(FormInterpretation::from_form(dec!(-20)), FormInterpretation::Fatigued);
        assert_eq!(FormInterpretation::from_form(dec!(-40)), FormInterpretation::VeryFatigued);
    }

    #[test]
    fn test_acr_zones() {
        assert_eq!(AcrZone::from_ratio(dec!(0.5)), AcrZone::Undertraining);
        assert_eq!(AcrZone::from_ratio(dec!(1.0)), AcrZone::Optimal);
        assert_eq!(AcrZone::from_ratio(dec!(1.4)), AcrZone::Elevated);
        assert_eq!(AcrZone::from_ratio(dec!(2.0)), AcrZone::HighRisk);
    }

    #[test]
    fn test_baseline_estimation() {
        let model = TrainingLoadModel::new();
        let activities = vec![
            run(day(2), dec!(10), dec!(0)),
            run(day(9), dec!(20), dec!(0)),
            run(day(16), dec!(14), dec!(0)),
            run(day(23), dec!(16), dec!(0)),
        ];

        let baseline = model.estimate_baseline(&activities, day(28), 4).unwrap();
        assert_eq!(baseline.weekly_volume_km, dec!(15));
        assert_eq!(baseline.longest_run_km, dec!(20));
        assert_eq!(baseline.activity_count, 4);
    }

    #[test]
    fn test_baseline_without_history_is_insufficient_data() {
        let model = TrainingLoadModel::new();
        let result = model.estimate_baseline(&[], day(28), 4);
        assert!(matches!(result, Err(PlanError::InsufficientData { .. })));
    }

    #[test]
    fn test_custom_config() {
        let model = TrainingLoadModel::with_config(TrainingLoadConfig {
            ctl_time_constant: 28,
            atl_time_constant: 5,
            ..TrainingLoadConfig::default()
        });
        let snapshot = model.compute_snapshot(&[run(day(1), dec!(14), dec!(0))], day(1));
        assert_eq!(snapshot.fitness, dec!(0.5));
        assert_eq!(snapshot.fatigue, dec!(2.8));
    }
}
