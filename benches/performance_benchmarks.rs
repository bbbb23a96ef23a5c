use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use peakplan::adaptation::{MissedSessionRedistributor, PlanAdjustmentCalculator, PlanProgressPreserver};
use peakplan::models::{
    Activity, AthleteProfile, ExperienceLevel, Race, RacePriority, SportType, TerrainDifficulty,
};
use peakplan::planning::{PlanRequest, TrainingPlanGenerator};
use peakplan::training_load::TrainingLoadModel;

/// Performance benchmarks for the planning engine
///
/// Load model cost grows with history length; plan generation with the number of weeks.

fn create_activity_history(days: i64) -> Vec<Activity> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    (0..days)
        .filter(|d| d % 7 != 0)
        .map(|d| Activity {
            id: format!("activity-{}", d),
            date: start + Duration::days(d),
            distance_km: Decimal::from(6 + d % 10),
            elevation_gain_m: Decimal::from(50 + (d % 5) * 100),
            elevation_loss_m: Decimal::from(50 + (d % 5) * 100),
            duration_seconds: 1800 + (d % 10) as u32 * 300,
            stress_score: None,
            sport: Some(if d % 3 == 0 { SportType::TrailRunning } else { SportType::Running }),
            linked_race_id: None,
        })
        .collect()
}

fn create_request(weeks_out: i64) -> PlanRequest {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    PlanRequest {
        athlete: AthleteProfile {
            id: "bench-athlete".to_string(),
            name: "Bench Runner".to_string(),
            experience_level: ExperienceLevel::Advanced,
            current_weekly_volume_km: dec!(55),
            longest_run_km: dec!(28),
            age: Some(38),
            weight_kg: Some(dec!(68)),
            resting_hr: Some(48),
            max_hr: Some(186),
        },
        race: Race {
            id: "bench-race".to_string(),
            name: "Ridge 100K".to_string(),
            date: now.date_naive() + Duration::weeks(weeks_out),
            distance_km: dec!(100),
            elevation_gain_m: dec!(5000),
            elevation_loss_m: dec!(5000),
            priority: RacePriority::A,
            terrain: TerrainDifficulty::Mountain,
            checkpoints: Vec::new(),
        },
        intermediate_races: Vec::new(),
        now,
        max_increase_override: None,
        plan_start: None,
    }
}

fn bench_training_load(c: &mut Criterion) {
    let model = TrainingLoadModel::new();
    let mut group = c.benchmark_group("Training Load");

    for &days in &[30, 90, 365, 730] {
        let activities = create_activity_history(days);
        let as_of = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Duration::days(days);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::new("compute_snapshot", days), &activities, |b, activities| {
            b.iter(|| model.compute_snapshot(black_box(activities), as_of));
        });
    }

    group.finish();
}

fn bench_plan_generation(c: &mut Criterion) {
    let generator = TrainingPlanGenerator::new();
    let mut group = c.benchmark_group("Plan Generation");

    for &weeks in &[8, 16, 24, 52] {
        let request = create_request(weeks);
        group.bench_with_input(BenchmarkId::new("generate", weeks), &request, |b, request| {
            b.iter(|| generator.generate(black_box(request)));
        });
    }

    group.finish();
}

fn bench_adaptation(c: &mut Criterion) {
    let mut plan = TrainingPlanGenerator::new().generate(&create_request(24)).unwrap();
    // Complete every other session so the analyzers have misses to work with
    for (i, session) in plan.weeks.iter_mut().flat_map(|w| w.sessions.iter_mut()).enumerate() {
        session.completed = i % 2 == 0 && !session.is_rest();
    }
    let now = Utc.from_utc_datetime(&(plan.weeks[10].start_date + Duration::days(3)).and_hms_opt(12, 0, 0).unwrap());

    let calculator = PlanAdjustmentCalculator::new();
    let redistributor = MissedSessionRedistributor::new();
    let preserver = PlanProgressPreserver::new();

    c.bench_function("adjustments_24_weeks", |b| {
        b.iter(|| calculator.calculate(black_box(&plan), now));
    });
    c.bench_function("redistribution_24_weeks", |b| {
        b.iter(|| redistributor.analyze(black_box(&plan), now, 10));
    });
    c.bench_function("progress_snapshot_restore", |b| {
        b.iter(|| {
            let snapshots = preserver.snapshot(&plan);
            let mut copy = plan.clone();
            preserver.restore(black_box(&snapshots), &mut copy)
        });
    });
}

criterion_group!(benches, bench_training_load, bench_plan_generation, bench_adaptation);
criterion_main!(benches);
