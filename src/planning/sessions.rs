use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use tracing::debug;

use super::phases::RaceWeekOverride;
use super::skeleton::WeekSkeleton;
use super::volume::WeekVolume;
use super::PlanningConfig;
use crate::models::{
    ExperienceLevel, Intensity, Phase, RacePriority, SessionType, TrainingSession, TrainingWeek,
};

/// One day of a weekly template. `share` is the day's relative portion of the week volume.
#[derive(Debug, Clone, Copy)]
struct Slot {
    session_type: SessionType,
    intensity: Intensity,
    share: Decimal,
    description: &'static str,
}

impl Slot {
    fn new(
        session_type: SessionType,
        intensity: Intensity,
        share: Decimal,
        description: &'static str,
    ) -> Self {
        Slot {
            session_type,
            intensity,
            share,
            description,
        }
    }

    fn rest() -> Self {
        Slot::new(SessionType::Rest, Intensity::Recovery, Decimal::ZERO, "Rest day")
    }
}

/// Fills week skeletons with seven concrete sessions
pub struct SessionTemplateGenerator {
    config: PlanningConfig,
}

impl SessionTemplateGenerator {
    pub fn new() -> Self {
        Self::with_config(PlanningConfig::default())
    }

    pub fn with_config(config: PlanningConfig) -> Self {
        SessionTemplateGenerator { config }
    }

    /// Build the Monday-to-Sunday sessions for one week.
    ///
    /// Session ids are `{week_id}-d{offset}` so regenerating an identical week yields
    /// identical ids.
    pub fn generate(
        &self,
        week_id: &str,
        skeleton: &WeekSkeleton,
        volume: &WeekVolume,
        experience: ExperienceLevel,
    ) -> TrainingWeek {
        let sessions = match &skeleton.race_override {
            Some(race_week @ RaceWeekOverride::RaceWeek { .. }) => {
                self.race_week_sessions(week_id, skeleton, volume, race_week, experience)
            }
            _ => {
                let slots = self.template(skeleton, experience);
                self.fill(week_id, skeleton.start_date, &slots, volume, experience)
            }
        };

        debug!(
            week = skeleton.week_number,
            phase = %skeleton.phase,
            sessions = sessions.iter().filter(|s| !s.is_rest()).count(),
            "Generated week sessions"
        );

        TrainingWeek {
            id: week_id.to_string(),
            week_number: skeleton.week_number,
            start_date: skeleton.start_date,
            end_date: skeleton.end_date,
            phase: skeleton.phase,
            is_recovery_week: skeleton.is_recovery_week,
            target_volume_km: volume.target_volume_km,
            target_elevation_m: volume.target_elevation_m,
            sessions,
        }
    }

    fn template(&self, skeleton: &WeekSkeleton, experience: ExperienceLevel) -> Vec<Slot> {
        use Intensity as I;
        use SessionType as S;

        let mut slots = match skeleton.phase {
            Phase::Base | Phase::Race => vec![
                Slot::rest(),
                Slot::new(S::Easy, I::Easy, dec!(0.15), "Easy aerobic run"),
                Slot::new(S::Recovery, I::Recovery, dec!(0.10), "Recovery jog"),
                Slot::new(S::Easy, I::Easy, dec!(0.15), "Easy aerobic run"),
                Slot::rest(),
                Slot::new(S::LongRun, I::Easy, dec!(0.40), "Long run at conversational pace"),
                Slot::new(S::Recovery, I::Recovery, dec!(0.20), "Recovery jog"),
            ],
            Phase::Build => vec![
                Slot::rest(),
                Slot::new(S::Intervals, I::Hard, dec!(0.15), "Intervals: 6 x 3 min hard, 2 min jog"),
                Slot::new(S::Easy, I::Easy, dec!(0.15), "Easy aerobic run"),
                if experience.is_advanced_or_above() {
                    Slot::new(S::VerticalGain, I::Hard, dec!(0.15), "Hill repeats for vertical gain")
                } else {
                    Slot::new(S::Tempo, I::Moderate, dec!(0.15), "Tempo run at threshold")
                },
                Slot::rest(),
                Slot::new(S::LongRun, I::Moderate, dec!(0.35), "Long run with steady finish"),
                Slot::new(S::Recovery, I::Recovery, dec!(0.20), "Recovery jog"),
            ],
            Phase::Peak => vec![
                Slot::rest(),
                Slot::new(S::Intervals, I::Hard, dec!(0.15), "Race-pace intervals"),
                Slot::new(S::Easy, I::Easy, dec!(0.10), "Easy aerobic run"),
                Slot::new(S::Tempo, I::Moderate, dec!(0.15), "Tempo run at threshold"),
                Slot::rest(),
                Slot::new(S::LongRun, I::Moderate, dec!(0.35), "Race-specific long run"),
                if experience == ExperienceLevel::Elite {
                    Slot::new(S::BackToBack, I::Moderate, dec!(0.25), "Back-to-back long run on tired legs")
                } else {
                    Slot::new(S::CrossTraining, I::Easy, Decimal::ZERO, "Low-impact cross training")
                },
            ],
            Phase::Taper => vec![
                Slot::rest(),
                Slot::new(S::Easy, I::Easy, dec!(0.20), "Easy aerobic run"),
                Slot::new(S::Intervals, I::Hard, dec!(0.15), "Opener: 4 x 1 min fast, full recovery"),
                Slot::new(S::Easy, I::Easy, dec!(0.20), "Easy aerobic run"),
                Slot::rest(),
                Slot::new(S::LongRun, I::Easy, dec!(0.25), "Shortened long run"),
                Slot::new(S::Recovery, I::Recovery, dec!(0.20), "Recovery jog"),
            ],
            Phase::Recovery => vec![
                Slot::rest(),
                Slot::new(S::Recovery, I::Recovery, dec!(0.25), "Post-race recovery jog"),
                Slot::rest(),
                Slot::new(S::Easy, I::Easy, dec!(0.25), "Easy aerobic run"),
                Slot::rest(),
                Slot::new(S::Easy, I::Easy, dec!(0.30), "Easy aerobic run"),
                Slot::new(S::Recovery, I::Recovery, dec!(0.20), "Recovery jog"),
            ],
        };

        if skeleton.is_recovery_week {
            for slot in slots.iter_mut() {
                if slot.intensity.is_hard()
                    || matches!(
                        slot.session_type,
                        S::Tempo | S::Intervals | S::VerticalGain | S::BackToBack
                    )
                {
                    *slot = Slot::new(S::Easy, I::Easy, slot.share, "Easy run (recovery week)");
                } else if slot.session_type == S::LongRun {
                    slot.intensity = I::Easy;
                }
            }
        }

        slots
    }

    fn fill(
        &self,
        week_id: &str,
        start: NaiveDate,
        slots: &[Slot],
        volume: &WeekVolume,
        experience: ExperienceLevel,
    ) -> Vec<TrainingSession> {
        let distance_weights: Vec<Decimal> = slots
            .iter()
            .map(|s| {
                if s.session_type.carries_distance() {
                    s.share
                } else {
                    Decimal::ZERO
                }
            })
            .collect();
        let elevation_weights: Vec<Decimal> = slots
            .iter()
            .zip(&distance_weights)
            .map(|(s, w)| {
                if s.session_type == SessionType::VerticalGain {
                    *w * dec!(2)
                } else {
                    *w
                }
            })
            .collect();

        let distances = split(volume.target_volume_km, &distance_weights, 1);
        let elevations = split(volume.target_elevation_m, &elevation_weights, 0);

        slots
            .iter()
            .enumerate()
            .map(|(offset, slot)| {
                self.session(
                    session_id(week_id, offset),
                    day(start, offset),
                    slot,
                    distances[offset],
                    elevations[offset],
                    experience,
                )
            })
            .collect()
    }

    /// Race on its calendar day, two shakeouts carrying the rest of the week's volume,
    /// everything else rest.
    fn race_week_sessions(
        &self,
        week_id: &str,
        skeleton: &WeekSkeleton,
        volume: &WeekVolume,
        race_week: &RaceWeekOverride,
        experience: ExperienceLevel,
    ) -> Vec<TrainingSession> {
        let RaceWeekOverride::RaceWeek {
            race_date,
            priority,
            distance_km,
            ..
        } = race_week
        else {
            return Vec::new();
        };

        let race_offset = (*race_date - skeleton.start_date).num_days().clamp(0, 6) as usize;
        let shakeout_days: Vec<usize> = [1usize, 3, 5]
            .into_iter()
            .filter(|d| *d != race_offset)
            .take(2)
            .collect();
        let remaining = (volume.target_volume_km - *distance_km).max(Decimal::ZERO);
        let shakeouts = split(remaining, &[Decimal::ONE, Decimal::ONE], 1);

        let race_intensity = match priority {
            RacePriority::A => Intensity::Max,
            RacePriority::B => Intensity::Hard,
            RacePriority::C => Intensity::Moderate,
        };
        let race_slot = Slot::new(SessionType::Race, race_intensity, Decimal::ONE, "Tune-up race");
        let shakeout_slot = Slot::new(
            SessionType::Easy,
            Intensity::Easy,
            Decimal::ONE,
            "Shakeout run with a few strides",
        );

        (0..7)
            .map(|offset| {
                let id = session_id(week_id, offset);
                let date = day(skeleton.start_date, offset);
                if offset == race_offset {
                    self.session(id, date, &race_slot, *distance_km, volume.target_elevation_m, experience)
                } else if let Some(position) = shakeout_days.iter().position(|d| *d == offset) {
                    self.session(id, date, &shakeout_slot, shakeouts[position], Decimal::ZERO, experience)
                } else {
                    self.session(id, date, &Slot::rest(), Decimal::ZERO, Decimal::ZERO, experience)
                }
            })
            .collect()
    }

    fn session(
        &self,
        id: String,
        date: NaiveDate,
        slot: &Slot,
        distance_km: Decimal,
        elevation_m: Decimal,
        experience: ExperienceLevel,
    ) -> TrainingSession {
        if slot.session_type.is_rest() {
            return TrainingSession {
                id,
                date,
                session_type: SessionType::Rest,
                planned_distance_km: Decimal::ZERO,
                planned_elevation_m: Decimal::ZERO,
                planned_duration_seconds: 0,
                intensity: Intensity::Recovery,
                description: slot.description.to_string(),
                nutrition_notes: None,
                completed: false,
                skipped: false,
                linked_activity_id: None,
                target_heart_rate_zone: None,
            };
        }

        let duration = self.planned_duration(slot, distance_km, elevation_m, experience);
        let description = if slot.session_type.carries_distance() {
            format!("{} ({} km)", slot.description, distance_km.normalize())
        } else {
            slot.description.to_string()
        };

        TrainingSession {
            id,
            date,
            session_type: slot.session_type,
            planned_distance_km: distance_km,
            planned_elevation_m: elevation_m,
            planned_duration_seconds: duration,
            intensity: slot.intensity,
            description,
            nutrition_notes: self.nutrition_note(duration, elevation_m),
            completed: false,
            skipped: false,
            linked_activity_id: None,
            target_heart_rate_zone: Some(slot.intensity.heart_rate_zone()),
        }
    }

    /// Easy pace scaled by intensity, plus a minute per 10 m of climbing
    fn planned_duration(
        &self,
        slot: &Slot,
        distance_km: Decimal,
        elevation_m: Decimal,
        experience: ExperienceLevel,
    ) -> u32 {
        if slot.session_type == SessionType::CrossTraining {
            return self.config.cross_training_duration_seconds;
        }

        let pace_factor = match slot.intensity {
            Intensity::Recovery => dec!(1.15),
            Intensity::Easy => dec!(1.0),
            Intensity::Moderate => dec!(0.9),
            Intensity::Hard => dec!(0.85),
            Intensity::Max => dec!(0.8),
        };
        let minutes = distance_km * self.config.easy_pace_min_per_km.get(experience) * pace_factor
            + elevation_m / dec!(10);

        (minutes * dec!(60)).round().to_u32().unwrap_or(0)
    }

    fn nutrition_note(&self, duration_seconds: u32, elevation_m: Decimal) -> Option<String> {
        if duration_seconds < self.config.long_session_duration_seconds
            && elevation_m < self.config.long_session_elevation_m
        {
            return None;
        }

        let hours = Decimal::from(duration_seconds) / dec!(3600);
        Some(format!(
            "Fuel for about {} h: 30-60 g carbohydrate per hour from the first hour, drink to thirst and add electrolytes",
            hours.round_dp(1)
        ))
    }
}

impl Default for SessionTemplateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn session_id(week_id: &str, offset: usize) -> String {
    format!("{}-d{}", week_id, offset)
}

fn day(start: NaiveDate, offset: usize) -> NaiveDate {
    start
        .checked_add_days(Days::new(offset as u64))
        .unwrap_or(start)
}

/// Split `total` by `weights`, rounding each part toward zero at `dp` decimal places.
/// The rounding remainder goes to the heaviest weight so the parts sum to `total`.
fn split(total: Decimal, weights: &[Decimal], dp: u32) -> Vec<Decimal> {
    let weight_sum: Decimal = weights.iter().sum();
    if weight_sum <= Decimal::ZERO || total <= Decimal::ZERO {
        return vec![Decimal::ZERO; weights.len()];
    }

    let mut parts: Vec<Decimal> = weights
        .iter()
        .map(|w| (total * *w / weight_sum).round_dp_with_strategy(dp, RoundingStrategy::ToZero))
        .collect();

    let assigned: Decimal = parts.iter().sum();
    if let Some((heaviest, _)) = weights.iter().enumerate().max_by(|a, b| a.1.cmp(b.1)) {
        parts[heaviest] += total - assigned;
    }

    parts
}
