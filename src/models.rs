use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sport types recognised by the training load model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SportType {
    Running,
    TrailRunning,
    Hiking,
    Walking,
    Cycling,
    Swimming,
    Strength,
    Yoga,
    CrossTraining,
    Other,
}

impl SportType {
    /// Foot-based sports share the distance + climbing load formula
    pub fn is_foot_based(&self) -> bool {
        matches!(
            self,
            SportType::Running | SportType::TrailRunning | SportType::Hiking | SportType::Walking
        )
    }
}

/// Completed activity as delivered by activity import. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Unique identifier for the activity
    pub id: String,

    /// Calendar day the activity took place
    pub date: NaiveDate,

    /// Distance covered in kilometres
    pub distance_km: Decimal,

    /// Elevation gain in metres
    pub elevation_gain_m: Decimal,

    /// Elevation loss in metres
    pub elevation_loss_m: Decimal,

    /// Moving duration in seconds
    pub duration_seconds: u32,

    /// Precomputed training stress score, overrides the sport formula when present
    pub stress_score: Option<Decimal>,

    /// Sport/activity type; `None` is treated as running
    pub sport: Option<SportType>,

    /// Race this activity was recorded for, if any
    pub linked_race_id: Option<String>,
}

/// Athlete experience level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
    Elite,
}

impl ExperienceLevel {
    pub fn is_advanced_or_above(&self) -> bool {
        *self >= ExperienceLevel::Advanced
    }
}

/// Athlete profile consumed by plan generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfile {
    /// Unique athlete identifier
    pub id: String,

    /// Athlete's display name
    pub name: String,

    /// Training experience
    pub experience_level: ExperienceLevel,

    /// Current weekly running volume in kilometres
    pub current_weekly_volume_km: Decimal,

    /// Longest recent run in kilometres
    pub longest_run_km: Decimal,

    /// Age in years
    pub age: Option<u8>,

    /// Weight in kilograms
    pub weight_kg: Option<Decimal>,

    /// Resting heart rate
    pub resting_hr: Option<u16>,

    /// Maximum heart rate
    pub max_hr: Option<u16>,
}

/// Race priority; A races are season goals, B and C races are tune-ups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RacePriority {
    A,
    B,
    C,
}

/// Course difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerrainDifficulty {
    Road,
    Trail,
    Technical,
    Mountain,
}

/// Aid station or timing point along a race course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub distance_km: Decimal,
    pub elevation_m: Option<Decimal>,
}

/// Race record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    pub distance_km: Decimal,
    pub elevation_gain_m: Decimal,
    pub elevation_loss_m: Decimal,
    pub priority: RacePriority,
    pub terrain: TerrainDifficulty,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
}

impl Race {
    /// Metres of climbing per kilometre, zero for a flat or zero-length course
    pub fn gain_per_km(&self) -> Decimal {
        if self.distance_km <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            self.elevation_gain_m / self.distance_km
        }
    }
}

/// Periodization phase. Ordering follows the primary timeline
/// (base < build < peak < taper); race and recovery are override phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Base,
    Build,
    Peak,
    Taper,
    Race,
    Recovery,
}

impl Phase {
    pub fn is_override(&self) -> bool {
        matches!(self, Phase::Race | Phase::Recovery)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Base => "Base",
            Phase::Build => "Build",
            Phase::Peak => "Peak",
            Phase::Taper => "Taper",
            Phase::Race => "Race",
            Phase::Recovery => "Recovery",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Session types used in generated weeks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    Rest,
    Recovery,
    Easy,
    Tempo,
    Intervals,
    LongRun,
    VerticalGain,
    BackToBack,
    CrossTraining,
    Race,
}

impl SessionType {
    pub fn is_rest(&self) -> bool {
        matches!(self, SessionType::Rest)
    }

    /// Key sessions are worth rescheduling when missed
    pub fn is_key(&self) -> bool {
        matches!(
            self,
            SessionType::Tempo
                | SessionType::Intervals
                | SessionType::LongRun
                | SessionType::VerticalGain
                | SessionType::BackToBack
        )
    }

    /// Quality work that can be recovered by converting an easy day
    pub fn is_quality(&self) -> bool {
        matches!(self, SessionType::Intervals | SessionType::Tempo)
    }

    pub fn is_easy(&self) -> bool {
        matches!(self, SessionType::Recovery | SessionType::Easy)
    }

    /// Sessions that carry running distance
    pub fn carries_distance(&self) -> bool {
        !matches!(self, SessionType::Rest | SessionType::CrossTraining)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionType::Rest => "Rest",
            SessionType::Recovery => "Recovery",
            SessionType::Easy => "Easy",
            SessionType::Tempo => "Tempo",
            SessionType::Intervals => "Intervals",
            SessionType::LongRun => "Long Run",
            SessionType::VerticalGain => "Vertical Gain",
            SessionType::BackToBack => "Back-to-Back",
            SessionType::CrossTraining => "Cross Training",
            SessionType::Race => "Race",
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Planned effort level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Intensity {
    Recovery,
    Easy,
    Moderate,
    Hard,
    Max,
}

impl Intensity {
    pub fn is_hard(&self) -> bool {
        matches!(self, Intensity::Hard | Intensity::Max)
    }

    /// Heart-rate zone (1-5) targeted by this effort
    pub fn heart_rate_zone(&self) -> u8 {
        match self {
            Intensity::Recovery => 1,
            Intensity::Easy => 2,
            Intensity::Moderate => 3,
            Intensity::Hard => 4,
            Intensity::Max => 5,
        }
    }
}

/// A single planned day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSession {
    pub id: String,
    pub date: NaiveDate,
    pub session_type: SessionType,
    pub planned_distance_km: Decimal,
    pub planned_elevation_m: Decimal,
    pub planned_duration_seconds: u32,
    pub intensity: Intensity,
    pub description: String,
    pub nutrition_notes: Option<String>,
    pub completed: bool,
    pub skipped: bool,
    pub linked_activity_id: Option<String>,
    pub target_heart_rate_zone: Option<u8>,
}

impl TrainingSession {
    pub fn is_rest(&self) -> bool {
        self.session_type.is_rest()
    }

    /// Completed, skipped, or linked to a recorded activity
    pub fn has_progress(&self) -> bool {
        self.completed || self.skipped || self.linked_activity_id.is_some()
    }

    /// Past, not completed, not skipped, and not a rest day
    pub fn is_missed(&self, today: NaiveDate) -> bool {
        self.date < today && !self.completed && !self.skipped && !self.is_rest()
    }

    /// Still ahead of the athlete (today counts as available)
    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        self.date >= today
    }
}

/// Monday-to-Sunday block of seven sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingWeek {
    pub id: String,
    pub week_number: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub phase: Phase,
    pub is_recovery_week: bool,
    pub target_volume_km: Decimal,
    pub target_elevation_m: Decimal,
    pub sessions: Vec<TrainingSession>,
}

impl TrainingWeek {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn non_rest_sessions(&self) -> impl Iterator<Item = &TrainingSession> {
        self.sessions.iter().filter(|s| !s.is_rest())
    }

    /// Fraction of non-rest sessions completed; `None` for an all-rest week
    pub fn completion_rate(&self) -> Option<Decimal> {
        let total = self.non_rest_sessions().count();
        if total == 0 {
            return None;
        }
        let completed = self.non_rest_sessions().filter(|s| s.completed).count();
        Some(Decimal::from(completed) / Decimal::from(total))
    }

    /// Sum of planned session distances
    pub fn planned_distance_km(&self) -> Decimal {
        self.sessions.iter().map(|s| s.planned_distance_km).sum()
    }

    /// Day offset (0 = Monday) of a date inside this week
    pub fn day_offset(&self, date: NaiveDate) -> Option<u32> {
        if self.contains(date) {
            Some((date - self.start_date).num_days() as u32)
        } else {
            None
        }
    }
}

/// Date and priority of an intermediate race as seen when the plan was generated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntermediateRaceSnapshot {
    pub race_id: String,
    pub date: NaiveDate,
    pub priority: RacePriority,
}

impl From<&Race> for IntermediateRaceSnapshot {
    fn from(race: &Race) -> Self {
        IntermediateRaceSnapshot {
            race_id: race.id.clone(),
            date: race.date,
            priority: race.priority,
        }
    }
}

/// Complete periodized plan for one target race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlan {
    pub id: String,
    pub athlete_id: String,
    pub target_race_id: String,
    pub created_at: DateTime<Utc>,
    pub weeks: Vec<TrainingWeek>,
    pub intermediate_race_ids: Vec<String>,
    pub intermediate_race_snapshots: Vec<IntermediateRaceSnapshot>,
}

impl TrainingPlan {
    /// Index of the week containing `date`
    pub fn week_index_for(&self, date: NaiveDate) -> Option<usize> {
        self.weeks.iter().position(|w| w.contains(date))
    }

    pub fn sessions(&self) -> impl Iterator<Item = &TrainingSession> {
        self.weeks.iter().flat_map(|w| w.sessions.iter())
    }

    pub fn find_session(&self, session_id: &str) -> Option<&TrainingSession> {
        self.sessions().find(|s| s.id == session_id)
    }

    pub fn find_session_mut(&mut self, session_id: &str) -> Option<&mut TrainingSession> {
        self.weeks
            .iter_mut()
            .flat_map(|w| w.sessions.iter_mut())
            .find(|s| s.id == session_id)
    }

    pub fn total_distance_km(&self) -> Decimal {
        self.weeks.iter().map(|w| w.target_volume_km).sum()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.weeks.first().map(|w| w.start_date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.weeks.last().map(|w| w.end_date)
    }

    /// Completion rate of non-rest sessions dated before `today`
    pub fn completion_rate(&self, today: NaiveDate) -> Option<Decimal> {
        let past: Vec<_> = self
            .sessions()
            .filter(|s| !s.is_rest() && s.date < today)
            .collect();
        if past.is_empty() {
            return None;
        }
        let completed = past.iter().filter(|s| s.completed).count();
        Some(Decimal::from(completed) / Decimal::from(past.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn session(date: NaiveDate, session_type: SessionType) -> TrainingSession {
        TrainingSession {
            id: format!("s-{}", date),
            date,
            session_type,
            planned_distance_km: if session_type.is_rest() { dec!(0) } else { dec!(8) },
            planned_elevation_m: dec!(0),
            planned_duration_seconds: 0,
            intensity: Intensity::Easy,
            description: String::new(),
            nutrition_notes: None,
            completed: false,
            skipped: false,
            linked_activity_id: None,
            target_heart_rate_zone: None,
        }
    }

    #[test]
    fn test_phase_ordering() {
        assert!(Phase::Base < Phase::Build);
        assert!(Phase::Build < Phase::Peak);
        assert!(Phase::Peak < Phase::Taper);
        assert!(Phase::Race.is_override());
        assert!(!Phase::Taper.is_override());
    }

    #[test]
    fn test_session_type_classification() {
        assert!(SessionType::LongRun.is_key());
        assert!(!SessionType::Recovery.is_key());
        assert!(SessionType::Tempo.is_quality());
        assert!(!SessionType::LongRun.is_quality());
        assert!(!SessionType::CrossTraining.carries_distance());
        assert!(!SessionType::Rest.carries_distance());
    }

    #[test]
    fn test_missed_session_definition() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 6, 11).unwrap();

        let mut run = session(yesterday, SessionType::Easy);
        assert!(run.is_missed(today));

        run.skipped = true;
        assert!(!run.is_missed(today));

        let rest = session(yesterday, SessionType::Rest);
        assert!(!rest.is_missed(today));

        let today_run = session(today, SessionType::Tempo);
        assert!(!today_run.is_missed(today));
        assert!(today_run.is_upcoming(today));
    }

    #[test]
    fn test_race_gain_per_km() {
        let race = Race {
            id: "utmb".to_string(),
            name: "Mountain 50K".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            distance_km: dec!(50),
            elevation_gain_m: dec!(2500),
            elevation_loss_m: dec!(2500),
            priority: RacePriority::A,
            terrain: TerrainDifficulty::Mountain,
            checkpoints: Vec::new(),
        };
        assert_eq!(race.gain_per_km(), dec!(50));

        let flat = Race {
            distance_km: dec!(0),
            ..race
        };
        assert_eq!(flat.gain_per_km(), Decimal::ZERO);
    }

    #[test]
    fn test_week_completion_rate() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let mut sessions: Vec<TrainingSession> = (0..7)
            .map(|d| {
                let t = if d == 0 || d == 4 {
                    SessionType::Rest
                } else {
                    SessionType::Easy
                };
                session(start + chrono::Duration::days(d), t)
            })
            .collect();
        sessions[1].completed = true;

        let week = TrainingWeek {
            id: "w1".to_string(),
            week_number: 1,
            start_date: start,
            end_date: start + chrono::Duration::days(6),
            phase: Phase::Base,
            is_recovery_week: false,
            target_volume_km: dec!(40),
            target_elevation_m: dec!(0),
            sessions,
        };

        assert_eq!(week.completion_rate(), Some(dec!(0.2)));
        assert_eq!(week.day_offset(start + chrono::Duration::days(3)), Some(3));
        assert_eq!(week.day_offset(start + chrono::Duration::days(7)), None);
    }

    #[test]
    fn test_session_type_serialization() {
        let json = serde_json::to_string(&SessionType::LongRun).unwrap();
        assert_eq!(json, "\"LongRun\"");
        let back: SessionType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SessionType::LongRun);
    }
}
