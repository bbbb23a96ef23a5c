// Library interface for peakplan
// Integration tests, benches and the CLI all go through these modules

pub mod adaptation;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod planning;
pub mod training_load;

// Re-export commonly used types for convenience
pub use models::*;
pub use adaptation::{
    AdaptationConfig, MissedSessionRedistributor, PlanAdjustmentCalculator,
    PlanAutoAdjustmentService, PlanProgressPreserver, Severity,
};
pub use config::EngineConfig;
pub use error::{PlanError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use planning::{PlanRequest, PlanningConfig, TrainingPlanGenerator};
pub use training_load::{FitnessSnapshot, TrainingLoadConfig, TrainingLoadModel};
