//! Unified error hierarchy for peakplan
//!
//! Only two conditions are actively rejected by the planning core: a race that is
//! too close to build a plan for, and an estimation request without any usable
//! history. Everything else degrades to documented fallbacks.

use thiserror::Error;

/// Top-level error type for all peakplan operations
#[derive(Debug, Error)]
pub enum PlanError {
    /// Race is closer than the minimum generation window
    #[error("Insufficient lead time: {weeks_available} week(s) available, at least {minimum_weeks} required")]
    InsufficientLeadTime {
        weeks_available: i64,
        minimum_weeks: u32,
    },

    /// Not enough history for an estimation
    #[error("Insufficient data for {calculation}: {reason}")]
    InsufficientData { calculation: String, reason: String },

    /// Input values that cannot describe a real athlete or race
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failure reported by an external collaborator (repository, generation port)
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for peakplan operations
pub type Result<T> = std::result::Result<T, PlanError>;

impl PlanError {
    /// Shorthand for an insufficient-data error
    pub fn insufficient_data(calculation: impl Into<String>, reason: impl Into<String>) -> Self {
        PlanError::InsufficientData {
            calculation: calculation.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlanError::Collaborator(_) | PlanError::Io(_))
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlanError::InsufficientLeadTime { .. } => ErrorSeverity::Warning,
            PlanError::InsufficientData { .. } => ErrorSeverity::Warning,
            PlanError::InvalidInput(_) => ErrorSeverity::Warning,
            PlanError::Collaborator(_) => ErrorSeverity::Error,
            PlanError::Configuration(_) => ErrorSeverity::Error,
            PlanError::Io(_) | PlanError::Serialization(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PlanError::InsufficientLeadTime {
                weeks_available,
                minimum_weeks,
            } => format!(
                "Your race is only {} week(s) away. A training plan needs at least {} weeks of preparation.",
                (*weeks_available).max(0),
                minimum_weeks
            ),
            PlanError::InsufficientData { calculation, .. } => format!(
                "Not enough activity history to calculate {}. Record a few activities and try again.",
                calculation
            ),
            PlanError::Collaborator(_) => {
                "A required service is unavailable. Please try again later.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
