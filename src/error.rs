//! Error types for the Device Categorizer
//!
//! Classification itself is total and never fails. Errors only come from the
//! collaborators around it: device sources, report sinks, rule table loading
//! and the optional CPU lookup enrichment.

use thiserror::Error;

/// Unified error type for the categorizer
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Rule Table Errors
    // =========================================================================
    #[error("Invalid pattern in rule '{rule}': {pattern} - {reason}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        reason: String,
    },

    #[error("Invalid rule table: {0}")]
    InvalidRuleTable(String),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("Device source unavailable: {source_name} - {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("Report sink failed: {sink} - {reason}")]
    SinkFailed { sink: String, reason: String },

    #[error("CPU lookup failed for '{cpu}': {reason}")]
    EnrichmentFailed { cpu: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the pipeline does when a collaborator fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Log and continue without the failed piece (record, sink or enrichment)
    Degrade,
    /// Stop the run and surface the error
    Abort,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            Error::SourceUnavailable { .. }
            | Error::SinkFailed { .. }
            | Error::EnrichmentFailed { .. }
            | Error::Http(_)
            | Error::Csv(_)
            | Error::Io(_) => ErrorAction::Degrade,

            Error::Configuration(_)
            | Error::InvalidPattern { .. }
            | Error::InvalidRuleTable(_)
            | Error::YamlParse(_)
            | Error::JsonParse(_)
            | Error::Internal(_) => ErrorAction::Abort,
        }
    }

    /// Check if this error came from an external collaborator
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self.action(), ErrorAction::Degrade)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::SourceUnavailable { .. } | Error::EnrichmentFailed { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for the categorizer
pub type Result<T> = std::result::Result<T, Error>;
