//! Error types for Clauseguard
//!
//! Failures local to one clause must never abort analysis of its siblings.
//! The only fatal input condition is an empty clause list — an empty report
//! must never be produced silently.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no clauses to analyze")]
    EmptyInput,

    #[error("transient failure from {service}: {message}")]
    Transient { service: String, message: String },

    #[error("malformed response from {service}: {message}")]
    MalformedResponse { service: String, message: String },

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("analysis budget exceeded: spent ${spent_usd:.4} of ${budget_usd:.4}")]
    BudgetExceeded { spent_usd: f64, budget_usd: f64 },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn malformed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether this failure is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::CacheUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::transient("embedding", "503").is_transient());
        assert!(Error::CacheUnavailable("redis down".into()).is_transient());

        assert!(!Error::malformed("stage1", "bad json").is_transient());
        assert!(!Error::EmptyInput.is_transient());
        assert!(!Error::BudgetExceeded { spent_usd: 0.03, budget_usd: 0.02 }.is_transient());
        assert!(!Error::Config("bad knob".into()).is_transient());
    }

    #[test]
    fn messages_carry_the_service_name() {
        let err = Error::transient("similarity-store", "connection reset");
        assert_eq!(
            err.to_string(),
            "transient failure from similarity-store: connection reset"
        );

        let err = Error::malformed("stage2", "missing confidence field");
        assert!(err.to_string().contains("stage2"));
    }
}
