//! Core types for Clauseguard

pub mod config;
pub mod error;
pub mod types;

pub use config::AnalyzerConfig;
pub use error::{Error, Result};
