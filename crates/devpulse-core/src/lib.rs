//! Core types, configuration, and error handling for devpulse.
//!
//! This crate provides the shared foundation used by all other devpulse crates:
//! - [`DevpulseError`]: unified error type using `thiserror`
//! - [`DevpulseConfig`]: configuration loaded from `.devpulse.toml`
//! - Data model: [`CommitRecord`], [`ChurnTotals`], [`RiskFlag`],
//!   [`ChurnPoint`], [`ForecastOutcome`], [`ReviewPair`], [`RenderedImage`]
//! - Collaborator traits in [`services`]

mod config;
mod error;
pub mod services;
mod types;

pub use config::{
    DevpulseConfig, ForecastConfig, GitHubConfig, HistoryMode, LlmConfig, ScheduleConfig,
    SlackConfig, MAX_INTERVAL_MINUTES, MAX_SYNTHETIC_PERIODS,
};
pub use error::DevpulseError;
pub use types::{
    ChurnAnalysis, ChurnPoint, ChurnTotals, CommitRecord, Forecast, ForecastMethod,
    ForecastOutcome, OutputFormat, PipelineStage, RenderedImage, ReviewPair, RiskFlag,
    UNATTRIBUTED_AUTHOR,
};

/// A convenience `Result` type for devpulse operations.
pub type Result<T> = std::result::Result<T, DevpulseError>;
