// src/utils/errors.rs

use thiserror::Error;

/// Errors coming from the market-data collaborator (HTTP, JSON, upstream).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("provider error: {0}")]
    Upstream(String),
    #[error("no candles returned for {0}")]
    Empty(String),
}

/// Why an asset was left out of every result bucket.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("market data: {0}")]
    Provider(#[from] ProviderError),
    #[error("empty history")]
    EmptyHistory,
    #[error("insufficient history: {have} candles, need {need}")]
    InsufficientHistory { have: usize, need: usize },
    #[error("reference series unavailable for market filter")]
    ReferenceUnavailable,
    #[error("indicator unavailable: {0}")]
    IndicatorUnavailable(&'static str),
}

impl SkipReason {
    /// Short tag used for metrics labels.
    pub fn tag(&self) -> &'static str {
        match self {
            SkipReason::Provider(_) => "provider",
            SkipReason::EmptyHistory => "empty_history",
            SkipReason::InsufficientHistory { .. } => "insufficient_history",
            SkipReason::ReferenceUnavailable => "reference_unavailable",
            SkipReason::IndicatorUnavailable(_) => "indicator_unavailable",
        }
    }
}
