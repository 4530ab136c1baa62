use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Demand insight shown next to a forecast.
///
/// `score` is the projected units for the first forecast month and
/// `confidence` the in-sample accuracy scaled to `[0, 1]`. `metadata` carries
/// the monthly projection and the lag weights used. Reading history to build
/// one never writes stock or ledger rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResult {
    pub score: f64,
    pub confidence: f64,
    /// One-line summary of the horizon, blend and accuracy.
    pub explanation: Option<String>,
    pub metadata: JsonValue,
}

impl AiResult {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self {
            score,
            confidence,
            explanation: None,
            metadata: JsonValue::Null,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Why a forecast could not be produced.
#[derive(Debug, Error)]
pub enum AiError {
    /// No sales at all for the product, or a horizon outside `1..=24`.
    #[error("invalid forecast input: {0}")]
    InvalidInput(String),

    /// Sales exist but cover too few months for the lag-12 term.
    #[error("not enough history: {months} month(s), at least {required} required")]
    InsufficientHistory { months: usize, required: usize },

    /// Calendar arithmetic ran past chrono's supported range.
    #[error("internal error: {0}")]
    Internal(String),
}
