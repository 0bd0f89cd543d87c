//! Error types for the pitchdeck-classifier library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnalysisError`]: **Fatal**: the analysis request cannot proceed
//!   (source deck missing, text extraction failed, provider unreachable).
//!   Returned as `Err(AnalysisError)` from the [`crate::analyze::Analyzer`]
//!   entry points and mapped to an HTTP status by the server.
//!
//! * [`ParseMiss`]: **Non-fatal**: the model answered, but the answer did
//!   not match any supported shape. The parser falls back to sentinel values
//!   and the miss is stored in [`crate::output::AnalysisOutcome::misses`] so
//!   callers still receive (and persist) a well-formed record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One step of the per-request analysis state machine.
///
/// Steps run strictly in declaration order; a failure in any of them ends the
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    FetchPdf,
    ExtractText,
    RequestOverview,
    ParseOverview,
    RequestDetailedAnalysis,
    ParseDetailedAnalysis,
    PersistLocal,
    PersistRemote,
    Respond,
}

impl PipelineStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::FetchPdf => "fetch_pdf",
            PipelineStep::ExtractText => "extract_text",
            PipelineStep::RequestOverview => "request_overview",
            PipelineStep::ParseOverview => "parse_overview",
            PipelineStep::RequestDetailedAnalysis => "request_detailed_analysis",
            PipelineStep::ParseDetailedAnalysis => "parse_detailed_analysis",
            PipelineStep::PersistLocal => "persist_local",
            PipelineStep::PersistRemote => "persist_remote",
            PipelineStep::Respond => "respond",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All fatal errors returned by the pitchdeck-classifier library.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A source deck or stored artifact does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The source deck could not be fetched from the remote store.
    #[error("Failed to download '{key}': {reason}")]
    DownloadFailed { key: String, reason: String },

    /// The request itself is unusable (missing filename, unsafe object name, …).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDF text extraction failed or produced no text.
    #[error("Text extraction failed for '{path}': {detail}")]
    Extraction { path: PathBuf, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The completion request failed (transport, quota, timeout).
    #[error("LLM request failed during {step}: {message}")]
    Provider { step: PipelineStep, message: String },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// The response matched no supported shape and the caller asked for
    /// strict parsing, or a stored artifact is not valid JSON.
    #[error("Could not parse response during {step}: {detail}")]
    Parse { step: PipelineStep, detail: String },

    // ── Persistence errors ────────────────────────────────────────────────
    /// A local or remote write/read/delete failed.
    #[error("{target} storage failed for '{key}': {detail}")]
    Persistence {
        target: String,
        key: String,
        detail: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// The pipeline step this error belongs to, when it belongs to one.
    pub fn step(&self) -> Option<PipelineStep> {
        match self {
            AnalysisError::NotFound { .. } | AnalysisError::DownloadFailed { .. } => {
                Some(PipelineStep::FetchPdf)
            }
            AnalysisError::Extraction { .. } => Some(PipelineStep::ExtractText),
            AnalysisError::Provider { step, .. } | AnalysisError::Parse { step, .. } => Some(*step),
            AnalysisError::Persistence { target, .. } => Some(if target == "remote" {
                PipelineStep::PersistRemote
            } else {
                PipelineStep::PersistLocal
            }),
            AnalysisError::InvalidRequest(_)
            | AnalysisError::ProviderNotConfigured { .. }
            | AnalysisError::InvalidConfig(_)
            | AnalysisError::Internal(_) => None,
        }
    }
}

/// A response that matched none of the supported shapes.
///
/// Never fatal on its own: the parser substitutes sentinel values and the
/// request carries on. `excerpt` holds the first characters of the offending
/// response for the logs.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseMiss {
    /// Neither the JSON nor the labeled-text overview shape matched.
    #[error("overview matched no known shape (starts with {excerpt:?})")]
    Overview { excerpt: String },

    /// Neither the JSON-array nor the pipe-table shape matched.
    #[error("detailed analysis matched no known shape (starts with {excerpt:?})")]
    DetailedAnalysis { excerpt: String },
}

impl ParseMiss {
    pub(crate) fn overview(raw: &str) -> Self {
        ParseMiss::Overview {
            excerpt: excerpt(raw),
        }
    }

    pub(crate) fn detailed_analysis(raw: &str) -> Self {
        ParseMiss::DetailedAnalysis {
            excerpt: excerpt(raw),
        }
    }
}

const EXCERPT_CHARS: usize = 80;

fn excerpt(raw: &str) -> String {
    raw.trim().chars().take(EXCERPT_CHARS).collect()
}
