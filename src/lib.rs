//! # pitchdeck-classifier
//!
//! Score startup pitch decks against a fixed investment rubric using a
//! Large Language Model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF (local uploads/ or remote bucket)
//!  │
//!  ├─ 1. Input     resolve a local file or stage a downloaded copy
//!  ├─ 2. Extract   page text via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Overview  one completion → Geography / Industry / Stage / score  (Round 1)
//!  ├─ 4. Score     one completion → per-criterion scores for the round's rubric
//!  ├─ 5. Parse     fenced payload → JSON, else markdown table, else empty
//!  └─ 6. Persist   local folder + remote bucket, per-target outcome
//! ```
//!
//! Round 1 uses five categories (Team, Market Opportunity, Product,
//! Traction, Business Model). Round 2 is a deeper pass over decks that were
//! promoted to `r1_successful_pitchdecks/` and skips the overview.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pitchdeck_classifier::{Analyzer, AnalyzerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from EDGEQUAKE_LLM_PROVIDER / OPENAI_API_KEY / …
//!     let config = AnalyzerConfig::builder().data_dir("./data").build()?;
//!     let analyzer = Analyzer::from_config(config)?;
//!     let outcome = analyzer.analyze_round_one("acme.pdf").await?;
//!     println!("{}", outcome.detailed_analysis.to_markdown_table());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | via cli | HTTP API (axum) |
//! | `cli`    | on      | Enables the `pitchdeck` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pitchdeck-classifier = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod schema;
#[cfg(feature = "server")]
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::Analyzer;
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder, RemoteStoreConfig, StorageLayout};
pub use error::{AnalysisError, ParseMiss, PipelineStep};
pub use output::{
    AnalysisOutcome, AnalysisStats, CategoryBucket, CopyReport, CriterionEntry, DeleteReport,
    DetailedAnalysis, Overview, PersistOutcome, RawResponses, TargetStatus, NOT_MENTIONED,
};
pub use pipeline::detailed::{parse_detailed_analysis, try_parse_detailed_analysis};
pub use pipeline::extract::{PdfiumTextExtractor, TextExtractor};
pub use pipeline::llm::{Completion, CompletionClient, ProviderClient};
pub use pipeline::normalize::extract_payload;
pub use pipeline::overview::{parse_overview, try_parse_overview};
pub use schema::{Round, ScoringSchema, UNCATEGORIZED};
pub use store::{Folder, LocalStore, ObjectStore, PersistenceGateway, RemoteStore, SyncReport};
