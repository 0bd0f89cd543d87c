//! Analysis orchestration: one deck in, one scored record out.
//!
//! ## Step order
//!
//! ```text
//! FetchPdf → ExtractText → RequestOverview → ParseOverview
//!          → RequestDetailedAnalysis → ParseDetailedAnalysis
//!          → PersistLocal → PersistRemote → Respond
//! ```
//!
//! Steps run strictly in sequence with no retry. Fetch, extraction and
//! provider failures end the request with an [`AnalysisError`] naming the
//! step. Parse misses fall back to sentinel values (unless
//! [`AnalyzerConfig::strict_parsing`] is set) and persistence failures are
//! reported per target in the outcome; neither aborts the request.
//!
//! Round 2 skips the two overview steps.

use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, PipelineStep};
use crate::output::{
    AnalysisOutcome, AnalysisStats, CopyReport, DetailedAnalysis, Overview, PersistOutcome,
    RawResponses,
};
use crate::pipeline::extract::{self, PdfiumTextExtractor, TextExtractor};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::llm::{Completion, CompletionClient, ProviderClient};
use crate::pipeline::{detailed, overview};
use crate::prompts::{self, SYSTEM_PROMPT};
use crate::schema::{Round, ScoringSchema};
use crate::store::{
    artifact_name, persistence_err, tracking_name, validate_name, ArtifactKind, Folder,
    ObjectStore, PersistenceGateway,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Runs analyses against one configuration, one set of collaborators and
/// one persistence gateway. Cheap to share behind an `Arc`.
pub struct Analyzer {
    config: AnalyzerConfig,
    extractor: Arc<dyn TextExtractor>,
    completer: Arc<dyn CompletionClient>,
    gateway: PersistenceGateway,
}

impl Analyzer {
    pub fn new(
        config: AnalyzerConfig,
        extractor: Arc<dyn TextExtractor>,
        completer: Arc<dyn CompletionClient>,
        gateway: PersistenceGateway,
    ) -> Self {
        Self {
            config,
            extractor,
            completer,
            gateway,
        }
    }

    /// Production wiring: pdfium, the resolved LLM provider and the stores
    /// described by `config`.
    pub fn from_config(config: AnalyzerConfig) -> Result<Self, AnalysisError> {
        let extractor = Arc::new(PdfiumTextExtractor::new(config.pdf_password.clone()));
        let completer = Arc::new(ProviderClient::from_config(&config)?);
        let gateway = PersistenceGateway::from_config(&config)?;
        Ok(Self::new(config, extractor, completer, gateway))
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    // ── Entry points ─────────────────────────────────────────────────────

    /// Round 1 over a deck in the local uploads folder.
    pub async fn analyze_round_one(&self, filename: &str) -> Result<AnalysisOutcome, AnalysisError> {
        let start = Instant::now();
        validate_name(filename)?;
        info!(filename, "Starting round 1 analysis");
        let path = self.config.storage.dir(Folder::Uploads).join(filename);
        let input = input::resolve_local(&path, &format!("upload '{filename}'"))?;
        self.run(filename, Round::One, input, start).await
    }

    /// Round 1 over a deck in the remote `uploads/` folder.
    pub async fn analyze_round_one_remote(
        &self,
        filename: &str,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let start = Instant::now();
        validate_name(filename)?;
        info!(filename, "Starting round 1 analysis (remote upload)");
        let input = self.fetch_remote(Folder::Uploads, filename).await?;
        self.run(filename, Round::One, input, start).await
    }

    /// Round 2 over a deck promoted to the successful folder.
    ///
    /// Read from the remote store when one is configured, otherwise (or when
    /// the remote copy is missing but a local one exists) from the local
    /// successful folder.
    pub async fn analyze_round_two(&self, filename: &str) -> Result<AnalysisOutcome, AnalysisError> {
        let start = Instant::now();
        validate_name(filename)?;
        info!(filename, "Starting round 2 analysis");

        let local_path = self
            .config
            .storage
            .dir(Folder::SuccessfulPitchdecks)
            .join(filename);
        let input = if self.gateway.remote().is_some() {
            match self.fetch_remote(Folder::SuccessfulPitchdecks, filename).await {
                Err(AnalysisError::DownloadFailed { .. }) if local_path.is_file() => {
                    warn!(filename, "Remote copy unavailable, using local successful folder");
                    input::resolve_local(&local_path, filename)?
                }
                other => other?,
            }
        } else {
            input::resolve_local(&local_path, &format!("successful pitch deck '{filename}'"))?
        };
        self.run(filename, Round::Two, input, start).await
    }

    async fn fetch_remote(
        &self,
        folder: Folder,
        filename: &str,
    ) -> Result<ResolvedInput, AnalysisError> {
        let key = format!("{}/{}", folder.prefix(), filename);
        let remote = self.gateway.remote().ok_or_else(|| AnalysisError::DownloadFailed {
            key: key.clone(),
            reason: "no remote store configured".into(),
        })?;
        let bytes = remote
            .get(folder, filename)
            .await
            .map_err(|e| AnalysisError::DownloadFailed {
                key: key.clone(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| AnalysisError::DownloadFailed {
                key,
                reason: "object does not exist".into(),
            })?;
        input::stage_bytes(filename, &bytes).await
    }

    // ── Pipeline ─────────────────────────────────────────────────────────

    async fn run(
        &self,
        filename: &str,
        round: Round,
        input: ResolvedInput,
        start: Instant,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let schema = ScoringSchema::for_round(round);

        let extracted =
            extract::extract_text(Arc::clone(&self.extractor), input.path().to_path_buf()).await;
        // Staged decks are deleted here, before any provider call.
        drop(input);
        let text = extracted?;

        let mut stats = AnalysisStats {
            extracted_chars: text.chars().count(),
            ..Default::default()
        };
        let mut misses = Vec::new();

        let (overview, raw_overview) = if round.requests_overview() {
            let completion = self
                .complete(PipelineStep::RequestOverview, &prompts::overview_prompt(&text), &mut stats)
                .await?;
            let overview = match overview::try_parse_overview(&completion.content) {
                Ok(overview) => overview,
                Err(miss) => {
                    warn!(filename, "{miss}; using default overview");
                    misses.push(miss);
                    Overview::default()
                }
            };
            (Some(overview), Some(completion.content))
        } else {
            (None, None)
        };

        let completion = self
            .complete(
                PipelineStep::RequestDetailedAnalysis,
                &prompts::detailed_prompt(&schema, &text),
                &mut stats,
            )
            .await?;
        let (detailed_analysis, dropped_rows) =
            match detailed::try_parse_detailed_analysis(&completion.content, &schema) {
                Ok(parse) => {
                    if parse.dropped_rows > 0 {
                        warn!(filename, dropped = parse.dropped_rows, "Dropped malformed analysis rows");
                    }
                    (parse.analysis, parse.dropped_rows)
                }
                Err(miss) if self.config.strict_parsing => {
                    return Err(AnalysisError::Parse {
                        step: PipelineStep::ParseDetailedAnalysis,
                        detail: miss.to_string(),
                    });
                }
                Err(miss) => {
                    warn!(filename, "{miss}; using empty analysis");
                    misses.push(miss);
                    (DetailedAnalysis::for_schema(&schema), 0)
                }
            };

        let raw = RawResponses {
            overview: raw_overview,
            detailed_analysis: completion.content,
        };

        let persistence = self
            .persist(filename, round, overview.as_ref(), &detailed_analysis, &raw)
            .await?;

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            filename,
            %round,
            entries = detailed_analysis.total_entries(),
            misses = misses.len(),
            duration_ms = stats.duration_ms,
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            filename: filename.to_string(),
            round,
            overview,
            detailed_analysis,
            raw,
            misses,
            dropped_rows,
            persistence,
            stats,
        })
    }

    async fn complete(
        &self,
        step: PipelineStep,
        prompt: &str,
        stats: &mut AnalysisStats,
    ) -> Result<Completion, AnalysisError> {
        let completion = self.completer.complete(step, SYSTEM_PROMPT, prompt).await?;
        stats.input_tokens += completion.prompt_tokens;
        stats.output_tokens += completion.completion_tokens;
        Ok(completion)
    }

    /// Write every artifact of one analysis. Only serialisation can fail
    /// here; store failures are reported per target.
    async fn persist(
        &self,
        filename: &str,
        round: Round,
        overview: Option<&Overview>,
        analysis: &DetailedAnalysis,
        raw: &RawResponses,
    ) -> Result<Vec<PersistOutcome>, AnalysisError> {
        let to_value = |v: Result<Value, serde_json::Error>| {
            v.map_err(|e| AnalysisError::Internal(format!("Failed to serialise artifact: {e}")))
        };
        let analysis_value = to_value(serde_json::to_value(analysis))?;
        let raw_value = to_value(serde_json::to_value(raw))?;

        let mut artifacts: Vec<(ArtifactKind, Value)> = Vec::with_capacity(3);
        match round {
            Round::One => {
                artifacts.push((ArtifactKind::Analysis, analysis_value));
                if let Some(overview) = overview {
                    artifacts.push((ArtifactKind::Overview, json!({ "Overview": overview })));
                }
                artifacts.push((ArtifactKind::Response, raw_value));
            }
            Round::Two => {
                artifacts.push((ArtifactKind::R2Analysis, analysis_value));
                artifacts.push((ArtifactKind::R2Response, raw_value));
            }
        }

        let mut outcomes = Vec::with_capacity(artifacts.len() + 1);
        for (kind, value) in &artifacts {
            let name = artifact_name(filename, *kind);
            outcomes.push(self.gateway.persist_json(kind.folder(), &name, value).await);
        }

        if round == Round::One && self.config.track_round_one {
            let mut patch = Map::new();
            patch.insert("filename".into(), json!(filename));
            if let Some(overview) = overview {
                patch.insert("overview".into(), to_value(serde_json::to_value(overview))?);
            }
            for (kind, _) in &artifacts {
                patch.insert(
                    format!("{}_file", kind.suffix()),
                    json!(artifact_name(filename, *kind)),
                );
            }
            outcomes.push(
                self.gateway
                    .merge_document(Folder::Tracking, &tracking_name(filename), patch)
                    .await,
            );
        }

        Ok(outcomes)
    }

    // ── Deck management ──────────────────────────────────────────────────

    /// Store an uploaded deck locally and mirror it remotely.
    ///
    /// Succeeds when at least one target holds the deck; a failed mirror is
    /// reported in the returned outcome.
    pub async fn save_upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<PersistOutcome, AnalysisError> {
        validate_name(filename)?;
        if !input::looks_like_pdf(&bytes) {
            return Err(AnalysisError::InvalidRequest(format!(
                "'{filename}' is not a PDF"
            )));
        }
        info!(filename, bytes = bytes.len(), "Saving upload");
        let outcome = self
            .gateway
            .put_everywhere(Folder::Uploads, filename, bytes, "application/pdf")
            .await;
        if outcome.saved_anywhere() {
            Ok(outcome)
        } else {
            let reason = outcome.failure().unwrap_or("no target accepted the deck");
            Err(persistence_err("local", Folder::Uploads, filename, reason))
        }
    }

    /// Decks in the local uploads folder.
    pub async fn list_uploads(&self) -> Result<Vec<String>, AnalysisError> {
        self.gateway.local().list(Folder::Uploads).await
    }

    /// Raw bytes of a local upload.
    pub async fn read_upload(&self, filename: &str) -> Result<Vec<u8>, AnalysisError> {
        self.gateway
            .local()
            .get(Folder::Uploads, validate_name(filename)?)
            .await?
            .ok_or_else(|| AnalysisError::NotFound {
                what: format!("upload '{filename}'"),
            })
    }

    /// Promote decks from uploads to the successful folder.
    ///
    /// Names with no matching upload are skipped with a warning. A deck that
    /// cannot be read or stored anywhere lands in `failed` and the batch
    /// carries on.
    pub async fn copy_successful(&self, filenames: &[String]) -> Result<CopyReport, AnalysisError> {
        if filenames.is_empty() {
            return Err(AnalysisError::InvalidRequest("no filenames provided".into()));
        }
        for filename in filenames {
            validate_name(filename)?;
        }
        let mut report = CopyReport::default();
        for filename in filenames {
            let bytes = match self.gateway.local().get(Folder::Uploads, filename).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    warn!(filename = %filename, "No upload to copy, skipping");
                    report.skipped.push(filename.clone());
                    continue;
                }
                Err(e) => {
                    warn!(filename = %filename, "Could not read upload: {e}");
                    report.failed.push(filename.clone());
                    continue;
                }
            };
            let outcome = self
                .gateway
                .put_everywhere(Folder::SuccessfulPitchdecks, filename, bytes, "application/pdf")
                .await;
            if outcome.saved_anywhere() {
                report.copied.push(filename.clone());
            } else {
                report.failed.push(filename.clone());
            }
            report.persistence.push(outcome);
        }
        info!(
            copied = report.copied.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Copied successful pitch decks"
        );
        Ok(report)
    }

    /// PDF names in the successful folder (local and remote).
    pub async fn list_successful(&self) -> Result<Vec<String>, AnalysisError> {
        Ok(self
            .gateway
            .list(Folder::SuccessfulPitchdecks)
            .await?
            .into_iter()
            .filter(|name| name.to_ascii_lowercase().ends_with(".pdf"))
            .collect())
    }
}
