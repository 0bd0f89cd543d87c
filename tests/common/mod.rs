//! Shared fixtures for the integration tests: a scripted completion client,
//! a text extractor that never touches pdfium, and a temp data directory
//! with a second local folder standing in for the remote bucket.

#![allow(dead_code)]

use async_trait::async_trait;
use pitchdeck_classifier::prompts::{DETAILED_HEADER, OVERVIEW_HEADER};
use pitchdeck_classifier::{
    AnalysisError, Analyzer, AnalyzerConfig, Completion, CompletionClient, LocalStore,
    ObjectStore, PersistenceGateway, PipelineStep, StorageLayout, TextExtractor,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const OVERVIEW_JSON: &str = r#"{"Geography": "Europe", "Industry": "Agricultural Robotics", "Stage": "Pre-Seed", "OverallScore": 7}"#;

pub const ROUND_ONE_JSON: &str = r#"```json
[
  {"Category": "Team", "Criteria": "Does the founding team look complete?", "Score": 8, "Explanation": "CEO and CTO in place."},
  {"Category": "Market", "Criteria": "Is the top-down TAM above €1B?", "Score": 6, "Explanation": "Sizeable but niche."},
  {"Category": "Impact", "Criteria": "(Impact) Suitable for next step?", "Score": 4, "Explanation": "Impact claims are vague."}
]
```"#;

pub const ROUND_TWO_TABLE: &str = "\
| Category | Criteria | Score | Explanation |
|---|---|---|---|
| Team | Completeness: Is the founding team complete? | 5 | No commercial lead yet. |
| Market | Top-Down TAM: Is it above €10B? | 9 | Global weeding market is large. |
";

/// Answers by prompt header; records every step it was asked for.
pub struct ScriptedCompleter {
    overview: Result<String, String>,
    detailed: Result<String, String>,
    steps: Mutex<Vec<PipelineStep>>,
}

impl ScriptedCompleter {
    pub fn new(overview: &str, detailed: &str) -> Arc<Self> {
        Arc::new(Self {
            overview: Ok(overview.to_string()),
            detailed: Ok(detailed.to_string()),
            steps: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_overview(message: &str) -> Arc<Self> {
        Arc::new(Self {
            overview: Err(message.to_string()),
            detailed: Ok(ROUND_ONE_JSON.to_string()),
            steps: Mutex::new(Vec::new()),
        })
    }

    pub fn steps(&self) -> Vec<PipelineStep> {
        self.steps.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompleter {
    async fn complete(
        &self,
        step: PipelineStep,
        _system: &str,
        prompt: &str,
    ) -> Result<Completion, AnalysisError> {
        self.steps.lock().unwrap().push(step);
        let answer = if prompt.starts_with(OVERVIEW_HEADER) {
            &self.overview
        } else if prompt.starts_with(DETAILED_HEADER) {
            &self.detailed
        } else {
            panic!("unexpected prompt: {}", prompt.chars().take(60).collect::<String>());
        };
        match answer {
            Ok(content) => Ok(Completion {
                content: content.clone(),
                prompt_tokens: 1200,
                completion_tokens: 300,
            }),
            Err(message) => Err(AnalysisError::Provider {
                step,
                message: message.clone(),
            }),
        }
    }
}

/// Returns fixed text for any existing file.
pub struct FakeExtractor(pub &'static str);

impl TextExtractor for FakeExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, AnalysisError> {
        if !path.is_file() {
            return Err(AnalysisError::Extraction {
                path: path.to_path_buf(),
                detail: "file vanished".into(),
            });
        }
        Ok(self.0.to_string())
    }
}

/// Temp data root plus an optional "remote" backed by another temp folder.
pub struct Harness {
    pub data: TempDir,
    pub remote_dir: Option<TempDir>,
    pub remote: Option<Arc<LocalStore>>,
    pub completer: Arc<ScriptedCompleter>,
}

impl Harness {
    pub fn local_only(completer: Arc<ScriptedCompleter>) -> Self {
        Self {
            data: tempfile::tempdir().unwrap(),
            remote_dir: None,
            remote: None,
            completer,
        }
    }

    pub fn with_remote(completer: Arc<ScriptedCompleter>) -> Self {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(LocalStore::new(StorageLayout::new(remote_dir.path())));
        Self {
            data: tempfile::tempdir().unwrap(),
            remote_dir: Some(remote_dir),
            remote: Some(remote),
            completer,
        }
    }

    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(self.data.path())
    }

    pub fn analyzer(&self) -> Analyzer {
        self.analyzer_with(|b| b)
    }

    pub fn analyzer_with(
        &self,
        tweak: impl FnOnce(
            pitchdeck_classifier::AnalyzerConfigBuilder,
        ) -> pitchdeck_classifier::AnalyzerConfigBuilder,
    ) -> Analyzer {
        let config = tweak(AnalyzerConfig::builder().data_dir(self.data.path()))
            .build()
            .unwrap();
        let gateway = PersistenceGateway::new(
            Arc::new(LocalStore::new(self.layout())),
            self.remote
                .clone()
                .map(|r| r as Arc<dyn ObjectStore>),
            config.local_save_enabled,
        );
        Analyzer::new(
            config,
            Arc::new(FakeExtractor("ACME Robotics: autonomous weeding for small farms.")),
            self.completer.clone(),
            gateway,
        )
    }

    /// Drop a minimal PDF into a local folder.
    pub fn put_local_pdf(&self, folder: &str, name: &str) {
        let dir = self.data.path().join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), b"%PDF-1.7\n%%EOF\n").unwrap();
    }
}
