//! Configuration types for deck analysis.
//!
//! All behaviour is controlled through [`AnalyzerConfig`], built via its
//! [`AnalyzerConfigBuilder`]. Every folder path lives in [`StorageLayout`]
//! and is handed to the stores at construction time, so two analyzers with
//! different layouts can run side by side in one process (the integration
//! tests do exactly that with temp dirs).
//!
//! # Design choice: builder over constructor
//! The builder lets callers set only what they care about and rely on the
//! documented defaults for the rest.

use crate::error::AnalysisError;
use crate::store::Folder;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Model used when neither the caller nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

/// Public endpoint of the Google Cloud Storage JSON API (Firebase Storage
/// buckets are served from it).
pub const DEFAULT_STORAGE_URL: &str = "https://storage.googleapis.com";

/// Local directory names, relative to `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub root: PathBuf,
    pub uploads: String,
    pub analyses: String,
    pub responses: String,
    pub overviews: String,
    pub r2_analysis: String,
    pub r2_response: String,
    /// Decks promoted to Round 2. Default: `r1_successful_pitchdecks`.
    pub successful: String,
    pub tracking: String,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new(".")
    }
}

impl StorageLayout {
    /// Default folder names under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            uploads: "uploads".into(),
            analyses: "analyses".into(),
            responses: "responses".into(),
            overviews: "overviews".into(),
            r2_analysis: "r2_analysis".into(),
            r2_response: "r2_response".into(),
            successful: "r1_successful_pitchdecks".into(),
            tracking: "tracking".into(),
        }
    }

    /// Absolute (or root-relative) directory for `folder`.
    pub fn dir(&self, folder: Folder) -> PathBuf {
        let name = match folder {
            Folder::Uploads => &self.uploads,
            Folder::Analyses => &self.analyses,
            Folder::Responses => &self.responses,
            Folder::Overviews => &self.overviews,
            Folder::R2Analysis => &self.r2_analysis,
            Folder::R2Response => &self.r2_response,
            Folder::SuccessfulPitchdecks => &self.successful,
            Folder::Tracking => &self.tracking,
        };
        self.root.join(name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Where the remote object store lives.
#[derive(Clone)]
pub struct RemoteStoreConfig {
    /// Bucket name, e.g. `my-project.appspot.com`.
    pub bucket: String,
    /// API origin. Default: [`DEFAULT_STORAGE_URL`]. Tests point it at a mock.
    pub base_url: String,
    /// OAuth bearer token sent with every request, if any.
    pub bearer_token: Option<String>,
    /// Per-request timeout in seconds. Default: 60.
    pub timeout_secs: u64,
}

impl RemoteStoreConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            base_url: DEFAULT_STORAGE_URL.to_string(),
            bearer_token: None,
            timeout_secs: 60,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

impl fmt::Debug for RemoteStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStoreConfig")
            .field("bucket", &self.bucket)
            .field("base_url", &self.base_url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Configuration for an [`crate::analyze::Analyzer`].
///
/// Built via [`AnalyzerConfig::builder()`] or [`AnalyzerConfig::default()`].
///
/// # Example
/// ```rust
/// use pitchdeck_classifier::{AnalyzerConfig, RemoteStoreConfig};
///
/// let config = AnalyzerConfig::builder()
///     .data_dir("/var/lib/pitchdeck")
///     .remote(RemoteStoreConfig::new("decks.appspot.com"))
///     .model("gpt-4o")
///     .build()
///     .unwrap();
/// assert!(config.local_save_enabled);
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Local folder layout.
    pub storage: StorageLayout,

    /// Write artifacts to local folders as well as the remote store. Default: true.
    pub local_save_enabled: bool,

    /// Remote object store. `None` keeps everything local.
    pub remote: Option<RemoteStoreConfig>,

    /// LLM model identifier. If None, [`DEFAULT_MODEL`] (or the environment).
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature, clamped to 0.0..=2.0. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens per completion. Default: 4096.
    pub max_tokens: usize,

    /// Merge each Round 1 result into `tracking/<stem>.json`. Default: true.
    pub track_round_one: bool,

    /// Treat an unparseable detailed analysis as a fatal `Parse` error
    /// instead of persisting an empty schema. Default: false.
    pub strict_parsing: bool,

    /// Password for encrypted decks.
    pub pdf_password: Option<String>,

    /// Largest accepted upload, in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            storage: StorageLayout::default(),
            local_save_enabled: true,
            remote: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            track_round_one: true,
            strict_parsing: false,
            pdf_password: None,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("storage", &self.storage)
            .field("local_save_enabled", &self.local_save_enabled)
            .field("remote", &self.remote)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("track_round_one", &self.track_round_one)
            .field("strict_parsing", &self.strict_parsing)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl AnalyzerConfig {
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model actually requested: explicit, else [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    /// Root of the local folder layout; folder names keep their defaults.
    pub fn data_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.storage.root = root.into();
        self
    }

    pub fn storage(mut self, layout: StorageLayout) -> Self {
        self.config.storage = layout;
        self
    }

    pub fn local_save_enabled(mut self, v: bool) -> Self {
        self.config.local_save_enabled = v;
        self
    }

    pub fn remote(mut self, remote: RemoteStoreConfig) -> Self {
        self.config.remote = Some(remote);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn track_round_one(mut self, v: bool) -> Self {
        self.config.track_round_one = v;
        self
    }

    pub fn strict_parsing(mut self, v: bool) -> Self {
        self.config.strict_parsing = v;
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, AnalysisError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        if let Some(remote) = &c.remote {
            if remote.bucket.trim().is_empty() || remote.bucket.contains('/') {
                return Err(AnalysisError::InvalidConfig(format!(
                    "Invalid bucket name '{}'",
                    remote.bucket
                )));
            }
            if !(remote.base_url.starts_with("http://") || remote.base_url.starts_with("https://")) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "Storage URL must be http(s), got '{}'",
                    remote.base_url
                )));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AnalyzerConfig::default();
        assert!(c.local_save_enabled);
        assert!(c.track_round_one);
        assert!(!c.strict_parsing);
        assert_eq!(c.max_tokens, 4096);
        assert_eq!(c.model_or_default(), DEFAULT_MODEL);
        assert_eq!(
            c.storage.dir(Folder::SuccessfulPitchdecks),
            PathBuf::from("./r1_successful_pitchdecks")
        );
    }

    #[test]
    fn temperature_is_clamped() {
        let c = AnalyzerConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
        let c = AnalyzerConfig::builder().temperature(-1.0).build().unwrap();
        assert_eq!(c.temperature, 0.0);
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let err = AnalyzerConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn bad_bucket_rejected() {
        for bucket in ["", "  ", "a/b"] {
            let err = AnalyzerConfig::builder()
                .remote(RemoteStoreConfig::new(bucket))
                .build()
                .unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidConfig(_)), "{bucket:?}");
        }
    }

    #[test]
    fn bad_storage_url_rejected() {
        let err = AnalyzerConfig::builder()
            .remote(RemoteStoreConfig::new("b").base_url("ftp://x"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp://x"));
    }

    #[test]
    fn data_dir_moves_every_folder() {
        let c = AnalyzerConfig::builder().data_dir("/srv/decks").build().unwrap();
        assert_eq!(c.storage.dir(Folder::Uploads), PathBuf::from("/srv/decks/uploads"));
        assert_eq!(c.storage.dir(Folder::Tracking), PathBuf::from("/srv/decks/tracking"));
    }

    #[test]
    fn debug_redacts_token() {
        let remote = RemoteStoreConfig::new("b").bearer_token("secret-token");
        let dbg = format!("{remote:?}");
        assert!(!dbg.contains("secret-token"));
        assert!(dbg.contains("<redacted>"));
    }
}
