//! Persistence: local folders and a remote object store behind one gateway.
//!
//! ## Layout
//!
//! Every object is addressed by a logical [`Folder`] plus a flat file name.
//! Locally a folder is a directory under [`crate::config::StorageLayout`];
//! remotely it is an object-name prefix (`analyses/acme_analysis.json`).
//!
//! ## Independence of targets
//!
//! Every side-effecting gateway call works each target on its own. A failed
//! remote upload never rolls back a local save and vice versa. Writes report
//! both outcomes in a [`PersistOutcome`]; deletes report per-target failures
//! in a [`DeleteReport`] and carry on with the next name.
//!
//! Concurrent requests for the same deck are not coordinated: the last
//! writer wins.

pub mod local;
pub mod remote;

pub use local::LocalStore;
pub use remote::RemoteStore;

use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, PipelineStep};
use crate::output::{DeleteReport, PersistOutcome, TargetStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

// ── Folders ──────────────────────────────────────────────────────────────────

/// Logical storage folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Folder {
    Uploads,
    Analyses,
    Responses,
    Overviews,
    R2Analysis,
    R2Response,
    SuccessfulPitchdecks,
    /// Per-deck tracking documents (Round 1 merge target).
    Tracking,
}

impl Folder {
    /// Folders that hold analysis artifacts.
    pub const ARTIFACTS: [Folder; 5] = [
        Folder::Overviews,
        Folder::Analyses,
        Folder::Responses,
        Folder::R2Analysis,
        Folder::R2Response,
    ];

    /// Remote object-name prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            Folder::Uploads => "uploads",
            Folder::Analyses => "analyses",
            Folder::Responses => "responses",
            Folder::Overviews => "overviews",
            Folder::R2Analysis => "r2_analysis",
            Folder::R2Response => "r2_response",
            Folder::SuccessfulPitchdecks => "successful_pitchdecks",
            Folder::Tracking => "tracking",
        }
    }

    /// Name of the artifact collection in the HTTP API and CLI.
    pub fn collection(&self) -> &'static str {
        match self {
            Folder::R2Analysis => "r2_analyses",
            Folder::R2Response => "r2_responses",
            other => other.prefix(),
        }
    }

    /// Look up an artifact collection by its API name.
    pub fn from_collection(name: &str) -> Option<Folder> {
        Folder::ARTIFACTS
            .into_iter()
            .find(|f| f.collection() == name)
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

// ── Object store seam ────────────────────────────────────────────────────────

/// A flat key-value store keyed by `(folder, name)`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `"local"` or `"remote"`; used in errors and logs.
    fn name(&self) -> &'static str;

    async fn put(
        &self,
        folder: Folder,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AnalysisError>;

    /// `Ok(None)` when the object does not exist.
    async fn get(&self, folder: Folder, name: &str) -> Result<Option<Vec<u8>>, AnalysisError>;

    async fn exists(&self, folder: Folder, name: &str) -> Result<bool, AnalysisError>;

    /// `Ok(false)` when there was nothing to delete.
    async fn delete(&self, folder: Folder, name: &str) -> Result<bool, AnalysisError>;

    /// Object names in `folder`, sorted.
    async fn list(&self, folder: Folder) -> Result<Vec<String>, AnalysisError>;
}

/// Reject names that could escape their folder.
pub fn validate_name(name: &str) -> Result<&str, AnalysisError> {
    if name.trim().is_empty() {
        return Err(AnalysisError::InvalidRequest("filename is required".into()));
    }
    if name.contains(['/', '\\', '\0']) || name.contains("..") {
        return Err(AnalysisError::InvalidRequest(format!(
            "invalid object name '{name}'"
        )));
    }
    Ok(name)
}

pub(crate) fn persistence_err(
    target: &str,
    folder: Folder,
    name: &str,
    detail: impl fmt::Display,
) -> AnalysisError {
    AnalysisError::Persistence {
        target: target.to_string(),
        key: format!("{}/{}", folder.prefix(), name),
        detail: detail.to_string(),
    }
}

// ── Artifact naming ──────────────────────────────────────────────────────────

/// One persisted variant of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Analysis,
    Response,
    Overview,
    R2Analysis,
    R2Response,
}

impl ArtifactKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Analysis => "analysis",
            ArtifactKind::Response => "response",
            ArtifactKind::Overview => "overview",
            ArtifactKind::R2Analysis => "r2_analysis",
            ArtifactKind::R2Response => "r2_response",
        }
    }

    pub fn folder(&self) -> Folder {
        match self {
            ArtifactKind::Analysis => Folder::Analyses,
            ArtifactKind::Response => Folder::Responses,
            ArtifactKind::Overview => Folder::Overviews,
            ArtifactKind::R2Analysis => Folder::R2Analysis,
            ArtifactKind::R2Response => Folder::R2Response,
        }
    }
}

/// Source filename without its extension.
pub fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

/// `<stem>_<suffix>.json`.
pub fn artifact_name(filename: &str, kind: ArtifactKind) -> String {
    format!("{}_{}.json", file_stem(filename), kind.suffix())
}

/// `<stem>.json` in the tracking folder.
pub fn tracking_name(filename: &str) -> String {
    format!("{}.json", file_stem(filename))
}

// ── Sync check ───────────────────────────────────────────────────────────────

/// Local and remote contents of one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSync {
    pub folder: Folder,
    pub local: Vec<String>,
    pub remote: Vec<String>,
    pub only_local: Vec<String>,
    pub only_remote: Vec<String>,
}

impl FolderSync {
    pub fn in_sync(&self) -> bool {
        self.only_local.is_empty() && self.only_remote.is_empty()
    }
}

/// Per-folder comparison of the two targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub remote_configured: bool,
    pub folders: Vec<FolderSync>,
}

impl SyncReport {
    pub fn in_sync(&self) -> bool {
        self.folders.iter().all(FolderSync::in_sync)
    }
}

// ── Gateway ──────────────────────────────────────────────────────────────────

/// Local store (always present) plus an optional remote store.
#[derive(Clone)]
pub struct PersistenceGateway {
    local: Arc<dyn ObjectStore>,
    remote: Option<Arc<dyn ObjectStore>>,
    local_save_enabled: bool,
}

impl fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("local", &self.local.name())
            .field("remote", &self.remote.as_ref().map(|r| r.name()))
            .field("local_save_enabled", &self.local_save_enabled)
            .finish()
    }
}

impl PersistenceGateway {
    pub fn new(
        local: Arc<dyn ObjectStore>,
        remote: Option<Arc<dyn ObjectStore>>,
        local_save_enabled: bool,
    ) -> Self {
        Self {
            local,
            remote,
            local_save_enabled,
        }
    }

    /// Build the stores described by `config`.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, AnalysisError> {
        let local: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(config.storage.clone()));
        let remote = match &config.remote {
            Some(remote) => Some(Arc::new(RemoteStore::new(remote.clone())?) as Arc<dyn ObjectStore>),
            None => None,
        };
        Ok(Self::new(local, remote, config.local_save_enabled))
    }

    pub fn local(&self) -> &Arc<dyn ObjectStore> {
        &self.local
    }

    pub fn remote(&self) -> Option<&Arc<dyn ObjectStore>> {
        self.remote.as_ref()
    }

    pub fn local_save_enabled(&self) -> bool {
        self.local_save_enabled
    }

    /// Write one JSON artifact to every enabled target.
    ///
    /// Never fails: per-target failures are logged and reported in the outcome.
    pub async fn persist_json(&self, folder: Folder, name: &str, value: &Value) -> PersistOutcome {
        let bytes = match serde_json::to_vec_pretty(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                let failed = TargetStatus::Failed {
                    reason: e.to_string(),
                };
                return PersistOutcome {
                    folder,
                    name: name.to_string(),
                    local: failed.clone(),
                    remote: failed,
                };
            }
        };

        let local = if self.local_save_enabled {
            Self::put_one(self.local.as_ref(), folder, name, bytes.clone(), "application/json").await
        } else {
            TargetStatus::Skipped
        };
        let remote = match &self.remote {
            Some(store) => Self::put_one(store.as_ref(), folder, name, bytes, "application/json").await,
            None => TargetStatus::Skipped,
        };

        PersistOutcome {
            folder,
            name: name.to_string(),
            local,
            remote,
        }
    }

    async fn put_one(
        store: &dyn ObjectStore,
        folder: Folder,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> TargetStatus {
        match store.put(folder, name, bytes, content_type).await {
            Ok(()) => {
                debug!(target_store = store.name(), %folder, name, "saved");
                TargetStatus::Saved
            }
            Err(e) => {
                warn!(target_store = store.name(), %folder, name, "save failed: {e}");
                TargetStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Copy raw bytes to the local folder and the remote, if configured.
    ///
    /// The local-save toggle does not apply: decks always land locally.
    /// Never fails; the caller decides whether a partial write is enough.
    pub async fn put_everywhere(
        &self,
        folder: Folder,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> PersistOutcome {
        let local = Self::put_one(self.local.as_ref(), folder, name, bytes.clone(), content_type).await;
        let remote = match &self.remote {
            Some(store) => Self::put_one(store.as_ref(), folder, name, bytes, content_type).await,
            None => TargetStatus::Skipped,
        };
        PersistOutcome {
            folder,
            name: name.to_string(),
            local,
            remote,
        }
    }

    /// Fetch an object, local first, then remote.
    pub async fn read(&self, folder: Folder, name: &str) -> Result<Vec<u8>, AnalysisError> {
        validate_name(name)?;
        if let Some(bytes) = self.local.get(folder, name).await? {
            return Ok(bytes);
        }
        if let Some(remote) = &self.remote {
            if let Some(bytes) = remote.get(folder, name).await? {
                return Ok(bytes);
            }
        }
        Err(AnalysisError::NotFound {
            what: format!("{}/{}", folder.prefix(), name),
        })
    }

    /// Fetch an object and parse it as JSON.
    pub async fn read_json(&self, folder: Folder, name: &str) -> Result<Value, AnalysisError> {
        let bytes = self.read(folder, name).await?;
        serde_json::from_slice(&bytes).map_err(|e| AnalysisError::Parse {
            step: PipelineStep::Respond,
            detail: format!("{}/{} is not valid JSON: {e}", folder.prefix(), name),
        })
    }

    /// Sorted union of local and remote names.
    pub async fn list(&self, folder: Folder) -> Result<Vec<String>, AnalysisError> {
        let mut names: BTreeSet<String> = self.local.list(folder).await?.into_iter().collect();
        if let Some(remote) = &self.remote {
            names.extend(remote.list(folder).await?);
        }
        Ok(names.into_iter().collect())
    }

    /// Delete from both targets.
    ///
    /// A target that fails is reported, not fatal, as long as the other one
    /// removed the object. With nothing removed the result is the first
    /// target error, or `NotFound` when neither target held the object.
    pub async fn delete(&self, folder: Folder, name: &str) -> Result<DeleteReport, AnalysisError> {
        validate_name(name)?;
        let mut report = DeleteReport::default();
        let mut first_err = None;
        for store in self.targets() {
            match store.delete(folder, name).await {
                Ok(true) => {
                    if report.deleted.is_empty() {
                        report.deleted.push(name.to_string());
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(target_store = store.name(), %folder, name, "delete failed: {e}");
                    report.failures.push(format!("{} {}/{}: {e}", store.name(), folder.prefix(), name));
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        if !report.deleted.is_empty() {
            return Ok(report);
        }
        Err(first_err.unwrap_or_else(|| AnalysisError::NotFound {
            what: format!("{}/{}", folder.prefix(), name),
        }))
    }

    /// Delete every object in `folder` on both targets.
    ///
    /// Only listing is fatal. A name that fails on one target is reported and
    /// the sweep moves on.
    pub async fn delete_all(&self, folder: Folder) -> Result<DeleteReport, AnalysisError> {
        let names = self.list(folder).await?;
        let mut report = DeleteReport::default();
        for name in &names {
            match self.delete(folder, name).await {
                Ok(one) => {
                    report.deleted.extend(one.deleted);
                    report.failures.extend(one.failures);
                }
                // Gone between list and delete.
                Err(AnalysisError::NotFound { .. }) => {}
                Err(e) => report.failures.push(e.to_string()),
            }
        }
        if !report.failures.is_empty() {
            warn!(%folder, failed = report.failures.len(), "delete_all left objects behind");
        }
        Ok(report)
    }

    fn targets(&self) -> impl Iterator<Item = &Arc<dyn ObjectStore>> {
        std::iter::once(&self.local).chain(self.remote.as_ref())
    }

    /// Overlay `patch` onto the JSON object stored at `(folder, name)`.
    ///
    /// Keys not in `patch` are preserved. A missing or non-object document
    /// starts empty.
    pub async fn merge_document(
        &self,
        folder: Folder,
        name: &str,
        patch: Map<String, Value>,
    ) -> PersistOutcome {
        let mut doc = match self.read_json(folder, name).await {
            Ok(Value::Object(existing)) => existing,
            Ok(_) | Err(AnalysisError::NotFound { .. }) => Map::new(),
            Err(e) => {
                warn!(%folder, name, "could not read existing document, starting fresh: {e}");
                Map::new()
            }
        };
        doc.extend(patch);
        self.persist_json(folder, name, &Value::Object(doc)).await
    }

    /// Compare local and remote contents of every artifact folder.
    pub async fn sync_check(&self) -> Result<SyncReport, AnalysisError> {
        let mut folders = Vec::with_capacity(Folder::ARTIFACTS.len());
        for folder in Folder::ARTIFACTS {
            let local = self.local.list(folder).await?;
            let remote = match &self.remote {
                Some(store) => store.list(folder).await?,
                None => Vec::new(),
            };
            let local_set: BTreeSet<&String> = local.iter().collect();
            let remote_set: BTreeSet<&String> = remote.iter().collect();
            let only_local = local_set.difference(&remote_set).map(|s| s.to_string()).collect();
            let only_remote = remote_set.difference(&local_set).map(|s| s.to_string()).collect();
            folders.push(FolderSync {
                folder,
                local,
                remote,
                only_local,
                only_remote,
            });
        }
        Ok(SyncReport {
            remote_configured: self.remote.is_some(),
            folders,
        })
    }
}
