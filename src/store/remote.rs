//! Remote object store over the Google Cloud Storage JSON API.
//!
//! Firebase Storage buckets are plain GCS buckets, so the same five calls
//! cover everything:
//!
//! | Operation | Request                                                   |
//! |-----------|-----------------------------------------------------------|
//! | put       | `POST /upload/storage/v1/b/{bucket}/o?uploadType=media&name=…` |
//! | get       | `GET /storage/v1/b/{bucket}/o/{object}?alt=media`         |
//! | exists    | `GET /storage/v1/b/{bucket}/o/{object}` (metadata)        |
//! | delete    | `DELETE /storage/v1/b/{bucket}/o/{object}`                |
//! | list      | `GET /storage/v1/b/{bucket}/o?prefix=…&pageToken=…`       |
//!
//! Object names are `<folder prefix>/<name>`, percent-encoded as one path
//! segment (`analyses%2Facme_analysis.json`).

use super::{persistence_err, validate_name, Folder, ObjectStore};
use crate::config::RemoteStoreConfig;
use crate::error::AnalysisError;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// [`ObjectStore`] backed by a GCS / Firebase Storage bucket.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    config: RemoteStoreConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ObjectMeta>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
}

impl RemoteStore {
    pub fn new(config: RemoteStoreConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    fn object_name(folder: Folder, name: &str) -> Result<String, AnalysisError> {
        Ok(format!("{}/{}", folder.prefix(), validate_name(name)?))
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn object_url(&self, object: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base(),
            urlencoding::encode(&self.config.bucket),
            urlencoding::encode(object)
        )
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl ObjectStore for RemoteStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn put(
        &self,
        folder: Folder,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AnalysisError> {
        let object = Self::object_name(folder, name)?;
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.base(),
            urlencoding::encode(&self.config.bucket)
        );
        let resp = self
            .authed(self.client.post(&url))
            .query(&[("uploadType", "media"), ("name", object.as_str())])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| persistence_err("remote", folder, name, e))?;

        if !resp.status().is_success() {
            return Err(persistence_err(
                "remote",
                folder,
                name,
                format!("HTTP {}", resp.status()),
            ));
        }
        debug!("Uploaded gs://{}/{}", self.config.bucket, object);
        Ok(())
    }

    async fn get(&self, folder: Folder, name: &str) -> Result<Option<Vec<u8>>, AnalysisError> {
        let object = Self::object_name(folder, name)?;
        let resp = self
            .authed(self.client.get(self.object_url(&object)))
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| persistence_err("remote", folder, name, e))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| persistence_err("remote", folder, name, e))?;
                Ok(Some(bytes.to_vec()))
            }
            s => Err(persistence_err("remote", folder, name, format!("HTTP {s}"))),
        }
    }

    async fn exists(&self, folder: Folder, name: &str) -> Result<bool, AnalysisError> {
        let object = Self::object_name(folder, name)?;
        let resp = self
            .authed(self.client.get(self.object_url(&object)))
            .send()
            .await
            .map_err(|e| persistence_err("remote", folder, name, e))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(persistence_err("remote", folder, name, format!("HTTP {s}"))),
        }
    }

    async fn delete(&self, folder: Folder, name: &str) -> Result<bool, AnalysisError> {
        let object = Self::object_name(folder, name)?;
        let resp = self
            .authed(self.client.delete(self.object_url(&object)))
            .send()
            .await
            .map_err(|e| persistence_err("remote", folder, name, e))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(persistence_err("remote", folder, name, format!("HTTP {s}"))),
        }
    }

    async fn list(&self, folder: Folder) -> Result<Vec<String>, AnalysisError> {
        let prefix = format!("{}/", folder.prefix());
        let url = format!(
            "{}/storage/v1/b/{}/o",
            self.base(),
            urlencoding::encode(&self.config.bucket)
        );

        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .authed(self.client.get(&url))
                .query(&[("prefix", prefix.as_str())]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| persistence_err("remote", folder, "", e))?;
            if !resp.status().is_success() {
                return Err(persistence_err(
                    "remote",
                    folder,
                    "",
                    format!("HTTP {}", resp.status()),
                ));
            }
            let page: ListPage = resp
                .json()
                .await
                .map_err(|e| persistence_err("remote", folder, "", e))?;

            names.extend(page.items.into_iter().filter_map(|item| {
                let rest = item.name.strip_prefix(&prefix)?;
                (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        names.sort();
        Ok(names)
    }
}
