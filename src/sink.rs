//! The search-store transport collaborator.
//!
//! Each parsed record becomes one document write. The destination is behind
//! [`DocumentSink`]: an HTTP implementation posting to the search store, and
//! a filesystem implementation that persists one file per document for local
//! runs and tests. Request signing is a deployment concern (a fronting proxy
//! or network policy), not part of this transport.

use crate::timefmt;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// The computed destination for one document write.
///
/// Recomputed per document from the wall clock, so documents of one batch
/// that straddles a month boundary may land in different indices. Index
/// routing follows processing time, not the record's own event time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget {
    pub index: String,
    pub doctype: String,
}

impl IndexTarget {
    /// Builds the `<base>-<YYYYMM>` target for `instant` under the configured
    /// offset. `None` only when the offset is out of range, which strict
    /// config validation rules out in practice.
    pub fn for_instant(
        base: &str,
        doctype: &str,
        instant: DateTime<Utc>,
        offset_hours: f64,
    ) -> Option<Self> {
        let month = timefmt::month_key(instant, offset_hours)?;
        Some(Self {
            index: format!("{base}-{month}"),
            doctype: doctype.to_string(),
        })
    }
}

/// Accepts one serialized document for durable storage. An error from any
/// write fails the whole batch.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn write_document(&self, target: &IndexTarget, document: &[u8]) -> Result<()>;
}

/// HTTP document sink: `POST <endpoint>/<index>/<doctype>` with a JSON body.
pub struct HttpDocumentSink {
    client: reqwest::Client,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpDocumentSink {
    pub fn new(
        endpoint: impl Into<String>,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build search store HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            username,
            password,
        })
    }

    fn document_url(&self, target: &IndexTarget) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            target.index,
            target.doctype
        )
    }
}

#[async_trait]
impl DocumentSink for HttpDocumentSink {
    async fn write_document(&self, target: &IndexTarget, document: &[u8]) -> Result<()> {
        let url = self.document_url(target);
        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(document.to_vec());
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("failed to post document to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "search store returned {status} for {url}: {}",
                body_preview(&body)
            );
        }
        Ok(())
    }
}

/// Filesystem document sink: one file per document under
/// `<output_dir>/<index>/<doctype>/`, written to a temp name and renamed so a
/// crash never leaves a half-written document behind.
#[derive(Debug, Clone)]
pub struct FsDocumentSink {
    output_dir: PathBuf,
}

impl FsDocumentSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn sanitize_component(component: &str) -> String {
        component
            .chars()
            .map(|ch| match ch {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => ch,
                _ => '_',
            })
            .collect()
    }

    fn directory_path(&self, target: &IndexTarget) -> PathBuf {
        let index = Self::sanitize_component(&target.index);
        let doctype = Self::sanitize_component(&target.doctype);
        self.output_dir.join(index).join(doctype)
    }
}

#[async_trait]
impl DocumentSink for FsDocumentSink {
    async fn write_document(&self, target: &IndexTarget, document: &[u8]) -> Result<()> {
        if document.is_empty() {
            return Err(anyhow!("cannot write empty document"));
        }

        let directory = self.directory_path(target);
        fs::create_dir_all(&directory)
            .await
            .with_context(|| format!("failed to create directory {}", directory.display()))?;

        let filename = format!("{}.json", Uuid::new_v4());
        let final_path = directory.join(&filename);
        let temp_path = directory.join(format!("{filename}.tmp"));

        fs::write(&temp_path, document)
            .await
            .with_context(|| format!("failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &final_path).await.with_context(|| {
            format!(
                "failed to rename {} to {}",
                temp_path.display(),
                final_path.display()
            )
        })?;

        debug!(
            index = %target.index,
            doctype = %target.doctype,
            output = %final_path.display(),
            "persisted document to local sink"
        );
        Ok(())
    }
}

fn body_preview(body: &str) -> String {
    const LIMIT: usize = 256;
    let mut preview = String::new();
    for (idx, ch) in body.chars().enumerate() {
        if idx >= LIMIT {
            preview.push('…');
            return preview;
        }
        preview.push(ch);
    }
    preview
}
