//! The object-source collaborator.
//!
//! The pipeline only needs a readable byte stream per object reference; where
//! the bytes come from is behind [`ObjectSource`]. Two implementations ship:
//! a path-style HTTP GET against an object-store endpoint, and a local
//! directory tree for tests and offline replays.

use crate::event::ObjectRef;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_stream::StreamExt;
use tokio_util::io::StreamReader;
use tracing::debug;

pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Yields the raw byte stream of one stored object. A failure here is fatal
/// to the whole batch; there is no per-object retry.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    async fn open(&self, object: &ObjectRef) -> Result<ObjectReader>;
}

/// Path-style object-store access: `GET <endpoint>/<bucket>/<key>`, with the
/// response body consumed incrementally as the pipeline pulls.
pub struct HttpObjectSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpObjectSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .context("failed to build object source HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn object_url(&self, object: &ObjectRef) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            encode_path(&object.bucket),
            encode_path(&object.key)
        )
    }
}

#[async_trait]
impl ObjectSource for HttpObjectSource {
    async fn open(&self, object: &ObjectRef) -> Result<ObjectReader> {
        let url = self.object_url(object);
        debug!(bucket = %object.bucket, key = %object.key, %url, "fetching object");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to fetch object {}/{}", object.bucket, object.key))?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "object store returned {status} for {}/{}",
                object.bucket,
                object.key
            );
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));
        Ok(Box::new(StreamReader::new(Box::pin(body))))
    }
}

/// Local tree laid out as `<root>/<bucket>/<key>`, the offline counterpart of
/// the HTTP source.
pub struct FsObjectSource {
    root: PathBuf,
}

impl FsObjectSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectSource for FsObjectSource {
    async fn open(&self, object: &ObjectRef) -> Result<ObjectReader> {
        let path = self.root.join(&object.bucket).join(&object.key);
        let file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("failed to open object file {}", path.display()))?;
        Ok(Box::new(file))
    }
}

/// Percent-encodes one path component for the object URL, keeping `/` so a
/// multi-segment key stays a path. The decoded key may contain spaces and
/// other reserved characters that must not reach the request line raw.
fn encode_path(component: &str) -> String {
    let mut encoded = String::with_capacity(component.len());
    for byte in component.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char);
            }
            other => {
                encoded.push('%');
                encoded.push_str(&format!("{other:02X}"));
            }
        }
    }
    encoded
}
