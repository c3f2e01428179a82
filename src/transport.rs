//! Artifact transport.
//!
//! The resolver never talks to the network directly; it goes through a
//! [`Transport`], so tests can script failures and count calls. The
//! production implementation, [`HttpTransport`], streams downloads with
//! `reqwest` and reads `file://` locators from disk.

use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::io::IsTerminal;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Upper bound on the buffer reserved from a server's `Content-Length`.
/// Larger bodies still download; the buffer grows as chunks arrive.
const MAX_PREALLOCATION: u64 = 64 << 20;

/// Errors a transport can report. All of them are considered transient by
/// the resolver and retried up to its bound.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("failed to read {url}: {reason}")]
    Io { url: String, reason: String },
}

/// The transport collaborator: `fetch(URI) -> bytes | TransportError`.
pub trait Transport: Send + Sync {
    fn fetch(&self, locator: &Url) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// HTTP(S) and `file://` transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    show_progress: bool,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(format!("steep/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            show_progress: false,
        })
    }

    /// Draw a progress bar on stderr while downloading, when it is a TTY.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled && std::io::stderr().is_terminal();
        self
    }

    async fn fetch_http(&self, locator: &Url) -> Result<Vec<u8>, TransportError> {
        let url = locator.to_string();
        let mut response = self
            .client
            .get(locator.clone())
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let pb = self.progress_bar(locator, response.content_length());
        let reserve = response
            .content_length()
            .map_or(0, |len| len.min(MAX_PREALLOCATION));
        let mut bytes = Vec::with_capacity(reserve as usize);
        while let Some(chunk) = response.chunk().await.map_err(|e| classify(&url, e))? {
            bytes.extend_from_slice(&chunk);
            if let Some(pb) = &pb {
                pb.set_position(bytes.len() as u64);
            }
        }
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        Ok(bytes)
    }

    fn progress_bar(&self, locator: &Url, total: Option<u64>) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(total.unwrap_or(0));
        let style = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .ok()?
            .progress_chars("#>-");
        pb.set_style(style);
        let name = locator
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("artifact")
            .to_string();
        pb.set_message(format!("⬇ {name}"));
        Some(pb)
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, locator: &Url) -> Result<Vec<u8>, TransportError> {
        match locator.scheme() {
            "file" => {
                let path = locator.to_file_path().map_err(|_| TransportError::Io {
                    url: locator.to_string(),
                    reason: "not a local path".to_string(),
                })?;
                tokio::fs::read(&path).await.map_err(|e| TransportError::Io {
                    url: locator.to_string(),
                    reason: e.to_string(),
                })
            }
            _ => self.fetch_http(locator).await,
        }
    }
}

fn classify(url: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = err.status() {
        TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        TransportError::Connection {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
