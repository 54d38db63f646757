use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::vertical::VerticalId;

pub mod http;
pub mod scripted;
pub mod types;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Other(String),
}

/// A fully-read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub server: Option<String>,
    pub date: Option<String>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            server: None,
            date: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// GET-only transport seam. Implementations must not retry; retry cadence is
/// owned by the status poller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError>;
}

/// URL builder for the backend API rooted at a configurable origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    origin: Url,
}

impl Endpoints {
    pub fn new(origin: &str) -> Result<Self, TransportError> {
        let trimmed = origin.trim().trim_end_matches('/');
        let origin = Url::parse(&format!("{}/", trimmed))
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", origin, e)))?;
        if origin.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(origin.to_string()));
        }
        Ok(Self { origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn preview(&self, vertical: VerticalId) -> Url {
        self.path(&format!("api/preview/{}", vertical))
    }

    pub fn files(&self, vertical: VerticalId) -> Url {
        self.path(&format!("api/files/{}", vertical))
    }

    pub fn predict(&self, vertical: VerticalId) -> Url {
        self.path(&format!("api/predict/{}", vertical))
    }

    /// Health endpoint with a cache-busting nonce.
    pub fn status(&self, nonce: u64) -> Url {
        busted(self.path("api/status"), nonce)
    }

    pub fn version(&self, nonce: u64) -> Url {
        busted(self.path("api/version"), nonce)
    }

    /// Legacy catalog endpoint served by pre-2.x backends.
    pub fn catalog(&self, nonce: u64) -> Url {
        busted(self.path("api/catalog"), nonce)
    }

    /// Plain download link. Rejects names that could escape the data directory.
    pub fn download(&self, filename: &str) -> Option<Url> {
        if filename.is_empty()
            || filename.contains("..")
            || filename.contains('/')
            || filename.contains('\\')
        {
            return None;
        }
        let mut url = self.path("api/download/");
        url.path_segments_mut().ok()?.pop_if_empty().push(filename);
        Some(url)
    }

    fn path(&self, rel: &str) -> Url {
        let mut url = self.origin.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/{}", base, rel));
        url
    }
}

fn busted(mut url: Url, nonce: u64) -> Url {
    url.query_pairs_mut().append_pair("t", &nonce.to_string());
    url
}
