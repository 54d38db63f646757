use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, DATE, SERVER};
use reqwest::Client;
use url::Url;

use super::{HttpResponse, Transport, TransportError};

/// reqwest-backed transport. A request that exceeds the timeout is reported as
/// `TransportError::Timeout`.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify)?;

        let header = |name: HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let server = header(SERVER);
        let date = header(DATE);
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(classify)?;

        Ok(HttpResponse {
            status,
            body,
            server,
            date,
        })
    }
}
