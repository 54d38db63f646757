//! In-process transport with scripted replies.
//!
//! Replies are queued per URL path (query string ignored). The last reply in a
//! queue is sticky: once the queue is down to one entry it is returned for
//! every further request. Unscripted paths answer 404 with an empty JSON body.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use url::Url;

use super::{HttpResponse, Transport, TransportError};

#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    Raw(u16, String),
    Fail(TransportError),
}

#[derive(Debug, Clone)]
struct Step {
    reply: Reply,
    latency: Duration,
    server: Option<String>,
}

#[derive(Debug, Default)]
struct Script {
    routes: HashMap<String, VecDeque<Step>>,
    requests: Vec<(Instant, Url)>,
    in_flight: usize,
    max_in_flight: HashMap<String, usize>,
    in_flight_by_path: HashMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a reply for `path` (e.g. `/api/status`).
    pub fn push(&self, path: &str, reply: Reply) -> &Self {
        self.push_delayed(path, reply, Duration::ZERO)
    }

    /// Queue a reply that resolves after `latency`.
    pub fn push_delayed(&self, path: &str, reply: Reply, latency: Duration) -> &Self {
        self.push_step(
            path,
            Step {
                reply,
                latency,
                server: None,
            },
        )
    }

    /// Queue a reply carrying a `server` response header.
    pub fn push_with_server(&self, path: &str, reply: Reply, server: &str) -> &Self {
        self.push_step(
            path,
            Step {
                reply,
                latency: Duration::ZERO,
                server: Some(server.to_string()),
            },
        )
    }

    fn push_step(&self, path: &str, step: Step) -> &Self {
        self.script()
            .routes
            .entry(path.to_string())
            .or_default()
            .push_back(step);
        self
    }

    pub fn json(&self, path: &str, status: u16, body: Value) -> &Self {
        self.push(path, Reply::Json(status, body))
    }

    /// Every URL requested so far, in issue order.
    pub fn requests(&self) -> Vec<Url> {
        self.script().requests.iter().map(|(_, u)| u.clone()).collect()
    }

    /// Issue instants of every request to `path`, on the tokio clock.
    pub fn issued_at(&self, path: &str) -> Vec<Instant> {
        self.script()
            .requests
            .iter()
            .filter(|(_, u)| u.path() == path)
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.issued_at(path).len()
    }

    /// Highest number of concurrently outstanding requests seen for `path`.
    pub fn max_in_flight(&self, path: &str) -> usize {
        self.script().max_in_flight.get(path).copied().unwrap_or(0)
    }

    pub fn in_flight(&self) -> usize {
        self.script().in_flight
    }

    fn begin(&self, url: &Url) -> Option<Step> {
        let mut script = self.script();
        let path = url.path().to_string();
        script.requests.push((Instant::now(), url.clone()));
        script.in_flight += 1;
        let now = {
            let n = script.in_flight_by_path.entry(path.clone()).or_insert(0);
            *n += 1;
            *n
        };
        let peak = script.max_in_flight.entry(path.clone()).or_insert(0);
        *peak = (*peak).max(now);

        let queue = script.routes.get_mut(&path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn finish(&self, url: &Url) {
        let mut script = self.script();
        script.in_flight = script.in_flight.saturating_sub(1);
        if let Some(n) = script.in_flight_by_path.get_mut(url.path()) {
            *n = n.saturating_sub(1);
        }
    }
}

struct InFlight<'a> {
    transport: &'a ScriptedTransport,
    url: &'a Url,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.transport.finish(self.url);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        let step = self.begin(url);
        let _guard = InFlight {
            transport: self,
            url,
        };

        let Some(step) = step else {
            return Ok(HttpResponse::new(404, "{}"));
        };
        if !step.latency.is_zero() {
            tokio::time::sleep(step.latency).await;
        }
        let mut resp = match step.reply {
            Reply::Json(status, body) => HttpResponse::new(status, body.to_string()),
            Reply::Raw(status, body) => HttpResponse::new(status, body),
            Reply::Fail(err) => return Err(err),
        };
        resp.server = step.server;
        Ok(resp)
    }
}
