use std::fmt;
use std::sync::Arc;

use crate::api::types::VersionInfo;
use crate::api::{Endpoints, HttpResponse, Transport};
use crate::diagnosis::DiagnosisEntry;
use crate::health::{HealthCheck, HealthStatus};
use crate::logging::{log, obj, v_str, ts_epoch_ms, Domain, Level};

/// Conclusion drawn when the health endpoint itself is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkewVerdict {
    /// `/api/version` answers: new backend is up, routes still propagating.
    NewBackend { version: String },
    /// Only the legacy catalog answers: an old deployment is still serving.
    StaleBackend,
    /// Nothing answers.
    Unreachable,
    /// A request failed at the transport level mid-diagnosis.
    CheckFailed(String),
}

impl fmt::Display for SkewVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkewVerdict::NewBackend { version } => write!(f, "new backend {}", version),
            SkewVerdict::StaleBackend => f.write_str("stale backend"),
            SkewVerdict::Unreachable => f.write_str("unreachable"),
            SkewVerdict::CheckFailed(err) => write!(f, "check failed: {}", err),
        }
    }
}

/// Everything one probe pass observed. `entries` holds one line per step, in
/// step order; the caller decides whether to keep them.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub check: HealthCheck,
    pub skew: Option<SkewVerdict>,
    pub entries: Vec<DiagnosisEntry>,
}

/// Single deterministic pass over the health, version and catalog endpoints.
/// Never retries and never propagates transport errors.
pub struct DiagnosticProbe {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
}

impl DiagnosticProbe {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub async fn run(&self) -> ProbeReport {
        let mut entries = Vec::new();
        let check = self.check_health(&mut entries).await;
        let skew = match &check {
            HealthCheck::Responded {
                status: HealthStatus::NotFound,
                ..
            } => Some(self.diagnose_skew(&mut entries).await),
            _ => None,
        };
        ProbeReport {
            check,
            skew,
            entries,
        }
    }

    async fn check_health(&self, entries: &mut Vec<DiagnosisEntry>) -> HealthCheck {
        let url = self.endpoints.status(ts_epoch_ms());
        match self.transport.get(&url).await {
            Ok(resp) => {
                let status = HealthStatus::from_response(&resp);
                entries.push(DiagnosisEntry::now(health_line(&resp, &status)));
                HealthCheck::Responded {
                    http_status: resp.status,
                    status,
                }
            }
            Err(err) => {
                entries.push(DiagnosisEntry::now(format!("Poll Connection Failed: {}", err)));
                HealthCheck::Unreachable(err.to_string())
            }
        }
    }

    async fn diagnose_skew(&self, entries: &mut Vec<DiagnosisEntry>) -> SkewVerdict {
        let verdict = self.skew_steps(entries).await;
        log(
            Level::Info,
            Domain::Probe,
            "skew_verdict",
            obj(&[("verdict", v_str(&verdict.to_string()))]),
        );
        verdict
    }

    async fn skew_steps(&self, entries: &mut Vec<DiagnosisEntry>) -> SkewVerdict {
        let version = match self.transport.get(&self.endpoints.version(ts_epoch_ms())).await {
            Ok(resp) => resp,
            Err(err) => return check_failed(entries, err),
        };
        if version.is_success() {
            let version = serde_json::from_str::<VersionInfo>(&version.body)
                .map(|v| v.version)
                .unwrap_or_else(|_| "unknown".to_string());
            entries.push(DiagnosisEntry::now(format!(
                "New backend detected: {}. Status endpoint should be available momentarily",
                version
            )));
            return SkewVerdict::NewBackend { version };
        }
        entries.push(DiagnosisEntry::now(format!(
            "Version check: HTTP {}",
            version.status
        )));

        let catalog = match self.transport.get(&self.endpoints.catalog(ts_epoch_ms())).await {
            Ok(resp) => resp,
            Err(err) => return check_failed(entries, err),
        };
        if catalog.is_success() {
            entries.push(DiagnosisEntry::now(
                "Diagnosis: old backend detected. The server is online but running old code; waiting for the update to apply",
            ));
            return SkewVerdict::StaleBackend;
        }
        entries.push(DiagnosisEntry::now(format!(
            "Legacy catalog check: HTTP {}",
            catalog.status
        )));

        entries.push(DiagnosisEntry::now(
            "Diagnosis: server might be completely down",
        ));
        SkewVerdict::Unreachable
    }
}

fn check_failed(entries: &mut Vec<DiagnosisEntry>, err: impl fmt::Display) -> SkewVerdict {
    entries.push(DiagnosisEntry::now(format!("Diagnosis check failed: {}", err)));
    SkewVerdict::CheckFailed(err.to_string())
}

fn health_line(resp: &HttpResponse, status: &HealthStatus) -> String {
    match status {
        HealthStatus::NotFound => {
            let mut line = "Status: 404 Not Found".to_string();
            if resp.server.is_some() || resp.date.is_some() {
                line.push_str(&format!(
                    " (server: {}, time: {})",
                    resp.server.as_deref().unwrap_or("-"),
                    resp.date.as_deref().unwrap_or("-")
                ));
            }
            line
        }
        HealthStatus::Initializing { .. } if resp.status == 503 => {
            format!("Status: 503 Service Unavailable ({})", status)
        }
        HealthStatus::Initializing { .. } => "Status: 200 OK (ready: false)".to_string(),
        HealthStatus::Ready => "Status: 200 OK (ready: true)".to_string(),
        HealthStatus::Unknown(200) => "Status: 200 OK (unreadable payload)".to_string(),
        HealthStatus::Unknown(code) => format!("Status: HTTP {}", code),
    }
}
