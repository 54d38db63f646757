use std::fmt;

use crate::api::types::StatusPayload;
use crate::api::HttpResponse;

/// Decoded `/api/status` result. Each poll produces a fresh value; nothing
/// carries over from the previous tick.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    NotFound,
    Initializing {
        progress: u8,
        step: Option<String>,
        logs: Vec<String>,
    },
    Ready,
    Unknown(u16),
}

impl HealthStatus {
    pub fn from_response(resp: &HttpResponse) -> Self {
        match resp.status {
            404 => HealthStatus::NotFound,
            503 => {
                let payload = serde_json::from_str::<StatusPayload>(&resp.body).unwrap_or_default();
                initializing(payload)
            }
            200 => match serde_json::from_str::<StatusPayload>(&resp.body) {
                Ok(payload) if payload.ready => HealthStatus::Ready,
                Ok(payload) => initializing(payload),
                Err(_) => HealthStatus::Unknown(200),
            },
            other => HealthStatus::Unknown(other),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, HealthStatus::Ready)
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::NotFound => "not_found",
            HealthStatus::Initializing { .. } => "initializing",
            HealthStatus::Ready => "ready",
            HealthStatus::Unknown(_) => "unknown",
        }
    }
}

fn initializing(payload: StatusPayload) -> HealthStatus {
    let progress = payload
        .progress
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 100.0).round() as u8)
        .unwrap_or(0);
    HealthStatus::Initializing {
        progress,
        step: payload.step,
        logs: payload.logs.unwrap_or_default(),
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::NotFound => f.write_str("404 Not Found"),
            HealthStatus::Initializing { progress, step, .. } => match step {
                Some(step) => write!(f, "initializing {}% ({})", progress, step),
                None => write!(f, "initializing {}%", progress),
            },
            HealthStatus::Ready => f.write_str("ready"),
            HealthStatus::Unknown(status) => write!(f, "HTTP {}", status),
        }
    }
}

/// Result of one health request: either the server answered, or it did not.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthCheck {
    Responded { http_status: u16, status: HealthStatus },
    Unreachable(String),
}

impl HealthCheck {
    pub fn status(&self) -> Option<&HealthStatus> {
        match self {
            HealthCheck::Responded { status, .. } => Some(status),
            HealthCheck::Unreachable(_) => None,
        }
    }

    /// The server is live and reporting progress: 200 with `ready = false`.
    pub fn is_live_not_ready(&self) -> bool {
        matches!(
            self,
            HealthCheck::Responded {
                http_status: 200,
                status: HealthStatus::Initializing { .. },
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(status: u16, body: &str) -> HealthStatus {
        HealthStatus::from_response(&HttpResponse::new(status, body))
    }

    #[test]
    fn decodes_each_status_class() {
        assert_eq!(decode(404, ""), HealthStatus::NotFound);
        assert_eq!(decode(200, r#"{"ready": true}"#), HealthStatus::Ready);
        assert_eq!(decode(500, "oops"), HealthStatus::Unknown(500));
        assert_eq!(decode(200, "<html>"), HealthStatus::Unknown(200));
    }

    #[test]
    fn decodes_progress_payload() {
        let status = decode(
            503,
            r#"{"ready": false, "progress": 40, "step": "loading models", "logs": ["a", "b"]}"#,
        );
        assert_eq!(
            status,
            HealthStatus::Initializing {
                progress: 40,
                step: Some("loading models".to_string()),
                logs: vec!["a".to_string(), "b".to_string()],
            }
        );
        assert_eq!(status.to_string(), "initializing 40% (loading models)");
    }

    #[test]
    fn progress_is_clamped() {
        let HealthStatus::Initializing { progress, .. } = decode(200, r#"{"ready": false, "progress": 140.2}"#) else {
            panic!("expected initializing");
        };
        assert_eq!(progress, 100);
        let HealthStatus::Initializing { progress, .. } = decode(503, "not json") else {
            panic!("expected initializing");
        };
        assert_eq!(progress, 0);
    }

    #[test]
    fn live_not_ready_only_for_200() {
        let live = HealthCheck::Responded {
            http_status: 200,
            status: decode(200, r#"{"ready": false}"#),
        };
        let warming = HealthCheck::Responded {
            http_status: 503,
            status: decode(503, "{}"),
        };
        assert!(live.is_live_not_ready());
        assert!(!warming.is_live_not_ready());
        assert!(!HealthCheck::Unreachable("down".into()).is_live_not_ready());
    }
}
