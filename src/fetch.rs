use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::api::types::{embedded_error, FileDescriptor, FileList, Prediction, PreviewRecord};
use crate::api::{Endpoints, Transport, TransportError};
use crate::logging::log_fetch_outcome;
use crate::vertical::VerticalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Preview,
    Files,
    Predict,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Preview => "preview",
            Resource::Files => "files",
            Resource::Predict => "predict",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a bundle could not be assembled. Variants are listed in priority order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    #[error("{resource}: {error}")]
    Transport {
        resource: Resource,
        error: TransportError,
    },
    #[error("{resource}: response is not JSON ({detail})")]
    InvalidBody { resource: Resource, detail: String },
    #[error("{resource}: {message}")]
    Embedded { resource: Resource, message: String },
    #[error("{resource}: HTTP {status}")]
    HttpStatus { resource: Resource, status: u16 },
    #[error("{resource}: malformed payload ({detail})")]
    Malformed { resource: Resource, detail: String },
}

impl FailureReason {
    /// Transport-level failure, as opposed to an application-level one.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FailureReason::Transport { .. } | FailureReason::InvalidBody { .. }
        )
    }

    pub fn resource(&self) -> Resource {
        match self {
            FailureReason::Transport { resource, .. }
            | FailureReason::InvalidBody { resource, .. }
            | FailureReason::Embedded { resource, .. }
            | FailureReason::HttpStatus { resource, .. }
            | FailureReason::Malformed { resource, .. } => *resource,
        }
    }

    /// Diagnosis line recorded when the panel degrades to polling.
    pub fn diagnosis_line(&self) -> String {
        if self.is_transport() {
            format!("Fetch Error: {}", self)
        } else {
            format!("API Error: {}", self)
        }
    }
}

/// Joined result of one vertical's three fetches. Replaced wholesale on re-fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBundle {
    pub vertical: VerticalId,
    pub preview: PreviewRecord,
    pub files: Vec<FileDescriptor>,
    pub prediction: Prediction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(ResourceBundle),
    Failure(FailureReason),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

/// Status code and decoded JSON body of one resource response.
#[derive(Debug, Clone)]
struct Decoded {
    status: u16,
    body: Value,
}

pub struct ResourceFetcher {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
}

impl ResourceFetcher {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Issue all three requests concurrently and join them. A failing request
    /// does not cancel its siblings.
    pub async fn fetch(&self, vertical: VerticalId) -> FetchOutcome {
        let started = Instant::now();
        let preview_url = self.endpoints.preview(vertical);
        let files_url = self.endpoints.files(vertical);
        let predict_url = self.endpoints.predict(vertical);

        let (preview, files, predict) = tokio::join!(
            self.get_json(Resource::Preview, &preview_url),
            self.get_json(Resource::Files, &files_url),
            self.get_json(Resource::Predict, &predict_url),
        );

        let outcome = assemble(vertical, preview, files, predict);
        let detail = match &outcome {
            FetchOutcome::Success(bundle) => format!("{} files", bundle.files.len()),
            FetchOutcome::Failure(reason) => reason.to_string(),
        };
        log_fetch_outcome(
            vertical.as_str(),
            outcome.is_success(),
            &detail,
            started.elapsed().as_millis() as u64,
        );
        outcome
    }

    async fn get_json(&self, resource: Resource, url: &Url) -> Result<Decoded, FailureReason> {
        let resp = self
            .transport
            .get(url)
            .await
            .map_err(|error| FailureReason::Transport { resource, error })?;
        let body = serde_json::from_str(&resp.body).map_err(|e| FailureReason::InvalidBody {
            resource,
            detail: e.to_string(),
        })?;
        Ok(Decoded {
            status: resp.status,
            body,
        })
    }
}

fn assemble(
    vertical: VerticalId,
    preview: Result<Decoded, FailureReason>,
    files: Result<Decoded, FailureReason>,
    predict: Result<Decoded, FailureReason>,
) -> FetchOutcome {
    let (preview, files, predict) = match (preview, files, predict) {
        (Ok(a), Ok(b), Ok(c)) => (a, b, c),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return FetchOutcome::Failure(e),
    };
    let ordered = [
        (Resource::Preview, &preview),
        (Resource::Files, &files),
        (Resource::Predict, &predict),
    ];

    for (resource, decoded) in ordered {
        if let Some(message) = embedded_error(&decoded.body) {
            return FetchOutcome::Failure(FailureReason::Embedded { resource, message });
        }
    }
    for (resource, decoded) in ordered {
        if !(200..300).contains(&decoded.status) {
            return FetchOutcome::Failure(FailureReason::HttpStatus {
                resource,
                status: decoded.status,
            });
        }
    }

    match build_bundle(vertical, preview.body, files.body, predict.body) {
        Ok(bundle) => FetchOutcome::Success(bundle),
        Err(reason) => FetchOutcome::Failure(reason),
    }
}

fn malformed(resource: Resource, detail: impl Into<String>) -> FailureReason {
    FailureReason::Malformed {
        resource,
        detail: detail.into(),
    }
}

fn build_bundle(
    vertical: VerticalId,
    preview: Value,
    files: Value,
    predict: Value,
) -> Result<ResourceBundle, FailureReason> {
    match predict.get("predictions") {
        None | Some(Value::Null) => return Err(malformed(Resource::Predict, "missing predictions")),
        Some(Value::Object(m)) if m.is_empty() => {
            return Err(malformed(Resource::Predict, "empty predictions"))
        }
        Some(Value::Object(_)) => {}
        Some(_) => return Err(malformed(Resource::Predict, "predictions is not an object")),
    }
    let prediction: Prediction = serde_json::from_value(predict)
        .map_err(|e| malformed(Resource::Predict, e.to_string()))?;

    if preview.is_null() {
        return Err(malformed(Resource::Preview, "empty preview"));
    }
    let preview: PreviewRecord = serde_json::from_value(preview)
        .map_err(|e| malformed(Resource::Preview, e.to_string()))?;

    let files = if files.is_null() {
        Vec::new()
    } else {
        serde_json::from_value::<FileList>(files)
            .map_err(|e| malformed(Resource::Files, e.to_string()))?
            .files
            .unwrap_or_default()
    };

    Ok(ResourceBundle {
        vertical,
        preview,
        files,
        prediction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: Value) -> Result<Decoded, FailureReason> {
        Ok(Decoded { status: 200, body })
    }

    fn preview() -> Value {
        json!({"vertical": "fintech", "latest": {"hiring_spike": 1}, "history": [], "total_rows": 30})
    }

    fn files() -> Value {
        json!({"files": [
            {"name": "2025 Full Year", "filename": "f_2025_yearly.csv", "size": "2.00 MB", "type": "YEARLY"},
            {"name": "2025 Q1", "filename": "f_2025_q1.csv", "size": "0.50 MB", "type": "QUARTERLY"}
        ]})
    }

    fn predict() -> Value {
        json!({"predictions": {"funding_probability": 87}, "confidence": {}, "explanation": {}})
    }

    fn failure(outcome: FetchOutcome) -> FailureReason {
        match outcome {
            FetchOutcome::Failure(r) => r,
            FetchOutcome::Success(b) => panic!("expected failure, got {:?}", b),
        }
    }

    #[test]
    fn all_valid_assembles_bundle_in_server_order() {
        let out = assemble(VerticalId::Fintech, ok(preview()), ok(files()), ok(predict()));
        let FetchOutcome::Success(bundle) = out else {
            panic!("expected success");
        };
        assert_eq!(bundle.files[0].name, "2025 Full Year");
        assert_eq!(bundle.files[1].name, "2025 Q1");
        assert_eq!(bundle.preview.total_rows, Some(30));
        assert_eq!(bundle.prediction.predictions.len(), 1);
    }

    #[test]
    fn missing_files_is_empty_list() {
        let out = assemble(VerticalId::Esg, ok(preview()), ok(json!({})), ok(predict()));
        let FetchOutcome::Success(bundle) = out else {
            panic!("expected success");
        };
        assert!(bundle.files.is_empty());
    }

    #[test]
    fn transport_failure_outranks_embedded_error() {
        let out = assemble(
            VerticalId::Fintech,
            ok(json!({"error": "no data"})),
            ok(files()),
            Err(FailureReason::Transport {
                resource: Resource::Predict,
                error: TransportError::Timeout,
            }),
        );
        let reason = failure(out);
        assert!(reason.is_transport());
        assert_eq!(reason.resource(), Resource::Predict);
        assert!(reason.diagnosis_line().starts_with("Fetch Error:"));
    }

    #[test]
    fn embedded_error_outranks_malformed_prediction() {
        let out = assemble(
            VerticalId::Fintech,
            ok(preview()),
            ok(json!({"error": "listing failed"})),
            ok(json!({"confidence": {}})),
        );
        assert_eq!(
            failure(out),
            FailureReason::Embedded {
                resource: Resource::Files,
                message: "listing failed".to_string()
            }
        );
    }

    #[test]
    fn detail_field_in_prediction_fails() {
        let out = assemble(
            VerticalId::Regulatory,
            ok(preview()),
            ok(files()),
            ok(json!({"detail": "Not Found"})),
        );
        let reason = failure(out);
        assert_eq!(reason.to_string(), "predict: Not Found");
        assert_eq!(reason.diagnosis_line(), "API Error: predict: Not Found");
    }

    #[test]
    fn empty_or_missing_predictions_fail() {
        for body in [json!({}), json!({"predictions": {}}), json!({"predictions": null}), json!({"predictions": 3})] {
            let reason = failure(assemble(VerticalId::Esg, ok(preview()), ok(files()), ok(body)));
            assert!(matches!(reason, FailureReason::Malformed { resource: Resource::Predict, .. }));
        }
    }

    #[test]
    fn error_status_without_embedded_field_fails() {
        let out = assemble(
            VerticalId::Esg,
            Ok(Decoded { status: 502, body: json!({}) }),
            ok(files()),
            ok(predict()),
        );
        assert_eq!(
            failure(out),
            FailureReason::HttpStatus { resource: Resource::Preview, status: 502 }
        );
    }

    #[test]
    fn null_preview_fails() {
        let reason = failure(assemble(VerticalId::Esg, ok(Value::Null), ok(files()), ok(predict())));
        assert_eq!(reason.resource(), Resource::Preview);
    }
}
