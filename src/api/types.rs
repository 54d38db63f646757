use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use super::Endpoints;

/// `/api/preview/{vertical}`: latest row plus recent history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreviewRecord {
    #[serde(default)]
    pub vertical: Option<String>,
    #[serde(default)]
    pub latest: Map<String, Value>,
    #[serde(default)]
    pub history: Vec<Map<String, Value>>,
    #[serde(default)]
    pub total_rows: Option<u64>,
}

/// One downloadable dataset from `/api/files/{vertical}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub filename: String,
    #[serde(default)]
    pub size: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl FileDescriptor {
    /// `None` when the filename could escape the backend's data directory.
    pub fn download_url(&self, endpoints: &Endpoints) -> Option<Url> {
        endpoints.download(&self.filename)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Option<Vec<FileDescriptor>>,
}

/// `/api/predict/{vertical}`. The model itself is a server-side black box.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Prediction {
    pub predictions: Map<String, Value>,
    #[serde(default)]
    pub confidence: Map<String, Value>,
    #[serde(default)]
    pub explanation: Map<String, Value>,
}

impl Prediction {
    /// Confidence for a prediction key, falling back to 0.85 like the panel does.
    pub fn confidence_for(&self, key: &str) -> f64 {
        self.confidence
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(0.85)
    }
}

/// `/api/status` body. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub logs: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionInfo {
    pub version: String,
}

/// First embedded `error` or `detail` message in a decoded body.
pub fn embedded_error(body: &Value) -> Option<String> {
    let obj = body.as_object()?;
    ["error", "detail"].iter().find_map(|key| match obj.get(*key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_error_prefers_error_over_detail() {
        assert_eq!(
            embedded_error(&json!({"error": "model not ready", "detail": "x"})),
            Some("model not ready".to_string())
        );
        assert_eq!(
            embedded_error(&json!({"detail": [{"loc": "q"}]})),
            Some("[{\"loc\":\"q\"}]".to_string())
        );
        assert_eq!(embedded_error(&json!({"error": null})), None);
        assert_eq!(embedded_error(&json!([1, 2])), None);
    }

    #[test]
    fn file_list_tolerates_missing_files() {
        let list: FileList = serde_json::from_value(json!({})).unwrap();
        assert!(list.files.is_none());
        let list: FileList = serde_json::from_value(json!({
            "files": [{"name": "2025 Q1", "filename": "esg_2025_q1.csv", "size": "1.2 KB", "type": "QUARTERLY"}]
        }))
        .unwrap();
        assert_eq!(list.files.unwrap()[0].kind, "QUARTERLY");
    }

    #[test]
    fn download_url_guards_filename() {
        let ep = Endpoints::new("http://localhost:7860").unwrap();
        let mut file = FileDescriptor {
            name: "2025 Q1".into(),
            filename: "esg_2025_q1.csv".into(),
            size: "1.2 KB".into(),
            kind: "QUARTERLY".into(),
        };
        assert_eq!(
            file.download_url(&ep).unwrap().as_str(),
            "http://localhost:7860/api/download/esg_2025_q1.csv"
        );
        file.filename = "..\\etc".into();
        assert!(file.download_url(&ep).is_none());
    }

    #[test]
    fn confidence_fallback() {
        let p: Prediction = serde_json::from_value(json!({
            "predictions": {"funding_probability": 87},
            "confidence": {"funding_probability": 0.93}
        }))
        .unwrap();
        assert_eq!(p.confidence_for("funding_probability"), 0.93);
        assert_eq!(p.confidence_for("other"), 0.85);
    }
}
