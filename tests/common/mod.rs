#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use verticalfx::api::scripted::ScriptedTransport;
use verticalfx::api::{Endpoints, Transport};
use verticalfx::fetch::ResourceFetcher;
use verticalfx::panel::PanelController;
use verticalfx::poller::{PollPolicy, PollingSession, ReloadSignal, SessionSnapshot, StatusPoller};
use verticalfx::probe::DiagnosticProbe;
use verticalfx::vertical::VerticalId;

pub struct Harness {
    pub transport: ScriptedTransport,
    pub reload: ReloadSignal,
    pub fetcher: Arc<ResourceFetcher>,
    pub poller: StatusPoller,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(PollPolicy::default())
    }

    pub fn with_policy(policy: PollPolicy) -> Self {
        let transport = ScriptedTransport::new();
        let reload = ReloadSignal::new();
        let endpoints = Endpoints::new("http://backend.test").unwrap();
        let shared: Arc<dyn Transport> = Arc::new(transport.clone());
        let fetcher = Arc::new(ResourceFetcher::new(shared.clone(), endpoints.clone()));
        let probe = Arc::new(DiagnosticProbe::new(shared, endpoints));
        let poller = StatusPoller::new(probe, policy, Arc::new(reload.clone()));
        Self {
            transport,
            reload,
            fetcher,
            poller,
        }
    }

    pub fn controller(&self, vertical: VerticalId) -> PanelController {
        PanelController::new(vertical, self.fetcher.clone(), self.poller.clone())
    }

    /// Script valid preview, files and prediction payloads for `vertical`.
    pub fn healthy(&self, vertical: VerticalId) {
        let v = vertical.as_str();
        self.transport.json(
            &format!("/api/preview/{}", v),
            200,
            json!({"vertical": v, "latest": {"score": 1.0}, "history": [], "total_rows": 30}),
        );
        self.transport.json(
            &format!("/api/files/{}", v),
            200,
            json!({"files": [{"name": "2025 Q1", "filename": format!("{}_2025_q1.csv", v), "size": "0.40 MB", "type": "QUARTERLY"}]}),
        );
        self.transport.json(
            &format!("/api/predict/{}", v),
            200,
            json!({"predictions": {"probability": 87}, "confidence": {"probability": 0.9}, "explanation": {"hiring": 0.3}}),
        );
    }
}

/// Wait on the paused tokio clock until `pred` holds for the session.
pub async fn wait_for(session: &PollingSession, pred: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
    for _ in 0..2000 {
        let snap = session.snapshot();
        if pred(&snap) {
            return snap;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached: {:?}", session.snapshot());
}

pub fn messages(snap: &SessionSnapshot) -> Vec<String> {
    snap.entries.iter().map(|e| e.message.clone()).collect()
}
