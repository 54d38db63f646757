use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crate::api::{Endpoints, Transport};
use crate::config::Config;
use crate::fetch::ResourceFetcher;
use crate::health::HealthStatus;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::panel::{PanelController, PanelView, ViewState};
use crate::poller::{Reload, StatusPoller};
use crate::probe::DiagnosticProbe;
use crate::vertical::VerticalId;

/// All mounted panels of one client runtime. Dropping it unmounts every panel.
pub struct Dashboard {
    endpoints: Endpoints,
    panels: Vec<PanelController>,
}

impl Dashboard {
    pub fn mount(cfg: &Config, transport: Arc<dyn Transport>, reloader: Arc<dyn Reload>) -> Result<Self> {
        let endpoints = cfg.endpoints()?;
        let fetcher = Arc::new(ResourceFetcher::new(transport.clone(), endpoints.clone()));
        let probe = Arc::new(DiagnosticProbe::new(transport, endpoints.clone()));
        let poller = StatusPoller::new(probe, cfg.poll_policy(), reloader);

        let panels = cfg
            .verticals
            .iter()
            .map(|v| {
                let mut panel = PanelController::new(*v, fetcher.clone(), poller.clone());
                panel.mount();
                panel
            })
            .collect();
        Ok(Self { endpoints, panels })
    }

    pub fn panels(&self) -> &[PanelController] {
        &self.panels
    }

    pub fn panel(&self, vertical: VerticalId) -> Option<&PanelController> {
        self.panels.iter().find(|p| p.vertical() == vertical)
    }

    pub fn views(&self) -> Vec<PanelView> {
        self.panels.iter().map(PanelController::view).collect()
    }

    /// Emit one summary record per panel.
    pub fn log_summary(&self) {
        for view in self.views() {
            log(
                Level::Info,
                Domain::Panel,
                "panel_summary",
                summarize(&view, &self.endpoints),
            );
        }
    }
}

fn summarize(view: &PanelView, endpoints: &Endpoints) -> serde_json::Map<String, serde_json::Value> {
    let profile = view.vertical.profile();
    let mut fields = obj(&[
        ("vertical", v_str(view.vertical.as_str())),
        ("title", v_str(profile.title)),
        ("state", v_str(view.state.label())),
    ]);
    match &view.state {
        ViewState::Loading => {}
        ViewState::Ready(bundle) => {
            let links: Vec<String> = bundle
                .files
                .iter()
                .filter_map(|f| f.download_url(endpoints))
                .map(String::from)
                .collect();
            fields.insert("files".into(), json!(links));
            fields.insert(
                "predictions".into(),
                json!(bundle.prediction.predictions.keys().collect::<Vec<_>>()),
            );
        }
        ViewState::Degraded(session) => {
            let snap = session.snapshot();
            fields.insert("session".into(), json!(snap.id));
            fields.insert("poll_state".into(), v_str(snap.state.as_str()));
            fields.insert("ticks".into(), json!(snap.ticks));
            if let Some(HealthStatus::Initializing { progress, step, .. }) = &snap.health {
                fields.insert("progress".into(), v_num(f64::from(*progress)));
                fields.insert("step".into(), json!(step));
            }
            if let Some(last) = snap.entries.last() {
                fields.insert("msg".into(), v_str(&last.to_string()));
            }
        }
    }
    fields
}
