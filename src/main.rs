use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tokio::time::{interval, Duration};

use verticalfx::api::http::HttpTransport;
use verticalfx::api::scripted::ScriptedTransport;
use verticalfx::api::Transport;
use verticalfx::config::Config;
use verticalfx::dashboard::Dashboard;
use verticalfx::logging::{log, obj, v_str, Domain, Level};
use verticalfx::poller::ReloadSignal;
use verticalfx::vertical::VerticalId;

/// Backend stand-in for `OFFLINE_DEMO`: fintech predictions fail once, the
/// health endpoint walks from 404 through warm-up to ready.
fn demo_backend() -> ScriptedTransport {
    let t = ScriptedTransport::new();
    for v in VerticalId::ALL {
        t.json(
            &format!("/api/preview/{}", v),
            200,
            json!({"vertical": v.as_str(), "latest": {}, "history": [], "total_rows": 30}),
        );
        t.json(
            &format!("/api/files/{}", v),
            200,
            json!({"files": [{
                "name": "2025 Full Year",
                "filename": format!("{}_2025_yearly.csv", v),
                "size": "1.20 MB",
                "type": "YEARLY"
            }]}),
        );
    }
    t.json("/api/predict/fintech", 200, json!({"error": "model not ready"}));
    for v in VerticalId::ALL {
        t.json(
            &format!("/api/predict/{}", v),
            200,
            json!({"predictions": {"score": 87}, "confidence": {"score": 0.91}, "explanation": {}}),
        );
    }
    t.json("/api/status", 404, json!({"detail": "Not Found"}));
    t.json("/api/version", 200, json!({"version": "2.1"}));
    t.json("/api/status", 503, json!({"ready": false, "progress": 40, "step": "loading models"}));
    t.json("/api/status", 200, json!({"ready": false, "progress": 90, "step": "warming cache"}));
    t.json("/api/status", 200, json!({"ready": true}));
    t
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;
    let transport: Arc<dyn Transport> = if cfg.offline_demo {
        Arc::new(demo_backend())
    } else {
        Arc::new(HttpTransport::new(cfg.request_timeout()))
    };

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("api_url", v_str(&cfg.api_url)),
            ("offline_demo", json!(cfg.offline_demo)),
            ("verticals", json!(cfg.verticals)),
        ]),
    );

    let mut boot = 0u64;
    loop {
        boot += 1;
        // Fresh signal per bootstrap so stale sessions cannot trigger a second reload.
        let reload = ReloadSignal::new();
        let dashboard = Dashboard::mount(&cfg, transport.clone(), Arc::new(reload.clone()))?;
        log(
            Level::Info,
            Domain::System,
            "bootstrap",
            obj(&[("boot", json!(boot))]),
        );

        let mut render = interval(Duration::from_millis(cfg.render_every_ms.max(100)));
        loop {
            tokio::select! {
                _ = reload.wait() => {
                    log(Level::Info, Domain::System, "reload", obj(&[("boot", json!(boot))]));
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    log(Level::Info, Domain::System, "shutdown", obj(&[]));
                    return Ok(());
                }
                _ = render.tick() => dashboard.log_summary(),
            }
        }
        drop(dashboard);
    }
}
