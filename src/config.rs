use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::Endpoints;
use crate::poller::PollPolicy;
use crate::vertical::VerticalId;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub poll_base_ms: u64,
    pub poll_fast_ms: u64,
    pub poll_max_attempts: Option<u32>,
    pub poll_jitter: f64,
    pub request_timeout_secs: u64,
    pub verticals: Vec<VerticalId>,
    pub render_every_ms: u64,
    pub offline_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:7860".to_string(),
            poll_base_ms: 5000,
            poll_fast_ms: 1000,
            poll_max_attempts: None,
            poll_jitter: 0.0,
            request_timeout_secs: 10,
            verticals: VerticalId::ALL.to_vec(),
            render_every_ms: 2000,
            offline_demo: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();
        let verticals = match get("VERTICALS") {
            Some(list) if !list.trim().is_empty() => list
                .split(',')
                .map(|v| v.parse::<VerticalId>())
                .collect::<Result<Vec<_>, _>>()
                .context("VERTICALS")?,
            _ => d.verticals,
        };
        let cfg = Self {
            api_url: get("API_URL").unwrap_or(d.api_url),
            poll_base_ms: get("POLL_BASE_MS").and_then(|v| v.parse().ok()).unwrap_or(d.poll_base_ms),
            poll_fast_ms: get("POLL_FAST_MS").and_then(|v| v.parse().ok()).unwrap_or(d.poll_fast_ms),
            poll_max_attempts: get("POLL_MAX_ATTEMPTS").and_then(|v| v.parse().ok()).filter(|n| *n > 0),
            poll_jitter: get("POLL_JITTER")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|j| j.is_finite())
                .unwrap_or(d.poll_jitter),
            request_timeout_secs: get("REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()).unwrap_or(d.request_timeout_secs),
            verticals,
            render_every_ms: get("RENDER_EVERY_MS").and_then(|v| v.parse().ok()).unwrap_or(d.render_every_ms),
            offline_demo: get("OFFLINE_DEMO").map(|v| v != "0" && !v.is_empty()).unwrap_or(false),
        };
        cfg.endpoints()?;
        Ok(cfg)
    }

    pub fn endpoints(&self) -> Result<Endpoints> {
        Endpoints::new(&self.api_url).context("API_URL")
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            base_interval: Duration::from_millis(self.poll_base_ms),
            fast_interval: Duration::from_millis(self.poll_fast_ms),
            max_attempts: self.poll_max_attempts,
            jitter_factor: self.poll_jitter.clamp(0.0, 1.0),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_poll_every_five_and_one_seconds() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.poll_policy(), PollPolicy::default());
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("API_URL", "https://dash.example.org"),
            ("POLL_BASE_MS", "2500"),
            ("POLL_MAX_ATTEMPTS", "12"),
            ("VERTICALS", "esg, supply_chain"),
            ("OFFLINE_DEMO", "1"),
        ]))
        .unwrap();
        assert_eq!(cfg.poll_policy().base_interval, Duration::from_millis(2500));
        assert_eq!(cfg.poll_max_attempts, Some(12));
        assert_eq!(cfg.verticals, vec![VerticalId::Esg, VerticalId::SupplyChain]);
        assert!(cfg.offline_demo);
    }

    #[test]
    fn zero_attempts_means_unbounded() {
        let cfg = Config::from_lookup(lookup(&[("POLL_MAX_ATTEMPTS", "0")])).unwrap();
        assert!(cfg.poll_max_attempts.is_none());
    }

    #[test]
    fn non_finite_jitter_falls_back_to_exact_cadence() {
        for raw in ["NaN", "inf", "-inf"] {
            let cfg = Config::from_lookup(lookup(&[("POLL_JITTER", raw)])).unwrap();
            assert_eq!(cfg.poll_jitter, 0.0);
            assert_eq!(
                cfg.poll_policy().delay(crate::poller::Cadence::Base),
                Duration::from_secs(5)
            );
        }
    }

    #[test]
    fn rejects_unknown_vertical_and_bad_origin() {
        assert!(Config::from_lookup(lookup(&[("VERTICALS", "fintech,crypto")])).is_err());
        assert!(Config::from_lookup(lookup(&[("API_URL", "nope")])).is_err());
    }
}
