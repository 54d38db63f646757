//! Health polling sessions.
//!
//! A session repeatedly runs the diagnostic probe until the backend reports
//! ready, then asks the host to reload. Ticks are strictly sequential: the
//! next one is scheduled only after the previous probe pass has settled.
//!
//! Cancellation is structural. Every wait races the session's
//! `CancellationToken`, and a finished probe pass is committed under the
//! session lock only if the session has not been cancelled in the meantime.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::Rng;
use tokio::sync::Notify;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::diagnosis::{DiagnosisEntry, DiagnosisLog};
use crate::health::{HealthCheck, HealthStatus};
use crate::logging::{log_health_tick, log_session_transition};
use crate::probe::{DiagnosticProbe, ProbeReport, SkewVerdict};
use crate::vertical::VerticalId;

/// Poll cadence. The defaults wait out a rolling deployment indefinitely.
#[derive(Clone, Debug, PartialEq)]
pub struct PollPolicy {
    /// Delay after 404, 503, other statuses and transport failures.
    pub base_interval: Duration,
    /// Delay while the server is live but reports `ready = false`.
    pub fast_interval: Duration,
    /// Optional ceiling on probe passes; `None` polls until cancelled.
    pub max_attempts: Option<u32>,
    /// ± fraction of each delay added as jitter.
    pub jitter_factor: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(5),
            fast_interval: Duration::from_secs(1),
            max_attempts: None,
            jitter_factor: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    Base,
    Fast,
}

impl PollPolicy {
    pub fn delay(&self, cadence: Cadence) -> Duration {
        let interval = match cadence {
            Cadence::Base => self.base_interval,
            Cadence::Fast => self.fast_interval,
        };
        if !self.jitter_factor.is_finite() || self.jitter_factor <= 0.0 {
            return interval;
        }
        let ms = interval.as_millis() as f64;
        let jitter_range = ms * self.jitter_factor;
        let jitter: f64 = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        Duration::from_millis((ms + jitter).max(0.0) as u64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Ready,
    /// Terminal: the host has been asked to reload.
    Reloading,
    /// Terminal, only reachable with `max_attempts` set.
    Exhausted,
}

impl PollState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::Idle => "idle",
            PollState::Polling => "polling",
            PollState::Ready => "ready",
            PollState::Reloading => "reloading",
            PollState::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full client reload: discard all in-memory state and bootstrap again.
pub trait Reload: Send + Sync {
    fn reload(&self);
}

/// `Reload` that wakes whoever owns the client runtime.
#[derive(Clone, Default)]
pub struct ReloadSignal {
    notify: Arc<Notify>,
    count: Arc<AtomicU64>,
}

impl ReloadSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl Reload for ReloadSignal {
    fn reload(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

static SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct SessionState {
    state: PollState,
    health: Option<HealthStatus>,
    skew: Option<SkewVerdict>,
    log: DiagnosisLog,
    ticks: u64,
    cancelled: bool,
}

/// Read-only copy of a session for the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub id: u64,
    pub vertical: VerticalId,
    pub state: PollState,
    pub health: Option<HealthStatus>,
    pub skew: Option<SkewVerdict>,
    /// Oldest first.
    pub entries: Vec<DiagnosisEntry>,
    pub ticks: u64,
    pub cancelled: bool,
}

/// Handle to one polling session. Clones share the same session.
#[derive(Clone)]
pub struct PollingSession {
    id: u64,
    vertical: VerticalId,
    shared: Arc<Mutex<SessionState>>,
    token: CancellationToken,
}

impl fmt::Debug for PollingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingSession")
            .field("id", &self.id)
            .field("vertical", &self.vertical)
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for PollingSession {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

enum Next {
    Wait(Duration),
    Reload,
    Stop,
}

impl PollingSession {
    fn new(vertical: VerticalId, seed: Option<String>) -> Self {
        let mut log = DiagnosisLog::new();
        if let Some(line) = seed {
            log.record(line);
        }
        Self {
            id: SESSION_SEQ.fetch_add(1, Ordering::SeqCst),
            vertical,
            shared: Arc::new(Mutex::new(SessionState {
                state: PollState::Idle,
                health: None,
                skew: None,
                log,
                ticks: 0,
                cancelled: false,
            })),
            token: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn vertical(&self) -> VerticalId {
        self.vertical
    }

    pub fn state(&self) -> PollState {
        self.lock().state
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Stop the session. Any pending tick becomes a no-op and any in-flight
    /// probe result is dropped.
    pub fn cancel(&self) {
        let first = {
            let mut s = self.lock();
            !std::mem::replace(&mut s.cancelled, true)
        };
        self.token.cancel();
        if first {
            log_session_transition(self.id, self.vertical.as_str(), "active", "cancelled");
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let s = self.lock();
        SessionSnapshot {
            id: self.id,
            vertical: self.vertical,
            state: s.state,
            health: s.health.clone(),
            skew: s.skew.clone(),
            entries: s.log.entries().cloned().collect(),
            ticks: s.ticks,
            cancelled: s.cancelled,
        }
    }

    fn transition(&self, s: &mut SessionState, to: PollState) {
        if s.state != to {
            log_session_transition(self.id, self.vertical.as_str(), s.state.as_str(), to.as_str());
            s.state = to;
        }
    }

    fn begin(&self) -> bool {
        let mut s = self.lock();
        if s.cancelled {
            return false;
        }
        self.transition(&mut s, PollState::Polling);
        true
    }

    /// Apply one probe pass. Returns `None` when the session was cancelled
    /// while the pass was in flight.
    fn commit(&self, report: ProbeReport, policy: &PollPolicy) -> Option<Next> {
        let mut s = self.lock();
        if s.cancelled {
            return None;
        }
        s.ticks += 1;
        s.log.extend(report.entries);
        s.health = report.check.status().cloned();
        s.skew = report.skew;

        let cadence = match &report.check {
            HealthCheck::Responded {
                status: HealthStatus::Ready,
                ..
            } => {
                self.transition(&mut s, PollState::Ready);
                s.log.record("System ready. Reloading...");
                self.transition(&mut s, PollState::Reloading);
                log_health_tick(self.id, s.ticks, "ready", None);
                return Some(Next::Reload);
            }
            check if check.is_live_not_ready() => Cadence::Fast,
            _ => Cadence::Base,
        };

        if let Some(max) = policy.max_attempts {
            if s.ticks >= u64::from(max) {
                let ticks = s.ticks;
                s.log.record(format!("Giving up after {} status checks", ticks));
                self.transition(&mut s, PollState::Exhausted);
                log_health_tick(self.id, ticks, "exhausted", None);
                return Some(Next::Stop);
            }
        }

        let delay = policy.delay(cadence);
        let label = s.health.as_ref().map(HealthStatus::label).unwrap_or("unreachable");
        log_health_tick(self.id, s.ticks, label, Some(delay.as_millis() as u64));
        Some(Next::Wait(delay))
    }
}

/// Called after every committed probe pass, outside the session lock.
pub type TickHook = Arc<dyn Fn() + Send + Sync>;

/// Owns the retry loop for degraded panels.
#[derive(Clone)]
pub struct StatusPoller {
    probe: Arc<DiagnosticProbe>,
    policy: PollPolicy,
    reloader: Arc<dyn Reload>,
}

impl StatusPoller {
    pub fn new(probe: Arc<DiagnosticProbe>, policy: PollPolicy, reloader: Arc<dyn Reload>) -> Self {
        Self {
            probe,
            policy,
            reloader,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Start a session on the current tokio runtime. `seed` becomes the first
    /// diagnosis entry.
    pub fn start(&self, vertical: VerticalId, seed: Option<String>) -> PollingSession {
        self.start_observed(vertical, seed, None)
    }

    /// Like `start`, but `on_tick` runs after each committed pass so owners
    /// can republish the session without polling `snapshot()`.
    pub fn start_observed(
        &self,
        vertical: VerticalId,
        seed: Option<String>,
        on_tick: Option<TickHook>,
    ) -> PollingSession {
        let session = PollingSession::new(vertical, seed);
        tokio::spawn(drive(
            session.clone(),
            self.probe.clone(),
            self.policy.clone(),
            self.reloader.clone(),
            on_tick,
        ));
        session
    }
}

async fn drive(
    session: PollingSession,
    probe: Arc<DiagnosticProbe>,
    policy: PollPolicy,
    reloader: Arc<dyn Reload>,
    on_tick: Option<TickHook>,
) {
    if !session.begin() {
        return;
    }
    let token = session.token.clone();
    loop {
        let report = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            report = probe.run() => report,
        };
        let next = session.commit(report, &policy);
        if let (Some(_), Some(hook)) = (&next, &on_tick) {
            hook();
        }
        match next {
            None | Some(Next::Stop) => return,
            Some(Next::Reload) => {
                reloader.reload();
                return;
            }
            Some(Next::Wait(delay)) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = sleep(delay) => {}
                }
            }
        }
    }
}
