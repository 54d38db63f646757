use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::fetch::{FetchOutcome, ResourceBundle, ResourceFetcher};
use crate::logging::log_view_transition;
use crate::poller::{PollingSession, StatusPoller, TickHook};
use crate::vertical::VerticalId;

/// What the rendering layer should show for a panel.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Ready(Arc<ResourceBundle>),
    Degraded(PollingSession),
}

impl ViewState {
    pub fn label(&self) -> &'static str {
        match self {
            ViewState::Loading => "loading",
            ViewState::Ready(_) => "ready",
            ViewState::Degraded(_) => "degraded",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub vertical: VerticalId,
    /// Bumped on every (re)load; results from older loads are dropped.
    pub generation: u64,
    pub state: ViewState,
}

/// Per-vertical orchestrator: fetch on mount, degrade to polling on failure.
///
/// The controller never ends in an error state. A failed load always becomes
/// a `Degraded` view backed by a live polling session.
pub struct PanelController {
    fetcher: Arc<ResourceFetcher>,
    poller: StatusPoller,
    view: Arc<watch::Sender<PanelView>>,
    task: Option<JoinHandle<()>>,
}

impl PanelController {
    pub fn new(vertical: VerticalId, fetcher: Arc<ResourceFetcher>, poller: StatusPoller) -> Self {
        let (tx, _rx) = watch::channel(PanelView {
            vertical,
            generation: 0,
            state: ViewState::Loading,
        });
        Self {
            fetcher,
            poller,
            view: Arc::new(tx),
            task: None,
        }
    }

    pub fn vertical(&self) -> VerticalId {
        self.view.borrow().vertical
    }

    pub fn view(&self) -> PanelView {
        self.view.borrow().clone()
    }

    /// Fires on every view change, and on every committed poll tick while
    /// the panel is `Degraded`.
    pub fn subscribe(&self) -> watch::Receiver<PanelView> {
        self.view.subscribe()
    }

    /// Start loading the current vertical.
    pub fn mount(&mut self) {
        let vertical = self.vertical();
        self.restart(vertical);
    }

    /// Switch to another vertical. Switching to the vertical already mounted
    /// is a no-op.
    pub fn set_vertical(&mut self, vertical: VerticalId) {
        if self.task.is_some() && self.vertical() == vertical {
            return;
        }
        self.restart(vertical);
    }

    /// Cancel any session, drop the current bundle and fetch again.
    fn restart(&mut self, vertical: VerticalId) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let mut generation = 0;
        self.view.send_modify(|view| {
            if let ViewState::Degraded(session) = &view.state {
                session.cancel();
            }
            view.generation += 1;
            view.vertical = vertical;
            view.state = ViewState::Loading;
            generation = view.generation;
        });
        log_view_transition(vertical.as_str(), generation, "loading");

        let fetcher = self.fetcher.clone();
        let poller = self.poller.clone();
        let tx = self.view.clone();
        self.task = Some(tokio::spawn(async move {
            let outcome = fetcher.fetch(vertical).await;
            let nudge = Arc::downgrade(&tx);
            let on_tick: TickHook = Arc::new(move || {
                if let Some(tx) = nudge.upgrade() {
                    tx.send_if_modified(|view| view.generation == generation);
                }
            });
            tx.send_if_modified(|view| {
                if view.generation != generation {
                    return false;
                }
                view.state = match outcome {
                    FetchOutcome::Success(bundle) => ViewState::Ready(Arc::new(bundle)),
                    FetchOutcome::Failure(reason) => {
                        ViewState::Degraded(poller.start_observed(
                            vertical,
                            Some(reason.diagnosis_line()),
                            Some(on_tick),
                        ))
                    }
                };
                log_view_transition(vertical.as_str(), generation, view.state.label());
                true
            });
        }));
    }

    /// Wait until the current load has settled into `Ready` or `Degraded`.
    /// Before `mount` there is nothing to wait for and the current view is
    /// returned as is.
    pub async fn settled(&self) -> PanelView {
        if self.task.is_none() {
            return self.view();
        }
        let mut rx = self.view.subscribe();
        loop {
            {
                let view = rx.borrow_and_update();
                if !matches!(view.state, ViewState::Loading) {
                    return view.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.view();
            }
        }
    }

    pub fn unmount(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let ViewState::Degraded(session) = &self.view.borrow().state {
            session.cancel();
        }
    }
}

impl Drop for PanelController {
    fn drop(&mut self) {
        self.unmount();
    }
}
