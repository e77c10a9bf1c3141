//! Engine: sequential poll loop, transitions, and side-effect dispatch

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::{MonitorKind, MonitorSpec};
use crate::monitor::{AvailabilityState, PollResult, Probe};
use crate::reload::Reloader;
use crate::settings::Settings;
use crate::state::{OverlayModel, StateHandle, TransitionRecord};

/// Overlay title, shared by both monitor variants
pub const OVERLAY_TITLE: &str = "Server is currently unavailable";

/// Status texts for the page-health monitor
pub const PAGE_DOWN_TEXT: &str = "Server is DOWN. Waiting...";
pub const PAGE_RECOVERED_TEXT: &str = "Server is UP! You can reload the page now.";

/// Status texts for the error-page monitor
pub const ERROR_RECOVERED_TEXT: &str = "Server is UP!";
pub const ERROR_UNREACHABLE_TEXT: &str = "Server is unreachable. Waiting...";

const FAILURE_WARN_THRESHOLD: u32 = 5;

/// Side effect requested by a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// UP to DOWN: surface the overlay, subject to gating
    ShowOverlay,
    /// DOWN to UP with auto-reload on: dispatch the reload action
    Reload,
    /// DOWN to UP with auto-reload off: flip the overlay to recovered
    MarkRecovered,
}

/// Pure transition: the most recent poll result alone drives the next state
pub fn transition(
    current: AvailabilityState,
    result: &PollResult,
    auto_reload: bool,
) -> (AvailabilityState, Option<Effect>) {
    use AvailabilityState::{Down, Up};

    match (current, result.is_healthy()) {
        (Up, false) => (Down, Some(Effect::ShowOverlay)),
        (Down, true) if auto_reload => (Up, Some(Effect::Reload)),
        (Down, true) => (Up, Some(Effect::MarkRecovered)),
        (Up, true) => (Up, None),
        (Down, false) => (Down, None),
    }
}

/// Status line shown while DOWN. The error page names the reported status;
/// the in-page overlay keeps a single generic message.
pub fn down_status_text(kind: MonitorKind, result: &PollResult) -> String {
    match kind {
        MonitorKind::PageHealth => PAGE_DOWN_TEXT.to_string(),
        MonitorKind::ErrorPage => {
            if result.reachable {
                format!(
                    "Server is DOWN, status: {}",
                    result.status.as_deref().unwrap_or("unknown")
                )
            } else {
                ERROR_UNREACHABLE_TEXT.to_string()
            }
        }
    }
}

pub fn recovered_status_text(kind: MonitorKind) -> &'static str {
    match kind {
        MonitorKind::PageHealth => PAGE_RECOVERED_TEXT,
        MonitorKind::ErrorPage => ERROR_RECOVERED_TEXT,
    }
}

/// The engine polls readiness, applies transitions, and reacts to live
/// settings changes. Polls are explicitly sequenced: each poll is awaited
/// to completion before the next interval starts, so two polls are never
/// in flight at once.
pub struct Engine {
    probe: Arc<dyn Probe>,
    reloader: Arc<dyn Reloader>,
    spec: MonitorSpec,
    settings: watch::Receiver<Settings>,
    state: StateHandle,
    cancel: CancellationToken,
    last_result: PollResult,
}

enum Wake {
    Elapsed,
    Cancelled,
    Settings,
}

impl Engine {
    pub fn new(
        probe: Arc<dyn Probe>,
        reloader: Arc<dyn Reloader>,
        spec: MonitorSpec,
        settings: watch::Receiver<Settings>,
        state: StateHandle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            probe,
            reloader,
            spec,
            settings,
            state,
            cancel,
            last_result: PollResult::unreachable(),
        }
    }

    /// Run the monitor until cancelled
    pub async fn run(mut self) {
        if self.spec.is_excluded() {
            tracing::info!(
                "Path {} is under an excluded prefix, monitoring disabled",
                self.spec.page_path
            );
            self.cancel.cancelled().await;
            return;
        }

        let mut ticker = OfflineTicker::default();

        if !self.wait_interval(self.spec.start_delay, &mut ticker).await {
            ticker.stop();
            return;
        }

        loop {
            let result = self.probe.poll().await;
            self.apply_poll(&result, &mut ticker).await;

            if !self.wait_interval(self.spec.poll_interval, &mut ticker).await {
                break;
            }
        }

        ticker.stop();
    }

    /// Sleep out one interval, applying settings changes as they arrive.
    /// Returns false when the engine was cancelled.
    async fn wait_interval(&mut self, duration: Duration, ticker: &mut OfflineTicker) -> bool {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            match self.next_wake(deadline).await {
                Wake::Elapsed => return true,
                Wake::Cancelled => return false,
                Wake::Settings => self.apply_settings(ticker).await,
            }
        }
    }

    async fn next_wake(&mut self, deadline: tokio::time::Instant) -> Wake {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => Wake::Elapsed,
            _ = self.cancel.cancelled() => Wake::Cancelled,
            changed = self.settings.changed() => match changed {
                Ok(()) => Wake::Settings,
                // Settings store is gone; the last seen values stay in effect
                Err(_) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => Wake::Elapsed,
                        _ = self.cancel.cancelled() => Wake::Cancelled,
                    }
                }
            },
        }
    }

    async fn apply_poll(&mut self, result: &PollResult, ticker: &mut OfflineTicker) {
        let settings = *self.settings.borrow();
        let auto_reload = settings.auto_reload_for(self.spec.kind);
        let now_ms = current_epoch_ms();
        self.last_result = result.clone();

        let (previous, next, effect) = {
            let mut state = self.state.write().await;
            let previous = state.availability;
            let (next, effect) = transition(previous, result, auto_reload);
            state.record_poll(next, now_ms);
            if state.consecutive_failures == FAILURE_WARN_THRESHOLD {
                tracing::warn!(
                    "{} has failed {} consecutive polls",
                    self.spec.origin,
                    state.consecutive_failures
                );
            }
            if effect.is_none() && next == AvailabilityState::Down {
                // DOWN to DOWN still refreshes the reported-status line
                state.set_down_status(&down_status_text(self.spec.kind, result));
            }
            (previous, next, effect)
        };

        tracing::debug!(
            "Poll {}: {} -> {} ({:?})",
            self.spec.origin,
            previous,
            next,
            effect
        );

        match effect {
            None => {}
            Some(Effect::ShowOverlay) => {
                let eligible =
                    settings.feature_enabled_for(self.spec.kind) && !self.spec.is_excluded();
                {
                    let mut state = self.state.write().await;
                    if eligible {
                        let text = down_status_text(self.spec.kind, result);
                        if state.overlay_shown() {
                            state.set_down_status(&text);
                        } else {
                            let overlay = self.make_overlay(&settings, text);
                            state.show_overlay(overlay);
                        }
                    }
                    state.add_record(TransitionRecord {
                        from: previous,
                        to: next,
                        action: if eligible { "overlay" } else { "suppressed" }.to_string(),
                        success: true,
                        error: None,
                        timestamp_epoch_ms: now_ms,
                    });
                }
                if eligible {
                    ticker.start(&self.state, &self.cancel);
                }
            }
            Some(Effect::Reload) => {
                ticker.stop();
                let outcome = self.reloader.reload(&self.spec.reload_target).await;
                if let Err(e) = &outcome {
                    tracing::warn!(
                        "Reload via '{}' for {} failed: {}",
                        self.reloader.type_name(),
                        self.spec.reload_target,
                        e
                    );
                }
                let mut state = self.state.write().await;
                state.hide_overlay();
                state.add_record(TransitionRecord {
                    from: previous,
                    to: next,
                    action: "reload".to_string(),
                    success: outcome.is_ok(),
                    error: outcome.err().map(|e| e.to_string()),
                    timestamp_epoch_ms: now_ms,
                });
            }
            Some(Effect::MarkRecovered) => {
                ticker.stop();
                let mut state = self.state.write().await;
                state.mark_recovered(recovered_status_text(self.spec.kind));
                state.add_record(TransitionRecord {
                    from: previous,
                    to: next,
                    action: "recovered".to_string(),
                    success: true,
                    error: None,
                    timestamp_epoch_ms: now_ms,
                });
            }
        }
    }

    /// React to a settings change without restarting the poll loop
    async fn apply_settings(&mut self, ticker: &mut OfflineTicker) {
        let settings = *self.settings.borrow_and_update();

        let mut state = self.state.write().await;

        if !settings.feature_enabled_for(self.spec.kind) {
            if state.overlay_shown() {
                tracing::debug!("Feature disabled, hiding overlay for {}", state.origin);
                state.hide_overlay();
                ticker.stop();
            }
            return;
        }

        if state.overlay_shown() {
            state.sync_overlay_settings(
                settings.auto_reload_for(self.spec.kind),
                settings.dark_mode_for(self.spec.kind),
            );
        } else if state.availability == AvailabilityState::Down && !self.spec.is_excluded() {
            // Re-enabling mid-outage surfaces the overlay again; the counter
            // resumes where it was, reset happens only on DOWN entry
            let text = down_status_text(self.spec.kind, &self.last_result);
            let overlay = self.make_overlay(&settings, text);
            state.show_overlay(overlay);
            drop(state);
            ticker.start(&self.state, &self.cancel);
        }
    }

    fn make_overlay(&self, settings: &Settings, status_text: String) -> OverlayModel {
        OverlayModel {
            title: OVERLAY_TITLE.to_string(),
            origin: self.spec.origin.clone(),
            status_text,
            status_up: false,
            auto_reload_enabled: settings.auto_reload_for(self.spec.kind),
            reload_enabled: false,
            dark_mode: settings.dark_mode_for(self.spec.kind),
        }
    }
}

/// Drives the overlay's offline-seconds counter while the server is down
#[derive(Debug, Default)]
struct OfflineTicker {
    token: Option<CancellationToken>,
}

impl OfflineTicker {
    fn start(&mut self, state: &StateHandle, parent: &CancellationToken) {
        self.stop();

        let token = parent.child_token();
        let state = Arc::clone(state);
        let task_token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {
                        state.write().await.tick_offline();
                    }
                    _ = task_token.cancelled() => break,
                }
            }
        });

        self.token = Some(token);
    }

    fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

pub(crate) fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
