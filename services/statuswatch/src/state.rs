//! Shared state for availability, the overlay, and transition history

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::monitor::AvailabilityState;

/// The overlay surfaced to the user while the server is (or just was) down
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayModel {
    pub title: String,
    pub origin: String,
    pub status_text: String,
    /// Drives the "up"/"down" visual class of the status line
    pub status_up: bool,
    /// Mirror of the persisted auto-reload toggle
    pub auto_reload_enabled: bool,
    /// The manual reload action is enabled only once the server is back
    pub reload_enabled: bool,
    pub dark_mode: bool,
}

/// Record of a state transition and the action taken for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: AvailabilityState,
    pub to: AvailabilityState,
    pub action: String,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp_epoch_ms: u64,
}

/// Shared state accessible by the engine and the dashboard
#[derive(Debug)]
pub struct SharedState {
    pub origin: String,
    pub availability: AvailabilityState,
    pub last_poll_epoch_ms: u64,
    pub last_change_epoch_ms: Option<u64>,
    pub consecutive_failures: u32,
    /// Seconds spent in the current DOWN episode, reset on each DOWN entry
    pub offline_seconds: u64,
    pub overlay: Option<OverlayModel>,
    pub history: VecDeque<TransitionRecord>,
    pub history_max_size: usize,
    pub started_at: Instant,
}

impl SharedState {
    pub fn new(origin: String, history_max_size: usize) -> Self {
        Self {
            origin,
            // Optimistic until the first failed poll
            availability: AvailabilityState::Up,
            last_poll_epoch_ms: 0,
            last_change_epoch_ms: None,
            consecutive_failures: 0,
            offline_seconds: 0,
            overlay: None,
            history: VecDeque::with_capacity(history_max_size),
            history_max_size,
            started_at: Instant::now(),
        }
    }

    /// Record a poll verdict, returning true if availability changed
    pub fn record_poll(&mut self, new_state: AvailabilityState, now_ms: u64) -> bool {
        let changed = self.availability != new_state;
        self.availability = new_state;
        self.last_poll_epoch_ms = now_ms;
        if new_state == AvailabilityState::Down {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
        if changed {
            self.last_change_epoch_ms = Some(now_ms);
            if new_state == AvailabilityState::Down {
                self.offline_seconds = 0;
            }
        }
        changed
    }

    pub fn overlay_shown(&self) -> bool {
        self.overlay.is_some()
    }

    pub fn show_overlay(&mut self, overlay: OverlayModel) {
        self.overlay = Some(overlay);
    }

    pub fn hide_overlay(&mut self) {
        self.overlay = None;
    }

    /// Advance the offline counter. Ticks only while the overlay is shown
    /// and the server is down.
    pub fn tick_offline(&mut self) -> Option<u64> {
        if self.overlay.is_some() && self.availability == AvailabilityState::Down {
            self.offline_seconds += 1;
            Some(self.offline_seconds)
        } else {
            None
        }
    }

    /// Refresh the down status line on the shown overlay
    pub fn set_down_status(&mut self, status_text: &str) {
        if let Some(overlay) = &mut self.overlay {
            overlay.status_text = status_text.to_string();
            overlay.status_up = false;
            overlay.reload_enabled = false;
        }
    }

    /// Flip the shown overlay to its recovered presentation
    pub fn mark_recovered(&mut self, status_text: &str) {
        if let Some(overlay) = &mut self.overlay {
            overlay.status_text = status_text.to_string();
            overlay.status_up = true;
            overlay.reload_enabled = true;
        }
    }

    /// Mirror live settings changes onto the shown overlay
    pub fn sync_overlay_settings(&mut self, auto_reload_enabled: bool, dark_mode: bool) {
        if let Some(overlay) = &mut self.overlay {
            overlay.auto_reload_enabled = auto_reload_enabled;
            overlay.dark_mode = dark_mode;
        }
    }

    pub fn reload_enabled(&self) -> bool {
        self.overlay
            .as_ref()
            .map(|overlay| overlay.reload_enabled)
            .unwrap_or(false)
    }

    /// Add a transition record to history
    pub fn add_record(&mut self, record: TransitionRecord) {
        if self.history.len() >= self.history_max_size {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }
}

/// Thread-safe shared state handle
pub type StateHandle = Arc<RwLock<SharedState>>;

pub fn new_state_handle(origin: String, history_max_size: usize) -> StateHandle {
    Arc::new(RwLock::new(SharedState::new(origin, history_max_size)))
}
