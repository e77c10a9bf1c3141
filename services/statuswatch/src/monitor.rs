//! Probe trait and availability state types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health verdict the readiness endpoint reports when the server is ready
pub const STATUS_UP: &str = "UP";

/// Availability of the monitored origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityState {
    Up,
    Down,
}

impl fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityState::Up => write!(f, "UP"),
            AvailabilityState::Down => write!(f, "DOWN"),
        }
    }
}

/// Outcome of a single readiness poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    /// False when the request failed or the body was not JSON
    pub reachable: bool,
    /// The reported `status` field, None when the field was absent
    pub status: Option<String>,
}

impl PollResult {
    /// The server could not be reached or answered garbage
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            status: None,
        }
    }

    /// The server answered with a well-formed body
    pub fn reported(status: Option<String>) -> Self {
        Self {
            reachable: true,
            status,
        }
    }

    /// Healthy iff the server answered and reported exactly "UP"
    pub fn is_healthy(&self) -> bool {
        self.reachable && self.status.as_deref() == Some(STATUS_UP)
    }
}

/// Trait for polling the readiness of an origin
#[async_trait]
pub trait Probe: Send + Sync + std::fmt::Debug {
    /// The origin being monitored
    fn origin(&self) -> &str;

    /// Poll the readiness endpoint once
    async fn poll(&self) -> PollResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_status_is_healthy() {
        let result = PollResult::reported(Some("UP".to_string()));
        assert!(result.is_healthy());
    }

    #[test]
    fn degraded_status_is_not_healthy() {
        let result = PollResult::reported(Some("DEGRADED".to_string()));
        assert!(!result.is_healthy());
    }

    #[test]
    fn missing_status_is_not_healthy() {
        let result = PollResult::reported(None);
        assert!(!result.is_healthy());
    }

    #[test]
    fn unreachable_is_not_healthy() {
        let result = PollResult::unreachable();
        assert!(!result.is_healthy());
    }

    #[test]
    fn lowercase_up_is_not_healthy() {
        let result = PollResult::reported(Some("up".to_string()));
        assert!(!result.is_healthy());
    }

    #[test]
    fn state_display() {
        assert_eq!(AvailabilityState::Up.to_string(), "UP");
        assert_eq!(AvailabilityState::Down.to_string(), "DOWN");
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AvailabilityState::Up).unwrap(),
            r#""up""#
        );
        assert_eq!(
            serde_json::to_string(&AvailabilityState::Down).unwrap(),
            r#""down""#
        );
    }
}
