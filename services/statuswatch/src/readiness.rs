//! Readiness endpoint probe

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::io::HttpClient;
use crate::monitor::{PollResult, Probe};

/// Path of the readiness resource, relative to the monitored origin
pub const READINESS_PATH: &str = "/actuator/health/readiness";

/// Readiness response body. Anything beyond the status field is ignored.
#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    status: Option<String>,
}

/// Polls `<origin>/actuator/health/readiness` and classifies the answer
pub struct ReadinessProbe {
    origin: String,
    endpoint: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for ReadinessProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessProbe")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl ReadinessProbe {
    pub fn new(origin: &str, http: Arc<dyn HttpClient>) -> Self {
        let origin = origin.trim_end_matches('/').to_string();
        let endpoint = format!("{}{}", origin, READINESS_PATH);

        tracing::debug!("Created ReadinessProbe for {}", endpoint);

        Self {
            origin,
            endpoint,
            http,
        }
    }
}

#[async_trait]
impl Probe for ReadinessProbe {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn poll(&self) -> PollResult {
        // The HTTP status code is deliberately not consulted: readiness
        // endpoints report their verdict in the body, on 503 as well as 200.
        match self.http.get(&self.endpoint).await {
            Ok(response) => match serde_json::from_str::<HealthBody>(&response.body) {
                Ok(body) => PollResult::reported(body.status),
                Err(e) => {
                    tracing::debug!("Malformed readiness body from {}: {}", self.endpoint, e);
                    PollResult::unreachable()
                }
            },
            Err(e) => {
                tracing::debug!("Readiness poll of {} failed: {}", self.endpoint, e);
                PollResult::unreachable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{HttpResponse, MockHttpClient};

    fn probe_with(mock: MockHttpClient) -> ReadinessProbe {
        ReadinessProbe::new("https://files.example.com", Arc::new(mock))
    }

    #[tokio::test]
    async fn polls_the_readiness_endpoint() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url| url == "https://files.example.com/actuator/health/readiness")
            .returning(|_| {
                Box::pin(async {
                    Ok(HttpResponse {
                        status: 200,
                        body: r#"{"status":"UP"}"#.to_string(),
                    })
                })
            });

        let result = probe_with(mock).poll().await;
        assert!(result.is_healthy());
    }

    #[tokio::test]
    async fn trailing_slash_on_origin_is_tolerated() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url| url == "https://files.example.com/actuator/health/readiness")
            .returning(|_| {
                Box::pin(async {
                    Ok(HttpResponse {
                        status: 200,
                        body: r#"{"status":"UP"}"#.to_string(),
                    })
                })
            });

        let probe = ReadinessProbe::new("https://files.example.com/", Arc::new(mock));
        assert_eq!(probe.origin(), "https://files.example.com");
        assert!(probe.poll().await.is_healthy());
    }

    #[tokio::test]
    async fn degraded_status_is_reported_but_unhealthy() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 200,
                    body: r#"{"status":"DEGRADED"}"#.to_string(),
                })
            })
        });

        let result = probe_with(mock).poll().await;
        assert!(result.reachable);
        assert_eq!(result.status.as_deref(), Some("DEGRADED"));
        assert!(!result.is_healthy());
    }

    #[tokio::test]
    async fn missing_status_field_is_reported_without_status() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 200,
                    body: r#"{}"#.to_string(),
                })
            })
        });

        let result = probe_with(mock).poll().await;
        assert!(result.reachable);
        assert!(result.status.is_none());
        assert!(!result.is_healthy());
    }

    #[tokio::test]
    async fn down_body_on_503_is_still_parsed() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 503,
                    body: r#"{"status":"DOWN"}"#.to_string(),
                })
            })
        });

        let result = probe_with(mock).poll().await;
        assert!(result.reachable);
        assert_eq!(result.status.as_deref(), Some("DOWN"));
        assert!(!result.is_healthy());
    }

    #[tokio::test]
    async fn non_json_body_is_unreachable() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 502,
                    body: "<html>Bad Gateway</html>".to_string(),
                })
            })
        });

        let result = probe_with(mock).poll().await;
        assert_eq!(result, PollResult::unreachable());
    }

    #[tokio::test]
    async fn transport_error_is_unreachable() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async { Err(crate::WatchError::Http("connection refused".to_string())) })
        });

        let result = probe_with(mock).poll().await;
        assert_eq!(result, PollResult::unreachable());
    }
}
