//! Webhook reload dispatcher

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ReloadConfig;
use crate::io::HttpClient;
use crate::reload::Reloader;

/// Posts the reload request to a configured endpoint, for setups where an
/// external agent (kiosk controller, browser driver) performs the reload
pub struct WebhookReloader {
    url: String,
    token: Option<String>,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for WebhookReloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookReloader")
            .field("url", &self.url)
            .finish()
    }
}

impl WebhookReloader {
    pub fn new(config: &ReloadConfig, http: Arc<dyn HttpClient>) -> Self {
        let ReloadConfig::Webhook { url, token } = config;

        tracing::debug!("Created WebhookReloader for {}", url);

        Self {
            url: url.clone(),
            token: token.clone(),
            http,
        }
    }
}

#[async_trait]
impl Reloader for WebhookReloader {
    fn type_name(&self) -> &str {
        "webhook"
    }

    async fn reload(&self, target: &str) -> crate::Result<()> {
        let mut params = vec![("target", target)];
        if let Some(token) = &self.token {
            params.push(("token", token.as_str()));
        }

        tracing::debug!("Dispatching reload of {} via {}", target, self.url);

        let response = self.http.post_form(&self.url, &params).await?;

        if response.status != 200 {
            return Err(crate::WatchError::Reload(format!(
                "Webhook returned status {}: {}",
                response.status, response.body
            )));
        }

        Ok(())
    }
}
