//! Reloader trait for dispatching the reload action on recovery

use async_trait::async_trait;

/// Trait for executing the reload side effect once the server is back
#[async_trait]
pub trait Reloader: Send + Sync + std::fmt::Debug {
    /// Get the reloader type name (e.g. "webhook")
    fn type_name(&self) -> &str;

    /// Request a reload of the given target
    async fn reload(&self, target: &str) -> crate::Result<()>;
}

/// Default reloader: records the intent in the log and succeeds
#[derive(Debug, Default)]
pub struct TraceReloader;

#[async_trait]
impl Reloader for TraceReloader {
    fn type_name(&self) -> &str {
        "trace"
    }

    async fn reload(&self, target: &str) -> crate::Result<()> {
        tracing::info!("Reload requested for {}", target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trace_reloader_always_succeeds() {
        let reloader = TraceReloader;
        assert_eq!(reloader.type_name(), "trace");
        reloader
            .reload("https://files.example.com/workspace")
            .await
            .unwrap();
    }
}
