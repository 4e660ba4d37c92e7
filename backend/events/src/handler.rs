use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

/// A subscriber callback.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: &Value) -> Result<()>;
}

/// Adapts an async closure into an [`EventHandler`].
///
/// The closure receives its own clone of the payload.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, payload: &Value) -> Result<()> {
        (self.0)(payload.clone()).await
    }
}
