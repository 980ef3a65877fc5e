pub mod in_memory;
pub mod subscriber;

use crate::core::errors::SettleError;
use crate::core::models::AppLog;
use async_trait::async_trait;

pub use subscriber::init_tracing;

/// Sink for the structured action log every engine mutation writes.
#[async_trait]
pub trait LoggingService: Send + Sync {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        group_id: Option<&str>,
    ) -> Result<(), SettleError>;
    async fn get_logs(&self) -> Result<Vec<AppLog>, SettleError>;
    /// Entries recorded for one group, oldest first.
    async fn get_group_logs(&self, group_id: &str) -> Result<Vec<AppLog>, SettleError>;
}
