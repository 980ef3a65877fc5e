use crate::core::errors::SettleError;
use crate::core::models::AppLog;
use crate::infrastructure::logging::LoggingService;
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Append-only action log. Entries are never rewritten, so a group's history
/// is its entries in insertion order.
#[derive(Clone, Default)]
pub struct InMemoryLogging {
    logs: Arc<RwLock<Vec<AppLog>>>,
}

impl InMemoryLogging {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoggingService for InMemoryLogging {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        group_id: Option<&str>,
    ) -> Result<(), SettleError> {
        let details = match details {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            other => {
                return Err(SettleError::LoggingError(format!(
                    "Details of {} must be a JSON object, got {}",
                    action, other
                )));
            }
        };
        let entry = AppLog {
            id: Uuid::new_v4().to_string(),
            action: action.to_string(),
            group_id: group_id.map(String::from),
            details,
            timestamp: chrono::Utc::now(),
        };
        debug!("Recorded {} for group {:?}", entry.action, entry.group_id);
        self.logs.write().await.push(entry);
        Ok(())
    }

    async fn get_logs(&self) -> Result<Vec<AppLog>, SettleError> {
        let logs = self.logs.read().await;
        Ok(logs.clone())
    }

    async fn get_group_logs(&self, group_id: &str) -> Result<Vec<AppLog>, SettleError> {
        let logs = self.logs.read().await;
        Ok(logs
            .iter()
            .filter(|log| log.group_id.as_deref() == Some(group_id))
            .cloned()
            .collect())
    }
}
