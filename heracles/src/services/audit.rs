use std::sync::Arc;

use crate::models::{AuditAction, AuditData, AuditLogEntry, NewAuditLogEntry, User};
use crate::services::{ServiceError, Store};

/// Entries returned by the recent-log endpoint.
pub const RECENT_LIMIT: i64 = 100;

/// Build an audit payload from key/value pairs.
pub fn audit_data<const N: usize>(pairs: [(&str, serde_json::Value); N]) -> AuditData {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Appends security events. Callers propagate failures: an operation whose
/// audit entry cannot be written does not complete.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn Store>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        action: AuditAction,
        user: &User,
        data: AuditData,
    ) -> Result<AuditLogEntry, ServiceError> {
        let entry = self
            .store
            .create_audit_entry(NewAuditLogEntry {
                action,
                user_id: user.id,
                data,
            })
            .await
            .map_err(|e| {
                tracing::error!(action = action.as_str(), user_id = user.id, error = %e, "Failed to record audit entry");
                e
            })?;

        tracing::info!(
            audit_id = entry.id,
            action = action.as_str(),
            user_id = user.id,
            login = action.is_login(),
            "Audit entry recorded"
        );
        Ok(entry)
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditLogEntry>, ServiceError> {
        self.store.list_recent_audit_entries(limit).await
    }
}
