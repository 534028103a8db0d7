//! Audit sink - fire-and-forget persistence of workflow events.

use crate::models::AuditLogEntry;
use crate::services::CredentialStore;

/// Records audit entries without ever failing the calling workflow. Writes
/// happen on a background task; errors end at a log line.
#[derive(Clone)]
pub struct AuditSink {
    store: CredentialStore,
}

impl AuditSink {
    pub fn new(store: CredentialStore) -> Self {
        Self { store }
    }

    pub fn record(&self, entry: AuditLogEntry) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.insert_audit_log(&entry).await {
                tracing::debug!(
                    error = %e,
                    action = %entry.action.as_str(),
                    "Failed to write audit log entry"
                );
            }
        });
    }
}
