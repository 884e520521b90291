//! Append-only audit log of externally visible instance transitions.

use lexzap_core::error::ZapError;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

/// Externally visible events worth an audit trail entry.
#[derive(Debug, Clone, Copy)]
pub enum AuditEvent {
    InstanceCreated,
    QrGenerated,
    Connected,
    Disconnected,
}

impl AuditEvent {
    fn as_str(&self) -> &'static str {
        match self {
            Self::InstanceCreated => "instance_created",
            Self::QrGenerated => "qr_generated",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

/// An entry to append to the audit log.
pub struct AuditEntry {
    pub client_id: String,
    pub event: AuditEvent,
    pub description: String,
    pub metadata: serde_json::Value,
}

/// Audit logger backed by SQLite.
#[derive(Clone)]
pub struct AuditLogger {
    pool: SqlitePool,
}

impl AuditLogger {
    /// Create a new audit logger sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry to the audit log.
    pub async fn log(&self, entry: &AuditEntry) -> Result<(), ZapError> {
        let id = Uuid::new_v4().to_string();
        let metadata = entry.metadata.to_string();

        sqlx::query(
            "INSERT INTO audit_log (id, client_id, event_type, description, metadata) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&entry.client_id)
        .bind(entry.event.as_str())
        .bind(&entry.description)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| ZapError::Store(format!("audit log write failed: {e}")))?;

        debug!(
            "audit: {} {} {}",
            entry.client_id,
            entry.event.as_str(),
            entry.description
        );

        Ok(())
    }

    /// Append an entry, swallowing failures. Audit is best-effort: a failed
    /// log write must never fail the operation that triggered it, since the
    /// connection it records may well have succeeded.
    pub async fn log_best_effort(&self, entry: &AuditEntry) {
        if let Err(e) = self.log(entry).await {
            warn!("audit write dropped ({}): {e}", entry.event.as_str());
        }
    }
}
