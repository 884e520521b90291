//! Reconciles verified remote connection state into the durable store.
//!
//! The reconciler is the sole writer of `status_conexao` outside direct
//! user-initiated disconnects. Writes are last-write-wins: connection status
//! is a coarse, frequently re-verified signal, so optimistic locking buys
//! nothing here.

use crate::audit::{AuditEntry, AuditEvent, AuditLogger};
use crate::store::{ClientRow, ConnStatus, Store};
use lexzap_core::{error::ZapError, traits::InstanceGateway};
use lexzap_gateway::verify;
use serde_json::json;
use tracing::{debug, info, warn};

/// Outcome of a bulk reconciliation pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub updated: usize,
    pub unchanged: usize,
    /// Per-client failures; one bad instance never aborts the batch.
    pub failed: Vec<(String, String)>,
}

/// Decide whether a verified state requires a write. Pure: `None` means the
/// stored row already agrees and not a single statement should be issued.
pub fn needs_update(stored: ConnStatus, is_connected: bool) -> Option<ConnStatus> {
    let desired = if is_connected {
        ConnStatus::Conectado
    } else {
        ConnStatus::Desconectado
    };
    // `connecting` rows count as disagreement either way: the in-flight
    // state is only meaningful to a live session, not to the durable store.
    if stored == desired {
        None
    } else {
        Some(desired)
    }
}

pub struct Reconciler {
    store: Store,
    audit: AuditLogger,
}

impl Reconciler {
    pub fn new(store: Store, audit: AuditLogger) -> Self {
        Self { store, audit }
    }

    /// Sync one client against a verified `is_connected`. Returns whether a
    /// write was issued. A stale `conectado` row with no live remote session
    /// is exactly the inconsistency this corrects.
    pub async fn reconcile_one(
        &self,
        client: &ClientRow,
        is_connected: bool,
    ) -> Result<bool, ZapError> {
        let Some(desired) = needs_update(client.status_conexao, is_connected) else {
            debug!("client '{}' already {}", client.name, client.status_conexao.as_str());
            return Ok(false);
        };

        self.store.write_connection_status(&client.id, desired).await?;
        info!(
            "client '{}': {} -> {}",
            client.name,
            client.status_conexao.as_str(),
            desired.as_str()
        );

        let event = if is_connected {
            AuditEvent::Connected
        } else {
            AuditEvent::Disconnected
        };
        self.audit
            .log_best_effort(&AuditEntry {
                client_id: client.id.clone(),
                event,
                description: format!(
                    "status reconciled from {} to {}",
                    client.status_conexao.as_str(),
                    desired.as_str()
                ),
                metadata: json!({ "previous": client.status_conexao.as_str() }),
            })
            .await;

        Ok(true)
    }

    /// Reconcile every client that has an instance, independently. Each
    /// client's remote status is fetched and verified on its own; a failure
    /// is recorded in the report and the batch continues.
    pub async fn sync_all(&self, gateway: &dyn InstanceGateway) -> Result<SyncReport, ZapError> {
        let mut report = SyncReport::default();

        for client in self.store.list_clients().await? {
            let Some(token) = client.instance_token.as_deref() else {
                continue;
            };

            let verified = match gateway.get_status(token).await {
                Ok(raw) => verify(&raw).is_connected,
                Err(e) => {
                    warn!("sync: could not verify '{}': {e}", client.name);
                    report.failed.push((client.name.clone(), e.to_string()));
                    continue;
                }
            };

            match self.reconcile_one(&client, verified).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => report.failed.push((client.name.clone(), e.to_string())),
            }
        }

        info!(
            "sync finished: {} updated, {} unchanged, {} failed",
            report.updated,
            report.unchanged,
            report.failed.len()
        );
        Ok(report)
    }
}
