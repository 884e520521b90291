//! Client row CRUD.

use super::Store;
use lexzap_core::error::ZapError;
use sqlx::Row;
use uuid::Uuid;

/// Persisted connection status. Coarser than the in-memory state machine:
/// the durable store only cares whether the instance is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    Conectado,
    Connecting,
    Desconectado,
}

impl ConnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conectado => "conectado",
            Self::Connecting => "connecting",
            Self::Desconectado => "desconectado",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "conectado" => Self::Conectado,
            "connecting" => Self::Connecting,
            _ => Self::Desconectado,
        }
    }
}

/// One law-firm client and its instance connection state.
#[derive(Debug, Clone)]
pub struct ClientRow {
    pub id: String,
    pub name: String,
    pub instance_token: Option<String>,
    pub status_conexao: ConnStatus,
    pub ultima_conexao: Option<String>,
    pub ultima_desconexao: Option<String>,
}

fn row_to_client(row: &sqlx::sqlite::SqliteRow) -> ClientRow {
    ClientRow {
        id: row.get("id"),
        name: row.get("name"),
        instance_token: row.get("instance_token"),
        status_conexao: ConnStatus::parse(&row.get::<String, _>("status_conexao")),
        ultima_conexao: row.get("ultima_conexao"),
        ultima_desconexao: row.get("ultima_desconexao"),
    }
}

impl Store {
    /// Create a client record with no instance yet.
    pub async fn create_client(&self, name: &str) -> Result<String, ZapError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO clients (id, name) VALUES (?, ?)")
            .bind(&id)
            .bind(name)
            .execute(self.pool())
            .await
            .map_err(|e| ZapError::Store(format!("failed to create client '{name}': {e}")))?;
        Ok(id)
    }

    /// Attach the provisioned instance token. The token is immutable: a row
    /// that already has one is left untouched.
    pub async fn set_instance_token(&self, id: &str, token: &str) -> Result<bool, ZapError> {
        let result = sqlx::query(
            "UPDATE clients SET instance_token = ? WHERE id = ? AND instance_token IS NULL",
        )
        .bind(token)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| ZapError::Store(format!("failed to set instance token: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_client_by_name(&self, name: &str) -> Result<Option<ClientRow>, ZapError> {
        let row = sqlx::query("SELECT * FROM clients WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| ZapError::Store(format!("failed to load client '{name}': {e}")))?;
        Ok(row.as_ref().map(row_to_client))
    }

    pub async fn get_client(&self, id: &str) -> Result<Option<ClientRow>, ZapError> {
        let row = sqlx::query("SELECT * FROM clients WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| ZapError::Store(format!("failed to load client {id}: {e}")))?;
        Ok(row.as_ref().map(row_to_client))
    }

    pub async fn list_clients(&self) -> Result<Vec<ClientRow>, ZapError> {
        let rows = sqlx::query("SELECT * FROM clients ORDER BY name")
            .fetch_all(self.pool())
            .await
            .map_err(|e| ZapError::Store(format!("failed to list clients: {e}")))?;
        Ok(rows.iter().map(row_to_client).collect())
    }

    pub async fn delete_client(&self, id: &str) -> Result<(), ZapError> {
        sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| ZapError::Store(format!("failed to delete client {id}: {e}")))?;
        Ok(())
    }

    /// Write a new connection status plus the matching transition timestamp.
    /// Reserved to the reconciler; see [`crate::reconciler`].
    pub(crate) async fn write_connection_status(
        &self,
        id: &str,
        status: ConnStatus,
    ) -> Result<(), ZapError> {
        let sql = match status {
            ConnStatus::Conectado => {
                "UPDATE clients SET status_conexao = ?, ultima_conexao = datetime('now') WHERE id = ?"
            }
            _ => {
                "UPDATE clients SET status_conexao = ?, ultima_desconexao = datetime('now') WHERE id = ?"
            }
        };
        sqlx::query(sql)
            .bind(status.as_str())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| ZapError::Store(format!("failed to update status for {id}: {e}")))?;
        Ok(())
    }
}
