use crate::{
    error::ZapError,
    types::{ProvisionedInstance, QrPayload},
};
use async_trait::async_trait;

/// Remote WhatsApp gateway: instance lifecycle calls.
///
/// A thin request surface with no retry policy: retries belong to the
/// connection orchestrator, which interleaves them with countdowns and
/// polling. Tests substitute a scripted fake.
#[async_trait]
pub trait InstanceGateway: Send + Sync {
    /// Provision a new remote instance. Authenticates with the tenant-wide
    /// admin credential, never a per-instance token.
    async fn create_instance(&self, name: &str) -> Result<ProvisionedInstance, ZapError>;

    /// Fetch the raw status payload for one instance. The shape is
    /// provider-controlled and varies; pass it to the verifier, do not
    /// interpret it here.
    async fn get_status(&self, token: &str) -> Result<serde_json::Value, ZapError>;

    /// Request a fresh QR / pairing code. An HTTP 409 from the provider
    /// means "already connecting" and is returned as a normal payload.
    async fn request_qr_code(&self, token: &str) -> Result<QrPayload, ZapError>;

    /// Log the instance out of its paired session.
    async fn logout(&self, token: &str) -> Result<(), ZapError>;

    /// Delete the remote instance entirely.
    async fn delete_instance(&self, token: &str) -> Result<(), ZapError>;
}
