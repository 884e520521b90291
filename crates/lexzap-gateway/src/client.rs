//! HTTP client for the remote WhatsApp gateway.
//!
//! One deliberate quirk: the connect/QR endpoint answers 409 when the
//! instance is already in a connecting state, with the same body shape as a
//! 200. That is not fatal to the flow, so 409 is treated as success there
//! and only there. No retries at this layer; retry policy belongs to the
//! orchestrator.

use lexzap_core::{
    config::GatewayConfig,
    error::ZapError,
    traits::InstanceGateway,
    types::{ProvisionedInstance, QrPayload},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Reqwest-backed gateway client.
pub struct UazClient {
    client: reqwest::Client,
    base_url: String,
    admin_token: String,
    timeout: Duration,
}

impl UazClient {
    /// Create from config values.
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            admin_token: cfg.admin_token.clone(),
            timeout: Duration::from_secs(cfg.request_timeout_secs),
        }
    }

    async fn read_json(resp: reqwest::Response, what: &str) -> Result<Value, ZapError> {
        resp.json()
            .await
            .map_err(|e| ZapError::Gateway(format!("{what}: invalid response body: {e}")))
    }
}

#[async_trait]
impl InstanceGateway for UazClient {
    async fn create_instance(&self, name: &str) -> Result<ProvisionedInstance, ZapError> {
        let url = format!("{}/instance/init", self.base_url);
        let resp = self
            .client
            .post(&url)
            // Creation is the one call that uses the tenant-wide credential.
            .header("admintoken", &self.admin_token)
            .timeout(self.timeout)
            .json(&json!({ "name": name }))
            .send()
            .await
            .map_err(|e| ZapError::Gateway(format!("create instance failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ZapError::Gateway(format!(
                "create instance failed: HTTP {status}"
            )));
        }

        let body = Self::read_json(resp, "create instance").await?;
        let token = extract_token(&body).ok_or_else(|| {
            ZapError::Gateway("create instance: no token in response".to_string())
        })?;

        debug!("instance created for '{name}' (token …{})", token_tail(&token));

        Ok(ProvisionedInstance {
            token,
            status: body
                .pointer("/instance/status")
                .or_else(|| body.get("status"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    async fn get_status(&self, token: &str) -> Result<Value, ZapError> {
        let url = format!("{}/instance/status", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("token", token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ZapError::Gateway(format!("instance status failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ZapError::Gateway(format!(
                "instance status failed: HTTP {status}"
            )));
        }

        Self::read_json(resp, "instance status").await
    }

    async fn request_qr_code(&self, token: &str) -> Result<QrPayload, ZapError> {
        let url = format!("{}/instance/connect", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("token", token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ZapError::Gateway(format!("qr request failed: {e}")))?;

        let status = resp.status();
        // 409 means "already connecting"; the body still carries the code.
        if !status.is_success() && status != StatusCode::CONFLICT {
            return Err(ZapError::Gateway(format!("qr request failed: HTTP {status}")));
        }
        if status == StatusCode::CONFLICT {
            warn!("gateway reports instance already connecting, reusing its code");
        }

        let body = Self::read_json(resp, "qr request").await?;
        Ok(extract_qr(&body))
    }

    async fn logout(&self, token: &str) -> Result<(), ZapError> {
        let url = format!("{}/instance/disconnect", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("token", token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ZapError::Gateway(format!("logout failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ZapError::Gateway(format!("logout failed: HTTP {status}")));
        }
        Ok(())
    }

    async fn delete_instance(&self, token: &str) -> Result<(), ZapError> {
        let url = format!("{}/instance", self.base_url);
        let resp = self
            .client
            .delete(&url)
            .header("token", token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ZapError::Gateway(format!("delete instance failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ZapError::Gateway(format!(
                "delete instance failed: HTTP {status}"
            )));
        }
        Ok(())
    }
}

/// Instance token from a provisioning response, top-level or nested.
pub(crate) fn extract_token(body: &Value) -> Option<String> {
    body.get("token")
        .or_else(|| body.pointer("/instance/token"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// QR / pairing code from a connect response, in any of the observed shapes.
pub(crate) fn extract_qr(body: &Value) -> QrPayload {
    let qrcode = body
        .get("qrcode")
        .or_else(|| body.pointer("/instance/qrcode"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let pairing_code = body
        .get("pairingCode")
        .or_else(|| body.pointer("/instance/paircode"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    QrPayload { qrcode, pairing_code }
}

/// Last four characters of a token, for logs that must not leak credentials.
pub fn token_tail(token: &str) -> &str {
    match token.char_indices().rev().nth(3) {
        Some((i, _)) => &token[i..],
        None => token,
    }
}
