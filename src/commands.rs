//! CLI command implementations: a thin consumer of the orchestrator's
//! snapshot stream plus the store/audit plumbing around it.

use anyhow::{bail, Context};
use lexzap_conn::{ConnState, ConnectOrchestrator, SessionSnapshot};
use lexzap_core::{config::Config, traits::InstanceGateway};
use lexzap_gateway::{client::token_tail, qr, UazClient};
use lexzap_store::audit::{AuditEntry, AuditEvent, AuditLogger};
use lexzap_store::reconciler::Reconciler;
use lexzap_store::{ClientRow, Store};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tracing::warn;

struct Ctx {
    store: Store,
    gateway: Arc<UazClient>,
    audit: AuditLogger,
}

impl Ctx {
    async fn init(cfg: &Config) -> anyhow::Result<Self> {
        if cfg.gateway.admin_token.is_empty() {
            warn!("gateway.admin_token is empty; instance creation will be refused upstream");
        }
        let store = Store::new(&cfg.storage).await?;
        let audit = AuditLogger::new(store.pool().clone());
        Ok(Self {
            store,
            gateway: Arc::new(UazClient::from_config(&cfg.gateway)),
            audit,
        })
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.store.clone(), self.audit.clone())
    }

    async fn require_client(&self, name: &str) -> anyhow::Result<ClientRow> {
        self.store
            .get_client_by_name(name)
            .await?
            .with_context(|| format!("client '{name}' not found; run `lexzap add {name}` first"))
    }
}

pub async fn add(cfg: &Config, name: &str) -> anyhow::Result<()> {
    let ctx = Ctx::init(cfg).await?;
    if ctx.store.get_client_by_name(name).await?.is_some() {
        bail!("client '{name}' already exists");
    }

    let id = ctx.store.create_client(name).await?;
    let instance = ctx.gateway.create_instance(name).await?;
    ctx.store.set_instance_token(&id, &instance.token).await?;

    ctx.audit
        .log_best_effort(&AuditEntry {
            client_id: id,
            event: AuditEvent::InstanceCreated,
            description: format!("instância provisionada para {name}"),
            metadata: json!({ "initial_status": instance.status }),
        })
        .await;

    println!("Cliente '{name}' criado (token …{}).", token_tail(&instance.token));
    println!("Rode `lexzap connect \"{name}\"` para parear o WhatsApp.");
    Ok(())
}

pub async fn list(cfg: &Config) -> anyhow::Result<()> {
    let ctx = Ctx::init(cfg).await?;
    let clients = ctx.store.list_clients().await?;
    if clients.is_empty() {
        println!("Nenhum cliente cadastrado.");
        return Ok(());
    }

    println!(
        "{:<28} {:<14} {:<20} {:<20}",
        "CLIENTE", "STATUS", "ÚLTIMA CONEXÃO", "ÚLTIMA DESCONEXÃO"
    );
    for c in clients {
        println!(
            "{:<28} {:<14} {:<20} {:<20}",
            c.name,
            c.status_conexao.as_str(),
            c.ultima_conexao.as_deref().unwrap_or("-"),
            c.ultima_desconexao.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub async fn connect(cfg: &Config, name: &str) -> anyhow::Result<()> {
    let ctx = Ctx::init(cfg).await?;
    let client = ctx.require_client(name).await?;
    let token = client
        .instance_token
        .clone()
        .context("client has no provisioned instance")?;

    let gateway: Arc<dyn InstanceGateway> = ctx.gateway.clone();
    let orch = ConnectOrchestrator::new(gateway, token, cfg.connect);
    let mut rx = orch.subscribe();
    orch.start_connection().await?;

    let mut qr_shown = false;
    let outcome = loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break None;
                }
                let snap = rx.borrow_and_update().clone();
                match snap.state {
                    ConnState::Waiting => {
                        if !qr_shown {
                            qr_shown = true;
                            show_qr(&snap)?;
                            ctx.audit
                                .log_best_effort(&AuditEntry {
                                    client_id: client.id.clone(),
                                    event: AuditEvent::QrGenerated,
                                    description: "QR code exibido para pareamento".to_string(),
                                    metadata: json!({ "ttl_secs": cfg.connect.qr_ttl_secs }),
                                })
                                .await;
                        }
                        print!("\r  aguardando leitura… {:>3}s ", snap.countdown);
                        let _ = std::io::stdout().flush();
                    }
                    ConnState::Connecting => {
                        print!("\r  QR lido, concluindo pareamento…     ");
                        let _ = std::io::stdout().flush();
                    }
                    s if s.is_terminal() => break Some(snap),
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                orch.reset_connection().await;
                println!("\nConexão cancelada.");
                return Ok(());
            }
        }
    };

    println!();
    let Some(snap) = outcome else {
        return Ok(());
    };

    match snap.state {
        ConnState::Connected => {
            println!(
                "✓ Conectado como {} ({})",
                snap.profile_name.as_deref().unwrap_or("?"),
                snap.phone_number.as_deref().unwrap_or("?"),
            );
            // The connection itself succeeded; a failed status write is an
            // operational problem, not a connection failure.
            if let Err(e) = ctx.reconciler().reconcile_one(&client, true).await {
                warn!("status write failed after successful connection: {e}");
            }
        }
        ConnState::Timeout => {
            println!("O QR code expirou sem leitura. Rode o comando novamente para gerar outro.");
        }
        ConnState::Error => {
            if let Some(err) = snap.error {
                bail!("{}", err.message);
            }
        }
        _ => {}
    }
    Ok(())
}

pub async fn disconnect(cfg: &Config, name: &str) -> anyhow::Result<()> {
    let ctx = Ctx::init(cfg).await?;
    let client = ctx.require_client(name).await?;
    let token = client
        .instance_token
        .clone()
        .context("client has no provisioned instance")?;

    ctx.gateway.logout(&token).await?;
    ctx.reconciler().reconcile_one(&client, false).await?;
    println!("Instância de '{name}' desconectada.");
    Ok(())
}

pub async fn remove(cfg: &Config, name: &str) -> anyhow::Result<()> {
    let ctx = Ctx::init(cfg).await?;
    let client = ctx.require_client(name).await?;

    if let Some(token) = &client.instance_token {
        // Remote deletion is best-effort; the local record goes either way.
        if let Err(e) = ctx.gateway.delete_instance(token).await {
            warn!("remote instance deletion failed: {e}");
        }
    }
    ctx.store.delete_client(&client.id).await?;
    println!("Cliente '{name}' removido.");
    Ok(())
}

pub async fn sync(cfg: &Config) -> anyhow::Result<()> {
    let ctx = Ctx::init(cfg).await?;
    let report = ctx.reconciler().sync_all(ctx.gateway.as_ref()).await?;

    println!(
        "Sincronização: {} atualizados, {} sem mudança, {} falhas.",
        report.updated,
        report.unchanged,
        report.failed.len()
    );
    for (name, err) in &report.failed {
        println!("  {name}: {err}");
    }
    Ok(())
}

fn show_qr(snap: &SessionSnapshot) -> anyhow::Result<()> {
    if let Some(payload) = snap.qr_code.as_deref() {
        if qr::is_data_url(payload) {
            let bytes = qr::decode_data_url(payload)?;
            let path = std::env::temp_dir().join("lexzap-qr.png");
            std::fs::write(&path, bytes)?;
            println!("QR code salvo em {}; abra a imagem e escaneie.", path.display());
        } else {
            println!("{}", qr::render_terminal(payload)?);
        }
    }
    if let Some(code) = snap.pairing_code.as_deref() {
        println!("  Código de pareamento alternativo: {code}");
    }
    Ok(())
}
