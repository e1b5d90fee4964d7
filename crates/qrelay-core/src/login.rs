//! QR login orchestration.
//!
//! State machine per account: `pending` → awaiting-authorization → `active`
//! or `inactive`. The polling half runs as a detached task spawned by the
//! facade after a successful `start_login`.

use std::{path::Path, sync::Arc};

use crate::{
    config::Config,
    domain::{AccountStatus, AuthPoll, Phone, QrChallenge},
    errors::Error,
    network::{ClientRegistry, EventSink},
    store::Store,
    Result,
};

/// Outcome of `start_login`: the public image URL for the client plus the
/// challenge the background poller waits on.
#[derive(Clone, Debug)]
pub struct LoginTicket {
    pub qr_url: String,
    pub challenge: QrChallenge,
}

pub struct LoginFlow {
    cfg: Arc<Config>,
    store: Store,
    registry: Arc<ClientRegistry>,
    /// Installed on each connection once it authorizes.
    sink: Arc<dyn EventSink>,
}

impl LoginFlow {
    pub fn new(
        cfg: Arc<Config>,
        store: Store,
        registry: Arc<ClientRegistry>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            cfg,
            store,
            registry,
            sink,
        }
    }

    /// Begin a QR login for `phone`.
    ///
    /// Creates the account row (status `pending`) on first sight, then issues
    /// a challenge and renders it to the sessions directory. Fails with
    /// `Conflict` when the connection is already authorized.
    pub async fn start_login(&self, phone: &Phone) -> Result<LoginTicket> {
        self.store.create_or_fetch(phone).await?;

        let handle = self.registry.get_or_open(phone).await?;
        handle.connect().await?;

        if handle.is_authorized().await? {
            return Err(Error::Conflict(format!("{phone} is already authorized")));
        }

        let challenge = handle.begin_qr().await?;
        render_qr(&challenge.url, &self.cfg.qr_image_path(phone.as_str()))?;

        Ok(LoginTicket {
            qr_url: self.cfg.qr_image_url(phone.as_str()),
            challenge,
        })
    }

    /// Detach the authorization poller for a ticket returned by
    /// `start_login`. Fire-and-forget; failures are logged only.
    pub fn spawn_authorization_poller(self: Arc<Self>, phone: Phone, challenge: QrChallenge) {
        let flow = self;
        tokio::spawn(async move {
            if let Err(err) = flow.wait_for_authorization(phone.clone(), challenge).await {
                tracing::warn!("authorization polling for {phone} failed: {err}");
            }
        });
    }

    /// Poll the challenge until it resolves or the attempt cap runs out.
    ///
    /// Transient failures regenerate the challenge and retry. A
    /// password-needed response is an authorization failure: the account has
    /// an interactive second factor this system cannot supply.
    pub async fn wait_for_authorization(
        &self,
        phone: Phone,
        mut challenge: QrChallenge,
    ) -> Result<()> {
        let handle = self.registry.get_or_open(&phone).await?;

        let mut attempts = 0u32;
        let mut outcome = AuthPoll::Pending;
        while attempts < self.cfg.qr_max_attempts {
            attempts += 1;
            match handle
                .wait_authorized(&challenge, self.cfg.qr_wait_timeout)
                .await
            {
                Ok(AuthPoll::Authorized) => {
                    outcome = AuthPoll::Authorized;
                    break;
                }
                Ok(AuthPoll::Pending) => continue,
                Ok(AuthPoll::PasswordNeeded) => {
                    tracing::info!("{phone}: second factor required, cannot authorize");
                    outcome = AuthPoll::PasswordNeeded;
                    break;
                }
                Err(err) => {
                    tracing::debug!("{phone}: qr wait failed ({err}), regenerating challenge");
                    challenge = match handle.begin_qr().await {
                        Ok(c) => c,
                        Err(e) => {
                            self.store.set_status(&phone, AccountStatus::Inactive).await?;
                            return Err(e);
                        }
                    };
                }
            }
        }

        if outcome == AuthPoll::Authorized && handle.is_authorized().await.unwrap_or(false) {
            let token = handle.session_token().await?;
            self.store.set_authorized(&phone, &token).await?;
            remove_qr_image(&self.cfg, &phone).await;
            handle.subscribe(self.sink.clone()).await?;
            tracing::info!("{phone}: authorized");
        } else {
            self.store.set_status(&phone, AccountStatus::Inactive).await?;
            tracing::info!("{phone}: authorization did not complete");
        }

        Ok(())
    }

    /// Re-verify authorization against the live connection and reconcile the
    /// stored status to match. Idempotent.
    pub async fn check_status(&self, phone: &Phone) -> Result<AccountStatus> {
        self.store.require_account(phone).await?;

        let handle = self.registry.get_or_open(phone).await?;
        handle.connect().await?;

        let status = match handle.is_authorized().await {
            Ok(true) => {
                remove_qr_image(&self.cfg, phone).await;
                AccountStatus::Active
            }
            Ok(false) => AccountStatus::Inactive,
            Err(err) => {
                tracing::warn!("{phone}: authorization check failed: {err}");
                AccountStatus::Inactive
            }
        };

        self.store.set_status(phone, status).await?;
        Ok(status)
    }
}

/// Render the challenge payload as a PNG at `path`.
fn render_qr(payload: &str, path: &Path) -> Result<()> {
    let code = qrcode::QrCode::new(payload).map_err(|e| Error::Qr(e.to_string()))?;
    let img = code.render::<image::Luma<u8>>().build();
    img.save(path).map_err(|e| Error::Qr(e.to_string()))?;
    Ok(())
}

/// Delete a consumed QR image. Missing files are fine.
async fn remove_qr_image(cfg: &Config, phone: &Phone) {
    let path = cfg.qr_image_path(phone.as_str());
    if let Err(err) = tokio::fs::remove_file(&path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove {}: {err}", path.display());
        }
    }
}
