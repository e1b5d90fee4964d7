use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use qrelay_core::{
    domain::{AuthPoll, QrChallenge},
    errors::Error,
    network::{EventSink, NetworkConnector, NetworkHandle},
    Result,
};

use crate::events;

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_id: i32,
    pub api_hash: String,
}

/// Opens one [`GatewayHandle`] per account.
pub struct GatewayConnector {
    cfg: GatewayConfig,
    http: reqwest::Client,
}

impl GatewayConnector {
    pub fn new(cfg: GatewayConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client build");
        Self { cfg, http }
    }
}

#[async_trait]
impl NetworkConnector for GatewayConnector {
    async fn open(&self, phone: &str) -> Result<Arc<dyn NetworkHandle>> {
        Ok(Arc::new(GatewayHandle {
            cfg: self.cfg.clone(),
            http: self.http.clone(),
            phone: phone.to_string(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct AuthorizedResponse {
    authorized: bool,
}

#[derive(Debug, Deserialize)]
struct QrResponse {
    token: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct WaitResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    text: &'a str,
}

/// One gateway-backed connection, bound to one phone number.
pub struct GatewayHandle {
    cfg: GatewayConfig,
    http: reqwest::Client,
    phone: String,
}

impl GatewayHandle {
    fn url(&self, tail: &str) -> String {
        format!(
            "{}/v1/accounts/{}/{tail}",
            self.cfg.base_url.trim_end_matches('/'),
            self.phone
        )
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("x-api-id", self.cfg.api_id)
            .bearer_auth(&self.cfg.api_hash)
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "gateway returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        resp.json::<T>()
            .await
            .map_err(|e| Error::Upstream(format!("gateway response decode error: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let resp = self
            .authed(self.http.get(url))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("gateway request error: {e}")))?;
        Self::decode(resp).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(&self, url: String, body: &B) -> Result<T> {
        let resp = self
            .authed(self.http.post(url).json(body))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("gateway request error: {e}")))?;
        Self::decode(resp).await
    }
}

#[derive(Debug, Deserialize)]
struct Empty {}

#[async_trait]
impl NetworkHandle for GatewayHandle {
    async fn connect(&self) -> Result<()> {
        let _: Empty = self
            .post_json(self.url("connect"), &serde_json::json!({}))
            .await?;
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool> {
        let resp: AuthorizedResponse = self.get_json(self.url("authorized")).await?;
        Ok(resp.authorized)
    }

    async fn begin_qr(&self) -> Result<QrChallenge> {
        let resp: QrResponse = self
            .post_json(self.url("qr"), &serde_json::json!({}))
            .await?;
        Ok(QrChallenge {
            token: resp.token,
            url: resp.url,
        })
    }

    async fn wait_authorized(
        &self,
        challenge: &QrChallenge,
        timeout: Duration,
    ) -> Result<AuthPoll> {
        let url = format!(
            "{}?timeout={}",
            self.url(&format!("qr/{}/wait", challenge.token)),
            timeout.as_secs()
        );
        let resp: WaitResponse = self.get_json(url).await?;
        match resp.status.as_str() {
            "authorized" => Ok(AuthPoll::Authorized),
            "pending" => Ok(AuthPoll::Pending),
            "password_needed" => Ok(AuthPoll::PasswordNeeded),
            other => Err(Error::Upstream(format!("unknown wait status {other:?}"))),
        }
    }

    async fn session_token(&self) -> Result<String> {
        let resp: SessionResponse = self.get_json(self.url("session")).await?;
        Ok(resp.token)
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        let _: Empty = self
            .post_json(self.url("messages"), &SendRequest { to, text })
            .await?;
        Ok(())
    }

    async fn subscribe(&self, sink: Arc<dyn EventSink>) -> Result<()> {
        let ws_url = events::events_ws_url(&self.cfg.base_url, &self.phone)?;
        let session_token = self.session_token().await?;
        tokio::spawn(events::run_event_loop(ws_url, session_token, sink));
        Ok(())
    }
}
