//! WebSocket event stream: decodes gateway frames into inbound events for
//! the subscribed sink.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use qrelay_core::{
    domain::InboundEvent,
    errors::Error,
    network::EventSink,
    Result,
};

/// Wire shape of one event frame.
#[derive(Debug, Deserialize)]
pub struct WireEvent {
    pub chat_id: i64,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub sender_username: Option<String>,
    #[serde(default)]
    pub chat_username: Option<String>,
    pub text: String,
    #[serde(default)]
    pub outgoing: bool,
}

impl WireEvent {
    fn into_event(self, session_token: &str) -> InboundEvent {
        InboundEvent {
            session_token: session_token.to_string(),
            chat_id: self.chat_id,
            sender_id: self.sender_id,
            sender_username: self.sender_username,
            counterpart_username: self.chat_username,
            text: self.text,
            outgoing: self.outgoing,
        }
    }
}

/// The `ws(s)` URL of the event stream for `phone`.
pub(crate) fn events_ws_url(base_url: &str, phone: &str) -> Result<String> {
    let mut url = url::Url::parse(base_url)
        .map_err(|e| Error::Upstream(format!("bad gateway url {base_url:?}: {e}")))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::Upstream(format!("bad gateway url scheme in {base_url:?}")))?;
    url.set_path(&format!("/v1/accounts/{phone}/events"));
    Ok(url.to_string())
}

/// Read frames until the stream closes, handing each decoded event to the
/// sink. Runs as a detached task; errors are logged, not retried.
pub(crate) async fn run_event_loop(ws_url: String, session_token: String, sink: Arc<dyn EventSink>) {
    let (mut stream, _) = match connect_async(ws_url.as_str()).await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::warn!("event stream connect failed for {ws_url}: {err}");
            return;
        }
    };

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<WireEvent>(&text) {
                Ok(wire) => {
                    if let Err(err) = sink.on_event(wire.into_event(&session_token)).await {
                        tracing::warn!("inbound event handling failed: {err}");
                    }
                }
                Err(err) => tracing::debug!("undecodable event frame: {err}"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!("event stream error: {err}");
                break;
            }
        }
    }
    tracing::info!("event stream for {ws_url} ended");
}
