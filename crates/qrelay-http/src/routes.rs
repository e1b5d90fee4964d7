use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use qrelay_core::domain::{AccountStatus, MessageView, Phone};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct PhoneParams {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesParams {
    pub phone: String,
    pub uname: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreate {
    pub message_text: String,
    pub from_phone: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub qr_url: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: AccountStatus,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub status: &'static str,
}

/// `POST /login?phone=` — issue a QR challenge and detach the poller.
pub async fn login(
    State(state): State<AppState>,
    Query(params): Query<PhoneParams>,
) -> Result<Json<LoginResponse>, ApiError> {
    let phone = Phone(params.phone);
    let ticket = state.login.start_login(&phone).await?;
    state
        .login
        .clone()
        .spawn_authorization_poller(phone, ticket.challenge);
    Ok(Json(LoginResponse {
        qr_url: ticket.qr_url,
    }))
}

/// `GET /check/login?phone=` — reconcile and report the account status.
pub async fn check_login(
    State(state): State<AppState>,
    Query(params): Query<PhoneParams>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.login.check_status(&Phone(params.phone)).await?;
    Ok(Json(StatusResponse { status }))
}

/// `GET /messages?phone=&uname=` — most recent history for the pair.
pub async fn fetch_messages(
    State(state): State<AppState>,
    Query(params): Query<MessagesParams>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let account = state.store.require_account(&Phone(params.phone)).await?;
    let messages = state
        .store
        .recent_messages(account.id, &params.uname)
        .await?;
    Ok(Json(MessagesResponse { messages }))
}

/// `POST /messages` — relay one outbound message.
pub async fn create_message(
    State(state): State<AppState>,
    Json(body): Json<MessageCreate>,
) -> Result<Json<SendResponse>, ApiError> {
    state
        .relay
        .send(&Phone(body.from_phone), &body.username, &body.message_text)
        .await?;
    Ok(Json(SendResponse {
        status: "Message sent",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{router, AppState};
    use std::{path::PathBuf, sync::Arc, time::Duration};

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use qrelay_core::{
        config::Config,
        domain::NewMessage,
        login::LoginFlow,
        network::{testutil::FakeConnector, ClientRegistry},
        relay::Relay,
        scrape::WildberriesCatalog,
        store::Store,
    };

    struct TestApp {
        app: Router,
        store: Store,
        connector: Arc<FakeConnector>,
    }

    fn tmp_dir() -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir =
            std::env::temp_dir().join(format!("qrelay-http-test-{}-{ts}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn test_app() -> TestApp {
        let sessions_dir = tmp_dir();
        let cfg = Arc::new(Config {
            gateway_url: "http://gateway.local".into(),
            api_id: 1,
            api_hash: "hash".into(),
            database_url: "sqlite::memory:".into(),
            bind_addr: "127.0.0.1:0".into(),
            public_base_url: "http://localhost:8000".into(),
            sessions_dir: sessions_dir.clone(),
            qr_wait_timeout: Duration::from_millis(1),
            qr_max_attempts: 1,
        });

        let store = Store::connect_in_memory().await.unwrap();
        let connector = Arc::new(FakeConnector::default());
        let registry = Arc::new(ClientRegistry::new(connector.clone()));
        let relay = Arc::new(Relay::new(
            store.clone(),
            registry.clone(),
            Arc::new(WildberriesCatalog::new()),
        ));
        let login = Arc::new(LoginFlow::new(
            cfg,
            store.clone(),
            registry,
            relay.clone(),
        ));

        let app = router(AppState {
            store: store.clone(),
            login,
            relay,
            sessions_dir,
        });

        TestApp {
            app,
            store,
            connector,
        }
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn login_creates_account_and_returns_qr_url() {
        let t = test_app().await;

        let resp = t
            .app
            .clone()
            .oneshot(
                Request::post("/login?phone=%2B1000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(
            json["qr_url"],
            "http://localhost:8000/sessions/+1000_qr.png"
        );
        // The account row exists. Its status may already have moved on: the
        // detached poller races this assertion, so only existence is checked
        // here (the pending-before-challenge property is covered in core).
        t.store
            .require_account(&Phone::from("+1000"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn login_while_authorized_is_409_with_reason() {
        let t = test_app().await;
        t.connector.handle("+1000").set_authorized(true);

        let resp = t
            .app
            .clone()
            .oneshot(
                Request::post("/login?phone=%2B1000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let json = body_json(resp).await;
        assert!(json["detail"].as_str().unwrap().contains("authorized"));
    }

    #[tokio::test]
    async fn check_login_for_unknown_phone_is_404() {
        let t = test_app().await;

        let resp = t
            .app
            .clone()
            .oneshot(
                Request::get("/check/login?phone=%2B404")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn check_login_reports_reconciled_status() {
        let t = test_app().await;
        t.store
            .create_or_fetch(&Phone::from("+1000"))
            .await
            .unwrap();
        t.connector.handle("+1000").set_authorized(true);

        let resp = t
            .app
            .clone()
            .oneshot(
                Request::get("/check/login?phone=%2B1000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "active");
    }

    #[tokio::test]
    async fn messages_for_unknown_phone_is_404() {
        let t = test_app().await;

        let resp = t
            .app
            .clone()
            .oneshot(
                Request::get("/messages?phone=%2B404&uname=bob")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn messages_returns_history_for_the_pair() {
        let t = test_app().await;
        let acc = t
            .store
            .create_or_fetch(&Phone::from("+1000"))
            .await
            .unwrap();
        t.store
            .append_message(&NewMessage {
                chat_id: Some(1),
                sender_id: Some(2),
                sender_username: "bob".into(),
                text: "hey".into(),
                is_self: false,
                account_id: acc.id,
                counterpart: "bob".into(),
            })
            .await
            .unwrap();

        let resp = t
            .app
            .clone()
            .oneshot(
                Request::get("/messages?phone=%2B1000&uname=bob")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["messages"][0]["username"], "bob");
        assert_eq!(json["messages"][0]["is_self"], false);
        assert_eq!(json["messages"][0]["message_text"], "hey");
    }

    #[tokio::test]
    async fn send_for_unknown_phone_is_404_and_writes_nothing() {
        let t = test_app().await;

        let resp = t
            .app
            .clone()
            .oneshot(
                Request::post("/messages")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"message_text":"hi","from_phone":"+1000","username":"bob"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let rows: i64 = sqlx_count(&t.store).await;
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn send_relays_and_records_the_message() {
        let t = test_app().await;
        let acc = t
            .store
            .create_or_fetch(&Phone::from("+1000"))
            .await
            .unwrap();

        let resp = t
            .app
            .clone()
            .oneshot(
                Request::post("/messages")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"message_text":"hi","from_phone":"+1000","username":"bob"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "Message sent");
        assert_eq!(
            t.connector.handle("+1000").sent(),
            vec![("bob".to_string(), "hi".to_string())]
        );
        let rows = t.store.recent_messages(acc.id, "bob").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_self);
    }

    async fn sqlx_count(store: &Store) -> i64 {
        // No account rows means no message rows can exist; assert via the
        // public surface to avoid poking at the pool.
        match store.find_account(&Phone::from("+1000")).await.unwrap() {
            Some(acc) => store
                .recent_messages(acc.id, "bob")
                .await
                .unwrap()
                .len() as i64,
            None => 0,
        }
    }
}
