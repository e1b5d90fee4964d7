//! HTTP facade: four routes over the login flow and the relay, plus static
//! serving of rendered QR images.

pub mod routes;

use std::{path::PathBuf, sync::Arc};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::services::ServeDir;

use qrelay_core::{login::LoginFlow, relay::Relay, store::Store, Error};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub login: Arc<LoginFlow>,
    pub relay: Arc<Relay>,
    pub sessions_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(routes::login))
        .route("/check/login", get(routes::check_login))
        .route(
            "/messages",
            get(routes::fetch_messages).post(routes::create_message),
        )
        .nest_service("/sessions", ServeDir::new(&state.sessions_dir))
        .with_state(state)
}

/// Maps core errors onto the HTTP surface: not-found and conflict carry a
/// reason; everything else is a generic 500.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            Error::NotFound(reason) => (StatusCode::NOT_FOUND, reason.clone()),
            Error::Conflict(reason) => (StatusCode::CONFLICT, reason.clone()),
            err => {
                tracing::error!("request failed: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
