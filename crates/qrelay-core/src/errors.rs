/// Core error type.
///
/// Adapter crates map their specific errors into this type so the facade can
/// translate failures consistently (client-visible reason vs generic 500).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// Unknown account (or other missing entity). Client-visible.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with current state, e.g. a login request for
    /// an account that is already authorized. Client-visible.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Gateway / network-library failure.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("qr render error: {0}")]
    Qr(String),
}

pub type Result<T> = std::result::Result<T, Error>;
