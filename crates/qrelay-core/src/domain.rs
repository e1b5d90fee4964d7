use serde::{Deserialize, Serialize};

/// Phone number identifying an account (kept verbatim, `+` prefix included).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Phone(pub String);

impl Phone {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Phone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Phone {
    fn from(s: &str) -> Self {
        Phone(s.to_string())
    }
}

/// Account lifecycle. Exactly one status holds at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AccountStatus::Pending),
            "active" => Some(AccountStatus::Active),
            "inactive" => Some(AccountStatus::Inactive),
            _ => None,
        }
    }
}

/// A persisted account row.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: i64,
    pub phone: Phone,
    pub status: AccountStatus,
    /// Opaque serialized network session, set once authorization completes.
    pub session_token: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A message row to append. Rows are immutable once written.
#[derive(Clone, Debug)]
pub struct NewMessage {
    /// Network chat id; `None` for synthetic outbound sends.
    pub chat_id: Option<i64>,
    pub sender_id: Option<i64>,
    pub sender_username: String,
    pub text: String,
    pub is_self: bool,
    pub account_id: i64,
    /// Display name of the conversation counterpart.
    pub counterpart: String,
}

/// Message shape returned by the history endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageView {
    pub username: String,
    pub is_self: bool,
    pub message_text: String,
}

/// One-time QR login challenge issued by the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrChallenge {
    pub token: String,
    /// The `tg://login?...` style payload encoded into the QR image.
    pub url: String,
}

/// Outcome of one bounded wait on a QR challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthPoll {
    Authorized,
    Pending,
    /// The account has an interactive second factor we cannot supply.
    PasswordNeeded,
}

/// Immutable inbound event delivered by a subscribed connection.
#[derive(Clone, Debug)]
pub struct InboundEvent {
    /// Session token of the connection the event arrived on; used to resolve
    /// the owning account.
    pub session_token: String,
    pub chat_id: i64,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    pub counterpart_username: Option<String>,
    pub text: String,
    /// True when the event is the account's own outgoing message echoed back.
    pub outgoing: bool,
}
