use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::{
    domain::{Account, AccountStatus, Phone},
    errors::Error,
    Result,
};

use super::Store;

#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    phone: String,
    status: String,
    session_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> Result<Account> {
        let status = AccountStatus::parse(&self.status).ok_or_else(|| {
            Error::Db(sqlx::Error::Decode(
                format!("unknown account status {:?}", self.status).into(),
            ))
        })?;
        Ok(Account {
            id: self.id,
            phone: Phone(self.phone),
            status,
            session_token: self.session_token,
            created_at: self.created_at,
        })
    }
}

impl Store {
    pub async fn find_account(&self, phone: &Phone) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, phone, status, session_token, created_at FROM accounts WHERE phone = ?",
        )
        .bind(phone.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(AccountRow::into_account).transpose()
    }

    /// Fetch an account, failing with `NotFound` if the phone is unknown.
    pub async fn require_account(&self, phone: &Phone) -> Result<Account> {
        self.find_account(phone)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no account for {phone}")))
    }

    /// Fetch the account for `phone`, creating a `pending` row on first sight.
    pub async fn create_or_fetch(&self, phone: &Phone) -> Result<Account> {
        sqlx::query(
            "INSERT INTO accounts (phone, status, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(phone) DO NOTHING",
        )
        .bind(phone.as_str())
        .bind(AccountStatus::Pending.as_str())
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        self.require_account(phone).await
    }

    pub async fn set_status(&self, phone: &Phone, status: AccountStatus) -> Result<()> {
        sqlx::query("UPDATE accounts SET status = ? WHERE phone = ?")
            .bind(status.as_str())
            .bind(phone.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Mark the account authorized: status `active` plus the serialized
    /// session token, in one statement.
    pub async fn set_authorized(&self, phone: &Phone, session_token: &str) -> Result<()> {
        sqlx::query("UPDATE accounts SET status = ?, session_token = ? WHERE phone = ?")
            .bind(AccountStatus::Active.as_str())
            .bind(session_token)
            .bind(phone.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Resolve the account owning a live connection by its session token.
    pub async fn find_by_session_token(&self, token: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, phone, status, session_token, created_at FROM accounts \
             WHERE session_token = ?",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?;

        row.map(AccountRow::into_account).transpose()
    }
}
