use sqlx::FromRow;

use crate::{
    domain::{MessageView, NewMessage},
    Result,
};

use super::Store;

/// History endpoint page size.
pub const RECENT_LIMIT: i64 = 50;

#[derive(Debug, FromRow)]
struct MessageRow {
    sender_username: String,
    is_self: bool,
    text: String,
}

impl Store {
    /// Append one message row. The insert runs in its own transaction; any
    /// failure rolls back completely, leaving no partial row.
    pub async fn append_message(&self, msg: &NewMessage) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO messages \
             (chat_id, sender_id, sender_username, text, is_self, account_id, counterpart) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(msg.chat_id)
        .bind(msg.sender_id)
        .bind(&msg.sender_username)
        .bind(&msg.text)
        .bind(msg.is_self)
        .bind(msg.account_id)
        .bind(&msg.counterpart)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// The most recent messages for an (account, counterpart) pair,
    /// newest-first, capped at [`RECENT_LIMIT`].
    pub async fn recent_messages(
        &self,
        account_id: i64,
        counterpart: &str,
    ) -> Result<Vec<MessageView>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT sender_username, is_self, text FROM messages \
             WHERE account_id = ? AND counterpart = ? \
             ORDER BY id DESC LIMIT ?",
        )
        .bind(account_id)
        .bind(counterpart)
        .bind(RECENT_LIMIT)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| MessageView {
                username: r.sender_username,
                is_self: r.is_self,
                message_text: r.text,
            })
            .collect())
    }

    #[cfg(test)]
    pub(crate) async fn count_messages(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(self.pool())
            .await?)
    }
}
