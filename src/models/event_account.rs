use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// Join row marking an account as a host of an event.
///
/// The functions take whatever connection the caller holds, so they can run
/// standalone or inside a [`crate::db::UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventAccount {
    pub event_id: Uuid,
    pub account_id: Uuid,
}

impl EventAccount {
    pub fn new(event_id: Uuid, account_id: Uuid) -> Self {
        Self { event_id, account_id }
    }

    /// Adds the row; adding an existing row is a no-op.
    pub async fn add(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO events_accounts (event_id, account_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(self.event_id)
        .bind(self.account_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn remove(&self, conn: &mut PgConnection) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM events_accounts
            WHERE event_id = $1 AND account_id = $2
            "#,
        )
        .bind(self.event_id)
        .bind(self.account_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_all_for_event(conn: &mut PgConnection, event_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events_accounts WHERE event_id = $1")
            .bind(event_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
