use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// A long-lived credential exchanged for fresh access tokens.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub account_id: Uuid,
    pub issued: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl RefreshToken {
    pub async fn create(
        conn: &mut PgConnection,
        account_id: Uuid,
        expires: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO refresh_tokens (id, account_id, expires)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account_id)
        .bind(expires)
        .fetch_one(conn)
        .await
    }

    /// Finds a token that has not yet expired
    pub async fn find_valid(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM refresh_tokens
            WHERE id = $1 AND expires > NOW()
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes every outstanding token for an account
    pub async fn delete_for_account(conn: &mut PgConnection, account_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE account_id = $1")
            .bind(account_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
