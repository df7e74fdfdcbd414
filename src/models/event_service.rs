use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// Join row marking a service as offered at an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventService {
    pub event_id: Uuid,
    pub service_id: Uuid,
}

impl EventService {
    pub fn new(event_id: Uuid, service_id: Uuid) -> Self {
        Self { event_id, service_id }
    }

    /// Adds the row; adding an existing row is a no-op.
    pub async fn add(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO events_services (event_id, service_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(self.event_id)
        .bind(self.service_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn remove(&self, conn: &mut PgConnection) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM events_services
            WHERE event_id = $1 AND service_id = $2
            "#,
        )
        .bind(self.event_id)
        .bind(self.service_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_all_for_event(conn: &mut PgConnection, event_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events_services WHERE event_id = $1")
            .bind(event_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
