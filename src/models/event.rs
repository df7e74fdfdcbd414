use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::query::{Conditions, Page, SortOrder};

const SELECT_EVENTS: &str = r#"
    SELECT
        e.*,
        ARRAY(
            SELECT ea.account_id FROM events_accounts ea
            WHERE ea.event_id = e.id ORDER BY ea.account_id
        ) AS hosts,
        ARRAY(
            SELECT es.service_id FROM events_services es
            WHERE es.event_id = e.id ORDER BY es.service_id
        ) AS services
    FROM events e
"#;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub creation_date: DateTime<Utc>,
    pub creation_by_id: Uuid,
    pub last_update_date: DateTime<Utc>,
    pub last_update_by_id: Uuid,
    /// Account IDs joined through `events_accounts`
    pub hosts: Vec<Uuid>,
    /// Service IDs joined through `events_services`
    pub services: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateEventData {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct UpdateEventData {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub updated_by: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilters {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub order_by: Option<SortOrder>,
    pub id: Option<Uuid>,
    pub name: Option<String>,
    /// Events still running at or after this instant
    pub date_start: Option<DateTime<Utc>>,
    /// Events starting at or before this instant
    pub date_end: Option<DateTime<Utc>>,
}

impl EventFilters {
    pub fn page(&self) -> Page {
        Page::new(self.offset, self.limit, self.order_by)
    }

    pub(crate) fn build(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(SELECT_EVENTS.trim_end());
        Conditions::new(&mut qb)
            .eq("e.id", self.id)
            .eq("e.name", self.name.clone())
            .gte("e.end_time", self.date_start)
            .lte("e.start_time", self.date_end);
        self.page().push_to(&mut qb, &["e.start_time"]);
        qb
    }
}

impl Event {
    /// Inserts the event row only. Joins are written separately so both can
    /// share a transaction.
    pub async fn insert(
        conn: &mut PgConnection,
        id: Uuid,
        data: &CreateEventData,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO events (id, name, start_time, end_time, creation_by_id, last_update_by_id)
            VALUES ($1, $2, $3, $4, $5, $5)
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(data.created_by)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Find event by ID, with its hosts and services
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("{} WHERE e.id = $1", SELECT_EVENTS.trim_end());

        let event = sqlx::query_as::<_, Self>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(event)
    }

    pub async fn list(conn: &mut PgConnection, filters: &EventFilters) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = filters.build();
        let events = query.build_query_as::<Self>().fetch_all(conn).await?;

        Ok(events)
    }

    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateEventData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE events
            SET
                name = $2,
                start_time = $3,
                end_time = $4,
                last_update_by_id = $5,
                last_update_date = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(data.updated_by)
        .execute(&mut *conn)
        .await?;

        Self::find_by_id(conn, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Hard delete. Scans recorded at the event cascade with it.
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_window_is_an_overlap_check() {
        let filters = EventFilters {
            date_start: Some(Utc::now()),
            date_end: Some(Utc::now()),
            ..Default::default()
        };

        let query = filters.build();
        let sql = query.sql();
        assert!(sql.contains("WHERE e.end_time >= $1 AND e.start_time <= $2"));
        assert!(sql.ends_with("ORDER BY e.start_time ASC LIMIT $3 OFFSET $4"));
    }
}
