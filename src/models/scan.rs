use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::query::{Conditions, Page, SortOrder};

/// A check-in record keyed by (event, veteran, service).
///
/// `service_id` is `None` for the general check-in at the event door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub event_id: Uuid,
    pub veteran_id: Uuid,
    pub service_id: Option<Uuid>,
    pub plus_one: bool,
    pub scan_by_id: Uuid,
    pub scan_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateScanData {
    pub event_id: Uuid,
    pub veteran_id: Uuid,
    pub service_id: Option<Uuid>,
    pub plus_one: bool,
    pub scan_by_id: Uuid,
    pub scan_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFilters {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub order_by: Option<SortOrder>,
    pub event_id: Option<Uuid>,
    pub veteran_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub plus_one: Option<bool>,
    pub scan_by_id: Option<Uuid>,
    pub scan_date_start: Option<DateTime<Utc>>,
    pub scan_date_end: Option<DateTime<Utc>>,
}

impl ScanFilters {
    pub fn page(&self) -> Page {
        Page::new(self.offset, self.limit, self.order_by)
    }

    pub(crate) fn build(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT * FROM scans");
        Conditions::new(&mut qb)
            .eq("event_id", self.event_id)
            .eq("veteran_id", self.veteran_id)
            .eq("service_id", self.service_id)
            .eq("plus_one", self.plus_one)
            .eq("scan_by_id", self.scan_by_id)
            .between("scan_date", self.scan_date_start, self.scan_date_end);
        self.page().push_to(&mut qb, &["scan_date"]);
        qb
    }
}

impl Scan {
    /// Inserts the scan unless one already exists for the same key.
    ///
    /// Returns `None` when the unique index rejected the row, which happens
    /// when a concurrent request recorded the same scan first.
    pub async fn insert_if_absent(
        conn: &mut PgConnection,
        data: CreateScanData,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO scans (event_id, veteran_id, service_id, plus_one, scan_by_id, scan_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(data.event_id)
        .bind(data.veteran_id)
        .bind(data.service_id)
        .bind(data.plus_one)
        .bind(data.scan_by_id)
        .bind(data.scan_date)
        .fetch_optional(conn)
        .await
    }

    pub async fn find(
        conn: &mut PgConnection,
        event_id: Uuid,
        veteran_id: Uuid,
        service_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM scans
            WHERE event_id = $1
              AND veteran_id = $2
              AND service_id IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(event_id)
        .bind(veteran_id)
        .bind(service_id)
        .fetch_optional(conn)
        .await
    }

    /// Every scan a veteran has at an event, general check-in included
    pub async fn list_for_veteran_at_event(
        conn: &mut PgConnection,
        event_id: Uuid,
        veteran_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM scans
            WHERE event_id = $1 AND veteran_id = $2
            ORDER BY scan_date
            "#,
        )
        .bind(event_id)
        .bind(veteran_id)
        .fetch_all(conn)
        .await
    }

    pub async fn list(conn: &mut PgConnection, filters: &ScanFilters) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = filters.build();
        let scans = query.build_query_as::<Self>().fetch_all(conn).await?;

        Ok(scans)
    }

    pub async fn delete(
        conn: &mut PgConnection,
        event_id: Uuid,
        veteran_id: Uuid,
        service_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM scans
            WHERE event_id = $1
              AND veteran_id = $2
              AND service_id IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(event_id)
        .bind(veteran_id)
        .bind(service_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
