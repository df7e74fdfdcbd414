use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::query::{Conditions, Page, SortOrder};

/// Something offered at an event that veterans check into separately.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub creation_date: DateTime<Utc>,
    pub creation_by_id: Uuid,
    pub last_update_date: DateTime<Utc>,
    pub last_update_by_id: Uuid,
    #[serde(skip_serializing)]
    pub deleted: bool,
}

#[derive(Debug, Clone)]
pub struct CreateServiceData {
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct UpdateServiceData {
    pub name: String,
    pub description: Option<String>,
    pub updated_by: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFilters {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub order_by: Option<SortOrder>,
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ServiceFilters {
    pub fn page(&self) -> Page {
        Page::new(self.offset, self.limit, self.order_by)
    }

    pub(crate) fn build(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT * FROM services");
        Conditions::new(&mut qb)
            .always("deleted = FALSE")
            .eq("id", self.id)
            .eq("name", self.name.clone())
            .eq("description", self.description.clone());
        self.page().push_to(&mut qb, &["name"]);
        qb
    }
}

impl Service {
    pub async fn create(conn: &mut PgConnection, data: CreateServiceData) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO services (id, name, description, creation_by_id, last_update_by_id)
            VALUES ($1, $2, $3, $4, $4)
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.created_by)
        .execute(&mut *conn)
        .await?;

        Self::find_by_id(conn, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM services WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM services WHERE LOWER(name) = LOWER($1) AND deleted = FALSE
            "#,
        )
        .bind(name.trim())
        .fetch_optional(conn)
        .await
    }

    pub async fn list(conn: &mut PgConnection, filters: &ServiceFilters) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = filters.build();
        let services = query.build_query_as::<Self>().fetch_all(conn).await?;

        Ok(services)
    }

    /// Every live service, unpaginated
    pub async fn list_all(conn: &mut PgConnection) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM services
            WHERE deleted = FALSE
            ORDER BY name
            "#,
        )
        .fetch_all(conn)
        .await
    }

    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateServiceData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE services
            SET
                name = $2,
                description = $3,
                last_update_by_id = $4,
                last_update_date = NOW()
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.updated_by)
        .execute(&mut *conn)
        .await?;

        Self::find_by_id(conn, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Soft delete
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE services
            SET deleted = TRUE, last_update_date = NOW()
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
