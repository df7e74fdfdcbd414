use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::query::{Conditions, Page, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_role")]
pub enum Role {
    Administrator,
    Supervisor,
    User,
}

impl Role {
    fn rank(self) -> u8 {
        match self {
            Role::Administrator => 2,
            Role::Supervisor => 1,
            Role::User => 0,
        }
    }

    /// Whether this role carries at least the privileges of `required`.
    pub fn is_at_least(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub password_reset_required: bool,
    pub role: Role,
    pub creation_date: DateTime<Utc>,
    pub creation_by_id: Option<Uuid>,
    pub last_update_date: DateTime<Utc>,
    pub last_update_by_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub deleted: bool,
}

#[derive(Debug, Clone)]
pub struct CreateAccountData {
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub password_reset_required: bool,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdateAccountData {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub password_reset_required: Option<bool>,
    pub role: Option<Role>,
    pub updated_by: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFilters {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub order_by: Option<SortOrder>,
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub password_reset_required: Option<bool>,
    pub role: Option<Role>,
    pub creation_date_start: Option<DateTime<Utc>>,
    pub creation_date_end: Option<DateTime<Utc>>,
    pub creation_by_id: Option<Uuid>,
    pub last_update_date_start: Option<DateTime<Utc>>,
    pub last_update_date_end: Option<DateTime<Utc>>,
    pub last_update_by_id: Option<Uuid>,
}

impl AccountFilters {
    pub fn page(&self) -> Page {
        Page::new(self.offset, self.limit, self.order_by)
    }

    pub(crate) fn build(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT * FROM accounts");
        Conditions::new(&mut qb)
            .always("deleted = FALSE")
            .eq("id", self.id)
            .eq("name", self.name.clone())
            .eq("password_reset_required", self.password_reset_required)
            .eq("role", self.role)
            .between("creation_date", self.creation_date_start, self.creation_date_end)
            .eq("creation_by_id", self.creation_by_id)
            .between(
                "last_update_date",
                self.last_update_date_start,
                self.last_update_date_end,
            )
            .eq("last_update_by_id", self.last_update_by_id);
        self.page().push_to(&mut qb, &["name"]);
        qb
    }
}

impl Account {
    /// Inserts a new account and reads it back.
    pub async fn create(conn: &mut PgConnection, data: CreateAccountData) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, name, password_hash, password_reset_required, role,
                creation_by_id, last_update_by_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.password_hash)
        .bind(data.password_reset_required)
        .bind(data.role)
        .bind(data.created_by)
        .execute(&mut *conn)
        .await?;

        Self::find_by_id(conn, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Finds a live (not soft-deleted) account by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM accounts WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Finds a live account by name, ignoring case
    pub async fn find_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM accounts WHERE LOWER(name) = LOWER($1) AND deleted = FALSE
            "#,
        )
        .bind(name.trim())
        .fetch_optional(conn)
        .await
    }

    pub async fn list(conn: &mut PgConnection, filters: &AccountFilters) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = filters.build();
        let accounts = query.build_query_as::<Self>().fetch_all(conn).await?;

        Ok(accounts)
    }

    /// Every live account, unpaginated
    pub async fn list_all(conn: &mut PgConnection) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM accounts
            WHERE deleted = FALSE
            ORDER BY name
            "#,
        )
        .fetch_all(conn)
        .await
    }

    pub async fn count(conn: &mut PgConnection) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts WHERE deleted = FALSE")
            .fetch_one(conn)
            .await
    }

    /// Updates the supplied fields and reads the account back.
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateAccountData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET
                name = COALESCE($2, name),
                password_hash = COALESCE($3, password_hash),
                password_reset_required = COALESCE($4, password_reset_required),
                role = COALESCE($5, role),
                last_update_by_id = $6,
                last_update_date = NOW()
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.password_hash)
        .bind(data.password_reset_required)
        .bind(data.role)
        .bind(data.updated_by)
        .execute(&mut *conn)
        .await?;

        Self::find_by_id(conn, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Soft delete: the row stays, but drops out of every lookup and listing.
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Administrator.is_at_least(Role::Supervisor));
        assert!(Role::Supervisor.is_at_least(Role::Supervisor));
        assert!(Role::Supervisor.is_at_least(Role::User));
        assert!(!Role::User.is_at_least(Role::Supervisor));
        assert!(!Role::Supervisor.is_at_least(Role::Administrator));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let account = Account {
            id: Uuid::new_v4(),
            name: "jdoe".to_string(),
            password_hash: "pbkdf2-sha256$1$00$00".to_string(),
            password_reset_required: true,
            role: Role::User,
            creation_date: Utc::now(),
            creation_by_id: None,
            last_update_date: Utc::now(),
            last_update_by_id: None,
            deleted: false,
        };

        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("deleted").is_none());
        assert_eq!(json["passwordResetRequired"], true);
        assert_eq!(json["role"], "User");
    }

    #[test]
    fn test_filters_render_soft_delete_guard() {
        let filters = AccountFilters {
            role: Some(Role::Supervisor),
            ..Default::default()
        };

        assert_eq!(
            filters.build().sql(),
            "SELECT * FROM accounts WHERE deleted = FALSE AND role = $1 \
             ORDER BY name ASC LIMIT $2 OFFSET $3"
        );
    }
}
