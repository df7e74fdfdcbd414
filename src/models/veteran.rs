use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::query::{Conditions, Page, SortOrder};

/// Document used to confirm a patron's veteran status at enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_method")]
pub enum VerificationMethod {
    IdCard,
    DriversLicense,
    Dd214,
    VeteranAffairsCard,
    Other,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Veteran {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub primary_phone: String,
    pub email: Option<String>,
    pub card_number: Option<i32>,
    pub verification_method: VerificationMethod,
    pub enrollment_date: DateTime<Utc>,
    pub enrollment_by_id: Uuid,
    pub last_update_date: DateTime<Utc>,
    pub last_update_by_id: Uuid,
    #[serde(skip_serializing)]
    pub deleted: bool,
}

#[derive(Debug, Clone)]
pub struct CreateVeteranData {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub primary_phone: String,
    pub email: Option<String>,
    pub card_number: Option<i32>,
    pub verification_method: VerificationMethod,
    pub enrolled_by: Uuid,
}

/// Full replacement of a veteran's editable fields.
#[derive(Debug, Clone)]
pub struct UpdateVeteranData {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub primary_phone: String,
    pub email: Option<String>,
    pub card_number: Option<i32>,
    pub verification_method: VerificationMethod,
    pub updated_by: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VeteranFilters {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub order_by: Option<SortOrder>,
    pub id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub primary_phone: Option<String>,
    pub email: Option<String>,
    pub card_number: Option<i32>,
    pub verification_method: Option<VerificationMethod>,
    pub enrollment_date_start: Option<DateTime<Utc>>,
    pub enrollment_date_end: Option<DateTime<Utc>>,
    pub enrollment_by_id: Option<Uuid>,
}

impl VeteranFilters {
    pub fn page(&self) -> Page {
        Page::new(self.offset, self.limit, self.order_by)
    }

    pub(crate) fn build(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT * FROM veterans");
        Conditions::new(&mut qb)
            .always("deleted = FALSE")
            .eq("id", self.id)
            .eq("first_name", self.first_name.clone())
            .eq("last_name", self.last_name.clone())
            .eq("address", self.address.clone())
            .eq("primary_phone", self.primary_phone.clone())
            .eq("email", self.email.clone())
            .eq("card_number", self.card_number)
            .eq("verification_method", self.verification_method)
            .between(
                "enrollment_date",
                self.enrollment_date_start,
                self.enrollment_date_end,
            )
            .eq("enrollment_by_id", self.enrollment_by_id);
        self.page().push_to(&mut qb, &["last_name", "first_name"]);
        qb
    }
}

impl Veteran {
    /// Enrolls a veteran and reads the stored row back.
    pub async fn create(conn: &mut PgConnection, data: CreateVeteranData) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO veterans (
                id, first_name, last_name, address, primary_phone, email,
                card_number, verification_method, enrollment_by_id, last_update_by_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            "#,
        )
        .bind(id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.address)
        .bind(&data.primary_phone)
        .bind(&data.email)
        .bind(data.card_number)
        .bind(data.verification_method)
        .bind(data.enrolled_by)
        .execute(&mut *conn)
        .await?;

        Self::find_by_id(conn, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM veterans WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Live veterans holding a card number. More than one row means the data
    /// is inconsistent, so at most two are fetched.
    pub async fn find_by_card_number(
        conn: &mut PgConnection,
        card_number: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let filters = VeteranFilters {
            card_number: Some(card_number),
            limit: Some(2),
            ..Default::default()
        };

        Self::list(conn, &filters).await
    }

    pub async fn list(conn: &mut PgConnection, filters: &VeteranFilters) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = filters.build();
        let veterans = query.build_query_as::<Self>().fetch_all(conn).await?;

        Ok(veterans)
    }

    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateVeteranData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE veterans
            SET
                first_name = $2,
                last_name = $3,
                address = $4,
                primary_phone = $5,
                email = $6,
                card_number = $7,
                verification_method = $8,
                last_update_by_id = $9,
                last_update_date = NOW()
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.address)
        .bind(&data.primary_phone)
        .bind(&data.email)
        .bind(data.card_number)
        .bind(data.verification_method)
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
            UPDATE veterans
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
    fn test_card_number_lookup_filters() {
        let filters = VeteranFilters {
            card_number: Some(1234),
            limit: Some(2),
            ..Default::default()
        };

        assert_eq!(
            filters.build().sql(),
            "SELECT * FROM veterans WHERE deleted = FALSE AND card_number = $1 \
             ORDER BY last_name ASC, first_name ASC LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn test_verification_method_wire_names() {
        let method: VerificationMethod = serde_json::from_str(r#""Dd214""#).unwrap();
        assert_eq!(method, VerificationMethod::Dd214);
        assert!(serde_json::from_str::<VerificationMethod>(r#""Passport""#).is_err());
    }
}
