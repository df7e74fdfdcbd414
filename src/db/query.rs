//! Typed filters and pagination rendered into parameterized SQL.
//!
//! Each list endpoint deserializes a filter struct from the query string and
//! hands it to its repository, which walks the optional fields through
//! [`Conditions`]. Column names are always `'static` strings chosen by the
//! repository; only values are bound, and only values that were supplied.

use serde::Deserialize;
use sqlx::{Encode, Postgres, QueryBuilder, Type};

/// Page size used when a request does not ask for one.
pub const DEFAULT_LIMIT: i64 = 100;

/// Largest page a single request may ask for.
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "ASC", alias = "asc", alias = "Asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc", alias = "Desc")]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Offset/limit window plus sort direction for a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
    pub order: SortOrder,
}

impl Page {
    /// Applies defaults and clamps the limit to `1..=MAX_LIMIT`.
    pub fn new(offset: Option<i64>, limit: Option<i64>, order: Option<SortOrder>) -> Self {
        Self {
            offset: offset.unwrap_or(0).max(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            order: order.unwrap_or_default(),
        }
    }

    /// Appends `ORDER BY <columns> <dir> LIMIT $n OFFSET $m`.
    pub fn push_to(&self, qb: &mut QueryBuilder<'_, Postgres>, order_by: &[&'static str]) {
        if !order_by.is_empty() {
            qb.push(" ORDER BY ");
            for (i, column) in order_by.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                qb.push(*column).push(" ").push(self.order.as_sql());
            }
        }

        qb.push(" LIMIT ").push_bind(self.limit);
        qb.push(" OFFSET ").push_bind(self.offset);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

/// Builds the `WHERE` clause of a query, one predicate per supplied value.
pub struct Conditions<'q, 'args> {
    qb: &'q mut QueryBuilder<'args, Postgres>,
    started: bool,
}

impl<'q, 'args> Conditions<'q, 'args> {
    pub fn new(qb: &'q mut QueryBuilder<'args, Postgres>) -> Self {
        Self { qb, started: false }
    }

    fn clause(&mut self) -> &mut QueryBuilder<'args, Postgres> {
        self.qb.push(if self.started { " AND " } else { " WHERE " });
        self.started = true;
        &mut *self.qb
    }

    /// A predicate that always applies, such as excluding soft-deleted rows.
    pub fn always(&mut self, predicate: &'static str) -> &mut Self {
        self.clause().push(predicate);
        self
    }

    pub fn eq<T>(&mut self, column: &'static str, value: Option<T>) -> &mut Self
    where
        T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
    {
        if let Some(value) = value {
            self.clause().push(column).push(" = ").push_bind(value);
        }
        self
    }

    pub fn gte<T>(&mut self, column: &'static str, value: Option<T>) -> &mut Self
    where
        T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
    {
        if let Some(value) = value {
            self.clause().push(column).push(" >= ").push_bind(value);
        }
        self
    }

    pub fn lte<T>(&mut self, column: &'static str, value: Option<T>) -> &mut Self
    where
        T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
    {
        if let Some(value) = value {
            self.clause().push(column).push(" <= ").push_bind(value);
        }
        self
    }

    /// `BETWEEN` when both bounds are given, a one-sided comparison otherwise.
    pub fn between<T>(&mut self, column: &'static str, start: Option<T>, end: Option<T>) -> &mut Self
    where
        T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
    {
        match (start, end) {
            (Some(start), Some(end)) => {
                self.clause()
                    .push(column)
                    .push(" BETWEEN ")
                    .push_bind(start)
                    .push(" AND ")
                    .push_bind(end);
                self
            }
            (start, end) => self.gte(column, start).lte(column, end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn test_page_defaults_and_clamping() {
        let page = Page::default();
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, DEFAULT_LIMIT);
        assert_eq!(page.order, SortOrder::Asc);

        let page = Page::new(Some(-5), Some(50_000), Some(SortOrder::Desc));
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, MAX_LIMIT);

        assert_eq!(Page::new(None, Some(0), None).limit, 1);
    }

    #[test]
    fn test_only_supplied_values_are_bound() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM accounts");
        Conditions::new(&mut qb)
            .always("deleted = FALSE")
            .eq("id", Some(Uuid::new_v4()))
            .eq::<String>("name", None)
            .eq("password_reset_required", Some(true));
        Page::new(Some(20), Some(10), Some(SortOrder::Desc)).push_to(&mut qb, &["name"]);

        assert_eq!(
            qb.sql(),
            "SELECT * FROM accounts WHERE deleted = FALSE AND id = $1 \
             AND password_reset_required = $2 ORDER BY name DESC LIMIT $3 OFFSET $4"
        );
    }

    #[test]
    fn test_between_variants() {
        let start = Utc.with_ymd_and_hms(2024, 11, 11, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 11, 11, 17, 0, 0).unwrap();

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM scans");
        Conditions::new(&mut qb).between("scan_date", Some(start), Some(end));
        assert_eq!(qb.sql(), "SELECT * FROM scans WHERE scan_date BETWEEN $1 AND $2");

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM scans");
        Conditions::new(&mut qb).between("scan_date", Some(start), None);
        assert_eq!(qb.sql(), "SELECT * FROM scans WHERE scan_date >= $1");

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM scans");
        Conditions::new(&mut qb).between("scan_date", None, Some(end));
        assert_eq!(qb.sql(), "SELECT * FROM scans WHERE scan_date <= $1");
    }

    #[test]
    fn test_no_conditions_no_where() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM services");
        Conditions::new(&mut qb).eq::<Uuid>("id", None);
        Page::default().push_to(&mut qb, &["last_name", "first_name"]);

        assert_eq!(
            qb.sql(),
            "SELECT * FROM services ORDER BY last_name ASC, first_name ASC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn test_sort_order_from_query_string() {
        #[derive(Deserialize)]
        struct Q {
            #[serde(rename = "orderBy")]
            order_by: Option<SortOrder>,
        }

        let q: Q = serde_json::from_str(r#"{"orderBy":"desc"}"#).unwrap();
        assert_eq!(q.order_by, Some(SortOrder::Desc));
        let q: Q = serde_json::from_str(r#"{"orderBy":"ASC"}"#).unwrap();
        assert_eq!(q.order_by, Some(SortOrder::Asc));
    }
}
