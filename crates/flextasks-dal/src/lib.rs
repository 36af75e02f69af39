pub mod error;
pub mod rating;
pub mod user;

use std::fmt::Display;

pub use error::Error;
pub use sqlx::Error as SqlxError;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type Pool = sqlx::Pool<ChosenDB>;

/// Hard cap on rows returned by any listing query.
pub const MAX_LIMIT: usize = 1_000;

pub async fn new_pool(database_url: &str) -> Result<Pool, Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

#[derive(Debug, Clone)]
pub enum Order {
    Asc(String),
    Desc(String),
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Asc(s) => write!(f, "{}", s),
            Order::Desc(s) => write!(f, "{} DESC", s),
        }
    }
}

impl AsRef<str> for Order {
    fn as_ref(&self) -> &str {
        match self {
            Order::Asc(s) => s.as_str(),
            Order::Desc(s) => s.as_str(),
        }
    }
}

pub struct ListingParams {
    pub offset: i64,
    pub limit: i64,
    pub order: Option<Vec<Order>>,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: MAX_LIMIT as i64,
            order: None,
        }
    }
}

impl ListingParams {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            order: None,
        }
    }

    pub fn with_order(mut self, order: Vec<Order>) -> Self {
        self.order = Some(order);
        self
    }

    /// Builds an ORDER BY clause from the requested ordering, rejecting any
    /// field not in `valid_fields`. Empty string when no ordering was asked
    /// for, so callers can fall back to their own default.
    pub fn ordering(&self, valid_fields: &[&str]) -> Result<String> {
        let Some(order) = self.order.as_ref() else {
            return Ok(String::new());
        };
        let fields = order
            .iter()
            .map(|o| {
                if valid_fields.contains(&o.as_ref()) {
                    Ok(o.to_string())
                } else {
                    Err(Error::InvalidOrderByField(o.as_ref().to_string()))
                }
            })
            .collect::<Result<Vec<String>>>()?;
        Ok(format!("ORDER BY {}", fields.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_clause() {
        let params = ListingParams::new(0, 10).with_order(vec![
            Order::Desc("created".to_string()),
            Order::Asc("overall".to_string()),
        ]);
        let clause = params.ordering(&["created", "overall"]).unwrap();
        assert_eq!(clause, "ORDER BY created DESC, overall");
    }

    #[test]
    fn test_ordering_rejects_unknown_field() {
        let params =
            ListingParams::new(0, 10).with_order(vec![Order::Asc("comment; DROP".to_string())]);
        let err = params.ordering(&["created", "overall"]).unwrap_err();
        assert!(matches!(err, Error::InvalidOrderByField(f) if f == "comment; DROP"));
    }

    #[test]
    fn test_ordering_empty_without_order() {
        let params = ListingParams::default();
        assert_eq!(params.ordering(&["created"]).unwrap(), "");
    }
}
