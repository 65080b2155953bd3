mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use thiserror::Error;

/// Columns of the `users` table a caller may write.
pub const WRITABLE_COLUMNS: [&str; 6] = [
    "first_name",
    "last_name",
    "email",
    "password",
    "role",
    "avatar",
];

/// User record as stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String, // Argon2 hash, never exposed in JSON
    pub role: String,
    pub avatar: String,
}

/// Row to insert; `id` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub avatar: String,
}

/// Field name to new value; applied as-is by `UserStore::update`.
pub type UserPatch = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store understood the request and refused it (constraint, bad column, bad value).
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => StoreError::Rejected(db.message().to_string()),
            other => StoreError::Backend(anyhow::Error::new(other)),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Remote `users` table.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact number of rows in the table.
    async fn count(&self) -> StoreResult<i64>;

    /// Rows `offset..offset+limit` ordered by `id` descending.
    async fn list_page(&self, offset: i64, limit: i64) -> StoreResult<Vec<User>>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>>;

    /// Insert a row and return the assigned id.
    async fn insert(&self, user: NewUser) -> StoreResult<i64>;

    /// Overwrite the given fields; `false` when no row has this id.
    async fn update(&self, id: i64, patch: UserPatch) -> StoreResult<bool>;

    /// Hard delete; `false` when no row has this id.
    async fn delete(&self, id: i64) -> StoreResult<bool>;
}

/// Check every patch key names a writable column.
pub(crate) fn check_patch_columns(patch: &UserPatch) -> StoreResult<()> {
    for key in patch.keys() {
        if key == "id" {
            return Err(StoreError::Rejected(
                "column \"id\" can only be updated to DEFAULT".into(),
            ));
        }
        if !WRITABLE_COLUMNS.contains(&key.as_str()) {
            return Err(unknown_column(key));
        }
    }
    Ok(())
}

pub(crate) fn unknown_column(column: &str) -> StoreError {
    StoreError::Rejected(format!(
        "Could not find the '{}' column of 'users' in the schema cache",
        column
    ))
}

/// Text form of a JSON value bound into a text column. `None` is SQL NULL.
pub(crate) fn patch_value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_serialization_hides_password() {
        let user = User {
            id: 7,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password: "$argon2id$secret".into(),
            role: "user".into(),
            avatar: "https://example.com/a.png".into(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["id"], 7);
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn patch_columns_reject_unknown_and_id() {
        let mut patch = UserPatch::new();
        patch.insert("nickname".into(), json!("x"));
        let err = check_patch_columns(&patch).unwrap_err();
        assert!(err.to_string().contains("'nickname'"));

        let mut patch = UserPatch::new();
        patch.insert("id".into(), json!(3));
        assert!(matches!(check_patch_columns(&patch), Err(StoreError::Rejected(_))));

        let mut patch = UserPatch::new();
        patch.insert("role".into(), json!("admin"));
        patch.insert("password".into(), json!("plain"));
        assert!(check_patch_columns(&patch).is_ok());
    }

    #[test]
    fn non_database_sqlx_errors_are_backend_failures() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn patch_values_render_as_text() {
        assert_eq!(patch_value_text(&json!("a")), Some("a".into()));
        assert_eq!(patch_value_text(&json!(12)), Some("12".into()));
        assert_eq!(patch_value_text(&json!(true)), Some("true".into()));
        assert_eq!(patch_value_text(&Value::Null), None);
    }
}
