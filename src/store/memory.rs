use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    check_patch_columns, patch_value_text, unknown_column, NewUser, StoreError, StoreResult, User,
    UserPatch, UserStore,
};

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<i64, User>,
    last_id: i64,
}

/// In-process `users` table with the same constraints as the migration.
///
/// Every trait call is counted so tests can assert the store was (or was not) reached.
#[derive(Debug, Default, Clone)]
pub struct MemoryUserStore {
    table: Arc<RwLock<Table>>,
    calls: Arc<AtomicUsize>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `UserStore` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn check_row(row: &User, rows: &BTreeMap<i64, User>) -> StoreResult<()> {
    if row.first_name.is_empty() {
        return Err(check_violation("users_first_name_check"));
    }
    if row.last_name.is_empty() {
        return Err(check_violation("users_last_name_check"));
    }
    if rows.values().any(|u| u.id != row.id && u.email == row.email) {
        return Err(StoreError::Rejected(
            "duplicate key value violates unique constraint \"users_email_key\"".into(),
        ));
    }
    Ok(())
}

fn check_violation(constraint: &str) -> StoreError {
    StoreError::Rejected(format!(
        "new row for relation \"users\" violates check constraint \"{}\"",
        constraint
    ))
}

fn set_column(row: &mut User, column: &str, value: String) -> StoreResult<()> {
    match column {
        "first_name" => row.first_name = value,
        "last_name" => row.last_name = value,
        "email" => row.email = value,
        "password" => row.password = value,
        "role" => row.role = value,
        "avatar" => row.avatar = value,
        other => return Err(unknown_column(other)),
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn count(&self) -> StoreResult<i64> {
        self.hit();
        Ok(self.table.read().await.rows.len() as i64)
    }

    async fn list_page(&self, offset: i64, limit: i64) -> StoreResult<Vec<User>> {
        self.hit();
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        self.hit();
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn insert(&self, user: NewUser) -> StoreResult<i64> {
        self.hit();
        let mut table = self.table.write().await;
        let row = User {
            id: table.last_id + 1,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password: user.password_hash,
            role: user.role,
            avatar: user.avatar,
        };
        check_row(&row, &table.rows)?;
        table.last_id = row.id;
        let id = row.id;
        table.rows.insert(id, row);
        Ok(id)
    }

    async fn update(&self, id: i64, patch: UserPatch) -> StoreResult<bool> {
        self.hit();
        check_patch_columns(&patch)?;
        let mut table = self.table.write().await;
        let Some(current) = table.rows.get(&id) else {
            return Ok(false);
        };

        let mut row = current.clone();
        for (column, value) in &patch {
            let Some(text) = patch_value_text(value) else {
                return Err(StoreError::Rejected(format!(
                    "null value in column \"{}\" of relation \"users\" violates not-null constraint",
                    column
                )));
            };
            set_column(&mut row, column, text)?;
        }
        check_row(&row, &table.rows)?;
        table.rows.insert(id, row);
        Ok(true)
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        self.hit();
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: email.into(),
            password_hash: "hash".into(),
            role: "user".into(),
            avatar: "https://example.com/a.png".into(),
        }
    }

    #[tokio::test]
    async fn ids_increase_and_pages_are_newest_first() {
        let store = MemoryUserStore::new();
        for i in 0..5 {
            store.insert(new_user(&format!("u{}@example.com", i))).await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 5);

        let page: Vec<i64> = store.list_page(0, 2).await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(page, vec![5, 4]);
        let page: Vec<i64> = store.list_page(4, 2).await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(page, vec![1]);
        assert!(store.list_page(10, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reused() {
        let store = MemoryUserStore::new();
        let first = store.insert(new_user("a@example.com")).await.unwrap();
        assert!(store.delete(first).await.unwrap());
        let second = store.insert(new_user("b@example.com")).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::new();
        store.insert(new_user("dup@example.com")).await.unwrap();
        let err = store.insert(new_user("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(ref m) if m.contains("users_email_key")));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_applies_fields_and_reports_missing_rows() {
        let store = MemoryUserStore::new();
        let id = store.insert(new_user("x@example.com")).await.unwrap();

        let mut patch = UserPatch::new();
        patch.insert("role".into(), json!("admin"));
        assert!(store.update(id, patch.clone()).await.unwrap());
        assert!(!store.update(id + 100, patch).await.unwrap());

        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.role, "admin");
    }

    #[tokio::test]
    async fn update_rejects_null_and_leaves_row_untouched() {
        let store = MemoryUserStore::new();
        let id = store.insert(new_user("y@example.com")).await.unwrap();

        let mut patch = UserPatch::new();
        patch.insert("last_name".into(), json!("Smith"));
        patch.insert("email".into(), serde_json::Value::Null);
        let err = store.update(id, patch).await.unwrap_err();
        assert!(err.to_string().contains("not-null"));

        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.last_name, "Hopper");
        assert_eq!(user.email, "y@example.com");
    }

    #[test]
    fn set_column_rejects_unknown_and_id_columns() {
        let mut row = User {
            id: 1,
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "g@example.com".into(),
            password: "hash".into(),
            role: "user".into(),
            avatar: "a".into(),
        };
        let err = set_column(&mut row, "nickname", "x".into()).unwrap_err();
        assert!(err.to_string().contains("'nickname'"));
        assert!(set_column(&mut row, "id", "9".into()).is_err());
        assert_eq!(row.id, 1);

        set_column(&mut row, "avatar", "b".into()).unwrap();
        assert_eq!(row.avatar, "b");
    }

    #[tokio::test]
    async fn calls_are_counted() {
        let store = MemoryUserStore::new();
        assert_eq!(store.calls(), 0);
        store.count().await.unwrap();
        store.find_by_id(1).await.unwrap();
        assert_eq!(store.calls(), 2);
    }
}
