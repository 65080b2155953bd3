use serde_json::{Map, Value};
use tracing::{debug, info};

use super::dto::{PageQuery, UserListResponse};
use super::password::hash_password;
use crate::error::{ApiError, ApiResult};
use crate::store::{NewUser, User, UserPatch, UserStore};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const DEFAULT_ROLE: &str = "user";
pub const DEFAULT_AVATAR: &str = "https://avatars.githubusercontent.com/u/273650";
pub const REQUIRED_FIELDS: [&str; 4] = ["first_name", "last_name", "email", "password"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Both values must be integers >= 1; absent values take the defaults.
    pub fn from_query(q: &PageQuery) -> ApiResult<Self> {
        let page = parse_positive(q.page.as_deref(), DEFAULT_PAGE)?;
        let limit = parse_positive(q.limit.as_deref(), DEFAULT_LIMIT)?;
        let p = Self { page, limit };
        // offset must fit in i64
        p.checked_offset().ok_or(ApiError::InvalidPagination)?;
        Ok(p)
    }

    fn checked_offset(&self) -> Option<i64> {
        (self.page - 1).checked_mul(self.limit)
    }

    pub fn offset(&self) -> i64 {
        self.checked_offset().unwrap_or(i64::MAX)
    }
}

fn parse_positive(raw: Option<&str>, default: i64) -> ApiResult<i64> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if v >= 1 => Ok(v),
        _ => Err(ApiError::InvalidPagination),
    }
}

pub fn missing_fields(body: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .into_iter()
        .filter(|f| !body.contains_key(*f))
        .collect()
}

fn text_field(body: &Map<String, Value>, field: &str) -> ApiResult<Option<String>> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ApiError::BadRequest(format!("Field '{}' must be a string", field))),
    }
}

fn required_text(body: &Map<String, Value>, field: &'static str) -> ApiResult<String> {
    text_field(body, field)?
        .ok_or_else(|| ApiError::BadRequest(format!("Field '{}' must be a string", field)))
}

/// Validate a create body and turn it into a row with a hashed password and defaults applied.
pub fn new_user_from_body(body: &Map<String, Value>) -> ApiResult<NewUser> {
    let missing = missing_fields(body);
    if !missing.is_empty() {
        return Err(ApiError::MissingFields(missing));
    }

    let password = required_text(body, "password")?;
    Ok(NewUser {
        first_name: required_text(body, "first_name")?,
        last_name: required_text(body, "last_name")?,
        email: required_text(body, "email")?,
        password_hash: hash_password(&password)?,
        role: text_field(body, "role")?.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        avatar: text_field(body, "avatar")?.unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
    })
}

/// Count, then fetch one page. The two reads are independent, so `total`
/// may disagree with the page under concurrent writes.
pub async fn list_users(store: &dyn UserStore, p: Pagination) -> ApiResult<UserListResponse> {
    let total = store.count().await?;
    let users = store.list_page(p.offset(), p.limit).await?;
    debug!(page = p.page, limit = p.limit, total, returned = users.len(), "list users");

    // An empty page is a 404 even when earlier pages hold rows.
    if users.is_empty() {
        return Err(ApiError::NotFound("No users found"));
    }

    Ok(UserListResponse {
        users,
        page: p.page,
        limit: p.limit,
        total,
    })
}

pub async fn get_user(store: &dyn UserStore, id: i64) -> ApiResult<User> {
    store
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))
}

pub async fn create_user(
    store: &dyn UserStore,
    body: Option<Map<String, Value>>,
) -> ApiResult<i64> {
    let body = body.unwrap_or_default();
    let new_user = new_user_from_body(&body)?;
    let id = store.insert(new_user).await?;
    info!(user_id = id, "user created");
    Ok(id)
}

/// Fields are written as given; no per-field validation happens here.
pub async fn update_user(
    store: &dyn UserStore,
    id: i64,
    body: Option<Map<String, Value>>,
) -> ApiResult<()> {
    let patch: UserPatch = match body {
        Some(map) if !map.is_empty() => map,
        _ => return Err(ApiError::BadRequest("No update data provided".into())),
    };
    if !store.update(id, patch).await? {
        return Err(ApiError::NotFound("User not found"));
    }
    info!(user_id = id, "user updated");
    Ok(())
}

pub async fn delete_user(store: &dyn UserStore, id: i64) -> ApiResult<()> {
    if !store.delete(id).await? {
        return Err(ApiError::NotFound("User not found"));
    }
    info!(user_id = id, "user deleted");
    Ok(())
}
