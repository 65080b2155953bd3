mod dto;
mod extractors;
pub mod handlers;
pub mod password;
pub mod services;

pub use dto::{CreatedUserResponse, MessageResponse, PageQuery, UserListResponse};

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
