//! User resources

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use ddb_common::db::user::User;
use ddb_common::Id;

use crate::error::{ApiError, ApiResult};
use crate::resource::{href, Links, Resource};
use crate::AppState;

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<Resource<User>>> {
    let user = state
        .services
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("user", id))?;

    let links = Links::new(href::user(user.id)).with("discourse", href::discourse(user.discourse_id));
    Ok(Json(Resource::new(user, links)))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/api/users/:id", get(get_user))
}
