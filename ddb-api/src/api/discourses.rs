//! Discourse resources

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use ddb_common::db::discourse::Discourse;
use ddb_common::Id;

use super::discourse_parts::part_resource;
use crate::error::{ApiError, ApiResult};
use crate::resource::{href, Links, Resource};
use crate::AppState;

pub fn discourse_resource(discourse: Discourse) -> Resource<Discourse> {
    let links = Links::new(href::discourse(discourse.id))
        .with("discourseParts", href::discourse_parts_of(discourse.id));
    Resource::new(discourse, links)
}

async fn load(state: &AppState, id: Id) -> ApiResult<Discourse> {
    state
        .services
        .discourses
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("discourse", id))
}

/// GET /api/discourses
pub async fn list_discourses(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Resource<Discourse>>>> {
    let discourses = state.services.discourses.list().await?;
    Ok(Json(discourses.into_iter().map(discourse_resource).collect()))
}

/// GET /api/discourses/:id
pub async fn get_discourse(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<Resource<Discourse>>> {
    Ok(Json(discourse_resource(load(&state, id).await?)))
}

/// GET /api/discourses/:id/parts
pub async fn list_discourse_parts(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<Vec<Resource<ddb_common::db::discourse_part::DiscoursePart>>>> {
    let discourse = load(&state, id).await?;
    let parts = state.services.discourse_parts.find_by_discourse(&discourse).await?;
    Ok(Json(
        parts
            .into_iter()
            .map(|part| part_resource(part, Some(discourse.id)))
            .collect(),
    ))
}

pub fn discourse_routes() -> Router<AppState> {
    Router::new()
        .route("/api/discourses", get(list_discourses))
        .route("/api/discourses/:id", get(get_discourse))
        .route("/api/discourses/:id/parts", get(list_discourse_parts))
}
