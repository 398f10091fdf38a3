//! Discourse part resources, their paged contributions and sub-parts

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use ddb_common::db::discourse_part::DiscoursePart;
use ddb_common::Id;
use serde::{Deserialize, Serialize};

use super::contributions::{contribution_resource, ContributionView};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, PageQuery};
use crate::resource::{href, Links, Resource};
use crate::AppState;

pub fn part_resource(part: DiscoursePart, discourse_id: Option<Id>) -> Resource<DiscoursePart> {
    let links = Links::new(href::discourse_part(part.id))
        .with("contributions", href::part_contributions(part.id, 1))
        .with_opt("discourse", discourse_id.map(href::discourse));
    Resource::new(part, links)
}

async fn load(state: &AppState, id: Id) -> ApiResult<DiscoursePart> {
    state
        .services
        .discourse_parts
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("discourse part", id))
}

/// GET /api/discourse-parts/:id
pub async fn get_discourse_part(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<Resource<DiscoursePart>>> {
    let part = load(&state, id).await?;
    let discourse = state.services.discourses.find_by_discourse_part(part.id).await?;
    Ok(Json(part_resource(part, discourse.map(|d| d.id))))
}

/// One page of a part's contributions
#[derive(Debug, Serialize)]
pub struct ContributionPage {
    pub items: Vec<Resource<ContributionView>>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    #[serde(rename = "_links")]
    pub links: Links,
}

/// GET /api/discourse-parts/:id/contributions?page=N
pub async fn list_part_contributions(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ContributionPage>> {
    let part = load(&state, id).await?;
    let contributions = &state.services.contributions;

    // Count first so the requested page can be clamped
    let total = contributions.count_by_discourse_part(part.id).await?;
    let pagination = calculate_pagination(total, query.page, state.page_size);
    let page = contributions
        .list_by_discourse_part(part.id, pagination.page_size, pagination.offset)
        .await?;

    let mut items = Vec::with_capacity(page.items.len());
    for contribution in page.items {
        items.push(contribution_resource(&state, contribution).await?);
    }

    let links = Links::new(href::part_contributions(part.id, pagination.page))
        .with("discoursePart", href::discourse_part(part.id))
        .with_opt(
            "next",
            pagination
                .has_next()
                .then(|| href::part_contributions(part.id, pagination.page + 1)),
        )
        .with_opt(
            "prev",
            pagination
                .has_prev()
                .then(|| href::part_contributions(part.id, pagination.page - 1)),
        );

    Ok(Json(ContributionPage {
        items,
        total,
        page: pagination.page,
        page_size: pagination.page_size,
        total_pages: pagination.total_pages,
        links,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChildrenQuery {
    #[serde(rename = "type")]
    pub relation_type: Option<String>,
}

/// GET /api/discourse-parts/:id/children?type=T
pub async fn list_part_children(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Query(query): Query<ChildrenQuery>,
) -> ApiResult<Json<Vec<Resource<DiscoursePart>>>> {
    let relation_type = query
        .relation_type
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query parameter 'type' is required".to_string()))?;

    let part = load(&state, id).await?;
    let discourse = state.services.discourses.find_by_discourse_part(part.id).await?;
    let children = state
        .services
        .discourse_parts
        .find_children(&part, relation_type.to_ascii_uppercase())
        .await?;

    Ok(Json(
        children
            .into_iter()
            .map(|child| part_resource(child, discourse.as_ref().map(|d| d.id)))
            .collect(),
    ))
}

pub fn discourse_part_routes() -> Router<AppState> {
    Router::new()
        .route("/api/discourse-parts/:id", get(get_discourse_part))
        .route("/api/discourse-parts/:id/contributions", get(list_part_contributions))
        .route("/api/discourse-parts/:id/children", get(list_part_children))
}
