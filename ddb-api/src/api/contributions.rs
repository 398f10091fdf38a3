//! Contribution resources
//!
//! A contribution is rendered with the text of its current revision and
//! the details of that revision's author. Links to the parent and to the
//! thread starter are only offered for contribution types that take part
//! in reply threads, and only when the relation exists.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use ddb_common::db::annotation::{AnnotationInstance, Feature};
use ddb_common::db::contribution::Contribution;
use ddb_common::db::data_source::DataSourceInstance;
use ddb_common::{ContributionType, Id};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::resource::{href, Links, Resource};
use crate::AppState;

/// Types whose REPLY parent is linked as `parentContribution`
const PARENTED_TYPES: &[ContributionType] = &[
    ContributionType::Post,
    ContributionType::GoalNote,
    ContributionType::NodeComment,
];

#[derive(Debug, Serialize)]
pub struct ContributionView {
    pub id: Id,
    #[serde(rename = "type")]
    pub contribution_type: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub author_username: Option<String>,
    pub author_realname: Option<String>,
    pub author_email: Option<String>,
    /// Start time of the contribution, or its insertion time when unknown
    pub created: DateTime<Utc>,
    pub upvotes: i64,
}

fn is_type(contribution: &Contribution, types: &[ContributionType]) -> bool {
    types.iter().any(|t| t.as_str() == contribution.contribution_type)
}

/// Render a contribution with its current content, author and links
pub async fn contribution_resource(
    state: &AppState,
    contribution: Contribution,
) -> ApiResult<Resource<ContributionView>> {
    let services = &state.services;

    let content = match contribution.current_revision {
        Some(id) => services.contents.find_by_id(id).await?,
        None => None,
    };
    let author = match content.as_ref().and_then(|c| c.author_id) {
        Some(id) => services.users.find_by_id(id).await?,
        None => None,
    };

    let parent = if is_type(&contribution, PARENTED_TYPES) {
        services.contributions.find_parent(&contribution).await?
    } else {
        None
    };
    let thread_starter = if is_type(&contribution, &[ContributionType::Post]) {
        services.contributions.find_thread_starter(&contribution).await?
    } else {
        None
    };

    let id = contribution.id;
    let links = Links::new(href::contribution(id))
        .with("contributionSources", href::contribution_sources(id))
        .with("annotations", href::contribution_annotations(id))
        .with_opt("parentContribution", parent.map(|p| href::contribution(p.id)))
        .with_opt("threadStarter", thread_starter.map(|t| href::contribution(t.id)))
        .with_opt("author", author.as_ref().map(|a| href::user(a.id)));

    let (title, text) = match content {
        Some(c) => (c.title, c.text),
        None => (None, None),
    };
    let view = ContributionView {
        id,
        contribution_type: contribution.contribution_type,
        title,
        content: text,
        author_username: author.as_ref().map(|a| a.username.clone()),
        author_realname: author.as_ref().and_then(|a| a.realname.clone()),
        author_email: author.and_then(|a| a.email),
        created: contribution
            .timed
            .start_time
            .unwrap_or(contribution.timed.created),
        upvotes: contribution.upvotes,
    };
    Ok(Resource::new(view, links))
}

async fn load(state: &AppState, id: Id) -> ApiResult<Contribution> {
    state
        .services
        .contributions
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("contribution", id))
}

/// GET /api/contributions/:id
pub async fn get_contribution(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<Resource<ContributionView>>> {
    let contribution = load(&state, id).await?;
    Ok(Json(contribution_resource(&state, contribution).await?))
}

/// GET /api/contributions/:id/sources
pub async fn get_contribution_sources(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<Vec<DataSourceInstance>>> {
    let contribution = load(&state, id).await?;
    Ok(Json(state.services.data_sources.find_sources(&contribution).await?))
}

/// GET /api/contributions/:id/parent
pub async fn get_contribution_parent(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<Resource<ContributionView>>> {
    let contribution = load(&state, id).await?;
    let parent = state
        .services
        .contributions
        .find_parent(&contribution)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("parent of contribution {}", id)))?;
    Ok(Json(contribution_resource(&state, parent).await?))
}

/// GET /api/contributions/:id/thread-starter
pub async fn get_contribution_thread_starter(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<Resource<ContributionView>>> {
    let contribution = load(&state, id).await?;
    let starter = state
        .services
        .contributions
        .find_thread_starter(&contribution)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("thread starter of contribution {}", id)))?;
    Ok(Json(contribution_resource(&state, starter).await?))
}

#[derive(Debug, Serialize)]
pub struct AnnotationView {
    #[serde(flatten)]
    pub annotation: AnnotationInstance,
    pub features: Vec<Feature>,
}

/// GET /api/contributions/:id/annotations
pub async fn get_contribution_annotations(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<Vec<AnnotationView>>> {
    let contribution = load(&state, id).await?;
    let annotations = &state.services.annotations;

    let mut views = Vec::new();
    for annotation in annotations.find_annotations(&contribution).await? {
        let features = annotations.find_features(&annotation).await?;
        views.push(AnnotationView {
            annotation,
            features,
        });
    }
    Ok(Json(views))
}

pub fn contribution_routes() -> Router<AppState> {
    Router::new()
        .route("/api/contributions/:id", get(get_contribution))
        .route("/api/contributions/:id/sources", get(get_contribution_sources))
        .route("/api/contributions/:id/parent", get(get_contribution_parent))
        .route(
            "/api/contributions/:id/thread-starter",
            get(get_contribution_thread_starter),
        )
        .route(
            "/api/contributions/:id/annotations",
            get(get_contribution_annotations),
        )
}
