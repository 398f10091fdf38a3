//! ddb-api library - read-only REST projection of a DiscourseDB store
//!
//! Every resource carries `_links` to its related resources. The server
//! never writes; the pool is opened read-only.

use axum::Router;
use ddb_common::Services;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pagination;
pub mod resource;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// Contributions per page in paged listings
    pub page_size: i64,
}

impl AppState {
    pub fn new(services: Services, page_size: i64) -> Self {
        Self {
            services,
            page_size,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::discourse_routes())
        .merge(api::discourse_part_routes())
        .merge(api::contribution_routes())
        .merge(api::user_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
