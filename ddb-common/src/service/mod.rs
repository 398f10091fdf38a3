//! Create-or-get service façades
//!
//! Every public service method runs in its own transaction. Services are
//! cheap to clone (they hold a pool handle) and never nest pool
//! acquisitions, so they also work on the single-connection in-memory pool.

pub mod annotation;
pub mod content;
pub mod context;
pub mod contribution;
pub mod data_source;
pub mod discourse;
pub mod discourse_part;
pub mod user;

pub use annotation::AnnotationService;
pub use content::ContentService;
pub use context::ContextService;
pub use contribution::ContributionService;
pub use data_source::{DataSourceService, SourceRecord};
pub use discourse::DiscourseService;
pub use discourse_part::DiscoursePartService;
pub use user::UserService;

use sqlx::{Pool, Sqlite};

/// All services over one pool
#[derive(Clone)]
pub struct Services {
    pub discourses: DiscourseService,
    pub discourse_parts: DiscoursePartService,
    pub contributions: ContributionService,
    pub contents: ContentService,
    pub users: UserService,
    pub contexts: ContextService,
    pub data_sources: DataSourceService,
    pub annotations: AnnotationService,
    db: Pool<Sqlite>,
}

impl Services {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self {
            discourses: DiscourseService::new(db.clone()),
            discourse_parts: DiscoursePartService::new(db.clone()),
            contributions: ContributionService::new(db.clone()),
            contents: ContentService::new(db.clone()),
            users: UserService::new(db.clone()),
            contexts: ContextService::new(db.clone()),
            data_sources: DataSourceService::new(db.clone()),
            annotations: AnnotationService::new(db.clone()),
            db,
        }
    }

    /// Underlying pool, for ad-hoc read queries
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.db
    }
}
