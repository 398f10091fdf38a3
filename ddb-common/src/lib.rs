//! # DiscourseDB Common Library
//!
//! Shared code for the DiscourseDB converters and REST layer:
//! - Relational schema and migrations (SQLite)
//! - Entity records and repository queries
//! - Type registry (controlled vocabularies)
//! - Annotation and data-source provenance subsystems
//! - Create-or-get service façades
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod service;
pub mod time;
pub mod types;

pub use error::{Error, Result};
pub use service::Services;
pub use types::{
    ContributionType, DataSourceType, DiscoursePartRelationType, DiscoursePartType,
    DiscourseRelationType,
};

/// Primary key of every DiscourseDB table
pub type Id = i64;
