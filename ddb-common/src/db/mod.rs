//! Database schema, entity records and repository queries
//!
//! Repository functions take `&mut SqliteConnection` so a service can run
//! several of them inside one transaction (`&mut *tx`).

pub mod annotation;
pub mod content;
pub mod context;
pub mod contribution;
pub mod data_source;
pub mod discourse;
pub mod discourse_part;
pub mod init;
pub mod migrations;
pub mod relation;
pub mod types;
pub mod user;

pub use init::*;
pub use migrations::{get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};

use crate::{Error, Id, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteQueryResult, SqliteRow};
use sqlx::Row;

/// Bookkeeping columns shared by every timed entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timed {
    /// Optimistic lock counter, bumped on every update
    pub version: i64,
    /// Set once on insert
    pub created: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Timed {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            version: row.try_get("version")?,
            created: row.try_get("created")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
        })
    }
}

/// A row addressable by table and primary key
pub trait Entity {
    const TABLE: &'static str;

    fn entity_id(&self) -> Id;
}

/// Entities that can hold one annotation aggregate (`fk_annotation` column)
pub trait Annotatable: Entity {}

/// Entities that record their provenance (`fk_data_sources` column)
pub trait Sourced: Entity {}

/// Turn a versioned UPDATE's result into [`Error::VersionConflict`] when no row matched.
///
/// Every versioned update is written as
/// `... SET version = version + 1 WHERE id = ? AND version = ?`.
pub(crate) fn check_version(
    result: SqliteQueryResult,
    entity: &'static str,
    id: Id,
    expected: i64,
) -> Result<()> {
    if result.rows_affected() == 0 {
        return Err(Error::VersionConflict {
            entity,
            id,
            expected,
        });
    }
    Ok(())
}

/// Result page of a list query
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}
