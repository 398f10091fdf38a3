//! Content revisions
//!
//! A contribution's text history is a doubly linked chain of content rows
//! (`fk_previous_revision` / `fk_next_revision`).

use super::{Annotatable, Entity, Sourced, Timed};
use crate::{Id, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub id: Id,
    pub text: Option<String>,
    pub title: Option<String>,
    pub author_id: Option<Id>,
    pub previous_revision: Option<Id>,
    pub next_revision: Option<Id>,
    #[serde(skip)]
    pub fk_annotation: Option<Id>,
    #[serde(skip)]
    pub fk_data_sources: Option<Id>,
    #[serde(flatten)]
    pub timed: Timed,
}

impl Content {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            text: row.try_get("text")?,
            title: row.try_get("title")?,
            author_id: row.try_get("fk_user")?,
            previous_revision: row.try_get("fk_previous_revision")?,
            next_revision: row.try_get("fk_next_revision")?,
            fk_annotation: row.try_get("fk_annotation")?,
            fk_data_sources: row.try_get("fk_data_sources")?,
            timed: Timed::from_row(row)?,
        })
    }
}

impl Entity for Content {
    const TABLE: &'static str = "contents";

    fn entity_id(&self) -> Id {
        self.id
    }
}

impl Annotatable for Content {}
impl Sourced for Content {}

pub async fn insert(
    conn: &mut SqliteConnection,
    author_id: Option<Id>,
    text: Option<&str>,
    title: Option<&str>,
    start_time: Option<DateTime<Utc>>,
) -> Result<Id> {
    let result = sqlx::query(
        r#"
        INSERT INTO contents (text, title, fk_user, version, created, start_time)
        VALUES (?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(text)
    .bind(title)
    .bind(author_id)
    .bind(crate::time::now())
    .bind(start_time)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Id) -> Result<Option<Content>> {
    let row = sqlx::query("SELECT * FROM contents WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Content::from_row).transpose()
}

pub async fn find_by_data_source(
    conn: &mut SqliteConnection,
    source_id: &str,
    descriptor: &str,
    dataset: &str,
) -> Result<Option<Content>> {
    let row = sqlx::query(
        r#"
        SELECT c.* FROM contents c
        JOIN data_source_instances d ON d.fk_sources = c.fk_data_sources
        WHERE d.entity_source_id = ? AND d.entity_source_descriptor = ? AND d.dataset_name = ?
        LIMIT 1
        "#,
    )
    .bind(source_id)
    .bind(descriptor)
    .bind(dataset)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(Content::from_row).transpose()
}

/// Link `previous` -> `next` in the revision chain (both directions)
pub async fn link_revisions(conn: &mut SqliteConnection, previous: Id, next: Id) -> Result<()> {
    sqlx::query(
        "UPDATE contents SET fk_next_revision = ?, version = version + 1 WHERE id = ?",
    )
    .bind(next)
    .bind(previous)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE contents SET fk_previous_revision = ?, version = version + 1 WHERE id = ?",
    )
    .bind(previous)
    .bind(next)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Follow the chain back from `id` to its first revision, oldest first
pub async fn revision_history(conn: &mut SqliteConnection, id: Id) -> Result<Vec<Content>> {
    let mut chain = Vec::new();
    let mut cursor = Some(id);

    while let Some(current) = cursor {
        let Some(content) = find_by_id(conn, current).await? else {
            break;
        };
        cursor = content.previous_revision;
        chain.push(content);
        // Malformed chains must not loop forever
        if chain.len() > 100_000 {
            break;
        }
    }

    chain.reverse();
    Ok(chain)
}
