//! Contribution rows: the atomic authored unit

use super::{check_version, Annotatable, Entity, Sourced, Timed};
use crate::{Id, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub id: Id,
    pub contribution_type: String,
    pub current_revision: Option<Id>,
    pub first_revision: Option<Id>,
    pub upvotes: i64,
    #[serde(skip)]
    pub fk_annotation: Option<Id>,
    #[serde(skip)]
    pub fk_data_sources: Option<Id>,
    #[serde(flatten)]
    pub timed: Timed,
}

impl Contribution {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            contribution_type: row.try_get("contribution_type")?,
            current_revision: row.try_get("fk_current_revision")?,
            first_revision: row.try_get("fk_first_revision")?,
            upvotes: row.try_get("upvotes")?,
            fk_annotation: row.try_get("fk_annotation")?,
            fk_data_sources: row.try_get("fk_data_sources")?,
            timed: Timed::from_row(row)?,
        })
    }
}

impl Entity for Contribution {
    const TABLE: &'static str = "contributions";

    fn entity_id(&self) -> Id {
        self.id
    }
}

impl Annotatable for Contribution {}
impl Sourced for Contribution {}

const SELECT: &str = r#"
    SELECT c.*, t.type AS contribution_type
    FROM contributions c
    JOIN contribution_types t ON t.id = c.fk_contribution_type
"#;

pub async fn insert(
    conn: &mut SqliteConnection,
    type_id: Id,
    start_time: Option<DateTime<Utc>>,
) -> Result<Id> {
    let result = sqlx::query(
        r#"
        INSERT INTO contributions (fk_contribution_type, upvotes, version, created, start_time)
        VALUES (?, 0, 0, ?, ?)
        "#,
    )
    .bind(type_id)
    .bind(crate::time::now())
    .bind(start_time)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Id) -> Result<Option<Contribution>> {
    let row = sqlx::query(&format!("{SELECT} WHERE c.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Contribution::from_row).transpose()
}

pub async fn find_by_data_source(
    conn: &mut SqliteConnection,
    source_id: &str,
    descriptor: &str,
    dataset: &str,
) -> Result<Option<Contribution>> {
    let row = sqlx::query(&format!(
        r#"{SELECT}
        JOIN data_source_instances d ON d.fk_sources = c.fk_data_sources
        WHERE d.entity_source_id = ? AND d.entity_source_descriptor = ? AND d.dataset_name = ?
        LIMIT 1"#
    ))
    .bind(source_id)
    .bind(descriptor)
    .bind(dataset)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(Contribution::from_row).transpose()
}

/// Point the contribution at a new current revision; the first revision is
/// only set when still empty.
pub async fn set_current_revision(
    conn: &mut SqliteConnection,
    contribution: &Contribution,
    content_id: Id,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE contributions
        SET fk_current_revision = ?,
            fk_first_revision = COALESCE(fk_first_revision, ?),
            version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(content_id)
    .bind(content_id)
    .bind(contribution.id)
    .bind(contribution.timed.version)
    .execute(&mut *conn)
    .await?;

    check_version(result, "contribution", contribution.id, contribution.timed.version)
}

pub async fn set_upvotes(
    conn: &mut SqliteConnection,
    contribution: &Contribution,
    upvotes: i64,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE contributions SET upvotes = ?, version = version + 1 WHERE id = ? AND version = ?",
    )
    .bind(upvotes)
    .bind(contribution.id)
    .bind(contribution.timed.version)
    .execute(&mut *conn)
    .await?;

    check_version(result, "contribution", contribution.id, contribution.timed.version)
}

/// Contributions attached to a part, oldest first
pub async fn find_by_discourse_part(
    conn: &mut SqliteConnection,
    part_id: Id,
    limit: i64,
    offset: i64,
) -> Result<Vec<Contribution>> {
    let rows = sqlx::query(&format!(
        r#"{SELECT}
        JOIN discourse_part_contributions j ON j.fk_contribution = c.id
        WHERE j.fk_discourse_part = ?
        ORDER BY c.start_time, c.id
        LIMIT ? OFFSET ?"#
    ))
    .bind(part_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(Contribution::from_row).collect()
}

pub async fn count_by_discourse_part(conn: &mut SqliteConnection, part_id: Id) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM discourse_part_contributions WHERE fk_discourse_part = ?",
    )
    .bind(part_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM contributions")
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}
