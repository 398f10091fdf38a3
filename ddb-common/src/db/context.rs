//! Situational contexts attachable to contributions

use super::{Annotatable, Entity, Sourced, Timed};
use crate::{Id, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    pub id: Id,
    pub context_type: String,
    pub current_revision: Option<Id>,
    pub first_revision: Option<Id>,
    #[serde(skip)]
    pub fk_annotation: Option<Id>,
    #[serde(skip)]
    pub fk_data_sources: Option<Id>,
    #[serde(flatten)]
    pub timed: Timed,
}

impl Context {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            context_type: row.try_get("context_type")?,
            current_revision: row.try_get("fk_current_revision")?,
            first_revision: row.try_get("fk_first_revision")?,
            fk_annotation: row.try_get("fk_annotation")?,
            fk_data_sources: row.try_get("fk_data_sources")?,
            timed: Timed::from_row(row)?,
        })
    }
}

impl Entity for Context {
    const TABLE: &'static str = "contexts";

    fn entity_id(&self) -> Id {
        self.id
    }
}

impl Annotatable for Context {}
impl Sourced for Context {}

const SELECT: &str = r#"
    SELECT x.*, t.type AS context_type
    FROM contexts x
    JOIN context_types t ON t.id = x.fk_context_type
"#;

pub async fn insert(
    conn: &mut SqliteConnection,
    type_id: Id,
    start_time: Option<DateTime<Utc>>,
) -> Result<Id> {
    let result = sqlx::query(
        "INSERT INTO contexts (fk_context_type, version, created, start_time) VALUES (?, 0, ?, ?)",
    )
    .bind(type_id)
    .bind(crate::time::now())
    .bind(start_time)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Id) -> Result<Option<Context>> {
    let row = sqlx::query(&format!("{SELECT} WHERE x.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Context::from_row).transpose()
}

/// Attach a contribution to a context (no-op when already attached)
pub async fn link_contribution(
    conn: &mut SqliteConnection,
    contribution_id: Id,
    context_id: Id,
    start_time: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO contribution_contexts (fk_contribution, fk_context, version, created, start_time)
        VALUES (?, ?, 0, ?, ?)
        ON CONFLICT(fk_contribution, fk_context) DO NOTHING
        "#,
    )
    .bind(contribution_id)
    .bind(context_id)
    .bind(crate::time::now())
    .bind(start_time)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_by_contribution(
    conn: &mut SqliteConnection,
    contribution_id: Id,
) -> Result<Vec<Context>> {
    let rows = sqlx::query(&format!(
        r#"{SELECT}
        JOIN contribution_contexts j ON j.fk_context = x.id
        WHERE j.fk_contribution = ?
        ORDER BY x.id"#
    ))
    .bind(contribution_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(Context::from_row).collect()
}
