//! Typed directed edges between contributions and between discourse parts
//!
//! Both tables are UNIQUE on (source, target, type); inserts ignore
//! conflicts so relation creation is create-or-get.

use super::{Annotatable, Entity, Timed};
use crate::{Id, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscourseRelation {
    pub id: Id,
    pub source_id: Id,
    pub target_id: Id,
    pub relation_type: String,
    #[serde(skip)]
    pub fk_annotation: Option<Id>,
    #[serde(flatten)]
    pub timed: Timed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoursePartRelation {
    pub id: Id,
    pub source_id: Id,
    pub target_id: Id,
    pub relation_type: String,
    #[serde(skip)]
    pub fk_annotation: Option<Id>,
    #[serde(flatten)]
    pub timed: Timed,
}

impl DiscourseRelation {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            source_id: row.try_get("fk_source")?,
            target_id: row.try_get("fk_target")?,
            relation_type: row.try_get("relation_type")?,
            fk_annotation: row.try_get("fk_annotation")?,
            timed: Timed::from_row(row)?,
        })
    }
}

impl DiscoursePartRelation {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            source_id: row.try_get("fk_source")?,
            target_id: row.try_get("fk_target")?,
            relation_type: row.try_get("relation_type")?,
            fk_annotation: row.try_get("fk_annotation")?,
            timed: Timed::from_row(row)?,
        })
    }
}

impl Entity for DiscourseRelation {
    const TABLE: &'static str = "discourse_relations";

    fn entity_id(&self) -> Id {
        self.id
    }
}

impl Entity for DiscoursePartRelation {
    const TABLE: &'static str = "discourse_part_relations";

    fn entity_id(&self) -> Id {
        self.id
    }
}

impl Annotatable for DiscourseRelation {}
impl Annotatable for DiscoursePartRelation {}

const SELECT_DISCOURSE: &str = r#"
    SELECT r.*, t.type AS relation_type
    FROM discourse_relations r
    JOIN discourse_relation_types t ON t.id = r.fk_discourse_relation_type
"#;

const SELECT_PART: &str = r#"
    SELECT r.*, t.type AS relation_type
    FROM discourse_part_relations r
    JOIN discourse_part_relation_types t ON t.id = r.fk_discourse_part_relation_type
"#;

// Contribution relations

pub async fn insert_or_ignore_discourse_relation(
    conn: &mut SqliteConnection,
    source_id: Id,
    target_id: Id,
    type_id: Id,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO discourse_relations (fk_source, fk_target, fk_discourse_relation_type, version, created)
        VALUES (?, ?, ?, 0, ?)
        ON CONFLICT(fk_source, fk_target, fk_discourse_relation_type) DO NOTHING
        "#,
    )
    .bind(source_id)
    .bind(target_id)
    .bind(type_id)
    .bind(crate::time::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_discourse_relation(
    conn: &mut SqliteConnection,
    source_id: Id,
    target_id: Id,
    relation_type: &str,
) -> Result<Option<DiscourseRelation>> {
    let row = sqlx::query(&format!(
        "{SELECT_DISCOURSE} WHERE r.fk_source = ? AND r.fk_target = ? AND t.type = ?"
    ))
    .bind(source_id)
    .bind(target_id)
    .bind(relation_type)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(DiscourseRelation::from_row).transpose()
}

/// Relations leaving `source_id`, optionally restricted to one type
pub async fn find_discourse_relations_from(
    conn: &mut SqliteConnection,
    source_id: Id,
    relation_type: Option<&str>,
) -> Result<Vec<DiscourseRelation>> {
    let rows = sqlx::query(&format!(
        "{SELECT_DISCOURSE} WHERE r.fk_source = ? AND (? IS NULL OR t.type = ?) ORDER BY r.id"
    ))
    .bind(source_id)
    .bind(relation_type)
    .bind(relation_type)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(DiscourseRelation::from_row).collect()
}

/// Relations arriving at `target_id`, optionally restricted to one type
pub async fn find_discourse_relations_to(
    conn: &mut SqliteConnection,
    target_id: Id,
    relation_type: Option<&str>,
) -> Result<Vec<DiscourseRelation>> {
    let rows = sqlx::query(&format!(
        "{SELECT_DISCOURSE} WHERE r.fk_target = ? AND (? IS NULL OR t.type = ?) ORDER BY r.id"
    ))
    .bind(target_id)
    .bind(relation_type)
    .bind(relation_type)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(DiscourseRelation::from_row).collect()
}

pub async fn count_discourse_relations(conn: &mut SqliteConnection) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM discourse_relations")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

// Discourse part relations

pub async fn insert_or_ignore_part_relation(
    conn: &mut SqliteConnection,
    source_id: Id,
    target_id: Id,
    type_id: Id,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO discourse_part_relations (fk_source, fk_target, fk_discourse_part_relation_type, version, created)
        VALUES (?, ?, ?, 0, ?)
        ON CONFLICT(fk_source, fk_target, fk_discourse_part_relation_type) DO NOTHING
        "#,
    )
    .bind(source_id)
    .bind(target_id)
    .bind(type_id)
    .bind(crate::time::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_part_relation(
    conn: &mut SqliteConnection,
    source_id: Id,
    target_id: Id,
    relation_type: &str,
) -> Result<Option<DiscoursePartRelation>> {
    let row = sqlx::query(&format!(
        "{SELECT_PART} WHERE r.fk_source = ? AND r.fk_target = ? AND t.type = ?"
    ))
    .bind(source_id)
    .bind(target_id)
    .bind(relation_type)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(DiscoursePartRelation::from_row).transpose()
}

pub async fn count_part_relations(conn: &mut SqliteConnection) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM discourse_part_relations")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}
