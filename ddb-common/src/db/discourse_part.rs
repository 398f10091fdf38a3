//! Discourse part rows (forums, threads, rooms, courses, talk pages)

use super::{check_version, Annotatable, Entity, Sourced, Timed};
use crate::{Id, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoursePart {
    pub id: Id,
    pub name: Option<String>,
    pub part_type: String,
    #[serde(skip)]
    pub fk_annotation: Option<Id>,
    #[serde(skip)]
    pub fk_data_sources: Option<Id>,
    #[serde(flatten)]
    pub timed: Timed,
}

impl DiscoursePart {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            part_type: row.try_get("part_type")?,
            fk_annotation: row.try_get("fk_annotation")?,
            fk_data_sources: row.try_get("fk_data_sources")?,
            timed: Timed::from_row(row)?,
        })
    }
}

impl Entity for DiscoursePart {
    const TABLE: &'static str = "discourse_parts";

    fn entity_id(&self) -> Id {
        self.id
    }
}

impl Annotatable for DiscoursePart {}
impl Sourced for DiscoursePart {}

const SELECT: &str = r#"
    SELECT p.*, t.type AS part_type
    FROM discourse_parts p
    JOIN discourse_part_types t ON t.id = p.fk_discourse_part_type
"#;

fn fetch_many(rows: Vec<SqliteRow>) -> Result<Vec<DiscoursePart>> {
    rows.iter().map(DiscoursePart::from_row).collect()
}

pub async fn insert(
    conn: &mut SqliteConnection,
    name: Option<&str>,
    type_id: Id,
    start_time: Option<DateTime<Utc>>,
) -> Result<Id> {
    let result = sqlx::query(
        r#"
        INSERT INTO discourse_parts (name, fk_discourse_part_type, version, created, start_time)
        VALUES (?, ?, 0, ?, ?)
        "#,
    )
    .bind(name)
    .bind(type_id)
    .bind(crate::time::now())
    .bind(start_time)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Id) -> Result<Option<DiscoursePart>> {
    let row = sqlx::query(&format!("{SELECT} WHERE p.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(DiscoursePart::from_row).transpose()
}

/// Natural-key lookup: part with this name and type attached to the discourse
pub async fn find_in_discourse(
    conn: &mut SqliteConnection,
    discourse_id: Id,
    name: &str,
    part_type: &str,
) -> Result<Option<DiscoursePart>> {
    let row = sqlx::query(&format!(
        r#"{SELECT}
        JOIN discourse_to_discourse_parts j ON j.fk_discourse_part = p.id
        WHERE j.fk_discourse = ? AND p.name = ? AND t.type = ?
        ORDER BY p.id
        LIMIT 1"#
    ))
    .bind(discourse_id)
    .bind(name)
    .bind(part_type)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(DiscoursePart::from_row).transpose()
}

pub async fn find_by_discourse(
    conn: &mut SqliteConnection,
    discourse_id: Id,
) -> Result<Vec<DiscoursePart>> {
    let rows = sqlx::query(&format!(
        r#"{SELECT}
        JOIN discourse_to_discourse_parts j ON j.fk_discourse_part = p.id
        WHERE j.fk_discourse = ?
        ORDER BY p.id"#
    ))
    .bind(discourse_id)
    .fetch_all(&mut *conn)
    .await?;

    fetch_many(rows)
}

pub async fn find_all_by_type(
    conn: &mut SqliteConnection,
    part_type: &str,
) -> Result<Vec<DiscoursePart>> {
    let rows = sqlx::query(&format!("{SELECT} WHERE t.type = ? ORDER BY p.id"))
        .bind(part_type)
        .fetch_all(&mut *conn)
        .await?;

    fetch_many(rows)
}

pub async fn find_all_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Vec<DiscoursePart>> {
    let rows = sqlx::query(&format!("{SELECT} WHERE p.name = ? ORDER BY p.id"))
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;

    fetch_many(rows)
}

/// Targets of part relations of the given type starting at `source_id`
pub async fn find_children(
    conn: &mut SqliteConnection,
    source_id: Id,
    relation_type: &str,
) -> Result<Vec<DiscoursePart>> {
    let rows = sqlx::query(&format!(
        r#"{SELECT}
        JOIN discourse_part_relations r ON r.fk_target = p.id
        JOIN discourse_part_relation_types rt ON rt.id = r.fk_discourse_part_relation_type
        WHERE r.fk_source = ? AND rt.type = ?
        ORDER BY r.id"#
    ))
    .bind(source_id)
    .bind(relation_type)
    .fetch_all(&mut *conn)
    .await?;

    fetch_many(rows)
}

/// Part whose provenance contains the given source triple
pub async fn find_by_data_source(
    conn: &mut SqliteConnection,
    source_id: &str,
    descriptor: &str,
    dataset: &str,
) -> Result<Option<DiscoursePart>> {
    let row = sqlx::query(&format!(
        r#"{SELECT}
        JOIN data_source_instances d ON d.fk_sources = p.fk_data_sources
        WHERE d.entity_source_id = ? AND d.entity_source_descriptor = ? AND d.dataset_name = ?
        LIMIT 1"#
    ))
    .bind(source_id)
    .bind(descriptor)
    .bind(dataset)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(DiscoursePart::from_row).transpose()
}

/// Parts that carry no annotation of the given type
pub async fn find_without_annotation(
    conn: &mut SqliteConnection,
    annotation_type: &str,
) -> Result<Vec<DiscoursePart>> {
    let rows = sqlx::query(&format!(
        r#"{SELECT}
        WHERE NOT EXISTS (
            SELECT 1 FROM annotation_instances a
            JOIN annotation_types aty ON aty.id = a.fk_annotation_type
            WHERE a.fk_annotation_aggregate = p.fk_annotation AND aty.type = ?
        )
        ORDER BY p.id"#
    ))
    .bind(annotation_type)
    .fetch_all(&mut *conn)
    .await?;

    fetch_many(rows)
}

/// Versioned update of the mutable columns
pub async fn update(conn: &mut SqliteConnection, part: &DiscoursePart) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE discourse_parts
        SET name = ?, start_time = ?, end_time = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(&part.name)
    .bind(part.timed.start_time)
    .bind(part.timed.end_time)
    .bind(part.id)
    .bind(part.timed.version)
    .execute(&mut *conn)
    .await?;

    check_version(result, "discourse_part", part.id, part.timed.version)
}

/// Attach a contribution to a part (no-op when already attached)
pub async fn link_contribution(
    conn: &mut SqliteConnection,
    contribution_id: Id,
    part_id: Id,
    start_time: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO discourse_part_contributions (fk_contribution, fk_discourse_part, version, created, start_time)
        VALUES (?, ?, 0, ?, ?)
        ON CONFLICT(fk_contribution, fk_discourse_part) DO NOTHING
        "#,
    )
    .bind(contribution_id)
    .bind(part_id)
    .bind(crate::time::now())
    .bind(start_time)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Parts a contribution belongs to
pub async fn find_by_contribution(
    conn: &mut SqliteConnection,
    contribution_id: Id,
) -> Result<Vec<DiscoursePart>> {
    let rows = sqlx::query(&format!(
        r#"{SELECT}
        JOIN discourse_part_contributions j ON j.fk_discourse_part = p.id
        WHERE j.fk_contribution = ?
        ORDER BY p.id"#
    ))
    .bind(contribution_id)
    .fetch_all(&mut *conn)
    .await?;

    fetch_many(rows)
}
