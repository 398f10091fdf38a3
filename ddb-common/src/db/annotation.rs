//! Annotation aggregates, instances and features
//!
//! An annotatable row points at one `annotation_aggregates` row via its
//! `fk_annotation` column. Instances point at their aggregate, features at
//! their instance.

use super::Timed;
use crate::{Id, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationInstance {
    pub id: Id,
    pub aggregate_id: Option<Id>,
    pub annotation_type: Option<String>,
    pub begin_offset: Option<i64>,
    pub end_offset: Option<i64>,
    pub covered_text: Option<String>,
    #[serde(flatten)]
    pub timed: Timed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub id: Id,
    pub annotation_id: Option<Id>,
    pub feature_type: Option<String>,
    pub value: Option<String>,
    #[serde(flatten)]
    pub timed: Timed,
}

impl AnnotationInstance {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            aggregate_id: row.try_get("fk_annotation_aggregate")?,
            annotation_type: row.try_get("annotation_type")?,
            begin_offset: row.try_get("begin_offset")?,
            end_offset: row.try_get("end_offset")?,
            covered_text: row.try_get("covered_text")?,
            timed: Timed::from_row(row)?,
        })
    }
}

impl Feature {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            annotation_id: row.try_get("fk_annotation")?,
            feature_type: row.try_get("feature_type")?,
            value: row.try_get("value")?,
            timed: Timed::from_row(row)?,
        })
    }
}

const SELECT_INSTANCE: &str = r#"
    SELECT a.*, t.type AS annotation_type
    FROM annotation_instances a
    LEFT JOIN annotation_types t ON t.id = a.fk_annotation_type
"#;

const SELECT_FEATURE: &str = r#"
    SELECT f.*, t.type AS feature_type
    FROM features f
    LEFT JOIN feature_types t ON t.id = f.fk_feature_type
"#;

// Aggregates

pub async fn insert_aggregate(conn: &mut SqliteConnection) -> Result<Id> {
    let result = sqlx::query("INSERT INTO annotation_aggregates (version, created) VALUES (0, ?)")
        .bind(crate::time::now())
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Current aggregate of an annotatable row, read from the store
pub async fn aggregate_of(conn: &mut SqliteConnection, table: &str, id: Id) -> Result<Option<Id>> {
    let aggregate: Option<Option<Id>> =
        sqlx::query_scalar(&format!("SELECT fk_annotation FROM {} WHERE id = ?", table))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(aggregate.flatten())
}

/// Set the aggregate of a row that has none yet. Returns false when another
/// writer attached one first.
pub async fn attach_aggregate(
    conn: &mut SqliteConnection,
    table: &str,
    id: Id,
    aggregate_id: Id,
) -> Result<bool> {
    let result = sqlx::query(&format!(
        "UPDATE {} SET fk_annotation = ? WHERE id = ? AND fk_annotation IS NULL",
        table
    ))
    .bind(aggregate_id)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_aggregates(conn: &mut SqliteConnection) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM annotation_aggregates")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

// Instances

pub async fn insert_instance(conn: &mut SqliteConnection, type_id: Option<Id>) -> Result<Id> {
    let result = sqlx::query(
        "INSERT INTO annotation_instances (fk_annotation_type, version, created) VALUES (?, 0, ?)",
    )
    .bind(type_id)
    .bind(crate::time::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_instance(
    conn: &mut SqliteConnection,
    id: Id,
) -> Result<Option<AnnotationInstance>> {
    let row = sqlx::query(&format!("{SELECT_INSTANCE} WHERE a.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(AnnotationInstance::from_row).transpose()
}

pub async fn set_instance_aggregate(
    conn: &mut SqliteConnection,
    instance_id: Id,
    aggregate_id: Id,
) -> Result<()> {
    sqlx::query(
        "UPDATE annotation_instances SET fk_annotation_aggregate = ?, version = version + 1 WHERE id = ?",
    )
    .bind(aggregate_id)
    .bind(instance_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Record the text span an annotation covers
pub async fn set_instance_span(
    conn: &mut SqliteConnection,
    instance_id: Id,
    begin_offset: i64,
    end_offset: i64,
    covered_text: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE annotation_instances
        SET begin_offset = ?, end_offset = ?, covered_text = ?, version = version + 1
        WHERE id = ?
        "#,
    )
    .bind(begin_offset)
    .bind(end_offset)
    .bind(covered_text)
    .bind(instance_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_instances_by_aggregate(
    conn: &mut SqliteConnection,
    aggregate_id: Id,
) -> Result<Vec<AnnotationInstance>> {
    let rows = sqlx::query(&format!(
        "{SELECT_INSTANCE} WHERE a.fk_annotation_aggregate = ? ORDER BY a.id"
    ))
    .bind(aggregate_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(AnnotationInstance::from_row).collect()
}

/// Instances carrying a feature with the given type and value
pub async fn find_instances_by_feature(
    conn: &mut SqliteConnection,
    feature_type: &str,
    value: &str,
) -> Result<Vec<AnnotationInstance>> {
    let rows = sqlx::query(&format!(
        r#"{SELECT_INSTANCE}
        WHERE a.id IN (
            SELECT f.fk_annotation FROM features f
            JOIN feature_types ft ON ft.id = f.fk_feature_type
            WHERE ft.type = ? AND f.value = ?
        )
        ORDER BY a.id"#
    ))
    .bind(feature_type)
    .bind(value)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(AnnotationInstance::from_row).collect()
}

/// Delete an instance together with its features
pub async fn delete_instance(conn: &mut SqliteConnection, instance_id: Id) -> Result<()> {
    sqlx::query("DELETE FROM features WHERE fk_annotation = ?")
        .bind(instance_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM annotation_instances WHERE id = ?")
        .bind(instance_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// Features

pub async fn insert_feature(
    conn: &mut SqliteConnection,
    type_id: Option<Id>,
    value: Option<&str>,
) -> Result<Id> {
    let result = sqlx::query(
        "INSERT INTO features (fk_feature_type, value, version, created) VALUES (?, ?, 0, ?)",
    )
    .bind(type_id)
    .bind(value)
    .bind(crate::time::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn set_feature_annotation(
    conn: &mut SqliteConnection,
    feature_id: Id,
    instance_id: Id,
) -> Result<()> {
    sqlx::query("UPDATE features SET fk_annotation = ?, version = version + 1 WHERE id = ?")
        .bind(instance_id)
        .bind(feature_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn find_feature(conn: &mut SqliteConnection, id: Id) -> Result<Option<Feature>> {
    let row = sqlx::query(&format!("{SELECT_FEATURE} WHERE f.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Feature::from_row).transpose()
}

pub async fn find_features_by_instance(
    conn: &mut SqliteConnection,
    instance_id: Id,
) -> Result<Vec<Feature>> {
    let rows = sqlx::query(&format!("{SELECT_FEATURE} WHERE f.fk_annotation = ? ORDER BY f.id"))
        .bind(instance_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(Feature::from_row).collect()
}
