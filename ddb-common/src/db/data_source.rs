//! Provenance records
//!
//! A `data_source_instances` row names one external record by
//! (entity_source_id, entity_source_descriptor, dataset_name). The triple is
//! UNIQUE, so each external record maps to at most one DiscourseDB entity.

use crate::{Id, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSourceInstance {
    pub id: Id,
    pub entity_source_id: String,
    pub entity_source_descriptor: String,
    pub source_type: String,
    pub dataset_name: String,
    pub aggregate_id: Option<Id>,
    #[serde(skip)]
    pub version: i64,
    pub created: chrono::DateTime<chrono::Utc>,
}

impl DataSourceInstance {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            entity_source_id: row.try_get("entity_source_id")?,
            entity_source_descriptor: row.try_get("entity_source_descriptor")?,
            source_type: row.try_get("source_type")?,
            dataset_name: row.try_get("dataset_name")?,
            aggregate_id: row.try_get("fk_sources")?,
            version: row.try_get("version")?,
            created: row.try_get("created")?,
        })
    }
}

pub async fn insert_aggregate(conn: &mut SqliteConnection) -> Result<Id> {
    let result = sqlx::query("INSERT INTO data_source_aggregates (version, created) VALUES (0, ?)")
        .bind(crate::time::now())
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Current provenance aggregate of a sourced row
pub async fn aggregate_of(conn: &mut SqliteConnection, table: &str, id: Id) -> Result<Option<Id>> {
    let aggregate: Option<Option<Id>> =
        sqlx::query_scalar(&format!("SELECT fk_data_sources FROM {} WHERE id = ?", table))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(aggregate.flatten())
}

/// Set the aggregate of a row that has none yet
pub async fn attach_aggregate(
    conn: &mut SqliteConnection,
    table: &str,
    id: Id,
    aggregate_id: Id,
) -> Result<bool> {
    let result = sqlx::query(&format!(
        "UPDATE {} SET fk_data_sources = ? WHERE id = ? AND fk_data_sources IS NULL",
        table
    ))
    .bind(aggregate_id)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Insert a provenance row unless the triple is already recorded
pub async fn insert_or_ignore_instance(
    conn: &mut SqliteConnection,
    source_id: &str,
    descriptor: &str,
    source_type: &str,
    dataset: &str,
    aggregate_id: Id,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO data_source_instances (
            entity_source_id, entity_source_descriptor, source_type, dataset_name,
            fk_sources, version, created
        ) VALUES (?, ?, ?, ?, ?, 0, ?)
        ON CONFLICT(entity_source_id, entity_source_descriptor, dataset_name) DO NOTHING
        "#,
    )
    .bind(source_id)
    .bind(descriptor)
    .bind(source_type)
    .bind(dataset)
    .bind(aggregate_id)
    .bind(crate::time::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_instance(
    conn: &mut SqliteConnection,
    source_id: &str,
    descriptor: &str,
    dataset: &str,
) -> Result<Option<DataSourceInstance>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM data_source_instances
        WHERE entity_source_id = ? AND entity_source_descriptor = ? AND dataset_name = ?
        "#,
    )
    .bind(source_id)
    .bind(descriptor)
    .bind(dataset)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(DataSourceInstance::from_row).transpose()
}

pub async fn find_instances_by_aggregate(
    conn: &mut SqliteConnection,
    aggregate_id: Id,
) -> Result<Vec<DataSourceInstance>> {
    let rows = sqlx::query("SELECT * FROM data_source_instances WHERE fk_sources = ? ORDER BY id")
        .bind(aggregate_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(DataSourceInstance::from_row).collect()
}

pub async fn count_instances(conn: &mut SqliteConnection, dataset: &str) -> Result<i64> {
    let count =
        sqlx::query_scalar("SELECT COUNT(*) FROM data_source_instances WHERE dataset_name = ?")
            .bind(dataset)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}
