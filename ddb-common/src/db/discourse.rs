//! Discourse rows: the root namespace of an imported community

use super::Timed;
use crate::{Id, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discourse {
    pub id: Id,
    pub name: String,
    pub descriptor: String,
    #[serde(flatten)]
    pub timed: Timed,
}

impl Discourse {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            descriptor: row.try_get("descriptor")?,
            timed: Timed::from_row(row)?,
        })
    }
}

/// Insert unless (name, descriptor) already exists
pub async fn insert_or_ignore(
    conn: &mut SqliteConnection,
    name: &str,
    descriptor: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO discourses (name, descriptor, version, created)
        VALUES (?, ?, 0, ?)
        ON CONFLICT(name, descriptor) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(descriptor)
    .bind(crate::time::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_by_name_and_descriptor(
    conn: &mut SqliteConnection,
    name: &str,
    descriptor: &str,
) -> Result<Option<Discourse>> {
    let row = sqlx::query("SELECT * FROM discourses WHERE name = ? AND descriptor = ?")
        .bind(name)
        .bind(descriptor)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Discourse::from_row).transpose()
}

/// Oldest discourse with the given name, whatever its descriptor
pub async fn find_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Discourse>> {
    let row = sqlx::query("SELECT * FROM discourses WHERE name = ? ORDER BY id LIMIT 1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Discourse::from_row).transpose()
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Id) -> Result<Option<Discourse>> {
    let row = sqlx::query("SELECT * FROM discourses WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Discourse::from_row).transpose()
}

/// Discourse a part is (or was first) attached to
pub async fn find_by_discourse_part(
    conn: &mut SqliteConnection,
    part_id: Id,
) -> Result<Option<Discourse>> {
    let row = sqlx::query(
        r#"
        SELECT d.* FROM discourses d
        JOIN discourse_to_discourse_parts j ON j.fk_discourse = d.id
        WHERE j.fk_discourse_part = ?
        ORDER BY j.id
        LIMIT 1
        "#,
    )
    .bind(part_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(Discourse::from_row).transpose()
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Discourse>> {
    let rows = sqlx::query("SELECT * FROM discourses ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(Discourse::from_row).collect()
}

/// Attach a part to a discourse (no-op when already attached)
pub async fn link_part(conn: &mut SqliteConnection, discourse_id: Id, part_id: Id) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO discourse_to_discourse_parts (fk_discourse, fk_discourse_part, version, created, start_time)
        VALUES (?, ?, 0, ?, ?)
        ON CONFLICT(fk_discourse, fk_discourse_part) DO NOTHING
        "#,
    )
    .bind(discourse_id)
    .bind(part_id)
    .bind(crate::time::now())
    .bind(crate::time::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Close the validity window of a part's membership in a discourse
pub async fn end_part_membership(
    conn: &mut SqliteConnection,
    discourse_id: Id,
    part_id: Id,
    end_time: chrono::DateTime<chrono::Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE discourse_to_discourse_parts
        SET end_time = ?, version = version + 1
        WHERE fk_discourse = ? AND fk_discourse_part = ? AND end_time IS NULL
        "#,
    )
    .bind(end_time)
    .bind(discourse_id)
    .bind(part_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}
