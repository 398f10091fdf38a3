//! Author identities, scoped to one discourse

use super::{check_version, Annotatable, Entity, Sourced, Timed};
use crate::{Id, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub discourse_id: Id,
    pub username: String,
    pub realname: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    #[serde(skip)]
    pub fk_annotation: Option<Id>,
    #[serde(skip)]
    pub fk_data_sources: Option<Id>,
    #[serde(flatten)]
    pub timed: Timed,
}

impl User {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            discourse_id: row.try_get("fk_discourse")?,
            username: row.try_get("username")?,
            realname: row.try_get("realname")?,
            email: row.try_get("email")?,
            country: row.try_get("country")?,
            language: row.try_get("language")?,
            fk_annotation: row.try_get("fk_annotation")?,
            fk_data_sources: row.try_get("fk_data_sources")?,
            timed: Timed::from_row(row)?,
        })
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";

    fn entity_id(&self) -> Id {
        self.id
    }
}

impl Annotatable for User {}
impl Sourced for User {}

/// Insert unless the username already exists in the discourse
pub async fn insert_or_ignore(
    conn: &mut SqliteConnection,
    discourse_id: Id,
    username: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (fk_discourse, username, version, created)
        VALUES (?, ?, 0, ?)
        ON CONFLICT(fk_discourse, username) DO NOTHING
        "#,
    )
    .bind(discourse_id)
    .bind(username)
    .bind(crate::time::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_by_username(
    conn: &mut SqliteConnection,
    discourse_id: Id,
    username: &str,
) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE fk_discourse = ? AND username = ?")
        .bind(discourse_id)
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(User::from_row).transpose()
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Id) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(User::from_row).transpose()
}

pub async fn find_by_data_source(
    conn: &mut SqliteConnection,
    source_id: &str,
    descriptor: &str,
    dataset: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT u.* FROM users u
        JOIN data_source_instances d ON d.fk_sources = u.fk_data_sources
        WHERE d.entity_source_id = ? AND d.entity_source_descriptor = ? AND d.dataset_name = ?
        LIMIT 1
        "#,
    )
    .bind(source_id)
    .bind(descriptor)
    .bind(dataset)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(User::from_row).transpose()
}

/// Versioned update of the profile columns
pub async fn update(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET realname = ?, email = ?, country = ?, language = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(&user.realname)
    .bind(&user.email)
    .bind(&user.country)
    .bind(&user.language)
    .bind(user.id)
    .bind(user.timed.version)
    .execute(&mut *conn)
    .await?;

    check_version(result, "user", user.id, user.timed.version)
}
