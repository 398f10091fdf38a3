//! Type registry tables
//!
//! Each vocabulary lives in its own `*_types` table with a UNIQUE `type`
//! column. Lookups are create-or-get: an INSERT that ignores conflicts,
//! followed by a SELECT, so two writers asking for the same string always
//! end up with the same row.

use crate::{Error, Id, Result};
use sqlx::SqliteConnection;

/// Which vocabulary table a type string belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Contribution,
    DiscoursePart,
    DiscourseRelation,
    DiscoursePartRelation,
    Feature,
    Annotation,
    Context,
}

impl TypeKind {
    pub const ALL: &'static [TypeKind] = &[
        TypeKind::Contribution,
        TypeKind::DiscoursePart,
        TypeKind::DiscourseRelation,
        TypeKind::DiscoursePartRelation,
        TypeKind::Feature,
        TypeKind::Annotation,
        TypeKind::Context,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            TypeKind::Contribution => "contribution_types",
            TypeKind::DiscoursePart => "discourse_part_types",
            TypeKind::DiscourseRelation => "discourse_relation_types",
            TypeKind::DiscoursePartRelation => "discourse_part_relation_types",
            TypeKind::Feature => "feature_types",
            TypeKind::Annotation => "annotation_types",
            TypeKind::Context => "context_types",
        }
    }
}

/// Return the id of the type row for `value`, creating it if needed
pub async fn create_or_get_type(
    conn: &mut SqliteConnection,
    kind: TypeKind,
    value: &str,
) -> Result<Id> {
    if value.trim().is_empty() {
        return Err(Error::empty(kind.table()));
    }

    let insert = format!(
        "INSERT INTO {} (type, version, created) VALUES (?, 0, ?) ON CONFLICT(type) DO NOTHING",
        kind.table()
    );
    sqlx::query(&insert)
        .bind(value)
        .bind(crate::time::now())
        .execute(&mut *conn)
        .await?;

    let select = format!("SELECT id FROM {} WHERE type = ?", kind.table());
    let id: Id = sqlx::query_scalar(&select)
        .bind(value)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

/// Look up a type row without creating it
pub async fn find_type(
    conn: &mut SqliteConnection,
    kind: TypeKind,
    value: &str,
) -> Result<Option<Id>> {
    let select = format!("SELECT id FROM {} WHERE type = ?", kind.table());
    let id = sqlx::query_scalar(&select)
        .bind(value)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(id)
}

/// Type string of a registry row
pub async fn type_name(conn: &mut SqliteConnection, kind: TypeKind, id: Id) -> Result<String> {
    let select = format!("SELECT type FROM {} WHERE id = ?", kind.table());
    sqlx::query_scalar(&select)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", kind.table(), id)))
}

/// Number of rows in a vocabulary table
pub async fn count_types(conn: &mut SqliteConnection, kind: TypeKind) -> Result<i64> {
    let select = format!("SELECT COUNT(*) FROM {}", kind.table());
    let count = sqlx::query_scalar(&select).fetch_one(&mut *conn).await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_create_or_get_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = create_or_get_type(&mut conn, TypeKind::Contribution, "POST").await.unwrap();
        let second = create_or_get_type(&mut conn, TypeKind::Contribution, "POST").await.unwrap();
        let third = create_or_get_type(&mut conn, TypeKind::Contribution, "POST").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(count_types(&mut conn, TypeKind::Contribution).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_vocabularies_are_separate() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        create_or_get_type(&mut conn, TypeKind::DiscourseRelation, "COMMENT").await.unwrap();
        create_or_get_type(&mut conn, TypeKind::Contribution, "COMMENT").await.unwrap();

        assert_eq!(count_types(&mut conn, TypeKind::DiscourseRelation).await.unwrap(), 1);
        assert_eq!(count_types(&mut conn, TypeKind::Contribution).await.unwrap(), 1);
        assert_eq!(count_types(&mut conn, TypeKind::Feature).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_type_rejected() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let result = create_or_get_type(&mut conn, TypeKind::Feature, "  ").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_type_name_lookup() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let id = create_or_get_type(&mut conn, TypeKind::Annotation, "bot").await.unwrap();
        assert_eq!(type_name(&mut conn, TypeKind::Annotation, id).await.unwrap(), "bot");
        assert!(find_type(&mut conn, TypeKind::Annotation, "human").await.unwrap().is_none());
    }
}
