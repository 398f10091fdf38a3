//! Database initialization tests
//!
//! - Automatic database creation on first run
//! - Reopening an existing file is idempotent
//! - Migrations upgrade files written by older releases
//! - Read-only connections refuse missing files

use ddb_common::config::DatabaseConfig;
use ddb_common::db::{
    connect_readonly, get_schema_version, init_database, run_migrations, CURRENT_SCHEMA_VERSION,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("discoursedb.db");

    let result = init_database(&db_path, &DatabaseConfig::default()).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("discoursedb.db");

    let pool1 = init_database(&db_path, &DatabaseConfig::default()).await.unwrap();
    sqlx::query("INSERT INTO discourses (name, descriptor, version, created) VALUES ('a', 'a', 0, '2020-01-01T00:00:00Z')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    // Second open keeps the data and does not re-run migrations
    let pool2 = init_database(&db_path, &DatabaseConfig::default()).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discourses")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(get_schema_version(&pool2).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = ddb_common::db::init_memory_database().await.unwrap();

    for table in [
        "discourses",
        "discourse_parts",
        "discourse_to_discourse_parts",
        "contributions",
        "contents",
        "discourse_part_contributions",
        "discourse_relations",
        "discourse_part_relations",
        "contexts",
        "contribution_contexts",
        "users",
        "annotation_aggregates",
        "annotation_instances",
        "features",
        "data_source_aggregates",
        "data_source_instances",
        "contribution_types",
        "discourse_part_types",
        "discourse_relation_types",
        "discourse_part_relation_types",
        "feature_types",
        "annotation_types",
        "context_types",
    ] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_migration_adds_missing_columns() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    // Tables created without the upvotes and locale columns
    sqlx::query(
        "CREATE TABLE contributions (id INTEGER PRIMARY KEY, fk_contribution_type INTEGER NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE data_source_instances (id INTEGER PRIMARY KEY, entity_source_descriptor TEXT, dataset_name TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)")
        .execute(&pool)
        .await
        .unwrap();

    run_migrations(&pool).await.unwrap();

    for (table, column) in [
        ("contributions", "upvotes"),
        ("users", "country"),
        ("users", "language"),
    ] {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
                .bind(table)
                .bind(column)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1, "{}.{} not added", table, column);
    }
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);

    // Running again is a no-op
    run_migrations(&pool).await.unwrap();
}

#[tokio::test]
async fn test_readonly_requires_existing_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.db");

    let result = connect_readonly(&missing).await;
    assert!(matches!(result, Err(ddb_common::Error::NotFound(_))));
    assert!(!missing.exists(), "read-only open must not create the file");
}

#[tokio::test]
async fn test_readonly_rejects_writes() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("discoursedb.db");
    let pool = init_database(&db_path, &DatabaseConfig::default()).await.unwrap();
    pool.close().await;

    let ro = connect_readonly(&db_path).await.unwrap();
    let result = sqlx::query("INSERT INTO discourses (name, descriptor, version, created) VALUES ('x', 'x', 0, '2020-01-01T00:00:00Z')")
        .execute(&ro)
        .await;
    assert!(result.is_err());
}
