//! Database initialization
//!
//! Creates the DiscourseDB schema on first run and upgrades older files via
//! [`crate::db::migrations`]. Natural keys that the services treat as
//! create-or-get keys carry UNIQUE constraints so concurrent converter
//! processes cannot race each other into duplicate rows.

use crate::config::DatabaseConfig;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path, config: &DatabaseConfig) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas go on the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    info!("Database busy timeout set to {} ms", config.busy_timeout_ms);

    Ok(pool)
}

/// In-memory database with the full schema.
///
/// Limited to a single connection that is never recycled: each new
/// `sqlite::memory:` connection would otherwise see an empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Open an existing database file for reading only
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(crate::Error::NotFound(format!(
            "Database file {} does not exist",
            db_path.display()
        )));
    }

    // immutable: no locking and no -shm file, so WAL databases open read-only
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .read_only(true)
        .immutable(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("Opened database read-only: {}", db_path.display());
    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;

    // Type registry
    for table in crate::db::types::TypeKind::ALL.iter().map(|k| k.table()) {
        create_type_table(pool, table).await?;
    }

    // Side channels referenced by the entity tables
    create_annotation_tables(pool).await?;
    create_data_source_tables(pool).await?;

    // Macro model
    create_discourses_table(pool).await?;
    create_discourse_parts_table(pool).await?;
    create_users_table(pool).await?;
    create_contents_table(pool).await?;
    create_contributions_table(pool).await?;
    create_contexts_table(pool).await?;

    // Junctions and relations
    create_junction_tables(pool).await?;
    create_relation_tables(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_type_table(pool: &SqlitePool, table: &str) -> Result<()> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL UNIQUE,
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL
        )
        "#
    );
    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}

async fn create_annotation_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS annotation_aggregates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS annotation_instances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_annotation_aggregate INTEGER REFERENCES annotation_aggregates(id),
            fk_annotation_type INTEGER REFERENCES annotation_types(id),
            begin_offset INTEGER,
            end_offset INTEGER,
            covered_text TEXT,
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_annotation_instances_aggregate ON annotation_instances(fk_annotation_aggregate)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS features (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_annotation INTEGER REFERENCES annotation_instances(id),
            fk_feature_type INTEGER REFERENCES feature_types(id),
            value TEXT,
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_features_annotation ON features(fk_annotation)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_data_source_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS data_source_aggregates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS data_source_instances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_source_id TEXT NOT NULL,
            entity_source_descriptor TEXT NOT NULL,
            source_type TEXT NOT NULL,
            dataset_name TEXT NOT NULL,
            fk_sources INTEGER REFERENCES data_source_aggregates(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            UNIQUE(entity_source_id, entity_source_descriptor, dataset_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_data_source_instances_aggregate ON data_source_instances(fk_sources)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_discourses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discourses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            descriptor TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            UNIQUE(name, descriptor)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_discourse_parts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discourse_parts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            fk_discourse_part_type INTEGER NOT NULL REFERENCES discourse_part_types(id),
            fk_annotation INTEGER REFERENCES annotation_aggregates(id),
            fk_data_sources INTEGER REFERENCES data_source_aggregates(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_discourse_parts_name_type ON discourse_parts(name, fk_discourse_part_type)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_discourse INTEGER NOT NULL REFERENCES discourses(id),
            username TEXT NOT NULL,
            realname TEXT,
            email TEXT,
            country TEXT,
            language TEXT,
            fk_annotation INTEGER REFERENCES annotation_aggregates(id),
            fk_data_sources INTEGER REFERENCES data_source_aggregates(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            UNIQUE(fk_discourse, username)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_contents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT,
            title TEXT,
            fk_user INTEGER REFERENCES users(id),
            fk_previous_revision INTEGER REFERENCES contents(id),
            fk_next_revision INTEGER REFERENCES contents(id),
            fk_annotation INTEGER REFERENCES annotation_aggregates(id),
            fk_data_sources INTEGER REFERENCES data_source_aggregates(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_contributions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_contribution_type INTEGER NOT NULL REFERENCES contribution_types(id),
            fk_current_revision INTEGER REFERENCES contents(id),
            fk_first_revision INTEGER REFERENCES contents(id),
            upvotes INTEGER NOT NULL DEFAULT 0,
            fk_annotation INTEGER REFERENCES annotation_aggregates(id),
            fk_data_sources INTEGER REFERENCES data_source_aggregates(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_contexts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contexts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_context_type INTEGER NOT NULL REFERENCES context_types(id),
            fk_current_revision INTEGER REFERENCES contents(id),
            fk_first_revision INTEGER REFERENCES contents(id),
            fk_annotation INTEGER REFERENCES annotation_aggregates(id),
            fk_data_sources INTEGER REFERENCES data_source_aggregates(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_junction_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discourse_to_discourse_parts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_discourse INTEGER NOT NULL REFERENCES discourses(id),
            fk_discourse_part INTEGER NOT NULL REFERENCES discourse_parts(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            UNIQUE(fk_discourse, fk_discourse_part)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discourse_part_contributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_contribution INTEGER NOT NULL REFERENCES contributions(id),
            fk_discourse_part INTEGER NOT NULL REFERENCES discourse_parts(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            UNIQUE(fk_contribution, fk_discourse_part)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_discourse_part_contributions_part ON discourse_part_contributions(fk_discourse_part)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contribution_contexts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_contribution INTEGER NOT NULL REFERENCES contributions(id),
            fk_context INTEGER NOT NULL REFERENCES contexts(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            UNIQUE(fk_contribution, fk_context)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_relation_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discourse_relations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_source INTEGER NOT NULL REFERENCES contributions(id),
            fk_target INTEGER NOT NULL REFERENCES contributions(id),
            fk_discourse_relation_type INTEGER NOT NULL REFERENCES discourse_relation_types(id),
            fk_annotation INTEGER REFERENCES annotation_aggregates(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            UNIQUE(fk_source, fk_target, fk_discourse_relation_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_discourse_relations_target ON discourse_relations(fk_target)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discourse_part_relations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_source INTEGER NOT NULL REFERENCES discourse_parts(id),
            fk_target INTEGER NOT NULL REFERENCES discourse_parts(id),
            fk_discourse_part_relation_type INTEGER NOT NULL REFERENCES discourse_part_relation_types(id),
            fk_annotation INTEGER REFERENCES annotation_aggregates(id),
            version INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            UNIQUE(fk_source, fk_target, fk_discourse_part_relation_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
