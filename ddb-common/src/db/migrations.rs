//! Database schema migrations
//!
//! Versioned, idempotent steps that bring a database file's tables up to
//! the layout the repositories expect. `create_schema` already builds that
//! layout, so on files it created every step finds its change present and
//! only records the version. The steps matter for files whose tables were
//! created with a narrower column set.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations**: files in the field depend on them
//! 2. **Always add new migrations** for each schema change
//! 3. **Use ALTER TABLE** over DROP/CREATE so imported data survives

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    if current_version < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
        info!("✓ Migration v3 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?)",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Migration v1: ensure contributions carry an `upvotes` column
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: Add upvotes column to contributions");

    if !table_exists(pool, "contributions").await? {
        info!("  Contributions table doesn't exist yet - skipping migration");
        return Ok(());
    }

    if column_exists(pool, "contributions", "upvotes").await? {
        info!("  upvotes column already exists - skipping");
        return Ok(());
    }

    sqlx::query("ALTER TABLE contributions ADD COLUMN upvotes INTEGER NOT NULL DEFAULT 0")
        .execute(pool)
        .await?;

    info!("  ✓ Added upvotes column to contributions table");
    Ok(())
}

/// Migration v2: ensure users carry `country` and `language` columns
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Add country/language columns to users");

    if !table_exists(pool, "users").await? {
        info!("  Users table doesn't exist yet - skipping migration");
        return Ok(());
    }

    for column in ["country", "language"] {
        if column_exists(pool, "users", column).await? {
            info!("  {} column already exists - skipping", column);
            continue;
        }

        sqlx::query(&format!("ALTER TABLE users ADD COLUMN {} TEXT", column))
            .execute(pool)
            .await?;
        info!("  ✓ Added {} column to users table", column);
    }

    Ok(())
}

/// Migration v3: ensure the (dataset, descriptor) index used by phase-two lookups
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v3: Add data source lookup index");

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_data_source_instances_dataset
        ON data_source_instances(dataset_name, entity_source_descriptor)
        "#,
    )
    .execute(pool)
    .await?;

    info!("  ✓ Created idx_data_source_instances_dataset");
    Ok(())
}
