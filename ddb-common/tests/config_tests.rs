//! Configuration loading and database path resolution
//!
//! Uses serial_test: tests that touch DISCOURSEDB_DATABASE or
//! DISCOURSEDB_CONFIG run sequentially.

use ddb_common::config::{
    default_database_path, locate_config_file, resolve_database_path, TomlConfig, CONFIG_ENV,
    DATABASE_ENV,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_defaults() {
    let config = TomlConfig::default();
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.database.busy_timeout_ms, 5000);
    assert_eq!(config.api.page_size, 50);
    assert_eq!(config.logging.level, "info");
    assert!(config.database.path.is_none());
}

#[test]
fn test_partial_file_fills_defaults() {
    let file = write_config(
        r#"
        [database]
        path = "/data/ddb.db"

        [api]
        bind_address = "0.0.0.0:9000"
        "#,
    );

    let config = TomlConfig::load(file.path()).unwrap();
    assert_eq!(config.database.path, Some(PathBuf::from("/data/ddb.db")));
    assert_eq!(config.database.busy_timeout_ms, 5000);
    assert_eq!(config.api.bind_address, "0.0.0.0:9000");
    assert_eq!(config.api.page_size, 50);
}

#[test]
fn test_malformed_file_is_an_error() {
    let file = write_config("[database\npath = ");
    assert!(matches!(
        TomlConfig::load(file.path()),
        Err(ddb_common::Error::Config(_))
    ));
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let config = TomlConfig::load_or_default(Some(Path::new("/nonexistent/ddb.toml"))).unwrap();
    assert_eq!(config.api.page_size, 50);
}

#[test]
#[serial]
fn test_cli_beats_env_and_file() {
    env::set_var(DATABASE_ENV, "/env/ddb.db");
    let mut config = TomlConfig::default();
    config.database.path = Some(PathBuf::from("/file/ddb.db"));

    let resolved = resolve_database_path(Some(Path::new("/cli/ddb.db")), &config);
    assert_eq!(resolved, PathBuf::from("/cli/ddb.db"));

    env::remove_var(DATABASE_ENV);
}

#[test]
#[serial]
fn test_env_beats_file() {
    env::set_var(DATABASE_ENV, "/env/ddb.db");
    let mut config = TomlConfig::default();
    config.database.path = Some(PathBuf::from("/file/ddb.db"));

    assert_eq!(resolve_database_path(None, &config), PathBuf::from("/env/ddb.db"));

    env::remove_var(DATABASE_ENV);
}

#[test]
#[serial]
fn test_file_beats_default() {
    env::remove_var(DATABASE_ENV);
    let mut config = TomlConfig::default();
    config.database.path = Some(PathBuf::from("/file/ddb.db"));

    assert_eq!(resolve_database_path(None, &config), PathBuf::from("/file/ddb.db"));
}

#[test]
#[serial]
fn test_default_when_nothing_set() {
    env::remove_var(DATABASE_ENV);
    let resolved = resolve_database_path(None, &TomlConfig::default());

    assert_eq!(resolved, default_database_path());
    assert!(resolved.ends_with("discoursedb.db"));
}

#[test]
#[serial]
fn test_config_file_env_override() {
    env::set_var(CONFIG_ENV, "/env/config.toml");
    assert_eq!(locate_config_file(None), Some(PathBuf::from("/env/config.toml")));
    assert_eq!(
        locate_config_file(Some(Path::new("/cli/config.toml"))),
        Some(PathBuf::from("/cli/config.toml"))
    );
    env::remove_var(CONFIG_ENV);
}
