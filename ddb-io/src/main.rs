//! ddb-io - batch converters
//!
//! Imports one platform export per invocation into the DiscourseDB store.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ddb_common::config::{self, TomlConfig};
use ddb_common::db::init::init_database;
use ddb_common::Services;
use ddb_io::converters::{
    BazaarConverter, EdxConverter, PiazzaConverter, ProsoloConverter, TagsConverter,
    WikipediaConverter,
};
use ddb_io::Converter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for ddb-io
#[derive(Parser, Debug)]
#[command(name = "ddb-io")]
#[command(about = "Import discussion platform exports into DiscourseDB")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, global = true, env = "DISCOURSEDB_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides the configuration file)
    #[arg(short, long, global = true, env = "DISCOURSEDB_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    source: Source,
}

#[derive(Subcommand, Debug)]
enum Source {
    /// edX forum dump (MongoDB JSON export, one post per line)
    Edx {
        dataset: String,
        input: PathBuf,
    },
    /// Bazaar chat logs
    Bazaar {
        dataset: String,
        discourse: String,
        messages: PathBuf,
        rooms: PathBuf,
    },
    /// Piazza class content, with an optional users file
    Piazza {
        dataset: String,
        discourse: String,
        content: PathBuf,
        users: Option<PathBuf>,
    },
    /// ProSolo export directory
    Prosolo {
        dataset: String,
        discourse: String,
        export_dir: PathBuf,
    },
    /// TAGS Twitter archive exported as CSV
    Tags {
        dataset: String,
        discourse: String,
        archive: PathBuf,
    },
    /// Segmented Wikipedia talk pages (JSON lines)
    Wikipedia {
        dataset: String,
        discourse: String,
        input: PathBuf,
    },
}

impl Source {
    fn into_converter(self) -> Box<dyn Converter> {
        match self {
            Source::Edx { dataset, input } => Box::new(EdxConverter::new(dataset, input)),
            Source::Bazaar {
                dataset,
                discourse,
                messages,
                rooms,
            } => Box::new(BazaarConverter::new(dataset, discourse, messages, rooms)),
            Source::Piazza {
                dataset,
                discourse,
                content,
                users,
            } => Box::new(PiazzaConverter::new(dataset, discourse, content, users)),
            Source::Prosolo {
                dataset,
                discourse,
                export_dir,
            } => Box::new(ProsoloConverter::new(dataset, discourse, export_dir)),
            Source::Tags {
                dataset,
                discourse,
                archive,
            } => Box::new(TagsConverter::new(dataset, discourse, archive)),
            Source::Wikipedia {
                dataset,
                discourse,
                input,
            } => Box::new(WikipediaConverter::new(dataset, discourse, input)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let default_directive = format!("ddb_io={0},ddb_common={0}", toml_config.logging.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_target(true)
        .init();

    info!(
        "Starting ddb-io v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let db_path = config::resolve_database_path(args.database.as_deref(), &toml_config);
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path, &toml_config.database)
        .await
        .context("Failed to open database")?;
    let services = Services::new(pool);

    let converter = args.source.into_converter();
    let stats = ddb_io::run_conversion(converter.as_ref(), &services)
        .await
        .with_context(|| format!("{} conversion failed", converter.name()))?;

    info!(converter = converter.name(), %stats, "Import finished");
    services.pool().close().await;
    Ok(())
}
