//! ddb-io library interface
//!
//! Source-specific converters that map platform exports into DiscourseDB.
//! Every converter runs in two phases: phase one creates entities and
//! records their provenance, phase two wires relations between entities by
//! re-locating them through their source ids. Phase two never starts
//! before phase one has finished.

pub mod converters;
pub mod error;
pub mod input;
pub mod mapping;

pub use crate::error::{ConvertError, ConvertResult};

use async_trait::async_trait;
use ddb_common::{DataSourceType, Services};
use ddb_common::service::SourceRecord;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

/// Counters reported by a conversion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    /// Source records read, over both phases
    pub records_read: u64,
    pub entities_created: u64,
    /// Records whose entity was found through provenance and reused
    pub already_imported: u64,
    /// Relations and memberships resolved in phase two
    pub relations_linked: u64,
    /// Invalid records and dangling references
    pub records_skipped: u64,
}

impl fmt::Display for ConversionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read={} created={} reused={} linked={} skipped={}",
            self.records_read,
            self.entities_created,
            self.already_imported,
            self.relations_linked,
            self.records_skipped
        )
    }
}

/// Dataset a run writes into, plus the platform it came from
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub dataset: String,
    pub source_type: DataSourceType,
}

impl ImportContext {
    pub fn new(dataset: impl Into<String>, source_type: DataSourceType) -> Self {
        Self {
            dataset: dataset.into(),
            source_type,
        }
    }

    /// Provenance record for one source id under `descriptor`
    pub fn source(&self, source_id: impl Into<String>, descriptor: &str) -> SourceRecord {
        SourceRecord::new(source_id, descriptor, self.source_type, self.dataset.as_str())
    }
}

/// A two-phase source converter
///
/// ```rust,ignore
/// let converter = EdxConverter::new("fall-2015", "forum.json");
/// let stats = ddb_io::run_conversion(&converter, &services).await?;
/// ```
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Files the converter reads; all must be readable before anything is written
    fn inputs(&self) -> Vec<&Path>;

    /// Create entities and their provenance
    async fn phase_one(&self, services: &Services, stats: &mut ConversionStats)
        -> ConvertResult<()>;

    /// Resolve relations through source ids recorded in phase one
    async fn phase_two(&self, services: &Services, stats: &mut ConversionStats)
        -> ConvertResult<()>;
}

/// Run both phases of `converter` against `services`.
///
/// Input files are checked up front; a missing file aborts the run before
/// the first write.
pub async fn run_conversion(
    converter: &dyn Converter,
    services: &Services,
) -> ConvertResult<ConversionStats> {
    for path in converter.inputs() {
        if let Err(e) = input::ensure_readable(path) {
            error!(converter = converter.name(), "{}", e);
            return Err(e);
        }
    }

    let started = Instant::now();
    let mut stats = ConversionStats::default();

    info!(converter = converter.name(), "Starting phase one");
    converter.phase_one(services, &mut stats).await?;
    info!(converter = converter.name(), %stats, "Phase one complete");

    info!(converter = converter.name(), "Starting phase two");
    converter.phase_two(services, &mut stats).await?;
    info!(
        converter = converter.name(),
        %stats,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Conversion complete"
    );

    Ok(stats)
}
