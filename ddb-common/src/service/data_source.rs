//! Provenance bookkeeping
//!
//! Converters record, for every entity they create, the external record it
//! came from. The same triple is then used to skip records on re-runs and to
//! re-locate entities in phase two.

use crate::db::data_source::{self, DataSourceInstance};
use crate::db::Sourced;
use crate::{DataSourceType, Error, Result};
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::trace;

/// One external record: (source id, descriptor, dataset) plus its platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub source_id: String,
    pub descriptor: String,
    pub source_type: DataSourceType,
    pub dataset: String,
}

impl SourceRecord {
    pub fn new(
        source_id: impl Into<String>,
        descriptor: impl Into<String>,
        source_type: DataSourceType,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            descriptor: descriptor.into(),
            source_type,
            dataset: dataset.into(),
        }
    }
}

#[derive(Clone)]
pub struct DataSourceService {
    db: Pool<Sqlite>,
}

impl DataSourceService {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    pub async fn find_data_source(
        &self,
        source_id: &str,
        descriptor: &str,
        dataset: &str,
    ) -> Result<Option<DataSourceInstance>> {
        let mut conn = self.db.acquire().await?;
        data_source::find_instance(&mut conn, source_id, descriptor, dataset).await
    }

    /// Record that `entity` was derived from `record`.
    ///
    /// The entity's aggregate is created on first use. A triple that is
    /// already recorded is returned unchanged.
    pub async fn add_source<T: Sourced>(
        &self,
        entity: &T,
        record: &SourceRecord,
    ) -> Result<DataSourceInstance> {
        if record.source_id.is_empty() || record.descriptor.is_empty() || record.dataset.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Incomplete data source for {} {}",
                T::TABLE,
                entity.entity_id()
            )));
        }

        let mut tx = self.db.begin().await?;
        let aggregate = ensure_aggregate(&mut tx, T::TABLE, entity.entity_id()).await?;
        data_source::insert_or_ignore_instance(
            &mut tx,
            &record.source_id,
            &record.descriptor,
            record.source_type.as_str(),
            &record.dataset,
            aggregate,
        )
        .await?;
        let instance =
            data_source::find_instance(&mut tx, &record.source_id, &record.descriptor, &record.dataset)
                .await?
                .ok_or_else(|| Error::Internal("Data source vanished after insert".to_string()))?;
        tx.commit().await?;

        trace!(
            table = T::TABLE,
            id = entity.entity_id(),
            source_id = %record.source_id,
            descriptor = %record.descriptor,
            "Recorded provenance"
        );
        Ok(instance)
    }

    /// All provenance records of an entity
    pub async fn find_sources<T: Sourced>(&self, entity: &T) -> Result<Vec<DataSourceInstance>> {
        let mut conn = self.db.acquire().await?;
        match data_source::aggregate_of(&mut conn, T::TABLE, entity.entity_id()).await? {
            Some(aggregate) => data_source::find_instances_by_aggregate(&mut conn, aggregate).await,
            None => Ok(Vec::new()),
        }
    }

    /// Whether any provenance record of `entity` carries `source_id`
    pub async fn has_source_id<T: Sourced>(&self, entity: &T, source_id: &str) -> Result<bool> {
        Ok(self
            .find_sources(entity)
            .await?
            .iter()
            .any(|s| s.entity_source_id == source_id))
    }
}

async fn ensure_aggregate(conn: &mut SqliteConnection, table: &str, id: i64) -> Result<i64> {
    if let Some(existing) = data_source::aggregate_of(conn, table, id).await? {
        return Ok(existing);
    }

    let created = data_source::insert_aggregate(conn).await?;
    if data_source::attach_aggregate(conn, table, id, created).await? {
        return Ok(created);
    }

    // Either the row does not exist or someone attached an aggregate first
    data_source::aggregate_of(conn, table, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", table, id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::service::Services;

    #[tokio::test]
    async fn test_add_source_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool.clone());
        let c = services.contributions.create_typed("POST", None).await.unwrap();
        let record = SourceRecord::new("p1", "contribution#post.id", DataSourceType::Piazza, "ds");

        let a = services.data_sources.add_source(&c, &record).await.unwrap();
        let b = services.data_sources.add_source(&c, &record).await.unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(services.data_sources.find_sources(&c).await.unwrap().len(), 1);

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(data_source::count_instances(&mut conn, "ds").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lookup_by_source_triple() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool);
        let c = services.contributions.create_typed("POST", None).await.unwrap();

        services
            .data_sources
            .add_source(&c, &SourceRecord::new("42", "contribution#post.id", DataSourceType::Edx, "fall"))
            .await
            .unwrap();
        services
            .data_sources
            .add_source(&c, &SourceRecord::new("42", "content#post.id", DataSourceType::Edx, "fall"))
            .await
            .unwrap();

        let found = services
            .contributions
            .find_one_by_data_source("42", "contribution#post.id", "fall")
            .await
            .unwrap();
        assert_eq!(found.map(|f| f.id), Some(c.id));

        // Dataset is part of the key
        assert!(services
            .contributions
            .find_one_by_data_source("42", "contribution#post.id", "spring")
            .await
            .unwrap()
            .is_none());

        assert!(services.data_sources.has_source_id(&c, "42").await.unwrap());
        assert_eq!(services.data_sources.find_sources(&c).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_entity_without_sources() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool);
        let c = services.contributions.create_typed("POST", None).await.unwrap();

        assert!(services.data_sources.find_sources(&c).await.unwrap().is_empty());
        assert!(!services.data_sources.has_source_id(&c, "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_incomplete_record_rejected() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool);
        let c = services.contributions.create_typed("POST", None).await.unwrap();

        let record = SourceRecord::new("", "contribution#post.id", DataSourceType::Edx, "ds");
        assert!(matches!(
            services.data_sources.add_source(&c, &record).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
