//! Contributions and the typed relations between them

use crate::db::content::Content;
use crate::db::contribution::{self, Contribution};
use crate::db::relation::{self, DiscourseRelation};
use crate::db::types::{create_or_get_type, TypeKind};
use crate::db::Page;
use crate::{DiscourseRelationType, Error, Id, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::debug;

#[derive(Clone)]
pub struct ContributionService {
    db: Pool<Sqlite>,
}

impl ContributionService {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// New contribution of the given type starting at `start_time`
    pub async fn create_typed(
        &self,
        contribution_type: impl AsRef<str>,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<Contribution> {
        let mut tx = self.db.begin().await?;
        let type_id =
            create_or_get_type(&mut tx, TypeKind::Contribution, contribution_type.as_ref()).await?;
        let id = contribution::insert(&mut tx, type_id, start_time).await?;
        let created = contribution::find_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("contribution {}", id)))?;
        tx.commit().await?;

        Ok(created)
    }

    pub async fn find_by_id(&self, id: Id) -> Result<Option<Contribution>> {
        let mut conn = self.db.acquire().await?;
        contribution::find_by_id(&mut conn, id).await
    }

    /// Contribution previously imported from the given source record
    pub async fn find_one_by_data_source(
        &self,
        source_id: &str,
        descriptor: &str,
        dataset: &str,
    ) -> Result<Option<Contribution>> {
        let mut conn = self.db.acquire().await?;
        contribution::find_by_data_source(&mut conn, source_id, descriptor, dataset).await
    }

    /// Relation `source -> target` of the given type, created if missing
    pub async fn create_discourse_relation(
        &self,
        source: &Contribution,
        target: &Contribution,
        relation_type: impl AsRef<str>,
    ) -> Result<DiscourseRelation> {
        let relation_type = relation_type.as_ref();

        let mut tx = self.db.begin().await?;
        let type_id =
            create_or_get_type(&mut tx, TypeKind::DiscourseRelation, relation_type).await?;
        relation::insert_or_ignore_discourse_relation(&mut tx, source.id, target.id, type_id)
            .await?;
        let found = relation::find_discourse_relation(&mut tx, source.id, target.id, relation_type)
            .await?
            .ok_or_else(|| Error::Internal("Discourse relation vanished after insert".to_string()))?;
        tx.commit().await?;

        debug!(
            source = source.id,
            target = target.id,
            relation_type,
            "Resolved discourse relation"
        );
        Ok(found)
    }

    pub async fn find_relations_from(
        &self,
        source: &Contribution,
        relation_type: Option<&str>,
    ) -> Result<Vec<DiscourseRelation>> {
        let mut conn = self.db.acquire().await?;
        relation::find_discourse_relations_from(&mut conn, source.id, relation_type).await
    }

    pub async fn find_relations_to(
        &self,
        target: &Contribution,
        relation_type: Option<&str>,
    ) -> Result<Vec<DiscourseRelation>> {
        let mut conn = self.db.acquire().await?;
        relation::find_discourse_relations_to(&mut conn, target.id, relation_type).await
    }

    /// Immediate parent: source of the REPLY relation pointing at `contribution`
    pub async fn find_parent(&self, contribution: &Contribution) -> Result<Option<Contribution>> {
        self.find_relation_source(contribution, DiscourseRelationType::Reply)
            .await
    }

    /// Thread starter: source of the DESCENDANT relation pointing at `contribution`
    pub async fn find_thread_starter(
        &self,
        contribution: &Contribution,
    ) -> Result<Option<Contribution>> {
        self.find_relation_source(contribution, DiscourseRelationType::Descendant)
            .await
    }

    async fn find_relation_source(
        &self,
        contribution: &Contribution,
        relation_type: DiscourseRelationType,
    ) -> Result<Option<Contribution>> {
        let mut conn = self.db.acquire().await?;
        let incoming = relation::find_discourse_relations_to(
            &mut conn,
            contribution.id,
            Some(relation_type.as_str()),
        )
        .await?;

        match incoming.first() {
            Some(rel) => contribution::find_by_id(&mut conn, rel.source_id).await,
            None => Ok(None),
        }
    }

    /// Point the contribution at `content` without touching the revision chain
    pub async fn set_current_revision(
        &self,
        contribution: &mut Contribution,
        content: &Content,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;
        contribution::set_current_revision(&mut tx, contribution, content.id).await?;
        tx.commit().await?;

        contribution.current_revision = Some(content.id);
        contribution.first_revision.get_or_insert(content.id);
        contribution.timed.version += 1;
        Ok(())
    }

    /// Versioned upvote update
    pub async fn set_upvotes(&self, contribution: &mut Contribution, upvotes: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;
        contribution::set_upvotes(&mut tx, contribution, upvotes).await?;
        tx.commit().await?;

        contribution.upvotes = upvotes;
        contribution.timed.version += 1;
        Ok(())
    }

    pub async fn count_by_discourse_part(&self, part_id: Id) -> Result<i64> {
        let mut conn = self.db.acquire().await?;
        contribution::count_by_discourse_part(&mut conn, part_id).await
    }

    /// One page of the contributions attached to a part
    pub async fn list_by_discourse_part(
        &self,
        part_id: Id,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Contribution>> {
        let mut conn = self.db.acquire().await?;
        let total = contribution::count_by_discourse_part(&mut conn, part_id).await?;
        let items = contribution::find_by_discourse_part(&mut conn, part_id, limit, offset).await?;
        Ok(Page { items, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::service::Services;
    use crate::ContributionType;

    #[tokio::test]
    async fn test_relation_is_create_or_get() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool.clone());
        let contributions = &services.contributions;

        let parent = contributions.create_typed(ContributionType::Post, None).await.unwrap();
        let child = contributions.create_typed(ContributionType::Post, None).await.unwrap();

        let a = contributions
            .create_discourse_relation(&parent, &child, DiscourseRelationType::Reply)
            .await
            .unwrap();
        let b = contributions
            .create_discourse_relation(&parent, &child, DiscourseRelationType::Reply)
            .await
            .unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(a.relation_type, "REPLY");

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(relation::count_discourse_relations(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_parent_and_thread_starter_lookup() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool);
        let contributions = &services.contributions;

        let starter = contributions.create_typed(ContributionType::ThreadStarter, None).await.unwrap();
        let reply = contributions.create_typed(ContributionType::Post, None).await.unwrap();
        let nested = contributions.create_typed(ContributionType::Post, None).await.unwrap();

        contributions
            .create_discourse_relation(&starter, &reply, DiscourseRelationType::Reply)
            .await
            .unwrap();
        contributions
            .create_discourse_relation(&reply, &nested, DiscourseRelationType::Reply)
            .await
            .unwrap();
        contributions
            .create_discourse_relation(&starter, &nested, DiscourseRelationType::Descendant)
            .await
            .unwrap();

        assert_eq!(contributions.find_parent(&nested).await.unwrap().unwrap().id, reply.id);
        assert_eq!(
            contributions.find_thread_starter(&nested).await.unwrap().unwrap().id,
            starter.id
        );
        assert!(contributions.find_parent(&starter).await.unwrap().is_none());
        assert_eq!(
            contributions.find_relations_from(&starter, None).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_set_upvotes_versioned() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool);

        let mut c = services.contributions.create_typed("POST", None).await.unwrap();
        let mut stale = c.clone();

        services.contributions.set_upvotes(&mut c, 7).await.unwrap();
        assert_eq!(c.upvotes, 7);
        assert_eq!(c.timed.version, 1);

        let stored = services.contributions.find_by_id(c.id).await.unwrap().unwrap();
        assert_eq!(stored.upvotes, 7);
        assert_eq!(stored.timed.version, 1);

        let result = services.contributions.set_upvotes(&mut stale, 9).await;
        assert!(matches!(result, Err(Error::VersionConflict { expected: 0, .. })));
    }
}
