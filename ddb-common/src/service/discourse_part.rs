//! Discourse part create-or-get, membership and part relations

use crate::db::contribution::Contribution;
use crate::db::discourse::{self, Discourse};
use crate::db::discourse_part::{self, DiscoursePart};
use crate::db::relation::{self, DiscoursePartRelation};
use crate::db::types::{create_or_get_type, TypeKind};
use crate::{Error, Id, Result};
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::debug;

#[derive(Clone)]
pub struct DiscoursePartService {
    db: Pool<Sqlite>,
}

/// Name used when a part is created from a discourse and type alone
pub fn default_part_name(discourse: &Discourse, part_type: &str) -> String {
    format!("{}_{}", discourse.name, part_type)
}

impl DiscoursePartService {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Part of `part_type` named after the discourse, created if missing
    pub async fn create_or_get_typed(
        &self,
        discourse: &Discourse,
        part_type: impl AsRef<str>,
    ) -> Result<DiscoursePart> {
        let part_type = part_type.as_ref();
        let name = default_part_name(discourse, part_type);
        self.create_or_get_typed_named(discourse, &name, part_type).await
    }

    /// Part identified by (discourse, name, type), created and attached if missing
    pub async fn create_or_get_typed_named(
        &self,
        discourse: &Discourse,
        name: &str,
        part_type: impl AsRef<str>,
    ) -> Result<DiscoursePart> {
        let part_type = part_type.as_ref();
        if name.trim().is_empty() {
            return Err(Error::empty("Discourse part name"));
        }

        // Lookup and insert share one transaction
        let mut tx = self.db.begin().await?;
        let part = match discourse_part::find_in_discourse(&mut tx, discourse.id, name, part_type)
            .await?
        {
            Some(existing) => existing,
            None => {
                let id = insert_part(&mut tx, Some(name), part_type).await?;
                discourse::link_part(&mut tx, discourse.id, id).await?;
                debug!(part_id = id, name, part_type, "Created discourse part");
                fetch_part(&mut tx, id).await?
            }
        };
        tx.commit().await?;

        Ok(part)
    }

    /// Always creates a new part named after the discourse
    pub async fn create_typed(
        &self,
        discourse: &Discourse,
        part_type: impl AsRef<str>,
    ) -> Result<DiscoursePart> {
        let part_type = part_type.as_ref();
        let name = default_part_name(discourse, part_type);
        self.create_typed_named(discourse, &name, part_type).await
    }

    /// Always creates a new part, even if one with the same key exists
    pub async fn create_typed_named(
        &self,
        discourse: &Discourse,
        name: &str,
        part_type: impl AsRef<str>,
    ) -> Result<DiscoursePart> {
        let mut tx = self.db.begin().await?;
        let id = insert_part(&mut tx, Some(name), part_type.as_ref()).await?;
        discourse::link_part(&mut tx, discourse.id, id).await?;
        let part = fetch_part(&mut tx, id).await?;
        tx.commit().await?;

        Ok(part)
    }

    /// Attach a contribution to a part; the membership starts when the contribution does
    pub async fn add_contribution(
        &self,
        contribution: &Contribution,
        part: &DiscoursePart,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;
        discourse_part::link_contribution(
            &mut tx,
            contribution.id,
            part.id,
            contribution.timed.start_time,
        )
        .await?;
        tx.commit().await?;

        Ok(())
    }

    /// Relation (source, target, type), created if missing
    pub async fn create_relation(
        &self,
        source: &DiscoursePart,
        target: &DiscoursePart,
        relation_type: impl AsRef<str>,
    ) -> Result<DiscoursePartRelation> {
        let relation_type = relation_type.as_ref();

        let mut tx = self.db.begin().await?;
        let type_id =
            create_or_get_type(&mut tx, TypeKind::DiscoursePartRelation, relation_type).await?;
        relation::insert_or_ignore_part_relation(&mut tx, source.id, target.id, type_id).await?;
        let found = relation::find_part_relation(&mut tx, source.id, target.id, relation_type)
            .await?
            .ok_or_else(|| Error::Internal("Part relation vanished after insert".to_string()))?;
        tx.commit().await?;

        Ok(found)
    }

    /// Targets of `source`'s relations of the given type
    pub async fn find_children(
        &self,
        source: &DiscoursePart,
        relation_type: impl AsRef<str>,
    ) -> Result<Vec<DiscoursePart>> {
        let mut conn = self.db.acquire().await?;
        discourse_part::find_children(&mut conn, source.id, relation_type.as_ref()).await
    }

    pub async fn exists(
        &self,
        discourse: &Discourse,
        name: &str,
        part_type: impl AsRef<str>,
    ) -> Result<bool> {
        let mut conn = self.db.acquire().await?;
        Ok(
            discourse_part::find_in_discourse(&mut conn, discourse.id, name, part_type.as_ref())
                .await?
                .is_some(),
        )
    }

    pub async fn find_by_id(&self, id: Id) -> Result<Option<DiscoursePart>> {
        let mut conn = self.db.acquire().await?;
        discourse_part::find_by_id(&mut conn, id).await
    }

    pub async fn find_by_discourse(&self, discourse: &Discourse) -> Result<Vec<DiscoursePart>> {
        let mut conn = self.db.acquire().await?;
        discourse_part::find_by_discourse(&mut conn, discourse.id).await
    }

    pub async fn find_by_contribution(
        &self,
        contribution: &Contribution,
    ) -> Result<Vec<DiscoursePart>> {
        let mut conn = self.db.acquire().await?;
        discourse_part::find_by_contribution(&mut conn, contribution.id).await
    }

    pub async fn find_all_by_type(&self, part_type: impl AsRef<str>) -> Result<Vec<DiscoursePart>> {
        let mut conn = self.db.acquire().await?;
        discourse_part::find_all_by_type(&mut conn, part_type.as_ref()).await
    }

    pub async fn find_all_by_name(&self, name: &str) -> Result<Vec<DiscoursePart>> {
        let mut conn = self.db.acquire().await?;
        discourse_part::find_all_by_name(&mut conn, name).await
    }

    pub async fn find_one_by_data_source(
        &self,
        source_id: &str,
        descriptor: &str,
        dataset: &str,
    ) -> Result<Option<DiscoursePart>> {
        let mut conn = self.db.acquire().await?;
        discourse_part::find_by_data_source(&mut conn, source_id, descriptor, dataset).await
    }

    /// Parts lacking an annotation of the given type
    pub async fn find_without_annotation(&self, annotation_type: &str) -> Result<Vec<DiscoursePart>> {
        let mut conn = self.db.acquire().await?;
        discourse_part::find_without_annotation(&mut conn, annotation_type).await
    }

    /// Persist name and validity window; fails with a version conflict when stale
    pub async fn update(&self, part: &mut DiscoursePart) -> Result<()> {
        let mut tx = self.db.begin().await?;
        discourse_part::update(&mut tx, part).await?;
        tx.commit().await?;

        part.timed.version += 1;
        Ok(())
    }

    /// Close a part's membership in a discourse at `end_time`
    pub async fn end_membership(
        &self,
        discourse: &Discourse,
        part: &DiscoursePart,
        end_time: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool> {
        let mut tx = self.db.begin().await?;
        let ended =
            discourse::end_part_membership(&mut tx, discourse.id, part.id, end_time).await?;
        tx.commit().await?;
        Ok(ended)
    }
}

async fn insert_part(conn: &mut SqliteConnection, name: Option<&str>, part_type: &str) -> Result<Id> {
    let type_id = create_or_get_type(conn, TypeKind::DiscoursePart, part_type).await?;
    discourse_part::insert(conn, name, type_id, None).await
}

async fn fetch_part(conn: &mut SqliteConnection, id: Id) -> Result<DiscoursePart> {
    discourse_part::find_by_id(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("discourse part {}", id)))
}
