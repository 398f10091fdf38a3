//! Annotation subsystem
//!
//! Any [`Annotatable`] row can carry typed annotations, each with typed
//! features. The entity's aggregate is created lazily on the first
//! [`AnnotationService::add_annotation`] and reused afterwards.

use crate::db::annotation::{self, AnnotationInstance, Feature};
use crate::db::types::{create_or_get_type, TypeKind};
use crate::db::Annotatable;
use crate::{Error, Id, Result};
use sqlx::{Pool, Sqlite, SqliteConnection};

#[derive(Clone)]
pub struct AnnotationService {
    db: Pool<Sqlite>,
}

impl AnnotationService {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Annotations of an entity; empty when it has no aggregate yet
    pub async fn find_annotations<T: Annotatable>(
        &self,
        entity: &T,
    ) -> Result<Vec<AnnotationInstance>> {
        let mut conn = self.db.acquire().await?;
        match annotation::aggregate_of(&mut conn, T::TABLE, entity.entity_id()).await? {
            Some(aggregate) => annotation::find_instances_by_aggregate(&mut conn, aggregate).await,
            None => Ok(Vec::new()),
        }
    }

    /// Unattached annotation of the given type
    pub async fn create_typed_annotation(&self, annotation_type: &str) -> Result<AnnotationInstance> {
        let mut tx = self.db.begin().await?;
        let type_id = create_or_get_type(&mut tx, TypeKind::Annotation, annotation_type).await?;
        let id = annotation::insert_instance(&mut tx, Some(type_id)).await?;
        let created = fetch_instance(&mut tx, id).await?;
        tx.commit().await?;

        Ok(created)
    }

    /// Untyped feature carrying `value`
    pub async fn create_feature(&self, value: &str) -> Result<Feature> {
        let mut tx = self.db.begin().await?;
        let id = annotation::insert_feature(&mut tx, None, Some(value)).await?;
        let created = fetch_feature(&mut tx, id).await?;
        tx.commit().await?;

        Ok(created)
    }

    pub async fn create_typed_feature(&self, value: &str, feature_type: &str) -> Result<Feature> {
        let mut tx = self.db.begin().await?;
        let type_id = create_or_get_type(&mut tx, TypeKind::Feature, feature_type).await?;
        let id = annotation::insert_feature(&mut tx, Some(type_id), Some(value)).await?;
        let created = fetch_feature(&mut tx, id).await?;
        tx.commit().await?;

        Ok(created)
    }

    /// Attach an annotation to an entity, creating the entity's aggregate on first use.
    ///
    /// Returns the aggregate id.
    pub async fn add_annotation<T: Annotatable>(
        &self,
        entity: &T,
        annotation: &AnnotationInstance,
    ) -> Result<Id> {
        let mut tx = self.db.begin().await?;
        let aggregate = ensure_aggregate(&mut tx, T::TABLE, entity.entity_id()).await?;
        annotation::set_instance_aggregate(&mut tx, annotation.id, aggregate).await?;
        tx.commit().await?;

        Ok(aggregate)
    }

    pub async fn add_feature(&self, annotation: &AnnotationInstance, feature: &Feature) -> Result<()> {
        let mut tx = self.db.begin().await?;
        annotation::set_feature_annotation(&mut tx, feature.id, annotation.id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Record the text span an annotation covers
    pub async fn set_span(
        &self,
        annotation: &AnnotationInstance,
        begin_offset: i64,
        end_offset: i64,
        covered_text: Option<&str>,
    ) -> Result<()> {
        if end_offset < begin_offset {
            return Err(Error::InvalidInput(format!(
                "Annotation span {}..{} is reversed",
                begin_offset, end_offset
            )));
        }

        let mut tx = self.db.begin().await?;
        annotation::set_instance_span(&mut tx, annotation.id, begin_offset, end_offset, covered_text)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Typed annotation with typed features, attached to `entity` in one transaction
    pub async fn annotate<T: Annotatable>(
        &self,
        entity: &T,
        annotation_type: &str,
        features: &[(&str, &str)],
    ) -> Result<AnnotationInstance> {
        let mut tx = self.db.begin().await?;
        let aggregate = ensure_aggregate(&mut tx, T::TABLE, entity.entity_id()).await?;
        let type_id = create_or_get_type(&mut tx, TypeKind::Annotation, annotation_type).await?;
        let instance_id = annotation::insert_instance(&mut tx, Some(type_id)).await?;
        annotation::set_instance_aggregate(&mut tx, instance_id, aggregate).await?;

        for &(feature_type, value) in features {
            let feature_type_id = create_or_get_type(&mut tx, TypeKind::Feature, feature_type).await?;
            let feature_id =
                annotation::insert_feature(&mut tx, Some(feature_type_id), Some(value)).await?;
            annotation::set_feature_annotation(&mut tx, feature_id, instance_id).await?;
        }

        let created = fetch_instance(&mut tx, instance_id).await?;
        tx.commit().await?;
        Ok(created)
    }

    pub async fn find_features(&self, annotation: &AnnotationInstance) -> Result<Vec<Feature>> {
        let mut conn = self.db.acquire().await?;
        annotation::find_features_by_instance(&mut conn, annotation.id).await
    }

    /// Delete an annotation; its features go first
    pub async fn delete_annotation(&self, annotation: &AnnotationInstance) -> Result<()> {
        let mut tx = self.db.begin().await?;
        annotation::delete_instance(&mut tx, annotation.id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_annotations(&self, annotations: &[AnnotationInstance]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for a in annotations {
            annotation::delete_instance(&mut tx, a.id).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Case-insensitive check for an annotation type on an entity
    pub async fn has_annotation_type<T: Annotatable>(
        &self,
        entity: &T,
        annotation_type: &str,
    ) -> Result<bool> {
        Ok(self.find_annotations(entity).await?.iter().any(|a| {
            a.annotation_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(annotation_type))
        }))
    }

    pub async fn find_annotations_by_feature_type_and_value(
        &self,
        feature_type: &str,
        value: &str,
    ) -> Result<Vec<AnnotationInstance>> {
        let mut conn = self.db.acquire().await?;
        annotation::find_instances_by_feature(&mut conn, feature_type, value).await
    }
}

async fn ensure_aggregate(conn: &mut SqliteConnection, table: &str, id: Id) -> Result<Id> {
    if let Some(existing) = annotation::aggregate_of(conn, table, id).await? {
        return Ok(existing);
    }

    let created = annotation::insert_aggregate(conn).await?;
    if annotation::attach_aggregate(conn, table, id, created).await? {
        return Ok(created);
    }

    annotation::aggregate_of(conn, table, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", table, id)))
}

async fn fetch_instance(conn: &mut SqliteConnection, id: Id) -> Result<AnnotationInstance> {
    annotation::find_instance(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("annotation {}", id)))
}

async fn fetch_feature(conn: &mut SqliteConnection, id: Id) -> Result<Feature> {
    annotation::find_feature(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("feature {}", id)))
}
