//! Contexts and contribution membership

use crate::db::context::{self, Context};
use crate::db::contribution::Contribution;
use crate::db::types::{create_or_get_type, TypeKind};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

#[derive(Clone)]
pub struct ContextService {
    db: Pool<Sqlite>,
}

impl ContextService {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    pub async fn create_typed_context(
        &self,
        context_type: &str,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<Context> {
        let mut tx = self.db.begin().await?;
        let type_id = create_or_get_type(&mut tx, TypeKind::Context, context_type).await?;
        let id = context::insert(&mut tx, type_id, start_time).await?;
        let created = context::find_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("context {}", id)))?;
        tx.commit().await?;

        Ok(created)
    }

    /// Idempotent: a contribution joins a context at most once
    pub async fn add_contribution_to_context(
        &self,
        contribution: &Contribution,
        context: &Context,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;
        context::link_contribution(&mut tx, contribution.id, context.id, contribution.timed.start_time)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn find_by_contribution(&self, contribution: &Contribution) -> Result<Vec<Context>> {
        let mut conn = self.db.acquire().await?;
        context::find_by_contribution(&mut conn, contribution.id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::init_memory_database;
    use crate::service::Services;

    #[tokio::test]
    async fn test_context_membership_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool);

        let c = services.contributions.create_typed("POST", None).await.unwrap();
        let ctx = services.contexts.create_typed_context("GOAL", None).await.unwrap();

        services.contexts.add_contribution_to_context(&c, &ctx).await.unwrap();
        services.contexts.add_contribution_to_context(&c, &ctx).await.unwrap();

        let found = services.contexts.find_by_contribution(&c).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].context_type, "GOAL");
    }
}
