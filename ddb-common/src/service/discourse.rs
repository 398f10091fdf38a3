//! Discourse create-or-get

use crate::db::discourse::{self, Discourse};
use crate::{Error, Id, Result};
use sqlx::{Pool, Sqlite};
use tracing::debug;

#[derive(Clone)]
pub struct DiscourseService {
    db: Pool<Sqlite>,
}

impl DiscourseService {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Discourse named `name` whose descriptor is also `name`
    pub async fn create_or_get(&self, name: &str) -> Result<Discourse> {
        self.create_or_get_with_descriptor(name, name).await
    }

    /// Return the discourse for (name, descriptor), creating it if needed
    pub async fn create_or_get_with_descriptor(
        &self,
        name: &str,
        descriptor: &str,
    ) -> Result<Discourse> {
        if name.trim().is_empty() {
            return Err(Error::empty("Discourse name"));
        }
        if descriptor.trim().is_empty() {
            return Err(Error::empty("Discourse descriptor"));
        }

        let mut tx = self.db.begin().await?;
        discourse::insert_or_ignore(&mut tx, name, descriptor).await?;
        let found = discourse::find_by_name_and_descriptor(&mut tx, name, descriptor)
            .await?
            .ok_or_else(|| Error::Internal(format!("Discourse {} vanished after insert", name)))?;
        tx.commit().await?;

        debug!(discourse_id = found.id, name, "Resolved discourse");
        Ok(found)
    }

    pub async fn find_one(&self, name: &str) -> Result<Option<Discourse>> {
        let mut conn = self.db.acquire().await?;
        discourse::find_by_name(&mut conn, name).await
    }

    pub async fn find_by_id(&self, id: Id) -> Result<Option<Discourse>> {
        if id <= 0 {
            return Err(Error::InvalidInput(format!("Invalid discourse id {}", id)));
        }
        let mut conn = self.db.acquire().await?;
        discourse::find_by_id(&mut conn, id).await
    }

    /// Discourse a part belongs to
    pub async fn find_by_discourse_part(&self, part_id: Id) -> Result<Option<Discourse>> {
        let mut conn = self.db.acquire().await?;
        discourse::find_by_discourse_part(&mut conn, part_id).await
    }

    pub async fn list(&self) -> Result<Vec<Discourse>> {
        let mut conn = self.db.acquire().await?;
        discourse::list(&mut conn).await
    }
}
