//! Content revisions of contributions

use crate::db::content::{self, Content};
use crate::db::contribution::{self, Contribution};
use crate::db::user::User;
use crate::{Error, Id, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

#[derive(Clone)]
pub struct ContentService {
    db: Pool<Sqlite>,
}

impl ContentService {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    pub async fn create_content(
        &self,
        author: Option<&User>,
        text: Option<&str>,
        title: Option<&str>,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<Content> {
        let mut tx = self.db.begin().await?;
        let id = content::insert(&mut tx, author.map(|u| u.id), text, title, start_time).await?;
        let created = content::find_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("content {}", id)))?;
        tx.commit().await?;

        Ok(created)
    }

    /// Append `content` to the contribution's revision chain and make it current.
    ///
    /// The first revision ever added also becomes the contribution's first revision.
    pub async fn add_revision(
        &self,
        contribution: &mut Contribution,
        content: &Content,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;
        if let Some(previous) = contribution.current_revision {
            if previous != content.id {
                content::link_revisions(&mut tx, previous, content.id).await?;
            }
        }
        contribution::set_current_revision(&mut tx, contribution, content.id).await?;
        tx.commit().await?;

        contribution.current_revision = Some(content.id);
        contribution.first_revision.get_or_insert(content.id);
        contribution.timed.version += 1;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Id) -> Result<Option<Content>> {
        let mut conn = self.db.acquire().await?;
        content::find_by_id(&mut conn, id).await
    }

    pub async fn find_one_by_data_source(
        &self,
        source_id: &str,
        descriptor: &str,
        dataset: &str,
    ) -> Result<Option<Content>> {
        let mut conn = self.db.acquire().await?;
        content::find_by_data_source(&mut conn, source_id, descriptor, dataset).await
    }

    /// All revisions of a contribution, oldest first
    pub async fn revision_history(&self, contribution: &Contribution) -> Result<Vec<Content>> {
        match contribution.current_revision {
            Some(current) => {
                let mut conn = self.db.acquire().await?;
                content::revision_history(&mut conn, current).await
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::db::init_memory_database;
    use crate::service::Services;

    #[tokio::test]
    async fn test_revision_chain() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool);

        let mut c = services.contributions.create_typed("POST", None).await.unwrap();
        let v1 = services.contents.create_content(None, Some("first"), None, None).await.unwrap();
        let v2 = services.contents.create_content(None, Some("second"), None, None).await.unwrap();

        services.contents.add_revision(&mut c, &v1).await.unwrap();
        services.contents.add_revision(&mut c, &v2).await.unwrap();

        assert_eq!(c.first_revision, Some(v1.id));
        assert_eq!(c.current_revision, Some(v2.id));

        let stored = services.contributions.find_by_id(c.id).await.unwrap().unwrap();
        assert_eq!(stored.first_revision, Some(v1.id));
        assert_eq!(stored.current_revision, Some(v2.id));
        assert_eq!(stored.timed.version, 2);

        let history = services.contents.revision_history(&stored).await.unwrap();
        let texts: Vec<_> = history.iter().filter_map(|c| c.text.as_deref()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(history[1].previous_revision, Some(v1.id));
        assert_eq!(history[0].next_revision, Some(v2.id));
    }
}
