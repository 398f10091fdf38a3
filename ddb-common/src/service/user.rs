//! Users, unique per (discourse, username)

use crate::db::discourse::Discourse;
use crate::db::user::{self, User};
use crate::{Error, Id, Result};
use sqlx::{Pool, Sqlite};

#[derive(Clone)]
pub struct UserService {
    db: Pool<Sqlite>,
}

impl UserService {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    pub async fn create_or_get_user(&self, discourse: &Discourse, username: &str) -> Result<User> {
        if username.is_empty() {
            return Err(Error::empty("Username"));
        }

        let mut tx = self.db.begin().await?;
        user::insert_or_ignore(&mut tx, discourse.id, username).await?;
        let found = user::find_by_username(&mut tx, discourse.id, username)
            .await?
            .ok_or_else(|| Error::Internal(format!("User {} vanished after insert", username)))?;
        tx.commit().await?;

        Ok(found)
    }

    /// Persist profile fields; fails with a version conflict when `user` is stale
    pub async fn update(&self, user: &mut User) -> Result<()> {
        let mut tx = self.db.begin().await?;
        user::update(&mut tx, user).await?;
        tx.commit().await?;

        user.timed.version += 1;
        Ok(())
    }

    /// Fill in real name and email where the source provides them.
    /// Existing values are kept when the new ones are empty.
    pub async fn update_details(
        &self,
        user: &mut User,
        realname: Option<&str>,
        email: Option<&str>,
    ) -> Result<()> {
        let realname = realname
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| user.realname.clone());
        let email = email
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| user.email.clone());
        if realname == user.realname && email == user.email {
            return Ok(());
        }

        user.realname = realname;
        user.email = email;
        self.update(user).await
    }

    pub async fn find_by_id(&self, id: Id) -> Result<Option<User>> {
        let mut conn = self.db.acquire().await?;
        user::find_by_id(&mut conn, id).await
    }

    pub async fn find_by_username(
        &self,
        discourse: &Discourse,
        username: &str,
    ) -> Result<Option<User>> {
        let mut conn = self.db.acquire().await?;
        user::find_by_username(&mut conn, discourse.id, username).await
    }

    pub async fn find_one_by_data_source(
        &self,
        source_id: &str,
        descriptor: &str,
        dataset: &str,
    ) -> Result<Option<User>> {
        let mut conn = self.db.acquire().await?;
        user::find_by_data_source(&mut conn, source_id, descriptor, dataset).await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::init_memory_database;
    use crate::service::Services;

    #[tokio::test]
    async fn test_user_unique_per_discourse() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool);
        let a = services.discourses.create_or_get("a").await.unwrap();
        let b = services.discourses.create_or_get("b").await.unwrap();

        let u1 = services.users.create_or_get_user(&a, "alice").await.unwrap();
        let u2 = services.users.create_or_get_user(&a, "alice").await.unwrap();
        let u3 = services.users.create_or_get_user(&b, "alice").await.unwrap();

        assert_eq!(u1.id, u2.id);
        assert_ne!(u1.id, u3.id);
    }

    #[tokio::test]
    async fn test_update_details_keeps_existing_values() {
        let pool = init_memory_database().await.unwrap();
        let services = Services::new(pool);
        let d = services.discourses.create_or_get("d").await.unwrap();
        let mut user = services.users.create_or_get_user(&d, "bob").await.unwrap();

        services
            .users
            .update_details(&mut user, Some("Bob Builder"), Some("bob@example.org"))
            .await
            .unwrap();
        assert_eq!(user.timed.version, 1);

        // Empty values leave the profile alone and do not bump the version
        services.users.update_details(&mut user, Some(""), None).await.unwrap();
        assert_eq!(user.timed.version, 1);

        let stored = services.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.realname.as_deref(), Some("Bob Builder"));
        assert_eq!(stored.email.as_deref(), Some("bob@example.org"));
    }
}
