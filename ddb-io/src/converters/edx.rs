//! edX forum dumps
//!
//! Input is the MongoDB export of a course forum: one `Post` object per
//! line (or concatenated), either a `CommentThread` or a `Comment`. The
//! course id is used as discourse name and descriptor, since edX course ids
//! are already unique.

use crate::error::ConvertResult;
use crate::input;
use crate::mapping::{self, descriptor, NewContribution, Revision};
use crate::{ConversionStats, Converter, ImportContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ddb_common::{
    time, ContributionType, DataSourceType, DiscoursePartType, DiscourseRelationType, Services,
};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

const AUTHOR_DESCRIPTOR: &str = "user#post.author_id";

/// MongoDB object id, exported either as `{"$oid": "..."}` or a plain string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    Wrapped {
        #[serde(rename = "$oid")]
        oid: String,
    },
    Plain(String),
}

impl ObjectId {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectId::Wrapped { oid } => oid,
            ObjectId::Plain(s) => s,
        }
    }
}

/// MongoDB date, `{"$date": ...}` holding an ISO string or epoch millis
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MongoDate {
    Wrapped {
        #[serde(rename = "$date")]
        date: Value,
    },
    Plain(Value),
}

impl MongoDate {
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let value = match self {
            MongoDate::Wrapped { date } => date,
            MongoDate::Plain(value) => value,
        };
        match value {
            Value::String(s) => time::parse_timestamp(s),
            Value::Number(n) => n.as_i64().and_then(time::from_millis),
            // {"$numberLong": "..."}
            Value::Object(map) => map
                .get("$numberLong")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .and_then(time::from_millis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Votes {
    #[serde(default)]
    pub up_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "_type")]
    pub post_type: String,
    pub course_id: String,
    pub comment_thread_id: Option<ObjectId>,
    pub parent_id: Option<ObjectId>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub author_id: Option<String>,
    pub author_username: Option<String>,
    pub created_at: Option<MongoDate>,
    pub updated_at: Option<MongoDate>,
    pub votes: Option<Votes>,
    #[serde(default)]
    pub anonymous: bool,
}

impl Post {
    fn contribution_type(&self) -> Option<ContributionType> {
        match self.post_type.as_str() {
            "CommentThread" => Some(ContributionType::ThreadStarter),
            "Comment" => Some(ContributionType::Post),
            _ => None,
        }
    }

    /// Source id of the parent comment. Top-level comments have none; they
    /// are only linked to the thread as descendants.
    fn replied_to(&self) -> Option<&str> {
        self.parent_id
            .as_ref()
            .map(ObjectId::as_str)
            .filter(|id| *id != self.id.as_str())
    }
}

pub struct EdxConverter {
    ctx: ImportContext,
    input: PathBuf,
}

impl EdxConverter {
    pub fn new(dataset: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        Self {
            ctx: ImportContext::new(dataset, DataSourceType::Edx),
            input: input.into(),
        }
    }

    async fn map_post(
        &self,
        services: &Services,
        post: &Post,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        trace!(post_id = post.id.as_str(), "Mapping post");

        let Some(contribution_type) = post.contribution_type() else {
            warn!(post_id = post.id.as_str(), post_type = %post.post_type, "Unknown post type, skipping");
            stats.records_skipped += 1;
            return Ok(());
        };

        let discourse = services
            .discourses
            .create_or_get_with_descriptor(&post.course_id, &post.course_id)
            .await?;
        let forum = services
            .discourse_parts
            .create_or_get_typed_named(&discourse, &post.course_id, DiscoursePartType::Forum)
            .await?;

        let author = match mapping::non_empty(post.author_username.as_deref()) {
            Some(username) if !post.anonymous => {
                let source = post.author_id.as_deref().map(|id| (id, AUTHOR_DESCRIPTOR));
                Some(
                    mapping::import_user(services, &self.ctx, &discourse, username, source, stats)
                        .await?,
                )
            }
            _ => None,
        };

        let created = post.created_at.as_ref().and_then(MongoDate::to_utc);
        let imported = mapping::import_contribution(
            services,
            &self.ctx,
            NewContribution {
                source_id: post.id.as_str(),
                descriptor: descriptor::POST_CONTRIBUTION,
                contribution_type,
                start_time: created,
                revisions: vec![Revision {
                    source_id: post.id.as_str().to_string(),
                    descriptor: descriptor::POST_CONTENT,
                    author: author.as_ref(),
                    text: post.body.as_deref(),
                    title: post.title.as_deref(),
                    start_time: created,
                }],
                part: Some(&forum),
            },
            stats,
        )
        .await?;

        if let Some(mut contribution) = imported {
            let upvotes = post.votes.as_ref().map_or(0, |v| v.up_count);
            if upvotes > 0 {
                services.contributions.set_upvotes(&mut contribution, upvotes).await?;
            }
        }
        Ok(())
    }

    async fn map_relations(
        &self,
        services: &Services,
        post: &Post,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let Some(contribution) = services
            .contributions
            .find_one_by_data_source(post.id.as_str(), descriptor::POST_CONTRIBUTION, &self.ctx.dataset)
            .await?
        else {
            debug!(post_id = post.id.as_str(), "Post was not imported, skipping relations");
            stats.records_skipped += 1;
            return Ok(());
        };

        if let Some(thread_id) = post.comment_thread_id.as_ref().map(ObjectId::as_str) {
            if thread_id != post.id.as_str() {
                mapping::link_contributions(
                    services,
                    &self.ctx,
                    (thread_id, descriptor::POST_CONTRIBUTION),
                    &contribution,
                    DiscourseRelationType::Descendant,
                    stats,
                )
                .await?;
            }
        }

        if let Some(parent_id) = post.replied_to() {
            mapping::link_contributions(
                services,
                &self.ctx,
                (parent_id, descriptor::POST_CONTRIBUTION),
                &contribution,
                DiscourseRelationType::Reply,
                stats,
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Converter for EdxConverter {
    fn name(&self) -> &'static str {
        "edx"
    }

    fn inputs(&self) -> Vec<&Path> {
        vec![self.input.as_path()]
    }

    async fn phase_one(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let posts: Vec<Post> = input::read_json_records(&self.input)?;
        for post in &posts {
            stats.records_read += 1;
            self.map_post(services, post, stats).await?;
        }
        Ok(())
    }

    async fn phase_two(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let posts: Vec<Post> = input::read_json_records(&self.input)?;
        for post in &posts {
            stats.records_read += 1;
            self.map_relations(services, post, stats).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_forms() {
        let wrapped: ObjectId = serde_json::from_str(r#"{"$oid":"abc"}"#).unwrap();
        let plain: ObjectId = serde_json::from_str(r#""abc""#).unwrap();
        assert_eq!(wrapped.as_str(), "abc");
        assert_eq!(plain.as_str(), "abc");
    }

    #[test]
    fn test_mongo_date_forms() {
        let iso: MongoDate = serde_json::from_str(r#"{"$date":"2014-02-03T10:00:00Z"}"#).unwrap();
        let millis: MongoDate = serde_json::from_str(r#"{"$date":1391421600000}"#).unwrap();
        let long: MongoDate =
            serde_json::from_str(r#"{"$date":{"$numberLong":"1391421600000"}}"#).unwrap();
        assert_eq!(iso.to_utc(), millis.to_utc());
        assert_eq!(long.to_utc(), millis.to_utc());
    }

    #[test]
    fn test_only_parent_id_is_replied_to() {
        let top_level: Post = serde_json::from_str(
            r#"{"_id":{"$oid":"c1"},"_type":"Comment","course_id":"X",
                "comment_thread_id":{"$oid":"t1"}}"#,
        )
        .unwrap();
        assert_eq!(top_level.replied_to(), None);

        let nested: Post = serde_json::from_str(
            r#"{"_id":{"$oid":"c2"},"_type":"Comment","course_id":"X",
                "comment_thread_id":{"$oid":"t1"},"parent_id":{"$oid":"c1"}}"#,
        )
        .unwrap();
        assert_eq!(nested.replied_to(), Some("c1"));

        let thread: Post = serde_json::from_str(
            r#"{"_id":{"$oid":"t1"},"_type":"CommentThread","course_id":"X"}"#,
        )
        .unwrap();
        assert_eq!(thread.replied_to(), None);
    }
}
