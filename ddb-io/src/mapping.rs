//! Provenance-keyed mapping helpers shared by the converters
//!
//! Each helper first looks the entity up by its source triple and only
//! creates it when the record has not been imported before.

use crate::error::ConvertResult;
use crate::{ConversionStats, ImportContext};
use chrono::{DateTime, Utc};
use ddb_common::db::contribution::Contribution;
use ddb_common::db::discourse::Discourse;
use ddb_common::db::discourse_part::DiscoursePart;
use ddb_common::db::user::User;
use ddb_common::{ContributionType, DiscourseRelationType, Services};
use tracing::{debug, trace, warn};

/// Source descriptors, `<entity>#<source table.field>`
pub mod descriptor {
    pub const USER: &str = "user#user.id";
    pub const POST_CONTRIBUTION: &str = "contribution#post.id";
    pub const POST_CONTENT: &str = "content#post.id";
    pub const ROOM: &str = "discourse_part#room.id";
    pub const MESSAGE_CONTRIBUTION: &str = "contribution#message.id";
    pub const MESSAGE_CONTENT: &str = "content#message.id";
    pub const THREAD: &str = "discourse_part#thread.id";
    pub const HISTORY_CONTENT: &str = "content#history.id";
    pub const NODE: &str = "discourse_part#node.id";
    pub const SOCIAL_ACTIVITY_CONTRIBUTION: &str = "contribution#social_activity.id";
    pub const SOCIAL_ACTIVITY_CONTENT: &str = "content#social_activity.id";
    pub const TWEET_CONTRIBUTION: &str = "contribution#tweet.id_str";
    pub const TWEET_CONTENT: &str = "content#tweet.id_str";
    pub const TWITTER_USER: &str = "user#tweet.from_user_id_str";
    pub const TALK_PAGE: &str = "discourse_part#talk_page.title";
    pub const DISCUSSION: &str = "discourse_part#discussion.topic";
    pub const PARAGRAPH_CONTRIBUTION: &str = "contribution#paragraph.id";
    pub const PARAGRAPH_CONTENT: &str = "content#paragraph.id";
}

/// One revision of a contribution's text
pub struct Revision<'a> {
    pub source_id: String,
    pub descriptor: &'a str,
    pub author: Option<&'a User>,
    pub text: Option<&'a str>,
    pub title: Option<&'a str>,
    pub start_time: Option<DateTime<Utc>>,
}

/// A contribution to import, keyed by `source_id` under `descriptor`
pub struct NewContribution<'a> {
    pub source_id: &'a str,
    pub descriptor: &'a str,
    pub contribution_type: ContributionType,
    pub start_time: Option<DateTime<Utc>>,
    /// Oldest first; the last one becomes the current revision
    pub revisions: Vec<Revision<'a>>,
    /// Part to attach to right away, if known in phase one
    pub part: Option<&'a DiscoursePart>,
}

/// Whether a record carries a usable source id; skips it otherwise.
///
/// Runs before any write so an unusable record leaves no rows behind.
fn keyed(source_id: &str, descriptor: &str, stats: &mut ConversionStats) -> bool {
    if source_id.trim().is_empty() {
        warn!(descriptor, "Record without source id, skipping");
        stats.records_skipped += 1;
        return false;
    }
    true
}

/// Import a contribution with its revisions unless its source id is already known.
///
/// Returns `None` for records imported by an earlier run and for records
/// whose own or revision source id is empty.
pub async fn import_contribution(
    services: &Services,
    ctx: &ImportContext,
    new: NewContribution<'_>,
    stats: &mut ConversionStats,
) -> ConvertResult<Option<Contribution>> {
    let revision_keys = new.revisions.iter().map(|r| (r.source_id.as_str(), r.descriptor));
    for (source_id, descriptor) in std::iter::once((new.source_id, new.descriptor)).chain(revision_keys) {
        if !keyed(source_id, descriptor, stats) {
            return Ok(None);
        }
    }

    if services
        .contributions
        .find_one_by_data_source(new.source_id, new.descriptor, &ctx.dataset)
        .await?
        .is_some()
    {
        trace!(source_id = new.source_id, "Contribution already imported");
        stats.already_imported += 1;
        return Ok(None);
    }

    let mut contribution = services
        .contributions
        .create_typed(new.contribution_type, new.start_time)
        .await?;

    for revision in &new.revisions {
        let content = services
            .contents
            .create_content(revision.author, revision.text, revision.title, revision.start_time)
            .await?;
        services
            .data_sources
            .add_source(&content, &ctx.source(revision.source_id.as_str(), revision.descriptor))
            .await?;
        services.contents.add_revision(&mut contribution, &content).await?;
        stats.entities_created += 1;
    }

    if let Some(part) = new.part {
        services.discourse_parts.add_contribution(&contribution, part).await?;
    }

    services
        .data_sources
        .add_source(&contribution, &ctx.source(new.source_id, new.descriptor))
        .await?;
    stats.entities_created += 1;

    debug!(
        contribution_id = contribution.id,
        source_id = new.source_id,
        contribution_type = %new.contribution_type,
        "Imported contribution"
    );
    Ok(Some(contribution))
}

/// User by username, with `source_id` recorded as its provenance
pub async fn import_user(
    services: &Services,
    ctx: &ImportContext,
    discourse: &Discourse,
    username: &str,
    source: Option<(&str, &str)>,
    stats: &mut ConversionStats,
) -> ConvertResult<User> {
    let existing = services.users.find_by_username(discourse, username).await?;
    let user = match existing {
        Some(user) => user,
        None => {
            stats.entities_created += 1;
            services.users.create_or_get_user(discourse, username).await?
        }
    };

    if let Some((source_id, descriptor)) = source {
        if !source_id.trim().is_empty() {
            services
                .data_sources
                .add_source(&user, &ctx.source(source_id, descriptor))
                .await?;
        }
    }
    Ok(user)
}

/// Discourse part keyed by source id, created with `name` when new.
///
/// `None` when the record has no source id.
#[allow(clippy::too_many_arguments)]
pub async fn import_part(
    services: &Services,
    ctx: &ImportContext,
    discourse: &Discourse,
    source_id: &str,
    descriptor: &str,
    name: &str,
    part_type: impl AsRef<str>,
    stats: &mut ConversionStats,
) -> ConvertResult<Option<DiscoursePart>> {
    if !keyed(source_id, descriptor, stats) {
        return Ok(None);
    }

    if let Some(existing) = services
        .discourse_parts
        .find_one_by_data_source(source_id, descriptor, &ctx.dataset)
        .await?
    {
        stats.already_imported += 1;
        return Ok(Some(existing));
    }

    let part = services
        .discourse_parts
        .create_typed_named(discourse, name, part_type)
        .await?;
    services
        .data_sources
        .add_source(&part, &ctx.source(source_id, descriptor))
        .await?;
    stats.entities_created += 1;

    debug!(part_id = part.id, source_id, name, "Imported discourse part");
    Ok(Some(part))
}

/// Relation `source -> target` between two imported contributions, both
/// located by source id. Dangling references are skipped.
pub async fn link_contributions(
    services: &Services,
    ctx: &ImportContext,
    source: (&str, &str),
    target: &Contribution,
    relation_type: DiscourseRelationType,
    stats: &mut ConversionStats,
) -> ConvertResult<bool> {
    let (source_id, descriptor) = source;
    let Some(source) = services
        .contributions
        .find_one_by_data_source(source_id, descriptor, &ctx.dataset)
        .await?
    else {
        debug!(
            source_id,
            target = target.id,
            relation = %relation_type,
            "Referenced contribution not imported, skipping relation"
        );
        stats.records_skipped += 1;
        return Ok(false);
    };

    if source.id == target.id {
        return Ok(false);
    }

    services
        .contributions
        .create_discourse_relation(&source, target, relation_type)
        .await?;
    stats.relations_linked += 1;
    Ok(true)
}

/// Treat empty strings from CSV/JSON dumps as absent
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddb_common::db::init_memory_database;
    use ddb_common::{DataSourceType, DiscoursePartType};

    #[tokio::test]
    async fn test_import_contribution_skips_known_source() {
        let services = Services::new(init_memory_database().await.unwrap());
        let ctx = ImportContext::new("ds", DataSourceType::Other);
        let discourse = services.discourses.create_or_get("d").await.unwrap();
        let part = services
            .discourse_parts
            .create_or_get_typed(&discourse, DiscoursePartType::Forum)
            .await
            .unwrap();
        let mut stats = ConversionStats::default();

        let new = || NewContribution {
            source_id: "p1",
            descriptor: descriptor::POST_CONTRIBUTION,
            contribution_type: ContributionType::Post,
            start_time: None,
            revisions: vec![Revision {
                source_id: "p1".to_string(),
                descriptor: descriptor::POST_CONTENT,
                author: None,
                text: Some("hello"),
                title: None,
                start_time: None,
            }],
            part: Some(&part),
        };

        let first = import_contribution(&services, &ctx, new(), &mut stats).await.unwrap();
        let second = import_contribution(&services, &ctx, new(), &mut stats).await.unwrap();

        let first = first.unwrap();
        assert!(second.is_none());
        assert_eq!(stats.entities_created, 2);
        assert_eq!(stats.already_imported, 1);
        assert_eq!(first.current_revision, first.first_revision);
        assert!(first.current_revision.is_some());
    }

    #[tokio::test]
    async fn test_record_without_source_id_writes_nothing() {
        let services = Services::new(init_memory_database().await.unwrap());
        let ctx = ImportContext::new("ds", DataSourceType::Other);
        let discourse = services.discourses.create_or_get("d").await.unwrap();
        let mut stats = ConversionStats::default();

        let blank_content = NewContribution {
            source_id: "p1",
            descriptor: descriptor::POST_CONTRIBUTION,
            contribution_type: ContributionType::Post,
            start_time: None,
            revisions: vec![Revision {
                source_id: String::new(),
                descriptor: descriptor::POST_CONTENT,
                author: None,
                text: Some("hello"),
                title: None,
                start_time: None,
            }],
            part: None,
        };
        let imported = import_contribution(&services, &ctx, blank_content, &mut stats)
            .await
            .unwrap();
        assert!(imported.is_none());

        let part = import_part(
            &services,
            &ctx,
            &discourse,
            " ",
            descriptor::ROOM,
            "lobby",
            DiscoursePartType::Chatroom,
            &mut stats,
        )
        .await
        .unwrap();
        assert!(part.is_none());

        assert_eq!(stats.records_skipped, 2);
        assert_eq!(stats.entities_created, 0);
        let pool = services.pool();
        for table in ["contributions", "contents", "discourse_parts"] {
            let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(pool)
                .await
                .unwrap();
            assert_eq!(rows, 0, "{}", table);
        }
    }

    #[tokio::test]
    async fn test_link_to_missing_source_is_skipped() {
        let services = Services::new(init_memory_database().await.unwrap());
        let ctx = ImportContext::new("ds", DataSourceType::Other);
        let target = services
            .contributions
            .create_typed(ContributionType::Post, None)
            .await
            .unwrap();
        let mut stats = ConversionStats::default();

        let linked = link_contributions(
            &services,
            &ctx,
            ("ghost", descriptor::POST_CONTRIBUTION),
            &target,
            DiscourseRelationType::Reply,
            &mut stats,
        )
        .await
        .unwrap();

        assert!(!linked);
        assert_eq!(stats.records_skipped, 1);
        assert!(services
            .contributions
            .find_relations_to(&target, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  x ")), Some("x"));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
