//! TAGS Twitter archives
//!
//! A TAGS sheet exported as CSV, one tweet per row. All tweets go into a
//! single TWITTER_ARCHIVE part; per-tweet metadata is kept as features of a
//! `tweet_metadata` annotation. Replies are resolved in phase two through
//! `in_reply_to_status_id_str`.

use crate::error::ConvertResult;
use crate::input;
use crate::mapping::{self, descriptor, NewContribution, Revision};
use crate::{ConversionStats, Converter, ImportContext};
use async_trait::async_trait;
use ddb_common::db::discourse::Discourse;
use ddb_common::db::discourse_part::DiscoursePart;
use ddb_common::{
    time, ContributionType, DataSourceType, DiscoursePartType, DiscourseRelationType, Services,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

pub const METADATA_ANNOTATION: &str = "tweet_metadata";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TweetInfo {
    pub id_str: String,
    pub from_user: String,
    pub text: String,
    pub created_at: String,
    pub time: String,
    pub geo_coordinates: String,
    pub user_lang: String,
    pub in_reply_to_user_id_str: String,
    pub in_reply_to_screen_name: String,
    pub from_user_id_str: String,
    pub in_reply_to_status_id_str: String,
    pub source: String,
    pub profile_image_url: String,
    pub user_followers_count: String,
    pub user_friends_count: String,
    pub user_utc_offset: String,
    pub status_url: String,
    pub entities_str: String,
}

impl TweetInfo {
    /// `created_at` in Twitter format, else the sheet's `time` column
    pub fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        time::parse_timestamp(&self.created_at).or_else(|| time::parse_timestamp(&self.time))
    }

    /// Non-empty metadata columns as (feature type, value)
    pub fn metadata(&self) -> Vec<(&'static str, &str)> {
        [
            ("geo_coordinates", self.geo_coordinates.as_str()),
            ("user_lang", self.user_lang.as_str()),
            ("source", self.source.as_str()),
            ("profile_image_url", self.profile_image_url.as_str()),
            ("user_followers_count", self.user_followers_count.as_str()),
            ("user_friends_count", self.user_friends_count.as_str()),
            ("user_utc_offset", self.user_utc_offset.as_str()),
            ("status_url", self.status_url.as_str()),
            ("in_reply_to_screen_name", self.in_reply_to_screen_name.as_str()),
            ("entities_str", self.entities_str.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
    }
}

pub struct TagsConverter {
    ctx: ImportContext,
    discourse: String,
    archive: PathBuf,
}

impl TagsConverter {
    pub fn new(
        dataset: impl Into<String>,
        discourse: impl Into<String>,
        archive: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ctx: ImportContext::new(dataset, DataSourceType::Tags),
            discourse: discourse.into(),
            archive: archive.into(),
        }
    }

    async fn map_tweet(
        &self,
        services: &Services,
        discourse: &Discourse,
        archive: &DiscoursePart,
        tweet: &TweetInfo,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        if tweet.id_str.trim().is_empty() {
            warn!("Tweet without id_str, skipping");
            stats.records_skipped += 1;
            return Ok(());
        }
        trace!(tweet_id = %tweet.id_str, "Mapping tweet");

        let author = match mapping::non_empty(Some(&tweet.from_user)) {
            Some(username) => {
                let mut user = mapping::import_user(
                    services,
                    &self.ctx,
                    discourse,
                    username,
                    Some((tweet.from_user_id_str.trim(), descriptor::TWITTER_USER)),
                    stats,
                )
                .await?;
                let lang = mapping::non_empty(Some(&tweet.user_lang));
                if user.language.is_none() && lang.is_some() {
                    user.language = lang.map(str::to_string);
                    services.users.update(&mut user).await?;
                }
                Some(user)
            }
            None => None,
        };

        let sent = tweet.timestamp();
        let imported = mapping::import_contribution(
            services,
            &self.ctx,
            NewContribution {
                source_id: &tweet.id_str,
                descriptor: descriptor::TWEET_CONTRIBUTION,
                contribution_type: ContributionType::Tweet,
                start_time: sent,
                revisions: vec![Revision {
                    source_id: tweet.id_str.clone(),
                    descriptor: descriptor::TWEET_CONTENT,
                    author: author.as_ref(),
                    text: Some(&tweet.text),
                    title: None,
                    start_time: sent,
                }],
                part: Some(archive),
            },
            stats,
        )
        .await?;

        if let Some(contribution) = imported {
            let metadata = tweet.metadata();
            if !metadata.is_empty() {
                services
                    .annotations
                    .annotate(&contribution, METADATA_ANNOTATION, &metadata)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Converter for TagsConverter {
    fn name(&self) -> &'static str {
        "tags"
    }

    fn inputs(&self) -> Vec<&Path> {
        vec![self.archive.as_path()]
    }

    async fn phase_one(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let discourse = services.discourses.create_or_get(&self.discourse).await?;
        let archive = services
            .discourse_parts
            .create_or_get_typed(&discourse, DiscoursePartType::TwitterArchive)
            .await?;

        let tweets: Vec<TweetInfo> = input::read_csv_records(&self.archive)?;
        for tweet in &tweets {
            stats.records_read += 1;
            self.map_tweet(services, &discourse, &archive, tweet, stats).await?;
        }
        Ok(())
    }

    async fn phase_two(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let tweets: Vec<TweetInfo> = input::read_csv_records(&self.archive)?;
        for tweet in &tweets {
            stats.records_read += 1;
            let Some(parent_id) = mapping::non_empty(Some(&tweet.in_reply_to_status_id_str)) else {
                continue;
            };
            let Some(reply) = services
                .contributions
                .find_one_by_data_source(&tweet.id_str, descriptor::TWEET_CONTRIBUTION, &self.ctx.dataset)
                .await?
            else {
                stats.records_skipped += 1;
                continue;
            };

            mapping::link_contributions(
                services,
                &self.ctx,
                (parent_id, descriptor::TWEET_CONTRIBUTION),
                &reply,
                DiscourseRelationType::Reply,
                stats,
            )
            .await?;
        }
        Ok(())
    }
}
