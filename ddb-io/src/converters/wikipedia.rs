//! Wikipedia talk pages
//!
//! Input is JSON lines, one discussion topic per line, with the paragraphs
//! segmented out of the page's revision history. Each page becomes a
//! TALK_PAGE part, each topic a DISCUSSION part linked to its page, and each
//! paragraph a TALK_PAGE_COMMENT contribution. Indentation encodes the
//! reply structure.

use crate::error::ConvertResult;
use crate::input;
use crate::mapping::{self, descriptor, NewContribution, Revision};
use crate::{ConversionStats, Converter, ImportContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ddb_common::db::discourse::Discourse;
use ddb_common::{
    time, ContributionType, DataSourceType, DiscoursePartRelationType, DiscoursePartType,
    DiscourseRelationType, Services,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Username for paragraphs whose contributor could not be determined
pub const UNKNOWN_CONTRIBUTOR: &str = "UNKNOWN_CONTRIBUTOR";

pub const BOT_ANNOTATION: &str = "bot";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Paragraph {
    pub text: Option<String>,
    pub begin: i64,
    pub end: i64,
    pub indent_amount: i64,
    pub contributor: Option<String>,
    pub timestamp: Option<String>,
    pub revision_id: i64,
    pub contributor_is_bot: bool,
}

impl Paragraph {
    pub fn contributor(&self) -> &str {
        mapping::non_empty(self.contributor.as_deref()).unwrap_or(UNKNOWN_CONTRIBUTOR)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(time::parse_timestamp)
    }

    /// Paragraphs without a usable timestamp are not imported
    pub fn is_valid(&self) -> bool {
        self.timestamp().is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Topic {
    pub page_title: String,
    pub topic: String,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

impl Topic {
    pub fn source_id(&self) -> String {
        format!("{}#{}", self.page_title, self.topic)
    }

    pub fn paragraph_source_id(&self, index: usize) -> String {
        format!("{}#{}#{}", self.page_title, self.topic, index)
    }

    /// `(reply, replied_to)` index pairs: each valid paragraph answers the
    /// closest preceding valid paragraph with a smaller indentation
    pub fn reply_pairs(&self) -> Vec<(usize, usize)> {
        let valid: Vec<(usize, &Paragraph)> = self
            .paragraphs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_valid())
            .collect();

        let mut pairs = Vec::new();
        for (pos, (index, paragraph)) in valid.iter().enumerate() {
            let parent = valid[..pos]
                .iter()
                .rev()
                .find(|(_, earlier)| earlier.indent_amount < paragraph.indent_amount);
            if let Some((parent_index, _)) = parent {
                pairs.push((*index, *parent_index));
            }
        }
        pairs
    }
}

pub struct WikipediaConverter {
    ctx: ImportContext,
    discourse: String,
    input: PathBuf,
}

impl WikipediaConverter {
    pub fn new(
        dataset: impl Into<String>,
        discourse: impl Into<String>,
        input: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ctx: ImportContext::new(dataset, DataSourceType::Wikipedia),
            discourse: discourse.into(),
            input: input.into(),
        }
    }

    async fn map_topic(
        &self,
        services: &Services,
        discourse: &Discourse,
        topic: &Topic,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        trace!(page = %topic.page_title, topic = %topic.topic, "Mapping topic");

        if mapping::import_part(
            services,
            &self.ctx,
            discourse,
            &topic.page_title,
            descriptor::TALK_PAGE,
            &topic.page_title,
            DiscoursePartType::TalkPage,
            stats,
        )
        .await?
        .is_none()
        {
            return Ok(());
        }
        let topic_name = mapping::non_empty(Some(&topic.topic)).unwrap_or(&topic.page_title);
        let Some(discussion) = mapping::import_part(
            services,
            &self.ctx,
            discourse,
            &topic.source_id(),
            descriptor::DISCUSSION,
            topic_name,
            DiscoursePartType::Discussion,
            stats,
        )
        .await?
        else {
            return Ok(());
        };

        for (index, paragraph) in topic.paragraphs.iter().enumerate() {
            let Some(posted) = paragraph.timestamp() else {
                debug!(page = %topic.page_title, index, "Paragraph without timestamp, skipping");
                stats.records_skipped += 1;
                continue;
            };

            let author = mapping::import_user(
                services,
                &self.ctx,
                discourse,
                paragraph.contributor(),
                None,
                stats,
            )
            .await?;

            let source_id = topic.paragraph_source_id(index);
            let imported = mapping::import_contribution(
                services,
                &self.ctx,
                NewContribution {
                    source_id: &source_id,
                    descriptor: descriptor::PARAGRAPH_CONTRIBUTION,
                    contribution_type: ContributionType::TalkPageComment,
                    start_time: Some(posted),
                    revisions: vec![Revision {
                        source_id: source_id.clone(),
                        descriptor: descriptor::PARAGRAPH_CONTENT,
                        author: Some(&author),
                        text: paragraph.text.as_deref(),
                        title: None,
                        start_time: Some(posted),
                    }],
                    part: Some(&discussion),
                },
                stats,
            )
            .await?;

            if let Some(contribution) = imported {
                let span = paragraph.begin.to_string();
                let end = paragraph.end.to_string();
                let revision = paragraph.revision_id.to_string();
                services
                    .annotations
                    .annotate(
                        &contribution,
                        "talk_page_paragraph",
                        &[("begin", span.as_str()), ("end", end.as_str()), ("revision_id", revision.as_str())],
                    )
                    .await?;
                if paragraph.contributor_is_bot {
                    services
                        .annotations
                        .annotate(&contribution, BOT_ANNOTATION, &[])
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn link_topic(
        &self,
        services: &Services,
        topic: &Topic,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let page = services
            .discourse_parts
            .find_one_by_data_source(&topic.page_title, descriptor::TALK_PAGE, &self.ctx.dataset)
            .await?;
        let discussion = services
            .discourse_parts
            .find_one_by_data_source(&topic.source_id(), descriptor::DISCUSSION, &self.ctx.dataset)
            .await?;
        match (page, discussion) {
            (Some(page), Some(discussion)) => {
                services
                    .discourse_parts
                    .create_relation(&page, &discussion, DiscoursePartRelationType::TalkPageHasDiscussion)
                    .await?;
                stats.relations_linked += 1;
            }
            _ => {
                debug!(page = %topic.page_title, topic = %topic.topic, "Topic was not imported, skipping");
                stats.records_skipped += 1;
                return Ok(());
            }
        }

        for (reply_index, parent_index) in topic.reply_pairs() {
            let Some(reply) = services
                .contributions
                .find_one_by_data_source(
                    &topic.paragraph_source_id(reply_index),
                    descriptor::PARAGRAPH_CONTRIBUTION,
                    &self.ctx.dataset,
                )
                .await?
            else {
                stats.records_skipped += 1;
                continue;
            };

            let parent_source = topic.paragraph_source_id(parent_index);
            mapping::link_contributions(
                services,
                &self.ctx,
                (&parent_source, descriptor::PARAGRAPH_CONTRIBUTION),
                &reply,
                DiscourseRelationType::Reply,
                stats,
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Converter for WikipediaConverter {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    fn inputs(&self) -> Vec<&Path> {
        vec![self.input.as_path()]
    }

    async fn phase_one(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let discourse = services.discourses.create_or_get(&self.discourse).await?;
        let topics: Vec<Topic> = input::read_json_records(&self.input)?;
        for topic in &topics {
            stats.records_read += 1;
            self.map_topic(services, &discourse, topic, stats).await?;
        }
        Ok(())
    }

    async fn phase_two(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let topics: Vec<Topic> = input::read_json_records(&self.input)?;
        for topic in &topics {
            stats.records_read += 1;
            self.link_topic(services, topic, stats).await?;
        }
        Ok(())
    }
}
