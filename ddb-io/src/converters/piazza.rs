//! Piazza course exports
//!
//! `content.json` is an array of threads. A thread carries its edit
//! history (newest first) and a tree of children: instructor and student
//! answers, follow-ups and feedback. An optional `users.json` fills in real
//! names and email addresses.

use crate::error::ConvertResult;
use crate::input;
use crate::mapping::{self, descriptor, NewContribution, Revision};
use crate::{ConversionStats, Converter, ImportContext};
use async_trait::async_trait;
use ddb_common::db::discourse::Discourse;
use ddb_common::db::discourse_part::DiscoursePart;
use ddb_common::db::user::User;
use ddb_common::{
    time, ContributionType, DataSourceType, DiscoursePartRelationType, DiscoursePartType,
    DiscourseRelationType, Services,
};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub anon: Option<String>,
}

impl HistoryEntry {
    fn is_anonymous(&self) -> bool {
        self.anon.as_deref().is_some_and(|a| a != "no")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Child {
    pub id: String,
    #[serde(rename = "type")]
    pub child_type: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub anon: Option<String>,
    /// Text of follow-ups and feedback, which have no history
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub children: Vec<Child>,
}

impl Child {
    pub fn contribution_type(&self) -> ContributionType {
        match self.child_type.as_str() {
            "i_answer" | "s_answer" => ContributionType::Response,
            "feedback" => ContributionType::Comment,
            _ => ContributionType::Post,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub nr: Option<i64>,
    #[serde(rename = "type", default)]
    pub thread_type: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub folders: Vec<String>,
    #[serde(default)]
    pub tag_good_arr: Vec<Value>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub children: Vec<Child>,
}

impl Thread {
    /// Subject of the latest revision, falling back to the post number
    pub fn title(&self) -> String {
        self.history
            .first()
            .and_then(|h| mapping::non_empty(h.subject.as_deref()))
            .map(str::to_string)
            .unwrap_or_else(|| match self.nr {
                Some(nr) => format!("@{}", nr),
                None => self.id.clone(),
            })
    }

    /// Every child in the tree, paired with the source id of its parent
    pub fn flatten(&self) -> Vec<(&Child, &str)> {
        let mut out = Vec::new();
        let mut stack: Vec<(&Child, &str)> =
            self.children.iter().rev().map(|c| (c, self.id.as_str())).collect();
        while let Some((child, parent)) = stack.pop() {
            out.push((child, parent));
            for grandchild in child.children.iter().rev() {
                stack.push((grandchild, child.id.as_str()));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PiazzaUser {
    #[serde(alias = "id")]
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

pub struct PiazzaConverter {
    ctx: ImportContext,
    discourse: String,
    content: PathBuf,
    users: Option<PathBuf>,
}

impl PiazzaConverter {
    pub fn new(
        dataset: impl Into<String>,
        discourse: impl Into<String>,
        content: impl Into<PathBuf>,
        users: Option<PathBuf>,
    ) -> Self {
        Self {
            ctx: ImportContext::new(dataset, DataSourceType::Piazza),
            discourse: discourse.into(),
            content: content.into(),
            users,
        }
    }

    async fn map_users(
        &self,
        services: &Services,
        discourse: &Discourse,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let Some(path) = &self.users else {
            return Ok(());
        };

        let users: Vec<PiazzaUser> = input::read_json_records(path)?;
        for record in &users {
            stats.records_read += 1;
            let mut user = mapping::import_user(
                services,
                &self.ctx,
                discourse,
                &record.user_id,
                Some((&record.user_id, descriptor::USER)),
                stats,
            )
            .await?;
            services
                .users
                .update_details(&mut user, record.name.as_deref(), record.email.as_deref())
                .await?;
        }
        Ok(())
    }

    async fn author(
        &self,
        services: &Services,
        discourse: &Discourse,
        uid: Option<&str>,
        anonymous: bool,
        stats: &mut ConversionStats,
    ) -> ConvertResult<Option<User>> {
        match mapping::non_empty(uid) {
            Some(uid) if !anonymous => Ok(Some(
                mapping::import_user(
                    services,
                    &self.ctx,
                    discourse,
                    uid,
                    Some((uid, descriptor::USER)),
                    stats,
                )
                .await?,
            )),
            _ => Ok(None),
        }
    }

    /// Import a post whose history is given newest first
    #[allow(clippy::too_many_arguments)]
    async fn map_post(
        &self,
        services: &Services,
        discourse: &Discourse,
        part: &DiscoursePart,
        source_id: &str,
        contribution_type: ContributionType,
        created: Option<&str>,
        history: &[HistoryEntry],
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let mut authors = Vec::with_capacity(history.len());
        for entry in history.iter().rev() {
            authors.push(
                self.author(services, discourse, entry.uid.as_deref(), entry.is_anonymous(), stats)
                    .await?,
            );
        }

        let revisions = history
            .iter()
            .rev()
            .zip(&authors)
            .enumerate()
            .map(|(n, (entry, author))| Revision {
                source_id: format!("{}#{}", source_id, n),
                descriptor: descriptor::HISTORY_CONTENT,
                author: author.as_ref(),
                text: entry.content.as_deref(),
                title: entry.subject.as_deref(),
                start_time: entry.created.as_deref().and_then(time::parse_timestamp),
            })
            .collect();

        mapping::import_contribution(
            services,
            &self.ctx,
            NewContribution {
                source_id,
                descriptor: descriptor::POST_CONTRIBUTION,
                contribution_type,
                start_time: created.and_then(time::parse_timestamp),
                revisions,
                part: Some(part),
            },
            stats,
        )
        .await?;
        Ok(())
    }

    async fn map_thread(
        &self,
        services: &Services,
        discourse: &Discourse,
        thread: &Thread,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        trace!(thread_id = %thread.id, "Mapping thread");

        let Some(part) = mapping::import_part(
            services,
            &self.ctx,
            discourse,
            &thread.id,
            descriptor::THREAD,
            &thread.title(),
            DiscoursePartType::Thread,
            stats,
        )
        .await?
        else {
            return Ok(());
        };

        self.map_post(
            services,
            discourse,
            &part,
            &thread.id,
            ContributionType::ThreadStarter,
            thread.created.as_deref(),
            &thread.history,
            stats,
        )
        .await?;

        if let Some(mut starter) = services
            .contributions
            .find_one_by_data_source(&thread.id, descriptor::POST_CONTRIBUTION, &self.ctx.dataset)
            .await?
        {
            let upvotes = thread.tag_good_arr.len() as i64;
            if upvotes > 0 && starter.upvotes != upvotes {
                services.contributions.set_upvotes(&mut starter, upvotes).await?;
            }
            if let Some(kind) = mapping::non_empty(thread.thread_type.as_deref()) {
                if !services.annotations.has_annotation_type(&starter, "post_type").await? {
                    services
                        .annotations
                        .annotate(&starter, "post_type", &[("type", kind)])
                        .await?;
                }
            }
        }

        for (child, _) in thread.flatten() {
            let history = if child.history.is_empty() {
                vec![HistoryEntry {
                    content: child.subject.clone(),
                    subject: None,
                    created: child.created.clone(),
                    uid: child.uid.clone(),
                    anon: child.anon.clone(),
                }]
            } else {
                child.history.clone()
            };

            self.map_post(
                services,
                discourse,
                &part,
                &child.id,
                child.contribution_type(),
                child.created.as_deref(),
                &history,
                stats,
            )
            .await?;
        }
        Ok(())
    }

    async fn map_thread_relations(
        &self,
        services: &Services,
        discourse: &Discourse,
        course: &DiscoursePart,
        thread: &Thread,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let Some(part) = services
            .discourse_parts
            .find_one_by_data_source(&thread.id, descriptor::THREAD, &self.ctx.dataset)
            .await?
        else {
            debug!(thread_id = %thread.id, "Thread was not imported, skipping");
            stats.records_skipped += 1;
            return Ok(());
        };

        services
            .discourse_parts
            .create_relation(course, &part, DiscoursePartRelationType::CourseHasThread)
            .await?;
        stats.relations_linked += 1;

        for folder in &thread.folders {
            let Some(name) = mapping::non_empty(Some(folder)) else {
                continue;
            };
            let folder_part = services
                .discourse_parts
                .create_or_get_typed_named(discourse, name, DiscoursePartType::Folder)
                .await?;
            services
                .discourse_parts
                .create_relation(&folder_part, &part, DiscoursePartRelationType::Subpart)
                .await?;
            stats.relations_linked += 1;
        }

        for (child, parent_id) in thread.flatten() {
            let Some(contribution) = services
                .contributions
                .find_one_by_data_source(&child.id, descriptor::POST_CONTRIBUTION, &self.ctx.dataset)
                .await?
            else {
                stats.records_skipped += 1;
                continue;
            };

            mapping::link_contributions(
                services,
                &self.ctx,
                (parent_id, descriptor::POST_CONTRIBUTION),
                &contribution,
                DiscourseRelationType::Reply,
                stats,
            )
            .await?;
            mapping::link_contributions(
                services,
                &self.ctx,
                (&thread.id, descriptor::POST_CONTRIBUTION),
                &contribution,
                DiscourseRelationType::Descendant,
                stats,
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Converter for PiazzaConverter {
    fn name(&self) -> &'static str {
        "piazza"
    }

    fn inputs(&self) -> Vec<&Path> {
        let mut inputs = vec![self.content.as_path()];
        inputs.extend(self.users.as_deref());
        inputs
    }

    async fn phase_one(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let discourse = services.discourses.create_or_get(&self.discourse).await?;
        services
            .discourse_parts
            .create_or_get_typed(&discourse, DiscoursePartType::Course)
            .await?;

        self.map_users(services, &discourse, stats).await?;

        let threads: Vec<Thread> = input::read_json_records(&self.content)?;
        for thread in &threads {
            stats.records_read += 1;
            self.map_thread(services, &discourse, thread, stats).await?;
        }
        Ok(())
    }

    async fn phase_two(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let discourse = services.discourses.create_or_get(&self.discourse).await?;
        let course = services
            .discourse_parts
            .create_or_get_typed(&discourse, DiscoursePartType::Course)
            .await?;

        let threads: Vec<Thread> = input::read_json_records(&self.content)?;
        for thread in &threads {
            stats.records_read += 1;
            self.map_thread_relations(services, &discourse, &course, thread, stats)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_pairs_children_with_parents() {
        let thread: Thread = serde_json::from_str(
            r#"{"id":"t","children":[
                {"id":"a","type":"i_answer"},
                {"id":"f","type":"followup","children":[{"id":"fb","type":"feedback"}]}
            ]}"#,
        )
        .unwrap();

        let pairs: Vec<(&str, &str)> = thread
            .flatten()
            .into_iter()
            .map(|(c, p)| (c.id.as_str(), p))
            .collect();
        assert_eq!(pairs, vec![("a", "t"), ("f", "t"), ("fb", "f")]);
    }

    #[test]
    fn test_child_types() {
        let child = |t: &str| Child {
            id: "x".to_string(),
            child_type: t.to_string(),
            created: None,
            uid: None,
            anon: None,
            subject: None,
            history: Vec::new(),
            children: Vec::new(),
        };
        assert_eq!(child("i_answer").contribution_type(), ContributionType::Response);
        assert_eq!(child("s_answer").contribution_type(), ContributionType::Response);
        assert_eq!(child("followup").contribution_type(), ContributionType::Post);
        assert_eq!(child("feedback").contribution_type(), ContributionType::Comment);
    }

    #[test]
    fn test_title_fallback() {
        let thread: Thread = serde_json::from_str(r#"{"id":"t","nr":7}"#).unwrap();
        assert_eq!(thread.title(), "@7");
    }
}
