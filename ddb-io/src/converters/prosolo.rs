//! ProSolo social learning platform
//!
//! Reads JSON exports of the `user`, `node` and `social_activity` tables
//! from one directory (`user.json`, `node.json`, `social_activity.json`).
//! Learning goals and competences become discourse parts; social
//! activities (posts, goal notes, node comments, activity comments) become
//! contributions.

use crate::error::ConvertResult;
use crate::input;
use crate::mapping::{self, descriptor, NewContribution, Revision};
use crate::{ConversionStats, Converter, ImportContext};
use async_trait::async_trait;
use ddb_common::db::discourse::Discourse;
use ddb_common::{
    time, ContributionType, DataSourceType, DiscoursePartRelationType, DiscoursePartType,
    DiscourseRelationType, Services,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub const USER_TABLE: &str = "user";
pub const NODE_TABLE: &str = "node";
pub const SOCIAL_ACTIVITY_TABLE: &str = "social_activity";

#[derive(Debug, Clone, Deserialize)]
pub struct ProsoloUser {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ProsoloUser {
    fn realname(&self) -> Option<String> {
        let parts: Vec<&str> = [self.name.as_deref(), self.lastname.as_deref()]
            .into_iter()
            .filter_map(mapping::non_empty)
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProsoloNode {
    pub id: i64,
    pub dtype: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub learning_goal: Option<i64>,
    #[serde(default)]
    pub parent_goal: Option<i64>,
}

impl ProsoloNode {
    pub fn part_type(&self) -> Option<DiscoursePartType> {
        if self.dtype.contains("LearningGoal") {
            Some(DiscoursePartType::LearningGoal)
        } else if self.dtype.contains("Competence") {
            Some(DiscoursePartType::Competence)
        } else {
            None
        }
    }

    /// Learning goal a competence belongs to
    fn goal(&self) -> Option<i64> {
        self.parent_goal.or(self.learning_goal)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialActivity {
    pub id: i64,
    pub dtype: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub maker: Option<i64>,
    #[serde(default)]
    pub node_object: Option<i64>,
    #[serde(default)]
    pub node_target: Option<i64>,
    #[serde(default)]
    pub goal_target: Option<i64>,
    /// Commented activity, for activity comments
    #[serde(default)]
    pub social_activity_target: Option<i64>,
}

impl SocialActivity {
    pub fn contribution_type(&self) -> Option<ContributionType> {
        let dtype = self.dtype.as_str();
        if dtype.contains("GoalNote") {
            Some(ContributionType::GoalNote)
        } else if dtype.contains("NodeComment") {
            Some(ContributionType::NodeComment)
        } else if dtype.contains("SocialActivityComment") {
            Some(ContributionType::Comment)
        } else if dtype.contains("Post") {
            Some(ContributionType::Post)
        } else {
            None
        }
    }

    /// Node whose part the activity belongs to
    fn node(&self) -> Option<i64> {
        self.node_target.or(self.goal_target).or(self.node_object)
    }
}

pub struct ProsoloConverter {
    ctx: ImportContext,
    discourse: String,
    users: PathBuf,
    nodes: PathBuf,
    activities: PathBuf,
}

impl ProsoloConverter {
    /// Reads `<table>.json` files from `export_dir`
    pub fn new(
        dataset: impl Into<String>,
        discourse: impl Into<String>,
        export_dir: impl AsRef<Path>,
    ) -> Self {
        let dir = export_dir.as_ref();
        Self {
            ctx: ImportContext::new(dataset, DataSourceType::Prosolo),
            discourse: discourse.into(),
            users: dir.join(format!("{}.json", USER_TABLE)),
            nodes: dir.join(format!("{}.json", NODE_TABLE)),
            activities: dir.join(format!("{}.json", SOCIAL_ACTIVITY_TABLE)),
        }
    }

    async fn map_users(
        &self,
        services: &Services,
        discourse: &Discourse,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let users: Vec<ProsoloUser> = input::read_json_records(&self.users)?;
        for record in &users {
            stats.records_read += 1;
            let id = record.id.to_string();
            let mut user = mapping::import_user(
                services,
                &self.ctx,
                discourse,
                &id,
                Some((&id, descriptor::USER)),
                stats,
            )
            .await?;
            services
                .users
                .update_details(&mut user, record.realname().as_deref(), record.email.as_deref())
                .await?;
        }
        Ok(())
    }

    async fn map_nodes(
        &self,
        services: &Services,
        discourse: &Discourse,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let nodes: Vec<ProsoloNode> = input::read_json_records(&self.nodes)?;
        for node in &nodes {
            stats.records_read += 1;
            let Some(part_type) = node.part_type() else {
                trace!(node_id = node.id, dtype = %node.dtype, "Node is not a goal or competence");
                stats.records_skipped += 1;
                continue;
            };

            let id = node.id.to_string();
            let name = mapping::non_empty(node.title.as_deref()).unwrap_or(&id);
            let Some(mut part) = mapping::import_part(
                services,
                &self.ctx,
                discourse,
                &id,
                descriptor::NODE,
                name,
                part_type,
                stats,
            )
            .await?
            else {
                continue;
            };

            let created = node.created.as_deref().and_then(time::parse_timestamp);
            if part.timed.start_time.is_none() && created.is_some() {
                part.timed.start_time = created;
                services.discourse_parts.update(&mut part).await?;
            }
        }
        Ok(())
    }

    async fn map_activities(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let activities: Vec<SocialActivity> = input::read_json_records(&self.activities)?;
        for activity in &activities {
            stats.records_read += 1;
            let Some(contribution_type) = activity.contribution_type() else {
                trace!(activity_id = activity.id, dtype = %activity.dtype, "Activity carries no discourse");
                stats.records_skipped += 1;
                continue;
            };

            let author = match activity.maker {
                Some(maker) => {
                    services
                        .users
                        .find_one_by_data_source(&maker.to_string(), descriptor::USER, &self.ctx.dataset)
                        .await?
                }
                None => None,
            };

            let id = activity.id.to_string();
            let created = activity.created.as_deref().and_then(time::parse_timestamp);
            mapping::import_contribution(
                services,
                &self.ctx,
                NewContribution {
                    source_id: &id,
                    descriptor: descriptor::SOCIAL_ACTIVITY_CONTRIBUTION,
                    contribution_type,
                    start_time: created,
                    revisions: vec![Revision {
                        source_id: id.clone(),
                        descriptor: descriptor::SOCIAL_ACTIVITY_CONTENT,
                        author: author.as_ref(),
                        text: activity.text.as_deref(),
                        title: None,
                        start_time: created,
                    }],
                    part: None,
                },
                stats,
            )
            .await?;
        }
        Ok(())
    }

    async fn link_nodes(&self, services: &Services, stats: &mut ConversionStats) -> ConvertResult<()> {
        let nodes: Vec<ProsoloNode> = input::read_json_records(&self.nodes)?;
        for node in &nodes {
            stats.records_read += 1;
            if node.part_type() != Some(DiscoursePartType::Competence) {
                continue;
            }
            let Some(goal_id) = node.goal() else {
                continue;
            };

            let competence = services
                .discourse_parts
                .find_one_by_data_source(&node.id.to_string(), descriptor::NODE, &self.ctx.dataset)
                .await?;
            let goal = services
                .discourse_parts
                .find_one_by_data_source(&goal_id.to_string(), descriptor::NODE, &self.ctx.dataset)
                .await?;

            match (goal, competence) {
                (Some(goal), Some(competence)) => {
                    services
                        .discourse_parts
                        .create_relation(&goal, &competence, DiscoursePartRelationType::LearningGoalHasCompetence)
                        .await?;
                    stats.relations_linked += 1;
                }
                _ => {
                    debug!(node_id = node.id, goal_id, "Goal or competence not imported, skipping");
                    stats.records_skipped += 1;
                }
            }
        }
        Ok(())
    }

    async fn link_activities(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let activities: Vec<SocialActivity> = input::read_json_records(&self.activities)?;
        for activity in &activities {
            stats.records_read += 1;
            let id = activity.id.to_string();
            let Some(contribution) = services
                .contributions
                .find_one_by_data_source(&id, descriptor::SOCIAL_ACTIVITY_CONTRIBUTION, &self.ctx.dataset)
                .await?
            else {
                continue;
            };

            if let Some(node_id) = activity.node() {
                match services
                    .discourse_parts
                    .find_one_by_data_source(&node_id.to_string(), descriptor::NODE, &self.ctx.dataset)
                    .await?
                {
                    Some(part) => {
                        services.discourse_parts.add_contribution(&contribution, &part).await?;
                        stats.relations_linked += 1;
                    }
                    None => {
                        debug!(activity_id = activity.id, node_id, "Node not imported, skipping membership");
                        stats.records_skipped += 1;
                    }
                }
            }

            if let Some(target) = activity.social_activity_target {
                mapping::link_contributions(
                    services,
                    &self.ctx,
                    (&target.to_string(), descriptor::SOCIAL_ACTIVITY_CONTRIBUTION),
                    &contribution,
                    DiscourseRelationType::Reply,
                    stats,
                )
                .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Converter for ProsoloConverter {
    fn name(&self) -> &'static str {
        "prosolo"
    }

    fn inputs(&self) -> Vec<&Path> {
        vec![self.users.as_path(), self.nodes.as_path(), self.activities.as_path()]
    }

    async fn phase_one(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let discourse = services.discourses.create_or_get(&self.discourse).await?;
        self.map_users(services, &discourse, stats).await?;
        self.map_nodes(services, &discourse, stats).await?;
        self.map_activities(services, stats).await
    }

    async fn phase_two(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        self.link_nodes(services, stats).await?;
        self.link_activities(services, stats).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(dtype: &str) -> SocialActivity {
        serde_json::from_value(serde_json::json!({ "id": 1, "dtype": dtype })).unwrap()
    }

    #[test]
    fn test_activity_types() {
        assert_eq!(activity("PostSocialActivity").contribution_type(), Some(ContributionType::Post));
        assert_eq!(
            activity("GoalNoteSocialActivity").contribution_type(),
            Some(ContributionType::GoalNote)
        );
        assert_eq!(
            activity("NodeCommentSocialActivity").contribution_type(),
            Some(ContributionType::NodeComment)
        );
        assert_eq!(
            activity("SocialActivityComment").contribution_type(),
            Some(ContributionType::Comment)
        );
        assert_eq!(activity("TwitterPostSocialActivity").contribution_type(), Some(ContributionType::Post));
        assert_eq!(activity("FollowUserSocialActivity").contribution_type(), None);
    }

    #[test]
    fn test_node_part_types() {
        let node = |dtype: &str| ProsoloNode {
            id: 1,
            dtype: dtype.to_string(),
            title: None,
            created: None,
            learning_goal: None,
            parent_goal: None,
        };
        assert_eq!(node("TargetLearningGoal").part_type(), Some(DiscoursePartType::LearningGoal));
        assert_eq!(node("TargetCompetence").part_type(), Some(DiscoursePartType::Competence));
        assert_eq!(node("Activity").part_type(), None);
    }

    #[test]
    fn test_realname_joins_parts() {
        let user: ProsoloUser =
            serde_json::from_str(r#"{"id":3,"name":"Ada","lastname":"Lovelace"}"#).unwrap();
        assert_eq!(user.realname().as_deref(), Some("Ada Lovelace"));
        let nameless: ProsoloUser = serde_json::from_str(r#"{"id":4,"name":""}"#).unwrap();
        assert_eq!(nameless.realname(), None);
    }
}
