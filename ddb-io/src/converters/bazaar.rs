//! Bazaar chat logs
//!
//! Two CSV exports: rooms (`id,name,created_time,modified_time`) and
//! messages (`id,created_time,type,content,username,roomid`). Text, image
//! and private messages become CHAT_MESSAGE contributions; every other
//! message type (presence, ready, ...) is an INTERACTION annotated with its
//! type. The logs carry no reply structure, so phase two only places each
//! contribution into its room.

use crate::error::ConvertResult;
use crate::input;
use crate::mapping::{self, descriptor, NewContribution, Revision};
use crate::{ConversionStats, Converter, ImportContext};
use async_trait::async_trait;
use ddb_common::db::discourse::Discourse;
use ddb_common::{time, ContributionType, DataSourceType, DiscoursePartType, Services};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

const CHAT_MESSAGE_TYPES: &[&str] = &["text", "image", "private"];

#[derive(Debug, Clone, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "roomid")]
    pub room_id: String,
}

impl Message {
    pub fn contribution_type(&self) -> ContributionType {
        if CHAT_MESSAGE_TYPES.contains(&self.message_type.trim().to_ascii_lowercase().as_str()) {
            ContributionType::ChatMessage
        } else {
            ContributionType::Interaction
        }
    }
}

pub struct BazaarConverter {
    ctx: ImportContext,
    discourse: String,
    messages: PathBuf,
    rooms: PathBuf,
}

impl BazaarConverter {
    pub fn new(
        dataset: impl Into<String>,
        discourse: impl Into<String>,
        messages: impl Into<PathBuf>,
        rooms: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ctx: ImportContext::new(dataset, DataSourceType::Bazaar),
            discourse: discourse.into(),
            messages: messages.into(),
            rooms: rooms.into(),
        }
    }

    async fn map_room(
        &self,
        services: &Services,
        discourse: &Discourse,
        room: &Room,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let name = mapping::non_empty(Some(&room.name)).unwrap_or(&room.id);
        let Some(mut part) = mapping::import_part(
            services,
            &self.ctx,
            discourse,
            &room.id,
            descriptor::ROOM,
            name,
            DiscoursePartType::Chatroom,
            stats,
        )
        .await?
        else {
            return Ok(());
        };

        let opened = room.created_time.as_deref().and_then(time::parse_timestamp);
        if part.timed.start_time.is_none() && opened.is_some() {
            part.timed.start_time = opened;
            services.discourse_parts.update(&mut part).await?;
        }
        Ok(())
    }

    async fn map_message(
        &self,
        services: &Services,
        discourse: &Discourse,
        message: &Message,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        trace!(message_id = %message.id, message_type = %message.message_type, "Mapping message");

        let author = match mapping::non_empty(message.username.as_deref()) {
            Some(username) => Some(
                mapping::import_user(services, &self.ctx, discourse, username, None, stats).await?,
            ),
            None => None,
        };

        let sent = message.created_time.as_deref().and_then(time::parse_timestamp);
        let contribution_type = message.contribution_type();
        let imported = mapping::import_contribution(
            services,
            &self.ctx,
            NewContribution {
                source_id: &message.id,
                descriptor: descriptor::MESSAGE_CONTRIBUTION,
                contribution_type,
                start_time: sent,
                revisions: vec![Revision {
                    source_id: message.id.clone(),
                    descriptor: descriptor::MESSAGE_CONTENT,
                    author: author.as_ref(),
                    text: message.content.as_deref(),
                    title: None,
                    start_time: sent,
                }],
                part: None,
            },
            stats,
        )
        .await?;

        if let Some(contribution) = imported {
            if contribution_type == ContributionType::Interaction {
                services
                    .annotations
                    .annotate(&contribution, "interaction", &[("type", message.message_type.as_str())])
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Converter for BazaarConverter {
    fn name(&self) -> &'static str {
        "bazaar"
    }

    fn inputs(&self) -> Vec<&Path> {
        vec![self.messages.as_path(), self.rooms.as_path()]
    }

    async fn phase_one(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let discourse = services.discourses.create_or_get(&self.discourse).await?;

        let rooms: Vec<Room> = input::read_csv_records(&self.rooms)?;
        for room in &rooms {
            stats.records_read += 1;
            self.map_room(services, &discourse, room, stats).await?;
        }

        let messages: Vec<Message> = input::read_escaped_csv_records(&self.messages)?;
        for message in &messages {
            stats.records_read += 1;
            self.map_message(services, &discourse, message, stats).await?;
        }
        Ok(())
    }

    async fn phase_two(
        &self,
        services: &Services,
        stats: &mut ConversionStats,
    ) -> ConvertResult<()> {
        let messages: Vec<Message> = input::read_escaped_csv_records(&self.messages)?;
        for message in &messages {
            stats.records_read += 1;

            let contribution = services
                .contributions
                .find_one_by_data_source(&message.id, descriptor::MESSAGE_CONTRIBUTION, &self.ctx.dataset)
                .await?;
            let room = services
                .discourse_parts
                .find_one_by_data_source(&message.room_id, descriptor::ROOM, &self.ctx.dataset)
                .await?;

            match (contribution, room) {
                (Some(contribution), Some(room)) => {
                    services.discourse_parts.add_contribution(&contribution, &room).await?;
                    stats.relations_linked += 1;
                }
                (None, _) => {
                    debug!(message_id = %message.id, "Message was not imported, skipping");
                    stats.records_skipped += 1;
                }
                (Some(_), None) => {
                    warn!(message_id = %message.id, room_id = %message.room_id, "Unknown room, skipping");
                    stats.records_skipped += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(message_type: &str) -> Message {
        Message {
            id: "1".to_string(),
            created_time: None,
            message_type: message_type.to_string(),
            content: None,
            username: None,
            room_id: "r".to_string(),
        }
    }

    #[test]
    fn test_message_type_mapping() {
        assert_eq!(message("text").contribution_type(), ContributionType::ChatMessage);
        assert_eq!(message("Image").contribution_type(), ContributionType::ChatMessage);
        assert_eq!(message("private").contribution_type(), ContributionType::ChatMessage);
        assert_eq!(message("presence").contribution_type(), ContributionType::Interaction);
        assert_eq!(message("ready").contribution_type(), ContributionType::Interaction);
    }
}
