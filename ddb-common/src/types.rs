//! Controlled vocabularies
//!
//! Type rows are stored by string in the type registry tables (see
//! [`crate::db::types`]). The enums below name the values the converters
//! use; any other string is still accepted by the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| format!("Unknown {}: {}", stringify!($name), s))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }
    };
}

vocabulary! {
    /// Kind of authored unit
    ContributionType {
        Post => "POST",
        ThreadStarter => "THREAD_STARTER",
        Comment => "COMMENT",
        Response => "RESPONSE",
        Question => "QUESTION",
        Note => "NOTE",
        Tweet => "TWEET",
        ChatMessage => "CHAT_MESSAGE",
        Interaction => "INTERACTION",
        GoalNote => "GOAL_NOTE",
        NodeComment => "NODE_COMMENT",
        TalkPageComment => "TALK_PAGE_COMMENT",
        WikiEdit => "WIKI_EDIT",
    }
}

impl ContributionType {
    /// Contribution types whose representation links to a parent contribution
    pub fn has_parent(&self) -> bool {
        matches!(
            self,
            ContributionType::Post | ContributionType::GoalNote | ContributionType::NodeComment
        )
    }

    /// Contribution types whose representation links to a thread starter
    pub fn has_thread_starter(&self) -> bool {
        matches!(self, ContributionType::Post)
    }
}

vocabulary! {
    /// Kind of discourse subdivision
    DiscoursePartType {
        Forum => "FORUM",
        Thread => "THREAD",
        Chatroom => "CHATROOM",
        Course => "COURSE",
        Folder => "FOLDER",
        LearningGoal => "LEARNING_GOAL",
        Competence => "COMPETENCE",
        TalkPage => "TALK_PAGE",
        Discussion => "DISCUSSION",
        TwitterArchive => "TWITTER_ARCHIVE",
    }
}

vocabulary! {
    /// Directed edge between two contributions
    DiscourseRelationType {
        Reply => "REPLY",
        Descendant => "DESCENDANT",
        Comment => "COMMENT",
        Response => "RESPONSE",
    }
}

vocabulary! {
    /// Directed edge between two discourse parts
    DiscoursePartRelationType {
        Subpart => "SUBPART",
        TalkPageHasDiscussion => "TALK_PAGE_HAS_DISCUSSION",
        LearningGoalHasCompetence => "LEARNING_GOAL_HAS_COMPETENCE",
        CourseHasThread => "COURSE_HAS_THREAD",
    }
}

vocabulary! {
    /// Platform a provenance record was imported from
    DataSourceType {
        Edx => "EDX",
        Bazaar => "BAZAAR",
        Piazza => "PIAZZA",
        Prosolo => "PROSOLO",
        Tags => "TAGS",
        Wikipedia => "WIKIPEDIA",
        Other => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_string() {
        for t in ContributionType::ALL {
            assert_eq!(t.as_str().parse::<ContributionType>().unwrap(), *t);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("reply".parse::<DiscourseRelationType>(), Ok(DiscourseRelationType::Reply));
        assert_eq!(" Thread ".parse::<DiscoursePartType>(), Ok(DiscoursePartType::Thread));
    }

    #[test]
    fn test_unknown_value_rejected() {
        assert!("BANANA".parse::<DataSourceType>().is_err());
    }

    #[test]
    fn test_serde_uses_screaming_case() {
        let json = serde_json::to_string(&ContributionType::ThreadStarter).unwrap();
        assert_eq!(json, "\"THREAD_STARTER\"");
    }

    #[test]
    fn test_link_rules() {
        assert!(ContributionType::Post.has_parent());
        assert!(ContributionType::Post.has_thread_starter());
        assert!(ContributionType::GoalNote.has_parent());
        assert!(!ContributionType::GoalNote.has_thread_starter());
        assert!(!ContributionType::Tweet.has_parent());
    }
}
