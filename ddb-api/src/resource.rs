//! Hypermedia envelope
//!
//! Every resource is rendered as its fields plus a `_links` object mapping
//! relation names to `{"href": ...}`, e.g.
//!
//! ```json
//! {"id": 3, "name": "CS 101", "_links": {"self": {"href": "/api/discourses/3"}}}
//! ```

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Links(BTreeMap<&'static str, Link>);

impl Links {
    pub fn new(self_href: impl Into<String>) -> Self {
        Self::default().with("self", self_href)
    }

    pub fn with(mut self, rel: &'static str, href: impl Into<String>) -> Self {
        self.0.insert(rel, Link { href: href.into() });
        self
    }

    pub fn with_opt(self, rel: &'static str, href: Option<String>) -> Self {
        match href {
            Some(href) => self.with(rel, href),
            None => self,
        }
    }

    pub fn get(&self, rel: &str) -> Option<&Link> {
        self.0.get(rel)
    }
}

/// A body with its links
#[derive(Debug, Clone, Serialize)]
pub struct Resource<T> {
    #[serde(flatten)]
    pub body: T,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl<T> Resource<T> {
    pub fn new(body: T, links: Links) -> Self {
        Self { body, links }
    }
}

/// Paths of the exposed resources
pub mod href {
    use ddb_common::Id;

    pub fn discourse(id: Id) -> String {
        format!("/api/discourses/{}", id)
    }

    pub fn discourse_parts_of(id: Id) -> String {
        format!("/api/discourses/{}/parts", id)
    }

    pub fn discourse_part(id: Id) -> String {
        format!("/api/discourse-parts/{}", id)
    }

    pub fn part_contributions(id: Id, page: i64) -> String {
        format!("/api/discourse-parts/{}/contributions?page={}", id, page)
    }

    pub fn contribution(id: Id) -> String {
        format!("/api/contributions/{}", id)
    }

    pub fn contribution_sources(id: Id) -> String {
        format!("/api/contributions/{}/sources", id)
    }

    pub fn contribution_parent(id: Id) -> String {
        format!("/api/contributions/{}/parent", id)
    }

    pub fn contribution_thread_starter(id: Id) -> String {
        format!("/api/contributions/{}/thread-starter", id)
    }

    pub fn contribution_annotations(id: Id) -> String {
        format!("/api/contributions/{}/annotations", id)
    }

    pub fn user(id: Id) -> String {
        format!("/api/users/{}", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Body {
        id: i64,
    }

    #[test]
    fn test_links_render_under_underscore_links() {
        let resource = Resource::new(
            Body { id: 7 },
            Links::new(href::user(7)).with_opt("discourse", None).with("author", "/x"),
        );
        assert_eq!(
            serde_json::to_value(&resource).unwrap(),
            json!({
                "id": 7,
                "_links": {
                    "self": {"href": "/api/users/7"},
                    "author": {"href": "/x"}
                }
            })
        );
    }
}
