//! Integration tests for ddb-api endpoints
//!
//! The store is an in-memory database seeded through the service layer;
//! requests go through the full router with `oneshot`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use ddb_api::{build_router, AppState};
use ddb_common::db::contribution::Contribution;
use ddb_common::db::discourse_part::DiscoursePart;
use ddb_common::db::init_memory_database;
use ddb_common::service::SourceRecord;
use ddb_common::{
    ContributionType, DataSourceType, DiscoursePartRelationType, DiscoursePartType,
    DiscourseRelationType, Services,
};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot` method

struct Fixture {
    app: Router,
    thread: DiscoursePart,
    folder: DiscoursePart,
    starter: Contribution,
    reply: Contribution,
    user_id: i64,
}

async fn setup(page_size: i64) -> Fixture {
    let services = Services::new(init_memory_database().await.unwrap());

    let discourse = services.discourses.create_or_get("CS 101").await.unwrap();
    let thread = services
        .discourse_parts
        .create_or_get_typed_named(&discourse, "Lifetimes", DiscoursePartType::Thread)
        .await
        .unwrap();
    let folder = services
        .discourse_parts
        .create_or_get_typed_named(&discourse, "hw1", DiscoursePartType::Folder)
        .await
        .unwrap();
    services
        .discourse_parts
        .create_relation(&folder, &thread, DiscoursePartRelationType::Subpart)
        .await
        .unwrap();

    let mut alice = services.users.create_or_get_user(&discourse, "alice").await.unwrap();
    services
        .users
        .update_details(&mut alice, Some("Alice Liddell"), Some("alice@example.edu"))
        .await
        .unwrap();

    let mut starter = services
        .contributions
        .create_typed(ContributionType::ThreadStarter, None)
        .await
        .unwrap();
    let question = services
        .contents
        .create_content(Some(&alice), Some("How do lifetimes work?"), Some("Lifetimes"), None)
        .await
        .unwrap();
    services.contents.add_revision(&mut starter, &question).await.unwrap();

    let mut reply = services.contributions.create_typed(ContributionType::Post, None).await.unwrap();
    let answer = services
        .contents
        .create_content(None, Some("Read chapter ten"), None, None)
        .await
        .unwrap();
    services.contents.add_revision(&mut reply, &answer).await.unwrap();

    for c in [&starter, &reply] {
        services.discourse_parts.add_contribution(c, &thread).await.unwrap();
    }
    services
        .contributions
        .create_discourse_relation(&starter, &reply, DiscourseRelationType::Reply)
        .await
        .unwrap();
    services
        .contributions
        .create_discourse_relation(&starter, &reply, DiscourseRelationType::Descendant)
        .await
        .unwrap();

    services
        .data_sources
        .add_source(
            &reply,
            &SourceRecord::new("c1", "contribution#post.id", DataSourceType::Piazza, "cs101"),
        )
        .await
        .unwrap();
    services
        .annotations
        .annotate(&reply, "sentiment", &[("polarity", "positive")])
        .await
        .unwrap();

    let app = build_router(AppState::new(services, page_size));
    Fixture {
        app,
        thread,
        folder,
        starter,
        reply,
        user_id: alice.id,
    }
}

/// Test helper: GET `uri` and return status plus JSON body
async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    (status, serde_json::from_slice(&bytes).expect("Should parse JSON"))
}

fn href(body: &Value, rel: &str) -> Option<String> {
    body["_links"][rel]["href"].as_str().map(str::to_string)
}

#[tokio::test]
async fn test_health_endpoint() {
    let fx = setup(50).await;
    let (status, body) = get(&fx.app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "ddb-api");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_discourses_and_parts_carry_links() {
    let fx = setup(50).await;
    let (status, body) = get(&fx.app, "/api/discourses").await;
    assert_eq!(status, StatusCode::OK);
    let discourses = body.as_array().unwrap();
    assert_eq!(discourses.len(), 1);
    assert_eq!(discourses[0]["name"], "CS 101");

    let self_href = href(&discourses[0], "self").unwrap();
    let parts_href = href(&discourses[0], "discourseParts").unwrap();
    let (status, discourse) = get(&fx.app, &self_href).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(discourse["name"], "CS 101");

    let (_, parts) = get(&fx.app, &parts_href).await;
    assert_eq!(parts.as_array().unwrap().len(), 2);

    let (status, part) = get(&fx.app, &format!("/api/discourse-parts/{}", fx.thread.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(part["part_type"], "THREAD");
    assert_eq!(href(&part, "discourse"), Some(self_href));
}

#[tokio::test]
async fn test_contribution_view_and_links() {
    let fx = setup(50).await;

    let (status, reply) = get(&fx.app, &format!("/api/contributions/{}", fx.reply.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["type"], "POST");
    assert_eq!(reply["content"], "Read chapter ten");
    assert!(reply["author_username"].is_null());
    let starter_href = format!("/api/contributions/{}", fx.starter.id);
    assert_eq!(href(&reply, "parentContribution"), Some(starter_href.clone()));
    assert_eq!(href(&reply, "threadStarter"), Some(starter_href));
    assert!(href(&reply, "contributionSources").is_some());
    assert!(href(&reply, "author").is_none());

    let (_, starter) = get(&fx.app, &format!("/api/contributions/{}", fx.starter.id)).await;
    assert_eq!(starter["type"], "THREAD_STARTER");
    assert_eq!(starter["title"], "Lifetimes");
    assert_eq!(starter["author_username"], "alice");
    assert_eq!(starter["author_realname"], "Alice Liddell");
    assert_eq!(starter["author_email"], "alice@example.edu");
    assert!(href(&starter, "parentContribution").is_none());
    assert_eq!(href(&starter, "author"), Some(format!("/api/users/{}", fx.user_id)));
}

#[tokio::test]
async fn test_contribution_sub_resources() {
    let fx = setup(50).await;
    let base = format!("/api/contributions/{}", fx.reply.id);

    let (status, parent) = get(&fx.app, &format!("{}/parent", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parent["id"], fx.starter.id);

    let (status, starter) = get(&fx.app, &format!("{}/thread-starter", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(starter["id"], fx.starter.id);

    let (_, sources) = get(&fx.app, &format!("{}/sources", base)).await;
    let sources = sources.as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["entity_source_id"], "c1");
    assert_eq!(sources[0]["source_type"], "PIAZZA");

    let (_, annotations) = get(&fx.app, &format!("{}/annotations", base)).await;
    let annotations = annotations.as_array().unwrap();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0]["annotation_type"], "sentiment");
    assert_eq!(annotations[0]["features"][0]["value"], "positive");

    let (status, body) =
        get(&fx.app, &format!("/api/contributions/{}/parent", fx.starter.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_part_contributions_page_is_clamped() {
    let fx = setup(1).await;
    let uri = format!("/api/discourse-parts/{}/contributions?page=99", fx.thread.id);
    let (status, body) = get(&fx.app, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["page"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(href(&body, "prev").is_some());
    assert!(href(&body, "next").is_none());
}

#[tokio::test]
async fn test_part_children_by_relation_type() {
    let fx = setup(50).await;
    let base = format!("/api/discourse-parts/{}/children", fx.folder.id);

    let (status, children) = get(&fx.app, &format!("{}?type=subpart", base)).await;
    assert_eq!(status, StatusCode::OK);
    let children = children.as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["id"], fx.thread.id);

    let (status, body) = get(&fx.app, &base).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_users_and_unknown_ids() {
    let fx = setup(50).await;

    let (status, user) = get(&fx.app, &format!("/api/users/{}", fx.user_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["username"], "alice");
    assert!(href(&user, "discourse").is_some());

    for uri in [
        "/api/discourses/9999",
        "/api/discourse-parts/9999",
        "/api/contributions/9999",
        "/api/users/9999",
    ] {
        let (status, body) = get(&fx.app, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
