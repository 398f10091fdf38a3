//! Natural-key and idempotency properties of the service layer
//!
//! Every create-or-get operation, called N times with the same key, leaves
//! exactly one row behind.

use ddb_common::db::init_memory_database;
use ddb_common::db::types::{count_types, TypeKind};
use ddb_common::service::SourceRecord;
use ddb_common::{
    ContributionType, DataSourceType, DiscoursePartRelationType, DiscoursePartType,
    DiscourseRelationType, Services,
};
use sqlx::SqlitePool;

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn setup() -> (SqlitePool, Services) {
    let pool = init_memory_database().await.unwrap();
    let services = Services::new(pool.clone());
    (pool, services)
}

#[tokio::test]
async fn test_repeated_create_or_get_leaves_one_row() {
    let (pool, services) = setup().await;
    const N: usize = 5;

    for _ in 0..N {
        let discourse = services.discourses.create_or_get("community").await.unwrap();
        let forum = services
            .discourse_parts
            .create_or_get_typed(&discourse, DiscoursePartType::Forum)
            .await
            .unwrap();
        let thread = services
            .discourse_parts
            .create_or_get_typed_named(&discourse, "welcome", DiscoursePartType::Thread)
            .await
            .unwrap();
        services
            .discourse_parts
            .create_relation(&forum, &thread, DiscoursePartRelationType::Subpart)
            .await
            .unwrap();
        services.users.create_or_get_user(&discourse, "alice").await.unwrap();
    }

    assert_eq!(count(&pool, "discourses").await, 1);
    assert_eq!(count(&pool, "discourse_parts").await, 2);
    assert_eq!(count(&pool, "discourse_to_discourse_parts").await, 2);
    assert_eq!(count(&pool, "discourse_part_relations").await, 1);
    assert_eq!(count(&pool, "users").await, 1);

    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(count_types(&mut conn, TypeKind::DiscoursePart).await.unwrap(), 2);
    assert_eq!(count_types(&mut conn, TypeKind::DiscoursePartRelation).await.unwrap(), 1);
}

#[tokio::test]
async fn test_contribution_membership_and_relations_idempotent() {
    let (pool, services) = setup().await;
    let discourse = services.discourses.create_or_get("d").await.unwrap();
    let part = services
        .discourse_parts
        .create_or_get_typed(&discourse, DiscoursePartType::Thread)
        .await
        .unwrap();

    let a = services
        .contributions
        .create_typed(ContributionType::ThreadStarter, None)
        .await
        .unwrap();
    let b = services.contributions.create_typed(ContributionType::Post, None).await.unwrap();

    for _ in 0..3 {
        services.discourse_parts.add_contribution(&a, &part).await.unwrap();
        services.discourse_parts.add_contribution(&b, &part).await.unwrap();
        services
            .contributions
            .create_discourse_relation(&a, &b, DiscourseRelationType::Reply)
            .await
            .unwrap();
        services
            .contributions
            .create_discourse_relation(&a, &b, DiscourseRelationType::Descendant)
            .await
            .unwrap();
    }

    assert_eq!(count(&pool, "discourse_part_contributions").await, 2);
    // Same endpoints, different types: two relations
    assert_eq!(count(&pool, "discourse_relations").await, 2);

    let page = services.contributions.list_by_discourse_part(part.id, 10, 0).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 2);
    let parts = services.discourse_parts.find_by_contribution(&b).await.unwrap();
    assert_eq!(parts.len(), 1);
}

#[tokio::test]
async fn test_annotation_aggregate_is_lazy_and_single() {
    let (pool, services) = setup().await;
    let discourse = services.discourses.create_or_get("d").await.unwrap();
    let part = services
        .discourse_parts
        .create_or_get_typed(&discourse, DiscoursePartType::Chatroom)
        .await
        .unwrap();

    assert_eq!(count(&pool, "annotation_aggregates").await, 0);

    let first = services.annotations.create_typed_annotation("topic").await.unwrap();
    services.annotations.add_annotation(&part, &first).await.unwrap();
    assert_eq!(count(&pool, "annotation_aggregates").await, 1);

    let second = services.annotations.create_typed_annotation("mood").await.unwrap();
    services.annotations.add_annotation(&part, &second).await.unwrap();
    assert_eq!(count(&pool, "annotation_aggregates").await, 1);

    let unannotated = services.discourse_parts.find_without_annotation("topic").await.unwrap();
    assert!(unannotated.is_empty());
    let unannotated = services.discourse_parts.find_without_annotation("other").await.unwrap();
    assert_eq!(unannotated.len(), 1);
}

#[tokio::test]
async fn test_provenance_relocates_entities() {
    let (_pool, services) = setup().await;
    let discourse = services.discourses.create_or_get("d").await.unwrap();
    let part = services
        .discourse_parts
        .create_or_get_typed_named(&discourse, "room 7", DiscoursePartType::Chatroom)
        .await
        .unwrap();
    let user = services.users.create_or_get_user(&discourse, "carol").await.unwrap();

    services
        .data_sources
        .add_source(&part, &SourceRecord::new("7", "discourse_part#room.id", DataSourceType::Bazaar, "ds"))
        .await
        .unwrap();
    services
        .data_sources
        .add_source(&user, &SourceRecord::new("u9", "user#user.id", DataSourceType::Bazaar, "ds"))
        .await
        .unwrap();

    let found_part = services
        .discourse_parts
        .find_one_by_data_source("7", "discourse_part#room.id", "ds")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found_part.id, part.id);

    let found_user = services
        .users
        .find_one_by_data_source("u9", "user#user.id", "ds")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found_user.id, user.id);

    let instance = services
        .data_sources
        .find_data_source("u9", "user#user.id", "ds")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(instance.source_type, "BAZAAR");
}
