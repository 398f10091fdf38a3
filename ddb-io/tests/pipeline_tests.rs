//! Run-level guarantees: re-imports are no-ops and unreadable inputs abort
//! before anything is written

use ddb_common::db::init_memory_database;
use ddb_common::Services;
use ddb_io::converters::{BazaarConverter, EdxConverter};
use ddb_io::{run_conversion, ConvertError};
use sqlx::SqlitePool;
use tempfile::TempDir;

const TABLES: &[&str] = &[
    "discourses",
    "discourse_parts",
    "users",
    "contributions",
    "contents",
    "discourse_relations",
    "discourse_part_contributions",
    "data_source_instances",
];

async fn snapshot(pool: &SqlitePool) -> Vec<i64> {
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap();
        counts.push(n);
    }
    counts
}

const FORUM: &str = r#"
{"_id":{"$oid":"t1"},"_type":"CommentThread","course_id":"MITx/6.002x","title":"Circuits","body":"Q","author_id":"1","author_username":"ann"}
{"_id":{"$oid":"c1"},"_type":"Comment","course_id":"MITx/6.002x","comment_thread_id":{"$oid":"t1"},"body":"A","author_id":"2","author_username":"ben"}
{"_id":{"$oid":"c2"},"_type":"Comment","course_id":"MITx/6.002x","comment_thread_id":{"$oid":"t1"},"parent_id":{"$oid":"c1"},"body":"B","author_id":"1","author_username":"ann"}
"#;

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let pool = init_memory_database().await.unwrap();
    let services = Services::new(pool.clone());
    let dir = TempDir::new().unwrap();
    let forum = dir.path().join("forum.json");
    std::fs::write(&forum, FORUM).unwrap();

    let converter = EdxConverter::new("6.002x", &forum);
    let first = run_conversion(&converter, &services).await.unwrap();
    let after_first = snapshot(&pool).await;

    let second = run_conversion(&converter, &services).await.unwrap();
    let after_second = snapshot(&pool).await;

    assert_eq!(after_first, after_second);
    assert!(first.entities_created > 0);
    assert_eq!(second.entities_created, 0);
    assert_eq!(second.already_imported, 3);
    // Relations are create-or-get, so phase two resolves the same links again
    assert_eq!(second.relations_linked, first.relations_linked);
}

#[tokio::test]
async fn test_message_without_id_is_skipped_on_every_run() {
    let pool = init_memory_database().await.unwrap();
    let services = Services::new(pool.clone());
    let dir = TempDir::new().unwrap();
    let rooms = dir.path().join("rooms.csv");
    std::fs::write(&rooms, "id,name,created_time,modified_time\nr1,Lobby,,\n").unwrap();
    let messages = dir.path().join("messages.csv");
    std::fs::write(
        &messages,
        "id,created_time,type,content,username,roomid\n,,text,hi,ann,r1\n2,,text,yo,ann,r1\n",
    )
    .unwrap();
    let converter = BazaarConverter::new("bazaar", "chat", &messages, &rooms);

    let first = run_conversion(&converter, &services).await.unwrap();
    let after_first = snapshot(&pool).await;
    let second = run_conversion(&converter, &services).await.unwrap();

    // Skipped once when mapping, once more when attaching to the room
    assert_eq!(first.records_skipped, 2);
    assert_eq!(second.records_skipped, 2);
    assert_eq!(snapshot(&pool).await, after_first);

    let contributions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contributions")
        .fetch_one(&pool)
        .await
        .unwrap();
    let contents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!((contributions, contents), (1, 1));
}

#[tokio::test]
async fn test_missing_input_aborts_before_writes() {
    let pool = init_memory_database().await.unwrap();
    let services = Services::new(pool.clone());
    let dir = TempDir::new().unwrap();
    let messages = dir.path().join("messages.csv");
    std::fs::write(&messages, "id,created_time,type,content,username,roomid\n1,,text,hi,ann,r1\n")
        .unwrap();
    let rooms = dir.path().join("rooms.csv");

    let result = run_conversion(
        &BazaarConverter::new("bazaar", "chat", &messages, &rooms),
        &services,
    )
    .await;

    match result {
        Err(ConvertError::InputNotReadable(path)) => assert_eq!(path, rooms),
        other => panic!("expected InputNotReadable, got {:?}", other),
    }
    assert!(snapshot(&pool).await.iter().all(|n| *n == 0));
}

#[tokio::test]
async fn test_malformed_json_is_an_error() {
    let pool = init_memory_database().await.unwrap();
    let services = Services::new(pool);
    let dir = TempDir::new().unwrap();
    let forum = dir.path().join("forum.json");
    std::fs::write(&forum, "{\"_id\": ").unwrap();

    let result = run_conversion(&EdxConverter::new("broken", &forum), &services).await;
    assert!(matches!(result, Err(ConvertError::Json(_))));
}
