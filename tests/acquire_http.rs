//! HTTP-level acquisition tests against a wiremock forum.
//!
//! Only paths that never back off are exercised here, since wiremock
//! runs on real time.

use std::collections::BTreeMap;

use forum_snapshot::error::AppError;
use forum_snapshot::models::{Community, Config, Endpoints, FetchConfig, RawDataset};
use forum_snapshot::pipeline::{Acquirer, run_acquire};
use forum_snapshot::services::HttpClient;
use forum_snapshot::storage::{LocalStorage, Snapshot};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_json(server: &MockServer, route: &str, query: &[(&str, &str)], body: Value) {
    let mut mock = Mock::given(method("GET")).and(path(route));
    for (key, value) in query {
        mock = mock.and(query_param(*key, *value));
    }
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, route: &str, first_page: Value, empty_page: Value) {
    mount_json(server, route, &[("page", "0"), ("period", "all"), ("order", "desc")], first_page).await;
    mount_json(server, route, &[("page", "1")], empty_page).await;
}

/// alice and bob; topic 1 has one post, topic 2 is gone; only alice has a
/// public profile and likes.
async fn forum() -> MockServer {
    let server = MockServer::start().await;

    mount_listing(
        &server,
        "/directory_items.json",
        json!({ "directory_items": [
            { "likes_received": 4, "user": { "id": 1, "username": "alice" } },
            { "likes_received": 0, "user": { "id": 2, "username": "bob" } }
        ] }),
        json!({ "directory_items": [] }),
    )
    .await;

    mount_listing(
        &server,
        "/latest.json",
        json!({ "topic_list": { "topics": [
            { "id": 1, "category_id": 5, "tags": ["governance"], "posts_count": 1 },
            { "id": 2, "category_id": 5, "posts_count": 3 }
        ] } }),
        json!({ "topic_list": { "topics": [] } }),
    )
    .await;

    mount_json(
        &server,
        "/t/1.json",
        &[("page", "1")],
        json!({ "post_stream": { "posts": [
            { "id": 100, "post_number": 1, "username": "alice", "topic_id": 1 }
        ] } }),
    )
    .await;

    mount_json(
        &server,
        "/user_actions.json",
        &[("username", "alice"), ("offset", "0"), ("filter", "1")],
        json!({ "user_actions": [
            { "topic_id": 1, "post_number": 1, "acting_username": "alice" }
        ] }),
    )
    .await;
    mount_json(
        &server,
        "/user_actions.json",
        &[("username", "alice"), ("offset", "30")],
        json!({ "user_actions": [] }),
    )
    .await;
    mount_json(
        &server,
        "/user_actions.json",
        &[("username", "bob"), ("offset", "0")],
        json!({ "user_actions": [] }),
    )
    .await;

    mount_json(
        &server,
        "/u/alice.json",
        &[],
        json!({ "user": { "username": "alice" }, "user_badges": [{ "id": 3 }] }),
    )
    .await;
    mount_json(&server, "/u/bob.json", &[], json!({ "user": { "username": "bob" } })).await;

    server
}

fn acquirer(fetch: FetchConfig) -> Acquirer<HttpClient> {
    let client = HttpClient::new(&fetch, &BTreeMap::new()).unwrap();
    Acquirer::new(client, fetch).unwrap()
}

#[tokio::test]
async fn test_acquire_full_forum() {
    let server = forum().await;

    let dataset = acquirer(FetchConfig::default())
        .acquire(&server.uri(), &Endpoints::default())
        .await
        .unwrap();

    assert_eq!(dataset.users.len(), 2);
    assert_eq!(dataset.users[0].username(), "alice");
    assert_eq!(dataset.topics.len(), 2);

    let first = &dataset.posts[&1];
    assert_eq!(first.category_id, Some(5));
    assert_eq!(first.tags.as_deref(), Some(&["governance".to_string()][..]));
    assert_eq!(first.posts.len(), 1);

    // Topic 2 answers 404: recorded without posts, run continues.
    assert!(dataset.posts[&2].posts.is_empty());

    assert_eq!(dataset.likes.len(), 1);
    assert_eq!(dataset.likes[0].username, "alice");
    assert_eq!(dataset.likes[0].actions.len(), 1);

    // bob's profile has no badges and is treated as hidden.
    assert_eq!(dataset.profiles.len(), 1);
    assert_eq!(dataset.profiles[0].username, "alice");
    assert_eq!(dataset.profiles[0].document["user_badges"][0]["id"], 3);
}

#[tokio::test]
async fn test_community_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/directory_items.json"))
        .and(header("x-session", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "directory_items": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "topic_list": { "topics": [] } })),
        )
        .mount(&server)
        .await;

    let fetch = FetchConfig::default();
    let headers = BTreeMap::from([("x-session".to_string(), "abc".to_string())]);
    let client = HttpClient::new(&fetch, &headers).unwrap();

    let dataset = Acquirer::new(client, fetch)
        .unwrap()
        .acquire(&server.uri(), &Endpoints::default())
        .await
        .unwrap();

    assert_eq!(dataset, RawDataset::default());
    server.verify().await;
}

#[tokio::test]
async fn test_server_error_with_no_retry_budget_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/directory_items.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let fetch = FetchConfig {
        max_attempts: 1,
        ..FetchConfig::default()
    };
    let err = acquirer(fetch)
        .acquire(&server.uri(), &Endpoints::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::RetriesExhausted { attempts: 1, .. }));
    server.verify().await;
}

#[tokio::test]
async fn test_invalid_json_is_unexpected_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/directory_items.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = acquirer(FetchConfig::default())
        .acquire(&server.uri(), &Endpoints::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UnexpectedPayload { .. }));
}

#[tokio::test]
async fn test_run_acquire_and_store_snapshot() {
    let server = forum().await;
    let dir = tempfile::tempdir().unwrap();

    let community = Community {
        name: "demo".to_string(),
        base_url: server.uri(),
        headers: BTreeMap::new(),
    };
    let config = Config {
        communities: vec![community.clone()],
        ..Config::default()
    };

    let (dataset, stats) = run_acquire(&config, &community).await.unwrap();
    assert_eq!(stats.community, "demo");
    assert_eq!(stats.user_count, 2);
    assert_eq!(stats.topic_count, 2);
    assert_eq!(stats.post_count, 1);
    assert_eq!(stats.liking_user_count, 1);
    assert_eq!(stats.profile_count, 1);

    let storage = LocalStorage::new(dir.path());
    storage
        .write_snapshot(&Snapshot { stats, dataset })
        .await
        .unwrap();

    let loaded = storage.load_snapshot("demo").await.unwrap().unwrap();
    loaded.verify().unwrap();
    assert_eq!(loaded.dataset.post_count(), 1);
}
