mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn collections_from_schema_and_bare_directories() {
    let env = common::TestEnv::start();
    let server = env.server();
    common::login(&server).await;

    server
        .put("/api/outstatic/collections/posts")
        .json(&json!({ "name": "ignored", "sort": "titleAsc" }))
        .await
        .assert_status_ok();
    env.write_file("outstatic/content/notes/a.md", "---\ntitle: A\n---\n")
        .await;

    let collections: Value = server.get("/api/outstatic/collections").await.json();
    let names: Vec<&str> = collections
        .as_array()
        .map(|c| c.iter().filter_map(|s| s["name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["notes", "posts"]);

    let posts: Value = server.get("/api/outstatic/collections/posts").await.json();
    assert_eq!(posts["name"], "posts");
    assert_eq!(posts["sort"], "titleAsc");
    assert_eq!(posts["kind"]["type"], "list");

    server
        .get("/api/outstatic/collections/missing")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn schema_redefining_builtin_field_is_rejected() {
    let env = common::TestEnv::start();
    let server = env.server();
    common::login(&server).await;

    server
        .put("/api/outstatic/collections/posts")
        .json(&json!({
            "name": "posts",
            "fields": { "title": { "title": "Title", "type": "string" } }
        }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn singleton_resolves_by_fixed_slug_only() {
    let env = common::TestEnv::start();
    let server = env.server();
    common::login(&server).await;

    server
        .put("/api/outstatic/collections/about")
        .json(&json!({ "name": "about", "kind": { "type": "singleton", "slug": "about" } }))
        .await
        .assert_status_ok();

    server
        .put("/api/outstatic/collections/about/documents/team")
        .json(&json!({ "frontMatter": { "title": "Team" } }))
        .await
        .assert_status_bad_request();

    server
        .put("/api/outstatic/collections/about/documents/about")
        .json(&json!({ "frontMatter": { "title": "About us", "status": "published" }, "body": "Hi" }))
        .await
        .assert_status_ok();

    let without_slug: Value = server.get("/api/outstatic/content/about").await.json();
    assert_eq!(without_slug["frontMatter"]["title"], "About us");
    assert!(without_slug["html"].as_str().is_some());

    let by_slug: Value = server.get("/api/outstatic/content/about/about").await.json();
    assert_eq!(by_slug["slug"], "about");

    server
        .get("/api/outstatic/content/about/other")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn deleting_collection_removes_its_documents() {
    let env = common::TestEnv::start();
    let server = env.server();
    common::login(&server).await;
    common::create_collection(&server, "posts").await;
    server
        .put("/api/outstatic/collections/posts/documents/hello")
        .json(&json!({ "frontMatter": { "title": "Hello" } }))
        .await
        .assert_status_ok();

    server
        .delete("/api/outstatic/collections/posts")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert!(!env.exists("outstatic/content/posts"));
    server
        .get("/api/outstatic/collections/posts/documents")
        .await
        .assert_status_not_found();
    server
        .delete("/api/outstatic/collections/posts")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn admin_pages_render_collections_and_documents() {
    let env = common::TestEnv::start();
    let server = env.server();
    common::login(&server).await;
    env.write_file(
        "outstatic/content/posts/good.md",
        "---\ntitle: Good post\nstatus: published\n---\n\nSome *text*",
    )
    .await;
    env.write_file("outstatic/content/posts/broken.md", "---\ntitle: [\n---\n")
        .await;

    let dashboard = server.get("/outstatic").await;
    dashboard.assert_status_ok();
    assert!(dashboard.text().contains(r#"href="/outstatic/posts""#));

    let listing = server.get("/outstatic/posts").await;
    listing.assert_status_ok();
    let html = listing.text();
    assert!(html.contains("Good post"));
    assert!(html.contains(">invalid</span>"));

    let page = server.get("/outstatic/posts/good").await;
    page.assert_status_ok();
    assert!(page.text().contains("<em>text</em>"));

    server
        .get("/outstatic/posts/missing")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn unknown_public_collection_is_not_found() {
    let env = common::TestEnv::start();
    let server = env.server();

    server
        .get("/api/outstatic/content/nothing")
        .await
        .assert_status_not_found();
}
