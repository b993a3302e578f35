//! Integration tests for the full pipeline
//!
//! These tests use wiremock to serve a small storefront and run all four
//! stages end-to-end against it.

use crate::support::{article_html, home_html, mount_category, mount_html, run, test_config};
use catalog_harvest::crawler::RunOptions;
use catalog_harvest::model::RunStatus;
use catalog_harvest::storage::{SqliteStorage, Storage, Table};
use catalog_harvest::{HarvestError, Stage};
use std::collections::HashSet;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Two categories: dresses (101, 102) on one page, shirts (103, 104, 105)
/// over two pages
async fn mount_storefront(server: &MockServer) {
    mount_html(
        server,
        "/",
        home_html(&[("/women/dresses/cat/", 1), ("/men/shirts/cat/", 2)]),
    )
    .await;
    mount_category(server, "/women/dresses/cat/", 1, 2, &[101, 102]).await;
    mount_category(server, "/men/shirts/cat/", 2, 2, &[103, 104, 105]).await;

    // The first request for 103 fails with a server error
    Mock::given(method("GET"))
        .and(path("/prd/103"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(server)
        .await;

    mount_html(server, "/prd/101", article_html(101, "Wrap Dress", Some("Red"))).await;
    mount_html(server, "/prd/102", article_html(102, "Midi Dress", Some("Navy"))).await;
    mount_html(server, "/prd/103", article_html(103, "Oxford Shirt", Some(" White "))).await;
    mount_html(server, "/prd/104", article_html(104, "Linen Shirt", Some("Sand"))).await;
    mount_html(server, "/prd/105", article_html(105, "Denim Shirt", None)).await;
}

#[tokio::test]
async fn test_full_pipeline() {
    let server = MockServer::start().await;
    mount_storefront(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = test_config(&server.uri(), &db_path);

    let summary = run(&config, RunOptions::default())
        .await
        .expect("Pipeline failed");

    assert_eq!(summary.stages.len(), 4);
    assert_eq!(summary.failed_items(), 0);
    assert_eq!(summary.report(Stage::ArticleData).unwrap().tally.attempted, 5);

    let storage = SqliteStorage::new(&db_path).unwrap();

    // Promotional and off-site links are not categories
    let categories = storage.categories().unwrap();
    let ids: Vec<i64> = categories.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2]);

    let pages = storage.pages().unwrap();
    assert_eq!(pages.len(), 3);
    assert!(pages
        .iter()
        .any(|p| p.category_id == 2 && p.page_index == 2 && p.url.ends_with("?cid=2&page=2")));

    let articles = storage.articles().unwrap();
    let article_ids: Vec<i64> = articles.iter().map(|a| a.id).collect();
    assert_eq!(article_ids, vec![101, 102, 103, 104, 105]);

    let data = storage.article_data().unwrap();
    assert_eq!(data.len(), 5);

    // The retried article is fully populated
    let retried = data.iter().find(|d| d.article_id == 103).unwrap();
    assert!(retried.missing_fields().is_empty());
    assert_eq!(retried.description.as_deref(), Some("oxford shirt"));
    assert_eq!(retried.colour.as_deref(), Some("white"));
    assert_eq!(retried.tags, vec!["regular fit", "button fastening"]);
    assert_eq!(retried.materials, vec!["main: 100% cotton", "lining: 100% polyester"]);
    assert_eq!(retried.images_urls.len(), 2);

    // A page without colour still yields a record
    let no_colour = data.iter().find(|d| d.article_id == 105).unwrap();
    assert_eq!(no_colour.colour, None);
    assert_eq!(no_colour.description.as_deref(), Some("denim shirt"));

    assert!(storage.failures(None).unwrap().is_empty());

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, summary.run_id);
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_pages_reference_known_categories() {
    let server = MockServer::start().await;
    mount_storefront(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = test_config(&server.uri(), &db_path);
    run(&config, RunOptions::default()).await.unwrap();

    let storage = SqliteStorage::new(&db_path).unwrap();
    let category_ids: HashSet<i64> = storage.categories().unwrap().iter().map(|c| c.id).collect();
    for page in storage.pages().unwrap() {
        assert!(
            category_ids.contains(&page.category_id),
            "page {} points at unknown category {}",
            page.url,
            page.category_id
        );
    }
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    mount_storefront(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = test_config(&server.uri(), &db_path);

    run(&config, RunOptions::default()).await.unwrap();
    let first = SqliteStorage::new(&db_path).unwrap().load_table(Table::ArticlesData).unwrap();

    run(&config, RunOptions::default()).await.unwrap();
    let storage = SqliteStorage::new(&db_path).unwrap();
    let second = storage.load_table(Table::ArticlesData).unwrap();

    assert_eq!(first, second);
    assert_eq!(storage.count_rows(Table::Categories).unwrap(), 2);
    assert_eq!(storage.count_rows(Table::Pages).unwrap(), 3);
    assert_eq!(storage.count_rows(Table::Articles).unwrap(), 5);
    assert_eq!(storage.count_rows(Table::Runs).unwrap(), 2);
}

#[tokio::test]
async fn test_empty_category_yields_no_articles() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        home_html(&[("/women/dresses/cat/", 1), ("/women/archive/cat/", 3)]),
    )
    .await;
    mount_category(&server, "/women/dresses/cat/", 1, 2, &[101]).await;
    mount_category(&server, "/women/archive/cat/", 3, 2, &[]).await;
    mount_html(&server, "/prd/101", article_html(101, "Wrap Dress", Some("Red"))).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = test_config(&server.uri(), &db_path);

    let summary = run(&config, RunOptions::default()).await.unwrap();
    assert_eq!(summary.failed_items(), 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.categories().unwrap().len(), 2);

    let pages = storage.pages().unwrap();
    assert!(pages.iter().all(|p| p.category_id == 1));
    assert_eq!(storage.articles().unwrap().len(), 1);
    assert_eq!(storage.article_data().unwrap().len(), 1);
}

#[tokio::test]
async fn test_no_categories_is_fatal() {
    let server = MockServer::start().await;
    mount_html(&server, "/", "<html><body><p>Closed</p></body></html>".to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = test_config(&server.uri(), &db_path);

    let result = run(&config, RunOptions::default()).await;
    assert!(matches!(result, Err(HarvestError::NoCategories { .. })));

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_unreachable_home_falls_back_to_extra_categories() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_category(&server, "/women/sale/cat/", 7, 2, &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let mut config = test_config(&server.uri(), &db_path);
    config.extra_categories = vec![catalog_harvest::config::CategoryEntry {
        id: 7,
        url: format!("{}/women/sale/cat/?cid=7", server.uri()),
    }];

    let summary = run(&config, RunOptions::default()).await.unwrap();
    assert_eq!(summary.report(Stage::Categories).unwrap().tally.failed, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.categories().unwrap().len(), 1);

    let failures = storage.failures(Some(Stage::Categories)).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].attempts, 3);
    assert_eq!(failures[0].error, "HTTP status 503");
}

#[tokio::test]
async fn test_cross_listed_article_keeps_both_urls() {
    let server = MockServer::start().await;
    mount_html(&server, "/", home_html(&[("/women/dresses/cat/", 1)])).await;

    // Product 401 is listed twice, once under its sale URL
    mount_html(
        &server,
        "/women/dresses/cat/",
        r#"<html><body><section>
        <article data-product-id="401"><a href="/prd/401">Tea Dress</a></article>
        <article data-product-id="401"><a href="/sale/prd/401">Tea Dress</a></article>
        <article data-product-id="402"><a href="/prd/402">Maxi Dress</a></article>
        </section></body></html>"#
            .to_string(),
    )
    .await;
    mount_html(&server, "/prd/401", article_html(401, "Tea Dress", Some("Green"))).await;
    mount_html(&server, "/sale/prd/401", article_html(401, "Tea Dress", Some("Green"))).await;
    mount_html(&server, "/prd/402", article_html(402, "Maxi Dress", Some("Black"))).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = test_config(&server.uri(), &db_path);

    let summary = run(&config, RunOptions::default()).await.unwrap();
    assert_eq!(summary.failed_items(), 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.pages().unwrap().len(), 1);

    let articles = storage.articles().unwrap();
    let cross_listed: Vec<&str> = articles
        .iter()
        .filter(|a| a.id == 401)
        .map(|a| a.url.as_str())
        .collect();
    assert_eq!(cross_listed.len(), 2);
    assert!(cross_listed.iter().any(|url| url.ends_with("/prd/401")));
    assert!(cross_listed.iter().any(|url| url.ends_with("/sale/prd/401")));
    assert_eq!(articles.len(), 3);

    let data = storage.article_data().unwrap();
    assert_eq!(data.iter().filter(|d| d.article_id == 401).count(), 2);
}
