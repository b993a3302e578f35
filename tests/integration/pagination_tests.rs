//! Integration tests for `rel="next"` listing pagination

use crate::support::{
    article_html, home_html, mount_html, mount_next_page, next_link_listing_html, run, test_config,
};
use catalog_harvest::config::{Config, PaginationStrategy};
use catalog_harvest::crawler::RunOptions;
use catalog_harvest::storage::{SqliteStorage, Storage};
use catalog_harvest::Stage;
use std::path::Path;
use wiremock::{MockServer, ResponseTemplate};

const TOPS: &str = "/women/tops/cat/";

fn next_link_config(base_url: &str, db_path: &Path) -> Config {
    let mut config = test_config(base_url, db_path);
    config.site.pagination.strategy = PaginationStrategy::NextLink;
    config
}

fn page_href(page: u32) -> String {
    format!("{}?cid=1&page={}", TOPS, page)
}

fn listing(page: u32, last_page: u32) -> ResponseTemplate {
    let next = (page < last_page).then(|| page_href(page + 1));
    let ids = [i64::from(page) * 10 + 1, i64::from(page) * 10 + 2];
    ResponseTemplate::new(200).set_body_string(next_link_listing_html(&ids, next.as_deref()))
}

/// Mounts the home page, a three-page chain and every product page. Page 2
/// answers with `page_two`.
async fn mount_chain(server: &MockServer, page_two: ResponseTemplate) {
    mount_html(server, "/", home_html(&[(TOPS, 1)])).await;
    mount_next_page(server, TOPS, 1, 2, page_two).await;
    mount_next_page(server, TOPS, 1, 3, listing(3, 3)).await;
    mount_html(
        server,
        TOPS,
        next_link_listing_html(&[11, 12], Some(&page_href(2))),
    )
    .await;
    for id in [11, 12, 21, 22, 31, 32] {
        mount_html(server, &format!("/prd/{}", id), article_html(id, "Tee", Some("Grey"))).await;
    }
}

fn page_indices(storage: &SqliteStorage) -> Vec<u32> {
    storage
        .pages()
        .unwrap()
        .iter()
        .filter(|p| p.category_id == 1)
        .map(|p| p.page_index)
        .collect()
}

#[tokio::test]
async fn test_next_links_are_followed_to_the_end() {
    let server = MockServer::start().await;
    mount_chain(&server, listing(2, 3)).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = next_link_config(&server.uri(), &db_path);

    let summary = run(&config, RunOptions::default()).await.unwrap();
    assert_eq!(summary.failed_items(), 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(page_indices(&storage), vec![1, 2, 3]);

    let pages = storage.pages().unwrap();
    assert!(pages[0].url.ends_with("/women/tops/cat/?cid=1"));
    assert!(pages[2].url.ends_with("/women/tops/cat/?cid=1&page=3"));

    assert_eq!(storage.articles().unwrap().len(), 6);
    assert_eq!(storage.article_data().unwrap().len(), 6);
}

#[tokio::test]
async fn test_max_pages_caps_the_walk() {
    let server = MockServer::start().await;
    mount_html(&server, "/", home_html(&[(TOPS, 1)])).await;
    // No page 3: requesting it would record a stage 2 failure
    mount_next_page(&server, TOPS, 1, 2, listing(2, 3)).await;
    mount_html(
        &server,
        TOPS,
        next_link_listing_html(&[11, 12], Some(&page_href(2))),
    )
    .await;
    for id in [11, 12, 21, 22] {
        mount_html(&server, &format!("/prd/{}", id), article_html(id, "Tee", Some("Grey"))).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let mut config = next_link_config(&server.uri(), &db_path);
    config.site.pagination.max_pages = 2;

    run(&config, RunOptions::default()).await.unwrap();

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(page_indices(&storage), vec![1, 2]);
    assert!(storage.failures(Some(Stage::Pages)).unwrap().is_empty());
    assert_eq!(storage.articles().unwrap().len(), 4);
}

#[tokio::test]
async fn test_failed_next_page_keeps_stored_pages() {
    let server = MockServer::start().await;
    mount_chain(&server, listing(2, 3)).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = next_link_config(&server.uri(), &db_path);

    run(&config, RunOptions::default()).await.unwrap();
    assert_eq!(
        page_indices(&SqliteStorage::new(&db_path).unwrap()),
        vec![1, 2, 3]
    );

    // Page 2 is down for the whole second run
    server.reset().await;
    mount_chain(&server, ResponseTemplate::new(503)).await;

    let summary = run(&config, RunOptions::default()).await.unwrap();
    assert_eq!(summary.report(Stage::Pages).unwrap().tally.failed, 0);
    {
        let storage = SqliteStorage::new(&db_path).unwrap();
        assert_eq!(page_indices(&storage), vec![1, 2, 3]);

        let failures = storage.failures(Some(Stage::Pages)).unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].url.ends_with("/women/tops/cat/?cid=1&page=2"));
        assert_eq!(failures[0].attempts, 3);
    }

    // Once page 2 is back, its failure is cleared
    server.reset().await;
    mount_chain(&server, listing(2, 3)).await;

    run(&config, RunOptions::default()).await.unwrap();
    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(page_indices(&storage), vec![1, 2, 3]);
    assert!(storage.failures(Some(Stage::Pages)).unwrap().is_empty());
}
