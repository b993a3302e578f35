//! Integration tests for partial runs: --from-stage, --only-missing and
//! --retry-failed

use crate::support::{article_html, home_html, mount_category, mount_html, run, test_config};
use catalog_harvest::crawler::RunOptions;
use catalog_harvest::storage::{SqliteStorage, Storage};
use catalog_harvest::Stage;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_retry_failed_refetches_only_failures() {
    let server = MockServer::start().await;
    mount_html(&server, "/", home_html(&[("/women/dresses/cat/", 1)])).await;
    mount_category(&server, "/women/dresses/cat/", 1, 4, &[201, 202]).await;
    mount_html(&server, "/prd/201", article_html(201, "Slip Dress", Some("Black"))).await;

    // 202 is missing during the first run only
    Mock::given(method("GET"))
        .and(path("/prd/202"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/prd/202"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(article_html(202, "Shirt Dress", Some("Olive"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = test_config(&server.uri(), &db_path);

    let first = run(&config, RunOptions::default()).await.unwrap();
    assert_eq!(first.report(Stage::ArticleData).unwrap().tally.failed, 1);
    {
        let storage = SqliteStorage::new(&db_path).unwrap();
        assert_eq!(storage.article_data().unwrap().len(), 1);
        let failures = storage.failures(Some(Stage::ArticleData)).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].item_id, Some(202));
        // Permanent failures are not retried
        assert_eq!(failures[0].attempts, 1);
    }

    let retry = run(&config, RunOptions::retry_failed()).await.unwrap();
    assert_eq!(retry.stages.len(), 1);
    let report = retry.report(Stage::ArticleData).unwrap();
    assert_eq!(report.tally.attempted, 1);
    assert_eq!(report.tally.succeeded, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.article_data().unwrap().len(), 2);
    assert!(storage.failures(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_from_stage_with_only_missing() {
    let server = MockServer::start().await;
    mount_html(&server, "/", home_html(&[("/men/coats/cat/", 4)])).await;
    mount_category(&server, "/men/coats/cat/", 4, 4, &[301, 302, 303]).await;
    for (id, name) in [(301, "Parka"), (302, "Trench Coat"), (303, "Overcoat")] {
        mount_html(&server, &format!("/prd/{}", id), article_html(id, name, Some("Khaki"))).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = test_config(&server.uri(), &db_path);

    run(&config, RunOptions::default()).await.unwrap();

    let complete = RunOptions {
        first_stage: Stage::ArticleData,
        only_missing: true,
        retry_failed: false,
    };
    let summary = run(&config, complete).await.unwrap();
    assert_eq!(summary.stages.len(), 1);
    assert_eq!(summary.report(Stage::ArticleData).unwrap().tally.attempted, 0);

    // Stage 3 onwards reads pages from the database and re-collects articles
    let from_articles = RunOptions {
        first_stage: Stage::Articles,
        ..RunOptions::default()
    };
    let summary = run(&config, from_articles).await.unwrap();
    assert!(summary.report(Stage::Categories).is_none());
    assert_eq!(summary.report(Stage::Articles).unwrap().tally.attempted, 1);
    assert_eq!(summary.report(Stage::ArticleData).unwrap().tally.attempted, 3);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.article_data().unwrap().len(), 3);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.first_stage, Stage::Articles);
}
