//! Mock storefront markup and configuration shared by the integration tests

use catalog_harvest::config::Config;
use catalog_harvest::crawler::{Coordinator, RunOptions, RunSummary};
use catalog_harvest::HarvestError;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
pub fn test_config(base_url: &str, db_path: &Path) -> Config {
    let mut config = Config::default();
    config.site.base_url = format!("{}/", base_url);
    config.fetcher.concurrency_limit = 4;
    config.fetcher.backoff_factor = 0.0;
    config.fetcher.max_retries = 3;
    config.fetcher.request_timeout_secs = 5;
    config.pipeline.write_batch_size = 16;
    config.output.database_path = db_path.to_string_lossy().into_owned();
    config
}

pub async fn run(config: &Config, options: RunOptions) -> Result<RunSummary, HarvestError> {
    let coordinator = Coordinator::new(config.clone(), "test".to_string(), CancellationToken::new())?;
    coordinator.run(options).await
}

pub fn home_html(links: &[(&str, i64)]) -> String {
    let anchors: String = links
        .iter()
        .map(|(path, cid)| format!(r#"<li><a href="{}?cid={}">Category {}</a></li>"#, path, cid, cid))
        .collect();
    format!(
        r#"<html><body><nav><ul>{}
        <li><a href="/women/new-in/cat/?cid=900">New in</a></li>
        <li><a href="https://elsewhere.example/cat/?cid=901">Partner</a></li>
        </ul></nav></body></html>"#,
        anchors
    )
}

pub fn listing_html(viewed: u64, total: u64, ids: &[i64]) -> String {
    let articles: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<article data-product-id="{id}"><a href="/prd/{id}">Product {id}</a></article>"#,
                id = id
            )
        })
        .collect();
    format!(
        r#"<html><body><p>You've viewed {} of {} products</p><section>{}</section></body></html>"#,
        viewed, total, articles
    )
}

pub fn article_html(id: i64, name: &str, colour: Option<&str>) -> String {
    let images = match colour {
        Some(colour) => format!(
            r#"[{{"url":"https://img.example/{id}-1.jpg","colour":"{colour}"}},{{"url":"https://img.example/{id}-2.jpg","colour":""}}]"#,
            id = id,
            colour = colour
        ),
        None => format!(r#"[{{"url":"https://img.example/{}-1.jpg"}}]"#, id),
    };
    format!(
        r#"<html><head><script>window.shop.pdp.config.product = {{"name":"{name}","images":{images}}};
</script></head><body><h1>{name}</h1>
<div id="productDescriptionDetails"><ul><li>Regular fit</li><li>Button fastening</li></ul></div>
<div id="productDescriptionAboutMe">Main: 100% Cotton
Lining: 100% Polyester</div></body></html>"#,
        name = name,
        images = images
    )
}

pub async fn mount_html(server: &MockServer, url_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts a category whose listing pages show `per_page` of `ids` each
///
/// Later pages are mounted before the first so the `page` matcher wins over
/// the plain category matcher.
pub async fn mount_category(server: &MockServer, url_path: &str, cid: i64, per_page: usize, ids: &[i64]) {
    let total = ids.len() as u64;
    let chunks: Vec<&[i64]> = if ids.is_empty() {
        vec![ids]
    } else {
        ids.chunks(per_page).collect()
    };
    let viewed = chunks[0].len() as u64;

    for (index, chunk) in chunks.iter().enumerate().skip(1) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .and(query_param("cid", cid.to_string()))
            .and(query_param("page", (index + 1).to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_html(viewed, total, chunk)),
            )
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path(url_path))
        .and(query_param("cid", cid.to_string()))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_html(viewed, total, chunks[0])),
        )
        .mount(server)
        .await;
}

/// A listing page without a product counter, linking to `next` with
/// `rel="next"` when given
pub fn next_link_listing_html(ids: &[i64], next: Option<&str>) -> String {
    let articles: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<article data-product-id="{id}"><a href="/prd/{id}">Product {id}</a></article>"#,
                id = id
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<a rel="next" href="{}">Next</a>"#, href))
        .unwrap_or_default();
    format!(
        r#"<html><body><section>{}</section><nav>{}</nav></body></html>"#,
        articles, next
    )
}

/// Mounts page `page` (2 or later) of a `rel="next"` category
pub async fn mount_next_page(
    server: &MockServer,
    url_path: &str,
    cid: i64,
    page: u32,
    response: ResponseTemplate,
) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .and(query_param("cid", cid.to_string()))
        .and(query_param("page", page.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}
