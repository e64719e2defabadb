//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use serde_json::{json, Value};
use soup_scraper::config::{load_config, CrawlerConfig, ProxyConfig};
use soup_scraper::crawler::{
    page_function_async, page_function_fn, run_crawl, Coordinator, CrawlSettings, NoProxy,
    PageFunction,
};
use soup_scraper::functions::builtin_page_function;
use soup_scraper::output::{CrawlStats, MemorySink};
use soup_scraper::{ExtractionContext, RequestOutcome};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves `body` as HTML at `route`, expecting exactly `hits` requests
async fn mount_page(server: &MockServer, route: &str, body: String, hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .expect(hits)
        .mount(server)
        .await;
}

fn links_page(targets: &[String]) -> String {
    let anchors: String = targets
        .iter()
        .map(|t| format!(r#"<a href="{}">link</a>"#, t))
        .collect();
    format!("<html><head><title>t</title></head><body>{}</body></html>", anchors)
}

fn same_host_pattern(server: &MockServer) -> String {
    format!("{}/.*", regex::escape(&server.uri()))
}

fn crawler_config(seeds: Vec<String>) -> CrawlerConfig {
    let mut config = CrawlerConfig::with_start_urls(seeds);
    config.request_timeout = 5;
    config
}

fn url_routine() -> Arc<dyn PageFunction> {
    page_function_fn(|ctx| Ok(Some(json!({ "url": ctx.url().as_str() }))))
}

async fn crawl(
    config: &CrawlerConfig,
    routine: Arc<dyn PageFunction>,
) -> (Coordinator, CrawlStats, Arc<MemorySink>) {
    let settings = CrawlSettings::from_config(config).unwrap();
    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(settings, routine, Arc::new(NoProxy)).unwrap();
    let stats = coordinator
        .run(sink.clone(), CancellationToken::new())
        .await
        .unwrap();
    (coordinator, stats, sink)
}

#[tokio::test]
async fn test_end_to_end_depth_bounded_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        links_page(&["/p1".into(), format!("{}/p2", base), "mailto:x@y.com".into()]),
        1,
    )
    .await;
    mount_page(&server, "/p1", links_page(&["/".into(), "/p3".into()]), 1).await;
    mount_page(&server, "/p2", links_page(&["/".into(), "p3".into()]), 1).await;
    mount_page(&server, "/p3", links_page(&["/p4".into()]), 1).await;
    mount_page(&server, "/p4", links_page(&[]), 0).await;

    let mut config = crawler_config(vec![format!("{}/", base)]);
    config.link_selector = Some("a".to_string());
    config.link_patterns = vec![same_host_pattern(&server)];
    config.max_depth = Some(2);

    let (coordinator, stats, sink) = crawl(&config, url_routine()).await;

    let expected: Vec<String> = ["/", "/p1", "/p2", "/p3"]
        .iter()
        .map(|p| format!("{}{}", base, p))
        .collect();
    assert_eq!(coordinator.frontier().handled_urls(), expected);
    assert_eq!(stats.handled, 4);
    assert_eq!(stats.extracted, 4);
    assert_eq!(stats.records_pushed, 4);
    assert!(!stats.cancelled);

    let p3 = sink
        .records()
        .into_iter()
        .find(|r| r.url.ends_with("/p3"))
        .unwrap();
    assert_eq!(p3.depth, 2);
}

#[tokio::test]
async fn test_fetch_failure_does_not_stop_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/a", links_page(&[]), 1).await;
    mount_page(&server, "/c", links_page(&[]), 1).await;

    let a = format!("{}/a", base);
    let b = "http://127.0.0.1:1/b".to_string();
    let c = format!("{}/c", base);
    let config = crawler_config(vec![a.clone(), b.clone(), c.clone()]);

    let (coordinator, stats, sink) = crawl(&config, url_routine()).await;
    let frontier = coordinator.frontier();

    assert_eq!(frontier.handled_count(), 3);
    assert_eq!(frontier.outcome_of(&a), Some(RequestOutcome::Extracted));
    assert_eq!(frontier.outcome_of(&b), Some(RequestOutcome::FetchFailed));
    assert_eq!(frontier.outcome_of(&c), Some(RequestOutcome::Extracted));
    assert_eq!(stats.fetch_failures, 1);
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn test_extraction_failure_does_not_stop_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    for route in ["/a", "/b", "/c"] {
        mount_page(&server, route, links_page(&[]), 1).await;
    }

    let routine = page_function_fn(|ctx| {
        if ctx.url().path() == "/b" {
            anyhow::bail!("layout changed");
        }
        Ok(Some(json!({ "url": ctx.url().as_str() })))
    });
    let seeds: Vec<String> = ["/a", "/b", "/c"]
        .iter()
        .map(|p| format!("{}{}", base, p))
        .collect();

    let (coordinator, stats, sink) = crawl(&crawler_config(seeds), routine).await;

    assert_eq!(coordinator.frontier().handled_count(), 3);
    assert_eq!(
        coordinator.frontier().outcome_of(&format!("{}/b", base)),
        Some(RequestOutcome::ExtractionFailed)
    );
    assert_eq!(stats.extraction_failures, 1);
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn test_without_selector_only_seeds_are_crawled() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", links_page(&["/next".into()]), 1).await;
    mount_page(&server, "/next", links_page(&[]), 0).await;

    let config = crawler_config(vec![format!("{}/", base), format!("{}/", base)]);
    let (coordinator, stats, _) = crawl(&config, url_routine()).await;

    assert_eq!(coordinator.frontier().seen_count(), 1);
    assert_eq!(stats.handled, 1);
    assert!(coordinator.frontier().is_finished());
}

#[tokio::test]
async fn test_pattern_filter_limits_discovery() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(
        &server,
        "/",
        links_page(&["/docs/intro".into(), "/blog/post".into()]),
        1,
    )
    .await;
    mount_page(&server, "/docs/intro", links_page(&[]), 1).await;
    mount_page(&server, "/blog/post", links_page(&[]), 0).await;

    let mut config = crawler_config(vec![format!("{}/", base)]);
    config.link_selector = Some("a[href]".to_string());
    config.link_patterns = vec![format!("{}/docs/", regex::escape(&base))];

    let (_, stats, _) = crawl(&config, url_routine()).await;
    assert_eq!(stats.handled, 2);
}

#[tokio::test]
async fn test_depth_one_does_not_expand_children() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", links_page(&["/child".into()]), 1).await;
    mount_page(&server, "/child", links_page(&["/grandchild".into()]), 1).await;
    mount_page(&server, "/grandchild", links_page(&[]), 0).await;

    let mut config = crawler_config(vec![format!("{}/", base)]);
    config.link_selector = Some("a".to_string());
    config.max_depth = Some(1);

    let (coordinator, _, _) = crawl(&config, url_routine()).await;
    assert_eq!(coordinator.frontier().seen_count(), 2);
}

#[tokio::test]
async fn test_page_function_can_enqueue() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", links_page(&[]), 1).await;
    mount_page(&server, "/extra", links_page(&[]), 1).await;

    let routine = page_function_async(|ctx: ExtractionContext| async move {
        if ctx.request().depth == 0 {
            ctx.enqueue("/extra");
            ctx.enqueue("/extra");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, anyhow::Error>(Some(json!({ "depth": ctx.request().depth })))
    });

    let (_, stats, sink) = crawl(&crawler_config(vec![format!("{}/", base)]), routine).await;

    assert_eq!(stats.handled, 2);
    assert_eq!(sink.values(), vec![json!({"depth": 0}), json!({"depth": 1})]);
}

#[tokio::test]
async fn test_http_error_status_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("<title>Gone</title>", "text/html"))
        .mount(&server)
        .await;

    let routine = page_function_fn(|ctx| Ok(Some(json!(ctx.response().status.as_u16()))));
    let (_, stats, sink) = crawl(&crawler_config(vec![format!("{}/x", server.uri())]), routine).await;

    assert_eq!(stats.extracted, 1);
    assert_eq!(sink.values(), vec![json!(404)]);
}

#[tokio::test]
async fn test_many_workers_handle_each_page_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    let leaves: Vec<String> = (0..20).map(|i| format!("/leaf/{}", i)).collect();

    mount_page(&server, "/", links_page(&leaves), 1).await;
    for leaf in &leaves {
        // Every leaf links back to the root and to its siblings.
        Mock::given(method("GET"))
            .and(path(leaf.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(links_page(&leaves), "text/html")
                    .set_delay(Duration::from_millis(20)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut config = crawler_config(vec![format!("{}/", base)]);
    config.link_selector = Some("a".to_string());
    config.workers = 4;

    let (coordinator, stats, sink) = crawl(&config, url_routine()).await;

    assert_eq!(stats.handled, 21);
    assert_eq!(coordinator.frontier().handled_count(), 21);
    assert_eq!(sink.len(), 21);
    assert!(coordinator.frontier().is_finished());
}

#[tokio::test]
async fn test_run_time_limit_cancels_pending_work() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(links_page(&["/next".into()]), "text/html")
                .set_delay(Duration::from_millis(1500)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/next", links_page(&[]), 0).await;

    let mut config = crawler_config(vec![format!("{}/", base)]);
    config.link_selector = Some("a".to_string());
    config.max_run_time = Some(1);

    let (coordinator, stats, sink) = crawl(&config, url_routine()).await;

    assert!(stats.cancelled);
    assert_eq!(stats.handled, 1);
    assert_eq!(stats.enqueued, 2);
    assert_eq!(sink.len(), 1);
    assert_eq!(coordinator.frontier().pending_count(), 1);
    assert_eq!(sink.final_stats().map(|s| s.cancelled), Some(true));
}

#[tokio::test]
async fn test_config_file_to_jsonl_dataset() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", links_page(&["/about".into()]), 1).await;
    mount_page(
        &server,
        "/about",
        "<html><head><title>About us</title></head></html>".to_string(),
        1,
    )
    .await;

    let dir = tempfile::TempDir::new().unwrap();
    let dataset = dir.path().join("dataset.jsonl");
    let toml = format!(
        r#"
[crawler]
start-urls = ["{base}/"]
link-selector = "a"
max-depth = 1

[extraction]
page-function = "page-title"

[output]
format = "jsonl"
dataset-path = "{dataset}"
"#,
        base = base,
        dataset = dataset.display()
    );
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    config_file.write_all(toml.as_bytes()).unwrap();

    let config = load_config(config_file.path()).unwrap();
    let routine = builtin_page_function(&config.extraction.page_function).unwrap();

    let stats = run_crawl(&config, "test-hash", routine, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.handled, 2);

    let titles: Vec<Value> = std::fs::read_to_string(&dataset)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("t"), json!("About us")]);
}

#[tokio::test]
async fn test_linked_query_reaches_server_unchanged() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", links_page(&["/s?flag&amp;b=x/y".into()]), 1).await;
    Mock::given(method("GET"))
        .and(path("/s"))
        .and(query_param("b", "x/y"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = crawler_config(vec![format!("{}/", base)]);
    config.link_selector = Some("a".to_string());

    let (_, stats, sink) = crawl(&config, url_routine()).await;

    assert_eq!(stats.handled, 2);
    assert_eq!(stats.fetch_failures, 0);
    assert_eq!(sink.values()[1], json!({ "url": format!("{}/s?flag&b=x/y", base) }));

    let queries: Vec<Option<String>> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/s")
        .map(|request| request.url.query().map(str::to_string))
        .collect();
    assert_eq!(queries, vec![Some("flag&b=x/y".to_string())]);
}

#[tokio::test]
async fn test_declared_charset_reaches_page_function() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            b"<html><head><title>Caf\xE9</title></head></html>".to_vec(),
            "text/html; charset=windows-1252",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = crawler_config(vec![format!("{}/", server.uri())]);
    let (_, stats, sink) = crawl(&config, builtin_page_function("page-title").unwrap()).await;

    assert_eq!(stats.extracted, 1);
    assert_eq!(sink.values()[0]["title"], "Café");
}

#[tokio::test]
async fn test_configured_encoding_overrides_declared_charset() {
    let server = MockServer::start().await;
    // "Crème" in windows-1252, mislabelled as UTF-8
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            b"<title>Cr\xE8me</title>".to_vec(),
            "text/html; charset=utf-8",
        ))
        .mount(&server)
        .await;

    let config = crawler_config(vec![format!("{}/", server.uri())]);
    let (_, _, sink) = crawl(&config, builtin_page_function("page-title").unwrap()).await;
    assert_eq!(sink.values()[0]["title"], "Cr\u{FFFD}me");

    let mut config = crawler_config(vec![format!("{}/", server.uri())]);
    config.from_encoding = Some("latin1".to_string());
    let (_, _, sink) = crawl(&config, builtin_page_function("page-title").unwrap()).await;
    assert_eq!(sink.values()[0]["title"], "Crème");
}

#[tokio::test]
async fn test_failed_setup_leaves_no_dataset() {
    let dir = tempfile::TempDir::new().unwrap();
    let dataset = dir.path().join("dataset.db");
    let toml = format!(
        r#"
[crawler]
start-urls = ["http://127.0.0.1:1/"]

[extraction]
page-function = "page-title"

[output]
format = "sqlite"
dataset-path = "{dataset}"
"#,
        dataset = dataset.display()
    );
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    config_file.write_all(toml.as_bytes()).unwrap();

    let mut config = load_config(config_file.path()).unwrap();
    config.proxy = Some(ProxyConfig {
        urls: vec!["http://[::1".to_string()],
    });
    let routine = builtin_page_function(&config.extraction.page_function).unwrap();

    let result = run_crawl(&config, "test-hash", routine, CancellationToken::new()).await;

    assert!(result.is_err());
    assert!(!dataset.exists());
}
