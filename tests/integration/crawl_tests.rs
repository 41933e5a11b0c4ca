//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end against a temporary SQLite database.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_audit::config::{load_config, UserAgentConfig};
use sumi_audit::crawler::{build_http_client, CrawlerOptions, CrawlerService};
use sumi_audit::issues::{ErrorType, IssueService};
use sumi_audit::model::Project;
use sumi_audit::storage::{open_storage, SqliteStorage, Storage};
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn test_options() -> CrawlerOptions {
    CrawlerOptions {
        user_agent: "TestBot".to_string(),
        ..CrawlerOptions::default()
    }
}

/// Opens a database in `dir` with one saved project for `url`
fn setup_storage(dir: &TempDir, url: &str) -> (Arc<Mutex<SqliteStorage>>, Project) {
    let mut storage = open_storage(&dir.path().join("audit.db")).expect("Failed to open DB");
    let project = storage
        .save_project(&Project::new(url))
        .expect("Failed to save project");
    (Arc::new(Mutex::new(storage)), project)
}

fn service(storage: &Arc<Mutex<SqliteStorage>>) -> CrawlerService<SqliteStorage> {
    let client = build_http_client(&test_user_agent(), Duration::from_secs(5))
        .expect("Failed to build client");
    CrawlerService::new(storage.clone(), client, test_options())
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<html lang="en"><head><title>{}</title></head><body><h1>{}</h1>{}</body></html>"#,
        title, title, body
    )
}

#[tokio::test]
async fn test_three_page_fixture() {
    let server = MockServer::start().await;
    let base = server.uri();

    // A links to B and C
    mount_html(
        &server,
        "/",
        page(
            "Page A",
            &format!(r#"<a href="{}/b">B</a> <a href="/c">C</a>"#, base),
        ),
    )
    .await;

    // B redirects to C
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", format!("{}/c", base).as_str()))
        .mount(&server)
        .await;

    // C has no outbound links
    mount_html(&server, "/c", page("Page C", "<p>The end</p>")).await;

    let dir = TempDir::new().unwrap();
    let (storage, project) = setup_storage(&dir, &format!("{}/", base));

    let crawl = service(&storage)
        .start_crawler(&project)
        .await
        .expect("Crawl failed");

    assert_eq!(crawl.total_urls, 3);
    assert_eq!(crawl.blocked_by_robotstxt, 0);
    assert!(!crawl.robotstxt_exists);
    assert!(!crawl.sitemap_exists);
    assert!(crawl.is_finished());

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_page_reports(crawl.id).unwrap(), 3);

    let snapshot = storage.load_crawl_snapshot(crawl.id).unwrap();
    let redirects: Vec<_> = snapshot
        .pages
        .iter()
        .filter(|p| !p.redirect_hash.is_empty())
        .collect();
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].status_code, 301);

    let stored = storage.get_last_crawl(project.id).unwrap().unwrap();
    assert_eq!(stored.id, crawl.id);
    assert_eq!(stored.total_urls, 3);
    assert!(stored.issues_end.is_some());
}

#[tokio::test]
async fn test_robots_blocked_urls_are_stubbed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;

    mount_html(
        &server,
        "/",
        page("Home", r#"<a href="/public">Public</a> <a href="/private">Private</a>"#),
    )
    .await;
    mount_html(&server, "/public", page("Public", "")).await;

    // A blocked URL must never be fetched
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (storage, project) = setup_storage(&dir, &format!("{}/", server.uri()));

    let crawl = service(&storage).start_crawler(&project).await.unwrap();

    assert!(crawl.robotstxt_exists);
    assert_eq!(crawl.total_urls, 3);
    assert_eq!(crawl.blocked_by_robotstxt, 1);

    let issues = IssueService::new(storage.clone());
    let blocked = issues
        .get_paginated_reports_by_issue(crawl.id, ErrorType::Blocked, 1)
        .unwrap();
    assert_eq!(blocked.total_items, 1);
    assert!(blocked.items[0].url.ends_with("/private"));
    assert_eq!(blocked.items[0].status_code, 0);
}

#[tokio::test]
async fn test_ignore_robots_txt_fetches_everything() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .mount(&server)
        .await;

    mount_html(&server, "/", page("Home", r#"<a href="/about">About</a>"#)).await;
    mount_html(&server, "/about", page("About", "")).await;

    let dir = TempDir::new().unwrap();
    let (storage, mut project) = setup_storage(&dir, &format!("{}/", server.uri()));
    project.ignore_robots_txt = true;

    let crawl = service(&storage).start_crawler(&project).await.unwrap();

    assert_eq!(crawl.total_urls, 2);
    assert_eq!(crawl.blocked_by_robotstxt, 0);
}

#[tokio::test]
async fn test_issues_are_detected() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/",
        page(
            "Same title",
            r#"<a href="/twin">Twin</a> <a href="/untitled">Untitled</a> <a href="/missing">Missing</a>"#,
        ),
    )
    .await;
    mount_html(&server, "/twin", page("Same title", "")).await;
    mount_html(
        &server,
        "/untitled",
        r#"<html lang="en"><head></head><body><h1>Untitled</h1></body></html>"#.to_string(),
    )
    .await;
    // /missing is unmounted and answers 404

    let dir = TempDir::new().unwrap();
    let (storage, project) = setup_storage(&dir, &format!("{}/", server.uri()));

    let crawl = service(&storage).start_crawler(&project).await.unwrap();
    assert_eq!(crawl.total_urls, 4);
    assert!(crawl.total_issues > 0);

    let issues = IssueService::new(storage.clone());
    let count = issues.get_issues_count(crawl.id).unwrap();
    assert_eq!(count.total(), crawl.total_issues);

    let count_of = |error_type: ErrorType| {
        count
            .groups
            .iter()
            .find(|g| g.error_type == error_type)
            .map(|g| g.count)
            .unwrap_or(0)
    };

    assert_eq!(count_of(ErrorType::DuplicatedTitle), 2);
    assert_eq!(count_of(ErrorType::EmptyTitle), 1);
    assert_eq!(count_of(ErrorType::Error40x), 1);
    assert!(count.critical >= 4);

    let untitled = issues
        .get_paginated_reports_by_issue(crawl.id, ErrorType::EmptyTitle, 1)
        .unwrap();
    assert!(untitled.items[0].url.ends_with("/untitled"));
}

#[tokio::test]
async fn test_timed_out_page_is_flagged() {
    let server = MockServer::start().await;
    mount_html(&server, "/", page("Home", r#"<a href="/slow">Slow</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (storage, project) = setup_storage(&dir, &format!("{}/", server.uri()));

    let client = build_http_client(&test_user_agent(), Duration::from_millis(300)).unwrap();
    let service = CrawlerService::new(storage.clone(), client, test_options());

    let crawl = tokio::time::timeout(Duration::from_secs(15), service.start_crawler(&project))
        .await
        .expect("Crawl did not terminate")
        .expect("Crawl failed");
    assert_eq!(crawl.total_urls, 2);
    assert!(crawl.is_finished());

    let issues = IssueService::new(storage.clone());
    let timed_out = issues
        .get_paginated_reports_by_issue(crawl.id, ErrorType::Timeout, 1)
        .unwrap();
    assert_eq!(timed_out.total_items, 1);
    assert!(timed_out.items[0].url.ends_with("/slow"));
    assert_eq!(timed_out.items[0].status_code, 0);
}

#[tokio::test]
async fn test_windows_1252_page_is_decoded() {
    let server = MockServer::start().await;

    let mut body = br#"<html lang="fr"><head><meta charset="windows-1252"><title>Caf"#.to_vec();
    body.push(0xE9);
    body.extend_from_slice(b"</title></head><body><h1>Menu</h1></body></html>");
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (storage, project) = setup_storage(&dir, &format!("{}/", server.uri()));

    let crawl = service(&storage).start_crawler(&project).await.unwrap();

    let storage = storage.lock().unwrap();
    let snapshot = storage.load_crawl_snapshot(crawl.id).unwrap();
    assert_eq!(snapshot.pages.len(), 1);
    assert_eq!(snapshot.pages[0].title, "Café");
}

#[tokio::test]
async fn test_previous_crawl_is_deleted() {
    let server = MockServer::start().await;
    mount_html(&server, "/", page("Home", r#"<a href="/about">About</a>"#)).await;
    mount_html(&server, "/about", page("About", "")).await;

    let dir = TempDir::new().unwrap();
    let (storage, project) = setup_storage(&dir, &format!("{}/", server.uri()));
    let service = service(&storage);

    let first = service.start_crawler(&project).await.unwrap();
    service.wait_for_cleanup().await;

    let second = service.start_crawler(&project).await.unwrap();
    service.wait_for_cleanup().await;

    let storage = storage.lock().unwrap();
    assert!(storage.find_crawl_by_id(first.id).is_err());
    assert_eq!(storage.count_page_reports(first.id).unwrap(), 0);
    assert_eq!(storage.count_page_reports(second.id).unwrap(), 2);

    let crawls = storage.get_last_crawls(project.id, 10).unwrap();
    assert_eq!(crawls.len(), 1);
    assert_eq!(crawls[0].id, second.id);
}

#[tokio::test]
async fn test_crawl_from_config_file() {
    let server = MockServer::start().await;
    mount_html(&server, "/", page("Home", "")).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("audit.db");

    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[crawler]
max-page-reports = 10
workers = 1

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{}"

[project]
url = "{}/"
crawl-sitemap = true
"#,
        db_path.display(),
        server.uri()
    )
    .unwrap();

    let config = load_config(file.path()).expect("Failed to load config");
    assert_eq!(config.crawler.max_page_reports, 10);
    assert!(config.project.crawl_sitemap);

    let mut storage = open_storage(&db_path).unwrap();
    let project = storage
        .save_project(&Project::from_config(&config.project))
        .unwrap();
    let storage = Arc::new(Mutex::new(storage));

    let client = build_http_client(&config.user_agent, Duration::from_secs(5)).unwrap();
    let service =
        CrawlerService::new(storage.clone(), client, CrawlerOptions::from_config(&config));

    let crawl = service.start_crawler(&project).await.unwrap();
    assert_eq!(crawl.total_urls, 1);

    // The database outlives the storage handle
    drop(service);
    drop(storage);
    let reopened = open_storage(&db_path).unwrap();
    assert_eq!(reopened.count_page_reports(crawl.id).unwrap(), 1);
}
