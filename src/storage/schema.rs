//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Sumi-Audit database.

/// Tables holding page-level rows of a crawl, children first
///
/// Retention deletes in this order so foreign keys are never violated.
pub const CRAWL_DATA_TABLES: &[&str] = &[
    "issues",
    "links",
    "external_links",
    "hreflangs",
    "images",
    "scripts",
    "styles",
    "iframes",
    "audios",
    "videos",
    "pagereports",
];

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Audited websites
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    ignore_robots_txt INTEGER NOT NULL DEFAULT 0,
    follow_nofollow INTEGER NOT NULL DEFAULT 0,
    include_noindex INTEGER NOT NULL DEFAULT 0,
    crawl_sitemap INTEGER NOT NULL DEFAULT 0,
    allow_subdomains INTEGER NOT NULL DEFAULT 0,
    basic_auth TEXT,
    created TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_projects_url ON projects(url);

-- One row per crawl execution
CREATE TABLE IF NOT EXISTS crawls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    start_time TEXT NOT NULL,
    end_time TEXT,
    total_urls INTEGER NOT NULL DEFAULT 0,
    blocked_by_robotstxt INTEGER NOT NULL DEFAULT 0,
    noindex INTEGER NOT NULL DEFAULT 0,
    internal_follow_links INTEGER NOT NULL DEFAULT 0,
    internal_nofollow_links INTEGER NOT NULL DEFAULT 0,
    external_follow_links INTEGER NOT NULL DEFAULT 0,
    external_nofollow_links INTEGER NOT NULL DEFAULT 0,
    sponsored_links INTEGER NOT NULL DEFAULT 0,
    ugc_links INTEGER NOT NULL DEFAULT 0,
    robotstxt_exists INTEGER NOT NULL DEFAULT 0,
    sitemap_exists INTEGER NOT NULL DEFAULT 0,
    issues_end TEXT,
    total_issues INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_crawls_project ON crawls(project_id);

-- Analyzed URLs
CREATE TABLE IF NOT EXISTS pagereports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_id INTEGER NOT NULL REFERENCES crawls(id),
    url TEXT NOT NULL,
    url_hash TEXT NOT NULL,
    redirect_url TEXT NOT NULL DEFAULT '',
    redirect_hash TEXT NOT NULL DEFAULT '',
    refresh TEXT NOT NULL DEFAULT '',
    status_code INTEGER NOT NULL,
    content_type TEXT NOT NULL DEFAULT '',
    media_type TEXT NOT NULL DEFAULT '',
    lang TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    robots TEXT NOT NULL DEFAULT '',
    noindex INTEGER NOT NULL DEFAULT 0,
    nofollow INTEGER NOT NULL DEFAULT 0,
    canonical TEXT NOT NULL DEFAULT '',
    canonical_hash TEXT NOT NULL DEFAULT '',
    h1 TEXT NOT NULL DEFAULT '',
    h2 TEXT NOT NULL DEFAULT '',
    words INTEGER NOT NULL DEFAULT 0,
    size INTEGER NOT NULL DEFAULT 0,
    valid_headings INTEGER NOT NULL DEFAULT 1,
    blocked_by_robotstxt INTEGER NOT NULL DEFAULT 0,
    crawled INTEGER NOT NULL DEFAULT 0,
    timeout INTEGER NOT NULL DEFAULT 0,
    depth INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_pagereports_crawl ON pagereports(crawl_id);
CREATE INDEX IF NOT EXISTS idx_pagereports_hash ON pagereports(crawl_id, url_hash);

-- Anchors to the same host
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pagereport_id INTEGER NOT NULL REFERENCES pagereports(id),
    crawl_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    url_hash TEXT NOT NULL,
    rel TEXT NOT NULL DEFAULT '',
    text TEXT NOT NULL DEFAULT '',
    nofollow INTEGER NOT NULL DEFAULT 0,
    sponsored INTEGER NOT NULL DEFAULT 0,
    ugc INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_links_crawl ON links(crawl_id);
CREATE INDEX IF NOT EXISTS idx_links_pagereport ON links(pagereport_id);

-- Anchors to other hosts
CREATE TABLE IF NOT EXISTS external_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pagereport_id INTEGER NOT NULL REFERENCES pagereports(id),
    crawl_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    rel TEXT NOT NULL DEFAULT '',
    text TEXT NOT NULL DEFAULT '',
    nofollow INTEGER NOT NULL DEFAULT 0,
    sponsored INTEGER NOT NULL DEFAULT 0,
    ugc INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_external_links_crawl ON external_links(crawl_id);

CREATE TABLE IF NOT EXISTS hreflangs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pagereport_id INTEGER NOT NULL REFERENCES pagereports(id),
    crawl_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    url_hash TEXT NOT NULL,
    lang TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_hreflangs_crawl ON hreflangs(crawl_id);

CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pagereport_id INTEGER NOT NULL REFERENCES pagereports(id),
    crawl_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    alt TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_images_crawl ON images(crawl_id);

CREATE TABLE IF NOT EXISTS scripts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pagereport_id INTEGER NOT NULL REFERENCES pagereports(id),
    crawl_id INTEGER NOT NULL,
    url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scripts_crawl ON scripts(crawl_id);

CREATE TABLE IF NOT EXISTS styles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pagereport_id INTEGER NOT NULL REFERENCES pagereports(id),
    crawl_id INTEGER NOT NULL,
    url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_styles_crawl ON styles(crawl_id);

CREATE TABLE IF NOT EXISTS iframes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pagereport_id INTEGER NOT NULL REFERENCES pagereports(id),
    crawl_id INTEGER NOT NULL,
    url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_iframes_crawl ON iframes(crawl_id);

CREATE TABLE IF NOT EXISTS audios (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pagereport_id INTEGER NOT NULL REFERENCES pagereports(id),
    crawl_id INTEGER NOT NULL,
    url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audios_crawl ON audios(crawl_id);

CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pagereport_id INTEGER NOT NULL REFERENCES pagereports(id),
    crawl_id INTEGER NOT NULL,
    url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_videos_crawl ON videos(crawl_id);

-- Detected issues
CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pagereport_id INTEGER NOT NULL REFERENCES pagereports(id),
    crawl_id INTEGER NOT NULL,
    error_type INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_issues_crawl_type ON issues(crawl_id, error_type);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
