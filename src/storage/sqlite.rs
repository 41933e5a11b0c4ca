//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::issues::{CrawlSnapshot, ErrorType, HreflangRow, Issue, LinkRow, PageRow};
use crate::model::{BasicAuth, Crawl, Project};
use crate::pagereport::PageReport;
use crate::storage::schema::{initialize_schema, CRAWL_DATA_TABLES};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::PageReportRecord;
use crate::url::url_hash;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const CRAWL_COLUMNS: &str = "id, project_id, start_time, end_time, total_urls, \
    blocked_by_robotstxt, noindex, internal_follow_links, internal_nofollow_links, \
    external_follow_links, external_nofollow_links, sponsored_links, ugc_links, \
    robotstxt_exists, sitemap_exists, issues_end, total_issues";

const PROJECT_COLUMNS: &str = "id, url, ignore_robots_txt, follow_nofollow, include_noindex, \
    crawl_sitemap, allow_subdomains, basic_auth, created";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_crawls(&self, sql: &str, params: impl rusqlite::Params) -> StorageResult<Vec<Crawl>> {
        let mut stmt = self.conn.prepare(sql)?;
        let crawls = stmt
            .query_map(params, crawl_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(crawls)
    }
}

fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_time(
    idx: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_time(idx, &v)).transpose()
}

fn crawl_from_row(row: &Row<'_>) -> rusqlite::Result<Crawl> {
    Ok(Crawl {
        id: row.get(0)?,
        project_id: row.get(1)?,
        start: parse_time(2, &row.get::<_, String>(2)?)?,
        end: parse_optional_time(3, row.get(3)?)?,
        total_urls: row.get::<_, i64>(4)? as u64,
        blocked_by_robotstxt: row.get::<_, i64>(5)? as u64,
        noindex: row.get::<_, i64>(6)? as u64,
        internal_follow_links: row.get::<_, i64>(7)? as u64,
        internal_nofollow_links: row.get::<_, i64>(8)? as u64,
        external_follow_links: row.get::<_, i64>(9)? as u64,
        external_nofollow_links: row.get::<_, i64>(10)? as u64,
        sponsored_links: row.get::<_, i64>(11)? as u64,
        ugc_links: row.get::<_, i64>(12)? as u64,
        robotstxt_exists: row.get(13)?,
        sitemap_exists: row.get(14)?,
        issues_end: parse_optional_time(15, row.get(15)?)?,
        total_issues: row.get::<_, i64>(16)? as u64,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let basic_auth = row
        .get::<_, Option<String>>(7)?
        .map(|json| serde_json::from_str::<BasicAuth>(&json))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(Project {
        id: row.get(0)?,
        url: row.get(1)?,
        ignore_robots_txt: row.get(2)?,
        follow_nofollow: row.get(3)?,
        include_noindex: row.get(4)?,
        crawl_sitemap: row.get(5)?,
        allow_subdomains: row.get(6)?,
        basic_auth,
        created: parse_time(8, &row.get::<_, String>(8)?)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Projects =====

    fn save_project(&mut self, project: &Project) -> StorageResult<Project> {
        let basic_auth = project
            .basic_auth
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut saved = project.clone();

        if project.id == 0 {
            self.conn.execute(
                "INSERT INTO projects (url, ignore_robots_txt, follow_nofollow, include_noindex,
                 crawl_sitemap, allow_subdomains, basic_auth, created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    project.url,
                    project.ignore_robots_txt,
                    project.follow_nofollow,
                    project.include_noindex,
                    project.crawl_sitemap,
                    project.allow_subdomains,
                    basic_auth,
                    project.created.to_rfc3339(),
                ],
            )?;
            saved.id = self.conn.last_insert_rowid();
        } else {
            let updated = self.conn.execute(
                "UPDATE projects SET url = ?1, ignore_robots_txt = ?2, follow_nofollow = ?3,
                 include_noindex = ?4, crawl_sitemap = ?5, allow_subdomains = ?6, basic_auth = ?7
                 WHERE id = ?8",
                params![
                    project.url,
                    project.ignore_robots_txt,
                    project.follow_nofollow,
                    project.include_noindex,
                    project.crawl_sitemap,
                    project.allow_subdomains,
                    basic_auth,
                    project.id,
                ],
            )?;
            if updated == 0 {
                return Err(StorageError::ProjectNotFound(project.id));
            }
        }

        Ok(saved)
    }

    fn find_project_by_id(&self, id: i64) -> StorageResult<Project> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], project_from_row)
            .optional()?
            .ok_or(StorageError::ProjectNotFound(id))
    }

    fn find_project_by_url(&self, url: &str) -> StorageResult<Option<Project>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE url = ?1 ORDER BY id DESC LIMIT 1"
        );
        let project = self
            .conn
            .query_row(&sql, params![url], project_from_row)
            .optional()?;
        Ok(project)
    }

    // ===== Crawls =====

    fn save_crawl(&mut self, project: &Project) -> StorageResult<Crawl> {
        let mut crawl = Crawl::new(project.id);
        self.conn.execute(
            "INSERT INTO crawls (project_id, start_time) VALUES (?1, ?2)",
            params![crawl.project_id, crawl.start.to_rfc3339()],
        )?;
        crawl.id = self.conn.last_insert_rowid();
        Ok(crawl)
    }

    fn save_end_crawl(&mut self, crawl: &Crawl) -> StorageResult<Crawl> {
        let mut saved = crawl.clone();
        let end = *saved.end.get_or_insert_with(Utc::now);

        let updated = self.conn.execute(
            "UPDATE crawls SET end_time = ?1, total_urls = ?2, blocked_by_robotstxt = ?3,
             noindex = ?4, internal_follow_links = ?5, internal_nofollow_links = ?6,
             external_follow_links = ?7, external_nofollow_links = ?8, sponsored_links = ?9,
             ugc_links = ?10, robotstxt_exists = ?11, sitemap_exists = ?12
             WHERE id = ?13",
            params![
                end.to_rfc3339(),
                crawl.total_urls as i64,
                crawl.blocked_by_robotstxt as i64,
                crawl.noindex as i64,
                crawl.internal_follow_links as i64,
                crawl.internal_nofollow_links as i64,
                crawl.external_follow_links as i64,
                crawl.external_nofollow_links as i64,
                crawl.sponsored_links as i64,
                crawl.ugc_links as i64,
                crawl.robotstxt_exists,
                crawl.sitemap_exists,
                crawl.id,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::CrawlNotFound(crawl.id));
        }

        Ok(saved)
    }

    fn find_crawl_by_id(&self, id: i64) -> StorageResult<Crawl> {
        let sql = format!("SELECT {CRAWL_COLUMNS} FROM crawls WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], crawl_from_row)
            .optional()?
            .ok_or(StorageError::CrawlNotFound(id))
    }

    fn get_last_crawl(&self, project_id: i64) -> StorageResult<Option<Crawl>> {
        Ok(self.get_last_crawls(project_id, 1)?.into_iter().next())
    }

    fn get_last_crawls(&self, project_id: i64, limit: usize) -> StorageResult<Vec<Crawl>> {
        let sql = format!(
            "SELECT {CRAWL_COLUMNS} FROM crawls
             WHERE project_id = ?1 AND end_time IS NOT NULL
             ORDER BY id DESC LIMIT ?2"
        );
        self.query_crawls(&sql, params![project_id, limit as i64])
    }

    fn get_previous_crawl(&self, crawl: &Crawl) -> StorageResult<Option<Crawl>> {
        let sql = format!(
            "SELECT {CRAWL_COLUMNS} FROM crawls
             WHERE project_id = ?1 AND id < ?2
             ORDER BY id DESC LIMIT 1"
        );
        Ok(self
            .query_crawls(&sql, params![crawl.project_id, crawl.id])?
            .into_iter()
            .next())
    }

    fn delete_crawl_data(&mut self, crawl_id: i64, batch: usize) -> StorageResult<usize> {
        for table in CRAWL_DATA_TABLES {
            let sql = format!(
                "DELETE FROM {table} WHERE id IN
                 (SELECT id FROM {table} WHERE crawl_id = ?1 LIMIT ?2)"
            );
            let deleted = self.conn.execute(&sql, params![crawl_id, batch as i64])?;
            if deleted > 0 {
                return Ok(deleted);
            }
        }

        Ok(0)
    }

    fn delete_crawl(&mut self, crawl_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM crawls WHERE id = ?1", params![crawl_id])?;
        Ok(())
    }

    // ===== Page Reports =====

    fn save_page_report(
        &mut self,
        report: &PageReport,
        crawl_id: i64,
    ) -> StorageResult<PageReport> {
        let tx = self.conn.transaction()?;

        let canonical_hash = if report.canonical.is_empty() {
            String::new()
        } else {
            url_hash(&report.canonical)
        };

        tx.execute(
            "INSERT INTO pagereports (crawl_id, url, url_hash, redirect_url, redirect_hash, refresh,
             status_code, content_type, media_type, lang, title, description, robots, noindex,
             nofollow, canonical, canonical_hash, h1, h2, words, size, valid_headings,
             blocked_by_robotstxt, crawled, timeout, depth)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
             ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
            params![
                crawl_id,
                report.url,
                report.url_hash,
                report.redirect_url,
                report.redirect_hash,
                report.refresh,
                report.status_code,
                report.content_type,
                report.media_type,
                report.lang,
                report.title,
                report.description,
                report.robots,
                report.noindex,
                report.nofollow,
                report.canonical,
                canonical_hash,
                report.h1,
                report.h2,
                report.words as i64,
                report.size as i64,
                report.valid_headings,
                report.blocked_by_robotstxt,
                report.crawled,
                report.timeout,
                report.depth,
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO links (pagereport_id, crawl_id, url, url_hash, rel, text, nofollow, sponsored, ugc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for link in &report.links {
                stmt.execute(params![
                    id,
                    crawl_id,
                    link.url,
                    link.url_hash(),
                    link.rel,
                    link.text,
                    link.nofollow,
                    link.sponsored,
                    link.ugc,
                ])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO external_links (pagereport_id, crawl_id, url, rel, text, nofollow, sponsored, ugc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for link in &report.external_links {
                stmt.execute(params![
                    id,
                    crawl_id,
                    link.url,
                    link.rel,
                    link.text,
                    link.nofollow,
                    link.sponsored,
                    link.ugc,
                ])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO hreflangs (pagereport_id, crawl_id, url, url_hash, lang)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for hreflang in &report.hreflangs {
                stmt.execute(params![
                    id,
                    crawl_id,
                    hreflang.url,
                    url_hash(&hreflang.url),
                    hreflang.lang,
                ])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO images (pagereport_id, crawl_id, url, alt) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for image in &report.images {
                stmt.execute(params![id, crawl_id, image.url, image.alt])?;
            }

            let resources: [(&str, &Vec<String>); 5] = [
                ("scripts", &report.scripts),
                ("styles", &report.styles),
                ("iframes", &report.iframes),
                ("audios", &report.audios),
                ("videos", &report.videos),
            ];
            for (table, urls) in resources {
                let mut stmt = tx.prepare_cached(&format!(
                    "INSERT INTO {table} (pagereport_id, crawl_id, url) VALUES (?1, ?2, ?3)"
                ))?;
                for url in urls {
                    stmt.execute(params![id, crawl_id, url])?;
                }
            }
        }

        tx.commit()?;

        let mut saved = report.clone();
        saved.id = id;
        Ok(saved)
    }

    fn count_page_reports(&self, crawl_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pagereports WHERE crawl_id = ?1",
            params![crawl_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn load_crawl_snapshot(&self, crawl_id: i64) -> StorageResult<CrawlSnapshot> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url_hash, redirect_hash, canonical_hash, status_code, media_type, title,
             description, lang, noindex, crawled, depth
             FROM pagereports WHERE crawl_id = ?1 ORDER BY id",
        )?;
        let pages = stmt
            .query_map(params![crawl_id], |row| {
                Ok(PageRow {
                    id: row.get(0)?,
                    url_hash: row.get(1)?,
                    redirect_hash: row.get(2)?,
                    canonical_hash: row.get(3)?,
                    status_code: row.get(4)?,
                    media_type: row.get(5)?,
                    title: row.get(6)?,
                    description: row.get(7)?,
                    lang: row.get(8)?,
                    noindex: row.get(9)?,
                    crawled: row.get(10)?,
                    depth: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT pagereport_id, url_hash, nofollow FROM links WHERE crawl_id = ?1 ORDER BY id",
        )?;
        let links = stmt
            .query_map(params![crawl_id], |row| {
                Ok(LinkRow {
                    page_report_id: row.get(0)?,
                    url_hash: row.get(1)?,
                    nofollow: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT pagereport_id, url_hash, lang FROM hreflangs WHERE crawl_id = ?1 ORDER BY id",
        )?;
        let hreflangs = stmt
            .query_map(params![crawl_id], |row| {
                Ok(HreflangRow {
                    page_report_id: row.get(0)?,
                    url_hash: row.get(1)?,
                    lang: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CrawlSnapshot {
            pages,
            links,
            hreflangs,
        })
    }

    // ===== Issues =====

    fn save_issues(&mut self, issues: &[Issue]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO issues (pagereport_id, crawl_id, error_type) VALUES (?1, ?2, ?3)",
            )?;
            for issue in issues {
                stmt.execute(params![
                    issue.page_report_id,
                    issue.crawl_id,
                    issue.error_type.code()
                ])?;
            }
        }
        tx.commit()?;
        Ok(issues.len())
    }

    fn save_issues_end(&mut self, crawl_id: i64, total_issues: u64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawls SET issues_end = ?1, total_issues = ?2 WHERE id = ?3",
            params![now, total_issues as i64, crawl_id],
        )?;
        if updated == 0 {
            return Err(StorageError::CrawlNotFound(crawl_id));
        }
        Ok(())
    }

    fn count_issues_by_type(&self, crawl_id: i64) -> StorageResult<Vec<(ErrorType, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT error_type, COUNT(*) FROM issues WHERE crawl_id = ?1
             GROUP BY error_type ORDER BY error_type",
        )?;

        let rows = stmt
            .query_map(params![crawl_id], |row| {
                Ok((row.get::<_, i32>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let counts = rows
            .into_iter()
            .filter_map(|(code, count)| ErrorType::from_code(code).map(|t| (t, count as u64)))
            .collect();

        Ok(counts)
    }

    fn find_page_reports_by_issue(
        &self,
        crawl_id: i64,
        error_type: ErrorType,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<PageReportRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT p.id, p.url, p.status_code, p.media_type, p.title, p.depth
             FROM pagereports p
             JOIN issues i ON i.pagereport_id = p.id
             WHERE i.crawl_id = ?1 AND i.error_type = ?2
             ORDER BY p.id LIMIT ?3 OFFSET ?4",
        )?;

        let records = stmt
            .query_map(
                params![crawl_id, error_type.code(), limit as i64, offset as i64],
                |row| {
                    Ok(PageReportRecord {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        status_code: row.get(2)?,
                        media_type: row.get(3)?,
                        title: row.get(4)?,
                        depth: row.get(5)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn count_page_reports_by_issue(
        &self,
        crawl_id: i64,
        error_type: ErrorType,
    ) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT pagereport_id) FROM issues WHERE crawl_id = ?1 AND error_type = ?2",
            params![crawl_id, error_type.code()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
