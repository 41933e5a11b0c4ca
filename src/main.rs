//! Sumi-Audit main entry point
//!
//! This is the command-line interface for the Sumi-Audit SEO crawler.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_audit::config::{load_config_with_hash, Config};
use sumi_audit::crawler::{build_http_client, CrawlerOptions, CrawlerService};
use sumi_audit::issues::{IssueCount, IssueService};
use sumi_audit::model::{Crawl, Project};
use sumi_audit::storage::{open_storage, SqliteStorage, Storage};
use tracing_subscriber::EnvFilter;

/// Sumi-Audit: an SEO crawler with issue detection
///
/// Sumi-Audit crawls a website from its start URL, analyzes every page it
/// discovers and reports SEO issues such as broken status codes, missing
/// titles, duplicated content and redirect chains.
#[derive(Parser, Debug)]
#[command(name = "sumi-audit")]
#[command(version = "1.0.0")]
#[command(about = "An SEO crawler with issue detection", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show the issue summary of the last crawl and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_audit=info,warn"),
            1 => EnvFilter::new("sumi_audit=debug,info"),
            2 => EnvFilter::new("sumi_audit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Audit Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max page reports: {}", config.crawler.max_page_reports);
    println!("  Workers: {}", config.crawler.workers);
    println!("  Request timeout: {}s", config.crawler.request_timeout);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let project = &config.project;
    println!("\nProject:");
    println!("  URL: {}", project.url);
    println!("  Ignore robots.txt: {}", project.ignore_robots_txt);
    println!("  Follow nofollow: {}", project.follow_nofollow);
    println!("  Include noindex: {}", project.include_noindex);
    println!("  Crawl sitemap: {}", project.crawl_sitemap);
    println!("  Allow subdomains: {}", project.allow_subdomains);
    if let Some(auth) = &project.basic_auth {
        println!("  Basic auth: {} on {}", auth.username, auth.domains.join(", "));
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: prints the issue summary of the last crawl
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;

    let Some(project) = storage.find_project_by_url(&config.project.url)? else {
        println!("No crawl recorded for {}", config.project.url);
        return Ok(());
    };
    let Some(crawl) = storage.get_last_crawl(project.id)? else {
        println!("No finished crawl recorded for {}", config.project.url);
        return Ok(());
    };

    let service = IssueService::new(Arc::new(Mutex::new(storage)));
    let count = service.get_issues_count(crawl.id)?;
    print_summary(&project, &crawl, &count);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    let project = save_configured_project(&mut storage, &config)?;
    let storage = Arc::new(Mutex::new(storage));

    let client = build_http_client(
        &config.user_agent,
        Duration::from_secs(config.crawler.request_timeout),
    )?;

    let service = CrawlerService::new(
        storage.clone(),
        client,
        CrawlerOptions::from_config(&config),
    );

    let crawl = service.start_crawler(&project).await?;
    service.wait_for_cleanup().await;

    let count = IssueService::new(storage).get_issues_count(crawl.id)?;
    print_summary(&project, &crawl, &count);

    Ok(())
}

/// Inserts the configured project, or updates the one already stored for its URL
fn save_configured_project(
    storage: &mut SqliteStorage,
    config: &Config,
) -> anyhow::Result<Project> {
    let mut project = Project::from_config(&config.project);
    if let Some(existing) = storage.find_project_by_url(&project.url)? {
        project.id = existing.id;
        project.created = existing.created;
    }

    Ok(storage.save_project(&project)?)
}

fn print_summary(project: &Project, crawl: &Crawl, count: &IssueCount) {
    println!("=== Sumi-Audit: {} ===\n", project.url);

    println!("Crawl #{} started {}", crawl.id, crawl.start.to_rfc3339());
    println!("  URLs: {}", crawl.total_urls);
    println!("  Blocked by robots.txt: {}", crawl.blocked_by_robotstxt);
    println!("  Noindex: {}", crawl.noindex);
    println!("  robots.txt: {}", if crawl.robotstxt_exists { "found" } else { "missing" });
    println!("  Sitemap: {}", if crawl.sitemap_exists { "found" } else { "missing" });

    println!("\nIssues: {}", count.total());
    println!("  Critical: {}", count.critical);
    println!("  Alert: {}", count.alert);
    println!("  Warning: {}", count.warning);

    if !count.groups.is_empty() {
        println!();
        for group in &count.groups {
            let priority = format!("{:?}", group.priority);
            println!("  {:<40} {:<10} {:>6}", group.error_type.name(), priority, group.count);
        }
    }
}
