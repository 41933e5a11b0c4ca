//! Read-side aggregation of persisted issues

use crate::issues::{ErrorType, Priority};
use crate::storage::{lock_storage, PageReportRecord, Storage, StorageResult};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Page reports listed per page of a paginated issue view
pub const PAGE_SIZE: usize = 25;

/// Number of issues of one error type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueGroup {
    pub error_type: ErrorType,
    pub priority: Priority,
    pub count: u64,
}

/// Issue totals of a crawl, per priority and per error type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueCount {
    pub critical: u64,
    pub alert: u64,
    pub warning: u64,

    /// Sorted by priority, then by error type code
    pub groups: Vec<IssueGroup>,
}

impl IssueCount {
    pub fn total(&self) -> u64 {
        self.critical + self.alert + self.warning
    }
}

/// One page of page reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginator {
    /// 1-based
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: u64,
    pub items: Vec<PageReportRecord>,
}

impl Paginator {
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }
}

pub struct IssueService<S> {
    storage: Arc<Mutex<S>>,
}

impl<S: Storage> IssueService<S> {
    pub fn new(storage: Arc<Mutex<S>>) -> Self {
        Self { storage }
    }

    /// Aggregates the issues of a crawl
    ///
    /// # Arguments
    ///
    /// * `crawl_id` - The crawl to aggregate
    ///
    /// # Returns
    ///
    /// Totals per priority and one group per error type with issues
    pub fn get_issues_count(&self, crawl_id: i64) -> StorageResult<IssueCount> {
        let counts = lock_storage(&self.storage)?.count_issues_by_type(crawl_id)?;

        let mut issue_count = IssueCount::default();
        for (error_type, count) in counts {
            let priority = error_type.priority();
            match priority {
                Priority::Critical => issue_count.critical += count,
                Priority::Alert => issue_count.alert += count,
                Priority::Warning => issue_count.warning += count,
            }
            issue_count.groups.push(IssueGroup {
                error_type,
                priority,
                count,
            });
        }

        issue_count
            .groups
            .sort_by_key(|g| (g.priority, g.error_type));

        Ok(issue_count)
    }

    /// Lists the page reports flagged with an error type, one page at a time
    ///
    /// Pages are 1-based; page 0 is treated as page 1 and pages past the end
    /// are clamped to the last page.
    pub fn get_paginated_reports_by_issue(
        &self,
        crawl_id: i64,
        error_type: ErrorType,
        page: usize,
    ) -> StorageResult<Paginator> {
        let storage = lock_storage(&self.storage)?;

        let total_items = storage.count_page_reports_by_issue(crawl_id, error_type)?;
        let total_pages = (total_items as usize).div_ceil(PAGE_SIZE).max(1);
        let current_page = page.clamp(1, total_pages);

        let items = storage.find_page_reports_by_issue(
            crawl_id,
            error_type,
            PAGE_SIZE,
            (current_page - 1) * PAGE_SIZE,
        )?;

        Ok(Paginator {
            current_page,
            total_pages,
            total_items,
            items,
        })
    }
}
