//! Issue detection
//!
//! Issues are produced by two classes of reporters:
//! - page reporters, predicates evaluated once per page as reports stream in
//! - multipage reporters, whole-crawl scans over a `CrawlSnapshot`
//!
//! `ReportManager` drives both and funnels every issue through one writer.
//! `IssueService` aggregates persisted issues for presentation.

mod language;
mod manager;
mod multipage;
mod page;
mod service;

pub use language::is_valid_language;
pub use manager::{IssueStream, ReportManager};
pub use multipage::{
    default_multipage_reporters, CrawlSnapshot, HreflangRow, LinkRow, MultipageIssueReporter,
    PageRow,
};
pub use page::{default_page_reporters, PageIssueReporter};
pub use service::{IssueCount, IssueGroup, IssueService, Paginator, PAGE_SIZE};

use serde::Serialize;

/// Severity class of an error type, used for aggregate counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(i32)]
pub enum Priority {
    Critical = 1,
    Alert = 2,
    Warning = 3,
}

macro_rules! error_types {
    ($($variant:ident = $code:literal => ($name:literal, $priority:ident)),+ $(,)?) => {
        /// Kind of issue
        ///
        /// The integer codes are persisted and must never be reassigned.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[repr(i32)]
        pub enum ErrorType {
            $($variant = $code),+
        }

        impl ErrorType {
            /// Every error type, in code order
            pub const ALL: &'static [ErrorType] = &[$(ErrorType::$variant),+];

            pub fn code(self) -> i32 {
                self as i32
            }

            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(ErrorType::$variant),)+
                    _ => None,
                }
            }

            /// Stable machine-readable name
            pub fn name(self) -> &'static str {
                match self {
                    $(ErrorType::$variant => $name),+
                }
            }

            pub fn priority(self) -> Priority {
                match self {
                    $(ErrorType::$variant => Priority::$priority),+
                }
            }
        }
    };
}

error_types! {
    Error30x = 1 => ("error_30x", Alert),
    Error40x = 2 => ("error_40x", Critical),
    Error50x = 3 => ("error_50x", Critical),
    EmptyTitle = 4 => ("empty_title", Critical),
    ShortTitle = 5 => ("short_title", Warning),
    LongTitle = 6 => ("long_title", Warning),
    EmptyDescription = 7 => ("empty_description", Alert),
    ShortDescription = 8 => ("short_description", Warning),
    LongDescription = 9 => ("long_description", Warning),
    LittleContent = 10 => ("little_content", Warning),
    ImagesWithNoAlt = 11 => ("images_no_alt", Alert),
    NoH1 = 12 => ("no_h1", Alert),
    NoLang = 13 => ("no_lang", Alert),
    HttpLinks = 14 => ("http_links", Alert),
    TooManyLinks = 15 => ("too_many_links", Warning),
    InternalNoFollow = 16 => ("internal_nofollow", Alert),
    ExternalWithoutNoFollow = 17 => ("external_follow", Warning),
    NotValidHeadings = 18 => ("not_valid_headings", Warning),
    InvalidLanguage = 19 => ("invalid_lang", Alert),
    HttpScheme = 20 => ("http_scheme", Alert),
    CanonicalMultipleTags = 21 => ("canonical_multiple_tags", Critical),
    CanonicalRelativeUrl = 22 => ("canonical_relative_url", Alert),
    CanonicalMismatch = 23 => ("canonical_mismatch", Critical),
    HreflangMissingSelfReference = 24 => ("hreflang_missing_self_reference", Alert),
    HreflangMissingXDefault = 25 => ("hreflang_missing_x_default", Warning),
    HreflangRelativeUrl = 26 => ("hreflang_relative_url", Alert),
    MultipleTitleTags = 27 => ("multiple_title_tags", Alert),
    MultipleDescriptionTags = 28 => ("multiple_description_tags", Alert),
    MissingHsts = 29 => ("missing_hsts", Warning),
    Timeout = 30 => ("timeout", Critical),
    Depth = 31 => ("depth", Warning),
    Blocked = 32 => ("blocked_by_robotstxt", Alert),
    DuplicatedTitle = 33 => ("duplicated_title", Critical),
    DuplicatedDescription = 34 => ("duplicated_description", Alert),
    RedirectChain = 35 => ("redirect_chain", Critical),
    RedirectLoop = 36 => ("redirect_loop", Critical),
    CanonicalizedToNonCanonical = 37 => ("canonicalized_non_canonical", Critical),
    Orphan = 38 => ("orphan", Alert),
    HreflangsReturnLink = 39 => ("hreflang_return_link", Alert),
    HreflangToNonCanonical = 40 => ("hreflang_to_non_canonical", Alert),
    HreflangNoindexable = 41 => ("hreflang_noindexable", Alert),
    InternalNoFollowIndexable = 42 => ("internal_nofollow_indexable", Alert),
    IncomingFollowNofollow = 43 => ("incoming_follow_nofollow", Alert),
}

/// One detected defect of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Issue {
    pub page_report_id: i64,
    pub crawl_id: i64,
    pub error_type: ErrorType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable_and_unique() {
        assert_eq!(ErrorType::Error30x.code(), 1);
        assert_eq!(ErrorType::Blocked.code(), 32);
        assert_eq!(ErrorType::IncomingFollowNofollow.code(), 43);

        for (i, error_type) in ErrorType::ALL.iter().enumerate() {
            assert_eq!(error_type.code(), i as i32 + 1);
            assert_eq!(ErrorType::from_code(error_type.code()), Some(*error_type));
        }

        assert_eq!(ErrorType::from_code(0), None);
        assert_eq!(ErrorType::from_code(999), None);
    }

    #[test]
    fn test_priorities() {
        assert_eq!(ErrorType::EmptyTitle.priority(), Priority::Critical);
        assert_eq!(ErrorType::EmptyDescription.priority(), Priority::Alert);
        assert_eq!(ErrorType::ShortTitle.priority(), Priority::Warning);
        assert_eq!(ErrorType::RedirectLoop.priority(), Priority::Critical);
    }
}
