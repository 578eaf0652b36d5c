use std::fmt::Display;

use serde::Serialize;
use url::Url;

use crate::status::Status;

/// How a scan treats redirects and page caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Check the links of a single rendered page.
    /// Redirects are followed; a link that redirects to a reachable
    /// target counts as healthy.
    Page,
    /// Crawl a whole site seeded from its sitemap.
    /// Redirects are not followed and get flagged, and page fetches ask
    /// intermediaries not to serve stale content.
    Site,
}

/// A link discovered on a page, waiting to be validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateLink {
    /// Resolved absolute URL of the link target
    pub uri: Url,
    /// Text content of the anchor element
    pub anchor_text: String,
    /// The page the link was found on
    pub source_page: Url,
}

/// A broken-link finding, attributed to the page it was found on.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Verdict {
    /// The unreachable link target
    pub uri: Url,
    /// Text content of the anchor element
    pub anchor_text: String,
    /// The page the link was found on
    pub source_page: Url,
    /// Outcome of the reachability check
    pub status: Status,
}

impl Verdict {
    /// Build a verdict from a check outcome; `None` means the link is
    /// healthy.
    ///
    /// Redirects count as findings only in site scans, where they are
    /// not followed and the target stays opaque.
    #[must_use]
    pub fn from_status(link: &CandidateLink, status: Status, mode: ScanMode) -> Option<Self> {
        let broken = match &status {
            Status::Ok(_) | Status::Excluded => false,
            Status::Redirected(_) => mode == ScanMode::Site,
            Status::Broken(_) | Status::Timeout(_) | Status::Error(_) => true,
        };
        broken.then(|| Verdict {
            uri: link.uri.clone(),
            anchor_text: link.anchor_text.clone(),
            source_page: link.source_page.clone(),
            status,
        })
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} [{}] on {}",
            self.status.icon(),
            self.uri,
            self.status.code_as_string(),
            self.source_page
        )
    }
}

/// Scan status of a single page within a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// The page scan has started but not finished yet
    Pending,
    /// The page was fetched and its links were collected
    Success,
    /// The page itself could not be fetched
    Error,
}

/// One entry per unique page visited in a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedPage {
    /// The page URL
    pub url: Url,
    /// Number of checkable links found on the page
    pub link_count: usize,
    /// Number of broken links attributed to the page
    pub broken_count: usize,
    /// Outcome of scanning the page itself
    pub status: PageStatus,
}

impl ScannedPage {
    pub(crate) fn pending(url: Url) -> Self {
        Self {
            url,
            link_count: 0,
            broken_count: 0,
            status: PageStatus::Pending,
        }
    }
}
