use serde::Serialize;
use url::Url;

use crate::types::{ScannedPage, Verdict};

/// Lifecycle of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    /// No scan has started yet
    Idle,
    /// A scan is in flight
    Scanning,
    /// All pages were processed
    Completed,
    /// The scan was aborted before all pages were processed
    Cancelled,
}

/// Aggregate state of one scan.
///
/// A single live instance exists per active scan. The scanner is its
/// only writer; consumers observe snapshots through a watch channel and
/// never mutate it.
#[derive(Debug, Clone, Serialize)]
pub struct ScanState {
    /// Where the scan currently is in its lifecycle
    pub phase: ScanPhase,
    /// Per-page breakdown, one entry per unique page
    pub pages: Vec<ScannedPage>,
    /// Accumulated broken-link findings
    pub broken: Vec<Verdict>,
    /// Unique links validated so far
    pub checked_links: usize,
    /// Unique links to validate in total.
    /// Fixed before validation begins, so progress only moves forward.
    pub total_links: usize,
    /// Pages whose link collection has finished
    pub pages_scanned: usize,
    /// Pages the scan will visit in total
    pub total_pages: usize,
}

impl ScanState {
    /// An empty state in the `Idle` phase
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: ScanPhase::Idle,
            pages: Vec::new(),
            broken: Vec::new(),
            checked_links: 0,
            total_links: 0,
            pages_scanned: 0,
            total_pages: 0,
        }
    }

    /// Overall progress in percent, `round(checked / total * 100)`.
    /// Never exceeds 100.
    #[must_use]
    pub fn progress(&self) -> u8 {
        if self.total_links == 0 {
            return 0;
        }
        let percent = (self.checked_links as f64 / self.total_links as f64 * 100.0).round();
        percent.min(100.0) as u8
    }

    /// Whether the scan finished without finding broken links
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.phase == ScanPhase::Completed && self.broken.is_empty()
    }

    pub(crate) fn page_mut(&mut self, url: &Url) -> Option<&mut ScannedPage> {
        self.pages.iter_mut().find(|page| page.url == *url)
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}
