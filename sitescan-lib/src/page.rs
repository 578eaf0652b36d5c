//! Fetching a page and collecting its anchors

use std::collections::HashSet;

use log::warn;
use scraper::{Html, Selector};
use url::Url;

use crate::{
    classify::classify,
    client::Client,
    types::{CandidateLink, PageStatus, ScanMode},
};

/// Result of collecting the links of one page.
#[derive(Debug)]
pub struct PageLinks {
    /// Whether the page itself could be fetched
    pub status: PageStatus,
    /// Checkable links found on the page, deduplicated by resolved URL
    pub candidates: Vec<CandidateLink>,
}

/// Fetch one page and collect every anchor worth checking.
///
/// Candidates are deduplicated by resolved absolute URL within this
/// page. A failed page fetch is reported as [`PageStatus::Error`] with
/// zero candidates; it never aborts the surrounding scan.
pub async fn collect_links(client: &Client, page: &Url, mode: ScanMode) -> PageLinks {
    let html = match client.fetch_page(page, mode).await {
        Ok(html) => html,
        Err(e) => {
            warn!("Cannot fetch {page}: {e}");
            return PageLinks {
                status: PageStatus::Error,
                candidates: Vec::new(),
            };
        }
    };
    PageLinks {
        status: PageStatus::Success,
        candidates: extract_candidates(&html, page),
    }
}

/// Extract and classify the anchors of an HTML document.
///
/// This is synchronous on purpose: the parsed document must not live
/// across an await point.
fn extract_candidates(html: &str, page: &Url) -> Vec<CandidateLink> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("`a[href]` is a valid selector");

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(uri) = classify(href, page) else {
            continue;
        };
        if !seen.insert(uri.clone()) {
            continue;
        }
        let anchor_text = element.text().collect::<String>().trim().to_string();
        candidates.push(CandidateLink {
            uri,
            anchor_text,
            source_page: page.clone(),
        });
    }
    candidates
}
