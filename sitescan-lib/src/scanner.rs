//! Scan orchestration
//!
//! The [`Scanner`] drives a scan end to end: it discovers pages,
//! collects their links and validates them in fixed-size batches,
//! publishing a fresh [`ScanState`] snapshot after every unit of work so
//! partial results are visible mid-scan.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use log::debug;
use tokio::sync::watch;
use url::Url;

use crate::{
    cache::ResponseCache,
    cancel::CancelToken,
    client::Client,
    page,
    sitemap,
    state::{ScanPhase, ScanState},
    status::Status,
    types::{CandidateLink, ScanMode, ScannedPage, Verdict},
};

/// Default number of link validations dispatched per batch, 10.
///
/// Balances throughput against the risk of overwhelming the target
/// host's goodwill and the local connection pool.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Drives page and site scans.
///
/// The scanner owns the single mutable [`ScanState`] of a scan; the
/// presentation layer reads published snapshots and never mutates it.
#[derive(Debug)]
pub struct Scanner {
    client: Client,
    cache: Arc<ResponseCache>,
    batch_size: usize,
    token: CancelToken,
    tx: watch::Sender<ScanState>,
}

impl Scanner {
    /// Create a scanner around the given client and response cache
    #[must_use]
    pub fn new(client: Client, cache: ResponseCache, batch_size: usize) -> Self {
        let (tx, _) = watch::channel(ScanState::new());
        Self {
            client,
            cache: Arc::new(cache),
            batch_size: batch_size.max(1),
            token: CancelToken::new(),
            tx,
        }
    }

    /// Snapshot stream for the presentation layer.
    ///
    /// The channel holds the most recent [`ScanState`] and closes when
    /// the scanner is dropped.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.tx.subscribe()
    }

    /// Token which aborts the running scan when cancelled
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Scan every page of a site discovered through its sitemap.
    ///
    /// Pages are walked strictly sequentially; the aggregate link list
    /// is then validated in batches, once per unique URL, with broken
    /// URLs attributed to every page that referenced them. A single
    /// page's failure never aborts the scan.
    pub async fn scan_site(&self, domain: &Url) -> ScanState {
        let mut state = ScanState::new();
        state.phase = ScanPhase::Scanning;
        self.publish(&state);

        let Some(pages) = self.cancellable(sitemap::extract_pages(&self.client, domain)).await
        else {
            return self.finish(state, ScanPhase::Cancelled);
        };

        // One entry per unique page; sitemaps may repeat themselves
        let mut seen_pages = HashSet::new();
        let pages: Vec<Url> = pages
            .into_iter()
            .filter(|page| seen_pages.insert(page.clone()))
            .collect();
        state.total_pages = pages.len();
        self.publish(&state);

        // Stage 1: walk the pages sequentially and collect candidates
        let mut candidates: Vec<CandidateLink> = Vec::new();
        for page_url in pages {
            if self.token.is_cancelled() {
                return self.finish(state, ScanPhase::Cancelled);
            }
            state.pages.push(ScannedPage::pending(page_url.clone()));
            self.publish(&state);

            let Some(links) = self
                .cancellable(page::collect_links(&self.client, &page_url, ScanMode::Site))
                .await
            else {
                return self.finish(state, ScanPhase::Cancelled);
            };

            if let Some(entry) = state.page_mut(&page_url) {
                entry.status = links.status;
                entry.link_count = links.candidates.len();
            }
            state.pages_scanned += 1;
            candidates.extend(links.candidates);
            self.publish(&state);
        }

        // Stage 2: validate once per unique URL, remembering every page
        // that referenced it. The total is fixed up front so progress
        // only moves forward.
        let mut order: Vec<Url> = Vec::new();
        let mut referrers: HashMap<Url, Vec<CandidateLink>> = HashMap::new();
        for link in candidates {
            if self.client.is_excluded(&link.uri) {
                debug!("Excluded {}", link.uri);
                continue;
            }
            referrers
                .entry(link.uri.clone())
                .or_insert_with(|| {
                    order.push(link.uri.clone());
                    Vec::new()
                })
                .push(link);
        }
        state.total_links = order.len();
        self.publish(&state);

        for batch in order.chunks(self.batch_size) {
            if self.token.is_cancelled() {
                return self.finish(state, ScanPhase::Cancelled);
            }
            let checks = batch.iter().map(|url| self.check_url(url, ScanMode::Site));
            let Some(statuses) = self.cancellable(join_all(checks)).await else {
                return self.finish(state, ScanPhase::Cancelled);
            };

            state.checked_links += batch.len();
            for (url, status) in batch.iter().zip(statuses) {
                for link in &referrers[url] {
                    if let Some(verdict) = Verdict::from_status(link, status.clone(), ScanMode::Site)
                    {
                        if let Some(entry) = state.page_mut(&link.source_page) {
                            entry.broken_count += 1;
                        }
                        state.broken.push(verdict);
                    }
                }
            }
            self.publish(&state);
        }

        self.finish(state, ScanPhase::Completed)
    }

    /// Scan the links of a single rendered page, following redirects
    pub async fn scan_page(&self, page_url: &Url) -> ScanState {
        let mut state = ScanState::new();
        state.phase = ScanPhase::Scanning;
        state.total_pages = 1;
        state.pages.push(ScannedPage::pending(page_url.clone()));
        self.publish(&state);

        let Some(links) = self
            .cancellable(page::collect_links(&self.client, page_url, ScanMode::Page))
            .await
        else {
            return self.finish(state, ScanPhase::Cancelled);
        };

        let link_count = links.candidates.len();
        let mut candidates = Vec::new();
        for link in links.candidates {
            if self.client.is_excluded(&link.uri) {
                debug!("Excluded {}", link.uri);
            } else {
                candidates.push(link);
            }
        }

        if let Some(entry) = state.page_mut(page_url) {
            entry.status = links.status;
            entry.link_count = link_count;
        }
        state.pages_scanned = 1;
        state.total_links = candidates.len();
        self.publish(&state);

        for batch in candidates.chunks(self.batch_size) {
            if self.token.is_cancelled() {
                return self.finish(state, ScanPhase::Cancelled);
            }
            let checks = batch
                .iter()
                .map(|link| self.check_url(&link.uri, ScanMode::Page));
            let Some(statuses) = self.cancellable(join_all(checks)).await else {
                return self.finish(state, ScanPhase::Cancelled);
            };

            state.checked_links += batch.len();
            for (link, status) in batch.iter().zip(statuses) {
                if let Some(verdict) = Verdict::from_status(link, status, ScanMode::Page) {
                    if let Some(entry) = state.page_mut(&link.source_page) {
                        entry.broken_count += 1;
                    }
                    state.broken.push(verdict);
                }
            }
            self.publish(&state);
        }

        self.finish(state, ScanPhase::Completed)
    }

    /// Validate one URL, going through the response cache so each unique
    /// URL hits the network at most once per TTL window
    async fn check_url(&self, url: &Url, mode: ScanMode) -> Status {
        if let Some(status) = self.cache.get(url) {
            debug!("Cache hit for {url}");
            return status;
        }
        let status = self.client.check_status(url, mode).await;
        self.cache.insert(url.clone(), status.clone());
        status
    }

    /// Race a unit of work against cancellation; `None` means the scan
    /// was aborted and the in-flight request abandoned
    async fn cancellable<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        tokio::select! {
            () = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }

    fn finish(&self, mut state: ScanState, phase: ScanPhase) -> ScanState {
        state.phase = phase;
        self.publish(&state);
        state
    }

    fn publish(&self, state: &ScanState) {
        self.tx.send_replace(state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::ClientBuilder, types::PageStatus};
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid URL")
    }

    fn scanner() -> Scanner {
        Scanner::new(
            ClientBuilder::default().client().unwrap(),
            ResponseCache::default(),
            DEFAULT_BATCH_SIZE,
        )
    }

    async fn mount_get(server: &MockServer, route: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_site_scan_dedups_and_attributes_to_every_source_page() {
        let server = MockServer::start().await;
        let sitemap = format!(
            "<urlset><url><loc>{0}/p1</loc></url><url><loc>{0}/p2</loc></url></urlset>",
            server.uri()
        );
        mount_get(
            &server,
            "/sitemap.xml",
            ResponseTemplate::new(200).set_body_string(sitemap),
        )
        .await;
        mount_get(
            &server,
            "/p1",
            ResponseTemplate::new(200).set_body_string(
                r##"<a href="/dead">Dead</a><a href="/ok">Fine</a><a href="#top">Top</a>"##,
            ),
        )
        .await;
        mount_get(
            &server,
            "/p2",
            ResponseTemplate::new(200).set_body_string(r#"<a href="/dead">Dead again</a>"#),
        )
        .await;
        // The shared broken target must be validated exactly once
        Mock::given(method("HEAD"))
            .and(path("/dead"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let scanner = scanner();
        let state = scanner.scan_site(&url(&server.uri())).await;

        assert_eq!(state.phase, ScanPhase::Completed);
        assert_eq!(state.total_pages, 2);
        assert_eq!(state.pages_scanned, 2);
        assert_eq!(state.total_links, 2);
        assert_eq!(state.checked_links, 2);
        assert_eq!(state.progress(), 100);

        let p1 = &state.pages[0];
        let p2 = &state.pages[1];
        assert_eq!(p1.status, PageStatus::Success);
        assert_eq!(p1.link_count, 2);
        assert_eq!(p1.broken_count, 1);
        assert_eq!(p2.link_count, 1);
        assert_eq!(p2.broken_count, 1);

        // One verdict per referencing page for the shared broken URL
        assert_eq!(state.broken.len(), 2);
        let sources: Vec<_> = state
            .broken
            .iter()
            .map(|verdict| verdict.source_page.path().to_string())
            .collect();
        assert!(sources.contains(&"/p1".to_string()));
        assert!(sources.contains(&"/p2".to_string()));
        for verdict in &state.broken {
            assert_eq!(verdict.status.code(), 404);
        }
    }

    #[tokio::test]
    async fn test_page_failure_is_contained() {
        let server = MockServer::start().await;
        let sitemap = format!(
            "<urlset>\
                <url><loc>{0}/a</loc></url>\
                <url><loc>{0}/b</loc></url>\
                <url><loc>{0}/c</loc></url>\
            </urlset>",
            server.uri()
        );
        mount_get(
            &server,
            "/sitemap.xml",
            ResponseTemplate::new(200).set_body_string(sitemap),
        )
        .await;
        mount_get(
            &server,
            "/a",
            ResponseTemplate::new(200).set_body_string(r#"<a href="/dead-a">A</a>"#),
        )
        .await;
        mount_get(&server, "/b", ResponseTemplate::new(500)).await;
        mount_get(
            &server,
            "/c",
            ResponseTemplate::new(200).set_body_string(r#"<a href="/dead-c">C</a>"#),
        )
        .await;
        for route in ["/dead-a", "/dead-c"] {
            Mock::given(method("HEAD"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;
        }

        let scanner = scanner();
        let state = scanner.scan_site(&url(&server.uri())).await;

        assert_eq!(state.phase, ScanPhase::Completed);
        assert_eq!(state.pages[0].status, PageStatus::Success);
        assert_eq!(state.pages[1].status, PageStatus::Error);
        assert_eq!(state.pages[1].link_count, 0);
        assert_eq!(state.pages[2].status, PageStatus::Success);
        assert_eq!(state.broken.len(), 2);
    }

    #[tokio::test]
    async fn test_page_scan_end_to_end() {
        let server = MockServer::start().await;
        let dead_server = MockServer::start().await;

        let html = format!(
            r##"<html><body>
                <a href="/">Home</a>
                <a href="#top">Top</a>
                <a href="mailto:a@b.com">Mail</a>
                <a href="{0}/404">Gone</a>
            </body></html>"##,
            dead_server.uri()
        );
        mount_get(&server, "/page", ResponseTemplate::new(200).set_body_string(html)).await;
        Mock::given(method("HEAD"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&dead_server)
            .await;

        let scanner = scanner();
        let page_url = url(&format!("{}/page", server.uri()));
        let state = scanner.scan_page(&page_url).await;

        assert_eq!(state.phase, ScanPhase::Completed);
        assert_eq!(state.pages[0].link_count, 2);
        assert_eq!(state.broken.len(), 1);
        assert_eq!(state.broken[0].uri, url(&format!("{}/404", dead_server.uri())));
        assert_eq!(state.broken[0].status.code(), 404);
        assert_eq!(state.broken[0].anchor_text, "Gone");
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let server = MockServer::start().await;
        let links: String = (0..25)
            .map(|i| format!(r#"<a href="/link-{i}">L{i}</a>"#))
            .collect();
        mount_get(&server, "/page", ResponseTemplate::new(200).set_body_string(links)).await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let scanner = Scanner::new(
            ClientBuilder::default().client().unwrap(),
            ResponseCache::default(),
            4,
        );
        let mut updates = scanner.subscribe();
        let page_url = url(&format!("{}/page", server.uri()));

        let handle = tokio::spawn(async move { scanner.scan_page(&page_url).await });

        let mut observed = Vec::new();
        while updates.changed().await.is_ok() {
            let state = updates.borrow().clone();
            observed.push((state.checked_links, state.progress()));
        }
        let state = handle.await.expect("scan task panicked");

        assert_eq!(state.phase, ScanPhase::Completed);
        assert_eq!(state.checked_links, 25);
        assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(observed.iter().all(|(_, progress)| *progress <= 100));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let server = MockServer::start().await;
        mount_get(&server, "/sitemap.xml", ResponseTemplate::new(404)).await;

        let scanner = scanner();
        scanner.cancel_token().cancel();
        let state = scanner.scan_site(&url(&server.uri())).await;

        assert_eq!(state.phase, ScanPhase::Cancelled);
        assert!(state.broken.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_anchors_validated_once() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/page",
            ResponseTemplate::new(200)
                .set_body_string(r#"<a href="/target">One</a><a href="/target">Two</a>"#),
        )
        .await;
        Mock::given(method("HEAD"))
            .and(path("/target"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let scanner = scanner();
        let state = scanner.scan_page(&url(&format!("{}/page", server.uri()))).await;

        assert_eq!(state.pages[0].link_count, 1);
        assert_eq!(state.checked_links, 1);
        assert!(state.broken.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_scan_hits_the_cache() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/page",
            ResponseTemplate::new(200).set_body_string(r#"<a href="/target">T</a>"#),
        )
        .await;
        // Two scans, one validation
        Mock::given(method("HEAD"))
            .and(path("/target"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let scanner = scanner();
        let page_url = url(&format!("{}/page", server.uri()));
        let first = scanner.scan_page(&page_url).await;
        let second = scanner.scan_page(&page_url).await;

        assert!(first.is_success());
        assert!(second.is_success());
    }
}
