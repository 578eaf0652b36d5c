//! `sitescan-lib` is a library for finding broken links on rendered web
//! pages and whole sites.
//!
//! A scan either checks the anchors of a single page or crawls a site
//! seeded from its `sitemap.xml`, validating every discovered link with
//! a `HEAD` request and reporting the broken ones together with the
//! pages they were found on.
//!
//! "Hello world" example:
//! ```no_run
//! use sitescan_lib::{ClientBuilder, ResponseCache, Result, Scanner, DEFAULT_BATCH_SIZE};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClientBuilder::default().client()?;
//!     let scanner = Scanner::new(client, ResponseCache::default(), DEFAULT_BATCH_SIZE);
//!
//!     let page = Url::parse("https://example.org").expect("valid URL");
//!     let state = scanner.scan_page(&page).await;
//!     for verdict in &state.broken {
//!         println!("{verdict}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For site-wide scans use [`Scanner::scan_site`], subscribe to progress
//! snapshots with [`Scanner::subscribe`], and abort early through
//! [`Scanner::cancel_token`].

mod cache;
mod cancel;
mod classify;
mod client;
mod error;
mod filter;
mod page;
mod retry;
mod scanner;
mod sitemap;
mod state;
mod status;
mod types;

pub use cache::{ResponseCache, DEFAULT_CACHE_TTL};
pub use cancel::CancelToken;
pub use classify::classify;
pub use client::{
    Client, ClientBuilder, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT,
};
pub use error::{ErrorKind, Result};
pub use filter::Filter;
pub use page::{collect_links, PageLinks};
pub use retry::{
    retry_with_backoff, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_WAIT_TIME,
};
pub use scanner::{Scanner, DEFAULT_BATCH_SIZE};
pub use sitemap::extract_pages;
pub use state::{ScanPhase, ScanState};
pub use status::Status;
pub use types::{CandidateLink, PageStatus, ScanMode, ScannedPage, Verdict};
