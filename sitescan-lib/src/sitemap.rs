//! Page discovery through `sitemap.xml`

use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use url::Url;

use crate::{client::Client, types::ScanMode};

/// Upper bound on nested sitemaps followed from a sitemap index
const MAX_NESTED_SITEMAPS: usize = 50;

/// Discover the pages of a site through its `sitemap.xml`.
///
/// Returns every `<loc>` entry in document order; duplicates are kept
/// and deduplicated downstream. Nested sitemaps referenced from a
/// `<sitemapindex>` are followed one level deep.
///
/// All failure modes (fetch failure, malformed XML, empty document)
/// degrade to a single-element list containing the domain itself; this
/// function never returns an error to its caller.
pub async fn extract_pages(client: &Client, domain: &Url) -> Vec<Url> {
    let sitemap_url = match domain.join("/sitemap.xml") {
        Ok(url) => url,
        Err(e) => {
            warn!("Cannot build sitemap URL for {domain}: {e}");
            return vec![domain.clone()];
        }
    };

    let body = match client.fetch_page(&sitemap_url, ScanMode::Page).await {
        Ok(body) => body,
        Err(e) => {
            debug!("Cannot fetch {sitemap_url}: {e}");
            return vec![domain.clone()];
        }
    };

    let (mut pages, sitemaps) = parse_locs(domain, &body);

    // A sitemap index points at nested sitemaps instead of pages
    for sitemap in sitemaps.into_iter().take(MAX_NESTED_SITEMAPS) {
        match client.fetch_page(&sitemap, ScanMode::Page).await {
            Ok(body) => pages.extend(parse_locs(domain, &body).0),
            Err(e) => debug!("Cannot fetch nested sitemap {sitemap}: {e}"),
        }
    }

    if pages.is_empty() {
        vec![domain.clone()]
    } else {
        pages
    }
}

/// Collect the `<loc>` entries of a sitemap document in document order.
///
/// Returns page URLs and nested sitemap URLs separately; a document is
/// treated as an index once a `<sitemapindex>` element is seen.
fn parse_locs(base: &Url, xml: &str) -> (Vec<Url>, Vec<Url>) {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_loc = false;
    let mut saw_index = false;
    let mut locs = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.name().as_ref().ends_with(b"sitemapindex") {
                    saw_index = true;
                } else if e.name().as_ref().ends_with(b"loc") {
                    in_loc = true;
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref().ends_with(b"loc") {
                    in_loc = false;
                }
            }
            Ok(Event::Text(t)) => {
                if in_loc {
                    match t.unescape() {
                        Ok(text) => match base.join(text.as_ref()) {
                            Ok(url) => locs.push(url),
                            Err(e) => warn!("Ignoring invalid sitemap entry `{text}`: {e}"),
                        },
                        Err(e) => warn!("Cannot decode sitemap entry: {e}"),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("Malformed sitemap for {base}: {e}");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    if saw_index {
        (Vec::new(), locs)
    } else {
        (locs, Vec::new())
    }
}
