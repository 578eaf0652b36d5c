use log::warn;
use url::Url;

/// Pseudo-links which never reach the network
const SKIP_PREFIXES: &[&str] = &["#", "mailto:", "tel:", "javascript:"];

/// Decide whether a raw `href` is checkable and, if so, resolve it to an
/// absolute URL against the page it was found on.
///
/// Empty hrefs, anchors, `mailto:`, `tel:` and `javascript:` pseudo-links
/// are skipped. A href that cannot be resolved is dropped with a warning
/// instead of aborting the surrounding scan.
#[must_use]
pub fn classify(href: &str, page: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || SKIP_PREFIXES.iter().any(|prefix| href.starts_with(prefix)) {
        return None;
    }
    match page.join(href) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Cannot resolve `{href}` against {page}: {e}");
            None
        }
    }
}
