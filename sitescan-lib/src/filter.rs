use regex::RegexSet;
use url::Url;

/// Include and exclude rules applied to resolved candidate URLs.
///
/// Includes take precedence over excludes. With includes and no
/// excludes, everything that is not included is skipped.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// URLs matching this set are always checked
    pub includes: Option<RegexSet>,
    /// URLs matching this set are ignored, except when they also match
    /// against `includes`
    pub excludes: Option<RegexSet>,
}

impl Filter {
    /// Whether the given URL should be skipped
    #[must_use]
    pub fn is_excluded(&self, url: &Url) -> bool {
        let input = url.as_str();
        if let Some(includes) = &self.includes {
            if includes.is_match(input) {
                return false;
            }
            if self.excludes.is_none() {
                return true;
            }
        }
        matches!(&self.excludes, Some(excludes) if excludes.is_match(input))
    }
}
