use std::{collections::HashSet, fmt::Display};

use http::StatusCode;
use serde::{Serialize, Serializer};

const ICON_OK: &str = "✔";
const ICON_REDIRECTED: &str = "⇄";
const ICON_EXCLUDED: &str = "?";
const ICON_BROKEN: &str = "✗";
const ICON_TIMEOUT: &str = "⧖";

/// Response status of a single link check.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum Status {
    /// Request was successful
    Ok(StatusCode),
    /// Request failed with an HTTP error code
    Broken(StatusCode),
    /// Got redirected to a different resource.
    /// Only surfaces in site scans, where redirects are not followed and
    /// the redirect target stays opaque.
    Redirected(StatusCode),
    /// Request timed out
    Timeout(Option<StatusCode>),
    /// Low-level network error while loading the resource
    Error(String),
    /// Resource was excluded from checking
    Excluded,
}

impl Status {
    /// Create a status object from a response status code and the set of
    /// accepted status codes.
    #[must_use]
    pub fn new(code: StatusCode, accepted: Option<&HashSet<StatusCode>>) -> Self {
        if let Some(accepted) = accepted {
            if accepted.contains(&code) {
                return Status::Ok(code);
            }
        }
        if code.is_success() {
            Status::Ok(code)
        } else if code.is_redirection() {
            Status::Redirected(code)
        } else {
            Status::Broken(code)
        }
    }

    #[inline]
    #[must_use]
    /// Returns `true` if the check was successful
    pub const fn is_success(&self) -> bool {
        matches!(self, Status::Ok(_))
    }

    #[inline]
    #[must_use]
    /// Returns `true` if the target responded with a redirect
    pub const fn is_redirected(&self) -> bool {
        matches!(self, Status::Redirected(_))
    }

    #[inline]
    #[must_use]
    /// Returns `true` if the resource was excluded from checking
    pub const fn is_excluded(&self) -> bool {
        matches!(self, Status::Excluded)
    }

    /// Numeric status code for reporting.
    ///
    /// Network failures and timeouts without a response map to `0`.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok(code) | Status::Broken(code) | Status::Redirected(code) => code.as_u16(),
            Status::Timeout(Some(code)) => code.as_u16(),
            Status::Timeout(None) | Status::Error(_) | Status::Excluded => 0,
        }
    }

    /// Return the status code as string, with a placeholder for outcomes
    /// that carry no code
    #[must_use]
    pub fn code_as_string(&self) -> String {
        match self {
            Status::Ok(code) | Status::Broken(code) | Status::Redirected(code) => {
                code.as_str().to_string()
            }
            Status::Timeout(Some(code)) => code.as_str().to_string(),
            Status::Timeout(None) => "TIMEOUT".to_string(),
            Status::Error(_) => "ERROR".to_string(),
            Status::Excluded => "EXCLUDED".to_string(),
        }
    }

    /// Return more details about the status (if any)
    #[must_use]
    pub fn details(&self) -> Option<String> {
        match self {
            Status::Redirected(code) => Some(format!(
                "Redirected with status {code}; the redirect was not followed"
            )),
            Status::Timeout(_) => Some("Request timed out".to_string()),
            Status::Error(e) => Some(e.clone()),
            Status::Ok(_) | Status::Broken(_) | Status::Excluded => None,
        }
    }

    #[must_use]
    /// Return a unicode icon to visualize the status
    pub const fn icon(&self) -> &str {
        match self {
            Status::Ok(_) => ICON_OK,
            Status::Broken(_) => ICON_BROKEN,
            Status::Redirected(_) => ICON_REDIRECTED,
            Status::Timeout(_) => ICON_TIMEOUT,
            Status::Error(_) => ICON_BROKEN,
            Status::Excluded => ICON_EXCLUDED,
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok(code) => write!(f, "OK ({code})"),
            Status::Broken(code) => write!(f, "Failed ({code})"),
            Status::Redirected(code) => write!(f, "Redirect ({code})"),
            Status::Timeout(Some(code)) => write!(f, "Timeout ({code})"),
            Status::Timeout(None) => f.write_str("Timeout"),
            Status::Error(e) => write!(f, "Network error ({e})"),
            Status::Excluded => f.write_str("Excluded"),
        }
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl From<reqwest::Error> for Status {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Status::Timeout(e.status())
        } else if e.is_connect() {
            Status::Error(format!("Failed to connect: {e}"))
        } else if e.is_redirect() {
            Status::Error(format!("Too many redirects: {e}"))
        } else {
            Status::Error(format!("Network error: {e}"))
        }
    }
}
