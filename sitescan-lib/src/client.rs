//! Handler of the HTTP side of a scan.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` issues link checks and page fetches; `ClientBuilder` exposes
//! a finer level of granularity for building a `Client`.

use std::{collections::HashSet, time::Duration};

use http::{
    header::{self, HeaderMap, HeaderValue},
    StatusCode,
};
use regex::RegexSet;
use typed_builder::TypedBuilder;
use url::Url;

use crate::{
    error::{ErrorKind, Result},
    filter::Filter,
    retry::{retry_with_backoff, RetryExt, RetryPolicy},
    status::Status,
    types::ScanMode,
};

/// Default number of redirects before a followed request is deemed as
/// failed, 5.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
/// Default timeout in seconds before a request is deemed as failed, 20.
pub const DEFAULT_TIMEOUT: usize = 20;
/// Default user agent, `sitescan-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("sitescan/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
pub struct ClientBuilder {
    /// Links matching this set of regular expressions are **always**
    /// checked. This has higher precedence over [`ClientBuilder::excludes`].
    includes: Option<RegexSet>,
    /// Links matching this set of regular expressions are ignored,
    /// **except** when a link also matches against
    /// [`ClientBuilder::includes`].
    excludes: Option<RegexSet>,
    /// Maximum number of redirects per followed request before returning
    /// an error.
    #[builder(default = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,
    /// Backoff policy for transient failures.
    ///
    /// The default policy performs no retries: a failed link check is
    /// reported immediately.
    retry_policy: RetryPolicy,
    /// User-agent used for checking links.
    ///
    /// *NOTE*: This may be helpful for bypassing certain firewalls.
    // Faking the user agent is necessary for some websites, unfortunately.
    // Otherwise we get a 403 from the firewall.
    #[builder(default = String::from(DEFAULT_USER_AGENT))]
    user_agent: String,
    /// When `true`, accept invalid SSL certificates.
    allow_insecure: bool,
    /// Sets the default headers for every request.
    ///
    /// This allows working around validation issues on some websites.
    custom_headers: HeaderMap,
    /// HTTP method used for link checks, e.g. `GET` or `HEAD`.
    #[builder(default = reqwest::Method::HEAD)]
    method: reqwest::Method,
    /// Set of accepted return codes / status codes.
    ///
    /// Unmatched status codes are deemed as errors.
    accepted: Option<HashSet<StatusCode>>,
    /// Response timeout per request.
    #[builder(default = Some(Duration::from_secs(DEFAULT_TIMEOUT as u64)))]
    timeout: Option<Duration>,
}

impl Default for ClientBuilder {
    #[must_use]
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the user-agent is invalid or the underlying
    /// request clients cannot be created.
    pub fn client(self) -> Result<Client> {
        let Self {
            includes,
            excludes,
            max_redirects,
            retry_policy,
            user_agent,
            allow_insecure,
            custom_headers: mut headers,
            method,
            accepted,
            timeout,
        } = self;

        headers.insert(header::USER_AGENT, HeaderValue::from_str(&user_agent)?);

        let make_client = |policy: reqwest::redirect::Policy| {
            let builder = reqwest::ClientBuilder::new()
                .gzip(true)
                .default_headers(headers.clone())
                .danger_accept_invalid_certs(allow_insecure)
                .redirect(policy);

            match timeout {
                Some(t) => builder.timeout(t),
                None => builder,
            }
            .build()
            .map_err(ErrorKind::BuildRequestClient)
        };

        // Page scans follow redirects; site scans keep them opaque and
        // flag them instead
        let follow_client = make_client(reqwest::redirect::Policy::limited(max_redirects))?;
        let manual_client = make_client(reqwest::redirect::Policy::none())?;

        Ok(Client {
            follow_client,
            manual_client,
            filter: Filter { includes, excludes },
            retry_policy,
            method,
            accepted,
        })
    }
}

/// Issues the network requests of a scan.
///
/// See [`ClientBuilder`] which contains sane defaults for all
/// configuration options.
#[derive(Debug, Clone)]
pub struct Client {
    /// Underlying `reqwest` client that follows redirects
    follow_client: reqwest::Client,
    /// Underlying `reqwest` client with redirect following disabled
    manual_client: reqwest::Client,
    /// Rules to decide whether a link is checked or ignored
    filter: Filter,
    /// Backoff policy for transient failures
    retry_policy: RetryPolicy,
    /// HTTP method used for link checks
    method: reqwest::Method,
    /// Set of accepted status codes
    accepted: Option<HashSet<StatusCode>>,
}

impl Client {
    /// Returns whether the given `url` should be ignored from checking
    #[must_use]
    pub fn is_excluded(&self, url: &Url) -> bool {
        self.filter.is_excluded(url)
    }

    /// Check the reachability of a single URL.
    ///
    /// All failures are absorbed into the returned [`Status`]; this
    /// method never bubbles up an error.
    pub async fn check_status(&self, url: &Url, mode: ScanMode) -> Status {
        if self.filter.is_excluded(url) {
            return Status::Excluded;
        }
        let client = match mode {
            ScanMode::Page => &self.follow_client,
            ScanMode::Site => &self.manual_client,
        };
        retry_with_backoff(
            &self.retry_policy,
            || async move {
                match client
                    .request(self.method.clone(), url.clone())
                    .send()
                    .await
                {
                    Ok(response) => Status::new(response.status(), self.accepted.as_ref()),
                    Err(e) => e.into(),
                }
            },
            |status: &Status| status.should_retry(),
        )
        .await
    }

    /// Fetch the text body of a page or sitemap, following redirects.
    ///
    /// Site scans ask intermediaries not to serve stale content.
    ///
    /// # Errors
    ///
    /// Returns an `Err` on network failures and on non-success status
    /// codes.
    pub async fn fetch_page(&self, url: &Url, mode: ScanMode) -> Result<String> {
        let response = retry_with_backoff(
            &self.retry_policy,
            || {
                let mut request = self.follow_client.get(url.clone());
                if mode == ScanMode::Site {
                    request = request.header(header::CACHE_CONTROL, "no-store");
                }
                request.send()
            },
            |result: &std::result::Result<reqwest::Response, reqwest::Error>| {
                result.should_retry()
            },
        )
        .await?;

        if !response.status().is_success() {
            return Err(ErrorKind::RejectedStatusCode(
                url.clone(),
                response.status(),
            ));
        }
        Ok(response.text().await?)
    }
}
