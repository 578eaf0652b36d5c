use http::StatusCode;
use thiserror::Error;
use url::Url;

/// Possible errors when interacting with `sitescan_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Network error while trying to connect to an endpoint
    #[error("Network error while trying to connect to an endpoint")]
    NetworkRequest(#[from] reqwest::Error),
    /// The request client cannot be created
    #[error("Cannot build the request client")]
    BuildRequestClient(#[source] reqwest::Error),
    /// The given string cannot be parsed into a valid URL
    #[error("Cannot parse {0} as URL: {1}")]
    ParseUrl(String, url::ParseError),
    /// The given header could not be parsed.
    /// A possible error when converting a `HeaderValue` from a string or byte
    /// slice.
    #[error("Header could not be parsed")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
    /// A page fetch returned an unexpected status code
    #[error("Unexpected status code for {0}: {1}")]
    RejectedStatusCode(Url, StatusCode),
}

impl From<(String, url::ParseError)> for ErrorKind {
    fn from(value: (String, url::ParseError)) -> Self {
        Self::ParseUrl(value.0, value.1)
    }
}

/// The result type of `sitescan_lib`
pub type Result<T> = std::result::Result<T, ErrorKind>;
