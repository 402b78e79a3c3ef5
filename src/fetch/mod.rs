//! Configuration sources with conditional fetching
//!
//! A [`ConfigSource`] delivers raw configuration text. The engine hands it
//! the validators stored from the previous successful fetch; the source
//! answers with new content, "not modified", or a failure status.
//!
//! ```text
//! engine.refresh(source)
//!    ↓ load validators (ValidatorStore)
//! FetchRequest { If-None-Match, If-Modified-Since }
//!    ↓ source.fetch()
//! 200 Modified    → parse, apply, store new validators
//! 304 NotModified → nothing changes
//! other status    → Error::Fetch, nothing changes
//! ```
//!
//! HTTP transports live outside this crate and implement [`ConfigSource`]
//! with [`FetchRequest::headers`] and [`FetchResponse::from_status`];
//! connect/read timeouts are theirs to configure. The engine additionally
//! bounds every fetch with its own timeout.

mod file;
mod static_source;

pub use file::FileSource;
pub use static_source::StaticSource;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::persistence::CacheValidators;
use crate::Result;

/// `If-None-Match` header name.
pub const IF_NONE_MATCH: &str = "If-None-Match";

/// `If-Modified-Since` header name.
pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Conditional request for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Source identifier (URL, path).
    pub source_id: String,
    /// Validators from the last successful fetch.
    pub validators: CacheValidators,
}

impl FetchRequest {
    /// Create a request.
    #[must_use]
    pub fn new(source_id: impl Into<String>, validators: CacheValidators) -> Self {
        Self {
            source_id: source_id.into(),
            validators,
        }
    }

    /// Value for `If-None-Match`.
    #[must_use]
    pub fn if_none_match(&self) -> Option<&str> {
        self.validators.etag.as_deref()
    }

    /// Value for `If-Modified-Since`, epoch milliseconds.
    #[must_use]
    pub const fn if_modified_since(&self) -> Option<i64> {
        self.validators.last_modified
    }

    /// Conditional headers to send, in HTTP form.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(2);
        if let Some(etag) = self.if_none_match() {
            headers.push((IF_NONE_MATCH, etag.to_string()));
        }
        if let Some(date) = self.if_modified_since().and_then(format_http_date) {
            headers.push((IF_MODIFIED_SINCE, date));
        }
        headers
    }
}

/// Answer of a [`ConfigSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    /// New content with the validators describing it.
    Modified {
        /// Raw configuration document.
        body: String,
        /// Validators of `body`.
        validators: CacheValidators,
    },
    /// Content unchanged since the request's validators.
    NotModified,
    /// Any other outcome.
    Failed {
        /// Transport status code.
        status: u16,
    },
}

impl FetchResponse {
    /// Map an HTTP status: `200` with a body is new content, `304` is
    /// unchanged, everything else (including `200` without body) fails.
    #[must_use]
    pub fn from_status(status: u16, body: Option<String>, validators: CacheValidators) -> Self {
        match (status, body) {
            (200, Some(body)) => Self::Modified { body, validators },
            (304, _) => Self::NotModified,
            (status, _) => Self::Failed { status },
        }
    }
}

/// Delivers configuration text.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Identifier used as validator key and in log messages.
    fn source_id(&self) -> &str;

    /// Fetch the document, honoring the request's validators.
    ///
    /// # Errors
    ///
    /// Transport failures that have no status (I/O, DNS, ...).
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

/// Format epoch milliseconds as an HTTP-date (`Sun, 06 Nov 1994 08:49:37 GMT`).
#[must_use]
pub fn format_http_date(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|date| date.format(HTTP_DATE_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_date_format() {
        let millis = 784_111_777_000; // Sun, 06 Nov 1994 08:49:37 GMT
        assert_eq!(
            format_http_date(millis).as_deref(),
            Some("Sun, 06 Nov 1994 08:49:37 GMT")
        );
        assert_eq!(format_http_date(0).as_deref(), Some("Thu, 01 Jan 1970 00:00:00 GMT"));
        assert_eq!(format_http_date(i64::MAX), None);
    }

    #[test]
    fn test_headers_from_validators() {
        let empty = FetchRequest::new("src", CacheValidators::default());
        assert!(empty.headers().is_empty());

        let request = FetchRequest::new(
            "src",
            CacheValidators {
                etag: Some("\"v1\"".to_string()),
                last_modified: Some(784_111_777_000),
            },
        );
        assert_eq!(
            request.headers(),
            vec![
                (IF_NONE_MATCH, "\"v1\"".to_string()),
                (IF_MODIFIED_SINCE, "Sun, 06 Nov 1994 08:49:37 GMT".to_string()),
            ]
        );
    }

    #[test]
    fn test_response_from_status() {
        let validators = CacheValidators::default();
        assert!(matches!(
            FetchResponse::from_status(200, Some("{}".to_string()), validators.clone()),
            FetchResponse::Modified { .. }
        ));
        assert_eq!(
            FetchResponse::from_status(304, None, validators.clone()),
            FetchResponse::NotModified
        );
        assert_eq!(
            FetchResponse::from_status(200, None, validators.clone()),
            FetchResponse::Failed { status: 200 }
        );
        assert_eq!(
            FetchResponse::from_status(500, Some("oops".to_string()), validators),
            FetchResponse::Failed { status: 500 }
        );
    }
}
