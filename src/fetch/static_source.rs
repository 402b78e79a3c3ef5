//! Fixed in-memory document as configuration source.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use super::{ConfigSource, FetchRequest, FetchResponse};
use crate::persistence::CacheValidators;
use crate::Result;

/// Serves one embedded document with a content-derived ETag.
///
/// Matches the conditional semantics of an HTTP origin: a request carrying
/// the current ETag gets [`FetchResponse::NotModified`].
#[derive(Debug, Clone)]
pub struct StaticSource {
    id: String,
    body: String,
    etag: String,
}

impl StaticSource {
    /// Serve `body` under identifier `id`.
    #[must_use]
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let etag = content_etag(&body);
        Self {
            id: id.into(),
            body,
            etag,
        }
    }

    /// Current entity tag.
    #[must_use]
    pub fn etag(&self) -> &str {
        &self.etag
    }
}

/// Deterministic strong ETag of `body`.
fn content_etag(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

#[async_trait]
impl ConfigSource for StaticSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        if request.if_none_match() == Some(self.etag.as_str()) {
            return Ok(FetchResponse::NotModified);
        }
        Ok(FetchResponse::Modified {
            body: self.body.clone(),
            validators: CacheValidators {
                etag: Some(self.etag.clone()),
                last_modified: None,
            },
        })
    }
}
