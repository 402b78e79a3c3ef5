//! Local file as configuration source.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use super::{ConfigSource, FetchRequest, FetchResponse};
use crate::persistence::CacheValidators;
use crate::Result;

/// Reads a configuration document from disk.
///
/// The file's modification time serves as `last_modified`; a request whose
/// `If-Modified-Since` is not older than it is answered with
/// [`FetchResponse::NotModified`] without reading the file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    id: String,
}

impl FileSource {
    /// Source for `path`; the identifier is the path as displayed.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let id = format!("file://{}", path.display());
        Self { path, id }
    }

    /// Location of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn modified_millis(&self) -> Result<Option<i64>> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        Ok(metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok()))
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let modified = self.modified_millis().await?;

        if let (Some(modified), Some(since)) = (modified, request.if_modified_since()) {
            if modified <= since {
                return Ok(FetchResponse::NotModified);
            }
        }

        let body = tokio::fs::read_to_string(&self.path).await?;
        Ok(FetchResponse::Modified {
            body,
            validators: CacheValidators {
                etag: None,
                last_modified: modified,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_fetch_then_not_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("choices.json");
        std::fs::write(&path, r#"{"variants":[]}"#).unwrap();
        let source = FileSource::new(&path);

        let first = source
            .fetch(&FetchRequest::new(source.source_id(), CacheValidators::default()))
            .await
            .unwrap();
        let FetchResponse::Modified { body, validators } = first else {
            panic!("expected new content");
        };
        assert_eq!(body, r#"{"variants":[]}"#);
        assert!(validators.last_modified.is_some());

        let second = source
            .fetch(&FetchRequest::new(source.source_id(), validators))
            .await
            .unwrap();
        assert_eq!(second, FetchResponse::NotModified);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path().join("missing.json"));

        let err = source
            .fetch(&FetchRequest::new(source.source_id(), CacheValidators::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_source_id() {
        let source = FileSource::new("/etc/choices.json");
        assert_eq!(source.source_id(), "file:///etc/choices.json");
    }
}
