//! Working-tree source used in development mode.

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::source::{RawSource, SourceError, SourceLocation};

/// Reads `{root}/{path}` regardless of tenant, repository or reference.
/// Paths that would leave `root` are reported as not found.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RawSource for LocalSource {
    async fn fetch(
        &self,
        _location: &SourceLocation,
        path: &str,
    ) -> Result<Option<Bytes>, SourceError> {
        let relative = Path::new(path);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Ok(None);
        }
        match tokio::fs::read(self.root.join(relative)).await {
            Ok(body) => Ok(Some(Bytes::from(body))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SourceError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}
