//! Traits describing the upstream adapters: raw repository content and the
//! markup rendering service.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::request::ParsedRequest;

/// Repository revision a raw path is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub tenant: String,
    pub repository: String,
    pub reference: String,
}

impl SourceLocation {
    pub fn new(
        tenant: impl Into<String>,
        repository: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            repository: repository.into(),
            reference: reference.into(),
        }
    }
}

impl From<&ParsedRequest> for SourceLocation {
    fn from(request: &ParsedRequest) -> Self {
        Self::new(
            request.tenant.clone(),
            request.repository.clone(),
            request.reference.clone(),
        )
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.tenant, self.repository, self.reference)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request for `{path}` failed: {message}")]
    Transport { path: String, message: String },
    #[error("upstream answered {status} for `{path}`")]
    Upstream { path: String, status: u16 },
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    pub fn transport(path: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::Transport {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Raw file access. `Ok(None)` means the path does not exist; errors are
/// reserved for transport failures.
#[async_trait]
pub trait RawSource: Send + Sync {
    async fn fetch(
        &self,
        location: &SourceLocation,
        path: &str,
    ) -> Result<Option<Bytes>, SourceError>;
}

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("markup service request failed: {0}")]
    Transport(String),
    #[error("markup service answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Remote markup-to-HTML conversion.
#[async_trait]
pub trait MarkupRenderer: Send + Sync {
    async fn render(&self, markup: &str) -> Result<String, MarkupError>;
}
