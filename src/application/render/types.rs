use bytes::Bytes;
use thiserror::Error;

use crate::application::source::{MarkupError, SourceError};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error("link rewriting failed: {message}")]
    Links { message: String },
}

/// Output of one pipeline run, ready to be cached and served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutput {
    /// Templated page.
    Page(String),
    /// Raw asset bytes, passed through without templating.
    Asset(Bytes),
}

impl RenderOutput {
    pub fn into_bytes(self) -> Bytes {
        match self {
            RenderOutput::Page(html) => Bytes::from(html),
            RenderOutput::Asset(bytes) => bytes,
        }
    }
}

/// Request metadata substituted into template placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub tenant: String,
    pub repository: String,
    pub reference: String,
    /// Document path with its markup extension, relative to the docs root.
    pub document: String,
    pub page_class: String,
}
