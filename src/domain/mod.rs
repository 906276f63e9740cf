//! Domain layer: pure request, path and metadata rules.

pub mod frontmatter;
pub mod paths;
pub mod request;
