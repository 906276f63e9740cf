//! Application services: fetch cascades, rendering, redirects and the
//! request-level orchestration built on them.

pub mod cascade;
pub mod docs;
pub mod error;
pub mod redirect;
pub mod render;
pub mod repo_config;
pub mod source;
