//! Document rendering: fetch, frontmatter, remote markup, templating and
//! link rewriting.

mod links;
mod pipeline;
mod template;
mod types;

pub use links::{LinkScope, rewrite_links};
pub use pipeline::RenderPipeline;
pub use template::{TemplateFetch, substitute};
pub use types::{PageContext, RenderError, RenderOutput};

pub(crate) use pipeline::METRIC_RENDER_MS;
