//! Metadata block at the head of a document selecting the page template.

use serde::Deserialize;
use tracing::debug;

const DELIMITER: &str = "---\n";

/// Template used when a document names none.
pub const DEFAULT_TEMPLATE: &str = "template";

/// Template used for the repository's index document when it names none.
pub const HOME_TEMPLATE: &str = "home";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Frontmatter {
    #[serde(rename = "TemplateName")]
    pub template_name: Option<String>,
}

impl Frontmatter {
    /// Template named by the block, or the default for this kind of document.
    pub fn template_or_default(&self, is_index: bool) -> String {
        match self.template_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ if is_index => HOME_TEMPLATE.to_string(),
            _ => DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Split a leading `---` block from `source`.
///
/// Returns the parsed block and the remaining body. A missing or unterminated
/// block yields `None` and the untouched source; so does a block that is not
/// valid YAML, in which case the body still carries the block text.
pub fn split_frontmatter(source: &str) -> (Option<Frontmatter>, &str) {
    let Some(rest) = source.strip_prefix(DELIMITER) else {
        return (None, source);
    };
    let Some((block, body)) = rest.split_once(DELIMITER) else {
        return (None, source);
    };

    if block.trim().is_empty() {
        return (Some(Frontmatter::default()), body);
    }

    match serde_yaml::from_str::<Frontmatter>(block) {
        Ok(frontmatter) => (Some(frontmatter), body),
        Err(err) => {
            debug!(
                target = "viewdocs::frontmatter",
                error = %err,
                "ignoring malformed frontmatter"
            );
            (None, source)
        }
    }
}
