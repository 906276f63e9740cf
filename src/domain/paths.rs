//! Document path classification shared by the parser, the fetch cascade and
//! the redirect rules.

/// Reference used when a request carries no `~ref` suffix.
pub const DEFAULT_REFERENCE: &str = "master";

/// Document served for the bare repository path.
pub const INDEX_DOCUMENT: &str = "index.md";

/// Root under which documents are looked up inside a repository.
pub const DOCS_ROOT: &str = "docs/";

/// Extension appended to document paths that carry no markup extension.
pub const DEFAULT_MARKUP_EXTENSION: &str = ".md";

/// Markup extensions understood by the rendering service, in README probe order.
pub const MARKDOWN_EXTENSIONS: [&str; 6] = [
    ".md",
    ".markdown",
    ".mdown",
    ".mkdn",
    ".mdwn",
    ".litcoffee",
];

const ASSET_EXTENSIONS: [&str; 10] = [
    ".appcache",
    ".bmp",
    ".css",
    ".jpg",
    ".jpeg",
    ".js",
    ".json",
    ".png",
    ".ico",
    ".gif",
];

/// Returns the extension of the final path element, including the leading dot.
pub fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.').map(|idx| &name[idx..])
}

pub fn is_markdown(path: &str) -> bool {
    extension(path).is_some_and(|ext| MARKDOWN_EXTENSIONS.contains(&ext))
}

/// Binary and static assets bypass templating and are offloaded to the CDN.
pub fn is_asset(path: &str) -> bool {
    extension(path).is_some_and(|ext| ASSET_EXTENSIONS.contains(&ext))
}

/// Appends the default markup extension unless the path is an asset or
/// already names a markup file.
pub fn with_markup_extension(document: &str) -> String {
    if is_asset(document) || is_markdown(document) {
        document.to_string()
    } else {
        format!("{document}{DEFAULT_MARKUP_EXTENSION}")
    }
}

/// `repository` on the default reference, `repository~reference` otherwise.
pub fn repository_prefix(repository: &str, reference: &str) -> String {
    if reference == DEFAULT_REFERENCE {
        repository.to_string()
    } else {
        format!("{repository}~{reference}")
    }
}

/// CSS-class-safe slug for a document path: `guide/setup.md` → `guide-setup`.
pub fn page_class(document: &str) -> String {
    let flattened = document.replace('/', "-");
    match extension(&flattened) {
        Some(ext) => flattened[..flattened.len() - ext.len()].to_string(),
        None => flattened,
    }
}
