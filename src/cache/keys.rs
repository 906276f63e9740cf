//! Cache key definitions.
//!
//! Every key renders to a `tenant:repository:path:reference` string; two
//! requests share a cached artifact exactly when their keys render equal.

use std::fmt;

use crate::domain::request::ParsedRequest;

const REPOSITORY_CONFIG_PATH: &str = "viewdocs.json";
const TEMPLATE_NAMESPACE: &str = "template";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Fully rendered page or raw asset bytes.
    Document {
        tenant: String,
        repository: String,
        document: String,
        reference: String,
    },
    /// Resolved template text, namespaced away from documents.
    Template {
        tenant: String,
        repository: String,
        name: String,
        reference: String,
    },
    /// Raw `docs/viewdocs.json` body.
    RepositoryConfig {
        tenant: String,
        repository: String,
        reference: String,
    },
}

impl CacheKey {
    pub fn document(request: &ParsedRequest) -> Self {
        Self::Document {
            tenant: request.tenant.clone(),
            repository: request.repository.clone(),
            document: request.document.clone(),
            reference: request.reference.clone(),
        }
    }

    pub fn template(request: &ParsedRequest, name: &str) -> Self {
        Self::Template {
            tenant: request.tenant.clone(),
            repository: request.repository.clone(),
            name: name.to_string(),
            reference: request.reference.clone(),
        }
    }

    pub fn repository_config(request: &ParsedRequest) -> Self {
        Self::RepositoryConfig {
            tenant: request.tenant.clone(),
            repository: request.repository.clone(),
            reference: request.reference.clone(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Document {
                tenant,
                repository,
                document,
                reference,
            } => write!(f, "{tenant}:{repository}:{document}:{reference}"),
            CacheKey::Template {
                tenant,
                repository,
                name,
                reference,
            } => write!(
                f,
                "{tenant}:{repository}:{name}.html:{reference}:{TEMPLATE_NAMESPACE}"
            ),
            CacheKey::RepositoryConfig {
                tenant,
                repository,
                reference,
            } => write!(
                f,
                "{tenant}:{repository}:{REPOSITORY_CONFIG_PATH}:{reference}"
            ),
        }
    }
}
