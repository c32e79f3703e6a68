//! Object endpoint DTOs: query parameters and list envelopes.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ResourceObject;

/// Query parameters for `GET /collections/{collection}/objects`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ListQuery {
    /// Restrict to one namespace. Empty or absent spans all namespaces.
    pub namespace: Option<String>,
    /// Field selector, e.g. `metadata.name=w-1,spec.color!=red`.
    pub field_selector: Option<String>,
    /// Label selector, e.g. `tier=web,!canary`.
    pub label_selector: Option<String>,
}

/// Query parameters for single-object endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScopeQuery {
    /// Namespace of the object; absent for cluster-wide objects.
    pub namespace: Option<String>,
}

impl ScopeQuery {
    /// The namespace, treating an empty value as absent.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

/// Response body for `GET /collections`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CollectionsResponse {
    /// Known collection names, sorted.
    pub collections: Vec<String>,
}

/// Response body for `GET /collections/{collection}/objects`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ObjectListResponse {
    /// Collection that was listed.
    pub collection: String,
    /// Matching objects.
    pub items: Vec<ResourceObject>,
}
