//! Resource objects as stored and watched by the gateway.
//!
//! A [`ResourceObject`] is schemaless apart from its [`ObjectMeta`]: any
//! other top-level fields are kept verbatim so that clients get back
//! exactly what they stored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity and bookkeeping fields common to every object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name, unique within its collection and namespace.
    pub name: String,
    /// Namespace scope; `None` for cluster-wide objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Free-form labels matched by label selectors.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Store-assigned version, bumped on every write. Zero on input means
    /// "no precondition".
    #[serde(default)]
    pub resource_version: u64,
}

/// A single stored object: metadata plus arbitrary body fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ResourceObject {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Remaining top-level fields (`spec`, `status`, ...).
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub fields: Map<String, Value>,
}

impl ResourceObject {
    /// Creates an object with the given identity and an empty body.
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                namespace,
                labels: BTreeMap::new(),
                resource_version: 0,
            },
            fields: Map::new(),
        }
    }

    /// Adds a label, builder style.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Sets a top-level body field, builder style.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Object namespace, if namespaced.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    /// Label value for `key`.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }

    /// Resolves a dotted field path to its string form.
    ///
    /// `metadata.name` and `metadata.namespace` are always defined (the
    /// latter as `""` for cluster-wide objects). Other paths walk the body;
    /// only scalar leaves resolve.
    #[must_use]
    pub fn field(&self, path: &str) -> Option<String> {
        match path {
            "metadata.name" => return Some(self.metadata.name.clone()),
            "metadata.namespace" => {
                return Some(self.metadata.namespace.clone().unwrap_or_default());
            }
            "metadata.resourceVersion" => return Some(self.metadata.resource_version.to_string()),
            _ => {}
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        match current {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
