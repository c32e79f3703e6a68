//! Request/response access to stored resources.

use std::fmt;

use async_trait::async_trait;

use crate::domain::{ListFilter, ResourceObject, ResourceStore, Selector};
use crate::error::GatewayError;

/// Single-shot resource operations.
///
/// Every operation fails with [`GatewayError::NotFound`] when the target
/// object does not exist, and with another [`GatewayError`] variant for
/// any other failure.
#[async_trait]
pub trait ResourceAccessor: Send + Sync + fmt::Debug {
    /// Lists the known collection names.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the backend cannot be reached.
    async fn collections(&self) -> Result<Vec<String>, GatewayError>;

    /// Fetches one object.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if it does not exist.
    async fn get(
        &self,
        collection: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, GatewayError>;

    /// Lists objects, filtered server-side.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a malformed selector.
    async fn list(
        &self,
        collection: &str,
        namespace: Option<&str>,
        field_selector: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ResourceObject>, GatewayError>;

    /// Creates an object.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlreadyExists`] if the name is taken.
    async fn create(
        &self,
        collection: &str,
        namespace: Option<&str>,
        obj: ResourceObject,
    ) -> Result<ResourceObject, GatewayError>;

    /// Replaces an object.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if it does not exist.
    async fn update(
        &self,
        collection: &str,
        namespace: Option<&str>,
        obj: ResourceObject,
    ) -> Result<ResourceObject, GatewayError>;

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if it does not exist.
    async fn delete(
        &self,
        collection: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), GatewayError>;
}

/// Reconciles the namespace given by the caller with the one in the body.
fn scoped(namespace: Option<&str>, mut obj: ResourceObject) -> Result<ResourceObject, GatewayError> {
    match (namespace, obj.namespace()) {
        (Some(scope), Some(own)) if scope != own => Err(GatewayError::InvalidRequest(format!(
            "object namespace {own:?} does not match request namespace {scope:?}"
        ))),
        (Some(scope), None) => {
            obj.metadata.namespace = Some(scope.to_string());
            Ok(obj)
        }
        _ => Ok(obj),
    }
}

/// Builds a [`ListFilter`] from raw query strings.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if a selector does not parse.
pub fn list_filter(
    namespace: Option<&str>,
    field_selector: Option<&str>,
    label_selector: Option<&str>,
) -> Result<ListFilter, GatewayError> {
    Ok(ListFilter {
        namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
        fields: field_selector
            .map(Selector::parse_fields)
            .transpose()?
            .unwrap_or_else(Selector::everything),
        labels: label_selector
            .map(Selector::parse_labels)
            .transpose()?
            .unwrap_or_else(Selector::everything),
    })
}

#[async_trait]
impl ResourceAccessor for ResourceStore {
    async fn collections(&self) -> Result<Vec<String>, GatewayError> {
        Ok(ResourceStore::collections(self).await)
    }

    async fn get(
        &self,
        collection: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, GatewayError> {
        ResourceStore::get(self, collection, namespace, name).await
    }

    async fn list(
        &self,
        collection: &str,
        namespace: Option<&str>,
        field_selector: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ResourceObject>, GatewayError> {
        let filter = list_filter(namespace, field_selector, label_selector)?;
        Ok(ResourceStore::list(self, collection, &filter).await)
    }

    async fn create(
        &self,
        collection: &str,
        namespace: Option<&str>,
        obj: ResourceObject,
    ) -> Result<ResourceObject, GatewayError> {
        ResourceStore::create(self, collection, scoped(namespace, obj)?).await
    }

    async fn update(
        &self,
        collection: &str,
        namespace: Option<&str>,
        obj: ResourceObject,
    ) -> Result<ResourceObject, GatewayError> {
        ResourceStore::update(self, collection, scoped(namespace, obj)?).await
    }

    async fn delete(
        &self,
        collection: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), GatewayError> {
        ResourceStore::delete(self, collection, namespace, name)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventBus;

    fn accessor() -> ResourceStore {
        ResourceStore::new(EventBus::new(16))
    }

    #[test]
    fn missing_selectors_match_everything() {
        let Ok(filter) = list_filter(Some(""), None, None) else {
            panic!("empty filter must parse");
        };
        assert_eq!(filter.namespace, None);
        assert_eq!(filter.fields, Selector::everything());
        assert_eq!(filter.labels, Selector::everything());
    }

    #[tokio::test]
    async fn create_fills_namespace_from_scope() {
        let store = accessor();
        let obj = ResourceObject::new("a", None);
        let Ok(created) = ResourceAccessor::create(&store, "widgets", Some("team"), obj).await
        else {
            panic!("create failed");
        };
        assert_eq!(created.namespace(), Some("team"));
    }

    #[tokio::test]
    async fn mismatched_namespace_is_rejected() {
        let store = accessor();
        let obj = ResourceObject::new("a", Some("other".to_string()));
        let result = ResourceAccessor::create(&store, "widgets", Some("team"), obj).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn list_rejects_bad_selector() {
        let store = accessor();
        let result = ResourceAccessor::list(&store, "widgets", None, Some("metadata.name"), None).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = accessor();
        let result = ResourceAccessor::delete(&store, "widgets", None, "ghost").await;
        assert!(result.is_err_and(|e| e.is_not_found()));
    }

    #[test]
    fn empty_namespace_means_all_namespaces() {
        let Ok(filter) = list_filter(Some(""), None, Some("app=shop")) else {
            panic!("filter must build");
        };
        assert_eq!(filter.namespace, None);
        assert!(!filter.labels.is_empty());
    }
}
