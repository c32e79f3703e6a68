//! In-memory resource store standing in for the external resource API.
//!
//! [`ResourceStore`] keeps every object in one ordered map keyed by
//! `(collection, namespace, name)` behind a [`tokio::sync::RwLock`].
//! Mutations publish their [`ChangeEvent`] on the [`EventBus`] while the
//! write lock is still held, so a reader that snapshots under the read lock
//! and subscribes in the same critical section never misses or duplicates
//! a change.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, broadcast};

use super::{ChangeEvent, EventBus, ResourceObject, Selector, StoreEvent};
use crate::error::GatewayError;

/// Map key: collection, namespace (empty for cluster-wide), name.
type ObjectKey = (String, String, String);

fn object_key(collection: &str, namespace: Option<&str>, name: &str) -> ObjectKey {
    (
        collection.to_string(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

/// Server-side filter applied to lists, snapshots and live events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Restrict to one namespace; `None` spans all namespaces.
    pub namespace: Option<String>,
    /// Field selector.
    pub fields: Selector,
    /// Label selector.
    pub labels: Selector,
}

impl ListFilter {
    /// Returns `true` if the object passes every part of the filter.
    #[must_use]
    pub fn matches(&self, obj: &ResourceObject) -> bool {
        if let Some(namespace) = &self.namespace
            && obj.namespace() != Some(namespace.as_str())
        {
            return false;
        }
        self.fields.matches_fields(obj) && self.labels.matches_labels(obj)
    }
}

/// Central store for all objects across all collections.
#[derive(Debug)]
pub struct ResourceStore {
    objects: RwLock<BTreeMap<ObjectKey, ResourceObject>>,
    event_bus: EventBus,
    next_version: AtomicU64,
}

impl ResourceStore {
    /// Creates an empty store publishing on `event_bus`.
    #[must_use]
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            event_bus,
            next_version: AtomicU64::new(1),
        }
    }

    /// Returns the bus this store publishes on.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn bump_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed)
    }

    fn publish(&self, collection: &str, change: ChangeEvent) {
        let receivers = self.event_bus.publish(collection, change);
        tracing::trace!(collection, receivers, "store change published");
    }

    /// Inserts a new object.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidCollection`] for an empty collection
    /// or [`GatewayError::InvalidRequest`] for an empty name, and
    /// [`GatewayError::AlreadyExists`] if the key is taken.
    pub async fn create(
        &self,
        collection: &str,
        mut obj: ResourceObject,
    ) -> Result<ResourceObject, GatewayError> {
        validate(collection, obj.name())?;
        let key = object_key(collection, obj.namespace(), obj.name());

        let mut map = self.objects.write().await;
        if map.contains_key(&key) {
            return Err(GatewayError::AlreadyExists {
                collection: collection.to_string(),
                name: obj.metadata.name,
            });
        }
        obj.metadata.resource_version = self.bump_version();
        map.insert(key, obj.clone());
        self.publish(collection, ChangeEvent::Added(obj.clone()));
        Ok(obj)
    }

    /// Returns one object.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if it does not exist.
    pub async fn get(
        &self,
        collection: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, GatewayError> {
        let map = self.objects.read().await;
        map.get(&object_key(collection, namespace, name))
            .cloned()
            .ok_or_else(|| not_found(collection, name))
    }

    /// Returns all objects of a collection that pass `filter`, ordered by
    /// namespace then name.
    pub async fn list(&self, collection: &str, filter: &ListFilter) -> Vec<ResourceObject> {
        let map = self.objects.read().await;
        collect_matching(&map, collection, filter)
    }

    /// Replaces an existing object.
    ///
    /// A non-zero `resourceVersion` on the input must equal the stored one.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the object does not exist and
    /// [`GatewayError::Conflict`] on a version mismatch.
    pub async fn update(
        &self,
        collection: &str,
        mut obj: ResourceObject,
    ) -> Result<ResourceObject, GatewayError> {
        validate(collection, obj.name())?;
        let key = object_key(collection, obj.namespace(), obj.name());

        let mut map = self.objects.write().await;
        let Some(current) = map.get_mut(&key) else {
            return Err(not_found(collection, obj.name()));
        };
        let expected = obj.metadata.resource_version;
        if expected != 0 && expected != current.metadata.resource_version {
            return Err(GatewayError::Conflict(format!(
                "{collection} {:?} is at version {}, not {expected}",
                obj.name(),
                current.metadata.resource_version
            )));
        }
        obj.metadata.resource_version = self.bump_version();
        *current = obj.clone();
        self.publish(collection, ChangeEvent::Updated(obj.clone()));
        Ok(obj)
    }

    /// Removes an object, returning its last state.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if it does not exist.
    pub async fn delete(
        &self,
        collection: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, GatewayError> {
        let mut map = self.objects.write().await;
        let obj = map
            .remove(&object_key(collection, namespace, name))
            .ok_or_else(|| not_found(collection, name))?;
        self.publish(collection, ChangeEvent::Deleted(obj.clone()));
        Ok(obj)
    }

    /// Returns the names of all collections holding at least one object.
    pub async fn collections(&self) -> Vec<String> {
        let map = self.objects.read().await;
        map.keys()
            .map(|(collection, _, _)| collection.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Atomically snapshots the matching objects and attaches a receiver
    /// to the bus, so the receiver sees exactly the changes made after the
    /// snapshot.
    pub async fn snapshot_and_subscribe(
        &self,
        collection: &str,
        filter: &ListFilter,
    ) -> (Vec<ResourceObject>, broadcast::Receiver<StoreEvent>) {
        let map = self.objects.read().await;
        let rx = self.event_bus.subscribe();
        (collect_matching(&map, collection, filter), rx)
    }

    /// Returns the total number of objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Returns `true` if the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

fn collect_matching(
    map: &BTreeMap<ObjectKey, ResourceObject>,
    collection: &str,
    filter: &ListFilter,
) -> Vec<ResourceObject> {
    map.iter()
        .filter(|((c, _, _), obj)| c == collection && filter.matches(obj))
        .map(|(_, obj)| obj.clone())
        .collect()
}

fn validate(collection: &str, name: &str) -> Result<(), GatewayError> {
    if collection.is_empty() || collection.contains('/') {
        return Err(GatewayError::InvalidCollection(collection.to_string()));
    }
    if name.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "metadata.name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn not_found(collection: &str, name: &str) -> GatewayError {
    GatewayError::NotFound {
        collection: collection.to_string(),
        name: name.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn store() -> ResourceStore {
        ResourceStore::new(EventBus::new(64))
    }

    fn widget(name: &str, namespace: &str) -> ResourceObject {
        ResourceObject::new(name, Some(namespace.to_string())).with_label("app", "shop")
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = store();
        let Ok(created) = store.create("widgets", widget("a", "default")).await else {
            panic!("create failed");
        };
        assert!(created.metadata.resource_version > 0);

        let fetched = store.get("widgets", Some("default"), "a").await;
        assert_eq!(fetched, Ok(created));
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = store();
        let _ = store.create("widgets", widget("a", "default")).await;
        let again = store.create("widgets", widget("a", "default")).await;
        assert!(matches!(again, Err(GatewayError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn get_nonexistent_is_not_found() {
        let store = store();
        let result = store.get("widgets", None, "nope").await;
        assert!(result.is_err_and(|e| e.is_not_found()));
    }

    #[tokio::test]
    async fn same_name_in_different_namespaces() {
        let store = store();
        let _ = store.create("widgets", widget("a", "one")).await;
        let _ = store.create("widgets", widget("a", "two")).await;
        assert_eq!(store.len().await, 2);

        let filter = ListFilter {
            namespace: Some("two".to_string()),
            ..ListFilter::default()
        };
        let listed = store.list("widgets", &filter).await;
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn list_applies_selectors() {
        let store = store();
        let _ = store.create("widgets", widget("a", "default")).await;
        let _ = store
            .create("widgets", ResourceObject::new("b", Some("default".to_string())))
            .await;
        let _ = store.create("gadgets", widget("c", "default")).await;

        let Ok(labels) = Selector::parse_labels("app=shop") else {
            panic!("selector must parse");
        };
        let filter = ListFilter {
            labels,
            ..ListFilter::default()
        };
        let listed = store.list("widgets", &filter).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed.first().map(ResourceObject::name), Some("a"));
    }

    #[tokio::test]
    async fn update_bumps_version_and_checks_precondition() {
        let store = store();
        let Ok(created) = store.create("widgets", widget("a", "default")).await else {
            panic!("create failed");
        };

        let Ok(updated) = store.update("widgets", created.clone()).await else {
            panic!("update with matching version failed");
        };
        assert!(updated.metadata.resource_version > created.metadata.resource_version);

        let stale = store.update("widgets", created).await;
        assert!(matches!(stale, Err(GatewayError::Conflict(_))));
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = store();
        let result = store.update("widgets", widget("ghost", "default")).await;
        assert!(result.is_err_and(|e| e.is_not_found()));
    }

    #[tokio::test]
    async fn mutations_publish_changes_in_order() {
        let store = store();
        let mut rx = store.event_bus().subscribe();

        let Ok(created) = store.create("widgets", widget("a", "default")).await else {
            panic!("create failed");
        };
        let _ = store.update("widgets", created).await;
        let _ = store.delete("widgets", Some("default"), "a").await;

        let mut kinds = Vec::new();
        for _ in 0..3 {
            let Ok(event) = rx.recv().await else {
                panic!("missing event");
            };
            assert_eq!(event.collection, "widgets");
            kinds.push(event.change.kind());
        }
        assert_eq!(
            kinds,
            vec![
                crate::domain::ChangeKind::Added,
                crate::domain::ChangeKind::Updated,
                crate::domain::ChangeKind::Deleted,
            ]
        );
    }

    #[tokio::test]
    async fn collections_are_sorted_and_unique() {
        let store = store();
        let _ = store.create("widgets", widget("a", "x")).await;
        let _ = store.create("widgets", widget("b", "x")).await;
        let _ = store.create("gadgets", widget("c", "x")).await;
        assert_eq!(store.collections().await, vec!["gadgets", "widgets"]);
    }

    #[tokio::test]
    async fn invalid_collection_is_rejected() {
        let store = store();
        let result = store.create("", widget("a", "x")).await;
        assert!(matches!(result, Err(GatewayError::InvalidCollection(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn snapshot_then_live_events() {
        let store = store();
        let _ = store.create("widgets", widget("a", "default")).await;

        let (snapshot, mut rx) = store
            .snapshot_and_subscribe("widgets", &ListFilter::default())
            .await;
        assert_eq!(snapshot.len(), 1);

        let _ = store.create("widgets", widget("b", "default")).await;
        let Ok(event) = rx.recv().await else {
            panic!("missing live event");
        };
        assert_eq!(event.change.object().name(), "b");
    }
}
