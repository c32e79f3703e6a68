//! Change notifications produced by the resource store.
//!
//! Every mutation of a [`super::ResourceStore`] yields exactly one
//! [`ChangeEvent`], which is published on the [`super::EventBus`] wrapped
//! in a [`StoreEvent`] that names the collection it belongs to.

use serde::Serialize;

use super::ResourceObject;

/// Kind of change, as reported to stream clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Object appeared (created, or present when a subscription synced).
    Added,
    /// Object was modified.
    Updated,
    /// Object was removed.
    Deleted,
}

/// One change to one object.
///
/// Consumers match on the variant; the payload is the object state after
/// the change (the last known state for [`ChangeEvent::Deleted`]).
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// Object appeared.
    Added(ResourceObject),
    /// Object was modified.
    Updated(ResourceObject),
    /// Object was removed.
    Deleted(ResourceObject),
}

impl ChangeEvent {
    /// Returns the kind of change.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Added(_) => ChangeKind::Added,
            Self::Updated(_) => ChangeKind::Updated,
            Self::Deleted(_) => ChangeKind::Deleted,
        }
    }

    /// Returns the affected object.
    #[must_use]
    pub const fn object(&self) -> &ResourceObject {
        match self {
            Self::Added(obj) | Self::Updated(obj) | Self::Deleted(obj) => obj,
        }
    }
}

/// A [`ChangeEvent`] tagged with its collection, as carried on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    /// Collection the object belongs to.
    pub collection: String,
    /// The change itself.
    pub change: ChangeEvent,
}
