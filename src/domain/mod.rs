//! Domain layer: objects, change events, selectors and the backing store.
//!
//! This module contains the server-side model of watched resources: the
//! schemaless [`ResourceObject`], the tagged [`ChangeEvent`] produced on
//! every mutation, selectors for server-side filtering, the in-memory
//! [`ResourceStore`] with its [`EventBus`], and the [`SessionId`] that
//! scopes per-connection state.

pub mod change_event;
pub mod event_bus;
pub mod object;
pub mod resource_store;
pub mod selector;
pub mod session_id;

pub use change_event::{ChangeEvent, ChangeKind, StoreEvent};
pub use event_bus::EventBus;
pub use object::{ObjectMeta, ResourceObject};
pub use resource_store::{ListFilter, ResourceStore};
pub use selector::{Requirement, Selector, SelectorError};
pub use session_id::SessionId;
