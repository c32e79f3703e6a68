//! Service layer: the collaborator interfaces the gateway core depends on.
//!
//! [`ResourceAccessor`] serves single-shot reads and writes for the REST
//! layer; [`WatchSource`] opens filtered [`Subscription`]s for the stream
//! layer. Both are implemented over the in-memory
//! [`crate::domain::ResourceStore`].

pub mod accessor;
pub mod watch;

pub use accessor::ResourceAccessor;
pub use watch::{StoreWatchSource, Subscription, WatchSource, WatchTarget};
