//! RPC over the duplex stream.
//!
//! A `"call"` message carries `{id, method, params}`. Each call is served by
//! a [`CallHandler`] under its own cancellation token, replies carry the
//! call's `id`, and the reserved `.cancel` method cancels a call by id.

pub mod active_calls;
pub mod call;
pub mod dispatcher;
pub mod watch;

pub use active_calls::{ActiveCallTable, TrackedCall};
pub use call::{Call, CallId, CallMethod, Outcome, Reply};
pub use dispatcher::{CallDispatcher, CallHandler};
pub use watch::{ManifestRenderer, Renderer, WatchHandler, WatchParams};
