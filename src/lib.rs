//! # resview-gateway
//!
//! Live resource view gateway: REST access to stored resources plus a
//! multiplexed WebSocket RPC stream on which clients open long-lived watch
//! subscriptions and cancel them by call id.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── Session ─ MessageDispatcher ─ CallDispatcher (ws/)
//!     │                                    └── WatchHandler (ws/rpc/)
//!     │
//!     ├── ResourceAccessor, WatchSource (service/)
//!     │
//!     └── ResourceStore ─ EventBus (domain/)
//! ```
//!
//! Every session runs under a cancellation token derived from the server's
//! shutdown token; every call runs under a token derived from its session.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod ws;
