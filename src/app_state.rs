//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::service::ResourceAccessor;
use crate::ws::MessageDispatcher;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Resource access for the REST endpoints.
    pub resources: Arc<dyn ResourceAccessor>,
    /// Message routing table shared by every WebSocket session.
    pub dispatcher: Arc<MessageDispatcher>,
    /// Runtime configuration.
    pub config: Arc<GatewayConfig>,
    /// Cancelled on server shutdown; every session derives from it.
    pub shutdown: CancellationToken,
}
