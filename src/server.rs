//! Application wiring: state construction, router and serving.

use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::domain::ResourceStore;
use crate::service::StoreWatchSource;
use crate::ws::handler::ws_handler;
use crate::ws::rpc::watch::WATCH;
use crate::ws::rpc::{CallDispatcher, CallMethod, WatchHandler};
use crate::ws::{MessageDispatcher, MessageType};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generates short request ids: the first eight hex digits of a v4 UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortRequestId;

impl MakeRequestId for ShortRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let short = id.get(..8).unwrap_or(&id);
        HeaderValue::from_str(short).ok().map(RequestId::new)
    }
}

/// Builds the message routing table: `"call"` messages go to the RPC layer,
/// which serves `watch.resource` from `store`.
#[must_use]
pub fn build_dispatcher(config: &GatewayConfig, store: &Arc<ResourceStore>) -> MessageDispatcher {
    let source = Arc::new(StoreWatchSource::new(Arc::clone(store)));

    let mut calls = CallDispatcher::new();
    calls.register_call_handler(CallMethod::new(WATCH), Arc::new(WatchHandler::new(source)));

    let mut dispatcher = MessageDispatcher::new(config.reply_buffer);
    dispatcher.register_type_handler(MessageType::call(), Arc::new(calls));
    dispatcher
}

/// Builds the shared state over `store`. Cancelling `shutdown` ends every
/// WebSocket session.
#[must_use]
pub fn build_state(
    config: GatewayConfig,
    store: Arc<ResourceStore>,
    shutdown: CancellationToken,
) -> AppState {
    let dispatcher = Arc::new(build_dispatcher(&config, &store));
    AppState {
        resources: store,
        dispatcher,
        config: Arc::new(config),
        shutdown,
    }
}

/// Builds the complete router: REST API, `/ws` and the HTTP middleware.
pub fn build_app(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let cors = if state.config.cors_permissive {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        tracing::info_span!(
            "http",
            method = %request.method(),
            uri = %request.uri(),
            request_id,
        )
    });

    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), ShortRequestId))
                .layer(trace)
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
        .layer(cors)
        .with_state(state)
}

/// Serves `app` on `listener` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an I/O error if the server fails.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
