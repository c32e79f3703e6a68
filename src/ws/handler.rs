//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt, future};
use tokio_util::sync::CancellationToken;

use super::connection::Session;
use super::dispatcher::MessageDispatcher;
use super::messages::Frame;
use crate::app_state::AppState;
use crate::domain::SessionId;
use crate::server::REQUEST_ID_HEADER;

/// `GET /ws`: Upgrade HTTP connection to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let dispatcher = Arc::clone(&state.dispatcher);
    let shutdown = state.shutdown.clone();

    ws.max_message_size(state.config.ws_max_message_bytes)
        .on_upgrade(move |socket| serve_socket(socket, request_id, dispatcher, shutdown))
}

async fn serve_socket(
    socket: WebSocket,
    request_id: String,
    dispatcher: Arc<MessageDispatcher>,
    shutdown: CancellationToken,
) {
    let session_id = SessionId::new();
    let span = tracing::info_span!("session", %session_id, %request_id);
    span.in_scope(|| tracing::info!("websocket connected"));

    let (sink, stream) = socket.split();
    let writer =
        sink.with(|text: String| future::ready(Ok::<_, axum::Error>(WsMessage::text(text))));
    let reader = stream.filter_map(|msg| future::ready(inbound_frame(msg)));

    Session::new(session_id, &shutdown, writer, dispatcher, span)
        .run(reader)
        .await;
}

/// Maps a transport message to a session frame. Control frames are
/// dropped; binary frames are accepted when they hold UTF-8 text.
fn inbound_frame(msg: Result<WsMessage, axum::Error>) -> Option<Result<Frame, axum::Error>> {
    match msg {
        Ok(WsMessage::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
        Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(Ok(Frame::Text(text))),
            Err(err) => {
                tracing::warn!(error = %err, "dropping non-UTF-8 binary message");
                None
            }
        },
        Ok(WsMessage::Close(_)) => Some(Ok(Frame::Close)),
        Ok(WsMessage::Ping(_) | WsMessage::Pong(_)) => None,
        Err(err) => Some(Err(err)),
    }
}
