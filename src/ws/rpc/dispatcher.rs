//! RPC call layer: second-level routing of `"call"` messages by method.
//!
//! [`CallDispatcher`] is registered as the type handler for `"call"`. It
//! tracks every in-flight call in an [`ActiveCallTable`] so that the
//! reserved [`CallMethod::CANCEL`] method can cancel it by id.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::active_calls::ActiveCallTable;
use super::call::{Call, CallMethod, Reply};
use crate::error::StreamError;
use crate::ws::dispatcher::{MessageHandler, ReplySink, SessionContext};
use crate::ws::messages::Message;

/// Error text replied to calls for unregistered methods.
pub const UNKNOWN_METHOD: &str = "Unknown method";

/// A unit of RPC work.
///
/// A handler may run for as long as it likes and emit any number of
/// replies, but it must return promptly once `ctx` is cancelled. Handlers
/// that never observe cancellation live as long as their connection.
#[async_trait]
pub trait CallHandler: Send + Sync + fmt::Debug {
    /// Serves one call.
    ///
    /// Failures the client should hear about must be sent as error
    /// replies; a returned error is only logged.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError`] on failure.
    async fn handle(
        &self,
        ctx: CancellationToken,
        call: Call,
        reply: ReplySink,
    ) -> Result<(), StreamError>;
}

/// Routes calls to registered [`CallHandler`]s and owns call cancellation.
#[derive(Debug, Default)]
pub struct CallDispatcher {
    handlers: HashMap<CallMethod, Arc<dyn CallHandler>>,
    active_calls: Arc<ActiveCallTable>,
}

impl CallDispatcher {
    /// Creates a dispatcher with no methods.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a method name with a handler.
    pub fn register_call_handler(&mut self, method: CallMethod, handler: Arc<dyn CallHandler>) {
        if self.handlers.insert(method.clone(), handler).is_some() {
            tracing::warn!(%method, "call handler replaced");
        }
    }

    /// The table of in-flight calls.
    #[must_use]
    pub fn active_calls(&self) -> &Arc<ActiveCallTable> {
        &self.active_calls
    }

    async fn route(
        &self,
        ctx: SessionContext,
        call: Call,
        reply: ReplySink,
    ) -> Result<(), StreamError> {
        tracing::debug!("dispatching rpc call");

        if call.method.is_cancel() {
            let target = call.cancel_target();
            if self.active_calls.cancel(ctx.session_id(), &target) {
                tracing::debug!(%target, "rpc call cancelled");
            } else {
                tracing::warn!(%target, "active rpc call not found, nothing to cancel");
            }
            return reply.send_json(&Reply::ok(call.id)).await;
        }

        let Some(handler) = self.handlers.get(call.method.as_str()).cloned() else {
            tracing::debug!("rpc call handler not found");
            return reply
                .send_json(&Reply::error(call.id, UNKNOWN_METHOD))
                .await;
        };

        let call_ctx = ctx.lifetime().child_token();
        let _tracked = self
            .active_calls
            .track(ctx.session_id(), call.id.clone(), call_ctx.clone());
        let reply = reply.bind(call_ctx.clone());
        handler.handle(call_ctx, call, reply).await
    }
}

#[async_trait]
impl MessageHandler for CallDispatcher {
    async fn handle(
        &self,
        ctx: SessionContext,
        msg: Message,
        reply: ReplySink,
    ) -> Result<(), StreamError> {
        let call: Call = serde_json::from_str(msg.as_str()).inspect_err(|err| {
            tracing::warn!(error = %err, message = msg.as_str(), "couldn't decode message into rpc call");
        })?;

        let span = tracing::debug_span!("rpc_call", call_id = %call.id, method = %call.method);
        self.route(ctx, call, reply).instrument(span).await
    }
}
