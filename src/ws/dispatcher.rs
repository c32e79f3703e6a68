//! Message type dispatcher: first-level routing of inbound messages.
//!
//! Handlers are registered against a [`MessageType`] before the server
//! starts accepting connections; the mapping is immutable afterwards and
//! shared by every session.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::messages::{Message, MessageType};
use crate::domain::SessionId;
use crate::error::StreamError;

/// Execution context handed to message handlers.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: SessionId,
    lifetime: CancellationToken,
}

impl SessionContext {
    /// Creates a context for a session.
    #[must_use]
    pub fn new(session_id: SessionId, lifetime: CancellationToken) -> Self {
        Self {
            session_id,
            lifetime,
        }
    }

    /// Session the message arrived on.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Token cancelled when the session ends.
    #[must_use]
    pub const fn lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }
}

/// One queued outbound message.
///
/// A message queued through a sink bound to a call carries that call's
/// token; once the token is cancelled the message is stale and the session
/// drops it instead of writing it.
#[derive(Debug)]
pub struct Outbound {
    message: Message,
    bound: Option<CancellationToken>,
}

impl Outbound {
    /// The queued message.
    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    /// Returns `true` if the call that queued this message was cancelled.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.bound
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Unwraps the message.
    #[must_use]
    pub fn into_message(self) -> Message {
        self.message
    }
}

impl From<Message> for Outbound {
    fn from(message: Message) -> Self {
        Self {
            message,
            bound: None,
        }
    }
}

/// Outbound channel for one handler invocation.
///
/// Messages are delivered to the transport in the order they are sent.
/// Once the session ends, every send fails with
/// [`StreamError::ReplySinkClosed`].
#[derive(Debug, Clone)]
pub struct ReplySink {
    tx: mpsc::Sender<Outbound>,
    bound: Option<CancellationToken>,
}

impl ReplySink {
    /// Creates a sink and the receiver the session drains it from.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, bound: None }, rx)
    }

    /// Returns a sink over the same channel whose messages go stale once
    /// `token` is cancelled, including those already queued.
    #[must_use]
    pub fn bind(&self, token: CancellationToken) -> Self {
        Self {
            tx: self.tx.clone(),
            bound: Some(token),
        }
    }

    /// Queues one message, waiting for room if the sink is full.
    ///
    /// On a bound sink whose token is cancelled the message is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ReplySinkClosed`] if the session has ended.
    pub async fn send(&self, msg: Message) -> Result<(), StreamError> {
        let out = Outbound {
            message: msg,
            bound: self.bound.clone(),
        };
        if out.is_stale() {
            tracing::trace!("call cancelled, discarding reply");
            return Ok(());
        }
        self.tx
            .send(out)
            .await
            .map_err(|_| StreamError::ReplySinkClosed)
    }

    /// Serializes `value` and queues it.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Codec`] if serialization fails or
    /// [`StreamError::ReplySinkClosed`] if the session has ended.
    pub async fn send_json<T: Serialize + Sync>(&self, value: &T) -> Result<(), StreamError> {
        self.send(Message::json(value)?).await
    }

    /// Returns `true` once the receiving side is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer of raw messages of one type.
#[async_trait]
pub trait MessageHandler: Send + Sync + fmt::Debug {
    /// Handles one message, emitting zero or more replies.
    ///
    /// The reply sink is closed when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError`] on failure; the session logs it and carries on.
    async fn handle(
        &self,
        ctx: SessionContext,
        msg: Message,
        reply: ReplySink,
    ) -> Result<(), StreamError>;
}

/// Registry of type handlers, shared by all sessions.
#[derive(Debug, Clone)]
pub struct MessageDispatcher {
    handlers: HashMap<MessageType, Arc<dyn MessageHandler>>,
    reply_buffer: usize,
}

impl MessageDispatcher {
    /// Creates an empty dispatcher whose reply sinks hold up to
    /// `reply_buffer` queued messages.
    #[must_use]
    pub fn new(reply_buffer: usize) -> Self {
        Self {
            handlers: HashMap::new(),
            reply_buffer,
        }
    }

    /// Associates a discriminator with a handler, replacing any previous one.
    pub fn register_type_handler(
        &mut self,
        msg_type: MessageType,
        handler: Arc<dyn MessageHandler>,
    ) {
        if self.handlers.insert(msg_type.clone(), handler).is_some() {
            tracing::warn!(%msg_type, "message handler replaced");
        }
    }

    /// Looks up the handler for a discriminator.
    #[must_use]
    pub fn handler(&self, msg_type: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(msg_type).cloned()
    }

    /// Capacity of each reply sink.
    #[must_use]
    pub const fn reply_buffer(&self) -> usize {
        self.reply_buffer
    }
}
