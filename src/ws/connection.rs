//! Transport session: one duplex connection's lifetime.
//!
//! A [`Session`] owns the write half of the connection behind an exclusive
//! write section and runs the read loop over the read half. Each inbound
//! message is dispatched on its own task so that a slow handler never
//! stalls the read loop, and therefore never stalls cancellation delivery.
//!
//! The session's lifetime token is cancelled when the read loop exits, when
//! any write fails, or when the parent token (server shutdown) is
//! cancelled. Every handler context derives from it.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use super::dispatcher::{MessageDispatcher, Outbound, ReplySink, SessionContext};
use super::messages::{Envelope, Frame, Message};
use crate::domain::SessionId;

/// Boxed transport error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type BoxedWriter = Pin<Box<dyn Sink<String, Error = BoxError> + Send>>;

/// Per-connection state shared by the read loop and all dispatch tasks.
pub struct Session {
    id: SessionId,
    lifetime: CancellationToken,
    writer: Mutex<BoxedWriter>,
    dispatcher: Arc<MessageDispatcher>,
    span: Span,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("cancelled", &self.lifetime.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session over the write half of a connection.
    ///
    /// `span` is the session's logging context; every task spawned for the
    /// session runs inside it.
    pub fn new<W, E>(
        id: SessionId,
        parent: &CancellationToken,
        writer: W,
        dispatcher: Arc<MessageDispatcher>,
        span: Span,
    ) -> Arc<Self>
    where
        W: Sink<String, Error = E> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let writer: BoxedWriter = Box::pin(writer.sink_map_err(|err| Box::new(err) as BoxError));
        Arc::new(Self {
            id,
            lifetime: parent.child_token(),
            writer: Mutex::new(writer),
            dispatcher,
            span,
        })
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Token cancelled when the session ends.
    #[must_use]
    pub const fn lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }

    /// Runs the read loop until the peer closes, a read fails, or the
    /// session is cancelled; then cancels the lifetime token and closes the
    /// connection.
    pub async fn run<R, E>(self: Arc<Self>, reader: R)
    where
        R: Stream<Item = Result<Frame, E>> + Unpin + Send,
        E: fmt::Display + Send,
    {
        let span = self.span.clone();
        self.read_loop(reader).instrument(span).await;
    }

    async fn read_loop<R, E>(self: Arc<Self>, mut reader: R)
    where
        R: Stream<Item = Result<Frame, E>> + Unpin + Send,
        E: fmt::Display + Send,
    {
        tracing::debug!("session started");

        loop {
            let frame = tokio::select! {
                biased;
                () = self.lifetime.cancelled() => {
                    tracing::debug!("session cancelled");
                    break;
                }
                frame = reader.next() => frame,
            };

            match frame {
                Some(Ok(Frame::Text(text))) => {
                    let session = Arc::clone(&self);
                    tokio::spawn(session.dispatch(Message::from(text)).in_current_span());
                }
                Some(Ok(Frame::Close)) | None => {
                    tracing::info!("connection closed by peer");
                    break;
                }
                Some(Err(err)) => {
                    tracing::error!(error = %err, "couldn't read message");
                    break;
                }
            }
        }

        // Stops every dispatch task and handler spawned for this session.
        self.lifetime.cancel();
        self.close().await;
        tracing::debug!("session ended");
    }

    /// Routes one inbound message to its type handler and forwards the
    /// handler's replies to the transport until the handler finishes or
    /// the session ends.
    async fn dispatch(self: Arc<Self>, msg: Message) {
        let msg_type = match Envelope::peek(&msg) {
            Ok(envelope) => envelope.msg_type,
            Err(err) => {
                tracing::warn!(error = %err, message = msg.as_str(), "couldn't decode raw message");
                return;
            }
        };

        let Some(handler) = self.dispatcher.handler(msg_type.as_str()) else {
            tracing::warn!(%msg_type, message = msg.as_str(), "unknown message type");
            return;
        };
        tracing::debug!(%msg_type, "dispatching message");

        let (sink, mut replies) = ReplySink::channel(self.dispatcher.reply_buffer());
        let ctx = SessionContext::new(self.id, self.lifetime.clone());
        let handler_span = tracing::debug_span!("handler", %msg_type);
        tokio::spawn(
            async move {
                if let Err(err) = handler.handle(ctx, msg, sink).await {
                    tracing::warn!(error = %err, "message handling failed");
                }
            }
            .instrument(handler_span),
        );

        loop {
            let reply = tokio::select! {
                biased;
                () = self.lifetime.cancelled() => break,
                reply = replies.recv() => reply,
            };
            let Some(reply) = reply else {
                break;
            };
            self.write(reply).await;
        }
    }

    /// Writes one whole message inside the exclusive write section.
    ///
    /// A write failure is fatal for the session: it cancels the lifetime
    /// token. Writes after the session has ended are dropped, and so are
    /// messages of calls cancelled before their turn to be written.
    pub async fn write(&self, out: impl Into<Outbound>) {
        let out = out.into();
        let mut writer = self.writer.lock().await;
        if self.lifetime.is_cancelled() {
            tracing::trace!("session ended, dropping outbound message");
            return;
        }
        if out.is_stale() {
            tracing::trace!("call cancelled, dropping queued reply");
            return;
        }
        if let Err(err) = writer.send(out.into_message().into_string()).await {
            tracing::warn!(error = %err, "couldn't write message");
            self.lifetime.cancel();
        }
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.close().await {
            tracing::warn!(error = %err, "failed to close connection");
        }
    }
}
