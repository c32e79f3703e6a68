//! WebSocket layer: sessions, message routing and the RPC call layer.
//!
//! The duplex endpoint at `/ws` carries JSON messages routed first by their
//! `type` field ([`dispatcher`]) and, for `"call"` messages, by method
//! ([`rpc`]). Each connection is one [`connection::Session`].

pub mod connection;
pub mod dispatcher;
pub mod handler;
pub mod messages;
pub mod rpc;

pub use connection::Session;
pub use dispatcher::{MessageDispatcher, MessageHandler, Outbound, ReplySink, SessionContext};
pub use messages::{Frame, Message, MessageType};

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport halves for session tests.

    use std::convert::Infallible;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::task::{Context, Poll};
    use std::time::Duration;

    use futures_util::{Sink, Stream, stream};
    use tokio::sync::mpsc;

    use super::Frame;

    #[derive(Debug, Default)]
    struct Recorded {
        written: Mutex<Vec<String>>,
        fail: AtomicBool,
        closes: AtomicUsize,
    }

    /// Recording write half with failure injection.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct FakeWriter {
        inner: Arc<Recorded>,
    }

    impl FakeWriter {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent write fail.
        pub(crate) fn fail_writes(&self) {
            self.inner.fail.store(true, Ordering::SeqCst);
        }

        pub(crate) fn close_count(&self) -> usize {
            self.inner.closes.load(Ordering::SeqCst)
        }

        pub(crate) fn written(&self) -> Vec<String> {
            self.inner
                .written
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Polls until at least `n` messages were written or `timeout`
        /// elapses, returning what was written.
        pub(crate) async fn wait_for(&self, n: usize, timeout: Duration) -> Vec<String> {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let written = self.written();
                if written.len() >= n || tokio::time::Instant::now() >= deadline {
                    return written;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    }

    impl Sink<String> for FakeWriter {
        type Error = io::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
            if self.inner.fail.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            self.inner
                .written
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            self.inner.closes.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    /// Inbound frame stream fed through the returned sender. Dropping the
    /// sender ends the stream like a vanished peer.
    pub(crate) fn inbound() -> (
        mpsc::UnboundedSender<Frame>,
        Pin<Box<dyn Stream<Item = Result<Frame, Infallible>> + Send>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let frames = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (Ok(frame), rx))
        });
        (tx, Box::pin(frames))
    }
}
