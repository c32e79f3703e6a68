//! Change-feed bridge: streams collection changes under one call id.
//!
//! A `watch.resource` call opens a filtered subscription, waits for its
//! initial synchronization and then emits one reply per change until the
//! call is cancelled:
//!
//! ```json
//! {"id": "w1", "result": {"kind": "added", "display": "...", "structured": "..."}}
//! ```
//!
//! A representation that fails to render is replaced by
//! `{"error": "<message>"}`; the stream carries on.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::call::{Call, Reply};
use super::dispatcher::CallHandler;
use crate::domain::{ChangeEvent, ChangeKind, Requirement, ResourceObject};
use crate::error::{GatewayError, StreamError};
use crate::service::accessor::list_filter;
use crate::service::{Subscription, WatchSource, WatchTarget};
use crate::ws::connection::BoxError;
use crate::ws::dispatcher::ReplySink;

/// Method name served by [`WatchHandler`].
pub const WATCH: &str = "watch.resource";

/// Parameters of a `watch.resource` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchParams {
    /// Collection to watch.
    pub collection: String,
    /// Namespace scope; absent or empty spans all namespaces.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Restricts the watch to a single object.
    #[serde(default)]
    pub name: Option<String>,
    /// Field selector, e.g. `spec.color=red`.
    #[serde(default)]
    pub field_selector: Option<String>,
    /// Label selector, e.g. `tier=web,!canary`.
    #[serde(default)]
    pub label_selector: Option<String>,
}

impl WatchParams {
    /// Decodes call params.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if `params` is not a valid
    /// parameter object.
    pub fn decode(params: &serde_json::Value) -> Result<Self, GatewayError> {
        Self::deserialize(params)
            .map_err(|err| GatewayError::InvalidRequest(format!("invalid watch params: {err}")))
    }

    /// Builds the subscription target, folding `name` into the field
    /// selector as `metadata.name=<name>`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if a selector does not parse.
    pub fn target(&self) -> Result<WatchTarget, GatewayError> {
        let mut filter = list_filter(
            self.namespace.as_deref(),
            self.field_selector.as_deref(),
            self.label_selector.as_deref(),
        )?;
        if let Some(name) = self.name.as_deref().filter(|name| !name.is_empty()) {
            filter.fields = filter.fields.and(Requirement::Equals(
                "metadata.name".to_string(),
                name.to_string(),
            ));
        }
        Ok(WatchTarget {
            collection: self.collection.clone(),
            filter,
        })
    }
}

/// Turns an object into its two textual representations.
pub trait Renderer: Send + Sync + fmt::Debug {
    /// Human-oriented form.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be rendered.
    fn display(&self, obj: &ResourceObject) -> Result<String, BoxError>;

    /// Machine-oriented form.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be rendered.
    fn structured(&self, obj: &ResourceObject) -> Result<String, BoxError>;
}

/// YAML display form and pretty-printed JSON structured form.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestRenderer;

impl Renderer for ManifestRenderer {
    fn display(&self, obj: &ResourceObject) -> Result<String, BoxError> {
        Ok(serde_yaml::to_string(obj)?)
    }

    fn structured(&self, obj: &ResourceObject) -> Result<String, BoxError> {
        Ok(serde_json::to_string_pretty(obj)?)
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Rendered {
    Text(String),
    Failed { error: String },
}

impl From<Result<String, BoxError>> for Rendered {
    fn from(result: Result<String, BoxError>) -> Self {
        match result {
            Ok(text) => Self::Text(text),
            Err(err) => Self::Failed {
                error: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WatchEvent {
    kind: ChangeKind,
    display: Rendered,
    structured: Rendered,
}

impl WatchEvent {
    fn render(event: &ChangeEvent, renderer: &dyn Renderer) -> Self {
        let obj = event.object();
        let display = Rendered::from(renderer.display(obj));
        let structured = Rendered::from(renderer.structured(obj));
        if matches!(display, Rendered::Failed { .. })
            || matches!(structured, Rendered::Failed { .. })
        {
            tracing::warn!(object = obj.name(), "couldn't render object");
        }
        Self {
            kind: event.kind(),
            display,
            structured,
        }
    }
}

/// Serves `watch.resource` calls from a [`WatchSource`].
#[derive(Debug, Clone)]
pub struct WatchHandler {
    source: Arc<dyn WatchSource>,
    renderer: Arc<dyn Renderer>,
}

impl WatchHandler {
    /// Creates a handler rendering with [`ManifestRenderer`].
    #[must_use]
    pub fn new(source: Arc<dyn WatchSource>) -> Self {
        Self::with_renderer(source, Arc::new(ManifestRenderer))
    }

    /// Creates a handler with a custom renderer.
    #[must_use]
    pub fn with_renderer(source: Arc<dyn WatchSource>, renderer: Arc<dyn Renderer>) -> Self {
        Self { source, renderer }
    }

    async fn stream(
        &self,
        ctx: &CancellationToken,
        call: &Call,
        sub: &mut dyn Subscription,
        reply: &ReplySink,
    ) -> Result<(), StreamError> {
        sub.start().await;
        if !sub.wait_synced(ctx).await {
            tracing::debug!("cancelled before initial sync");
            return Ok(());
        }
        tracing::debug!("watch synced");

        loop {
            let event = tokio::select! {
                biased;
                () = ctx.cancelled() => return Ok(()),
                event = sub.next_event() => event,
            };
            let Some(event) = event else {
                tracing::debug!("watch source closed");
                return Ok(());
            };
            tracing::trace!(
                kind = ?event.kind(),
                object = event.object().name(),
                namespace = event.object().namespace(),
                "watch event"
            );

            if reply.is_closed() {
                tracing::debug!("session gone, ending watch");
                return Ok(());
            }

            let payload = serde_json::to_value(WatchEvent::render(&event, &*self.renderer))?;
            let out = Reply::result(call.id.clone(), payload);
            tokio::select! {
                biased;
                () = ctx.cancelled() => return Ok(()),
                sent = reply.send_json(&out) => sent?,
            }
        }
    }
}

#[async_trait]
impl CallHandler for WatchHandler {
    async fn handle(
        &self,
        ctx: CancellationToken,
        call: Call,
        reply: ReplySink,
    ) -> Result<(), StreamError> {
        if call.method.as_str() != WATCH {
            return Err(StreamError::Misdispatched(WATCH.to_string()));
        }

        let opened = match WatchParams::decode(&call.params).and_then(|params| params.target()) {
            Ok(target) => {
                tracing::debug!(
                    collection = %target.collection,
                    namespace = target.filter.namespace.as_deref(),
                    "opening watch"
                );
                self.source.subscribe(target).await
            }
            Err(err) => Err(err),
        };
        let mut sub = match opened {
            Ok(sub) => sub,
            Err(err) => {
                tracing::warn!(error = %err, "couldn't open watch");
                reply
                    .send_json(&Reply::error(call.id.clone(), err.to_string()))
                    .await?;
                return Err(err.into());
            }
        };

        let outcome = self.stream(&ctx, &call, sub.as_mut(), &reply).await;
        sub.stop();
        outcome
    }
}
