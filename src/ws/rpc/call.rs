//! RPC call envelopes and replies.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client-chosen call identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Wraps an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Method name a call is routed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallMethod(String);

impl CallMethod {
    /// Reserved method that cancels another call.
    pub const CANCEL: &'static str = ".cancel";

    /// Wraps a method name.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self(method.into())
    }

    /// Returns the method name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the reserved cancellation method.
    #[must_use]
    pub fn is_cancel(&self) -> bool {
        self.0 == Self::CANCEL
    }
}

impl Borrow<str> for CallMethod {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One RPC invocation, decoded from a `"call"` message.
///
/// `params` is passed to the handler uninterpreted; it is `null` when the
/// client omits it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Call {
    /// Client-chosen id, echoed on every reply.
    pub id: CallId,
    /// Method to invoke.
    pub method: CallMethod,
    /// Method-specific parameters.
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Deserialize)]
struct CancelParams {
    id: Option<CallId>,
}

impl Call {
    /// For a `.cancel` call, the id of the call to cancel: `params.id` when
    /// given, else the cancel call's own id.
    #[must_use]
    pub fn cancel_target(&self) -> CallId {
        serde_json::from_value::<CancelParams>(self.params.clone())
            .ok()
            .and_then(|params| params.id)
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Success or failure payload of a reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Arbitrary success payload.
    Result(Value),
    /// Human-readable failure description.
    Error(String),
}

/// One reply to a call. A call may receive any number of replies.
///
/// Serializes as `{"id": ..., "result": ...}` or `{"id": ..., "error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    /// Id of the originating call.
    pub id: CallId,
    /// Payload.
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Reply {
    /// Success reply carrying `result`.
    #[must_use]
    pub fn result(id: CallId, result: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Result(result),
        }
    }

    /// The `{"result": "ok"}` acknowledgement.
    #[must_use]
    pub fn ok(id: CallId) -> Self {
        Self::result(id, Value::String("ok".to_string()))
    }

    /// Error reply.
    #[must_use]
    pub fn error(id: CallId, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Error(message.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(raw: Value) -> Call {
        let Ok(call) = serde_json::from_value::<Call>(raw) else {
            panic!("call must decode");
        };
        call
    }

    #[test]
    fn decodes_call_envelope_ignoring_type() {
        let call = decode(json!({ "type": "call", "id": "a", "method": "m", "params": { "x": 1 } }));
        assert_eq!(call.id.as_str(), "a");
        assert_eq!(call.method.as_str(), "m");
        assert_eq!(call.params, json!({ "x": 1 }));
    }

    #[test]
    fn missing_params_is_null() {
        let call = decode(json!({ "id": "a", "method": "m" }));
        assert_eq!(call.params, Value::Null);
    }

    #[test]
    fn missing_method_fails_to_decode() {
        assert!(serde_json::from_value::<Call>(json!({ "id": "a" })).is_err());
    }

    #[test]
    fn cancel_target_prefers_params_id() {
        let call = decode(json!({ "id": "c1", "method": ".cancel", "params": { "id": "w1" } }));
        assert!(call.method.is_cancel());
        assert_eq!(call.cancel_target(), CallId::new("w1"));

        let own = decode(json!({ "id": "w1", "method": ".cancel" }));
        assert_eq!(own.cancel_target(), CallId::new("w1"));
    }

    #[test]
    fn replies_serialize_flat() {
        let Ok(ok) = serde_json::to_value(Reply::ok(CallId::new("c1"))) else {
            panic!("serialization failed");
        };
        assert_eq!(ok, json!({ "id": "c1", "result": "ok" }));

        let Ok(err) = serde_json::to_value(Reply::error(CallId::new("a"), "Unknown method")) else {
            panic!("serialization failed");
        };
        assert_eq!(err, json!({ "id": "a", "error": "Unknown method" }));
    }
}
