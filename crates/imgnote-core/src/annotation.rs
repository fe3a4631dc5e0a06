use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shape::NormalizedShape;

/// Caller-generated token naming an annotation before the host confirms it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemporaryId(String);

impl TemporaryId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// A fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemporaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Annotation identity: a temporary token while pending, the host-assigned
/// identifier once committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum AnnotationId {
    Temporary(TemporaryId),
    Permanent(String),
}

impl AnnotationId {
    pub fn permanent(id: impl Into<String>) -> Self {
        AnnotationId::Permanent(id.into())
    }

    /// Inverse of the `Display` form: `tmp:<token>` is a temporary id,
    /// anything else a permanent one.
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix("tmp:") {
            Some(token) => AnnotationId::Temporary(TemporaryId::new(token)),
            None => AnnotationId::Permanent(s.to_string()),
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, AnnotationId::Temporary(_))
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationId::Temporary(t) => write!(f, "tmp:{t}"),
            AnnotationId::Permanent(p) => f.write_str(p),
        }
    }
}

impl From<TemporaryId> for AnnotationId {
    fn from(t: TemporaryId) -> Self {
        AnnotationId::Temporary(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Drawn interactively, not yet confirmed by the host.
    Pending,
    /// Carries a host-assigned permanent identifier.
    Committed,
}

/// A fraction-space shape plus the host's opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub shape: NormalizedShape,
    pub payload: Value,
    /// Orthogonal to the lifecycle; at most one annotation per viewer has it set.
    pub highlighted: bool,
}

impl Annotation {
    pub fn new(id: AnnotationId, shape: NormalizedShape) -> Self {
        Self {
            id,
            shape,
            payload: Value::Null,
            highlighted: false,
        }
    }

    /// A pending annotation under a freshly generated temporary token.
    pub fn pending(shape: NormalizedShape) -> Self {
        Self::new(AnnotationId::Temporary(TemporaryId::generate()), shape)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.id.is_temporary() {
            Lifecycle::Pending
        } else {
            Lifecycle::Committed
        }
    }

    pub fn temporary_id(&self) -> Option<&TemporaryId> {
        match &self.id {
            AnnotationId::Temporary(t) => Some(t),
            AnnotationId::Permanent(_) => None,
        }
    }

    /// Re-key under the permanent identifier. Object payloads are merged key
    /// by key; any other non-null payload replaces the current one.
    pub fn commit(&mut self, permanent: String, payload: Value) {
        self.id = AnnotationId::Permanent(permanent);
        match (&mut self.payload, payload) {
            (_, Value::Null) => {}
            (Value::Object(current), Value::Object(incoming)) => current.extend(incoming),
            (current, incoming) => *current = incoming,
        }
    }
}
