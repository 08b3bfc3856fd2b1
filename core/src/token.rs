//! Tokens: the data envelopes travelling between actors.

use crate::container::Container;
use serde_json::Value;
use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque value owned by an external backend (models, datasets, ...).
#[derive(Clone)]
pub struct Opaque {
    label: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let full = type_name::<T>();
        Self {
            label: full.split("::").last().unwrap_or(full).to_string(),
            inner: Arc::new(value),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opaque").field("label", &self.label).finish()
    }
}

/// What a token carries.
#[derive(Debug, Clone)]
pub enum Payload {
    Value(Value),
    Container(Container),
    Opaque(Opaque),
}

impl Payload {
    pub fn null() -> Self {
        Payload::Value(Value::Null)
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Payload::Opaque(Opaque::new(value))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Payload::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Payload::Value(Value::Number(_)))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Payload::Opaque(o) => o.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Short label of the payload's shape, used in error messages.
    pub fn type_label(&self) -> &str {
        match self {
            Payload::Value(Value::Null) => "null",
            Payload::Value(Value::Bool(_)) => "boolean",
            Payload::Value(Value::Number(_)) => "number",
            Payload::Value(Value::String(_)) => "string",
            Payload::Value(Value::Array(_)) => "array",
            Payload::Value(Value::Object(_)) => "object",
            Payload::Container(c) => c.kind(),
            Payload::Opaque(o) => o.label(),
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Value(a), Payload::Value(b)) => a == b,
            (Payload::Container(a), Payload::Container(b)) => a == b,
            (Payload::Opaque(a), Payload::Opaque(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            _ => false,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Value(Value::String(s)) => f.write_str(s),
            Payload::Value(v) => write!(f, "{v}"),
            Payload::Container(c) => write!(f, "{c}"),
            Payload::Opaque(o) => write!(f, "<{}>", o.label()),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Value(value)
    }
}

impl From<Container> for Payload {
    fn from(container: Container) -> Self {
        Payload::Container(container)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Value(Value::String(value))
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Value(Value::from(value))
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Value(Value::from(value))
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Value(Value::Bool(value))
    }
}

/// Container for transporting data through the flow.
///
/// Cloning a token shares the payload; only an explicit copy duplicates it.
#[derive(Debug, Clone)]
pub struct Token {
    id: Uuid,
    payload: Arc<Payload>,
    metadata: BTreeMap<String, Value>,
}

impl Token {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self::from_shared(Arc::new(payload.into()))
    }

    pub fn from_shared(payload: Arc<Payload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn shared_payload(&self) -> Arc<Payload> {
        Arc::clone(&self.payload)
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Whether both tokens point at the very same payload allocation.
    pub fn shares_payload_with(&self, other: &Token) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Model {
        depth: u32,
    }

    #[test]
    fn test_clone_shares_payload() {
        let token = Token::new(json!({"a": 1}));
        let copy = token.clone();
        assert!(token.shares_payload_with(&copy));
        assert_eq!(token.id(), copy.id());
    }

    #[test]
    fn test_fresh_tokens_get_distinct_ids() {
        let a = Token::new(1i64);
        let b = Token::new(1i64);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.payload(), b.payload());
    }

    #[test]
    fn test_display_strips_string_quotes() {
        assert_eq!(Payload::from("hello").to_string(), "hello");
        assert_eq!(Payload::from(3i64).to_string(), "3");
        assert_eq!(Payload::opaque(Model { depth: 2 }).to_string(), "<Model>");
    }

    #[test]
    fn test_opaque_downcast() {
        let payload = Payload::opaque(Model { depth: 4 });
        assert_eq!(payload.downcast_ref::<Model>(), Some(&Model { depth: 4 }));
        assert_eq!(payload.type_label(), "Model");
        assert!(payload.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_metadata() {
        let token = Token::new(Payload::null()).with_metadata("origin", "ForLoop");
        assert_eq!(token.metadata_value("origin"), Some(&json!("ForLoop")));
    }
}
