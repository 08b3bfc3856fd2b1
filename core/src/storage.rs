//! Storage - flow-scoped shared values
//!
//! Actors that are not adjacent in the tree exchange data through the
//! storage of the flow they belong to. Traversal is serial, so the value a
//! reader sees is the one written last before it in traversal order.

use crate::error::{FlowError, FlowResult};
use crate::settings::PlaceholderPolicy;
use crate::token::Payload;
use ahash::AHashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Storage {
    values: AHashMap<String, Arc<Payload>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Payload> {
        self.values.get(name).map(|v| v.as_ref())
    }

    pub fn get_shared(&self, name: &str) -> Option<Arc<Payload>> {
        self.values.get(name).cloned()
    }

    /// Stores a value, replacing (and returning) any previous one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Payload>) -> Option<Arc<Payload>> {
        self.values.insert(name.into(), Arc::new(value.into()))
    }

    pub fn set_shared(&mut self, name: impl Into<String>, value: Arc<Payload>) -> Option<Arc<Payload>> {
        self.values.insert(name.into(), value)
    }

    /// Stores a value only if the name is unused, or unconditionally when forced.
    ///
    /// Returns whether the value was written.
    pub fn init(&mut self, name: &str, value: impl Into<Payload>, force: bool) -> bool {
        if !force && self.values.contains_key(name) {
            return false;
        }
        self.values.insert(name.to_string(), Arc::new(value.into()));
        true
    }

    /// Replaces an existing value with the result of `op`.
    pub fn update<F>(&mut self, name: &str, op: F) -> FlowResult<()>
    where
        F: FnOnce(&Payload) -> FlowResult<Payload>,
    {
        let current = self
            .values
            .get(name)
            .ok_or_else(|| FlowError::execution(format!("storage value '{name}' not present")))?;
        let next = op(current)?;
        self.values.insert(name.to_string(), Arc::new(next));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<Payload>> {
        self.values.remove(name)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stored names, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Replaces every `@{name}` in `text` with the string form of the stored value.
    pub fn expand(&self, text: &str, policy: PlaceholderPolicy) -> FlowResult<String> {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("@{") {
            let Some(len) = rest[start + 2..].find('}') else {
                break;
            };
            let name = &rest[start + 2..start + 2 + len];
            let end = start + 3 + len;
            result.push_str(&rest[..start]);
            match self.values.get(name) {
                Some(value) => result.push_str(&value.to_string()),
                None => match policy {
                    PlaceholderPolicy::Error => {
                        return Err(FlowError::execution(format!(
                            "storage value '{name}' not present, failed to expand: {text}"
                        )));
                    }
                    PlaceholderPolicy::Empty => {}
                    PlaceholderPolicy::Keep => result.push_str(&rest[start..end]),
                },
            }
            rest = &rest[end..];
        }
        result.push_str(rest);
        Ok(result)
    }

    /// Wraps a storage name as `@{name}`.
    pub fn pad(name: &str) -> String {
        if name.starts_with("@{") {
            name.to_string()
        } else {
            format!("@{{{name}}}")
        }
    }

    /// Strips the surrounding `@{...}`, if any.
    pub fn extract(padded: &str) -> &str {
        Self::placeholder_name(padded).unwrap_or(padded)
    }

    /// The storage name if `text` is exactly one placeholder.
    pub fn placeholder_name(text: &str) -> Option<&str> {
        let inner = text.strip_prefix("@{")?.strip_suffix('}')?;
        if inner.contains("@{") { None } else { Some(inner) }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("keys", &self.keys())
            .finish()
    }
}
