//! Registry of actor types: how to build them, what they accept and how to
//! describe them.

use crate::actor::{Actor, ActorType, Capability, CommonOptions};
use crate::control::{
    Branch, ContainerValuePicker, FlowActor, Sequence, Stop, Tee, Trigger,
};
use crate::error::{FlowError, FlowResult};
use schemars::Schema;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Static description of one registered actor type.
#[derive(Clone)]
pub struct ActorInfo {
    pub actor_type: &'static str,
    pub description: &'static str,
    pub capability: Capability,
    schema: fn() -> Schema,
    defaults: fn() -> FlowResult<Map<String, Value>>,
    factory: fn() -> Box<dyn Actor>,
}

impl ActorInfo {
    pub fn of<T: ActorType>() -> Self {
        Self {
            actor_type: T::TYPE,
            description: T::DESCRIPTION,
            capability: T::default().capability(),
            schema: schema_of::<T>,
            defaults: defaults_of::<T>,
            factory: create_default::<T>,
        }
    }

    pub fn schema(&self) -> Schema {
        (self.schema)()
    }

    pub fn defaults(&self) -> FlowResult<Map<String, Value>> {
        (self.defaults)()
    }

    pub fn create(&self) -> Box<dyn Actor> {
        (self.factory)()
    }
}

impl std::fmt::Debug for ActorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorInfo")
            .field("actor_type", &self.actor_type)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

fn schema_of<T: ActorType>() -> Schema {
    schemars::schema_for!(T)
}

fn defaults_of<T: ActorType>() -> FlowResult<Map<String, Value>> {
    T::default().options()
}

fn create_default<T: ActorType>() -> Box<dyn Actor> {
    Box::new(T::default())
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: BTreeMap<&'static str, ActorInfo>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the control actors.
    pub fn with_control() -> Self {
        let mut registry = Self::new();
        registry
            .register::<FlowActor>()
            .register::<Sequence>()
            .register::<Branch>()
            .register::<Tee>()
            .register::<Trigger>()
            .register::<Stop>()
            .register::<ContainerValuePicker>();
        registry
    }

    pub fn register<T: ActorType>(&mut self) -> &mut Self {
        self.types.insert(T::TYPE, ActorInfo::of::<T>());
        self
    }

    pub fn get(&self, actor_type: &str) -> Option<&ActorInfo> {
        self.types.get(actor_type)
    }

    pub fn contains(&self, actor_type: &str) -> bool {
        self.types.contains_key(actor_type)
    }

    /// Registered type identifiers, sorted.
    pub fn types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.keys().copied()
    }

    pub fn create(&self, actor_type: &str) -> FlowResult<Box<dyn Actor>> {
        self.info(actor_type).map(ActorInfo::create)
    }

    pub fn schema(&self, actor_type: &str) -> FlowResult<Schema> {
        self.info(actor_type).map(ActorInfo::schema)
    }

    /// Human readable description of an actor type and its options.
    pub fn help(&self, actor_type: &str) -> FlowResult<String> {
        let info = self.info(actor_type)?;
        let schema = info.schema();
        let defaults = info.defaults()?;
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut out = String::new();
        let _ = writeln!(out, "{}", info.actor_type);
        let _ = writeln!(out, "{}", "=".repeat(info.actor_type.len()));
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", info.description);
        let _ = writeln!(out);
        let _ = writeln!(out, "Capability: {}", info.capability);
        let _ = writeln!(out);
        let _ = writeln!(out, "Options:");
        for (name, property) in &properties {
            let default = defaults.get(name).cloned().unwrap_or(Value::Null);
            write_option(
                &mut out,
                name,
                &describe_type(property, &schema),
                &default,
                property.get("description").and_then(Value::as_str),
            );
        }
        write_option(
            &mut out,
            CommonOptions::ANNOTATION,
            "string or null",
            &Value::Null,
            Some("Free-form comment attached to the actor."),
        );
        write_option(
            &mut out,
            CommonOptions::SKIP,
            "boolean",
            &Value::Bool(false),
            Some("Whether the actor is ignored during setup and execution."),
        );
        Ok(out)
    }

    fn info(&self, actor_type: &str) -> FlowResult<&ActorInfo> {
        self.types
            .get(actor_type)
            .ok_or_else(|| FlowError::definition(format!("unknown actor type '{actor_type}'")))
    }
}

fn write_option(out: &mut String, name: &str, kind: &str, default: &Value, doc: Option<&str>) {
    let _ = writeln!(out, "- {name} ({kind}, default: {default})");
    if let Some(doc) = doc {
        for line in doc.lines() {
            let _ = writeln!(out, "    {}", line.trim());
        }
    }
}

/// Short type name of a schema property, following local references.
fn describe_type(property: &Value, root: &Schema) -> String {
    if let Some(value) = property.get("const") {
        return value.to_string();
    }
    if let Some(values) = property.get("enum").and_then(Value::as_array) {
        return values
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(" | ");
    }
    if let Some(kind) = property.get("type") {
        return match kind {
            Value::String(s) => s.clone(),
            Value::Array(kinds) => kinds
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" or "),
            other => other.to_string(),
        };
    }
    if let Some(reference) = property.get("$ref").and_then(Value::as_str) {
        let name = reference.rsplit('/').next().unwrap_or(reference);
        let target = root
            .get("$defs")
            .and_then(|defs| defs.get(name))
            .or_else(|| root.get("definitions").and_then(|defs| defs.get(name)));
        return match target {
            Some(target) => describe_type(target, root),
            None => name.to_string(),
        };
    }
    for key in ["oneOf", "anyOf"] {
        if let Some(variants) = property.get(key).and_then(Value::as_array) {
            return variants
                .iter()
                .map(|variant| describe_type(variant, root))
                .collect::<Vec<_>>()
                .join(" or ");
        }
    }
    "any".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_types_registered() {
        let registry = Registry::with_control();
        let types: Vec<_> = registry.types().collect();
        assert_eq!(
            types,
            vec![
                "Branch",
                "ContainerValuePicker",
                "Flow",
                "Sequence",
                "Stop",
                "Tee",
                "Trigger"
            ]
        );
        assert!(registry.get("Branch").is_some_and(|i| i.capability.routes));
    }

    #[test]
    fn test_unknown_type() {
        let registry = Registry::with_control();
        let err = registry.create("Nope").err();
        assert_eq!(
            err.map(|e| e.to_string()),
            Some("invalid flow definition: unknown actor type 'Nope'".to_string())
        );
    }

    #[test]
    fn test_help_lists_options_with_defaults() {
        let registry = Registry::with_control();
        let help = registry.help("ContainerValuePicker").unwrap();
        assert!(help.starts_with("ContainerValuePicker\n===================="));
        assert!(help.contains("Capability: transformer (control)"));
        assert!(help.contains("- value (string, default: \"Model\")"));
        assert!(help.contains("    Name of the container field to pick."));
        assert!(help.contains("- switch (boolean, default: false)"));
        assert!(help.contains("- skip (boolean, default: false)"));
    }

    #[test]
    fn test_help_follows_enum_references() {
        let registry = Registry::with_control();
        let help = registry.help("Branch").unwrap();
        assert!(help.contains("- on_failure ("));
        assert!(help.contains("default: \"continue\""));
        assert!(help.contains("\"abort\""));
    }

    #[test]
    fn test_schema_lists_properties() {
        let registry = Registry::with_control();
        let schema = registry.schema("Tee").unwrap();
        assert!(schema.get("properties").and_then(|p| p.get("condition")).is_some());
    }
}
