//! Standard actors for actorflow.
//!
//! [`registry`] knows every control actor plus the sources, transformers and
//! sinks in [`actors`]; [`flow`] builds an empty flow backed by it.

pub mod actors;
pub mod prelude;

use actorflow_core::{Flow, Registry};
use actors::{sink, source, transformer};
use std::sync::Arc;

/// Registry with the control actors and all standard actors.
pub fn registry() -> Registry {
    let mut registry = Registry::with_control();
    registry
        .register::<source::Start>()
        .register::<source::ForLoop>()
        .register::<source::StringConstants>()
        .register::<source::FileSupplier>()
        .register::<source::GetStorageValue>()
        .register::<transformer::PassThrough>()
        .register::<transformer::SetStorageValue>()
        .register::<transformer::InitStorageValue>()
        .register::<transformer::UpdateStorageValue>()
        .register::<transformer::DeleteStorageValue>()
        .register::<transformer::MathExpression>()
        .register::<transformer::DeepCopy>()
        .register::<sink::Null>()
        .register::<sink::Console>()
        .register::<sink::DumpFile>();
    registry
}

/// Empty flow whose definitions resolve against [`registry`].
pub fn flow(name: impl Into<String>) -> Flow {
    Flow::new(name).with_registry(Arc::new(registry()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_standard_actors() {
        let registry = registry();
        for name in ["Flow", "Tee", "ForLoop", "Copy", "Console", "DumpFile", "MathExpression"] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert_eq!(registry.types().count(), 22);
    }

    #[test]
    fn test_help_lists_options() {
        let help = registry().help("ForLoop").unwrap();
        assert!(help.starts_with("ForLoop\n=======\n"));
        assert!(help.contains("Capability: source"));
        assert!(help.contains("- step (integer, default: 1)"));
        assert!(help.contains("- skip (boolean, default: false)"));
    }
}
