//! Hierarchical actor flows.
//!
//! A [`Flow`] is a tree of actors. Sources emit tokens, transformers turn
//! them into new tokens and sinks consume them; control actors own
//! sub-actors and decide how tokens travel between them.
//!
//! ```no_run
//! use actorflow::prelude::*;
//!
//! # fn main() -> FlowResult<()> {
//! let mut flow = actorflow::flow("demo");
//! let root = flow.root();
//! flow.add(root, ForLoop::new(1, 3, 1))?;
//! flow.add(root, MathExpression::new("X * 2"))?;
//! flow.add(root, Console::new())?;
//! flow.run()?;
//! # Ok(())
//! # }
//! ```

// Re-export core modules
pub use actorflow_core::{
    actor, console, container, context, control, error, expression, outcome, registry,
    schematic, settings, storage, telemetry, token,
};
pub use actorflow_core::{
    ActorDef, ActorId, ConsoleBuffer, Container, Flow, FlowError, FlowResult, Registry, Settings,
    Storage,
};
pub use actorflow_std::actors;
pub use actorflow_std::{flow, registry};

use std::path::Path;
use std::sync::Arc;

/// Loads a flow definition against the standard registry, configured by a
/// TOML settings file with environment overrides applied.
///
/// Logging is left alone; pass `flow.settings().logging` to
/// [`telemetry::init`] to install the configured subscriber.
pub fn load_flow(settings: impl AsRef<Path>, definition: impl AsRef<Path>) -> anyhow::Result<Flow> {
    let settings = Settings::load(settings)?.apply_env();
    let flow = Flow::load(definition, Arc::new(registry()))?.with_settings(settings);
    tracing::info!(flow = %flow.name(flow.root()), actors = flow.len(), "flow loaded");
    Ok(flow)
}

pub mod prelude {
    pub use actorflow_core::prelude::*;
    pub use actorflow_core::{ConsoleBuffer, Container, Registry, Settings};
    pub use actorflow_std::prelude::*;
}
