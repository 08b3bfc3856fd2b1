//! The actor contract.
//!
//! An actor is a typed, serializable configuration plus behavior. The flow
//! owns the tree structure, the lifecycle state and the output queue of
//! every actor; the actor itself only sees its configuration and a context.

use crate::context::{ExecContext, SetupContext};
use crate::error::{FlowError, FlowResult};
use crate::outcome::Outcome;
use crate::token::Token;
use schemars::JsonSchema;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;

/// What an actor does with tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
    /// Accepts an input token.
    pub consumes: bool,
    /// Emits output tokens.
    pub produces: bool,
    /// Owns sub-actors and routes tokens through them.
    pub routes: bool,
}

impl Capability {
    pub const SOURCE: Capability = Capability {
        consumes: false,
        produces: true,
        routes: false,
    };
    pub const TRANSFORMER: Capability = Capability {
        consumes: true,
        produces: true,
        routes: false,
    };
    pub const SINK: Capability = Capability {
        consumes: true,
        produces: false,
        routes: false,
    };
    /// Neither consumes nor produces; only the flow root.
    pub const STANDALONE: Capability = Capability {
        consumes: false,
        produces: false,
        routes: false,
    };

    pub const fn routing(self) -> Self {
        Capability {
            routes: true,
            ..self
        }
    }

    pub fn is_source(&self) -> bool {
        self.produces && !self.consumes
    }

    pub fn is_transformer(&self) -> bool {
        self.consumes && self.produces
    }

    pub fn is_sink(&self) -> bool {
        self.consumes && !self.produces
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_source() {
            "source"
        } else if self.is_transformer() {
            "transformer"
        } else if self.is_sink() {
            "sink"
        } else {
            "standalone"
        };
        f.write_str(kind)?;
        if self.routes {
            f.write_str(" (control)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Created,
    Configured,
    Ready,
    Running,
    WrappedUp,
    CleanedUp,
    Failed,
}

impl LifecycleState {
    pub fn can_execute(self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Running)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Configured => "configured",
            LifecycleState::Ready => "ready",
            LifecycleState::Running => "running",
            LifecycleState::WrappedUp => "wrapped up",
            LifecycleState::CleanedUp => "cleaned up",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Options every actor carries next to its typed configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonOptions {
    pub annotation: Option<String>,
    pub skip: bool,
}

impl CommonOptions {
    pub const ANNOTATION: &'static str = "annotation";
    pub const SKIP: &'static str = "skip";

    pub fn is_common(key: &str) -> bool {
        key == Self::ANNOTATION || key == Self::SKIP
    }

    /// Applies one common option, validating its JSON type.
    pub fn apply(&mut self, key: &str, value: &Value) -> FlowResult<()> {
        match (key, value) {
            (Self::ANNOTATION, Value::Null) => self.annotation = None,
            (Self::ANNOTATION, Value::String(s)) => self.annotation = Some(s.clone()),
            (Self::SKIP, Value::Bool(b)) => self.skip = *b,
            (Self::ANNOTATION, other) => {
                return Err(FlowError::configuration(format!(
                    "option 'annotation' expects a string, got {other}"
                )));
            }
            (Self::SKIP, other) => {
                return Err(FlowError::configuration(format!(
                    "option 'skip' expects a boolean, got {other}"
                )));
            }
            (key, _) => {
                return Err(FlowError::configuration(format!("unknown common option '{key}'")));
            }
        }
        Ok(())
    }

    pub fn write_into(&self, map: &mut Map<String, Value>) {
        map.insert(
            Self::ANNOTATION.to_string(),
            self.annotation.clone().map(Value::String).unwrap_or(Value::Null),
        );
        map.insert(Self::SKIP.to_string(), Value::Bool(self.skip));
    }
}

/// Access to an actor's typed configuration as a JSON map.
///
/// Implemented for every [`ActorType`]; not meant to be implemented by hand.
pub trait Configurable {
    fn actor_type(&self) -> &'static str;

    fn options(&self) -> FlowResult<Map<String, Value>>;

    /// Replaces the configuration. Runtime state is reset to its defaults.
    fn reconfigure(&mut self, options: Map<String, Value>) -> FlowResult<()>;

    fn as_any(&self) -> &dyn Any;
}

pub trait Actor: Configurable + Send + 'static {
    fn capability(&self) -> Capability;

    /// Short summary of salient options, shown in the tree rendering.
    fn quick_info(&self) -> Option<String> {
        None
    }

    /// Precondition checks and preparation, run once per flow setup.
    fn setup(&mut self, _ctx: &SetupContext<'_>) -> FlowResult<()> {
        Ok(())
    }

    /// Rejects tokens this actor cannot process. Runs before `execute`.
    fn check_input(&self, _token: &Token) -> FlowResult<()> {
        Ok(())
    }

    /// Sources receive `None`, everything else the token to process.
    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome>;

    /// Whether the flow blocks on the viewer after each execution.
    fn waits(&self) -> bool {
        false
    }

    fn wrapup(&mut self) -> FlowResult<()> {
        Ok(())
    }

    /// Releases resources. Also called when this actor fails.
    fn cleanup(&mut self) {}
}

/// A concrete, registrable actor type.
pub trait ActorType: Actor + Serialize + DeserializeOwned + JsonSchema + Default {
    const TYPE: &'static str;
    const DESCRIPTION: &'static str;
}

impl<T: ActorType> Configurable for T {
    fn actor_type(&self) -> &'static str {
        T::TYPE
    }

    fn options(&self) -> FlowResult<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(FlowError::definition(format!(
                "options of {} must serialize to an object, got {other}",
                T::TYPE
            ))),
        }
    }

    fn reconfigure(&mut self, options: Map<String, Value>) -> FlowResult<()> {
        *self = serde_json::from_value(Value::Object(options))
            .map_err(|e| FlowError::configuration(format!("invalid options for {}: {e}", T::TYPE)))?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
    #[serde(default, deny_unknown_fields)]
    struct Repeat {
        times: u32,
        #[serde(skip)]
        emitted: u32,
    }

    impl Default for Repeat {
        fn default() -> Self {
            Self {
                times: 2,
                emitted: 0,
            }
        }
    }

    impl Actor for Repeat {
        fn capability(&self) -> Capability {
            Capability::TRANSFORMER
        }

        fn execute(&mut self, input: Option<Token>, _ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
            self.emitted += self.times;
            Ok(Outcome::Next(input.into_iter().collect()))
        }
    }

    impl ActorType for Repeat {
        const TYPE: &'static str = "Repeat";
        const DESCRIPTION: &'static str = "Test actor.";
    }

    #[test]
    fn test_capability_classification() {
        assert!(Capability::SOURCE.is_source());
        assert!(Capability::SINK.is_sink());
        assert!(Capability::TRANSFORMER.routing().routes);
        assert!(Capability::TRANSFORMER.routing().is_transformer());
        assert_eq!(Capability::SINK.routing().to_string(), "sink (control)");
        assert_eq!(Capability::STANDALONE.to_string(), "standalone");
    }

    #[test]
    fn test_options_skip_runtime_state() {
        let actor = Repeat {
            times: 3,
            emitted: 9,
        };
        let options = actor.options().unwrap();
        assert_eq!(Value::Object(options), json!({"times": 3}));
    }

    #[test]
    fn test_reconfigure_validates() {
        let mut actor = Repeat::default();
        let mut options = actor.options().unwrap();
        options.insert("times".into(), json!(5));
        actor.reconfigure(options).unwrap();
        assert_eq!(actor.times, 5);

        let mut bad = Map::new();
        bad.insert("count".into(), json!(1));
        let err = actor.reconfigure(bad).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert_eq!(actor.times, 5);

        let mut wrong_type = Map::new();
        wrong_type.insert("times".into(), json!("many"));
        assert!(actor.reconfigure(wrong_type).is_err());
    }

    #[test]
    fn test_common_options() {
        let mut common = CommonOptions::default();
        common.apply("skip", &json!(true)).unwrap();
        common.apply("annotation", &json!("note")).unwrap();
        assert!(common.skip);
        assert_eq!(common.annotation.as_deref(), Some("note"));
        assert!(common.apply("skip", &json!("yes")).is_err());

        let mut map = Map::new();
        common.write_into(&mut map);
        assert_eq!(Value::Object(map), json!({"annotation": "note", "skip": true}));
    }
}
