//! Views of the flow handed to an actor while it sets up or executes.

use crate::actor::Capability;
use crate::error::{FlowError, FlowResult};
use crate::flow::{ActorId, Flow};
use crate::settings::Settings;
use crate::storage::Storage;
use crate::token::{Payload, Token};
use serde_json::Value;

/// An active (non-skipped) sub-actor, as seen during setup.
#[derive(Debug, Clone)]
pub struct ChildInfo {
    pub id: ActorId,
    pub full_name: String,
    pub capability: Capability,
}

pub struct SetupContext<'a> {
    pub(crate) flow: &'a Flow,
    pub(crate) id: ActorId,
}

impl<'a> SetupContext<'a> {
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn full_name(&self) -> String {
        self.flow.full_name(self.id)
    }

    pub fn settings(&self) -> &Settings {
        self.flow.settings()
    }

    pub fn storage(&self) -> &Storage {
        self.flow.storage()
    }

    pub fn active_children(&self) -> Vec<ChildInfo> {
        self.flow
            .active_children(self.id)
            .into_iter()
            .map(|id| ChildInfo {
                id,
                full_name: self.flow.full_name(id),
                capability: self.flow.capability(id),
            })
            .collect()
    }

    /// Checks that the sub-actors can be chained: every actor after the first
    /// accepts input and its predecessor produces output.
    pub fn check_sequential(&self, allow_source: bool) -> FlowResult<()> {
        let children = self.active_children();
        for (i, child) in children.iter().enumerate() {
            if i == 0 {
                if !allow_source && !child.capability.consumes {
                    return Err(FlowError::configuration(format!(
                        "first sub-actor '{}' does not accept input",
                        child.full_name
                    )));
                }
                continue;
            }
            if !child.capability.consumes {
                return Err(FlowError::configuration(format!(
                    "'{}' does not accept input",
                    child.full_name
                )));
            }
            let previous = &children[i - 1];
            if !previous.capability.produces {
                return Err(FlowError::configuration(format!(
                    "'{}' does not produce output for '{}'",
                    previous.full_name, child.full_name
                )));
            }
        }
        Ok(())
    }

    pub fn require_source_first(&self) -> FlowResult<()> {
        match self.active_children().first() {
            Some(first) if first.capability.is_source() => Ok(()),
            Some(first) => Err(FlowError::configuration(format!(
                "first sub-actor '{}' is not a source",
                first.full_name
            ))),
            None => Err(FlowError::configuration("no active sub-actors")),
        }
    }

    pub fn require_children(&self) -> FlowResult<()> {
        if self.flow.active_children(self.id).is_empty() {
            return Err(FlowError::configuration("no active sub-actors"));
        }
        Ok(())
    }

    /// Every active sub-actor must accept input.
    pub fn require_consumers(&self) -> FlowResult<()> {
        for child in self.active_children() {
            if !child.capability.consumes {
                return Err(FlowError::configuration(format!(
                    "'{}' does not accept input",
                    child.full_name
                )));
            }
        }
        Ok(())
    }
}

pub struct ExecContext<'a> {
    pub(crate) flow: &'a mut Flow,
    pub(crate) id: ActorId,
}

impl<'a> ExecContext<'a> {
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn full_name(&self) -> String {
        self.flow.full_name(self.id)
    }

    pub fn settings(&self) -> &Settings {
        self.flow.settings()
    }

    pub fn storage(&self) -> &Storage {
        self.flow.storage()
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        self.flow.storage_mut()
    }

    /// Replaces `@{name}` placeholders with storage values.
    pub fn expand(&self, text: &str) -> FlowResult<String> {
        self.flow
            .storage()
            .expand(text, self.flow.settings().engine.placeholders)
    }

    /// Resolves an option value: a lone `@{name}` yields the stored payload
    /// itself, anything else is expanded as text.
    pub fn resolve(&self, option: &str) -> FlowResult<Payload> {
        if let Some(name) = Storage::placeholder_name(option) {
            if let Some(value) = self.flow.storage().get(name) {
                return Ok(value.clone());
            }
        }
        Ok(Payload::from(self.expand(option)?))
    }

    /// Evaluates an expression after placeholder expansion.
    pub fn evaluate(&self, expression: &str, bindings: &[(&str, &Value)]) -> FlowResult<Value> {
        let expanded = self.expand(expression)?;
        self.flow.evaluator().evaluate(&expanded, bindings)
    }

    /// Replaces a stored value with the result of `expression`, the current
    /// value being bound as `X`. The value must already be present.
    pub fn update_storage(&mut self, name: &str, expression: &str) -> FlowResult<()> {
        let expanded = self.expand(expression)?;
        let (storage, evaluator) = self.flow.storage_with_evaluator();
        storage.update(name, |current| {
            let value = current.as_value().ok_or_else(|| {
                FlowError::execution(format!("storage value '{name}' is not a plain value"))
            })?;
            Ok(Payload::from(evaluator.evaluate(&expanded, &[("X", value)])?))
        })
    }

    /// Evaluates a condition with the payload bound as `payload`.
    pub fn condition(&self, expression: &str, payload: Option<&Payload>) -> FlowResult<bool> {
        let expanded = self.expand(expression)?;
        let bound = payload.map(payload_binding);
        let bindings: Vec<(&str, &Value)> = bound.iter().map(|v| ("payload", v)).collect();
        self.flow.evaluator().condition(&expanded, &bindings)
    }

    /// Writes one line to the flow's console.
    pub fn println(&mut self, line: &str) -> FlowResult<()> {
        let console = self.flow.console();
        writeln!(console, "{line}")
            .and_then(|_| console.flush())
            .map_err(|e| FlowError::execution(format!("failed to write to console: {e}")))
    }

    /// Requests termination of the whole flow at the next traversal point.
    pub fn stop(&mut self) {
        self.flow.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.flow.is_stopped()
    }

    pub fn has_active_children(&self) -> bool {
        !self.flow.active_children(self.id).is_empty()
    }

    /// Runs the sub-actors as a chain, discarding what the last one emits.
    pub fn run_children(&mut self, input: Option<Token>) -> FlowResult<()> {
        self.flow.run_sequential(self.id, input, false).map(|_| ())
    }

    /// Runs the sub-actors as a chain and returns what the last one emits.
    pub fn collect_children(&mut self, input: Option<Token>) -> FlowResult<Vec<Token>> {
        self.flow.run_sequential(self.id, input, true)
    }

    /// Hands a clone of `token` (same payload) to every sub-actor.
    pub fn fan_out(&mut self, token: &Token, abort_on_failure: bool) -> FlowResult<()> {
        self.flow.fan_out(self.id, token, abort_on_failure)
    }
}

/// Value bound to `payload` in conditions.
fn payload_binding(payload: &Payload) -> Value {
    match payload {
        Payload::Value(value) => value.clone(),
        other => Value::String(other.to_string()),
    }
}

/// Unwraps the input of an actor that consumes tokens.
pub fn require_input(input: Option<Token>) -> FlowResult<Token> {
    input.ok_or_else(|| FlowError::execution("no input token"))
}
