//! Rhai-backed evaluation of conditions and arithmetic expressions.

use crate::error::{FlowError, FlowResult};
use rhai::{Dynamic, Engine, Scope};
use serde_json::Value;

/// Shared rhai engine with an operation budget per evaluation.
pub struct Evaluator {
    engine: Engine,
}

impl Evaluator {
    pub fn new(max_operations: u64) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(max_operations);
        Self { engine }
    }

    /// Evaluates `expression` with the given variables in scope.
    pub fn evaluate(&self, expression: &str, bindings: &[(&str, &Value)]) -> FlowResult<Value> {
        let mut scope = Scope::new();
        for (name, value) in bindings {
            scope.push_dynamic(name.to_string(), json_to_dynamic(value)?);
        }
        let result: Dynamic = self
            .engine
            .eval_with_scope(&mut scope, expression)
            .map_err(|e| FlowError::execution(format!("failed to evaluate '{expression}': {e}")))?;
        dynamic_to_json(result)
    }

    /// Evaluates a boolean condition. An empty expression is true.
    pub fn condition(&self, expression: &str, bindings: &[(&str, &Value)]) -> FlowResult<bool> {
        if expression.trim().is_empty() {
            return Ok(true);
        }
        match self.evaluate(expression, bindings)? {
            Value::Bool(b) => Ok(b),
            other => Err(FlowError::execution(format!(
                "condition '{expression}' must evaluate to a boolean, got {other}"
            ))),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(crate::settings::EngineSettings::default().max_expression_operations)
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator").finish_non_exhaustive()
    }
}

fn json_to_dynamic(value: &Value) -> FlowResult<Dynamic> {
    rhai::serde::to_dynamic(value).map_err(|e| FlowError::execution(e.to_string()))
}

fn dynamic_to_json(dynamic: Dynamic) -> FlowResult<Value> {
    rhai::serde::from_dynamic(&dynamic).map_err(|e| FlowError::execution(e.to_string()))
}
