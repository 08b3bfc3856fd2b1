use actorflow_core::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Forwards its input unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct PassThrough {}

impl PassThrough {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for PassThrough {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER
    }

    fn execute(&mut self, input: Option<Token>, _ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        Ok(Outcome::one(require_input(input)?))
    }
}

impl ActorType for PassThrough {
    const TYPE: &'static str = "PassThrough";
    const DESCRIPTION: &'static str = "Dummy actor that just passes through the data.";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SetStorageValue {
    /// Name to store the payload under.
    pub storage_name: String,
}

impl SetStorageValue {
    pub fn new(storage_name: impl Into<String>) -> Self {
        Self {
            storage_name: storage_name.into(),
        }
    }
}

impl Actor for SetStorageValue {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER
    }

    fn quick_info(&self) -> Option<String> {
        Some(format!("storage_name: {}", self.storage_name))
    }

    fn setup(&mut self, _ctx: &SetupContext<'_>) -> FlowResult<()> {
        super::require_storage_name(&self.storage_name)
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        ctx.storage_mut()
            .set_shared(self.storage_name.clone(), token.shared_payload());
        Ok(Outcome::one(token))
    }
}

impl ActorType for SetStorageValue {
    const TYPE: &'static str = "SetStorageValue";
    const DESCRIPTION: &'static str = "Stores the payload of the token passing through under the specified name in temporary storage.";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct InitStorageValue {
    /// Name of the storage value to initialize.
    pub storage_name: String,
    /// Initial value; strings may contain `@{name}` placeholders.
    pub value: Value,
    /// Overwrite a value that is already present.
    pub force: bool,
}

impl InitStorageValue {
    pub fn new(storage_name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            storage_name: storage_name.into(),
            value: value.into(),
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

impl Actor for InitStorageValue {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER
    }

    fn quick_info(&self) -> Option<String> {
        let mut info = format!("storage_name: {}, value: {}", self.storage_name, self.value);
        if self.force {
            info.push_str(", force");
        }
        Some(info)
    }

    fn setup(&mut self, _ctx: &SetupContext<'_>) -> FlowResult<()> {
        super::require_storage_name(&self.storage_name)
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        let value = match &self.value {
            Value::String(s) => ctx.resolve(s)?,
            other => Payload::from(other.clone()),
        };
        if ctx.storage_mut().init(&self.storage_name, value, self.force) {
            tracing::debug!(storage_name = %self.storage_name, "storage value initialized");
        }
        Ok(Outcome::one(token))
    }
}

impl ActorType for InitStorageValue {
    const TYPE: &'static str = "InitStorageValue";
    const DESCRIPTION: &'static str = "Initializes the storage value with the specified value, unless already present or forced.";
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateStorageValue {
    /// Name of the storage value to update; it must be present.
    pub storage_name: String,
    /// Rhai expression computing the new value, with the current one bound as `X`.
    pub expression: String,
}

impl UpdateStorageValue {
    pub fn new(storage_name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            storage_name: storage_name.into(),
            expression: expression.into(),
        }
    }
}

impl Default for UpdateStorageValue {
    fn default() -> Self {
        Self::new("", "X + 1")
    }
}

impl Actor for UpdateStorageValue {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER
    }

    fn quick_info(&self) -> Option<String> {
        Some(format!(
            "storage_name: {}, expression: {}",
            self.storage_name, self.expression
        ))
    }

    fn setup(&mut self, _ctx: &SetupContext<'_>) -> FlowResult<()> {
        super::require_storage_name(&self.storage_name)?;
        super::require_expression(&self.expression)
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        ctx.update_storage(&self.storage_name, &self.expression)?;
        Ok(Outcome::one(token))
    }
}

impl ActorType for UpdateStorageValue {
    const TYPE: &'static str = "UpdateStorageValue";
    const DESCRIPTION: &'static str = "Applies an expression to a storage value and stores the result under the same name.";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DeleteStorageValue {
    /// Name of the storage value to remove.
    pub storage_name: String,
}

impl DeleteStorageValue {
    pub fn new(storage_name: impl Into<String>) -> Self {
        Self {
            storage_name: storage_name.into(),
        }
    }
}

impl Actor for DeleteStorageValue {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER
    }

    fn quick_info(&self) -> Option<String> {
        Some(format!("storage_name: {}", self.storage_name))
    }

    fn setup(&mut self, _ctx: &SetupContext<'_>) -> FlowResult<()> {
        super::require_storage_name(&self.storage_name)
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        ctx.storage_mut().remove(&self.storage_name);
        Ok(Outcome::one(token))
    }
}

impl ActorType for DeleteStorageValue {
    const TYPE: &'static str = "DeleteStorageValue";
    const DESCRIPTION: &'static str = "Removes the specified value from temporary storage.";
}

/// Computes a numeric result from the numeric payload, bound as `X`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct MathExpression {
    /// Rhai expression to evaluate, e.g. `X * 2 + 1`.
    pub expression: String,
}

impl MathExpression {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }
}

impl Default for MathExpression {
    fn default() -> Self {
        Self::new("X")
    }
}

impl Actor for MathExpression {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER
    }

    fn quick_info(&self) -> Option<String> {
        Some(format!("expression: {}", self.expression))
    }

    fn setup(&mut self, _ctx: &SetupContext<'_>) -> FlowResult<()> {
        super::require_expression(&self.expression)
    }

    fn check_input(&self, token: &Token) -> FlowResult<()> {
        if token.payload().is_number() {
            Ok(())
        } else {
            Err(FlowError::execution(format!(
                "expected a number, got {}",
                token.payload().type_label()
            )))
        }
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        let x = token.payload().as_value().cloned().unwrap_or(Value::Null);
        let result = ctx.evaluate(&self.expression, &[("X", &x)])?;
        Ok(Outcome::one(Token::new(result)))
    }
}

impl ActorType for MathExpression {
    const TYPE: &'static str = "MathExpression";
    const DESCRIPTION: &'static str = "Calculates a numeric value from an expression and the current integer/float input.";
}

/// Forwards a deep copy of the payload in a new token.
///
/// Opaque payloads cannot be copied and are passed on as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DeepCopy {}

impl DeepCopy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for DeepCopy {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER
    }

    fn execute(&mut self, input: Option<Token>, _ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        let mut copy = Token::new(token.payload().clone());
        for (key, value) in token.metadata() {
            copy = copy.with_metadata(key.clone(), value.clone());
        }
        Ok(Outcome::one(copy))
    }
}

impl ActorType for DeepCopy {
    const TYPE: &'static str = "Copy";
    const DESCRIPTION: &'static str = "Creates copies of the tokens' payloads.";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::source::{ForLoop, GetStorageValue, Start};
    use actorflow_core::Container;

    #[test]
    fn test_init_then_update() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, ForLoop::new(1, 4, 1)).unwrap();
        flow.add(root, InitStorageValue::new("total", 100)).unwrap();
        flow.add(root, UpdateStorageValue::new("total", "X + 1")).unwrap();
        flow.setup().unwrap();
        flow.execute().unwrap();
        assert_eq!(flow.storage().get("total"), Some(&Payload::from(104i64)));
    }

    #[test]
    fn test_forced_init_overwrites() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, Start::new()).unwrap();
        flow.add(root, InitStorageValue::new("x", 1).forced()).unwrap();
        flow.setup().unwrap();
        flow.storage_mut().set("x", 9i64);
        flow.execute().unwrap();
        assert_eq!(flow.storage().get("x"), Some(&Payload::from(1i64)));
    }

    #[test]
    fn test_update_of_absent_value_fails() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, Start::new()).unwrap();
        flow.add(root, UpdateStorageValue::new("count", "X * 2")).unwrap();
        flow.setup().unwrap();
        let err = flow.execute().unwrap_err();
        assert_eq!(err.path(), Some("Flow.UpdateStorageValue"));
        assert!(err.message().contains("'count' not present"));

        flow.setup().unwrap();
        flow.storage_mut().set("count", Container::model());
        let err = flow.execute().unwrap_err();
        assert!(err.message().contains("'count' is not a plain value"));
    }

    #[test]
    fn test_set_then_delete() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, ForLoop::new(5, 5, 1)).unwrap();
        flow.add(root, SetStorageValue::new("a")).unwrap();
        flow.add(root, SetStorageValue::new("b")).unwrap();
        flow.add(root, DeleteStorageValue::new("a")).unwrap();
        flow.setup().unwrap();
        flow.execute().unwrap();
        assert!(!flow.storage().contains("a"));
        assert_eq!(flow.storage().get("b"), Some(&Payload::from(5i64)));
    }

    #[test]
    fn test_math_expression() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, ForLoop::new(2, 2, 1)).unwrap();
        flow.add(root, MathExpression::new("X * X + 0.5")).unwrap();
        flow.add(root, SetStorageValue::new("result")).unwrap();
        flow.setup().unwrap();
        flow.execute().unwrap();
        assert_eq!(
            flow.storage().get("result").and_then(Payload::as_f64),
            Some(4.5)
        );
    }

    #[test]
    fn test_math_expression_rejects_non_numbers() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, Start::new()).unwrap();
        flow.add(root, MathExpression::default()).unwrap();
        flow.setup().unwrap();
        let err = flow.execute().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(err.message(), "expected a number, got null");
    }

    #[test]
    fn test_copy_detaches_payload() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, GetStorageValue::new("model")).unwrap();
        flow.add(root, SetStorageValue::new("same")).unwrap();
        flow.add(root, DeepCopy::new()).unwrap();
        flow.add(root, SetStorageValue::new("copied")).unwrap();
        flow.setup().unwrap();
        let container = Container::model().with("Model", "J48").unwrap();
        flow.storage_mut().set("model", container.clone());
        flow.execute().unwrap();

        let storage = flow.storage();
        let original = storage.get_shared("model").unwrap();
        let same = storage.get_shared("same").unwrap();
        let copied = storage.get_shared("copied").unwrap();
        assert!(std::sync::Arc::ptr_eq(&original, &same));
        assert!(!std::sync::Arc::ptr_eq(&original, &copied));
        assert_eq!(copied.as_container(), Some(&container));
    }
}
