//! Control actors: actors that own sub-actors and route tokens through them.

use crate::actor::{Actor, ActorType, Capability};
use crate::context::{ExecContext, SetupContext, require_input};
use crate::error::{FlowError, FlowResult};
use crate::outcome::Outcome;
use crate::token::{Payload, Token};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Root of every flow. Its first active sub-actor must be a source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct FlowActor {}

impl Actor for FlowActor {
    fn capability(&self) -> Capability {
        Capability::STANDALONE.routing()
    }

    fn setup(&mut self, ctx: &SetupContext<'_>) -> FlowResult<()> {
        ctx.require_source_first()?;
        ctx.check_sequential(true)
    }

    fn execute(&mut self, _input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        ctx.run_children(None)?;
        Ok(Outcome::none())
    }
}

impl ActorType for FlowActor {
    const TYPE: &'static str = "Flow";
    const DESCRIPTION: &'static str = "Root actor: owns the storage and drives its sub-actors in sequence, starting with a source.";
}

/// Chains its sub-actors; emits whatever the last one emits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Sequence {}

impl Actor for Sequence {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER.routing()
    }

    fn setup(&mut self, ctx: &SetupContext<'_>) -> FlowResult<()> {
        ctx.check_sequential(false)
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        Ok(Outcome::Next(ctx.collect_children(input)?))
    }
}

impl ActorType for Sequence {
    const TYPE: &'static str = "Sequence";
    const DESCRIPTION: &'static str = "Executes its sub-actors one after the other, the output of one being the input of the next.";
}

/// What a [`Branch`] does once a branch has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Report the failure without running the remaining branches.
    #[default]
    Abort,
    /// Run the remaining branches, then report the first failure.
    Continue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Branch {
    /// Whether the remaining branches still run after one fails.
    pub on_failure: FailurePolicy,
}

impl Actor for Branch {
    fn capability(&self) -> Capability {
        Capability::SINK.routing()
    }

    fn quick_info(&self) -> Option<String> {
        match self.on_failure {
            FailurePolicy::Abort => None,
            FailurePolicy::Continue => Some("on_failure: continue".to_string()),
        }
    }

    fn setup(&mut self, ctx: &SetupContext<'_>) -> FlowResult<()> {
        ctx.require_consumers()
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        ctx.fan_out(&token, self.on_failure == FailurePolicy::Abort)?;
        Ok(Outcome::none())
    }
}

impl ActorType for Branch {
    const TYPE: &'static str = "Branch";
    const DESCRIPTION: &'static str = "Hands the same token to each of its sub-actors.";
}

/// Runs its sub-actors on the incoming token, then forwards the token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Tee {
    /// Rhai expression deciding whether the sub-actors run; the token's
    /// payload is bound as `payload`. Empty means always.
    pub condition: String,
}

impl Actor for Tee {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER.routing()
    }

    fn quick_info(&self) -> Option<String> {
        condition_info(&self.condition)
    }

    fn setup(&mut self, ctx: &SetupContext<'_>) -> FlowResult<()> {
        ctx.require_children()?;
        ctx.check_sequential(false)
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        if ctx.condition(&self.condition, Some(token.payload()))? {
            ctx.run_children(Some(token.clone()))?;
        }
        Ok(Outcome::one(token))
    }
}

impl ActorType for Tee {
    const TYPE: &'static str = "Tee";
    const DESCRIPTION: &'static str = "Tees off the incoming token into its sub-actors and forwards it unchanged.";
}

/// Runs its sub-actors, starting with a source, whenever a token passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Trigger {
    /// Rhai expression deciding whether the sub-actors run; the token's
    /// payload is bound as `payload`. Empty means always.
    pub condition: String,
}

impl Actor for Trigger {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER.routing()
    }

    fn quick_info(&self) -> Option<String> {
        condition_info(&self.condition)
    }

    fn setup(&mut self, ctx: &SetupContext<'_>) -> FlowResult<()> {
        ctx.require_source_first()?;
        ctx.check_sequential(true)
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        if ctx.condition(&self.condition, Some(token.payload()))? {
            ctx.run_children(None)?;
        }
        Ok(Outcome::one(token))
    }
}

impl ActorType for Trigger {
    const TYPE: &'static str = "Trigger";
    const DESCRIPTION: &'static str = "Executes its sub-flow (which starts with a source) for each passing token, then forwards the token.";
}

fn condition_info(condition: &str) -> Option<String> {
    let condition = condition.trim();
    (!condition.is_empty()).then(|| format!("condition: {condition}"))
}

/// Ends the whole flow when a token reaches it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Stop {}

impl Actor for Stop {
    fn capability(&self) -> Capability {
        Capability::SINK
    }

    fn execute(&mut self, _input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        ctx.stop();
        Ok(Outcome::Stop)
    }
}

impl ActorType for Stop {
    const TYPE: &'static str = "Stop";
    const DESCRIPTION: &'static str = "Stops the execution of the flow.";
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerValuePicker {
    /// Name of the container field to pick.
    pub value: String,
    /// Forward the container and hand the picked value to the sub-actors
    /// instead of the other way around.
    pub switch: bool,
}

impl Default for ContainerValuePicker {
    fn default() -> Self {
        Self {
            value: "Model".to_string(),
            switch: false,
        }
    }
}

impl Actor for ContainerValuePicker {
    fn capability(&self) -> Capability {
        Capability::TRANSFORMER.routing()
    }

    fn quick_info(&self) -> Option<String> {
        Some(format!("value: {}, switch: {}", self.value, self.switch))
    }

    fn setup(&mut self, ctx: &SetupContext<'_>) -> FlowResult<()> {
        if self.value.trim().is_empty() {
            return Err(FlowError::configuration("no container field to pick"));
        }
        ctx.check_sequential(false)
    }

    fn check_input(&self, token: &Token) -> FlowResult<()> {
        match token.payload() {
            Payload::Container(_) => Ok(()),
            other => Err(FlowError::execution(format!(
                "expected a container, got {}",
                other.type_label()
            ))),
        }
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        let field = ctx.expand(&self.value)?;
        let container = token
            .payload()
            .as_container()
            .ok_or_else(|| FlowError::execution("expected a container"))?;
        if !container.allows(&field) {
            return Err(FlowError::execution(format!(
                "'{field}' is not a field of {} (allowed: {})",
                container.kind(),
                container.allowed().join(", ")
            )));
        }
        let picked = Token::new(container.get(&field).cloned().unwrap_or_else(Payload::null));
        let (forward, tee) = if self.switch {
            (token, picked)
        } else {
            (picked, token)
        };
        if ctx.has_active_children() {
            ctx.run_children(Some(tee))?;
        }
        Ok(Outcome::one(forward))
    }
}

impl ActorType for ContainerValuePicker {
    const TYPE: &'static str = "ContainerValuePicker";
    const DESCRIPTION: &'static str = "Picks a named value from the incoming container and forwards it; the container is teed off into the sub-actors.";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::flow::Flow;
    use serde_json::json;

    /// Emits the tokens stored under `input`, one per call.
    #[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
    #[serde(default, deny_unknown_fields)]
    struct Replay {
        #[serde(skip)]
        done: bool,
    }

    impl Actor for Replay {
        fn capability(&self) -> Capability {
            Capability::SOURCE
        }

        fn execute(&mut self, _input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
            if self.done {
                self.done = false;
                return Ok(Outcome::Exhausted);
            }
            self.done = true;
            let payload = ctx
                .storage()
                .get_shared("input")
                .ok_or_else(|| FlowError::execution("no input"))?;
            Ok(Outcome::one(Token::from_shared(payload)))
        }

        fn cleanup(&mut self) {
            self.done = false;
        }
    }

    impl ActorType for Replay {
        const TYPE: &'static str = "Replay";
        const DESCRIPTION: &'static str = "Replays the stored input.";
    }

    /// Appends the payload's text to the storage value `log`.
    #[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
    #[serde(default, deny_unknown_fields)]
    struct Log {
        fail: bool,
    }

    impl Actor for Log {
        fn capability(&self) -> Capability {
            Capability::SINK
        }

        fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
            if self.fail {
                return Err(FlowError::execution("log failed"));
            }
            let token = require_input(input)?;
            let line = format!("{};", token.payload());
            let log = ctx.storage().get("log").map(|p| p.to_string()).unwrap_or_default();
            ctx.storage_mut().set("log", log + line.as_str());
            Ok(Outcome::none())
        }
    }

    impl ActorType for Log {
        const TYPE: &'static str = "Log";
        const DESCRIPTION: &'static str = "Logs into storage.";
    }

    fn run_with_input(flow: &mut Flow, input: Payload) -> FlowResult<String> {
        flow.setup()?;
        flow.storage_mut().set("input", input);
        flow.execute()?;
        Ok(flow.storage().get("log").map(|p| p.to_string()).unwrap_or_default())
    }

    #[test]
    fn test_tee_forwards_input_and_respects_condition() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, Replay::default()).unwrap();
        let tee = flow.add(root, Tee::default()).unwrap();
        flow.add(tee, Log::default()).unwrap();
        flow.add(root, Log::default()).unwrap();

        assert_eq!(run_with_input(&mut flow, 7i64.into()).unwrap(), "7;7;");

        flow.set_option(tee, "condition", "payload > 10");
        assert_eq!(flow.quick_info(tee).as_deref(), Some("condition: payload > 10"));
        assert_eq!(run_with_input(&mut flow, 7i64.into()).unwrap(), "7;");
    }

    #[test]
    fn test_trigger_runs_sub_flow_without_input() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, Replay::default()).unwrap();
        let trigger = flow.add(root, Trigger::default()).unwrap();
        flow.add(trigger, Replay::default()).unwrap();
        flow.add(trigger, Log::default()).unwrap();
        flow.add(root, Log::default()).unwrap();
        assert_eq!(run_with_input(&mut flow, "x".into()).unwrap(), "x;x;");
    }

    #[test]
    fn test_trigger_requires_source() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, Replay::default()).unwrap();
        let trigger = flow.add(root, Trigger::default()).unwrap();
        flow.add(trigger, Log::default()).unwrap();
        let err = flow.setup().unwrap_err();
        assert_eq!(err.path(), Some("Flow.Trigger"));
        assert!(err.message().contains("is not a source"));
    }

    #[test]
    fn test_branch_failure_policies() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, Replay::default()).unwrap();
        let branch = flow.add(root, Branch::default()).unwrap();
        flow.add_named(branch, "first", Log { fail: true }).unwrap();
        flow.add_named(branch, "second", Log::default()).unwrap();

        let err = run_with_input(&mut flow, "t".into()).unwrap_err();
        assert_eq!(err.path(), Some("Flow.Branch.first"));
        assert!(flow.storage().get("log").is_none());
        assert_eq!(flow.quick_info(branch), None);

        flow.set_option(branch, "on_failure", "continue");
        assert_eq!(flow.quick_info(branch).as_deref(), Some("on_failure: continue"));
        let err = run_with_input(&mut flow, "t".into()).unwrap_err();
        assert_eq!(err.path(), Some("Flow.Branch.first"));
        assert_eq!(flow.storage().get("log").map(|p| p.to_string()).as_deref(), Some("t;"));
    }

    #[test]
    fn test_sequence_outputs_last_child() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, Replay::default()).unwrap();
        let outer = flow.add(root, Sequence::default()).unwrap();
        let inner = flow.add(outer, Sequence::default()).unwrap();
        flow.add(inner, Tee::default()).and_then(|tee| flow.add(tee, Log::default())).unwrap();
        flow.add(root, Log::default()).unwrap();
        assert_eq!(run_with_input(&mut flow, "s".into()).unwrap(), "s;s;");
    }

    #[test]
    fn test_container_value_picker() {
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, Replay::default()).unwrap();
        let picker = flow.add(root, ContainerValuePicker::default()).unwrap();
        flow.add(picker, Log::default()).unwrap();
        flow.add(root, Log::default()).unwrap();

        let container = Container::model().with("Model", "J48").unwrap();
        let log = run_with_input(&mut flow, container.clone().into()).unwrap();
        assert_eq!(log, "ModelContainer{Model: J48};J48;");

        flow.set_option(picker, "switch", true);
        flow.set_option(picker, "value", "Header");
        assert_eq!(
            flow.quick_info(picker).as_deref(),
            Some("value: Header, switch: true")
        );
        let log = run_with_input(&mut flow, container.clone().into()).unwrap();
        assert_eq!(log, "null;ModelContainer{Model: J48};");

        flow.set_option(picker, "value", "Accuracy");
        let err = run_with_input(&mut flow, container.into()).unwrap_err();
        assert!(err.message().contains("not a field of ModelContainer"));

        flow.set_option(picker, "value", "Model");
        let err = run_with_input(&mut flow, json!({"Model": 1}).into()).unwrap_err();
        assert_eq!(err.path(), Some("Flow.ContainerValuePicker"));
        assert!(err.message().contains("expected a container"));
    }
}
