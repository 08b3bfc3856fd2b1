//! The flow: an arena-owned actor tree plus the storage, console and
//! settings shared by all of its actors.
//!
//! Nodes are addressed by [`ActorId`]. Each node keeps the index of its
//! parent and the ordered ids of its children, so the tree can be walked in
//! both directions without shared ownership.
//!
//! ```text
//! Flow
//! |-ForLoop [min: 1, max: 3, step: 1]
//! |-Sequence
//! | |-Console
//! ```

use crate::actor::{Actor, ActorType, Capability, CommonOptions, Configurable, LifecycleState};
use crate::console::{NoViewer, Viewer};
use crate::context::{ExecContext, SetupContext};
use crate::control::FlowActor;
use crate::error::{FlowError, FlowResult};
use crate::expression::Evaluator;
use crate::outcome::Outcome;
use crate::registry::Registry;
use crate::settings::Settings;
use crate::storage::Storage;
use crate::telemetry::actor_span;
use crate::token::Token;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Index of an actor inside its [`Flow`].
///
/// Ids are only meaningful for the flow that issued them; using one with
/// another flow panics or addresses an unrelated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(usize);

impl ActorId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct Node {
    name: String,
    parent: Option<ActorId>,
    children: Vec<ActorId>,
    common: CommonOptions,
    actor_type: &'static str,
    capability: Capability,
    /// Taken out while the actor runs.
    behavior: Option<Box<dyn Actor>>,
    /// Option overrides applied at the next setup.
    staged: Map<String, Value>,
    state: LifecycleState,
    output: VecDeque<Token>,
}

/// Result of one actor execution, as far as the director cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Produced,
    Exhausted,
    Stopped,
}

pub struct Flow {
    nodes: Vec<Node>,
    storage: Storage,
    console: Box<dyn Write + Send>,
    viewer: Box<dyn Viewer>,
    settings: Settings,
    registry: Arc<Registry>,
    evaluator: Evaluator,
    stopped: bool,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        let root_actor = FlowActor::default();
        let capability = root_actor.capability();
        let settings = Settings::default();
        let evaluator = Evaluator::new(settings.engine.max_expression_operations);
        Self {
            nodes: vec![Node {
                name: name.into(),
                parent: None,
                children: Vec::new(),
                common: CommonOptions::default(),
                actor_type: root_actor.actor_type(),
                capability,
                behavior: Some(Box::new(root_actor)),
                staged: Map::new(),
                state: LifecycleState::Created,
                output: VecDeque::new(),
            }],
            storage: Storage::new(),
            console: Box::new(std::io::stdout()),
            viewer: Box::new(NoViewer),
            settings,
            registry: Arc::new(Registry::with_control()),
            evaluator,
            stopped: false,
        }
    }

    // ---- configuration of the flow itself ----

    pub fn with_console<W: Write + Send + 'static>(mut self, console: W) -> Self {
        self.console = Box::new(console);
        self
    }

    pub fn with_viewer<V: Viewer + 'static>(mut self, viewer: V) -> Self {
        self.viewer = Box::new(viewer);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.evaluator = Evaluator::new(settings.engine.max_expression_operations);
        self.settings = settings;
        self
    }

    /// Registry used by [`Flow::try_clone`] and by JSON loading.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    pub(crate) fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub(crate) fn storage_with_evaluator(&mut self) -> (&mut Storage, &Evaluator) {
        (&mut self.storage, &self.evaluator)
    }

    pub(crate) fn console(&mut self) -> &mut (dyn Write + Send) {
        self.console.as_mut()
    }

    pub(crate) fn request_stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    // ---- building ----

    /// Adds `actor` as the last sub-actor of `parent`, named after its type.
    pub fn add<A: Actor>(&mut self, parent: ActorId, actor: A) -> FlowResult<ActorId> {
        let name = actor.actor_type().to_string();
        self.add_boxed(parent, &name, Box::new(actor))
    }

    pub fn add_named<A: Actor>(
        &mut self,
        parent: ActorId,
        name: &str,
        actor: A,
    ) -> FlowResult<ActorId> {
        self.add_boxed(parent, name, Box::new(actor))
    }

    pub fn add_boxed(
        &mut self,
        parent: ActorId,
        name: &str,
        actor: Box<dyn Actor>,
    ) -> FlowResult<ActorId> {
        if !self.node(parent).capability.routes {
            return Err(FlowError::definition(format!(
                "'{}' cannot hold sub-actors",
                self.full_name(parent)
            )));
        }
        if actor.actor_type() == FlowActor::TYPE {
            return Err(FlowError::definition("a Flow can only be the root actor"));
        }
        if name.is_empty() {
            return Err(FlowError::definition("actor names must not be empty"));
        }
        let name = self.unique_name(parent, name, None);
        let id = ActorId(self.nodes.len());
        self.nodes.push(Node {
            name,
            parent: Some(parent),
            children: Vec::new(),
            common: CommonOptions::default(),
            actor_type: actor.actor_type(),
            capability: actor.capability(),
            behavior: Some(actor),
            staged: Map::new(),
            state: LifecycleState::Created,
            output: VecDeque::new(),
        });
        self.node_mut(parent).children.push(id);
        Ok(id)
    }

    /// Renames an actor, keeping sibling names unique. Returns the name used.
    pub fn rename(&mut self, id: ActorId, name: &str) -> FlowResult<String> {
        if name.is_empty() {
            return Err(FlowError::definition("actor names must not be empty"));
        }
        let name = match self.node(id).parent {
            Some(parent) => self.unique_name(parent, name, Some(id)),
            None => name.to_string(),
        };
        self.node_mut(id).name = name.clone();
        Ok(name)
    }

    /// Sets an option. Invalid values are kept and reported by the next setup;
    /// a later valid value for the same key replaces them.
    pub fn set_option(&mut self, id: ActorId, key: &str, value: impl Into<Value>) {
        self.node_mut(id).staged.insert(key.to_string(), value.into());
        if let Err(e) = self.apply_staged(id) {
            debug!(actor = %self.full_name(id), error = %e, "option staged until setup");
        }
    }

    /// Fails with the configuration error of options still staged on an actor.
    pub(crate) fn check_staged(&self, id: ActorId) -> FlowResult<()> {
        let node = self.node(id);
        if node.staged.is_empty() {
            return Ok(());
        }
        let keys: Vec<&str> = node.staged.keys().map(String::as_str).collect();
        Err(FlowError::configuration(format!("invalid options: {}", keys.join(", ")))
            .at(self.full_name(id)))
    }

    pub fn set_skip(&mut self, id: ActorId, skip: bool) {
        self.node_mut(id).common.skip = skip;
    }

    pub fn set_annotation(&mut self, id: ActorId, annotation: Option<String>) {
        self.node_mut(id).common.annotation = annotation;
    }

    // ---- navigation ----

    pub fn root(&self) -> ActorId {
        ActorId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the root has no sub-actors at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn parent(&self, id: ActorId) -> Option<ActorId> {
        self.node(id).parent
    }

    pub fn children(&self, id: ActorId) -> &[ActorId] {
        &self.node(id).children
    }

    pub fn name(&self, id: ActorId) -> &str {
        &self.node(id).name
    }

    pub fn actor_type(&self, id: ActorId) -> &'static str {
        self.node(id).actor_type
    }

    pub fn capability(&self, id: ActorId) -> Capability {
        self.node(id).capability
    }

    pub fn state(&self, id: ActorId) -> LifecycleState {
        self.node(id).state
    }

    pub fn is_skipped(&self, id: ActorId) -> bool {
        self.node(id).common.skip
    }

    pub fn annotation(&self, id: ActorId) -> Option<&str> {
        self.node(id).common.annotation.as_deref()
    }

    /// Number of sub-actor levels between the root and `id`.
    pub fn depth(&self, id: ActorId) -> usize {
        let mut depth = 0;
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.node(parent).parent;
        }
        depth
    }

    /// Dotted path from the root; dots inside names are escaped.
    pub fn full_name(&self, id: ActorId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.node(cur);
            parts.push(node.name.replace('.', "\\."));
            current = node.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Looks an actor up by its full name.
    pub fn find(&self, path: &str) -> Option<ActorId> {
        (0..self.nodes.len())
            .map(ActorId)
            .find(|id| self.full_name(*id) == path)
    }

    /// Typed access to an actor's configuration.
    pub fn actor<T: Any>(&self, id: ActorId) -> Option<&T> {
        self.node(id)
            .behavior
            .as_ref()
            .and_then(|b| b.as_any().downcast_ref::<T>())
    }

    /// Typed options plus `annotation` and `skip`.
    pub fn options(&self, id: ActorId) -> FlowResult<Map<String, Value>> {
        let node = self.node(id);
        let mut options = self.behavior(id)?.options()?;
        for (key, value) in &node.staged {
            options.insert(key.clone(), value.clone());
        }
        node.common.write_into(&mut options);
        Ok(options)
    }

    pub fn quick_info(&self, id: ActorId) -> Option<String> {
        self.node(id).behavior.as_ref().and_then(|b| b.quick_info())
    }

    pub fn active_children(&self, id: ActorId) -> Vec<ActorId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .filter(|c| !self.node(*c).common.skip)
            .collect()
    }

    /// Number of tokens waiting in an actor's output queue.
    pub fn pending_output(&self, id: ActorId) -> usize {
        self.node(id).output.len()
    }

    // ---- lifecycle ----

    /// Prepares the whole tree for execution.
    ///
    /// A tree that is not in its initial state is cleaned up first. Storage
    /// starts empty. Fails fast with the first error, located at the failing
    /// actor.
    pub fn setup(&mut self) -> FlowResult<()> {
        let root = self.root();
        if !matches!(
            self.node(root).state,
            LifecycleState::Created | LifecycleState::CleanedUp
        ) {
            self.cleanup();
        }
        self.storage.clear();
        self.stopped = false;
        self.discard_pending();
        let result = self.setup_node(root);
        match &result {
            Ok(()) => debug!(flow = %self.name(root), "flow ready"),
            Err(e) => error!(flow = %self.name(root), error = %e, "flow setup failed"),
        }
        result
    }

    /// Runs the tree once: the root's first sub-actor is driven until it is
    /// exhausted or the flow is stopped.
    pub fn execute(&mut self) -> FlowResult<()> {
        let root = self.root();
        self.stopped = false;
        self.discard_pending();
        let result = self.execute_node(root, None);
        if self.stopped {
            self.discard_pending();
        }
        match &result {
            Ok(_) if self.stopped => info!(flow = %self.name(root), "flow stopped"),
            Ok(_) => debug!(flow = %self.name(root), "flow finished"),
            Err(e) => error!(flow = %self.name(root), error = %e, "flow execution failed"),
        }
        result.map(|_| ())
    }

    /// Flushes resources. Idempotent, and safe after a failure.
    pub fn wrapup(&mut self) -> FlowResult<()> {
        let mut first_error = None;
        for id in self.post_order() {
            let state = self.node(id).state;
            if !matches!(
                state,
                LifecycleState::Ready | LifecycleState::Running | LifecycleState::Failed
            ) {
                continue;
            }
            let Some(behavior) = self.node_mut(id).behavior.as_mut() else {
                continue;
            };
            match behavior.wrapup() {
                Ok(()) => {
                    if state != LifecycleState::Failed {
                        self.node_mut(id).state = LifecycleState::WrappedUp;
                    }
                }
                Err(e) => {
                    let e = e.at(self.full_name(id));
                    warn!(error = %e, "wrapup failed");
                    self.node_mut(id).state = LifecycleState::Failed;
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Releases resources, empties queues and storage. Idempotent; the tree
    /// itself is kept and can be set up again.
    pub fn cleanup(&mut self) {
        for id in self.post_order() {
            let node = self.node_mut(id);
            node.output.clear();
            if matches!(
                node.state,
                LifecycleState::Created | LifecycleState::CleanedUp
            ) {
                continue;
            }
            if let Some(behavior) = node.behavior.as_mut() {
                behavior.cleanup();
            }
            node.state = LifecycleState::CleanedUp;
        }
        self.storage.clear();
        self.stopped = false;
        debug!(flow = %self.name(self.root()), "flow cleaned up");
    }

    /// `setup`, `execute`, `wrapup` and `cleanup`, returning the first error.
    /// Wrapup and cleanup always run.
    pub fn run(&mut self) -> FlowResult<()> {
        let result = self.setup().and_then(|_| self.execute());
        let wrapped = self.wrapup();
        self.cleanup();
        result.and(wrapped)
    }

    // ---- internals ----

    fn node(&self, id: ActorId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: ActorId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn behavior(&self, id: ActorId) -> FlowResult<&dyn Actor> {
        self.node(id)
            .behavior
            .as_deref()
            .ok_or_else(|| FlowError::lifecycle("actor is busy").at(self.full_name(id)))
    }

    fn take_behavior(&mut self, id: ActorId) -> FlowResult<Box<dyn Actor>> {
        match self.node_mut(id).behavior.take() {
            Some(behavior) => Ok(behavior),
            None => Err(FlowError::lifecycle("actor is busy").at(self.full_name(id))),
        }
    }

    /// Children before parents, skipping skipped subtrees.
    fn post_order(&self) -> Vec<ActorId> {
        fn visit(flow: &Flow, id: ActorId, out: &mut Vec<ActorId>) {
            for child in flow.active_children(id) {
                visit(flow, child, out);
            }
            out.push(id);
        }
        let mut out = Vec::with_capacity(self.nodes.len());
        visit(self, self.root(), &mut out);
        out
    }

    fn unique_name(&self, parent: ActorId, name: &str, except: Option<ActorId>) -> String {
        let taken = |candidate: &str| {
            self.node(parent)
                .children
                .iter()
                .any(|c| Some(*c) != except && self.node(*c).name == candidate)
        };
        if !taken(name) {
            return name.to_string();
        }
        let base = match name.rsplit_once('-') {
            Some((base, suffix))
                if !base.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) =>
            {
                base
            }
            _ => name,
        };
        (1..)
            .map(|i| format!("{base}-{i}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    fn apply_staged(&mut self, id: ActorId) -> FlowResult<()> {
        let node = self.node_mut(id);
        if node.staged.is_empty() {
            return Ok(());
        }
        let mut common = node.common.clone();
        let mut typed = Map::new();
        for (key, value) in &node.staged {
            if CommonOptions::is_common(key) {
                common.apply(key, value)?;
            } else {
                typed.insert(key.clone(), value.clone());
            }
        }
        if !typed.is_empty() {
            let behavior = node
                .behavior
                .as_mut()
                .ok_or_else(|| FlowError::lifecycle("actor is busy"))?;
            let mut options = behavior.options()?;
            options.extend(typed);
            behavior.reconfigure(options)?;
            node.capability = behavior.capability();
        }
        node.common = common;
        node.staged.clear();
        Ok(())
    }

    fn setup_node(&mut self, id: ActorId) -> FlowResult<()> {
        let path = self.full_name(id);
        let span = actor_span(&path, self.node(id).actor_type);
        let _enter = span.enter();

        if let Err(e) = self.apply_staged(id) {
            self.node_mut(id).state = LifecycleState::Failed;
            return Err(e.at(path));
        }
        self.node_mut(id).state = LifecycleState::Configured;

        let mut behavior = self.take_behavior(id)?;
        let result = behavior.setup(&SetupContext { flow: self, id });
        self.node_mut(id).behavior = Some(behavior);
        if let Err(e) = result {
            self.fail(id);
            return Err(e.at(path));
        }

        for child in self.active_children(id) {
            if let Err(e) = self.setup_node(child) {
                self.node_mut(id).state = LifecycleState::Failed;
                return Err(e.at(path));
            }
        }
        self.node_mut(id).state = LifecycleState::Ready;
        debug!("actor ready");
        Ok(())
    }

    fn execute_node(&mut self, id: ActorId, input: Option<Token>) -> FlowResult<Step> {
        let path = self.full_name(id);
        let span = actor_span(&path, self.node(id).actor_type);
        let _enter = span.enter();

        let state = self.node(id).state;
        if !state.can_execute() {
            return Err(
                FlowError::lifecycle(format!("cannot execute an actor that is {state}")).at(path),
            );
        }

        let mut behavior = self.take_behavior(id)?;
        let checked = match &input {
            Some(token) => behavior.check_input(token),
            None => Ok(()),
        };
        let result =
            checked.and_then(|_| behavior.execute(input, &mut ExecContext { flow: self, id }));
        let waits = result.is_ok() && behavior.waits();
        self.node_mut(id).behavior = Some(behavior);

        let step = match result {
            Ok(Outcome::Next(tokens)) if self.stopped => {
                debug!(dropped = tokens.len(), "output halted by stop");
                Step::Stopped
            }
            Ok(Outcome::Next(tokens)) => {
                debug!(produced = tokens.len(), "actor executed");
                self.node_mut(id).output.extend(tokens);
                Step::Produced
            }
            Ok(Outcome::Exhausted) => {
                debug!("source exhausted");
                Step::Exhausted
            }
            Ok(Outcome::Stop) => {
                info!("stop requested");
                self.stopped = true;
                Step::Stopped
            }
            Err(e) => {
                self.fail(id);
                return Err(e.at(path));
            }
        };
        self.node_mut(id).state = LifecycleState::Running;
        if waits {
            self.viewer.wait_for_dismissal(&path);
        }
        Ok(step)
    }

    /// Drops every queued token.
    fn discard_pending(&mut self) {
        for node in &mut self.nodes {
            node.output.clear();
        }
    }

    /// Marks an actor failed: queued output is discarded and its resources released.
    fn fail(&mut self, id: ActorId) {
        let node = self.node_mut(id);
        node.state = LifecycleState::Failed;
        node.output.clear();
        if let Some(behavior) = node.behavior.as_mut() {
            behavior.cleanup();
        }
    }

    /// Drives the active sub-actors of `owner` as a chain.
    ///
    /// A source in first position is called until it is exhausted or
    /// produces nothing; otherwise `input` is pushed into the first actor.
    /// Every token is pushed depth-first through the following actors.
    /// With `collect`, the tokens leaving the last actor are returned.
    pub(crate) fn run_sequential(
        &mut self,
        owner: ActorId,
        input: Option<Token>,
        collect: bool,
    ) -> FlowResult<Vec<Token>> {
        let chain = self.active_children(owner);
        let mut collected = Vec::new();
        let Some(&first) = chain.first() else {
            if collect {
                collected.extend(input);
            }
            return Ok(collected);
        };

        if self.node(first).capability.consumes {
            let token = input.ok_or_else(|| {
                FlowError::execution(format!(
                    "'{}' expects input but none was given",
                    self.full_name(first)
                ))
            })?;
            self.push(&chain, 0, token, collect, &mut collected)?;
            return Ok(collected);
        }

        while !self.stopped {
            match self.execute_node(first, None)? {
                Step::Stopped | Step::Exhausted => break,
                Step::Produced => {
                    if self.node(first).output.is_empty() {
                        break;
                    }
                    self.drain(&chain, 0, collect, &mut collected)?;
                }
            }
        }
        Ok(collected)
    }

    fn push(
        &mut self,
        chain: &[ActorId],
        index: usize,
        token: Token,
        collect: bool,
        collected: &mut Vec<Token>,
    ) -> FlowResult<()> {
        match self.execute_node(chain[index], Some(token))? {
            Step::Stopped => Ok(()),
            Step::Produced | Step::Exhausted => self.drain(chain, index, collect, collected),
        }
    }

    fn drain(
        &mut self,
        chain: &[ActorId],
        index: usize,
        collect: bool,
        collected: &mut Vec<Token>,
    ) -> FlowResult<()> {
        while !self.stopped {
            let Some(token) = self.node_mut(chain[index]).output.pop_front() else {
                break;
            };
            if index + 1 < chain.len() {
                self.push(chain, index + 1, token, collect, collected)?;
            } else if collect {
                collected.push(token);
            }
        }
        Ok(())
    }

    /// Hands `token` to every active sub-actor of `owner`, reporting the
    /// first failure. Outputs of the sub-actors are discarded.
    pub(crate) fn fan_out(
        &mut self,
        owner: ActorId,
        token: &Token,
        abort_on_failure: bool,
    ) -> FlowResult<()> {
        let mut first_error = None;
        for child in self.active_children(owner) {
            if self.stopped {
                break;
            }
            let result = self.execute_node(child, Some(token.clone()));
            self.node_mut(child).output.clear();
            if let Err(e) = result {
                first_error.get_or_insert(e);
                if abort_on_failure {
                    break;
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name(self.root()))
            .field("actors", &self.nodes.len())
            .field("state", &self.state(self.root()))
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}
