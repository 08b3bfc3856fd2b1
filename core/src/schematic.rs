use crate::actor::{ActorType, CommonOptions};
use crate::error::{FlowError, FlowResult};
use crate::flow::{ActorId, Flow};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// The structural view of an actor tree.
///
/// `ActorDef` is what a flow is saved as and loaded from: type identifier,
/// name, full option map (including `annotation` and `skip`) and, for
/// control actors, the ordered sub-actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDef {
    #[serde(rename = "type")]
    pub actor_type: String,
    pub name: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actors: Option<Vec<ActorDef>>,
}

impl Flow {
    /// One line per actor, indented by depth.
    pub fn tree(&self) -> String {
        let mut lines = Vec::with_capacity(self.len());
        self.tree_lines(self.root(), &mut lines);
        lines.join("\n")
    }

    fn tree_lines(&self, id: ActorId, lines: &mut Vec<String>) {
        let depth = self.depth(id);
        let mut line = String::new();
        if depth > 0 {
            line.push_str(&"| ".repeat(depth - 1));
            line.push_str("|-");
        }
        line.push_str(self.actor_type(id));
        if self.name(id) != self.actor_type(id) {
            line.push_str(&format!(" '{}'", self.name(id)));
        }
        if let Some(info) = self.quick_info(id) {
            line.push_str(&format!(" [{info}]"));
        }
        if self.is_skipped(id) {
            line.push_str(" (skipped)");
        }
        lines.push(line);
        for child in self.children(id) {
            self.tree_lines(*child, lines);
        }
    }

    pub fn to_def(&self) -> FlowResult<ActorDef> {
        self.actor_def(self.root())
    }

    fn actor_def(&self, id: ActorId) -> FlowResult<ActorDef> {
        self.check_staged(id)?;
        let actors = if self.capability(id).routes {
            Some(
                self.children(id)
                    .iter()
                    .map(|child| self.actor_def(*child))
                    .collect::<FlowResult<Vec<_>>>()?,
            )
        } else {
            None
        };
        Ok(ActorDef {
            actor_type: self.actor_type(id).to_string(),
            name: self.name(id).to_string(),
            config: self.options(id)?,
            actors,
        })
    }

    /// Builds an independent flow from a definition.
    pub fn from_def(def: &ActorDef, registry: Arc<Registry>) -> FlowResult<Flow> {
        if def.actor_type != crate::control::FlowActor::TYPE {
            return Err(FlowError::definition(format!(
                "root actor must be a Flow, got '{}'",
                def.actor_type
            )));
        }
        let mut flow = Flow::new(def.name.clone()).with_registry(Arc::clone(&registry));
        let root = flow.root();
        apply_common(&mut flow, root, &def.config)?;
        for child in def.actors.iter().flatten() {
            add_def(&mut flow, root, child, &registry)?;
        }
        Ok(flow)
    }

    pub fn to_json(&self) -> FlowResult<String> {
        Ok(serde_json::to_string(&self.to_def()?)?)
    }

    pub fn to_json_pretty(&self) -> FlowResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_def()?)?)
    }

    pub fn from_json(json: &str, registry: Arc<Registry>) -> FlowResult<Flow> {
        let def: ActorDef = serde_json::from_str(json)?;
        Flow::from_def(&def, registry)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> FlowResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?).map_err(|e| {
            FlowError::execution(format!("failed to write flow to {}: {e}", path.display()))
        })
    }

    pub fn load(path: impl AsRef<Path>, registry: Arc<Registry>) -> FlowResult<Flow> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FlowError::definition(format!("failed to read flow from {}: {e}", path.display()))
        })?;
        Flow::from_json(&json, registry)
    }

    /// Structural copy through the JSON model. Storage, console and viewer
    /// are not shared; settings are carried over.
    pub fn try_clone(&self) -> FlowResult<Flow> {
        let def = self.to_def()?;
        Ok(Flow::from_def(&def, Arc::clone(self.registry()))?.with_settings(self.settings().clone()))
    }
}

fn add_def(flow: &mut Flow, parent: ActorId, def: &ActorDef, registry: &Registry) -> FlowResult<()> {
    let mut actor = registry.create(&def.actor_type)?;
    let options: Map<String, Value> = def
        .config
        .iter()
        .filter(|(key, _)| !CommonOptions::is_common(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    actor.reconfigure(options).map_err(|e| {
        FlowError::definition(format!("actor '{}': {}", def.name, e.message()))
    })?;
    let routes = actor.capability().routes;
    let id = flow.add_boxed(parent, &def.name, actor)?;
    apply_common(flow, id, &def.config)?;
    match (&def.actors, routes) {
        (Some(children), true) => {
            for child in children {
                add_def(flow, id, child, registry)?;
            }
        }
        (Some(children), false) if !children.is_empty() => {
            return Err(FlowError::definition(format!(
                "actor '{}' of type {} cannot hold sub-actors",
                def.name, def.actor_type
            )));
        }
        _ => {}
    }
    Ok(())
}

fn apply_common(flow: &mut Flow, id: ActorId, config: &Map<String, Value>) -> FlowResult<()> {
    let mut common = CommonOptions::default();
    for (key, value) in config.iter().filter(|(key, _)| CommonOptions::is_common(key)) {
        common
            .apply(key, value)
            .map_err(|e| FlowError::definition(e.message().to_string()))?;
    }
    flow.set_annotation(id, common.annotation);
    flow.set_skip(id, common.skip);
    Ok(())
}
