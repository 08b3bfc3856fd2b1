//! Standard actors, grouped by capability.

use actorflow_core::{FlowError, FlowResult};

pub mod sink;
pub mod source;
pub mod transformer;

pub(crate) fn require_storage_name(name: &str) -> FlowResult<()> {
    if name.trim().is_empty() {
        return Err(FlowError::configuration("no storage name"));
    }
    Ok(())
}

pub(crate) fn require_expression(expression: &str) -> FlowResult<()> {
    if expression.trim().is_empty() {
        return Err(FlowError::configuration("no expression"));
    }
    Ok(())
}
