pub mod actor;
pub mod console;
pub mod container;
pub mod context;
pub mod control;
pub mod error;
pub mod expression;
pub mod flow;
pub mod outcome;
pub mod registry;
pub mod schematic;
pub mod settings;
pub mod storage;
pub mod telemetry;
pub mod token;

pub use actor::{Actor, ActorType, Capability, CommonOptions, Configurable, LifecycleState};
pub use console::{ConsoleBuffer, NoViewer, Viewer};
pub use container::Container;
pub use context::{ChildInfo, ExecContext, SetupContext, require_input};
pub use control::{
    Branch, ContainerValuePicker, FailurePolicy, FlowActor, Sequence, Stop, Tee, Trigger,
};
pub use error::{ErrorKind, FlowError, FlowResult};
pub use expression::Evaluator;
pub use flow::{ActorId, Flow};
pub use outcome::Outcome;
pub use registry::{ActorInfo, Registry};
pub use schematic::ActorDef;
pub use settings::{EngineSettings, LoggingSettings, PlaceholderPolicy, Settings};
pub use storage::Storage;
pub use token::{Opaque, Payload, Token};

pub mod prelude {
    pub use crate::actor::{Actor, ActorType, Capability, Configurable, LifecycleState};
    pub use crate::context::{ExecContext, SetupContext, require_input};
    pub use crate::control::{
        Branch, ContainerValuePicker, FailurePolicy, Sequence, Stop, Tee, Trigger,
    };
    pub use crate::error::{ErrorKind, FlowError, FlowResult};
    pub use crate::flow::{ActorId, Flow};
    pub use crate::outcome::Outcome;
    pub use crate::token::{Payload, Token};
}
