use thiserror::Error;

pub type FlowResult<T> = Result<T, FlowError>;

/// Coarse classification of a [`FlowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Precondition,
    Execution,
    Lifecycle,
    Definition,
}

/// Failure reported by an actor or by the flow driving it.
///
/// Actors create errors without a location; the flow annotates them with the
/// dotted path of the failing actor on the way up. The innermost path wins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("{}configuration error: {message}", located(.path))]
    Configuration {
        path: Option<String>,
        message: String,
    },
    #[error("{}precondition failed: {message}", located(.path))]
    Precondition {
        path: Option<String>,
        message: String,
    },
    #[error("{}execution failed: {message}", located(.path))]
    Execution {
        path: Option<String>,
        message: String,
    },
    #[error("{}invalid lifecycle transition: {message}", located(.path))]
    Lifecycle {
        path: Option<String>,
        message: String,
    },
    #[error("invalid flow definition: {0}")]
    Definition(String),
}

fn located(path: &Option<String>) -> String {
    match path {
        Some(path) => format!("{path}: "),
        None => String::new(),
    }
}

impl FlowError {
    pub fn configuration(message: impl Into<String>) -> Self {
        FlowError::Configuration {
            path: None,
            message: message.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        FlowError::Precondition {
            path: None,
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        FlowError::Execution {
            path: None,
            message: message.into(),
        }
    }

    pub fn lifecycle(message: impl Into<String>) -> Self {
        FlowError::Lifecycle {
            path: None,
            message: message.into(),
        }
    }

    pub fn definition(message: impl Into<String>) -> Self {
        FlowError::Definition(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Configuration { .. } => ErrorKind::Configuration,
            FlowError::Precondition { .. } => ErrorKind::Precondition,
            FlowError::Execution { .. } => ErrorKind::Execution,
            FlowError::Lifecycle { .. } => ErrorKind::Lifecycle,
            FlowError::Definition(_) => ErrorKind::Definition,
        }
    }

    /// Dotted path of the actor that failed, if known.
    pub fn path(&self) -> Option<&str> {
        match self {
            FlowError::Configuration { path, .. }
            | FlowError::Precondition { path, .. }
            | FlowError::Execution { path, .. }
            | FlowError::Lifecycle { path, .. } => path.as_deref(),
            FlowError::Definition(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FlowError::Configuration { message, .. }
            | FlowError::Precondition { message, .. }
            | FlowError::Execution { message, .. }
            | FlowError::Lifecycle { message, .. } => message,
            FlowError::Definition(message) => message,
        }
    }

    /// Attaches the actor path unless an inner actor already claimed the error.
    pub fn at(mut self, actor_path: impl Into<String>) -> Self {
        match &mut self {
            FlowError::Configuration { path, .. }
            | FlowError::Precondition { path, .. }
            | FlowError::Execution { path, .. }
            | FlowError::Lifecycle { path, .. } => {
                if path.is_none() {
                    *path = Some(actor_path.into());
                }
            }
            FlowError::Definition(_) => {}
        }
        self
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Definition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_innermost_path_wins() {
        let err = FlowError::execution("boom")
            .at("Flow.Sequence.Console")
            .at("Flow.Sequence");
        assert_eq!(err.path(), Some("Flow.Sequence.Console"));
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(
            err.to_string(),
            "Flow.Sequence.Console: execution failed: boom"
        );
    }

    #[test]
    fn test_unlocated_message() {
        let err = FlowError::configuration("step must not be 0");
        assert_eq!(err.to_string(), "configuration error: step must not be 0");
        assert_eq!(err.message(), "step must not be 0");
    }
}
