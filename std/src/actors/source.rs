use actorflow_core::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Emits a single `null` token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Start {
    #[serde(skip)]
    done: bool,
}

impl Start {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for Start {
    fn capability(&self) -> Capability {
        Capability::SOURCE
    }

    fn execute(&mut self, _input: Option<Token>, _ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        if self.done {
            self.done = false;
            return Ok(Outcome::Exhausted);
        }
        self.done = true;
        Ok(Outcome::one(Token::new(Payload::null())))
    }

    fn cleanup(&mut self) {
        self.done = false;
    }
}

impl ActorType for Start {
    const TYPE: &'static str = "Start";
    const DESCRIPTION: &'static str = "Outputs a single null token to start off a flow.";
}

/// Counts from `min` towards `max` (inclusive) in increments of `step`.
///
/// A negative step counts down, so `min` is then expected to be the larger
/// bound.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ForLoop {
    /// First value of the loop.
    pub min: i64,
    /// Last value of the loop (inclusive).
    pub max: i64,
    /// Increment between two values; must not be 0.
    pub step: i64,
    #[serde(skip)]
    current: Option<i64>,
}

impl ForLoop {
    pub fn new(min: i64, max: i64, step: i64) -> Self {
        Self {
            min,
            max,
            step,
            current: None,
        }
    }

    fn next_value(&self) -> Option<i64> {
        let next = match self.current {
            None => self.min,
            Some(current) => current.checked_add(self.step)?,
        };
        let within = if self.step > 0 {
            next <= self.max
        } else {
            next >= self.max
        };
        within.then_some(next)
    }
}

impl Default for ForLoop {
    fn default() -> Self {
        Self::new(1, 10, 1)
    }
}

impl Actor for ForLoop {
    fn capability(&self) -> Capability {
        Capability::SOURCE
    }

    fn quick_info(&self) -> Option<String> {
        Some(format!("min: {}, max: {}, step: {}", self.min, self.max, self.step))
    }

    fn setup(&mut self, _ctx: &SetupContext<'_>) -> FlowResult<()> {
        if self.step == 0 {
            return Err(FlowError::configuration("step must not be 0"));
        }
        self.current = None;
        Ok(())
    }

    fn execute(&mut self, _input: Option<Token>, _ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        match self.next_value() {
            Some(value) => {
                self.current = Some(value);
                Ok(Outcome::one(Token::new(value)))
            }
            None => {
                self.current = None;
                Ok(Outcome::Exhausted)
            }
        }
    }

    fn cleanup(&mut self) {
        self.current = None;
    }
}

impl ActorType for ForLoop {
    const TYPE: &'static str = "ForLoop";
    const DESCRIPTION: &'static str = "Outputs integers from min to max using the specified step size.";
}

/// Emits one token per configured string; placeholders are expanded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct StringConstants {
    /// The strings to output, in order.
    pub strings: Vec<String>,
    #[serde(skip)]
    index: usize,
}

impl StringConstants {
    pub fn new<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strings: strings.into_iter().map(Into::into).collect(),
            index: 0,
        }
    }
}

impl Actor for StringConstants {
    fn capability(&self) -> Capability {
        Capability::SOURCE
    }

    fn quick_info(&self) -> Option<String> {
        Some(format!("strings: {}", self.strings.len()))
    }

    fn execute(&mut self, _input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        emit_next(&self.strings, &mut self.index, ctx)
    }

    fn cleanup(&mut self) {
        self.index = 0;
    }
}

impl ActorType for StringConstants {
    const TYPE: &'static str = "StringConstants";
    const DESCRIPTION: &'static str = "Outputs the specified strings, one token per string.";
}

/// Emits one token per configured file path; placeholders are expanded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct FileSupplier {
    /// The file paths to output, in order.
    pub files: Vec<String>,
    #[serde(skip)]
    index: usize,
}

impl FileSupplier {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            index: 0,
        }
    }
}

impl Actor for FileSupplier {
    fn capability(&self) -> Capability {
        Capability::SOURCE
    }

    fn quick_info(&self) -> Option<String> {
        Some(format!("files: {}", self.files.len()))
    }

    fn execute(&mut self, _input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        emit_next(&self.files, &mut self.index, ctx)
    }

    fn cleanup(&mut self) {
        self.index = 0;
    }
}

impl ActorType for FileSupplier {
    const TYPE: &'static str = "FileSupplier";
    const DESCRIPTION: &'static str = "Outputs the specified file names, one token per file.";
}

/// Emits `items[index]` and advances, or rewinds and reports exhaustion.
fn emit_next(items: &[String], index: &mut usize, ctx: &ExecContext<'_>) -> FlowResult<Outcome> {
    match items.get(*index) {
        Some(item) => {
            *index += 1;
            Ok(Outcome::one(Token::new(ctx.expand(item)?)))
        }
        None => {
            *index = 0;
            Ok(Outcome::Exhausted)
        }
    }
}

/// Emits the value stored under `storage_name`, sharing it with storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct GetStorageValue {
    /// Name of the storage value to output.
    pub storage_name: String,
    #[serde(skip)]
    done: bool,
}

impl GetStorageValue {
    pub fn new(storage_name: impl Into<String>) -> Self {
        Self {
            storage_name: storage_name.into(),
            done: false,
        }
    }
}

impl Actor for GetStorageValue {
    fn capability(&self) -> Capability {
        Capability::SOURCE
    }

    fn quick_info(&self) -> Option<String> {
        Some(format!("storage_name: {}", self.storage_name))
    }

    fn setup(&mut self, _ctx: &SetupContext<'_>) -> FlowResult<()> {
        super::require_storage_name(&self.storage_name)
    }

    fn execute(&mut self, _input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        if self.done {
            self.done = false;
            return Ok(Outcome::Exhausted);
        }
        let payload = ctx.storage().get_shared(&self.storage_name).ok_or_else(|| {
            FlowError::execution(format!("storage value '{}' not present", self.storage_name))
        })?;
        self.done = true;
        Ok(Outcome::one(Token::from_shared(payload)))
    }

    fn cleanup(&mut self) {
        self.done = false;
    }
}

impl ActorType for GetStorageValue {
    const TYPE: &'static str = "GetStorageValue";
    const DESCRIPTION: &'static str = "Outputs the value associated with the specified name from temporary storage.";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::sink::Console;
    use actorflow_core::ConsoleBuffer;

    fn printed(source: impl Actor) -> FlowResult<Vec<String>> {
        let buffer = ConsoleBuffer::new();
        let mut flow = Flow::new("Flow").with_console(buffer.clone());
        let root = flow.root();
        flow.add(root, source)?;
        flow.add(root, Console::new())?;
        flow.run()?;
        Ok(buffer.lines())
    }

    #[test]
    fn test_for_loop_counts_up_and_down() {
        assert_eq!(printed(ForLoop::new(1, 3, 1)).unwrap(), vec!["1", "2", "3"]);
        assert_eq!(printed(ForLoop::new(0, 7, 3)).unwrap(), vec!["0", "3", "6"]);
        assert_eq!(printed(ForLoop::new(3, 1, -1)).unwrap(), vec!["3", "2", "1"]);
        assert!(printed(ForLoop::new(2, 1, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_for_loop_rejects_zero_step() {
        let err = printed(ForLoop::new(1, 3, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.path(), Some("Flow.ForLoop"));
    }

    #[test]
    fn test_for_loop_rewinds_between_executions() {
        let buffer = ConsoleBuffer::new();
        let mut flow = Flow::new("Flow").with_console(buffer.clone());
        let root = flow.root();
        flow.add(root, ForLoop::new(1, 2, 1)).unwrap();
        flow.add(root, Console::new()).unwrap();
        flow.setup().unwrap();
        flow.execute().unwrap();
        flow.execute().unwrap();
        assert_eq!(buffer.lines(), vec!["1", "2", "1", "2"]);
    }

    #[test]
    fn test_string_sources() {
        assert_eq!(
            printed(StringConstants::new(["a", "b"])).unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(
            printed(FileSupplier::new(["/tmp/x.arff"])).unwrap(),
            vec!["/tmp/x.arff"]
        );
        assert_eq!(printed(Start::new()).unwrap(), vec!["null"]);
    }

    #[test]
    fn test_get_storage_value_requires_value() {
        let err = printed(GetStorageValue::new("missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.message().contains("'missing' not present"));

        let err = printed(GetStorageValue::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
