use actorflow_core::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Discards every token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Null {}

impl Null {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for Null {
    fn capability(&self) -> Capability {
        Capability::SINK
    }

    fn execute(&mut self, _input: Option<Token>, _ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        Ok(Outcome::none())
    }
}

impl ActorType for Null {
    const TYPE: &'static str = "Null";
    const DESCRIPTION: &'static str = "Sink that just ignores input.";
}

/// Prints each payload as one line on the flow's console.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Console {
    /// Text printed in front of every payload; placeholders are expanded.
    pub prefix: String,
    /// Block on the flow's viewer after each line.
    pub wait: bool,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            wait: false,
        }
    }
}

impl Actor for Console {
    fn capability(&self) -> Capability {
        Capability::SINK
    }

    fn quick_info(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.prefix.is_empty() {
            parts.push(format!("prefix: {}", self.prefix));
        }
        if self.wait {
            parts.push("wait".to_string());
        }
        (!parts.is_empty()).then(|| parts.join(", "))
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        let prefix = ctx.expand(&self.prefix)?;
        ctx.println(&format!("{prefix}{}", token.payload()))?;
        Ok(Outcome::none())
    }

    fn waits(&self) -> bool {
        self.wait
    }
}

impl ActorType for Console {
    const TYPE: &'static str = "Console";
    const DESCRIPTION: &'static str = "Sink that outputs the payloads of the data it receives to the console.";
}

/// Writes one line per payload to a file.
///
/// The file is opened on the first token, flushed on wrapup and closed on
/// cleanup or failure.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DumpFile {
    /// Output file; placeholders are expanded when the file is opened.
    pub output: String,
    /// Append to an existing file instead of replacing it.
    pub append: bool,
    #[serde(skip)]
    writer: Option<BufWriter<File>>,
}

impl DumpFile {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            append: false,
            writer: None,
        }
    }

    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }

    fn open(&self, path: &str) -> FlowResult<BufWriter<File>> {
        let mut options = OpenOptions::new();
        options.create(true);
        if self.append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options
            .open(path)
            .map_err(|e| FlowError::execution(format!("failed to open '{path}': {e}")))?;
        tracing::debug!(path, append = self.append, "opened output file");
        Ok(BufWriter::new(file))
    }
}

impl Actor for DumpFile {
    fn capability(&self) -> Capability {
        Capability::SINK
    }

    fn quick_info(&self) -> Option<String> {
        let mut info = format!("output: {}", self.output);
        if self.append {
            info.push_str(", append");
        }
        Some(info)
    }

    fn setup(&mut self, _ctx: &SetupContext<'_>) -> FlowResult<()> {
        if self.output.trim().is_empty() {
            return Err(FlowError::configuration("no output file specified"));
        }
        if self.output.contains("@{") {
            return Ok(());
        }
        let parent = Path::new(&self.output)
            .parent()
            .filter(|p| !p.as_os_str().is_empty());
        match parent {
            Some(dir) if !dir.is_dir() => Err(FlowError::precondition(format!(
                "output directory '{}' does not exist",
                dir.display()
            ))),
            _ => Ok(()),
        }
    }

    fn execute(&mut self, input: Option<Token>, ctx: &mut ExecContext<'_>) -> FlowResult<Outcome> {
        let token = require_input(input)?;
        if self.writer.is_none() {
            let path = ctx.expand(&self.output)?;
            self.writer = Some(self.open(&path)?);
        }
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", token.payload())
                .map_err(|e| FlowError::execution(format!("failed to write '{}': {e}", self.output)))?;
        }
        Ok(Outcome::none())
    }

    fn wrapup(&mut self) -> FlowResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| FlowError::execution(format!("failed to flush '{}': {e}", self.output)))?;
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                tracing::warn!(output = %self.output, error = %e, "failed to flush on cleanup");
            }
        }
    }
}

impl ActorType for DumpFile {
    const TYPE: &'static str = "DumpFile";
    const DESCRIPTION: &'static str = "Sink that dumps the payloads of the incoming tokens into the specified file, one line each.";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::source::{ForLoop, StringConstants};
    use crate::actors::transformer::UpdateStorageValue;
    use actorflow_core::ConsoleBuffer;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_console_prefix_and_viewer() {
        let buffer = ConsoleBuffer::new();
        let dismissed = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&dismissed);
        let mut flow = Flow::new("Flow")
            .with_console(buffer.clone())
            .with_viewer(move |actor: &str| seen.lock().unwrap().push(actor.to_string()));
        let root = flow.root();
        flow.add(root, ForLoop::new(1, 2, 1)).unwrap();
        let console = flow.add(root, Console::with_prefix("n=")).unwrap();
        flow.run().unwrap();
        assert_eq!(buffer.lines(), vec!["n=1", "n=2"]);
        assert!(dismissed.lock().unwrap().is_empty());

        flow.set_option(console, "wait", true);
        assert_eq!(flow.quick_info(console).as_deref(), Some("prefix: n=, wait"));
        flow.run().unwrap();
        assert_eq!(
            *dismissed.lock().unwrap(),
            vec!["Flow.Console".to_string(), "Flow.Console".to_string()]
        );
    }

    #[test]
    fn test_dump_file_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let output = path.display().to_string();

        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, StringConstants::new(["a", "b"])).unwrap();
        let dump = flow.add(root, DumpFile::new(output.clone())).unwrap();
        flow.run().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");

        flow.run().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");

        flow.set_option(dump, "append", true);
        flow.run().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\na\nb\n");
    }

    #[test]
    fn test_dump_file_released_after_sibling_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, StringConstants::new(["a", "b"])).unwrap();
        let branch = flow.add(root, Branch::default()).unwrap();
        let dump = flow.add(branch, DumpFile::new(path.display().to_string())).unwrap();
        flow.add(branch, UpdateStorageValue::new("missing", "X + 1")).unwrap();

        let err = flow.run().unwrap_err();
        assert_eq!(err.path(), Some("Flow.Branch.UpdateStorageValue"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\n");
        assert_eq!(flow.state(dump), LifecycleState::CleanedUp);

        flow.setup().unwrap();
        assert!(flow.execute().is_err());
        assert!(flow.wrapup().is_ok());
        flow.cleanup();
        flow.cleanup();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn test_dump_file_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("missing").join("out.txt");
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, StringConstants::new(["a"])).unwrap();
        flow.add(root, DumpFile::new(output.display().to_string())).unwrap();
        let err = flow.setup().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(err.path(), Some("Flow.DumpFile"));
    }

    #[test]
    fn test_dump_file_expands_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let mut flow = Flow::new("Flow");
        let root = flow.root();
        flow.add(root, StringConstants::new(["x"])).unwrap();
        flow.add(root, DumpFile::new("@{dir}/dump.txt")).unwrap();
        flow.setup().unwrap();
        flow.storage_mut().set("dir", dir.path().display().to_string());
        flow.execute().unwrap();
        flow.wrapup().unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dump.txt")).unwrap(),
            "x\n"
        );
        flow.cleanup();
    }
}
