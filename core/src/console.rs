//! Console output and the viewer hook used by waiting sinks.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Blocks the traversal until an external display is dismissed.
pub trait Viewer: Send {
    fn wait_for_dismissal(&mut self, actor: &str);
}

/// Viewer that returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoViewer;

impl Viewer for NoViewer {
    fn wait_for_dismissal(&mut self, _actor: &str) {}
}

impl<F> Viewer for F
where
    F: FnMut(&str) + Send,
{
    fn wait_for_dismissal(&mut self, actor: &str) {
        self(actor)
    }
}

/// In-memory console, shareable between a flow and the code inspecting it.
#[derive(Debug, Default, Clone)]
pub struct ConsoleBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Write for ConsoleBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_buffer() {
        let buffer = ConsoleBuffer::new();
        let mut writer = buffer.clone();
        writeln!(writer, "1").unwrap();
        writeln!(writer, "2").unwrap();
        assert_eq!(buffer.lines(), vec!["1", "2"]);
        buffer.clear();
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_closure_viewer() {
        let mut seen = Vec::new();
        {
            let mut viewer = |actor: &str| seen.push(actor.to_string());
            viewer.wait_for_dismissal("Flow.Console");
        }
        assert_eq!(seen, vec!["Flow.Console"]);
    }
}
