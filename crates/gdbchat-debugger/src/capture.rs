//! Scoped capture of debugger output.

/// Accumulates output lines while enabled.
///
/// Opening an already-open window resets the accumulator.
#[derive(Debug, Default)]
pub struct CaptureWindow {
    enabled: bool,
    lines: Vec<String>,
}

impl CaptureWindow {
    /// Creates a closed, empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables capture and clears anything previously accumulated.
    pub fn open(&mut self) {
        self.enabled = true;
        self.lines.clear();
    }

    /// Appends a line if capture is enabled. Returns whether it was kept.
    pub fn push(&mut self, line: &str) -> bool {
        if self.enabled {
            self.lines.push(line.to_string());
        }
        self.enabled
    }

    /// Disables capture and returns the accumulated lines joined by `\n`.
    pub fn close(&mut self) -> String {
        self.enabled = false;
        let text = self.lines.join("\n");
        self.lines.clear();
        text
    }

    /// Whether capture is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of lines accumulated so far.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
