//! Diagnostic trace recorder
//!
//! Every resolution boundary pushes a frame and pops it on the way out.
//! When the outermost frame pops, the recorded slice is preserved under
//! the root identifier for later inspection.

/// How much detail the tracer records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceLevel {
    /// Record nothing
    #[default]
    Off,
    /// Record one frame per resolution boundary
    Compact,
    /// Also record parameter- and property-level frames
    Verbose,
}

/// Stack-shaped frame recorder with per-root retention.
pub struct Tracer {
    level: TraceLevel,
    depth: usize,
    root: Option<String>,
    frames: Vec<String>,
    completed: Vec<(String, Vec<String>)>,
}

/// How many finished root traces are retained
const RETAINED_TRACES: usize = 32;

impl Tracer {
    /// Create a tracer at the given level
    pub fn new(level: TraceLevel) -> Self {
        Self {
            level,
            depth: 0,
            root: None,
            frames: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// Current level
    #[inline]
    pub fn level(&self) -> TraceLevel {
        self.level
    }

    /// Change the level; takes effect on the next chain
    #[inline]
    pub fn set_level(&mut self, level: TraceLevel) {
        self.level = level;
    }

    /// Push a frame. `detail` frames only record at `Verbose`.
    ///
    /// Depth is tracked even when the level suppresses recording so pops
    /// stay balanced across level changes.
    pub fn push(&mut self, label: impl Into<String>, detail: bool) {
        let label = label.into();
        if self.depth == 0 {
            self.root = Some(label.clone());
            self.frames.clear();
        }
        self.depth += 1;

        let record = match self.level {
            TraceLevel::Off => false,
            TraceLevel::Compact => !detail,
            TraceLevel::Verbose => true,
        };
        if record {
            let indented = format!("{}{}", "  ".repeat(self.depth - 1), label);
            self.frames.push(indented);
        }
    }

    /// Pop the innermost frame; finalizes the chain at depth zero.
    pub fn pop(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        if self.depth == 0
            && let Some(root) = self.root.take()
        {
            let frames = std::mem::take(&mut self.frames);
            if !frames.is_empty() {
                self.completed.retain(|(r, _)| *r != root);
                self.completed.push((root, frames));
                if self.completed.len() > RETAINED_TRACES {
                    self.completed.remove(0);
                }
            }
        }
    }

    /// Frames preserved for the last chain rooted at `root`
    pub fn trace_for(&self, root: &str) -> Option<&[String]> {
        self.completed
            .iter()
            .rev()
            .find(|(r, _)| r == root)
            .map(|(_, frames)| frames.as_slice())
    }

    /// Current in-flight depth
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Drop all retained traces
    pub fn clear(&mut self) {
        self.completed.clear();
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("level", &self.level)
            .field("depth", &self.depth)
            .field("retained", &self.completed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_records_nothing() {
        let mut tracer = Tracer::new(TraceLevel::Off);
        tracer.push("def:a", false);
        tracer.pop();
        assert!(tracer.trace_for("def:a").is_none());
    }

    #[test]
    fn test_compact_skips_detail_frames() {
        let mut tracer = Tracer::new(TraceLevel::Compact);
        tracer.push("def:a", false);
        tracer.push("param:a.n", true);
        tracer.pop();
        tracer.pop();

        let frames = tracer.trace_for("def:a").unwrap();
        assert_eq!(frames, &["def:a".to_string()]);
    }

    #[test]
    fn test_verbose_keeps_detail_and_indentation() {
        let mut tracer = Tracer::new(TraceLevel::Verbose);
        tracer.push("def:a", false);
        tracer.push("class:A", false);
        tracer.pop();
        tracer.pop();

        let frames = tracer.trace_for("def:a").unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[1].starts_with("  "));
    }

    #[test]
    fn test_rerun_replaces_previous_trace() {
        let mut tracer = Tracer::new(TraceLevel::Compact);
        for _ in 0..2 {
            tracer.push("def:a", false);
            tracer.pop();
        }
        assert_eq!(tracer.trace_for("def:a").unwrap().len(), 1);
    }

    #[test]
    fn test_unbalanced_pop_is_ignored() {
        let mut tracer = Tracer::new(TraceLevel::Compact);
        tracer.pop();
        assert_eq!(tracer.depth(), 0);
    }
}
