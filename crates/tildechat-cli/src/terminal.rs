//! Line-oriented terminal view
//!
//! The terminal cannot redraw, so each applied tree is diffed against what
//! was already printed: new lines are appended, and a shrinking list means
//! the history was cleared.

use std::cell::{Cell, Ref, RefCell};
use std::io::Write;

use tildechat_core::{ChatView, ScrollMetrics, ViewTree};
use tracing::warn;

use crate::config::TerminalConfig;

/// `ChatView` printing chat lines to a writer
pub struct TerminalView<W: Write> {
    output: RefCell<W>,
    input: RefCell<String>,
    printed: Cell<usize>,
    divider: String,
}

impl<W: Write> TerminalView<W> {
    pub fn new(output: W, config: &TerminalConfig) -> Self {
        Self {
            output: RefCell::new(output),
            input: RefCell::new(String::new()),
            printed: Cell::new(0),
            divider: config.divider.clone(),
        }
    }

    /// Everything written so far
    pub fn output(&self) -> Ref<'_, W> {
        self.output.borrow()
    }

    fn print(&self, tree: &ViewTree) -> std::io::Result<()> {
        let mut out = self.output.borrow_mut();
        let mut printed = self.printed.get();

        if tree.lines.len() < printed {
            writeln!(out, "{}", self.divider)?;
            printed = 0;
        }
        for line in tree.line_texts().iter().skip(printed) {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;

        self.printed.set(tree.lines.len());
        Ok(())
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn input_value(&self) -> String {
        self.input.borrow().clone()
    }

    fn set_input_value(&self, value: &str) {
        *self.input.borrow_mut() = value.to_string();
    }

    // The terminal keeps focus on stdin.
    fn focus_input(&self) {}

    fn apply(&self, tree: &ViewTree) {
        if let Err(e) = self.print(tree) {
            warn!("Unable to write chat lines: {}", e);
        }
    }

    fn scroll_metrics(&self) -> Option<ScrollMetrics> {
        None
    }

    fn set_scroll_top(&self, _top: i32) {}
}
