//! Pure render function from chat state to a view tree
//!
//! Views re-apply the whole tree on every state change; diffing, if any, is a
//! concern of the view implementation.

use crate::store::Message;

/// Glyph prefixed to every rendered line and to the input prompt
pub const LINE_GLYPH: &str = "~";

/// ARIA role of the text input
pub const INPUT_ROLE: &str = "textbox";

/// Everything the render function reads
#[derive(Debug, Clone, Copy)]
pub struct RenderState<'a> {
    pub messages: &'a [Message],
    pub focused: bool,
}

/// One rendered chat line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub glyph: &'static str,
    pub text: String,
}

/// The text input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputNode {
    pub glyph: &'static str,
    pub role: &'static str,
    /// Ask the view to grab focus for the input
    pub autofocus: bool,
}

/// Rendered widget: scrolling list above a single input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTree {
    pub lines: Vec<Line>,
    pub input: InputNode,
}

impl ViewTree {
    /// Lines as they appear on screen, glyph included
    pub fn line_texts(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| format!("{} {}", line.glyph, line.text))
            .collect()
    }
}

pub fn render(state: &RenderState<'_>) -> ViewTree {
    ViewTree {
        lines: state
            .messages
            .iter()
            .map(|message| Line {
                glyph: LINE_GLYPH,
                text: message.text().to_string(),
            })
            .collect(),
        input: InputNode {
            glyph: LINE_GLYPH,
            role: INPUT_ROLE,
            autofocus: !state.focused,
        },
    }
}
