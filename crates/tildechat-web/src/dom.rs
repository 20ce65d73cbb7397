//! DOM rendering of the chat widget

use tildechat_core::{ChatView, ScrollMetrics, ViewTree};
use tracing::warn;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement, HtmlInputElement};

use crate::utils::describe_js_error;

pub const ROOT_CLASS: &str = "tildechat";
pub const LINES_CLASS: &str = "tildechat-lines";
pub const LINE_CLASS: &str = "tildechat-line";
pub const PROMPT_CLASS: &str = "tildechat-prompt";
pub const GLYPH_CLASS: &str = "tildechat-glyph";

/// The widget's elements: a root holding a scrolling list and a prompt row
pub struct DomView {
    document: Document,
    root: HtmlElement,
    lines: HtmlElement,
    input: HtmlInputElement,
}

impl DomView {
    /// Build the widget, detached from the page until [`DomView::attach`]
    pub fn create(document: &Document) -> Result<Self, JsValue> {
        let root = create_html(document, "div", ROOT_CLASS)?;
        root.style().set_property("display", "flex")?;
        root.style().set_property("flex-direction", "column")?;

        let lines = create_html(document, "div", LINES_CLASS)?;
        lines.style().set_property("overflow-y", "auto")?;
        lines.style().set_property("flex", "1")?;

        let prompt = create_html(document, "div", PROMPT_CLASS)?;
        let glyph = create_html(document, "span", GLYPH_CLASS)?;
        let input: HtmlInputElement = document.create_element("input")?.dyn_into()?;
        input.set_type("text");
        input.set_attribute("role", tildechat_core::render::INPUT_ROLE)?;
        input.set_attribute("spellcheck", "false")?;
        glyph.set_text_content(Some(tildechat_core::render::LINE_GLYPH));

        prompt.append_child(&glyph)?;
        prompt.append_child(&input)?;
        root.append_child(&lines)?;
        root.append_child(&prompt)?;

        Ok(Self {
            document: document.clone(),
            root,
            lines,
            input,
        })
    }

    pub fn root(&self) -> &HtmlElement {
        &self.root
    }

    pub fn input(&self) -> &HtmlInputElement {
        &self.input
    }

    /// Append the widget to `container`
    pub fn attach(&self, container: &Element) -> Result<(), JsValue> {
        container.append_child(&self.root)?;
        Ok(())
    }

    /// Detach the widget from the page
    pub fn remove(&self) {
        self.root.remove();
    }

    fn render_lines(&self, tree: &ViewTree) -> Result<(), JsValue> {
        self.lines.set_text_content(None);
        for line in &tree.lines {
            let row = create_html(&self.document, "div", LINE_CLASS)?;
            let glyph = create_html(&self.document, "span", GLYPH_CLASS)?;
            glyph.set_text_content(Some(line.glyph));
            let text = self.document.create_element("span")?;
            // Text nodes only: chat lines are never parsed as markup.
            text.set_text_content(Some(&format!(" {}", line.text)));

            row.append_child(&glyph)?;
            row.append_child(&text)?;
            self.lines.append_child(&row)?;
        }
        self.input.set_autofocus(tree.input.autofocus);
        Ok(())
    }
}

impl ChatView for DomView {
    fn input_value(&self) -> String {
        self.input.value()
    }

    fn set_input_value(&self, value: &str) {
        self.input.set_value(value);
    }

    fn focus_input(&self) {
        if let Err(e) = self.input.focus() {
            warn!("Unable to focus input: {}", describe_js_error(&e));
        }
    }

    fn apply(&self, tree: &ViewTree) {
        if let Err(e) = self.render_lines(tree) {
            warn!("Unable to render chat lines: {}", describe_js_error(&e));
        }
    }

    fn scroll_metrics(&self) -> Option<ScrollMetrics> {
        if !self.lines.is_connected() {
            return None;
        }
        Some(ScrollMetrics {
            scroll_height: self.lines.scroll_height(),
            client_height: self.lines.client_height(),
        })
    }

    fn set_scroll_top(&self, top: i32) {
        self.lines.set_scroll_top(top);
    }
}

fn create_html(document: &Document, tag: &str, class: &str) -> Result<HtmlElement, JsValue> {
    let element: HtmlElement = document.create_element(tag)?.dyn_into()?;
    element.set_class_name(class);
    Ok(element)
}
