//! Browser tests, run with `wasm-pack test --headless --firefox`

#![cfg(target_arch = "wasm32")]

use tildechat_core::render::{render, RenderState};
use tildechat_core::{ChatView, Message};
use tildechat_web::{DomView, TildechatWidget};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement, KeyboardEvent, KeyboardEventInit};

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

fn container() -> Element {
    let document = document();
    let container = document.create_element("div").unwrap();
    document.body().unwrap().append_child(&container).unwrap();
    container
}

/// Endpoints nothing listens on: every send fails, no message arrives
fn offline_config() -> JsValue {
    js_sys::JSON::parse(
        r#"{ "client": { "http_endpoint": "http://127.0.0.1:9/", "ws_endpoint": "ws://127.0.0.1:9/ws" } }"#,
    )
    .unwrap()
}

fn input_of(container: &Element) -> HtmlInputElement {
    container
        .query_selector("input")
        .unwrap()
        .unwrap()
        .dyn_into()
        .unwrap()
}

async fn sleep(ms: i32) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

fn press_enter(input: &HtmlInputElement) {
    let init = KeyboardEventInit::new();
    init.set_key("Enter");
    init.set_bubbles(true);
    let event = KeyboardEvent::new_with_keyboard_event_init_dict("keydown", &init).unwrap();
    input.dispatch_event(&event).unwrap();
}

/// Wait until the failed send settles and the input has been emptied
async fn wait_for_empty_input(input: &HtmlInputElement) {
    for _ in 0..100 {
        if input.value().is_empty() {
            return;
        }
        sleep(50).await;
    }
    panic!("input still holds {:?}", input.value());
}

#[wasm_bindgen_test]
fn dom_view_renders_lines_as_text() {
    let container = container();
    let view = DomView::create(&document()).unwrap();
    view.attach(&container).unwrap();

    let messages = vec![Message::new("hello"), Message::new("<b>not bold</b>")];
    view.apply(&render(&RenderState {
        messages: &messages,
        focused: false,
    }));

    let lines = container.query_selector_all(".tildechat-line").unwrap();
    assert_eq!(lines.length(), 2);
    assert_eq!(
        lines.item(1).unwrap().text_content().unwrap(),
        "~ <b>not bold</b>"
    );
    assert!(container.query_selector("b").unwrap().is_none());

    view.set_input_value("draft");
    assert_eq!(view.input_value(), "draft");
}

#[wasm_bindgen_test]
fn dom_view_stays_detached_until_attached() {
    let container = container();
    let view = DomView::create(&document()).unwrap();

    assert!(view.root().parent_node().is_none());
    assert!(container.first_child().is_none());
    assert!(view.scroll_metrics().is_none());

    view.attach(&container).unwrap();
    let child = container.first_child().unwrap();
    assert!(child.is_same_node(Some(view.root().as_ref())));
}

#[wasm_bindgen_test]
fn widget_mounts_and_unmounts() {
    let container = container();
    let mut widget = TildechatWidget::mount(&container, JsValue::UNDEFINED).unwrap();

    assert!(widget.is_mounted());
    let input = container.query_selector("input").unwrap().unwrap();
    assert_eq!(input.get_attribute("role").as_deref(), Some("textbox"));
    assert_eq!(widget.messages().length(), 0);

    widget.unmount();
    widget.unmount();
    assert!(!widget.is_mounted());
    assert!(container.first_child().is_none());
}

#[wasm_bindgen_test]
fn widget_rejects_invalid_config() {
    let container = container();
    let config = js_sys::JSON::parse(r#"{ "client": { "http_endpoint": "ws://wrong-scheme/" } }"#).unwrap();

    assert!(TildechatWidget::mount(&container, config).is_err());
    assert!(container.first_child().is_none());
}

#[wasm_bindgen_test]
async fn enter_clears_input_after_failed_send() {
    let container = container();
    let _widget = TildechatWidget::mount(&container, offline_config()).unwrap();
    let input = input_of(&container);

    input.set_value("test new todo");
    press_enter(&input);
    wait_for_empty_input(&input).await;
}

#[wasm_bindgen_test]
async fn clear_command_empties_list_and_input() {
    let container = container();
    let widget = TildechatWidget::mount(&container, offline_config()).unwrap();
    let input = input_of(&container);

    input.set_value("CLEAR");
    press_enter(&input);
    wait_for_empty_input(&input).await;

    assert_eq!(widget.messages().length(), 0);
    assert_eq!(container.query_selector_all(".tildechat-line").unwrap().length(), 0);
}

#[wasm_bindgen_test]
fn other_keys_leave_input_alone() {
    let container = container();
    let _widget = TildechatWidget::mount(&container, offline_config()).unwrap();
    let input = input_of(&container);

    input.set_value("draft");
    let init = KeyboardEventInit::new();
    init.set_key("a");
    let event = KeyboardEvent::new_with_keyboard_event_init_dict("keydown", &init).unwrap();
    input.dispatch_event(&event).unwrap();

    assert_eq!(input.value(), "draft");
}

#[wasm_bindgen_test]
fn click_in_widget_refocuses_blurred_input() {
    let container = container();
    let _widget = TildechatWidget::mount(&container, offline_config()).unwrap();
    let input = input_of(&container);

    input.focus().unwrap();
    input.blur().unwrap();
    let active = document().active_element();
    assert!(!active.map_or(false, |element| element.is_same_node(Some(input.as_ref()))));

    let lines: HtmlElement = container
        .query_selector(".tildechat-lines")
        .unwrap()
        .unwrap()
        .dyn_into()
        .unwrap();
    lines.click();

    let active = document().active_element().unwrap();
    assert!(active.is_same_node(Some(input.as_ref())));
}
