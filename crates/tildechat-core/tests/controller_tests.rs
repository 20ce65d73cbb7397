//! Integration tests for the chat view controller
//!
//! These tests drive a mounted controller through a recording view and the
//! in-memory loopback backend, the same way the browser and terminal hosts
//! drive it through real DOM events and sockets.

use std::cell::{Cell, RefCell};

use serde_json::json;
use tildechat_core::{
    ChatConfig, ChatController, ChatView, ClientError, GraphQlResponse, Lifecycle, LoopbackBackend,
    ScrollMetrics, SubscriptionError, SubscriptionEvent, SubscriptionState, TransportError, ViewTree,
};
use tokio::task::{self, LocalSet};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const LINE_HEIGHT: i32 = 20;
const CLIENT_HEIGHT: i32 = 100;

/// View that records everything the controller asks of it
#[derive(Default)]
struct RecordingView {
    input: RefCell<String>,
    trees: RefCell<Vec<ViewTree>>,
    focus_requests: Cell<usize>,
    scroll_top: Cell<i32>,
}

impl RecordingView {
    fn type_text(&self, text: &str) {
        *self.input.borrow_mut() = text.to_string();
    }

    fn input(&self) -> String {
        self.input.borrow().clone()
    }

    fn lines(&self) -> Vec<String> {
        self.trees
            .borrow()
            .last()
            .map(ViewTree::line_texts)
            .unwrap_or_default()
    }

    fn renders(&self) -> usize {
        self.trees.borrow().len()
    }
}

impl ChatView for RecordingView {
    fn input_value(&self) -> String {
        self.input()
    }

    fn set_input_value(&self, value: &str) {
        *self.input.borrow_mut() = value.to_string();
    }

    fn focus_input(&self) {
        self.focus_requests.set(self.focus_requests.get() + 1);
    }

    fn apply(&self, tree: &ViewTree) {
        self.trees.borrow_mut().push(tree.clone());
    }

    fn scroll_metrics(&self) -> Option<ScrollMetrics> {
        let lines = self.trees.borrow().last().map(|tree| tree.lines.len())?;
        Some(ScrollMetrics {
            scroll_height: lines as i32 * LINE_HEIGHT,
            client_height: CLIENT_HEIGHT,
        })
    }

    fn set_scroll_top(&self, top: i32) {
        self.scroll_top.set(top);
    }
}

fn mounted() -> (LoopbackBackend, ChatController<RecordingView>) {
    let backend = LoopbackBackend::new();
    let controller = ChatController::new(backend.client(), RecordingView::default(), ChatConfig::default());
    controller.mount().unwrap();
    (backend, controller)
}

/// Type `text` and press Enter, awaiting the mutation if one was issued
async fn submit(controller: &ChatController<RecordingView>, text: &str) {
    controller.view().type_text(text);
    if let Some(mutation) = controller.handle_keydown("Enter") {
        mutation.await;
    }
}

async fn settle() {
    for _ in 0..8 {
        task::yield_now().await;
    }
}

// ----------------------------------------------------------------------------
// Mount and Unmount
// ----------------------------------------------------------------------------

#[test]
fn test_mount_renders_subscribes_and_requests_focus() {
    let (backend, controller) = mounted();

    assert_eq!(controller.lifecycle(), Lifecycle::Mounted);
    assert_eq!(controller.subscription_state(), SubscriptionState::Live);
    assert_eq!(backend.active_subscriptions(), 1);
    assert_eq!(controller.view().renders(), 1);
    assert!(controller.view().lines().is_empty());
    assert_eq!(controller.view().focus_requests.get(), 1);

    let requests = backend.requests();
    assert!(requests.is_empty(), "mount must not issue request/response operations");
}

#[test]
fn test_mount_twice_is_rejected() {
    let (backend, controller) = mounted();
    assert_eq!(controller.mount(), Err(ClientError::AlreadyMounted));
    assert_eq!(backend.active_subscriptions(), 1);
}

#[test]
fn test_unmount_closes_subscription_and_ignores_later_events() {
    let (backend, controller) = mounted();
    backend.push_text("before");
    let renders = controller.view().renders();

    controller.unmount();
    controller.unmount();

    assert_eq!(controller.lifecycle(), Lifecycle::Terminated);
    assert_eq!(controller.subscription_state(), SubscriptionState::Closed);
    assert_eq!(backend.active_subscriptions(), 0);
    assert!(controller.messages().is_empty());

    backend.push_text("after");
    assert_eq!(controller.view().renders(), renders);
    assert!(controller.messages().is_empty());

    controller.view().type_text("late");
    assert!(controller.handle_keydown("Enter").is_none());
    assert_eq!(controller.mount(), Err(ClientError::AlreadyMounted));
}

#[test]
fn test_lagging_transport_cannot_reach_unmounted_controller() {
    let backend = LoopbackBackend::new();
    backend.ignore_close(true);
    let controller = ChatController::new(backend.client(), RecordingView::default(), ChatConfig::default());
    controller.mount().unwrap();

    controller.unmount();
    backend.push_text("ghost");

    assert!(controller.messages().is_empty());
    assert!(controller.view().lines().is_empty());
}

// ----------------------------------------------------------------------------
// Sending and Receiving
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_enter_sends_and_clears_input() {
    let (backend, controller) = mounted();

    submit(&controller, "test new todo").await;

    assert_eq!(controller.view().input(), "");
    assert_eq!(controller.view().lines(), vec!["~ test new todo"]);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].variables, Some(json!({ "text": "test new todo" })));
}

#[tokio::test]
async fn test_clear_command_empties_list() {
    let (_backend, controller) = mounted();

    submit(&controller, "test new todo").await;
    submit(&controller, "clear").await;

    assert_eq!(controller.view().input(), "");
    assert!(controller.messages().is_empty());
    assert!(!controller
        .view()
        .lines()
        .iter()
        .any(|line| line.contains("test new todo")));
}

#[tokio::test]
async fn test_clear_command_ignores_case() {
    let (_backend, controller) = mounted();

    submit(&controller, "one").await;
    submit(&controller, "CLEAR").await;
    assert!(controller.messages().is_empty());

    submit(&controller, "two").await;
    submit(&controller, "ClEaR").await;
    assert!(controller.messages().is_empty());
}

#[tokio::test]
async fn test_clear_is_a_regular_message_to_the_server() {
    let (backend, controller) = mounted();
    submit(&controller, "clear").await;

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].variables, Some(json!({ "text": "clear" })));
}

#[test]
fn test_other_keys_and_empty_input_do_nothing() {
    let (backend, controller) = mounted();

    controller.view().type_text("half typed");
    assert!(controller.handle_keydown("a").is_none());
    assert!(controller.handle_keydown("Shift").is_none());
    assert_eq!(controller.view().input(), "half typed");

    controller.view().type_text("");
    assert!(controller.handle_keydown("Enter").is_none());

    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_failed_mutation_still_clears_input() {
    let (backend, controller) = mounted();
    backend.fail_requests(TransportError::network("offline"));

    submit(&controller, "lost").await;

    assert_eq!(controller.view().input(), "");
    assert!(controller.messages().is_empty());
}

#[tokio::test]
async fn test_clear_applies_even_when_mutation_fails() {
    let (backend, controller) = mounted();
    backend.push_text("from elsewhere");
    backend.fail_requests(TransportError::network("offline"));

    submit(&controller, "clear").await;

    assert!(controller.messages().is_empty());
    assert_eq!(controller.view().input(), "");
}

#[test]
fn test_echoes_are_not_deduplicated() {
    let (backend, controller) = mounted();
    backend.push_text("same");
    backend.push_text("same");

    assert_eq!(controller.view().lines(), vec!["~ same", "~ same"]);
}

#[test]
fn test_payload_without_text_is_ignored() {
    let (backend, controller) = mounted();
    backend.push_event(SubscriptionEvent::Next(GraphQlResponse::from_data(
        json!({ "somethingElse": true }),
    )));

    assert!(controller.messages().is_empty());
    assert_eq!(controller.subscription_state(), SubscriptionState::Live);
}

#[test]
fn test_scroll_follows_appends() {
    let (backend, controller) = mounted();

    backend.push_text("1");
    assert_eq!(controller.view().scroll_top.get(), 0);

    for i in 2..=8 {
        backend.push_text(&i.to_string());
    }
    assert_eq!(controller.view().scroll_top.get(), 8 * LINE_HEIGHT - CLIENT_HEIGHT);
}

// ----------------------------------------------------------------------------
// Overlapping Mutations
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_overlapping_mutations_each_clear_input_in_any_order() {
    let (backend, controller) = mounted();
    backend.hold_responses(true);

    LocalSet::new()
        .run_until(async {
            controller.view().type_text("first");
            let first = controller.handle_keydown("Enter").unwrap();
            controller.view().type_text("second");
            let second = controller.handle_keydown("Enter").unwrap();

            task::spawn_local(first);
            task::spawn_local(second);
            settle().await;
            assert_eq!(backend.held_responses(), 2);

            // The later mutation resolves first.
            controller.view().type_text("draft");
            assert!(backend.release_newest());
            settle().await;
            assert_eq!(controller.view().input(), "");
            assert_eq!(controller.view().lines(), vec!["~ second"]);

            controller.view().type_text("another draft");
            assert!(backend.release_oldest());
            settle().await;
            assert_eq!(controller.view().input(), "");
            assert_eq!(controller.view().lines(), vec!["~ second", "~ first"]);
        })
        .await;
}

#[tokio::test]
async fn test_mutation_resolving_after_unmount_is_discarded() {
    let (backend, controller) = mounted();
    backend.hold_responses(true);

    LocalSet::new()
        .run_until(async {
            controller.view().type_text("too late");
            task::spawn_local(controller.handle_keydown("Enter").unwrap());
            settle().await;

            controller.unmount();
            assert!(backend.release_oldest());
            settle().await;

            assert_eq!(controller.view().input(), "too late");
            assert!(controller.messages().is_empty());
        })
        .await;
}

// ----------------------------------------------------------------------------
// Focus
// ----------------------------------------------------------------------------

#[test]
fn test_click_refocuses_only_when_blurred() {
    let (_backend, controller) = mounted();
    let view = controller.view();
    controller.on_focus();
    assert!(controller.is_focused());

    controller.on_click();
    assert_eq!(view.focus_requests.get(), 1);

    controller.on_blur();
    assert!(!controller.is_focused());
    controller.on_click();
    assert_eq!(view.focus_requests.get(), 2);
}

#[test]
fn test_blurred_input_is_rendered_with_autofocus() {
    let (backend, controller) = mounted();

    controller.on_focus();
    backend.push_text("a");
    assert!(!controller.view().trees.borrow().last().unwrap().input.autofocus);

    controller.on_blur();
    backend.push_text("b");
    assert!(controller.view().trees.borrow().last().unwrap().input.autofocus);
}

// ----------------------------------------------------------------------------
// Subscription Failures
// ----------------------------------------------------------------------------

#[test]
fn test_subscription_error_marks_failed_and_keeps_messages() {
    let (backend, controller) = mounted();
    backend.push_text("kept");
    backend.fail_subscriptions(SubscriptionError::closed("socket reset"));

    assert_eq!(
        controller.subscription_state(),
        SubscriptionState::Failed(SubscriptionError::closed("socket reset"))
    );
    assert_eq!(controller.view().lines(), vec!["~ kept"]);
    assert_eq!(controller.lifecycle(), Lifecycle::Mounted);
}

#[test]
fn test_server_completion_marks_closed() {
    let (backend, controller) = mounted();
    backend.push_event(SubscriptionEvent::Complete);

    assert_eq!(controller.subscription_state(), SubscriptionState::Closed);
    assert_eq!(backend.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_sending_still_works_after_subscription_failure() {
    let (backend, controller) = mounted();
    backend.fail_subscriptions(SubscriptionError::closed("socket reset"));

    submit(&controller, "still here").await;

    assert_eq!(backend.requests().len(), 1);
    assert_eq!(controller.view().input(), "");
    assert!(controller.messages().is_empty());
}

#[test]
fn test_invalid_subscription_document_fails_mount() {
    let backend = LoopbackBackend::new();
    let config = ChatConfig {
        subscription_document: "{ messages { text } }".to_string(),
        ..Default::default()
    };
    let controller = ChatController::new(backend.client(), RecordingView::default(), config);

    assert!(matches!(
        controller.mount(),
        Err(ClientError::WrongOperationKind { .. })
    ));
    assert_eq!(controller.lifecycle(), Lifecycle::Mounted);
    assert_eq!(backend.active_subscriptions(), 0);
}
