//! Observable message store
//!
//! An ordered, append-only list of chat lines that can only be emptied as a
//! whole. Observers are notified with the full list after every change.

use std::fmt;

/// One chat line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    text: String,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

type Observer = Box<dyn Fn(&[Message])>;

/// Chat lines in display order, oldest first
#[derive(Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    observers: Vec<Observer>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener called after every append and clear
    pub fn observe<F>(&mut self, observer: F)
    where
        F: Fn(&[Message]) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn append(&mut self, text: impl Into<String>) {
        self.messages.push(Message::new(text));
        self.notify();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.notify();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn notify(&self) {
        for observer in &self.observers {
            observer(&self.messages);
        }
    }
}

impl fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageStore")
            .field("messages", &self.messages)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_append_preserves_order() {
        let mut store = MessageStore::new();
        store.append("first");
        store.append("second");
        store.append("first");

        let texts: Vec<&str> = store.messages().iter().map(Message::text).collect();
        assert_eq!(texts, vec!["first", "second", "first"]);
    }

    #[test]
    fn test_clear_on_empty_store() {
        let mut store = MessageStore::new();
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_observers_see_every_change() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);

        let mut store = MessageStore::new();
        store.observe(move |messages| seen_clone.borrow_mut().push(messages.len()));
        store.append("a");
        store.append("b");
        store.clear();

        assert_eq!(*seen.borrow(), vec![1, 2, 0]);
    }

    proptest! {
        #[test]
        fn prop_length_and_order_follow_appends(texts in proptest::collection::vec(".*", 0..64)) {
            let mut store = MessageStore::new();
            for text in &texts {
                store.append(text.clone());
            }

            prop_assert_eq!(store.len(), texts.len());
            let stored: Vec<String> = store.messages().iter().map(|m| m.text().to_string()).collect();
            prop_assert_eq!(stored, texts);
        }

        #[test]
        fn prop_clear_always_empties(count in 0usize..128) {
            let mut store = MessageStore::new();
            for i in 0..count {
                store.append(i.to_string());
            }
            store.clear();
            prop_assert_eq!(store.len(), 0);
        }
    }
}
