//! Outgoing operation model
//!
//! Operations are a tagged variant over the three GraphQL operation kinds. The
//! kind is determined once, when the document text is classified, and every
//! later decision (routing, validation) dispatches on the tag.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::GraphQlRequest;

// ----------------------------------------------------------------------------
// Chat Documents
// ----------------------------------------------------------------------------

/// Mutation that posts one chat line to the backend
pub const MESSAGE_MUTATION: &str = "mutation Message($text: String) {\n  message(text: $text)\n}";

/// Subscription that streams every posted chat line
pub const MESSAGES_SUBSCRIPTION: &str = "subscription {\n  messages {\n    text\n  }\n}";

// ----------------------------------------------------------------------------
// Operation Kind
// ----------------------------------------------------------------------------

/// The kind of a GraphQL operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "query" => Some(OperationKind::Query),
            "mutation" => Some(OperationKind::Mutation),
            "subscription" => Some(OperationKind::Subscription),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Operation
// ----------------------------------------------------------------------------

/// Document, name and variables shared by every operation kind
#[derive(Debug, Clone, PartialEq)]
pub struct OperationBody {
    pub document: String,
    pub operation_name: Option<String>,
    pub variables: Option<Value>,
}

/// An outgoing GraphQL operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Query(OperationBody),
    Mutation(OperationBody),
    Subscription(OperationBody),
}

impl Operation {
    /// Classify a document by its first operation definition.
    ///
    /// Fragment definitions before the operation are skipped. A document whose
    /// first operation cannot be recognized is treated as a query.
    pub fn parse(document: impl Into<String>) -> Self {
        let document = document.into();
        let (kind, operation_name) = classify(&document);
        let body = OperationBody {
            document,
            operation_name,
            variables: None,
        };

        match kind {
            OperationKind::Query => Operation::Query(body),
            OperationKind::Mutation => Operation::Mutation(body),
            OperationKind::Subscription => Operation::Subscription(body),
        }
    }

    /// Attach variables to the operation
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.body_mut().variables = Some(variables);
        self
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Query(_) => OperationKind::Query,
            Operation::Mutation(_) => OperationKind::Mutation,
            Operation::Subscription(_) => OperationKind::Subscription,
        }
    }

    pub fn body(&self) -> &OperationBody {
        match self {
            Operation::Query(body) | Operation::Mutation(body) | Operation::Subscription(body) => {
                body
            }
        }
    }

    fn body_mut(&mut self) -> &mut OperationBody {
        match self {
            Operation::Query(body) | Operation::Mutation(body) | Operation::Subscription(body) => {
                body
            }
        }
    }

    /// Build the wire request for this operation
    pub fn to_request(&self) -> GraphQlRequest {
        let body = self.body();
        GraphQlRequest {
            query: body.document.clone(),
            variables: body.variables.clone(),
            operation_name: body.operation_name.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Document Classification
// ----------------------------------------------------------------------------

/// Find the kind and optional name of the first operation definition
fn classify(document: &str) -> (OperationKind, Option<String>) {
    let mut scanner = Scanner::new(document);

    loop {
        scanner.skip_ignored();
        match scanner.peek() {
            Some('{') => return (OperationKind::Query, None),
            Some(c) if is_name_start(c) => {
                let keyword = scanner.read_name();
                if keyword == "fragment" {
                    if !scanner.skip_definition() {
                        return (OperationKind::Query, None);
                    }
                    continue;
                }

                let Some(kind) = OperationKind::from_keyword(keyword) else {
                    return (OperationKind::Query, None);
                };

                scanner.skip_ignored();
                let name = match scanner.peek() {
                    Some(c) if is_name_start(c) => Some(scanner.read_name().to_string()),
                    _ => None,
                };
                return (kind, name);
            }
            _ => return (OperationKind::Query, None),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_name_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// Minimal lexer over GraphQL ignored tokens, names and blocks
struct Scanner<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skip whitespace, commas, byte order marks and `#` comments
    fn skip_ignored(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\n' | '\r' | ',' | '\u{feff}' => {
                    self.bump();
                }
                '#' => {
                    while let Some(c) = self.bump() {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_name_continue(c) {
                break;
            }
            self.bump();
        }
        &self.source[start..self.pos]
    }

    /// Skip a whole definition: its header up to the selection set, then the
    /// selection set itself. Argument lists in the header are skipped as
    /// groups, since object values inside them carry braces.
    /// Returns false when the document ends first.
    fn skip_definition(&mut self) -> bool {
        loop {
            match self.peek() {
                None => return false,
                Some('#') => self.skip_ignored(),
                Some('"') => self.skip_string(),
                Some('(') => {
                    if !self.skip_group('(', ')') {
                        return false;
                    }
                }
                Some('{') => return self.skip_group('{', '}'),
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// Skip a balanced `open ... close` group starting at `open`, strings and
    /// comments included. Returns false when the document ends first.
    fn skip_group(&mut self, open: char, close: char) -> bool {
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '#' => {
                    self.skip_ignored();
                    continue;
                }
                '"' => {
                    self.skip_string();
                    continue;
                }
                c if c == open => depth += 1,
                c if c == close => {
                    self.bump();
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return true;
                    }
                    continue;
                }
                _ => {}
            }
            self.bump();
        }
        false
    }

    fn skip_string(&mut self) {
        if self.rest().starts_with("\"\"\"") {
            self.pos += 3;
            match self.rest().find("\"\"\"") {
                Some(end) => self.pos += end + 3,
                None => self.pos = self.source.len(),
            }
            return;
        }

        self.bump();
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                '"' | '\n' => break,
                _ => {}
            }
        }
    }
}
