//! Kernel messaging types exchanged with the connector.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

/// Thread-safe request ID generator.
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Correlation identifier attached to every execute request.
///
/// Connectors echo it back as the `parent_id` of every message produced on
/// behalf of the request, which lets the inspector tell its own traffic and
/// replies apart from everything else on the broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Allocates the next identifier. IDs are monotonically increasing.
    #[must_use]
    pub fn next() -> Self {
        Self(REQUEST_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Wraps a raw identifier, e.g. one decoded from the wire.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "req-{}", self.0)
    }
}

/// A code execution request submitted through the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecuteRequest {
    /// Correlation identifier.
    pub id: RequestId,
    /// Code submitted to the kernel.
    pub code: String,
    /// Whether the kernel should suppress all output.
    pub silent: bool,
    /// Whether the execution is recorded in the kernel's history.
    pub store_history: bool,
    /// Whether an error aborts the kernel's queued executions.
    pub stop_on_error: bool,
}

impl ExecuteRequest {
    /// Builds a request with a fresh ID. Inspection traffic never stops the
    /// kernel queue on error and is kept out of the user's history.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self::with_id(RequestId::next(), code)
    }

    /// Builds a request with a specific ID.
    #[must_use]
    pub fn with_id(id: RequestId, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            silent: false,
            store_history: false,
            stop_on_error: false,
        }
    }

    /// Correlation identifier of the request.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }
}

/// Discriminant carried by every kernel message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Code is about to run (`execute_input`).
    ExecuteInput,
    /// Result of an execution (`execute_result`).
    ExecuteResult,
    /// Execution raised an error (`error`).
    Error,
    /// Text written to stdout or stderr (`stream`).
    Stream,
    /// Rich display output (`display_data`).
    DisplayData,
    /// Kernel busy/idle status (`status`).
    Status,
    /// Any other message type.
    Other(String),
}

impl MessageKind {
    /// Wire name of the message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ExecuteInput => "execute_input",
            Self::ExecuteResult => "execute_result",
            Self::Error => "error",
            Self::Stream => "stream",
            Self::DisplayData => "display_data",
            Self::Status => "status",
            Self::Other(name) => name.as_str(),
        }
    }
}

impl From<&str> for MessageKind {
    fn from(name: &str) -> Self {
        match name {
            "execute_input" => Self::ExecuteInput,
            "execute_result" => Self::ExecuteResult,
            "error" => Self::Error,
            "stream" => Self::Stream,
            "display_data" => Self::DisplayData,
            "status" => Self::Status,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name.as_str()))
    }
}

/// A message delivered by the kernel, either as a reply to one request or
/// on the broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelMessage {
    /// Message type tag.
    #[serde(rename = "msg_type")]
    pub kind: MessageKind,
    /// Request this message was produced for, when the kernel reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RequestId>,
    /// Message content.
    #[serde(default)]
    pub content: Value,
}

impl KernelMessage {
    /// Builds a message without a parent request.
    #[must_use]
    pub fn new(kind: MessageKind, content: Value) -> Self {
        Self {
            kind,
            parent_id: None,
            content,
        }
    }

    /// Attaches the request this message answers.
    #[must_use]
    pub fn with_parent(mut self, parent_id: RequestId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Builds an `execute_input` message announcing `code`.
    #[must_use]
    pub fn execute_input(code: &str) -> Self {
        Self::new(MessageKind::ExecuteInput, json!({ "code": code }))
    }

    /// Builds an `execute_result` message carrying `text` as its plain-text
    /// representation.
    #[must_use]
    pub fn execute_result(text: &str) -> Self {
        Self::new(
            MessageKind::ExecuteResult,
            json!({ "data": { "text/plain": text }, "metadata": {} }),
        )
    }

    /// Builds an `error` message.
    #[must_use]
    pub fn error(ename: &str, evalue: &str) -> Self {
        Self::new(
            MessageKind::Error,
            json!({ "ename": ename, "evalue": evalue, "traceback": [] }),
        )
    }

    /// Code announced by an `execute_input` message.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.content.get("code").and_then(Value::as_str)
    }

    /// Plain-text representation carried by result and display messages.
    #[must_use]
    pub fn plain_text(&self) -> Option<&str> {
        self.content
            .get("data")
            .and_then(|data| data.get("text/plain"))
            .and_then(Value::as_str)
    }

    /// Whether this message may belong to `request`.
    ///
    /// Messages without a parent ID are accepted; kind-based filtering is
    /// then the only guard, as with connectors that bind replies per request.
    #[must_use]
    pub fn answers(&self, request: RequestId) -> bool {
        self.parent_id.is_none_or(|parent| parent == request)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn execute_request_serialises_inspection_flags() {
        let request = ExecuteRequest::with_id(RequestId::from_raw(7), "_inspect()");
        let json = serde_json::to_value(&request).expect("serialization failed");

        assert_eq!(
            json,
            json!({
                "id": 7,
                "code": "_inspect()",
                "silent": false,
                "store_history": false,
                "stop_on_error": false
            })
        );
    }

    #[rstest]
    fn request_ids_increase() {
        let first = RequestId::next();
        let second = RequestId::next();
        assert!(second > first);
    }

    #[rstest]
    #[case("execute_input", MessageKind::ExecuteInput)]
    #[case("execute_result", MessageKind::ExecuteResult)]
    #[case("error", MessageKind::Error)]
    #[case("comm_open", MessageKind::Other(String::from("comm_open")))]
    fn decodes_message_kinds(#[case] wire: &str, #[case] expected: MessageKind) {
        let json = format!(r#"{{"msg_type":"{wire}","content":{{}}}}"#);
        let message: KernelMessage = serde_json::from_str(&json).expect("parse failed");
        assert_eq!(message.kind, expected);
        assert_eq!(message.kind.as_str(), wire);
    }

    #[rstest]
    fn extracts_code_and_plain_text() {
        assert_eq!(KernelMessage::execute_input("x = 1").code(), Some("x = 1"));
        assert_eq!(
            KernelMessage::execute_result("'[]'").plain_text(),
            Some("'[]'")
        );
        assert_eq!(KernelMessage::error("E", "v").plain_text(), None);
    }

    #[rstest]
    fn unparented_messages_answer_any_request() {
        let request = RequestId::from_raw(3);
        let other = RequestId::from_raw(4);
        let message = KernelMessage::execute_result("1");

        assert!(message.answers(request));
        assert!(message.clone().with_parent(request).answers(request));
        assert!(!message.with_parent(other).answers(request));
    }
}
