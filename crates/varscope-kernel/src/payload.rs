//! Decoding of kernel reply payloads.
//!
//! Kernels answer inspection queries by returning a JSON document as the
//! plain-text representation of a string value, so the text usually arrives
//! wrapped in the language's string quotes with embedded quotes escaped.
//! [`decode_text_payload`] undoes that wrapping before parsing.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::{KernelMessage, MessageKind};

/// Error reply reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct KernelError {
    /// Exception class name.
    #[serde(default)]
    pub ename: String,
    /// Exception message.
    #[serde(default)]
    pub evalue: String,
    /// Formatted traceback lines.
    #[serde(default)]
    pub traceback: Vec<String>,
}

impl fmt::Display for KernelError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.evalue.is_empty() {
            formatter.write_str(&self.ename)
        } else {
            write!(formatter, "{}: {}", self.ename, self.evalue)
        }
    }
}

/// Failures while decoding a reply payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The message carried no plain-text representation.
    #[error("{kind} message carries no text/plain payload")]
    MissingText {
        /// Kind of the offending message.
        kind: MessageKind,
    },

    /// The unwrapped text was not valid JSON.
    #[error("payload is not valid JSON: {source}")]
    InvalidJson {
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The JSON did not describe a table.
    #[error("payload is not a table description: {source}")]
    InvalidTable {
        /// Deserialisation error.
        #[source]
        source: serde_json::Error,
    },
}

/// Classified reply message.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelReply {
    /// An `execute_result` whose payload decoded to structured data.
    Update(Value),
    /// An `error` reply.
    Error(KernelError),
    /// Any other message kind; callers ignore these.
    Unrecognised(MessageKind),
}

impl KernelReply {
    /// Classifies `message` by kind, decoding result payloads.
    ///
    /// # Errors
    ///
    /// Returns a [`PayloadError`] when an `execute_result` lacks text or
    /// its text does not decode to JSON.
    pub fn classify(message: &KernelMessage) -> Result<Self, PayloadError> {
        match &message.kind {
            MessageKind::ExecuteResult => {
                let text = message
                    .plain_text()
                    .ok_or_else(|| PayloadError::MissingText {
                        kind: message.kind.clone(),
                    })?;
                decode_text_payload(text).map(Self::Update)
            }
            MessageKind::Error => {
                // Malformed error content still signals failure.
                let error = serde_json::from_value(message.content.clone()).unwrap_or_default();
                Ok(Self::Error(error))
            }
            other => Ok(Self::Unrecognised(other.clone())),
        }
    }
}

/// Unwraps and parses a textual kernel payload.
///
/// # Errors
///
/// Returns [`PayloadError::InvalidJson`] when the unwrapped text is not JSON.
pub fn decode_text_payload(text: &str) -> Result<Value, PayloadError> {
    let unwrapped = unquote(text);
    serde_json::from_str(&unwrapped).map_err(|source| PayloadError::InvalidJson { source })
}

/// Strips one pair of surrounding string quotes and reverses backslash
/// escaping of quotes and backslashes inside them.
///
/// Text that does not start with `'` or `"` is returned unchanged. Unknown
/// escape sequences are left intact.
#[must_use]
pub fn unquote(text: &str) -> Cow<'_, str> {
    let mut chars = text.chars();
    let Some(open @ ('\'' | '"')) = chars.next() else {
        return Cow::Borrowed(text);
    };
    let rest = chars.as_str();
    let inner = rest.strip_suffix(open).unwrap_or(rest);
    Cow::Owned(unescape_quotes(inner))
}

fn unescape_quotes(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some(escaped @ ('\\' | '"' | '\'')) => output.push(escaped),
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn strips_single_quotes() {
        assert_eq!(unquote(r#"'{"a":1}'"#), r#"{"a":1}"#);
        assert_eq!(
            decode_text_payload(r#"'{"a":1}'"#).expect("decode failed"),
            json!({"a": 1})
        );
    }

    #[rstest]
    fn unescapes_embedded_quotes() {
        let raw = r#""{\"a\":\"b\\\"c\"}""#;
        assert_eq!(unquote(raw), r#"{"a":"b\"c"}"#);
        assert_eq!(
            decode_text_payload(raw).expect("decode failed"),
            json!({"a": "b\"c"})
        );
    }

    #[rstest]
    fn unescapes_single_quotes_inside_single_quoted_text() {
        assert_eq!(unquote(r#"'[{"name":"it\'s"}]'"#), r#"[{"name":"it's"}]"#);
    }

    #[rstest]
    #[case("[1, 2]")]
    #[case(r#"{"x":"\n"}"#)]
    fn leaves_unquoted_text_untouched(#[case] text: &str) {
        assert!(matches!(unquote(text), Cow::Borrowed(_)));
    }

    #[rstest]
    fn keeps_unknown_escapes() {
        assert_eq!(unquote(r"'a\nb'"), r"a\nb");
    }

    #[rstest]
    fn classifies_messages() {
        let update = KernelReply::classify(&KernelMessage::execute_result("'[]'"))
            .expect("classification failed");
        assert_eq!(update, KernelReply::Update(json!([])));

        let error = KernelReply::classify(&KernelMessage::error("NameError", "df"))
            .expect("classification failed");
        match error {
            KernelReply::Error(error) => assert_eq!(error.to_string(), "NameError: df"),
            other => panic!("expected error reply, got {other:?}"),
        }

        let other = KernelReply::classify(&KernelMessage::execute_input("x"))
            .expect("classification failed");
        assert_eq!(other, KernelReply::Unrecognised(MessageKind::ExecuteInput));
    }

    #[rstest]
    fn reports_malformed_results() {
        let result = KernelReply::classify(&KernelMessage::execute_result("'{not json'"));
        assert!(matches!(result, Err(PayloadError::InvalidJson { .. })));

        let missing = KernelMessage::new(MessageKind::ExecuteResult, json!({}));
        assert!(matches!(
            KernelReply::classify(&missing),
            Err(PayloadError::MissingText { .. })
        ));
    }
}
