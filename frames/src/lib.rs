//! Frame model and JSON codec for the zenith websocket protocol.
//!
//! A frame is a JSON array whose head is the command name and whose tail is
//! the positional payload: `["pager.send", {}, "hi"]`. There is no length
//! prefix or envelope; the websocket supplies message boundaries.

use serde_json::Value;

/// Error returned by [`decode_frame`]. Every variant is a malformed frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text could not be parsed as JSON.
    #[error("malformed frame: invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The text parsed, but the top-level value is not an array.
    #[error("malformed frame: expected array, got {0}")]
    NotAnArray(&'static str),
    /// The array has no command name.
    #[error("malformed frame: empty array")]
    Empty,
    /// The first element is not a string.
    #[error("malformed frame: command name must be a string, got {0}")]
    CommandNotString(&'static str),
}

/// One complete wire message: a command name followed by its payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    command: String,
    args: Vec<Value>,
}

impl Frame {
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Dot-separated command name, e.g. `"pager.message"`.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Positional payload following the command name.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    #[must_use]
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.command, self.args)
    }

    /// Encode this frame as wire text.
    #[must_use]
    pub fn encode(&self) -> String {
        encode_frame(&self.command, &self.args)
    }
}

/// Encode a command and its arguments as a compact JSON array.
#[must_use]
pub fn encode_frame(command: &str, args: &[Value]) -> String {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(Value::String(command.to_owned()));
    items.extend(args.iter().cloned());
    Value::Array(items).to_string()
}

/// Decode wire text into a frame.
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] when the text is not JSON, and the
/// remaining variants when the value is not a non-empty array headed by a
/// string.
pub fn decode_frame(text: &str) -> Result<Frame, CodecError> {
    let value = serde_json::from_str::<Value>(text)?;
    let mut items = match value {
        Value::Array(items) => items,
        other => return Err(CodecError::NotAnArray(kind_name(&other))),
    };
    if items.is_empty() {
        return Err(CodecError::Empty);
    }

    let args = items.split_off(1);
    match items.pop() {
        Some(Value::String(command)) => Ok(Frame { command, args }),
        Some(other) => Err(CodecError::CommandNotString(kind_name(&other))),
        None => Err(CodecError::Empty),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
