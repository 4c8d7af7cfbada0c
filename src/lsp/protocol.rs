// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! JSON-RPC message types and Content-Length framing.

use anyhow::{Context, Result};
use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};

/// JSON-RPC protocol version sent with every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC error code for unsupported methods.
pub const METHOD_NOT_FOUND: i64 = -32601;

fn default_null() -> serde_json::Value {
    serde_json::Value::Null
}

/// A request expecting a response.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RequestMessage {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default = "default_null")]
    pub params: serde_json::Value,
}

/// A response to an earlier request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResponseMessage {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

/// A one-way message.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationMessage {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default = "default_null")]
    pub params: serde_json::Value,
}

/// Request identifier, numeric or string.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

/// Error payload of a failed response.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl RequestMessage {
    /// Builds a request with the given id.
    pub fn new(id: RequestId, method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

impl NotificationMessage {
    /// Builds a notification.
    pub fn new(method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
        }
    }
}

impl ResponseMessage {
    /// Builds the reply sent for server requests the shim does not handle.
    pub fn method_not_found(id: Option<RequestId>, method: &str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(ResponseError {
                code: METHOD_NOT_FOUND,
                message: format!("Method '{method}' not supported by client"),
                data: None,
            }),
        }
    }
}

/// Prefixes a serialized message body with its Content-Length header.
#[must_use]
pub fn frame(body: &str) -> String {
    format!("Content-Length: {}\r\n\r\n{}", body.len(), body)
}

/// Extracts one framed message from the front of `buffer`.
///
/// Returns `Ok(None)` until a complete message is buffered.
///
/// # Errors
///
/// Returns an error if the headers are not valid UTF-8, carry no usable
/// Content-Length, or the body is not valid UTF-8. The offending frame is
/// consumed, so parsing can resume with the next one.
pub fn try_parse_message(buffer: &mut BytesMut) -> Result<Option<String>> {
    let Some(header_len) = buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
        return Ok(None);
    };
    let body_start = header_len + 4;

    let content_len = match content_length(&buffer[..header_len]) {
        Ok(len) => len,
        Err(e) => {
            buffer.advance(body_start);
            return Err(e);
        }
    };

    if buffer.len() < body_start + content_len {
        return Ok(None);
    }

    buffer.advance(body_start);
    let body = buffer.split_to(content_len);
    let message = String::from_utf8(body.to_vec()).context("Message body is not UTF-8")?;
    Ok(Some(message))
}

fn content_length(headers: &[u8]) -> Result<usize> {
    let headers = std::str::from_utf8(headers).context("Failed to parse headers as UTF-8")?;

    let mut content_length = None;
    for line in headers.lines() {
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            content_length = Some(
                value
                    .trim()
                    .parse::<usize>()
                    .context("Invalid Content-Length header")?,
            );
        }
    }

    content_length.context("Missing Content-Length header")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_framed_message() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        let mut buffer = BytesMut::from(frame(body).as_str());

        let result = try_parse_message(&mut buffer).unwrap();
        assert_eq!(result, Some(body.to_string()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_parse_waits_for_complete_body() {
        let mut buffer = BytesMut::from("Content-Length: 10\r\n");
        assert_eq!(try_parse_message(&mut buffer).unwrap(), None);

        let mut buffer = BytesMut::from("Content-Length: 100\r\n\r\n{\"partial\":");
        assert_eq!(try_parse_message(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_parse_back_to_back_messages() {
        let first = r#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let second = r#"{"jsonrpc":"2.0","method":"window/logMessage","params":{}}"#;
        let raw = format!("{}{}", frame(first), frame(second));
        let mut buffer = BytesMut::from(raw.as_str());

        assert_eq!(try_parse_message(&mut buffer).unwrap(), Some(first.to_string()));
        assert_eq!(try_parse_message(&mut buffer).unwrap(), Some(second.to_string()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_missing_content_length_skips_header_block() {
        let body = r#"{"jsonrpc":"2.0","id":2,"result":null}"#;
        let raw = format!("Content-Type: application/json\r\n\r\n{}", frame(body));
        let mut buffer = BytesMut::from(raw.as_str());

        assert!(try_parse_message(&mut buffer).is_err());
        assert_eq!(try_parse_message(&mut buffer).unwrap(), Some(body.to_string()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_invalid_content_length_skips_header_block() {
        let body = r#"{"ok":true}"#;
        let raw = format!("Content-Length: lots\r\n\r\n{}", frame(body));
        let mut buffer = BytesMut::from(raw.as_str());

        assert!(try_parse_message(&mut buffer).is_err());
        assert_eq!(try_parse_message(&mut buffer).unwrap(), Some(body.to_string()));
    }

    #[test]
    fn test_parse_lowercase_header() {
        let body = r#"{"test":true}"#;
        let raw = format!("content-length: {}\r\n\r\n{}", body.len(), body);
        let mut buffer = BytesMut::from(raw.as_str());

        assert_eq!(try_parse_message(&mut buffer).unwrap(), Some(body.to_string()));
    }

    #[test]
    fn test_request_serializes_with_version() {
        let request = RequestMessage::new(RequestId::Number(7), "shutdown", serde_json::Value::Null);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "shutdown");
    }

    #[test]
    fn test_method_not_found_reply() {
        let reply = ResponseMessage::method_not_found(
            Some(RequestId::String("cfg-1".to_string())),
            "workspace/configuration",
        );
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(value["id"], "cfg-1");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_null_result_deserializes_to_none() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let msg: ResponseMessage = serde_json::from_str(json).unwrap();
        assert!(msg.result.is_none());
        assert!(msg.error.is_none());
    }
}
