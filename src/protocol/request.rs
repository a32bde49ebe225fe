//! Decoded client request.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::descriptor::ProtocolCode;

const PROTOCOL_KEYS: &[&str] = &["Protocol"];
const CODE_KEYS: &[&str] = &["protocol_code", "ProtocolCode"];
const PAYLOAD_KEYS: &[&str] = &["Payload", "data"];
const REQUEST_ID_KEYS: &[&str] = &["RequestId", "request_id"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("request must be a JSON object")]
    NotAnObject,

    #[error("request carries neither a protocol name nor a protocol code")]
    MissingProtocol,

    #[error("request is not valid JSON: {0}")]
    Json(String),
}

/// A protocol call as sent by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRequest {
    pub protocol: Option<String>,
    pub protocol_code: Option<ProtocolCode>,
    pub payload: Value,
    /// Correlation id.
    pub request_id: String,
}

impl GameRequest {
    /// Parse decoded JSON text. `fallback_request_id` is used when the body has none.
    pub fn parse(text: &str, fallback_request_id: &str) -> Result<Self, RequestError> {
        Self::parse_inner(text, fallback_request_id, true)
    }

    /// Like [`parse`](Self::parse) for requests whose protocol comes from the
    /// URL: the body may omit both identifiers.
    pub fn parse_addressed(text: &str, fallback_request_id: &str) -> Result<Self, RequestError> {
        Self::parse_inner(text, fallback_request_id, false)
    }

    fn parse_inner(text: &str, fallback_request_id: &str, require_protocol: bool) -> Result<Self, RequestError> {
        let value: Value = serde_json::from_str(text).map_err(|e| RequestError::Json(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(RequestError::NotAnObject);
        };

        let mut protocol = None;
        let mut protocol_code = None;
        match field(&fields, PROTOCOL_KEYS) {
            Some(Value::String(s)) if !s.trim().is_empty() => match s.trim().parse::<ProtocolCode>() {
                Ok(code) => protocol_code = Some(code),
                Err(_) => protocol = Some(s.trim().to_string()),
            },
            Some(Value::Number(n)) => protocol_code = n.as_i64().and_then(|c| ProtocolCode::try_from(c).ok()),
            _ => {}
        }
        if protocol_code.is_none() {
            protocol_code = field(&fields, CODE_KEYS).and_then(as_code);
        }
        if require_protocol && protocol.is_none() && protocol_code.is_none() {
            return Err(RequestError::MissingProtocol);
        }

        let payload = match field(&fields, PAYLOAD_KEYS) {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
            Some(other) => other.clone(),
        };

        let request_id = match field(&fields, REQUEST_ID_KEYS) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => fallback_request_id.to_string(),
        };

        Ok(Self {
            protocol,
            protocol_code,
            payload,
            request_id,
        })
    }

    /// Human-readable identifier for logs and errors.
    pub fn identifier(&self) -> String {
        match (&self.protocol, self.protocol_code) {
            (Some(name), _) => name.clone(),
            (None, Some(code)) => code.to_string(),
            (None, None) => "<none>".to_string(),
        }
    }
}

/// Case-insensitive lookup over several candidate keys.
fn field<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| {
        fields
            .get(*key)
            .or_else(|| fields.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v))
    })
}

fn as_code(value: &Value) -> Option<ProtocolCode> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|c| ProtocolCode::try_from(c).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
