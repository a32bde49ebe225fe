//! Response construction.
//!
//! # Design Decisions
//! - Transport-level errors (multipart, decode) are plain JSON with a 4xx/5xx status
//! - Everything after decode travels encoded, including errors, so the client can read it
//! - The JSON-envelope style armors `packet` with base64 only when the codec transformed it

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;

use crate::codec::{CodecPipeline, CodecResult};
use crate::config::schema::ResponseStyle;
use crate::protocol::ServerPacket;

/// `{"error": message}` with the given status.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Encode `reply` for the wire in the configured style.
pub fn encode_reply(pipeline: &CodecPipeline, style: ResponseStyle, reply: &ServerPacket) -> CodecResult<Response> {
    match style {
        ResponseStyle::Opaque => {
            let encoded = pipeline.encode(&reply.to_json())?;
            Ok((
                [(header::CONTENT_TYPE, "application/octet-stream")],
                encoded.bytes,
            )
                .into_response())
        }
        ResponseStyle::JsonEnvelope => {
            let encoded = pipeline.encode(&reply.packet)?;
            let packet = if encoded.transformed {
                BASE64.encode(&encoded.bytes)
            } else {
                reply.packet.clone()
            };
            Ok(Json(json!({ "protocol": reply.protocol, "packet": packet })).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CryptoKey, DecodeTrace, DeflateAdapter, MxDataAdapter};
    use serde_json::Value;

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    fn reply() -> ServerPacket {
        ServerPacket::new("Account_Check", &json!({"ResultState": 1})).unwrap()
    }

    #[tokio::test]
    async fn test_opaque_passthrough_is_plain_json() {
        let response = encode_reply(&CodecPipeline::passthrough(), ResponseStyle::Opaque, &reply()).unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["protocol"], "Account_Check");
        assert_eq!(body["packet"], r#"{"ResultState":1}"#);
    }

    #[tokio::test]
    async fn test_envelope_armors_only_transformed_packets() {
        let plain = encode_reply(&CodecPipeline::passthrough(), ResponseStyle::JsonEnvelope, &reply()).unwrap();
        let body: Value = serde_json::from_slice(&body_bytes(plain).await).unwrap();
        assert_eq!(body["packet"], r#"{"ResultState":1}"#);

        let key = CryptoKey::generate();
        let pipeline = CodecPipeline::new(
            vec![Box::new(MxDataAdapter::new(&key))],
            vec![Box::new(DeflateAdapter::default())],
            Some(MxDataAdapter::NAME),
        )
        .unwrap();
        let armored = encode_reply(&pipeline, ResponseStyle::JsonEnvelope, &reply()).unwrap();
        let body: Value = serde_json::from_slice(&body_bytes(armored).await).unwrap();
        let blob = BASE64.decode(body["packet"].as_str().unwrap()).unwrap();
        let (text, trace) = pipeline.decode(&blob).unwrap();
        assert_eq!(text, r#"{"ResultState":1}"#);
        assert_eq!(
            trace,
            DecodeTrace {
                crypto: Some(MxDataAdapter::NAME),
                compression: Some(DeflateAdapter::NAME)
            }
        );
    }

    #[tokio::test]
    async fn test_json_error_shape() {
        let response = json_error(StatusCode::BAD_REQUEST, "no mx part");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body, json!({"error": "no mx part"}));
    }
}
