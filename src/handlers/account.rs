//! `Account_Check` and `Account_Auth`.
//!
//! Both read the identity the router injected (`SessionKey`, `AccountId`)
//! rather than holding a session themselves.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::handlers::{reply, server_time_ticks, session_key};
use crate::protocol::{decode_legacy_packet, BoxError, ProtocolCode};

pub const CHECK: &str = "Account_Check";
pub const CHECK_CODE: ProtocolCode = 10002;
pub const AUTH: &str = "Account_Auth";
pub const AUTH_CODE: ProtocolCode = 10003;

const AUTH_TOKEN_LEN: usize = 32;
const NICKNAME_MODULUS: i64 = 100_000_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CheckResponse {
    protocol: ProtocolCode,
    result_state: i32,
    session_key: Value,
    account_id: Value,
    server_time_ticks: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AccountInfo {
    account_id: i64,
    account_server_id: i64,
    nickname: String,
    level: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AuthResponse {
    protocol: ProtocolCode,
    result_state: i32,
    session_key: Value,
    account_id: i64,
    auth_token: String,
    account_info: AccountInfo,
    server_time_ticks: i64,
}

pub async fn check(packet: String) -> Result<Vec<u8>, BoxError> {
    let request = decode_legacy_packet(&packet)?;
    let response = CheckResponse {
        protocol: CHECK_CODE,
        result_state: 1,
        session_key: session_key(&request),
        account_id: request.get("AccountId").cloned().unwrap_or(Value::Null),
        server_time_ticks: server_time_ticks(),
    };
    reply(CHECK, &response)
}

pub async fn auth(packet: String) -> Result<Vec<u8>, BoxError> {
    let request = decode_legacy_packet(&packet)?;
    let session_key = session_key(&request);

    let account_id = request
        .get("AccountId")
        .and_then(Value::as_i64)
        .ok_or("Account_Auth packet has no numeric AccountId")?;
    let account_server_id = session_key
        .get("AccountServerId")
        .and_then(Value::as_i64)
        .unwrap_or(1);
    let mx_token = session_key
        .get("MxToken")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let response = AuthResponse {
        protocol: AUTH_CODE,
        result_state: 1,
        account_id,
        auth_token: auth_token(account_id, mx_token),
        account_info: AccountInfo {
            account_id,
            account_server_id,
            nickname: format!("Player_{}", account_id % NICKNAME_MODULUS),
            level: 1,
        },
        session_key,
        server_time_ticks: server_time_ticks(),
    };
    tracing::debug!(account_id, account_server_id, "Account authenticated");
    reply(AUTH, &response)
}

/// First 32 characters of base64(SHA-256("{account_id}:{mx_token}")).
fn auth_token(account_id: i64, mx_token: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", account_id, mx_token).as_bytes());
    let mut token = BASE64.encode(digest);
    token.truncate(AUTH_TOKEN_LEN);
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_legacy_packet, ServerPacket};
    use serde_json::json;

    /// Inner payload of a handler reply.
    fn unwrap_reply(bytes: Vec<u8>) -> Value {
        let outer: ServerPacket = serde_json::from_slice(&bytes).unwrap();
        serde_json::from_str(&outer.packet).unwrap()
    }

    fn enriched() -> String {
        encode_legacy_packet(&json!({
            "SessionKey": {"AccountServerId": 42, "MxToken": "tok"},
            "AccountId": 1234567890123_i64,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_check_echoes_identity() {
        let inner = unwrap_reply(check(enriched()).await.unwrap());
        assert_eq!(inner["ResultState"], 1);
        assert_eq!(inner["AccountId"], 1234567890123_i64);
        assert_eq!(inner["SessionKey"]["MxToken"], "tok");
        assert_eq!(inner["Protocol"], CHECK_CODE);
    }

    #[tokio::test]
    async fn test_auth_is_deterministic_per_identity() {
        let first = unwrap_reply(auth(enriched()).await.unwrap());
        let second = unwrap_reply(auth(enriched()).await.unwrap());
        assert_eq!(first["AuthToken"], second["AuthToken"]);
        assert_eq!(first["AuthToken"].as_str().unwrap().len(), AUTH_TOKEN_LEN);
        assert_eq!(first["AccountInfo"]["Nickname"], "Player_67890123");
        assert_eq!(first["AccountInfo"]["AccountServerId"], 42);
        assert_eq!(first["AccountInfo"]["Level"], 1);
    }

    #[tokio::test]
    async fn test_auth_requires_account_id() {
        let packet = encode_legacy_packet(&json!({"SessionKey": {}})).unwrap();
        let err = auth(packet).await.unwrap_err();
        assert!(err.to_string().contains("AccountId"));
    }

    #[test]
    fn test_auth_token_depends_on_token() {
        assert_ne!(auth_token(1, "a"), auth_token(1, "b"));
        assert_eq!(auth_token(7, "x"), auth_token(7, "x"));
    }
}
