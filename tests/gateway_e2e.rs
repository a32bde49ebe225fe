//! End-to-end tests through the HTTP surface.

use std::net::SocketAddr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use mx_gateway::codec::{CodecPipeline, CryptoKey};
use mx_gateway::config::schema::{CryptoAlgorithm, ResponseStyle};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

mod common;

use common::{client, mx_form, start_gateway, unwrap_reply};

async fn post_json(client: &reqwest::Client, url: &str, request: &Value) -> reqwest::Response {
    client
        .post(url)
        .multipart(mx_form(request.to_string().as_bytes()))
        .send()
        .await
        .expect("Gateway unreachable")
}

#[tokio::test]
async fn test_account_check_keeps_session_identity() {
    let addr: SocketAddr = "127.0.0.1:28301".parse().unwrap();
    let gateway = start_gateway(addr, |_| {}).await;
    let client = client(true);
    let request = json!({"Protocol": "Account_Check", "Payload": {}});

    let res = post_json(&client, &gateway.gateway_url(), &request).await;
    assert_eq!(res.status(), 200);
    assert!(res
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .any(|c| c.to_str().unwrap().starts_with("uuid=")));
    let (protocol, first) = unwrap_reply(&res.bytes().await.unwrap());
    assert_eq!(protocol, "Account_Check");
    assert_eq!(first["ResultState"], 1);
    assert!(first["SessionKey"]["MxToken"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(first["AccountId"].as_i64().unwrap() > 0);

    let res = post_json(&client, &gateway.gateway_url(), &request).await;
    let (_, second) = unwrap_reply(&res.bytes().await.unwrap());
    assert_eq!(second["SessionKey"]["MxToken"], first["SessionKey"]["MxToken"]);
    assert_eq!(second["AccountId"], first["AccountId"]);
    assert_eq!(second["SessionKey"]["AccountServerId"], first["SessionKey"]["AccountServerId"]);

    let health: Value = client.get(gateway.url("/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health["sessions"], 1);
}

#[tokio::test]
async fn test_client_token_is_captured_once() {
    let addr: SocketAddr = "127.0.0.1:28302".parse().unwrap();
    let gateway = start_gateway(addr, |_| {}).await;
    let client = client(true);

    let res = post_json(
        &client,
        &gateway.gateway_url(),
        &json!({"Protocol": "Account_Check", "Payload": {"SessionKey": {"MxToken": "client-token"}}}),
    )
    .await;
    let (_, first) = unwrap_reply(&res.bytes().await.unwrap());
    assert_eq!(first["SessionKey"]["MxToken"], "client-token");

    let res = post_json(
        &client,
        &gateway.gateway_url(),
        &json!({"Protocol": "Account_Check", "Payload": {"SessionKey": {"MxToken": "rotated"}}}),
    )
    .await;
    let (_, second) = unwrap_reply(&res.bytes().await.unwrap());
    assert_eq!(second["SessionKey"]["MxToken"], "client-token");
}

#[tokio::test]
async fn test_missing_part_is_rejected() {
    let addr: SocketAddr = "127.0.0.1:28303".parse().unwrap();
    let gateway = start_gateway(addr, |_| {}).await;

    let form = Form::new().part("upload", Part::text("{}"));
    let res = client(false)
        .post(gateway.gateway_url())
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("mx"));
}

#[tokio::test]
async fn test_unrelated_part_is_skipped() {
    let addr: SocketAddr = "127.0.0.1:28304".parse().unwrap();
    let gateway = start_gateway(addr, |_| {}).await;

    let request = json!({"Protocol": "Account_Check"}).to_string();
    let form = Form::new()
        .part("meta", Part::text("not the upload"))
        .part("mx", Part::text(BASE64.encode(request)).file_name("mx.dat"));
    let res = client(false).post(gateway.gateway_url()).multipart(form).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let (protocol, _) = unwrap_reply(&res.bytes().await.unwrap());
    assert_eq!(protocol, "Account_Check");
}

#[tokio::test]
async fn test_unknown_protocol_returns_error_envelope() {
    let addr: SocketAddr = "127.0.0.1:28305".parse().unwrap();
    let gateway = start_gateway(addr, |_| {}).await;

    let res = post_json(&client(false), &gateway.gateway_url(), &json!({"Protocol": "Nope_Missing"})).await;
    assert_eq!(res.status(), 200);
    let (protocol, inner) = unwrap_reply(&res.bytes().await.unwrap());
    assert_eq!(protocol, "Error");
    assert!(inner["error"].as_str().unwrap().contains("Nope_Missing"));
}

#[tokio::test]
async fn test_undecodable_upload_is_rejected() {
    let addr: SocketAddr = "127.0.0.1:28306".parse().unwrap();
    let gateway = start_gateway(addr, |_| {}).await;

    let res = client(false)
        .post(gateway.gateway_url())
        .multipart(mx_form(b"\x01\x02 definitely not json"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid payload"));
}

#[tokio::test]
async fn test_encrypted_compressed_round_trip() {
    let addr: SocketAddr = "127.0.0.1:28307".parse().unwrap();
    let key = CryptoKey::generate().to_base64();
    let mut codec = None;
    let gateway = start_gateway(addr, |config| {
        config.codec.crypto.enabled = true;
        config.codec.crypto.key = Some(key.clone());
        config.codec.crypto.algorithm = CryptoAlgorithm::ChaCha20Poly1305;
        config.codec.compression.enabled = true;
        config.gateway.response_style = ResponseStyle::JsonEnvelope;
        codec = Some(config.codec.clone());
    })
    .await;
    let pipeline = CodecPipeline::from_config(&codec.unwrap()).unwrap();

    let blob = pipeline
        .encode(&json!({"Protocol": "Account_Auth", "Payload": {}}).to_string())
        .unwrap();
    let res = client(false)
        .post(gateway.gateway_url())
        .multipart(mx_form(&blob.bytes))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let envelope: Value = res.json().await.unwrap();
    assert_eq!(envelope["protocol"], "Account_Auth");
    let reply = BASE64.decode(envelope["packet"].as_str().unwrap()).unwrap();
    let (text, trace) = pipeline.decode(&reply).unwrap();
    assert_eq!(trace.to_string(), "decrypt:chacha20-poly1305+decompress:deflate");

    let inner: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(inner["AuthToken"].as_str().unwrap().len(), 32);
    let account_id = inner["AccountId"].as_i64().unwrap();
    assert_eq!(
        inner["AccountInfo"]["Nickname"],
        format!("Player_{}", account_id % 100_000_000)
    );

    let snapshot = gateway.snapshots.get(account_id).expect("snapshot recorded");
    assert_eq!(snapshot.level, Some(1));
}

#[tokio::test]
async fn test_path_and_hash_addressed_routes() {
    let addr: SocketAddr = "127.0.0.1:28308".parse().unwrap();
    let gateway = start_gateway(addr, |_| {}).await;
    let client = client(false);

    let body = json!({"Payload": {}});
    let res = post_json(&client, &gateway.url("/api/gateway/account/check"), &body).await;
    let (protocol, _) = unwrap_reply(&res.bytes().await.unwrap());
    assert_eq!(protocol, "Account_Check");

    let res = post_json(&client, &gateway.url("/api/gateway/AHTQLQI65FWJGGGK4KL5AEF57A"), &body).await;
    let (protocol, _) = unwrap_reply(&res.bytes().await.unwrap());
    assert_eq!(protocol, "Account_Auth");

    // The path wins over identifiers in the body.
    let res = post_json(
        &client,
        &gateway.url("/api/gateway/queue/getticket"),
        &json!({"Protocol": "Account_Check"}),
    )
    .await;
    let (protocol, inner) = unwrap_reply(&res.bytes().await.unwrap());
    assert_eq!(protocol, "Queue_GetTicket");
    assert!(inner["EnterTicket"].is_string());
}

#[tokio::test]
async fn test_cookies_are_captured_and_replayed() {
    let addr: SocketAddr = "127.0.0.1:28309".parse().unwrap();
    let gateway = start_gateway(addr, |config| {
        config
            .session
            .static_cookies
            .insert("AWSALBCORS".to_string(), "cors-1".to_string());
    })
    .await;

    let res = client(false)
        .post(gateway.gateway_url())
        .header(COOKIE, "AWSALB=node-7; _ga=GA1.2.3; .AspNetCore.Session=abc")
        .multipart(mx_form(json!({"Protocol": "Account_Check"}).to_string().as_bytes()))
        .send()
        .await
        .unwrap();

    let cookies: Vec<String> = res
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|c| c.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("uuid=") && c.contains("SameSite=Lax")));
    assert!(cookies.iter().any(|c| c.starts_with("AWSALB=node-7")));
    assert!(cookies.iter().any(|c| c.starts_with("AWSALBCORS=cors-1")));
    assert!(!cookies.iter().any(|c| c.starts_with("_ga=")));
    assert!(!cookies.iter().any(|c| c.starts_with(".AspNetCore.Session=")));
}

#[tokio::test]
async fn test_forwarded_https_uses_samesite_none() {
    let addr: SocketAddr = "127.0.0.1:28310".parse().unwrap();
    let gateway = start_gateway(addr, |_| {}).await;

    let res = client(false)
        .post(gateway.gateway_url())
        .header("X-Forwarded-Proto", "https")
        .multipart(mx_form(json!({"Protocol": "Account_Check"}).to_string().as_bytes()))
        .send()
        .await
        .unwrap();
    let session_cookie = res
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|c| c.to_str().unwrap().to_string())
        .find(|c| c.starts_with("uuid="))
        .unwrap();
    assert!(session_cookie.contains("SameSite=None"));
    assert!(session_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_health_and_protocol_list() {
    let addr: SocketAddr = "127.0.0.1:28311".parse().unwrap();
    let gateway = start_gateway(addr, |_| {}).await;
    let client = client(false);

    let res = client.get(gateway.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let health: Value = res.json().await.unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["protocols"], 3);
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    let protocols: Vec<Value> = client
        .get(gateway.url("/api/gateway/protocols"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let codes: Vec<i64> = protocols.iter().map(|p| p["code"].as_i64().unwrap()).collect();
    assert_eq!(codes, vec![10001, 10002, 10003]);
    assert_eq!(protocols[2]["hash_alias"], "AHTQLQI65FWJGGGK4KL5AEF57A");
    assert_eq!(protocols[1]["path_alias"], "account/check");
}
