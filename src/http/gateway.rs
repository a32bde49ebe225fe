//! Gateway endpoint orchestration.
//!
//! # Responsibilities
//! - Extract the `mx`/`mx.dat` upload and decode it through the codec pipeline
//! - Resolve the session from its cookie and capture inbound cookies
//! - Dispatch through the protocol router, turning post-decode failures into error envelopes
//! - Encode the reply and reissue session cookies on every response

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::error::GatewayResult;
use crate::http::response::{encode_reply, json_error};
use crate::http::server::AppState;
use crate::multipart::extract_mx_part;
use crate::observability::metrics;
use crate::protocol::{GameRequest, ServerPacket};
use crate::session::{write_session_cookies, CookiePolicy, GameSession};

const MX_TOKEN_HEADER: &str = "mxtoken";
const FORWARDED_PROTO: &str = "x-forwarded-proto";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// `POST {gateway.path}`
pub async fn gateway_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle(state, None, jar, headers, body).await
}

/// `POST {gateway.path}/{*alias}`: the protocol comes from the path.
pub async fn gateway_alias_handler(
    State(state): State<AppState>,
    Path(alias): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle(state, Some(alias), jar, headers, body).await
}

async fn handle(
    state: AppState,
    alias: Option<String>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    // Transport-level failures: the request never reached a protocol.
    let mut request = match decode_request(&state, &headers, &body, &request_id, alias.is_some()) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected gateway request");
            metrics::record_request("unknown", e.kind(), start);
            return json_error(StatusCode::BAD_REQUEST, e.to_string());
        }
    };
    if let Some(alias) = alias.as_deref() {
        force_protocol(&state, &mut request, alias);
    }

    let cookie_name = &state.session_config.cookie_name;
    let (session, outcome) = state
        .sessions
        .get_or_create(jar.get(cookie_name).map(|c| c.value()));
    let captured = state
        .sessions
        .capture_cookies(&session, jar.iter().map(|c| (c.name(), c.value())));

    tracing::debug!(
        request_id = %request_id,
        protocol = %request.identifier(),
        session_id = %session.id(),
        session = outcome.as_str(),
        captured,
        "Routing gateway request"
    );

    let header_token = headers.get(MX_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    let (reply, outcome) = match dispatch(&state, &request, &session, header_token).await {
        Ok(reply) => (reply, "ok"),
        Err(e) if !e.is_payload_level() => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected gateway request");
            metrics::record_request(&request.identifier(), e.kind(), start);
            return json_error(StatusCode::BAD_REQUEST, e.to_string());
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                protocol = %request.identifier(),
                session_id = %session.id(),
                error = %e,
                "Protocol dispatch failed"
            );
            (ServerPacket::error(&e.to_string()), e.kind())
        }
    };

    let response = match encode_reply(&state.pipeline, state.endpoint.response_style, &reply) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to encode reply");
            metrics::record_request(&reply.protocol, "encode_error", start);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let policy = CookiePolicy {
        secure: state.tls || forwarded_https(&headers),
        ttl: state.sessions.ttl(),
    };
    let jar = write_session_cookies(
        jar,
        cookie_name,
        &session,
        &state.session_config.static_cookies,
        policy,
    );

    metrics::record_request(&request.identifier(), outcome, start);
    (jar, response).into_response()
}

/// Multipart → codec → `GameRequest`.
fn decode_request(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    request_id: &str,
    addressed: bool,
) -> GatewayResult<GameRequest> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let part = extract_mx_part(content_type, body)?;

    let (text, trace) = state.pipeline.decode(&part.bytes)?;
    metrics::record_decode(&trace);
    tracing::debug!(
        request_id = %request_id,
        part = %part.name,
        bytes = part.bytes.len(),
        base64 = part.was_base64,
        trace = %trace,
        "Decoded upload"
    );

    let request = if addressed {
        GameRequest::parse_addressed(&text, request_id)?
    } else {
        GameRequest::parse(&text, request_id)?
    };
    Ok(request)
}

/// Path alias first; a bare segment may also be a hash alias.
fn force_protocol(state: &AppState, request: &mut GameRequest, alias: &str) {
    let registry = state.router.registry();
    let resolved = registry.resolve_name(alias).or_else(|| {
        if alias.contains('/') || alias.contains('_') {
            None
        } else {
            registry.resolve_hash(alias)
        }
    });

    match resolved {
        Some(entry) => {
            request.protocol = Some(entry.descriptor.name.clone());
            request.protocol_code = Some(entry.descriptor.code);
        }
        None => {
            request.protocol = Some(alias.to_string());
            request.protocol_code = None;
        }
    }
}

async fn dispatch(
    state: &AppState,
    request: &GameRequest,
    session: &GameSession,
    header_token: Option<&str>,
) -> GatewayResult<ServerPacket> {
    let reply = state.router.route(request, session, header_token).await?;
    Ok(reply.to_server_packet())
}

fn forwarded_https(headers: &HeaderMap) -> bool {
    headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_https() {
        let mut headers = HeaderMap::new();
        assert!(!forwarded_https(&headers));
        headers.insert(FORWARDED_PROTO, HeaderValue::from_static("HTTPS, http"));
        assert!(forwarded_https(&headers));
        headers.insert(FORWARDED_PROTO, HeaderValue::from_static("http"));
        assert!(!forwarded_https(&headers));
    }
}
