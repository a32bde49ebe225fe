//! `Queue_GetTicket`: admits the client straight through the login queue.

use rand::Rng;
use serde::Serialize;

use crate::handlers::{reply, server_time_ticks};
use crate::protocol::{decode_legacy_packet, BoxError, ProtocolCode};

pub const GET_TICKET: &str = "Queue_GetTicket";
pub const GET_TICKET_CODE: ProtocolCode = 10001;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetTicketResponse {
    protocol: ProtocolCode,
    enter_ticket: String,
    ticket_sequence: i32,
    allowed_sequence: i32,
    required_seconds_per_user: i32,
    server_seed: i32,
    server_time_ticks: i64,
}

impl GetTicketResponse {
    fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let ticket: [u8; 8] = rng.gen();
        let ticket_sequence = rng.gen_range(1000..10000);
        Self {
            protocol: GET_TICKET_CODE,
            enter_ticket: format!("TICKET_{}", hex(&ticket)),
            ticket_sequence,
            // always admitted: the allowed sequence is at or past ours
            allowed_sequence: ticket_sequence,
            required_seconds_per_user: rng.gen_range(10..60),
            server_seed: rng.gen_range(100_000_000..1_000_000_000),
            server_time_ticks: server_time_ticks(),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

pub async fn get_ticket(packet: String) -> Result<Vec<u8>, BoxError> {
    // Validates the packet; the queue ignores its contents.
    decode_legacy_packet(&packet)?;
    let response = GetTicketResponse::generate();
    tracing::debug!(
        enter_ticket = %response.enter_ticket,
        ticket_sequence = response.ticket_sequence,
        "Issued queue ticket"
    );
    reply(GET_TICKET, &response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_legacy_packet, ServerPacket};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_ticket_admits_immediately() {
        let packet = encode_legacy_packet(&json!({"AccountId": 1})).unwrap();
        let bytes = get_ticket(packet).await.unwrap();
        let outer: ServerPacket = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(outer.protocol, GET_TICKET);

        let inner: Value = serde_json::from_str(&outer.packet).unwrap();
        assert_eq!(inner["Protocol"], GET_TICKET_CODE);
        assert!(inner["EnterTicket"].as_str().unwrap().starts_with("TICKET_"));
        assert!(inner["AllowedSequence"].as_i64() >= inner["TicketSequence"].as_i64());
        assert!(inner["ServerTimeTicks"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_rejects_garbage_packet() {
        assert!(get_ticket("not base64!".to_string()).await.is_err());
    }
}
