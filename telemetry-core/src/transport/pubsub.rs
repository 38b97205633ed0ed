//! Publish/subscribe overlay, optional and layered on top of the framed-stream back-end: it
//! uses `telemetry_ws::WsClient` purely as a byte-oriented transport and encodes its own
//! minimal publish/subscribe protocol on top, the way chocolate-doom's `mqtt_dws.h`/
//! `mqtt_pal_dws.c` layer an MQTT client over the same `dws` framed-stream PAL. Only what a
//! clean-session, QoS-0 publisher needs is implemented: `CONNECT`, `PUBLISH`, `DISCONNECT`.
//! Nothing here reimplements the framed-stream wire protocol itself; that is `telemetry_ws`'s
//! job.

use super::Transport;
use crate::error::{RuntimeError, SetupError};
use crate::logging::{self, Logger};
use telemetry_ws::{Received, WsClient};

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_LEVEL: u8 = 4; // MQTT 3.1.1
const CLEAN_SESSION_FLAG: u8 = 0x02;
const KEEP_ALIVE_SECS: u16 = 60;

const PACKET_CONNECT: u8 = 0x10;
const PACKET_PUBLISH: u8 = 0x30;
const PACKET_DISCONNECT: u8 = 0xE0;

#[derive(Debug, Clone)]
pub struct PubSubConfig {
    pub host: String,
    pub port: u16,
    pub resource: String,
    pub subprotocol: String,
    pub tls: bool,
    pub tls_insecure: bool,
}

/// MQTT's variable-length "remaining length" encoding: seven bits per byte, continuation bit
/// set on every byte but the last.
fn encode_remaining_length(mut len: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4);
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
        if len == 0 {
            break;
        }
    }
    bytes
}

fn encode_utf8_field(out: &mut Vec<u8>, value: &[u8]) {
    out.push((value.len() >> 8) as u8);
    out.push((value.len() & 0xFF) as u8);
    out.extend_from_slice(value);
}

/// Builds a `CONNECT` packet with the clean-session flag set and the session id as client id.
fn build_connect(client_id: &str) -> Vec<u8> {
    let mut variable_and_payload = Vec::new();
    encode_utf8_field(&mut variable_and_payload, PROTOCOL_NAME.as_bytes());
    variable_and_payload.push(PROTOCOL_LEVEL);
    variable_and_payload.push(CLEAN_SESSION_FLAG);
    variable_and_payload.push((KEEP_ALIVE_SECS >> 8) as u8);
    variable_and_payload.push((KEEP_ALIVE_SECS & 0xFF) as u8);
    encode_utf8_field(&mut variable_and_payload, client_id.as_bytes());

    let mut packet = Vec::with_capacity(variable_and_payload.len() + 2);
    packet.push(PACKET_CONNECT);
    packet.extend(encode_remaining_length(variable_and_payload.len()));
    packet.extend(variable_and_payload);
    packet
}

/// Builds a QoS-0 `PUBLISH` packet (no packet identifier) to `doom/<session>/data`.
fn build_publish(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut variable_and_payload = Vec::new();
    encode_utf8_field(&mut variable_and_payload, topic.as_bytes());
    variable_and_payload.extend_from_slice(payload);

    let mut packet = Vec::with_capacity(variable_and_payload.len() + 2);
    packet.push(PACKET_PUBLISH);
    packet.extend(encode_remaining_length(variable_and_payload.len()));
    packet.extend(variable_and_payload);
    packet
}

fn build_disconnect() -> Vec<u8> {
    vec![PACKET_DISCONNECT, 0x00]
}

/// The overlay's own transport: a second `WsClient` carrying MQTT-shaped frames instead of raw
/// JSON payloads. One active stream, same as the plain framed-stream back-end.
pub struct PubSubTransport {
    config: PubSubConfig,
    client: WsClient,
    topic: String,
    log: Logger,
}

impl PubSubTransport {
    pub fn new(config: PubSubConfig, log: Logger) -> PubSubTransport {
        PubSubTransport {
            config,
            client: WsClient::new(),
            topic: String::new(),
            log,
        }
    }
}

impl Transport for PubSubTransport {
    /// `key` is the session id bytes; the topic is `doom/<session>/data`.
    fn set_session_key(&mut self, key: &[u8]) {
        let session = String::from_utf8_lossy(key);
        self.topic = format!("doom/{}/data", session);
    }

    fn init(&mut self) -> Result<(), SetupError> {
        if self.config.tls {
            self.client
                .connect_tls(&self.config.host, self.config.port, self.config.tls_insecure)?;
        } else {
            self.client.connect(&self.config.host, self.config.port)?;
        }

        self.client
            .handshake(&self.config.resource, &self.config.subprotocol)?;

        let client_id: String = self.topic.trim_start_matches("doom/").to_string();
        let connect = build_connect(&client_id);
        self.client.send(&connect).map_err(|_| SetupError::Handshake)?;

        // Drain the CONNACK; its contents aren't decoded, only that a reply arrived matters.
        let mut ack = [0u8; 4];
        loop {
            match self.client.recv(&mut ack) {
                Ok(_) => break,
                Err(telemetry_ws::error::WsError::WantPoll) => continue,
                Err(_) => return Err(SetupError::Handshake),
            }
        }

        logging::info!(self.log, "telemetry pub/sub overlay connected"; "topic" => self.topic.clone());
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.client.send(&build_disconnect());
        let _ = self.client.close();
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, RuntimeError> {
        let publish = build_publish(&self.topic, bytes);
        self.client.send(&publish)?;
        Ok(bytes.len())
    }

    /// `WantPoll` maps to no data, `Shutdown` to connection closed, and `WantPong` is surfaced
    /// as a transport error rather than retried: a noted limitation of layering over a framed
    /// stream that also carries control traffic.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RuntimeError> {
        match self.client.recv(buf) {
            Ok(Received::Binary(n)) | Ok(Received::Pong(n)) => Ok(n),
            Err(telemetry_ws::error::WsError::WantPoll) => Err(RuntimeError::NoData),
            Err(telemetry_ws::error::WsError::Shutdown) => {
                logging::warn!(self.log, "pub/sub overlay connection closed by peer");
                Err(RuntimeError::NoData)
            }
            Err(telemetry_ws::error::WsError::WantPong) => Err(RuntimeError::UnexpectedOpcode),
            Err(err) => Err(err.into()),
        }
    }

    fn supports_read(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_packet_carries_clean_session_and_client_id() {
        let packet = build_connect("abcd1234");
        assert_eq!(packet[0], PACKET_CONNECT);

        // byte layout after the fixed header + remaining-length byte:
        // [protocol name len:2][b"MQTT"][level:1][flags:1][keep_alive:2][client id len:2][id]
        let body = &packet[2..];
        assert_eq!(&body[2..6], b"MQTT");
        assert_eq!(body[6], PROTOCOL_LEVEL);
        assert_eq!(body[7], CLEAN_SESSION_FLAG);
    }

    #[test]
    fn publish_packet_embeds_topic_and_payload() {
        let packet = build_publish("doom/abc123/data", b"{\"counter\":0}");
        assert_eq!(packet[0], PACKET_PUBLISH);

        let body = &packet[2..];
        let topic_len = ((body[0] as usize) << 8) | body[1] as usize;
        assert_eq!(&body[2..2 + topic_len], b"doom/abc123/data");
        assert_eq!(&body[2 + topic_len..], b"{\"counter\":0}");
    }

    #[test]
    fn remaining_length_encodes_small_and_large_values() {
        assert_eq!(encode_remaining_length(0), vec![0x00]);
        assert_eq!(encode_remaining_length(127), vec![0x7F]);
        assert_eq!(encode_remaining_length(128), vec![0x80, 0x01]);
    }

    #[test]
    fn session_key_builds_the_doom_topic_shape() {
        let mut transport = PubSubTransport::new(
            PubSubConfig {
                host: "127.0.0.1".to_string(),
                port: 9001,
                resource: "/telemetry".to_string(),
                subprotocol: "doom-telemetry".to_string(),
                tls: false,
                tls_insecure: false,
            },
            logging::discard(),
        );
        transport.set_session_key(b"abcdef0123456789abcdef01");
        assert_eq!(transport.topic, "doom/abcdef0123456789abcdef01/data");
    }
}
