//! Framed-stream back-end, wrapping `telemetry_ws::WsClient`. Two sub-modes chosen once at
//! init: `raw` sends the JSON payload as a single binary frame verbatim; `kv` wraps it in a
//! length-prefixed `(session, payload)` tuple before framing it.

use super::Transport;
use crate::error::{RuntimeError, SetupError};
use crate::logging::{self, Logger};
use telemetry_ws::{Received, WsClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Raw,
    Kv,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub resource: String,
    pub subprotocol: String,
    pub tls: bool,
    pub tls_insecure: bool,
    pub mode: StreamMode,
}

/// Wraps the length-prefixed `key | value` tuple used for kv-mode frames: a 16-bit big-endian
/// key length, the key bytes, a 16-bit big-endian value length, then the value bytes.
/// Big-endian unconditionally on both fields, regardless of host byte order.
fn encode_kv(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(4 + key.len() + value.len());
    blob.push((key.len() >> 8) as u8);
    blob.push((key.len() & 0xFF) as u8);
    blob.extend_from_slice(key);
    blob.push((value.len() >> 8) as u8);
    blob.push((value.len() & 0xFF) as u8);
    blob.extend_from_slice(value);
    blob
}

pub struct FramedStreamTransport {
    config: StreamConfig,
    client: WsClient,
    session_key: Vec<u8>,
    log: Logger,
}

impl FramedStreamTransport {
    pub fn new(config: StreamConfig, log: Logger) -> FramedStreamTransport {
        FramedStreamTransport {
            config,
            client: WsClient::new(),
            session_key: Vec::new(),
            log,
        }
    }
}

impl Transport for FramedStreamTransport {
    fn set_session_key(&mut self, key: &[u8]) {
        self.session_key = key.to_vec();
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

        logging::info!(self.log, "telemetry framed-stream back-end connected";
            "host" => self.config.host.clone(), "port" => self.config.port);
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.client.close();
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, RuntimeError> {
        let payload = match self.config.mode {
            StreamMode::Raw => bytes.to_vec(),
            StreamMode::Kv => encode_kv(&self.session_key, bytes),
        };

        self.client.send(&payload)?;
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RuntimeError> {
        match self.client.recv(buf) {
            Ok(Received::Binary(n)) | Ok(Received::Pong(n)) => Ok(n),
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
    fn kv_encoding_round_trips_both_parts() {
        let key = b"abcdef0123456789abcdef01";
        let value = br#"{"counter":0}"#;
        let blob = encode_kv(key, value);

        let key_len = ((blob[0] as usize) << 8) | blob[1] as usize;
        let key_bytes = &blob[2..2 + key_len];
        let value_offset = 2 + key_len;
        let value_len = ((blob[value_offset] as usize) << 8) | blob[value_offset + 1] as usize;
        let value_bytes = &blob[value_offset + 2..value_offset + 2 + value_len];

        assert_eq!(key_bytes, key);
        assert_eq!(value_bytes, value);
    }
}
