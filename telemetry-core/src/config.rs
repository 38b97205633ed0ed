//! Configuration types. These are the shape the host's config-binding facility is expected to
//! hand to `init_telemetry`; the facility itself is an out-of-scope collaborator, so this
//! crate only defines the target type and, for the demo binary, a `serdeconv::from_toml_file`
//! loader matching `gamecore::config::GameConfig::load`.

use serde_derive::{Deserialize, Serialize};
use std::path::Path;

/// Which back-end `init_telemetry` installs. Mirrors the host's `telemetry_mode` integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryMode {
    File = 1,
    Datagram = 2,
    Broker = 3,
    FramedStream = 4,
    PubSubOverlay = 5,
}

impl TelemetryMode {
    pub fn from_i32(value: i32) -> Option<TelemetryMode> {
        Some(match value {
            1 => TelemetryMode::File,
            2 => TelemetryMode::Datagram,
            3 => TelemetryMode::Broker,
            4 => TelemetryMode::FramedStream,
            5 => TelemetryMode::PubSubOverlay,
            _ => return None,
        })
    }
}

/// `telemetry_kafka_sasl_mechanism`: 0=plain, 1=sha256, 2=sha512.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaslMechanismId {
    Plain = 0,
    Sha256 = 1,
    Sha512 = 2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for UdpConfig {
    fn default() -> UdpConfig {
        UdpConfig { host: "127.0.0.1".to_string(), port: 9999 }
    }
}

/// SASL credentials, only meaningful when `sasl_mechanism` is set. Built into the crate rather
/// than gated behind a feature flag.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    pub ssl: bool,
    pub sasl_mechanism: Option<SaslMechanismId>,
    pub username: String,
    pub password: String,
    /// The feedback topic the broker back-end's `read` subscribes to. Left unset, the
    /// back-end simply never supports `read`.
    pub feedback_topic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    pub host: String,
    pub port: u16,
    pub resource: String,
    pub tls_enabled: bool,
    /// Mirrors `connect_tls`'s `insecure` parameter: disables hostname and certificate-chain
    /// verification when set.
    pub tls_insecure: bool,
    pub subprotocol: String,
}

impl Default for WsConfig {
    fn default() -> WsConfig {
        WsConfig {
            host: "127.0.0.1".to_string(),
            port: 9001,
            resource: "/telemetry".to_string(),
            tls_enabled: false,
            tls_insecure: false,
            subprotocol: "doom-telemetry".to_string(),
        }
    }
}

/// Which shape the framed-stream back-end writes: `raw` sends the JSON payload verbatim, `kv`
/// wraps it in the length-prefixed `(session, payload)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamPayloadMode {
    Raw,
    Kv,
}

impl Default for StreamPayloadMode {
    fn default() -> StreamPayloadMode {
        StreamPayloadMode::Raw
    }
}

/// The full configuration surface, one field at a time. `Default` produces a disabled,
/// file-mode configuration so an un-configured host never accidentally emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub mode: i32,
    pub udp: UdpConfig,
    pub kafka: KafkaConfig,
    pub ws: WsConfig,
    pub stream_payload_mode: StreamPayloadMode,
}

impl Default for TelemetryConfig {
    fn default() -> TelemetryConfig {
        TelemetryConfig {
            enabled: false,
            mode: TelemetryMode::File as i32,
            udp: UdpConfig::default(),
            kafka: KafkaConfig::default(),
            ws: WsConfig::default(),
            stream_payload_mode: StreamPayloadMode::default(),
        }
    }
}

impl TelemetryConfig {
    /// Loads a configuration file the way `gamecore::config::GameConfig::load` does. The real
    /// config-binding facility that supplies this to the running game is an out-of-scope
    /// collaborator; this is only exercised by the demo binary and tests.
    pub fn load<P: AsRef<Path>>(path: P) -> TelemetryConfig {
        serdeconv::from_toml_file(path).expect("error loading telemetry configuration file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_disabled_file_mode() {
        let config = TelemetryConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.mode, TelemetryMode::File as i32);
    }

    #[test]
    fn mode_resolves_from_config_integers() {
        assert_eq!(TelemetryMode::from_i32(1), Some(TelemetryMode::File));
        assert_eq!(TelemetryMode::from_i32(5), Some(TelemetryMode::PubSubOverlay));
        assert_eq!(TelemetryMode::from_i32(6), None);
    }
}
