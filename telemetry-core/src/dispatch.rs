//! Transport dispatcher and the process-wide `TelemetrySystem` singleton that parks it,
//! mirroring the `lazy_static!` + `Mutex` idiom `neutronium::identity` already uses for its own
//! process-wide tables: a single value parked in a once-initialized global, never re-entrant,
//! with idempotent initialization.

use crate::config::{StreamPayloadMode, TelemetryConfig, TelemetryMode};
use crate::error::SetupError;
use crate::event::EventDescriptor;
use crate::logging::{self, Logger};
use crate::record::{Composer, Frame};
use crate::session::{Sequence, SessionId};
use crate::transport::broker::{BrokerConfig, BrokerTransport, SaslConfig, SaslMechanism};
use crate::transport::datagram::DatagramTransport;
use crate::transport::file::FileTransport;
use crate::transport::pubsub::{PubSubConfig, PubSubTransport};
use crate::transport::stream::{FramedStreamTransport, StreamConfig, StreamMode};
use crate::transport::Transport;
use lazy_static::lazy_static;
use std::sync::Mutex;

/// Host-supplied escalation hook for setup failures. The core never aborts the process itself;
/// if this closure returns instead of exiting, telemetry simply ends up disabled rather than
/// installed half-built.
pub type FatalHandler<'a> = &'a dyn Fn(SetupError);

/// A fatal handler that only logs, used by tests and by any caller that doesn't want the
/// process torn down on a telemetry setup failure.
pub fn logging_fatal_handler(log: Logger) -> impl Fn(SetupError) {
    move |err: SetupError| {
        logging::error!(log, "telemetry setup failed, telemetry disabled"; "error" => format!("{:?}", err));
    }
}

fn build_broker_config(config: &TelemetryConfig) -> BrokerConfig {
    let sasl = config.kafka.sasl_mechanism.map(|mechanism| SaslConfig {
        mechanism: match mechanism {
            crate::config::SaslMechanismId::Plain => SaslMechanism::Plain,
            crate::config::SaslMechanismId::Sha256 => SaslMechanism::ScramSha256,
            crate::config::SaslMechanismId::Sha512 => SaslMechanism::ScramSha512,
        },
        username: config.kafka.username.clone(),
        password: config.kafka.password.clone(),
    });

    BrokerConfig {
        brokers: config.kafka.brokers.clone(),
        topic: config.kafka.topic.clone(),
        feedback_topic: config.kafka.feedback_topic.clone(),
        ssl: config.kafka.ssl,
        sasl,
    }
}

fn build_stream_config(config: &TelemetryConfig) -> StreamConfig {
    StreamConfig {
        host: config.ws.host.clone(),
        port: config.ws.port,
        resource: config.ws.resource.clone(),
        subprotocol: config.ws.subprotocol.clone(),
        tls: config.ws.tls_enabled,
        tls_insecure: config.ws.tls_insecure,
        mode: match config.stream_payload_mode {
            StreamPayloadMode::Raw => StreamMode::Raw,
            StreamPayloadMode::Kv => StreamMode::Kv,
        },
    }
}

fn build_pubsub_config(config: &TelemetryConfig) -> PubSubConfig {
    PubSubConfig {
        host: config.ws.host.clone(),
        port: config.ws.port,
        resource: config.ws.resource.clone(),
        subprotocol: config.ws.subprotocol.clone(),
        tls: config.ws.tls_enabled,
        tls_insecure: config.ws.tls_insecure,
    }
}

/// Holds exactly one active back-end, the composer, and the session/sequence state that lives
/// alongside it.
pub struct TransportDispatcher {
    backend: Box<dyn Transport>,
    mode: TelemetryMode,
    composer: Composer,
    session: SessionId,
    sequence: Sequence,
    /// Stream-framed back-ends append `\n`; datagram/broker/kv back-ends don't.
    terminate_with_newline: bool,
    log: Logger,
}

impl TransportDispatcher {
    fn build(config: &TelemetryConfig, log: Logger) -> Result<TransportDispatcher, SetupError> {
        let mode = TelemetryMode::from_i32(config.mode).ok_or(SetupError::Unsupported)?;

        let (mut backend, terminate_with_newline): (Box<dyn Transport>, bool) = match mode {
            TelemetryMode::File => (Box::new(FileTransport::new(log.clone())), false),
            TelemetryMode::Datagram => (
                Box::new(DatagramTransport::new(
                    config.udp.host.clone(),
                    config.udp.port,
                    log.clone(),
                )),
                false,
            ),
            TelemetryMode::Broker => (
                Box::new(BrokerTransport::new(build_broker_config(config), log.clone())),
                false,
            ),
            TelemetryMode::FramedStream => (
                Box::new(FramedStreamTransport::new(build_stream_config(config), log.clone())),
                true,
            ),
            TelemetryMode::PubSubOverlay => (
                Box::new(PubSubTransport::new(build_pubsub_config(config), log.clone())),
                true,
            ),
        };

        let session = SessionId::generate()?;
        backend.set_session_key(session.as_str().as_bytes());
        backend.init()?;

        Ok(TransportDispatcher {
            backend,
            mode,
            composer: Composer::new(log.clone()),
            session,
            sequence: Sequence::new(),
            terminate_with_newline,
            log,
        })
    }

    #[inline]
    pub fn mode(&self) -> TelemetryMode {
        self.mode
    }

    /// Composes `event` and forwards it to the active back-end. Only observes the write's
    /// return value to log a warning on zero bytes; never signals failure back to the call
    /// site, since telemetry prefers drop-and-continue over back-pressuring the game loop.
    fn emit(&mut self, event: &EventDescriptor<'_>, frame: Frame) {
        let sequence = self.sequence.next();

        if let Some(bytes) = self.composer.compose(
            event,
            &self.session,
            sequence,
            frame,
            self.terminate_with_newline,
        ) {
            match self.backend.write(bytes) {
                Ok(0) => logging::warn!(self.log, "telemetry write returned zero bytes"),
                Ok(_) => {}
                Err(err) => {
                    logging::warn!(self.log, "telemetry write failed, record dropped";
                        "error" => format!("{:?}", err));
                }
            }
        }

        self.composer.clear();
    }

    /// Forwards to the back-end if it supports polling; otherwise a no-op.
    pub fn poll(&mut self) {
        if self.backend.supports_poll() {
            self.backend.poll();
        }
    }

    /// Forwards to the back-end's `read` if supported, returning `-1` otherwise.
    pub fn read(&mut self, buf: &mut [u8]) -> i32 {
        if !self.backend.supports_read() {
            return -1;
        }

        match self.backend.read(buf) {
            Ok(n) => n as i32,
            Err(_) => -1,
        }
    }

    fn close(&mut self) {
        self.backend.close();
    }
}

/// The process-wide singleton: enabled flag plus (when enabled) the installed dispatcher.
/// Lives from `init_telemetry` to `stop_telemetry`; not re-entrant.
struct TelemetrySystem {
    enabled: bool,
    dispatcher: Option<TransportDispatcher>,
}

lazy_static! {
    static ref SYSTEM: Mutex<Option<TelemetrySystem>> = Mutex::new(None);
}

/// Installs the back-end selected by `config.mode`, generates the session id, and resets the
/// sequence counter. A re-entrant call after a successful init is a no-op that returns the
/// current mode. If `config.enabled` is false, no back-end is touched at all and every
/// subsequent emission short-circuits with no I/O. On a setup failure, `fatal` is invoked and
/// telemetry ends up disabled rather than half-installed.
pub fn init_telemetry(config: &TelemetryConfig, log: Logger, fatal: FatalHandler<'_>) -> TelemetryMode {
    let mut guard = SYSTEM.lock().expect("telemetry system lock poisoned");

    if let Some(system) = guard.as_ref() {
        if let Some(dispatcher) = system.dispatcher.as_ref() {
            return dispatcher.mode();
        }
        return TelemetryMode::File;
    }

    if !config.enabled {
        *guard = Some(TelemetrySystem { enabled: false, dispatcher: None });
        return TelemetryMode::File;
    }

    match TransportDispatcher::build(config, log) {
        Ok(dispatcher) => {
            let mode = dispatcher.mode();
            *guard = Some(TelemetrySystem { enabled: true, dispatcher: Some(dispatcher) });
            mode
        }
        Err(err) => {
            fatal(err);
            *guard = Some(TelemetrySystem { enabled: false, dispatcher: None });
            TelemetryMode::File
        }
    }
}

/// Flushes and tears down the active back-end and releases the scratch buffer. A no-op if
/// telemetry was never initialized or is already stopped.
pub fn stop_telemetry() {
    let mut guard = SYSTEM.lock().expect("telemetry system lock poisoned");
    if let Some(mut system) = guard.take() {
        if let Some(mut dispatcher) = system.dispatcher.take() {
            dispatcher.close();
        }
    }
}

/// Whether telemetry is currently enabled and installed. Used by the public emission surface's
/// short-circuit so call sites never need to branch themselves.
pub fn is_enabled() -> bool {
    let guard = SYSTEM.lock().expect("telemetry system lock poisoned");
    matches!(guard.as_ref(), Some(system) if system.enabled)
}

/// Composes and dispatches one event through the installed back-end. A no-op (no I/O, no
/// sequence advance) if telemetry is disabled or not yet initialized.
pub(crate) fn emit(event: &EventDescriptor<'_>, frame: Frame) {
    let mut guard = SYSTEM.lock().expect("telemetry system lock poisoned");
    if let Some(system) = guard.as_mut() {
        if system.enabled {
            if let Some(dispatcher) = system.dispatcher.as_mut() {
                dispatcher.emit(event, frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::sync::atomic::{AtomicBool, Ordering};

    // These tests share the process-wide singleton, so each one fully inits then stops it to
    // avoid leaking state across tests. Rust's default test harness runs them on separate
    // threads but not concurrently against the same `SYSTEM` lock thanks to the guard.

    #[test]
    fn disabled_config_never_installs_a_backend() {
        stop_telemetry();
        let config = TelemetryConfig::default();
        let fatal_called = AtomicBool::new(false);
        let mode = init_telemetry(&config, logging::discard(), &|_| fatal_called.store(true, Ordering::SeqCst));

        assert_eq!(mode, TelemetryMode::File);
        assert!(!is_enabled());
        assert!(!fatal_called.load(Ordering::SeqCst));

        emit(&EventDescriptor::new(EventKind::Move), Frame { millis: 0, tic: 0 });
        stop_telemetry();
    }

    #[test]
    fn reentrant_init_is_a_no_op() {
        stop_telemetry();
        let dir = tempfile::tempdir().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let mut config = TelemetryConfig::default();
        config.enabled = true;

        let first = init_telemetry(&config, logging::discard(), &|_| {});
        let second = init_telemetry(&config, logging::discard(), &|_| {});
        assert_eq!(first, second);

        stop_telemetry();
        std::env::set_current_dir(prev).unwrap();
    }
}
