use std::io;
use telemetry_ws::error::WsError;

/// Fatal setup-time failures. The core never exits the host process on its own; these are
/// handed to the host's `FatalHandler` (see `TelemetrySystem::init`) so the host decides what
/// to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    ConfigInvalid,
    Resolve,
    Connect,
    Handshake,
    Entropy,
    Unsupported,
}

/// Non-fatal, data-plane failures. Logged and the record is dropped; telemetry stays enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    WriteZero,
    QueueFull,
    UnexpectedOpcode,
    NoData,
}

impl From<io::Error> for RuntimeError {
    #[inline]
    fn from(_: io::Error) -> Self {
        RuntimeError::WriteZero
    }
}

/// Folds a framed-stream setup failure into the transport-wide setup taxonomy.
impl From<WsError> for SetupError {
    fn from(error: WsError) -> Self {
        match error {
            WsError::ConnCreate | WsError::ConnResolve => SetupError::Resolve,
            WsError::ConnConnect | WsError::Tls => SetupError::Connect,
            WsError::HandshakeReq | WsError::HandshakeRes => SetupError::Handshake,
            _ => SetupError::Connect,
        }
    }
}

/// Folds a framed-stream runtime signal into the transport-wide runtime taxonomy. `WantPoll`
/// and `WantPong` are transient and surfaced as "no data" rather than as an error that drops
/// the record; the caller of `read` is expected to treat both the same way.
impl From<WsError> for RuntimeError {
    fn from(error: WsError) -> Self {
        match error {
            WsError::WantPoll | WsError::WantPong | WsError::Shutdown => RuntimeError::NoData,
            WsError::UnexpectedOpcode | WsError::Fragmented | WsError::TextFrame => {
                RuntimeError::UnexpectedOpcode
            }
            _ => RuntimeError::WriteZero,
        }
    }
}
