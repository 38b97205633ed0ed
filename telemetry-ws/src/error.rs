use std::io;

/// Error taxonomy for the framed-stream client. Setup failures (`Conn*`, `Handshake*`) are
/// fatal to the caller; the rest are the transient/protocol-violation signals `recv` and
/// `close` use to tell the caller what just happened on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsError {
    ConnCreate,
    ConnResolve,
    ConnConnect,
    HandshakeReq,
    HandshakeRes,
    TooLarge,
    Truncated,
    Fragmented,
    TextFrame,
    UnexpectedOpcode,
    Shutdown,
    WantPoll,
    WantPong,
    Tls,
    Io,
}

impl From<io::Error> for WsError {
    #[inline]
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock => WsError::WantPoll,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset => WsError::Shutdown,
            _ => WsError::Io,
        }
    }
}
