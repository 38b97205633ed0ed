//! The uniform back-end interface. Each back-end implements as much of `Transport` as it can;
//! `read`/`poll` default to "unsupported" the way `neutronium`'s `Channel` only exposes
//! `receive`/`send` where the underlying stream actually has them.

pub mod broker;
pub mod datagram;
pub mod file;
pub mod pubsub;
pub mod stream;

use crate::error::{RuntimeError, SetupError};

/// A transport back-end. `init`/`close` are always implemented; `read`/`poll` are optional,
/// and back-ends that don't support them keep the default, which the dispatcher turns into
/// `-1`.
pub trait Transport {
    fn init(&mut self) -> Result<(), SetupError>;

    fn close(&mut self);

    fn write(&mut self, bytes: &[u8]) -> Result<usize, RuntimeError>;

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, RuntimeError> {
        Err(RuntimeError::NoData)
    }

    fn poll(&mut self) {}

    /// Called once by the dispatcher right after the session id is generated. Only the broker
    /// back-end uses it, as the message key; every other back-end keeps the default.
    fn set_session_key(&mut self, _key: &[u8]) {}

    fn supports_read(&self) -> bool {
        false
    }

    fn supports_poll(&self) -> bool {
        false
    }
}
