use crate::error::SetupError;
use ctor::ctor;
use std::fmt;

const SESSION_ID_BYTES: usize = 12;
const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// Initializes the sodium infrastructure exactly once per process via a constructor function
/// that runs before `main`.
#[ctor]
fn init_sodium() {
    unsafe {
        if libsodium_sys::sodium_init() < 0 {
            panic!("cryptography initialization failed");
        }
    }
}

/// A 24-lowercase-hex-character id derived from 12 bytes of platform entropy, fixed for the
/// lifetime of the process once generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    /// Reads 12 bytes from the platform's cryptographic entropy source and hex-encodes them.
    /// Fatal (`Entropy`) if the source is unavailable; there is no silent session-id fallback.
    pub fn generate() -> Result<SessionId, SetupError> {
        let mut raw = [0u8; SESSION_ID_BYTES];
        random_bytes(&mut raw)?;
        Ok(SessionId(to_hex(&raw)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn random_bytes(out: &mut [u8]) -> Result<(), SetupError> {
    unsafe {
        libsodium_sys::randombytes_buf(out.as_mut_ptr() as *mut std::ffi::c_void, out.len());
    }
    // `randombytes_buf` has no failure return; sodium_init having succeeded at process start
    // (the `ctor` above) is the only precondition, so there is nothing further to check here.
    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX_CHARS[(byte >> 4) as usize] as char);
        out.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    out
}

/// Monotonically increasing, wraparound-tolerant per-record counter. Strictly increases
/// between two successfully composed records within a session; wraparound at `u32::MAX` is
/// intentional and left for the consumer to handle.
#[derive(Debug, Default)]
pub struct Sequence(u32);

impl Sequence {
    #[inline]
    pub fn new() -> Sequence {
        Sequence(0)
    }

    /// Returns the current value and advances the counter.
    #[inline]
    pub fn next(&mut self) -> u32 {
        let current = self.0;
        self.0 = self.0.wrapping_add(1);
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_24_lowercase_hex_chars() {
        let id = SessionId::generate().unwrap();
        assert_eq!(id.as_str().len(), 24);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn two_generated_ids_differ() {
        let a = SessionId::generate().unwrap();
        let b = SessionId::generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn sequence_counts_up_from_zero() {
        let mut seq = Sequence::new();
        assert_eq!(seq.next(), 0);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }

    #[test]
    fn sequence_wraps_around() {
        let mut seq = Sequence(u32::MAX);
        assert_eq!(seq.next(), u32::MAX);
        assert_eq!(seq.next(), 0);
    }
}
