use rand::Rng;

const RESPONSE_ACCEPT_PREFIX: &str = "HTTP/1.1 101 Switching Protocols";
const HANDSHAKE_TERMINATOR: &[u8] = b"\r\n\r\n";

const B64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Fabricates a 22-character base64-alphabet string plus a literal `==` suffix, the shape a
/// real `Sec-WebSocket-Key` takes. The bytes are not a real base64 encoding of random key
/// material and the server's echoed `Sec-WebSocket-Accept` is never validated against it; this
/// client trusts the `101 Switching Protocols` status line alone. Acceptable only because this
/// crate is a client talking to a cooperating, already-trusted server.
pub fn fabricate_key<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut key = String::with_capacity(24);
    for _ in 0..22 {
        let idx = rng.gen_range(0..B64_ALPHABET.len());
        key.push(B64_ALPHABET[idx] as char);
    }
    key.push_str("==");
    key
}

/// Builds the literal text upgrade request this crate sends to open a stream.
pub fn build_request(host: &str, port: u16, path: &str, subprotocol: &str, key: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Protocol: {subprotocol}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n",
        path = path,
        host = host,
        port = port,
        key = key,
        subprotocol = subprotocol,
    )
}

/// Whether `response` ends in the handshake terminator, i.e. whether a full response header
/// block has been read and `accepted` may be called.
#[inline]
pub fn is_complete(response: &[u8]) -> bool {
    response.ends_with(HANDSHAKE_TERMINATOR)
}

/// Whether the response begins with the exact `101 Switching Protocols` status line. Any other
/// prefix, including a well-formed-but-different status such as `HTTP/1.1 400`, is rejected.
#[inline]
pub fn accepted(response: &[u8]) -> bool {
    response.starts_with(RESPONSE_ACCEPT_PREFIX.as_bytes())
}
