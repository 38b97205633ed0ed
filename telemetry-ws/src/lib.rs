//! A minimal, hand-rolled subset of RFC6455 sufficient to open a stream to a cooperating
//! server and push binary payloads over it. Only what the telemetry streaming back-end needs
//! is implemented: one client, one outstanding connection, no fragmentation, no extensions, no
//! text frames. Uses a non-blocking, busy-poll-on-`WouldBlock` style for all TCP traffic.

pub mod error;
pub mod frame;
pub mod handshake;
pub mod tls;

use error::WsError;
use frame::{FrameHeader, Opcode};
use mio::net::TcpStream;
use rand::RngCore;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use tls::TlsWrap;

const READ_HEAD_LEN: usize = 2;
const HANDSHAKE_READ_CHUNK: usize = 512;
const HANDSHAKE_MAX_RESPONSE: usize = 8192;

enum Socket {
    Plain(TcpStream),
    Tls(TlsWrap),
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Socket::Plain(stream) => stream.read(buf),
            Socket::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Socket::Plain(stream) => stream.write(buf),
            Socket::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Socket::Plain(stream) => stream.flush(),
            Socket::Tls(stream) => stream.flush(),
        }
    }
}

impl Socket {
    fn shutdown(&mut self) {
        match self {
            Socket::Plain(stream) => {
                stream.shutdown(Shutdown::Both).ok();
            }
            Socket::Tls(stream) => stream.shutdown(),
        }
    }
}

/// What arrived on a successful `recv`: which opcode it was, and how many bytes of payload
/// were copied into the caller's buffer (truncated to the buffer's length, per spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Binary(usize),
    Pong(usize),
}

/// One client-side framed stream. Only one connection is held at a time; re-opening requires a
/// fresh `WsClient`.
pub struct WsClient {
    socket: Option<Socket>,
    host: String,
    port: u16,
    connected: bool,
}

impl WsClient {
    pub fn new() -> WsClient {
        WsClient {
            socket: None,
            host: String::new(),
            port: 0,
            connected: false,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Resolves `host:port`, connects to the first resolved address and sets the socket
    /// non-blocking (mio's `TcpStream` always is).
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), WsError> {
        let addr = Self::resolve(host, port)?;
        let stream = TcpStream::connect(addr).map_err(|_| WsError::ConnConnect)?;

        self.socket = Some(Socket::Plain(stream));
        self.host = host.to_string();
        self.port = port;
        self.connected = true;
        Ok(())
    }

    /// As `connect`, then wraps the stream in TLS. `insecure` disables both hostname and
    /// certificate-chain verification; the TLS library itself remains an opaque
    /// connect/read/write/close collaborator, per this crate's scope.
    pub fn connect_tls(&mut self, host: &str, port: u16, insecure: bool) -> Result<(), WsError> {
        let addr = Self::resolve(host, port)?;
        let stream = TcpStream::connect(addr).map_err(|_| WsError::ConnConnect)?;

        let tls = TlsWrap::connect(stream, host, insecure).map_err(|_| WsError::Tls)?;

        self.socket = Some(Socket::Tls(tls));
        self.host = host.to_string();
        self.port = port;
        self.connected = true;
        Ok(())
    }

    fn resolve(host: &str, port: u16) -> Result<SocketAddr, WsError> {
        (host, port)
            .to_socket_addrs()
            .map_err(|_| WsError::ConnResolve)?
            .next()
            .ok_or(WsError::ConnResolve)
    }

    /// Sends the text upgrade request and blocks (busy-polling `WouldBlock`) until either the
    /// full response header block or `HANDSHAKE_MAX_RESPONSE` bytes have been read. The
    /// returned `Sec-WebSocket-Accept` value is never validated; only the status line is.
    pub fn handshake(&mut self, path: &str, subprotocol: &str) -> Result<(), WsError> {
        let mut rng = rand::thread_rng();
        let key = handshake::fabricate_key(&mut rng);
        let request = handshake::build_request(&self.host, self.port, path, subprotocol, &key);

        self.write_all_blocking(request.as_bytes())
            .map_err(|_| WsError::HandshakeReq)?;

        let mut response = Vec::new();
        let mut chunk = [0u8; HANDSHAKE_READ_CHUNK];

        while !handshake::is_complete(&response) {
            if response.len() >= HANDSHAKE_MAX_RESPONSE {
                return Err(WsError::HandshakeRes);
            }

            let read = self.read_blocking_partial(&mut chunk)?;
            response.extend_from_slice(&chunk[..read]);
        }

        if handshake::accepted(&response) {
            Ok(())
        } else {
            self.socket.as_mut().map(Socket::shutdown);
            Err(WsError::HandshakeRes)
        }
    }

    /// Wraps `payload` in a single masked binary frame and writes it whole; never re-fragments.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), WsError> {
        let mask = Self::random_mask();
        let frame = frame::encode_frame(Opcode::Binary, payload, mask)?;
        self.write_all_blocking(&frame).map_err(Into::into)
    }

    /// Opportunistically reads one frame. Returns `WantPoll` if no data is available yet,
    /// `WantPong` if a `PING` arrived (the caller should reply), `Shutdown` if the peer sent
    /// `CLOSE` (this also tears the stream down), and rejects fragmented or `TEXT` frames.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<Received, WsError> {
        let mut head = [0u8; 1];
        let got = self.read_opportunistic(&mut head)?;
        if got == 0 {
            return Err(WsError::WantPoll);
        }

        let mut rest = [0u8; READ_HEAD_LEN - 1];
        self.read_exact_blocking(&mut rest)?;

        let head_bytes = [head[0], rest[0]];
        let extra = frame::extra_header_len(head_bytes);

        let mut extra_buf = [0u8; 6];
        if extra > 0 {
            self.read_exact_blocking(&mut extra_buf[..extra])?;
        }

        let mut header_bytes = Vec::with_capacity(READ_HEAD_LEN + extra);
        header_bytes.extend_from_slice(&head_bytes);
        header_bytes.extend_from_slice(&extra_buf[..extra]);

        let header = frame::parse_header(&header_bytes)?;

        if !header.fin {
            return Err(WsError::Fragmented);
        }

        match header.opcode {
            Opcode::Binary => self.read_payload(&header, buf).map(Received::Binary),
            Opcode::Pong => self.read_payload(&header, buf).map(Received::Pong),
            Opcode::Close => {
                self.drain_payload(&header)?;
                self.socket.as_mut().map(Socket::shutdown);
                self.connected = false;
                Err(WsError::Shutdown)
            }
            Opcode::Ping => {
                self.drain_payload(&header)?;
                Err(WsError::WantPong)
            }
            Opcode::Text => Err(WsError::TextFrame),
            Opcode::Continuation => Err(WsError::Fragmented),
        }
    }

    fn read_payload(&mut self, header: &FrameHeader, buf: &mut [u8]) -> Result<usize, WsError> {
        let mut payload = vec![0u8; header.payload_len];
        self.read_exact_blocking(&mut payload)?;
        if header.masked {
            frame::apply_mask(&mut payload, header.mask);
        }

        let copy_len = payload.len().min(buf.len());
        buf[..copy_len].copy_from_slice(&payload[..copy_len]);
        Ok(copy_len)
    }

    fn drain_payload(&mut self, header: &FrameHeader) -> Result<(), WsError> {
        let mut discard = vec![0u8; header.payload_len];
        self.read_exact_blocking(&mut discard)
    }

    /// Sends an empty `PING` and blocks until exactly one `PONG` has arrived and been
    /// discarded.
    pub fn ping(&mut self) -> Result<(), WsError> {
        let mask = Self::random_mask();
        let frame = frame::encode_frame(Opcode::Ping, &[], mask)?;
        self.write_all_blocking(&frame)?;

        let mut head = [0u8; READ_HEAD_LEN];
        self.read_exact_blocking(&mut head)?;

        let extra = frame::extra_header_len(head);
        let mut extra_buf = [0u8; 6];
        if extra > 0 {
            self.read_exact_blocking(&mut extra_buf[..extra])?;
        }

        let mut header_bytes = Vec::with_capacity(READ_HEAD_LEN + extra);
        header_bytes.extend_from_slice(&head);
        header_bytes.extend_from_slice(&extra_buf[..extra]);

        let header = frame::parse_header(&header_bytes)?;
        if header.opcode != Opcode::Pong {
            return Err(WsError::UnexpectedOpcode);
        }

        self.drain_payload(&header)
    }

    /// Sends a `CLOSE`, reads the server's mandatory `CLOSE` reply, then shuts the socket down.
    pub fn close(&mut self) -> Result<(), WsError> {
        let mask = Self::random_mask();
        let frame = frame::encode_frame(Opcode::Close, &[], mask)?;
        self.write_all_blocking(&frame).ok();

        let mut head = [0u8; READ_HEAD_LEN];
        if self.read_exact_blocking(&mut head).is_ok() {
            let extra = frame::extra_header_len(head);
            let mut extra_buf = [0u8; 6];
            if extra > 0 {
                self.read_exact_blocking(&mut extra_buf[..extra]).ok();
            }
        }

        if let Some(socket) = self.socket.as_mut() {
            socket.shutdown();
        }
        self.connected = false;
        Ok(())
    }

    fn random_mask() -> [u8; 4] {
        let mut mask = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut mask);
        mask
    }

    fn write_all_blocking(&mut self, data: &[u8]) -> Result<(), WsError> {
        let socket = self.socket.as_mut().ok_or(WsError::Io)?;
        let mut written = 0;

        while written < data.len() {
            match socket.write(&data[written..]) {
                Ok(0) => return Err(WsError::Io),
                Ok(n) => written += n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    fn read_exact_blocking(&mut self, buf: &mut [u8]) -> Result<(), WsError> {
        let socket = self.socket.as_mut().ok_or(WsError::Io)?;
        let mut read = 0;

        while read < buf.len() {
            match socket.read(&mut buf[read..]) {
                Ok(0) => return Err(WsError::Shutdown),
                Ok(n) => read += n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    /// Reads into `buf`, returning `0` immediately if nothing is available rather than
    /// busy-spinning. Used only for the first byte of a frame header in `recv`.
    fn read_opportunistic(&mut self, buf: &mut [u8]) -> Result<usize, WsError> {
        let socket = self.socket.as_mut().ok_or(WsError::Io)?;

        match socket.read(buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn read_blocking_partial(&mut self, buf: &mut [u8]) -> Result<usize, WsError> {
        loop {
            match self.read_opportunistic(buf)? {
                0 => continue,
                n => return Ok(n),
            }
        }
    }
}

impl Default for WsClient {
    fn default() -> WsClient {
        WsClient::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn received_variants_carry_byte_counts() {
        assert_eq!(Received::Binary(4), Received::Binary(4));
        assert_ne!(Received::Binary(4), Received::Pong(4));
    }

    /// Spins up a minimal cooperating server on loopback and drives a full
    /// connect/handshake/send/recv/close cycle against it, exercising `recv`'s opcode dispatch
    /// and `close`'s mandatory reply the way `telemetry-core`'s stream back-end would.
    #[test]
    fn connects_handshakes_and_round_trips_a_binary_frame_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                request.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }
            assert!(request.starts_with("GET /events HTTP/1.1\r\n"));

            stream
                .write_all(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n")
                .unwrap();

            let mut head = [0u8; 2];
            reader.read_exact(&mut head).unwrap();
            let extra = frame::extra_header_len(head);
            let mut extra_buf = [0u8; 6];
            reader.read_exact(&mut extra_buf[..extra]).unwrap();
            let mut header_bytes = Vec::new();
            header_bytes.extend_from_slice(&head);
            header_bytes.extend_from_slice(&extra_buf[..extra]);
            let header = frame::parse_header(&header_bytes).unwrap();

            let mut payload = vec![0u8; header.payload_len];
            reader.read_exact(&mut payload).unwrap();
            frame::apply_mask(&mut payload, header.mask);
            assert_eq!(payload, b"hello telemetry");

            let reply = frame::encode_frame(Opcode::Binary, b"ack", [9, 9, 9, 9]).unwrap();
            stream.write_all(&reply).unwrap();

            let mut close_head = [0u8; 2];
            reader.read_exact(&mut close_head).unwrap();
            let close_extra = frame::extra_header_len(close_head);
            let mut close_extra_buf = [0u8; 6];
            reader.read_exact(&mut close_extra_buf[..close_extra]).unwrap();
            let close = frame::encode_frame(Opcode::Close, &[], [1, 2, 3, 4]).unwrap();
            stream.write_all(&close).unwrap();
        });

        let mut client = WsClient::new();
        client.connect("127.0.0.1", addr.port()).unwrap();
        client.handshake("/events", "telemetry").unwrap();
        assert!(client.is_connected());

        client.send(b"hello telemetry").unwrap();

        let mut buf = [0u8; 16];
        let received = loop {
            match client.recv(&mut buf) {
                Ok(r) => break r,
                Err(WsError::WantPoll) => continue,
                Err(err) => panic!("unexpected recv error: {:?}", err),
            }
        };
        assert_eq!(received, Received::Binary(3));
        assert_eq!(&buf[..3], b"ack");

        client.close().unwrap();
        assert!(!client.is_connected());

        server.join().unwrap();
    }
}
