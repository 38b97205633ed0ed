//! Datagram (UDP) back-end. One packet per record, no delimiter, no retry.

use super::Transport;
use crate::error::{RuntimeError, SetupError};
use crate::logging::{self, Logger};
use std::net::UdpSocket;

/// A conservative Ethernet MTU; the reusable packet buffer is one byte short of it.
const MTU: usize = 1500;
const PACKET_LEN: usize = MTU - 1;

pub struct DatagramTransport {
    host: String,
    port: u16,
    socket: Option<UdpSocket>,
    packet: [u8; PACKET_LEN],
    log: Logger,
}

impl DatagramTransport {
    pub fn new(host: String, port: u16, log: Logger) -> DatagramTransport {
        DatagramTransport {
            host,
            port,
            socket: None,
            packet: [0u8; PACKET_LEN],
            log,
        }
    }
}

impl Transport for DatagramTransport {
    fn init(&mut self) -> Result<(), SetupError> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|_| SetupError::Connect)?;
        socket
            .connect((self.host.as_str(), self.port))
            .map_err(|_| SetupError::Resolve)?;

        logging::info!(self.log, "telemetry datagram back-end resolved";
            "host" => self.host.clone(), "port" => self.port);
        self.socket = Some(socket);
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, RuntimeError> {
        let socket = self.socket.as_ref().ok_or(RuntimeError::WriteZero)?;
        let len = bytes.len().min(PACKET_LEN);
        self.packet[..len].copy_from_slice(&bytes[..len]);

        match socket.send(&self.packet[..len]) {
            Ok(n) => Ok(n),
            Err(err) => {
                logging::warn!(self.log, "datagram send failed, dropping record";
                    "error" => err.to_string());
                Err(RuntimeError::WriteZero)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket as StdUdpSocket;

    #[test]
    fn a_single_write_produces_a_single_undelimited_packet() {
        let receiver = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = receiver.local_addr().unwrap();
        receiver.set_nonblocking(false).unwrap();

        let mut transport = DatagramTransport::new("127.0.0.1".to_string(), addr.port(), logging::discard());
        transport.init().unwrap();
        transport.write(br#"{"counter":0}"#).unwrap();

        let mut buf = [0u8; 1500];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], br#"{"counter":0}"#);
    }
}
