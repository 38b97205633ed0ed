use mio::net::TcpStream;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ClientConnection, Error as TlsError, RootCertStore, ServerName};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::SystemTime;

/// TLS wrap around the plain socket; the `Read`/`Write` impl pumps the handshake and record
/// layer the same way a plain `TcpStream` would, so the rest of the client never needs to know
/// which transport it is actually holding.
pub struct TlsWrap {
    inner: rustls::StreamOwned<ClientConnection, TcpStream>,
}

/// Accepts any certificate chain and any hostname. Only reachable when the caller opts into
/// `insecure`; this crate never reimplements certificate-chain validation itself, it only
/// decides whether to skip it.
struct NoVerify;

impl ServerCertVerifier for NoVerify {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }
}

impl TlsWrap {
    pub fn connect(socket: TcpStream, host: &str, insecure: bool) -> io::Result<TlsWrap> {
        let config = if insecure {
            ClientConfig::builder()
                .with_safe_defaults()
                .with_custom_certificate_verifier(Arc::new(NoVerify))
                .with_no_client_auth()
        } else {
            let mut roots = RootCertStore::empty();
            for cert in rustls_native_certs::load_native_certs()
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?
            {
                let _ = roots.add(&Certificate(cert.0));
            }

            ClientConfig::builder()
                .with_safe_defaults()
                .with_root_certificates(roots)
                .with_no_client_auth()
        };

        let name = ServerName::try_from(host)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid server name"))?;

        let conn = ClientConnection::new(Arc::new(config), name)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

        Ok(TlsWrap {
            inner: rustls::StreamOwned::new(conn, socket),
        })
    }

    #[inline]
    pub fn shutdown(&mut self) {
        self.inner.sock.shutdown(std::net::Shutdown::Both).ok();
    }
}

impl Read for TlsWrap {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for TlsWrap {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
