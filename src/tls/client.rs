//! Blocking TLS client used by the inspector and the prober.
//!
//! Certificate chains are never validated here: the point is to look at
//! whatever the server presents. Handshake signatures are still checked.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme, SupportedCipherSuite,
    SupportedProtocolVersion,
};

use crate::error::{CertLabError, Result};

/// Accepts any server certificate.
#[derive(Debug)]
struct InspectingVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for InspectingVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Builds a client config limited to `versions`, and to `suites` when given.
pub(crate) fn client_config(
    versions: &[&'static SupportedProtocolVersion],
    suites: Option<Vec<SupportedCipherSuite>>,
) -> Result<Arc<ClientConfig>> {
    let mut provider = rustls::crypto::ring::default_provider();
    if let Some(suites) = suites {
        provider.cipher_suites = suites;
    }
    let provider = Arc::new(provider);

    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(versions)?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InspectingVerifier { provider }))
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Opens a TCP connection, trying each resolved address within `timeout`.
///
/// Reads and writes on the returned stream are bounded by the same timeout.
pub(crate) fn dial(address: &str, timeout: Duration) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = address
        .to_socket_addrs()
        .map_err(|e| CertLabError::ConnectionError(format!("dial tcp {address}: {e}")))?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        debug!("dialing {addr} ({address})");
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(timeout))
                    .and_then(|_| stream.set_write_timeout(Some(timeout)))
                    .map_err(|e| CertLabError::ConnectionError(format!("dial tcp {address}: {e}")))?;
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(CertLabError::ConnectionError(match last_error {
        Some(e) => format!("dial tcp {address}: {e}"),
        None => format!("dial tcp {address}: no addresses found"),
    }))
}

/// What a completed handshake revealed.
#[derive(Debug)]
pub(crate) struct Handshake {
    pub peer_certificates: Vec<CertificateDer<'static>>,
    pub protocol: Option<u16>,
    pub cipher_suite: Option<String>,
}

fn handshake_error(e: io::Error) -> CertLabError {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            CertLabError::ConnectionError(format!("i/o timeout: {e}"))
        }
        _ => CertLabError::TlsError(e.to_string()),
    }
}

/// Dials `address` and completes a handshake presenting `server_name`.
pub(crate) fn handshake(
    config: Arc<ClientConfig>,
    server_name: &str,
    address: &str,
    timeout: Duration,
) -> Result<Handshake> {
    let name = ServerName::try_from(server_name.to_string()).map_err(|e| {
        CertLabError::InvalidInput(format!("invalid server name {server_name:?}: {e}"))
    })?;
    let mut stream = dial(address, timeout)?;
    let mut conn = ClientConnection::new(config, name)?;

    while conn.is_handshaking() {
        conn.complete_io(&mut stream).map_err(handshake_error)?;
    }

    let handshake = Handshake {
        peer_certificates: conn
            .peer_certificates()
            .map(|certs| certs.to_vec())
            .unwrap_or_default(),
        protocol: conn.protocol_version().map(u16::from),
        cipher_suite: conn
            .negotiated_cipher_suite()
            .map(|suite| format!("{:?}", suite.suite())),
    };
    debug!(
        "handshake with {address} done: protocol {:?}, suite {:?}",
        handshake.protocol, handshake.cipher_suite
    );

    conn.send_close_notify();
    if let Err(e) = conn.complete_io(&mut stream) {
        debug!("close_notify to {address} failed: {e}");
    }
    Ok(handshake)
}
