#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use certlab::cert::Certificate;
use certlab::cert::extensions::{ExtendedKeyUsage, ExtendedKeyUsageOption, SubjectAltName};
use certlab::cert::params::{CertificateTemplate, DistinguishedName, ExtensionParam, Validity};
use certlab::csr::{CsrOptions, GeneratedCsr, generate_csr};
use certlab::generate::{CaOptions, GenerateOptions, GeneratedCertificate, generate, generate_ca};
use certlab::issuer::{Issuer, SelfIssuer};
use certlab::key::{KeyPair, PublicKey};
use certlab::san;
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

/// Smallest RSA size the TLS stack and the WebPKI verifier accept.
pub const RSA_BITS: usize = 2048;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn generate_ca_cert(dir: &Path) -> GeneratedCertificate {
    generate_ca(
        &CaOptions::builder()
            .common_name("Test CA")
            .organization("CertLab Tests")
            .country("US")
            .key_size(RSA_BITS)
            .output_dir(dir)
            .build(),
    )
    .unwrap()
}

pub fn generate_leaf(dir: &Path, common_name: &str, sans: &[&str]) -> GeneratedCertificate {
    generate(
        &GenerateOptions::builder()
            .common_name(common_name)
            .key_size(RSA_BITS)
            .sans(sans.iter().map(|s| s.to_string()).collect())
            .output_dir(dir)
            .build(),
    )
    .unwrap()
}

pub fn generate_request(dir: &Path, common_name: &str, sans: &[&str]) -> GeneratedCsr {
    generate_csr(
        &CsrOptions::builder()
            .common_name(common_name)
            .key_size(RSA_BITS)
            .sans(sans.iter().map(|s| s.to_string()).collect())
            .output_dir(dir)
            .build(),
    )
    .unwrap()
}

/// In-memory self-signed ECDSA P-256 server certificate.
pub fn ecdsa_server_cert(common_name: &str) -> (Certificate, KeyPair) {
    let key = KeyPair::generate_ecdsa_p256();
    let subject = DistinguishedName::builder()
        .common_name(common_name.to_string())
        .build()
        .as_x509_name()
        .unwrap();
    let template = CertificateTemplate::builder()
        .subject(subject.clone())
        .subject_public_key(PublicKey::from_key_pair(&key).to_x509spki().unwrap())
        .extensions(vec![
            ExtensionParam::from_extension(
                ExtendedKeyUsage {
                    usage: vec![ExtendedKeyUsageOption::ServerAuth],
                },
                false,
            )
            .unwrap(),
            ExtensionParam::from_extension(
                SubjectAltName {
                    names: san::classify(&[common_name]),
                },
                false,
            )
            .unwrap(),
        ])
        .build();
    let cert = SelfIssuer {
        name: subject,
        key: &key,
    }
    .issue(&template, Validity::for_days(30).unwrap(), &[7])
    .unwrap();
    (cert, key)
}

/// A TLS 1.2/1.3 server on loopback that handshakes `connections` times, then exits.
pub struct TestServer {
    pub addr: SocketAddr,
    handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    pub fn start(chain: &[Certificate], key: &KeyPair, connections: usize) -> Self {
        let certs: Vec<CertificateDer<'static>> = chain
            .iter()
            .map(|c| CertificateDer::from(c.to_der().to_vec()))
            .collect();
        let key_der = pem::parse(key.to_pkcs8_pem().unwrap()).unwrap().into_contents();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_der));

        let config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
        let config = Arc::new(config);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            for stream in listener.incoming().take(connections) {
                let Ok(mut stream) = stream else { continue };
                let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
                let Ok(mut conn) = rustls::ServerConnection::new(config.clone()) else {
                    continue;
                };
                while conn.is_handshaking() {
                    if conn.complete_io(&mut stream).is_err() {
                        break;
                    }
                }
                // Flush tickets and wait for the client's close_notify.
                let _ = conn.complete_io(&mut stream);
            }
        });

        Self {
            addr,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

/// Parameters of a ClientHello, read off the wire.
struct OfferedHello {
    version: u16,
    suites: Vec<u16>,
}

fn read_client_hello(stream: &mut TcpStream) -> Option<OfferedHello> {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).ok()?;
    let mut fragment = vec![0u8; u16::from_be_bytes([header[3], header[4]]) as usize];
    stream.read_exact(&mut fragment).ok()?;

    // handshake header(4), then client_version(2) and random(32)
    let body = fragment.get(4..)?;
    let version = u16::from_be_bytes([*body.first()?, *body.get(1)?]);
    let mut pos = 34;
    pos += 1 + *body.get(pos)? as usize;
    let len = u16::from_be_bytes([*body.get(pos)?, *body.get(pos + 1)?]) as usize;
    let suites = body
        .get(pos + 2..pos + 2 + len)?
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Some(OfferedHello { version, suites })
}

/// A TLS 1.2 server that only speaks ECDHE-RSA-AES128-SHA and ECDHE-RSA-AES128-SHA256.
///
/// It answers a matching ClientHello with a ServerHello and hangs up. Anything
/// else gets a fatal alert, as a CBC-only OpenSSL server would send.
pub struct CbcOnlyServer {
    pub addr: SocketAddr,
    handle: Option<thread::JoinHandle<()>>,
}

impl CbcOnlyServer {
    const SUITES: [u16; 2] = [0xc013, 0xc027];

    pub fn start(connections: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            for stream in listener.incoming().take(connections) {
                let Ok(mut stream) = stream else { continue };
                let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
                let Some(hello) = read_client_hello(&mut stream) else {
                    continue;
                };
                let chosen = Self::SUITES.iter().find(|s| hello.suites.contains(s));
                let reply = match (hello.version, chosen) {
                    (0x0303, Some(suite)) => server_hello(*suite),
                    (0x0303, None) => alert(40),
                    _ => alert(70),
                };
                let _ = stream.write_all(&reply);
                let _ = stream.flush();
            }
        });

        Self {
            addr,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn alert(description: u8) -> Vec<u8> {
    vec![0x15, 0x03, 0x03, 0x00, 0x02, 0x02, description]
}

fn server_hello(suite: u16) -> Vec<u8> {
    let mut body = vec![0x03, 0x03];
    body.extend_from_slice(&[0x42; 32]);
    body.push(0); // session id
    body.extend_from_slice(&suite.to_be_bytes());
    body.push(0); // null compression

    let mut handshake = vec![0x02, 0x00, 0x00, body.len() as u8];
    handshake.extend_from_slice(&body);

    let mut record = vec![0x16, 0x03, 0x03];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}
