//! Version support probing with a hand-built ClientHello.
//!
//! The client never completes these handshakes. It sends a ClientHello pinned
//! to one version and reads the first record back: a ServerHello for exactly
//! that version means the server speaks it. TLS 1.0 and 1.1 are always probed
//! this way. TLS 1.2 falls back to it for servers that only accept the CBC
//! suites `rustls` does not implement.

use std::io::{ErrorKind, Read, Write};
use std::net::IpAddr;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use log::debug;
use rand::RngCore;

use super::TlsVersion;
use super::client::dial;

const CONTENT_TYPE_ALERT: u8 = 0x15;
const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const HANDSHAKE_SERVER_HELLO: u8 = 0x02;

/// TLSPlaintext fragments never exceed 2^14 plus expansion room.
const MAX_RECORD_LEN: usize = (1 << 14) + 2048;

/// Suites a pre-1.2 server is expected to pick from.
const LEGACY_CIPHER_SUITES: &[u16] = &[
    0xc00a, // ECDHE-ECDSA-AES256-SHA
    0xc009, // ECDHE-ECDSA-AES128-SHA
    0xc014, // ECDHE-RSA-AES256-SHA
    0xc013, // ECDHE-RSA-AES128-SHA
    0x0035, // AES256-SHA
    0x002f, // AES128-SHA
    0x000a, // DES-CBC3-SHA
];

/// Offered ahead of the legacy list in a TLS 1.2 hello.
const TLS12_CIPHER_SUITES: &[u16] = &[
    0xc02b, // ECDHE-ECDSA-AES128-GCM-SHA256
    0xc02f, // ECDHE-RSA-AES128-GCM-SHA256
    0xc02c, // ECDHE-ECDSA-AES256-GCM-SHA384
    0xc030, // ECDHE-RSA-AES256-GCM-SHA384
    0xcca9, // ECDHE-ECDSA-CHACHA20-POLY1305
    0xcca8, // ECDHE-RSA-CHACHA20-POLY1305
    0xc023, // ECDHE-ECDSA-AES128-SHA256
    0xc027, // ECDHE-RSA-AES128-SHA256
    0x009c, // AES128-GCM-SHA256
    0x009d, // AES256-GCM-SHA384
    0x003c, // AES128-SHA256
];

/// TLS 1.2 signature_algorithms, strongest hash first per key type.
const SIGNATURE_SCHEMES: &[u16] = &[
    0x0403, 0x0804, 0x0401, 0x0503, 0x0805, 0x0501, 0x0806, 0x0601, 0x0203, 0x0201,
];

/// x25519, secp256r1, secp384r1
const SUPPORTED_GROUPS: &[u16] = &[0x001d, 0x0017, 0x0018];

static ALERT_DESCRIPTIONS: &[(u8, &str)] = &[
    (0, "close notify"),
    (10, "unexpected message"),
    (20, "bad record MAC"),
    (21, "decryption failed"),
    (22, "record overflow"),
    (30, "decompression failure"),
    (40, "handshake failure"),
    (42, "bad certificate"),
    (43, "unsupported certificate"),
    (44, "revoked certificate"),
    (45, "expired certificate"),
    (46, "unknown certificate"),
    (47, "illegal parameter"),
    (48, "unknown certificate authority"),
    (49, "access denied"),
    (50, "error decoding message"),
    (51, "error decrypting message"),
    (60, "export restriction"),
    (70, "protocol version not supported"),
    (71, "insufficient security level"),
    (80, "internal error"),
    (86, "inappropriate fallback"),
    (90, "user canceled"),
    (100, "no renegotiation"),
    (109, "missing extension"),
    (110, "unsupported extension"),
    (112, "unrecognized name"),
    (116, "no application protocol"),
];

pub fn alert_description(code: u8) -> String {
    ALERT_DESCRIPTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("alert({code})"))
}

/// Suites offered for `version`, most preferred first.
pub fn cipher_suites(version: TlsVersion) -> Vec<u16> {
    let mut suites = Vec::new();
    if version >= TlsVersion::TLS12 {
        suites.extend_from_slice(TLS12_CIPHER_SUITES);
    }
    suites.extend_from_slice(LEGACY_CIPHER_SUITES);
    suites
}

fn put_u16_list(values: &[u16]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(values.len() * 2 + 2);
    buf.put_u16((values.len() * 2) as u16);
    for value in values {
        buf.put_u16(*value);
    }
    buf
}

fn put_extension(buf: &mut BytesMut, kind: u16, data: &[u8]) {
    buf.put_u16(kind);
    buf.put_u16(data.len() as u16);
    buf.put_slice(data);
}

/// Builds a complete ClientHello record offering only `version`.
///
/// SNI is sent only for DNS names, never for IP literals.
pub fn build_client_hello(version: TlsVersion, server_name: &str) -> Vec<u8> {
    let mut extensions = BytesMut::new();

    if !server_name.is_empty() && server_name.parse::<IpAddr>().is_err() {
        let name = server_name.as_bytes();
        let mut sni = BytesMut::new();
        sni.put_u16((name.len() + 3) as u16);
        sni.put_u8(0); // host_name
        sni.put_u16(name.len() as u16);
        sni.put_slice(name);
        put_extension(&mut extensions, 0x0000, &sni);
    }

    put_extension(&mut extensions, 0x000a, &put_u16_list(SUPPORTED_GROUPS));
    put_extension(&mut extensions, 0x000b, &[1, 0]); // uncompressed points
    if version >= TlsVersion::TLS12 {
        put_extension(&mut extensions, 0x000d, &put_u16_list(SIGNATURE_SCHEMES));
    }
    put_extension(&mut extensions, 0xff01, &[0]); // empty renegotiation_info

    let mut random = [0u8; 32];
    rand::rng().fill_bytes(&mut random);

    let mut body = BytesMut::new();
    body.put_u16(version.0);
    body.put_slice(&random);
    body.put_u8(0); // no session id
    body.put_slice(&put_u16_list(&cipher_suites(version)));
    body.put_u8(1);
    body.put_u8(0); // null compression
    body.put_u16(extensions.len() as u16);
    body.put_slice(&extensions);

    let mut handshake = BytesMut::new();
    handshake.put_u8(HANDSHAKE_CLIENT_HELLO);
    handshake.put_uint(body.len() as u64, 3);
    handshake.put_slice(&body);

    let mut record = BytesMut::with_capacity(handshake.len() + 5);
    record.put_u8(CONTENT_TYPE_HANDSHAKE);
    record.put_u16(TlsVersion::TLS10.0); // record layer version stays at 1.0
    record.put_u16(handshake.len() as u16);
    record.put_slice(&handshake);
    record.to_vec()
}

/// Interprets the first record a server sent back.
///
/// `Ok(())` means a ServerHello for `version`; the error string says why not.
pub fn interpret_response(version: TlsVersion, content_type: u8, fragment: &[u8]) -> Result<(), String> {
    match content_type {
        CONTENT_TYPE_ALERT => match fragment.get(1) {
            Some(code) => Err(format!("remote error: tls: {}", alert_description(*code))),
            None => Err("remote error: tls: truncated alert".to_string()),
        },
        CONTENT_TYPE_HANDSHAKE => {
            if fragment.first() != Some(&HANDSHAKE_SERVER_HELLO) {
                return Err(format!(
                    "tls: unexpected handshake message type {}",
                    fragment.first().copied().unwrap_or_default()
                ));
            }
            let selected = fragment
                .get(4..6)
                .map(|v| u16::from_be_bytes([v[0], v[1]]))
                .ok_or_else(|| "tls: truncated ServerHello".to_string())?;
            if selected == version.0 {
                Ok(())
            } else {
                Err(format!(
                    "tls: server selected unsupported protocol version {selected:x}"
                ))
            }
        }
        other => Err(format!("tls: first record does not look like a TLS handshake (type {other})")),
    }
}

fn read_record(stream: &mut impl Read) -> Result<(u8, Vec<u8>), String> {
    let describe = |e: std::io::Error| match e.kind() {
        ErrorKind::UnexpectedEof => "EOF".to_string(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock => format!("i/o timeout: {e}"),
        _ => e.to_string(),
    };

    let mut header = [0u8; 5];
    stream.read_exact(&mut header).map_err(describe)?;
    let len = u16::from_be_bytes([header[3], header[4]]) as usize;
    if len > MAX_RECORD_LEN {
        return Err(format!("tls: oversized record received with length {len}"));
    }
    let mut fragment = vec![0u8; len];
    stream.read_exact(&mut fragment).map_err(describe)?;
    Ok((header[0], fragment))
}

/// Probes whether `address` accepts a handshake pinned to `version`.
pub fn probe(version: TlsVersion, server_name: &str, address: &str, timeout: Duration) -> Result<(), String> {
    let mut stream = dial(address, timeout).map_err(|e| e.to_string())?;
    let hello = build_client_hello(version, server_name);
    debug!("sending {} ClientHello ({} bytes) to {address}", version.name(), hello.len());
    stream.write_all(&hello).map_err(|e| e.to_string())?;

    let (content_type, fragment) = read_record(&mut stream)?;
    interpret_response(version, content_type, &fragment)
}
