//! Fetching certificates from live TLS servers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use log::{debug, info};
use rustls::crypto::ring::cipher_suite;
use url::Url;

use crate::cert::{CertFormat, Certificate};
use crate::error::{CertLabError, Result};
use crate::tls::{TlsVersion, client};

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Which certificate key type to coax out of a dual-certificate server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SigAlgPreference {
    #[default]
    Auto,
    Ecdsa,
    Rsa,
}

impl FromStr for SigAlgPreference {
    type Err = CertLabError;

    /// Unrecognized values fall back to `Auto`.
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "ecdsa" => SigAlgPreference::Ecdsa,
            "rsa" => SigAlgPreference::Rsa,
            _ => SigAlgPreference::Auto,
        })
    }
}

impl fmt::Display for SigAlgPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SigAlgPreference::Auto => "auto",
            SigAlgPreference::Ecdsa => "ecdsa",
            SigAlgPreference::Rsa => "rsa",
        })
    }
}

/// Options for [`inspect_url`].
#[derive(Debug, Clone, Builder)]
pub struct InspectOptions {
    /// Bare host, `host:port` or URL.
    #[builder(into)]
    pub target: String,
    /// Used when the target carries no port of its own.
    #[builder(default = DEFAULT_PORT)]
    pub port: u16,
    /// Address dialed instead of the target host. SNI still names the target.
    #[builder(into)]
    pub connect_address: Option<String>,
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
    #[builder(default)]
    pub sig_alg: SigAlgPreference,
}

/// Certificates and session parameters from one handshake.
#[derive(Debug, Clone)]
pub struct RemoteInspection {
    pub leaf: Certificate,
    /// Remaining peer certificates, labelled `Chain[1]`, `Chain[2]`, ...
    pub chain: Vec<Certificate>,
    pub protocol: Option<TlsVersion>,
    pub cipher_suite: Option<String>,
}

/// Adds `https://` when the target has no scheme.
pub fn normalize_target(target: &str) -> Result<Url> {
    let text = if target.contains("://") {
        target.to_string()
    } else {
        format!("https://{target}")
    };
    Url::parse(&text).map_err(|e| CertLabError::InvalidInput(format!("invalid URL: {e}")))
}

/// Server name and dial address for a normalized target.
///
/// The dial address is the connect address with `port`, else the URL's own
/// host and explicit port, else the URL host with `port`.
pub fn resolve_endpoints(url: &Url, port: u16, connect_address: Option<&str>) -> Result<(String, String)> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| CertLabError::InvalidInput(format!("invalid URL: no host in {url}")))?;
    let server_name = host.trim_start_matches('[').trim_end_matches(']').to_string();

    let address = match (connect_address.filter(|a| !a.is_empty()), url.port()) {
        (Some(connect), _) => format!("{connect}:{port}"),
        (None, Some(url_port)) => format!("{host}:{url_port}"),
        (None, None) => format!("{host}:{port}"),
    };
    Ok((server_name, address))
}

fn client_config_for(preference: SigAlgPreference) -> Result<std::sync::Arc<rustls::ClientConfig>> {
    match preference {
        SigAlgPreference::Auto => client::client_config(rustls::ALL_VERSIONS, None),
        SigAlgPreference::Ecdsa => client::client_config(
            &[&rustls::version::TLS12],
            Some(vec![
                cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
                cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
            ]),
        ),
        SigAlgPreference::Rsa => client::client_config(
            &[&rustls::version::TLS12],
            Some(vec![
                cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
                cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
                cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            ]),
        ),
    }
}

/// Connects to the target and returns the certificates it presents.
///
/// Nothing the server sends is validated, so expired or self-signed
/// certificates come back like any other.
pub fn inspect_url(options: &InspectOptions) -> Result<RemoteInspection> {
    let url = normalize_target(&options.target)?;
    let (server_name, address) =
        resolve_endpoints(&url, options.port, options.connect_address.as_deref())?;
    debug!(
        "inspecting {url} via {address} (sni {server_name}, preference {})",
        options.sig_alg
    );

    let config = client_config_for(options.sig_alg)?;
    let handshake = client::handshake(config, &server_name, &address, options.timeout)?;

    let mut certs = handshake.peer_certificates.into_iter();
    let leaf_der = certs.next().ok_or(CertLabError::NoCertificates)?;
    let leaf = Certificate::from_der(leaf_der.to_vec(), url.to_string(), CertFormat::Der)?;
    let chain = certs
        .enumerate()
        .map(|(i, der)| Certificate::from_der(der.to_vec(), format!("Chain[{}]", i + 1), CertFormat::Der))
        .collect::<Result<Vec<_>>>()?;

    info!(
        "{url}: {} presented {} certificate(s)",
        leaf.subject().common_name,
        chain.len() + 1
    );
    Ok(RemoteInspection {
        leaf,
        chain,
        protocol: handshake.protocol.map(TlsVersion),
        cipher_suite: handshake.cipher_suite,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("example.com").unwrap().as_str(), "https://example.com/");
        assert_eq!(
            normalize_target("https://example.com:8443/x").unwrap().port(),
            Some(8443)
        );
    }

    #[test]
    fn test_resolve_endpoints() {
        let url = normalize_target("example.com").unwrap();
        assert_eq!(
            resolve_endpoints(&url, 443, None).unwrap(),
            ("example.com".to_string(), "example.com:443".to_string())
        );

        let url = normalize_target("example.com:8443").unwrap();
        assert_eq!(
            resolve_endpoints(&url, 443, None).unwrap().1,
            "example.com:8443"
        );

        let (sni, address) = resolve_endpoints(&url, 9443, Some("127.0.0.1")).unwrap();
        assert_eq!(sni, "example.com");
        assert_eq!(address, "127.0.0.1:9443");
    }

    #[test]
    fn test_sig_alg_parsing() {
        assert_eq!("ECDSA".parse::<SigAlgPreference>().unwrap(), SigAlgPreference::Ecdsa);
        assert_eq!("rsa".parse::<SigAlgPreference>().unwrap(), SigAlgPreference::Rsa);
        assert_eq!("whatever".parse::<SigAlgPreference>().unwrap(), SigAlgPreference::Auto);
    }

    #[test]
    fn test_connection_refused_is_connection_error() {
        let options = InspectOptions::builder()
            .target("localhost")
            .port(1)
            .connect_address("127.0.0.1")
            .timeout(Duration::from_millis(500))
            .build();
        assert!(matches!(
            inspect_url(&options),
            Err(CertLabError::ConnectionError(_))
        ));
    }
}
