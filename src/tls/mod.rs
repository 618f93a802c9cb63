//! Protocol version probing.
//!
//! Each of the four TLS versions is tried on its own connection, oldest
//! first. TLS 1.2 and 1.3 use full handshakes, older versions go through
//! [`legacy`]. A rejected TLS 1.2 handshake is retried through [`legacy`]
//! with CBC suites on offer.

pub(crate) mod client;
pub mod legacy;

use std::fmt;
use std::time::Duration;

use bon::Builder;
use log::{debug, warn};

use crate::error::{CertLabError, Result};
use crate::remote::{DEFAULT_PORT, DEFAULT_TIMEOUT};

/// A protocol version by its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TlsVersion(pub u16);

impl TlsVersion {
    pub const TLS10: TlsVersion = TlsVersion(0x0301);
    pub const TLS11: TlsVersion = TlsVersion(0x0302);
    pub const TLS12: TlsVersion = TlsVersion(0x0303);
    pub const TLS13: TlsVersion = TlsVersion(0x0304);

    /// Probe order, oldest to newest.
    pub const ALL: [TlsVersion; 4] = [Self::TLS10, Self::TLS11, Self::TLS12, Self::TLS13];

    /// "TLS 1.x", or an empty string for codes outside the four known versions.
    pub fn name(&self) -> &'static str {
        VERSION_NAMES
            .iter()
            .find(|(v, _)| v == self)
            .map(|(_, name)| *name)
            .unwrap_or("")
    }

    /// The `0x%04x` form of the wire code.
    pub fn hex(&self) -> String {
        format!("0x{:04x}", self.0)
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            "" => f.write_str(&self.hex()),
            name => f.write_str(name),
        }
    }
}

static VERSION_NAMES: &[(TlsVersion, &str)] = &[
    (TlsVersion::TLS10, "TLS 1.0"),
    (TlsVersion::TLS11, "TLS 1.1"),
    (TlsVersion::TLS12, "TLS 1.2"),
    (TlsVersion::TLS13, "TLS 1.3"),
];

/// Result of probing one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsVersionInfo {
    pub version: TlsVersion,
    pub name: String,
    pub supported: bool,
    /// Why the handshake failed, `None` when supported.
    pub error: Option<String>,
}

/// Aggregate probe result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsResult {
    pub host: String,
    pub port: u16,
    /// Always the four versions, oldest first.
    pub versions: Vec<TlsVersionInfo>,
    pub min_supported: Option<TlsVersion>,
    pub max_supported: Option<TlsVersion>,
}

/// Options for [`check_tls_versions`].
#[derive(Debug, Clone, Builder)]
pub struct ProbeOptions {
    #[builder(into)]
    pub host: String,
    #[builder(default = DEFAULT_PORT)]
    pub port: u16,
    /// Budget for each version attempt, not for the whole probe.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
}

fn probe_version(version: TlsVersion, host: &str, address: &str, timeout: Duration) -> std::result::Result<(), String> {
    let rustls_version = match version {
        TlsVersion::TLS12 => &rustls::version::TLS12,
        TlsVersion::TLS13 => &rustls::version::TLS13,
        _ => return legacy::probe(version, host, address, timeout),
    };

    let config = client::client_config(&[rustls_version], None).map_err(|e| e.to_string())?;
    match client::handshake(config, host, address, timeout) {
        Ok(_) => Ok(()),
        // The server may only accept CBC suites, which rustls does not offer.
        Err(CertLabError::TlsError(e)) if version == TlsVersion::TLS12 => {
            debug!("{address}: full {version} handshake failed ({e}), retrying with CBC suites");
            legacy::probe(version, host, address, timeout)
        }
        Err(e) => Err(e.to_string()),
    }
}

/// Tries each protocol version against `host:port`.
///
/// A failed attempt is recorded and never stops the remaining ones.
pub fn check_tls_versions(options: &ProbeOptions) -> Result<TlsResult> {
    let address = format!("{}:{}", options.host, options.port);
    let mut result = TlsResult {
        host: options.host.clone(),
        port: options.port,
        versions: Vec::with_capacity(TlsVersion::ALL.len()),
        min_supported: None,
        max_supported: None,
    };

    for version in TlsVersion::ALL {
        let outcome = probe_version(version, &options.host, &address, options.timeout);
        match &outcome {
            Ok(()) => debug!("{address} supports {version}"),
            Err(e) => warn!("{address} rejected {version}: {e}"),
        }

        let supported = outcome.is_ok();
        if supported {
            result.min_supported = Some(result.min_supported.map_or(version, |v| v.min(version)));
            result.max_supported = Some(result.max_supported.map_or(version, |v| v.max(version)));
        }
        result.versions.push(TlsVersionInfo {
            version,
            name: version.name().to_string(),
            supported,
            error: outcome.err(),
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_names() {
        assert_eq!(TlsVersion::TLS10.name(), "TLS 1.0");
        assert_eq!(TlsVersion::TLS13.to_string(), "TLS 1.3");
        assert_eq!(TlsVersion(0x0300).name(), "");
        assert_eq!(TlsVersion(0x0300).to_string(), "0x0300");
        assert_eq!(TlsVersion::TLS12.hex(), "0x0303");
    }

    #[test]
    fn test_versions_are_ordered() {
        let mut sorted = TlsVersion::ALL;
        sorted.sort();
        assert_eq!(sorted, TlsVersion::ALL);
    }

    #[test]
    fn test_unreachable_host_marks_every_version_unsupported() {
        // Port 1 on loopback is reliably closed.
        let options = ProbeOptions::builder()
            .host("127.0.0.1")
            .port(1)
            .timeout(Duration::from_millis(500))
            .build();
        let result = check_tls_versions(&options).unwrap();
        assert_eq!(result.versions.len(), 4);
        assert!(result.versions.iter().all(|v| !v.supported && v.error.is_some()));
        assert_eq!(result.min_supported, None);
        assert_eq!(result.max_supported, None);
    }
}
