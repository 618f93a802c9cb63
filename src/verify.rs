//! Certificate verification: validity window, hostname and chain of trust.
//!
//! Every applicable check runs. Failures are collected in the result instead
//! of aborting, so a single call reports everything wrong with a certificate.

use std::fs;
use std::net::IpAddr;
use std::path::Path;

use log::debug;
use rustls::RootCertStore;
use rustls::client::{verify_server_cert_signed_by_trust_anchor, verify_server_name};
use rustls::crypto::ring::default_provider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use time::OffsetDateTime;

use crate::cert::{CertFormat, Certificate, inspect_file};
use crate::error::{CertLabError, Result};
use crate::pem_utils;

/// Certificates expiring within this many days get a warning.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// Outcome of [`verify`].
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub certificate: Certificate,
    /// False as soon as any check fails.
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl VerificationResult {
    fn new(certificate: Certificate) -> Self {
        Self {
            certificate,
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn fail(&mut self, message: String) {
        debug!("{}: {message}", self.certificate.source);
        self.is_valid = false;
        self.errors.push(message);
    }
}

/// Verifies the certificate at `cert_path`.
///
/// A CA file that cannot be read or holds no usable certificate is an error
/// for the whole call. Verification failures are reported in the result.
pub fn verify(
    cert_path: impl AsRef<Path>,
    ca_path: Option<&Path>,
    hostname: Option<&str>,
) -> Result<VerificationResult> {
    let certificate = inspect_file(cert_path)?;
    let roots = match ca_path {
        Some(path) => Some(load_ca_bundle(path)?),
        None => None,
    };
    Ok(verify_certificate(certificate, roots.as_deref(), hostname))
}

/// Runs the checks against an already parsed certificate.
///
/// `roots` enables chain verification. An empty hostname counts as absent.
pub fn verify_certificate(
    certificate: Certificate,
    roots: Option<&[Certificate]>,
    hostname: Option<&str>,
) -> VerificationResult {
    let hostname = hostname.filter(|h| !h.is_empty());
    let mut result = VerificationResult::new(certificate);
    let now = OffsetDateTime::now_utc();

    if result.certificate.not_before() > now {
        result.fail("Certificate is not yet valid".to_string());
    }
    if result.certificate.not_after() < now {
        result.fail("Certificate has expired".to_string());
    }

    if let Some(hostname) = hostname {
        if let Err(e) = verify_hostname(&result.certificate, hostname) {
            result.fail(format!("Hostname verification failed: {e}"));
        }
    }

    if let Some(roots) = roots {
        if let Err(e) = verify_chain(&result.certificate, roots, hostname) {
            result.fail(format!("Chain verification failed: {e}"));
        }
    }

    let days = result.certificate.days_until_expiry;
    if !result.certificate.is_expired && days <= EXPIRY_WARNING_DAYS {
        result
            .warnings
            .push(format!("Certificate expires in {days} days"));
    }

    result
}

/// Loads a CA file as a PEM bundle, falling back to a single DER certificate.
pub fn load_ca_bundle(path: &Path) -> Result<Vec<Certificate>> {
    let data = fs::read(path).map_err(|e| CertLabError::io("failed to read CA file", e))?;
    let source = path.display().to_string();

    let blocks = pem_utils::certificate_blocks(&data);
    let certs: Vec<Certificate> = if blocks.is_empty() {
        Certificate::from_der(data, source.clone(), CertFormat::Der)
            .into_iter()
            .collect()
    } else {
        blocks
            .into_iter()
            .filter_map(|der| Certificate::from_der(der, source.clone(), CertFormat::Pem).ok())
            .collect()
    };

    if certs.is_empty() {
        return Err(CertLabError::ParseError(
            "failed to parse CA certificate(s)".to_string(),
        ));
    }
    debug!("loaded {} CA certificate(s) from {source}", certs.len());
    Ok(certs)
}

/// Matches `hostname` against the certificate's names.
///
/// IP literals match IP SANs only. DNS names match SAN DNS entries exactly
/// (ASCII case-insensitive) or through a wildcard covering one left-most
/// label. The common name is consulted only when the certificate has no SANs.
pub fn verify_hostname(certificate: &Certificate, hostname: &str) -> Result<()> {
    let sans = certificate.sans();
    let host = hostname.trim_end_matches('.');

    if let Ok(ip) = host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        if sans.ips.contains(&ip) {
            return Ok(());
        }
        let valid: Vec<String> = sans.ips.iter().map(|ip| ip.to_string()).collect();
        return Err(hostname_mismatch(&valid, hostname));
    }

    let mut names = sans.dns.clone();
    if sans.is_empty() {
        let cn = certificate.subject().common_name;
        if !cn.is_empty() {
            names.push(cn);
        }
    }

    if names.iter().any(|pattern| matches_hostname(pattern, host)) {
        return Ok(());
    }
    Err(hostname_mismatch(&names, hostname))
}

fn hostname_mismatch(valid: &[String], hostname: &str) -> CertLabError {
    if valid.is_empty() {
        CertLabError::CertificateError(format!(
            "certificate is not valid for any names, but wanted to match {hostname}"
        ))
    } else {
        CertLabError::CertificateError(format!(
            "certificate is valid for {}, not {hostname}",
            valid.join(", ")
        ))
    }
}

fn matches_hostname(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.');
    if pattern.eq_ignore_ascii_case(host) {
        return true;
    }

    let Some(suffix) = pattern.strip_prefix("*.") else {
        return false;
    };
    match host.split_once('.') {
        Some((label, rest)) => !label.is_empty() && rest.eq_ignore_ascii_case(suffix),
        None => false,
    }
}

/// Path validation to one of `roots` through the WebPKI verifier.
///
/// A certificate that is itself one of the roots is trusted as long as it is
/// inside its validity window.
fn verify_chain(certificate: &Certificate, roots: &[Certificate], hostname: Option<&str>) -> Result<()> {
    let end_entity = CertificateDer::from(certificate.to_der());
    let parsed = ParsedCertificate::try_from(&end_entity)?;

    if roots.iter().any(|root| root.to_der() == certificate.to_der()) {
        debug!("{} is itself a trust anchor", certificate.source);
        let now = OffsetDateTime::now_utc();
        if certificate.not_before() > now || certificate.not_after() < now {
            return Err(CertLabError::CertificateError(
                "certificate has expired or is not yet valid".to_string(),
            ));
        }
    } else {
        let mut store = RootCertStore::empty();
        let (added, ignored) = store.add_parsable_certificates(
            roots
                .iter()
                .map(|root| CertificateDer::from(root.to_der().to_vec())),
        );
        debug!("trust store: {added} anchors, {ignored} ignored");
        if added == 0 {
            return Err(CertLabError::CertificateError(
                "no usable trust anchors".to_string(),
            ));
        }

        let provider = default_provider();
        verify_server_cert_signed_by_trust_anchor(
            &parsed,
            &store,
            &[],
            UnixTime::now(),
            provider.signature_verification_algorithms.all,
        )?;
    }

    if let Some(hostname) = hostname {
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|e| CertLabError::InvalidInput(format!("invalid hostname {hostname:?}: {e}")))?;
        verify_server_name(&parsed, &server_name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_matching() {
        assert!(matches_hostname("*.example.com", "www.example.com"));
        assert!(matches_hostname("*.example.com", "API.Example.com"));
        assert!(!matches_hostname("*.example.com", "example.com"));
        assert!(!matches_hostname("*.example.com", "a.b.example.com"));
        assert!(matches_hostname("example.com.", "example.com"));
        assert!(!matches_hostname("example.com", "example.org"));
    }
}
