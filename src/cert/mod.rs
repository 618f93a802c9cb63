pub mod extensions;
pub mod names;
pub mod params;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use der::{Decode, Tag};
use extensions::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use log::debug;
use params::DistinguishedName;
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{CertLabError, Result};
use crate::key::PublicKeyInfo;
use crate::pem_utils;
use crate::san::SanSet;

/// Represents the supported signature algorithms for certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> const_oid::ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRSA => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
        }
    }

    /// The `AlgorithmIdentifier` placed in the certificate.
    ///
    /// RSA carries explicit NULL parameters, ECDSA carries none.
    pub fn algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        let parameters = match self {
            SignatureAlgorithm::Sha256WithRSA => Some(der::Any::new(Tag::Null, Vec::new())?),
            SignatureAlgorithm::Sha256WithECDSA | SignatureAlgorithm::Sha384WithECDSA => None,
        };
        Ok(AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters,
        })
    }
}

/// How a certificate was encoded at its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertFormat {
    Pem,
    Der,
}

impl fmt::Display for CertFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertFormat::Pem => f.write_str("PEM"),
            CertFormat::Der => f.write_str("DER"),
        }
    }
}

impl FromStr for CertFormat {
    type Err = CertLabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pem" => Ok(CertFormat::Pem),
            "der" => Ok(CertFormat::Der),
            _ => Err(CertLabError::InvalidInput(format!("unsupported format: {s}"))),
        }
    }
}

/// A parsed X.509 certificate plus where it came from.
///
/// Expiry fields are computed once at construction and never refreshed.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
    raw: Vec<u8>,
    /// File path, URL or chain position label.
    pub source: String,
    pub format: CertFormat,
    pub is_expired: bool,
    /// Whole days until `notAfter`, negative once expired.
    pub days_until_expiry: i64,
}

impl Certificate {
    /// Wraps raw DER bytes, failing if they are not a certificate.
    pub fn from_der(raw: Vec<u8>, source: impl Into<String>, format: CertFormat) -> Result<Self> {
        let inner = CertificateInner::from_der(&raw).map_err(|e| match format {
            CertFormat::Pem => CertLabError::ParseError(format!("failed to parse certificate: {e}")),
            CertFormat::Der => CertLabError::ParseError(format!("failed to parse as PEM or DER: {e}")),
        })?;

        let now = OffsetDateTime::now_utc();
        let not_after = to_offset_date_time(&inner.tbs_certificate.validity.not_after);
        let remaining = (not_after - now).whole_seconds();

        Ok(Self {
            inner,
            raw,
            source: source.into(),
            format,
            is_expired: not_after < now,
            days_until_expiry: remaining.div_euclid(86_400),
        })
    }

    /// Detects PEM or DER and parses accordingly.
    ///
    /// A buffer holding a PEM block is never retried as raw DER.
    pub fn parse(data: &[u8], source: impl Into<String>) -> Result<Self> {
        match pem_utils::decode_first(data) {
            Some(block) => Self::from_der(block.into_contents(), source, CertFormat::Pem),
            None => Self::from_der(data.to_vec(), source, CertFormat::Der),
        }
    }

    /// The exact DER bytes the certificate was parsed from.
    pub fn to_der(&self) -> &[u8] {
        &self.raw
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> String {
        pem_utils::encode(pem_utils::CERTIFICATE, &self.raw)
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    /// Lowercase hex serial without leading zeros.
    pub fn serial_hex(&self) -> String {
        let hex: String = self
            .inner
            .tbs_certificate
            .serial_number
            .as_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let trimmed = hex.trim_start_matches('0');
        if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn not_before(&self) -> OffsetDateTime {
        to_offset_date_time(&self.inner.tbs_certificate.validity.not_before)
    }

    pub fn not_after(&self) -> OffsetDateTime {
        to_offset_date_time(&self.inner.tbs_certificate.validity.not_after)
    }

    /// Finds and decodes an extension, `None` when absent.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Option<Result<E>> {
        self.inner
            .tbs_certificate
            .extensions
            .as_ref()?
            .iter()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
    }

    pub fn is_ca(&self) -> bool {
        matches!(
            self.extension::<BasicConstraints>(),
            Some(Ok(BasicConstraints { is_ca: true, .. }))
        )
    }

    /// SAN entries split by type; empty when the extension is missing or unreadable.
    pub fn sans(&self) -> SanSet {
        match self.extension::<SubjectAltName>() {
            Some(Ok(san)) => san.names,
            Some(Err(e)) => {
                debug!("ignoring unreadable SAN extension in {}: {e}", self.source);
                SanSet::default()
            }
            None => SanSet::default(),
        }
    }

    pub fn key_usage_names(&self) -> Vec<&'static str> {
        match self.extension::<KeyUsage>() {
            Some(Ok(usage)) => names::key_usage_names(usage.0),
            _ => Vec::new(),
        }
    }

    pub fn ext_key_usage_names(&self) -> Vec<&'static str> {
        match self.extension::<ExtendedKeyUsage>() {
            Some(Ok(eku)) => eku.usage.iter().filter_map(|u| u.name()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn subject_key_id(&self) -> Option<Vec<u8>> {
        match self.extension::<SubjectKeyIdentifier>() {
            Some(Ok(ski)) => Some(ski.0),
            _ => None,
        }
    }

    pub fn signature_algorithm_name(&self) -> String {
        names::signature_algorithm_name(&self.inner.signature_algorithm.oid)
    }

    pub fn public_key_info(&self) -> PublicKeyInfo {
        PublicKeyInfo::from_spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Writes the certificate to `path` in the requested encoding.
    pub fn write_to(&self, path: &Path, format: CertFormat) -> Result<()> {
        match format {
            CertFormat::Pem => crate::output::write_file(path, self.to_pem().as_bytes()),
            CertFormat::Der => crate::output::write_file(path, &self.raw),
        }
    }
}

pub(crate) fn to_offset_date_time(t: &x509_cert::time::Time) -> OffsetDateTime {
    OffsetDateTime::from(t.to_system_time())
}

/// Reads and parses a certificate file in either encoding.
pub fn inspect_file(path: impl AsRef<Path>) -> Result<Certificate> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| CertLabError::io("failed to read file", e))?;
    let cert = Certificate::parse(&data, path.display().to_string())?;
    debug!("parsed {} certificate from {}", cert.format, cert.source);
    Ok(cert)
}

/// Re-encodes a certificate file as PEM or DER.
///
/// The certificate bytes themselves are carried over unchanged.
pub fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    format: CertFormat,
) -> Result<Certificate> {
    let cert = inspect_file(input)?;
    cert.write_to(output.as_ref(), format)?;
    Ok(cert)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cert_format_parsing() {
        assert_eq!("PEM".parse::<CertFormat>().unwrap(), CertFormat::Pem);
        assert_eq!("der".parse::<CertFormat>().unwrap(), CertFormat::Der);
        assert!("p12".parse::<CertFormat>().is_err());
        assert_eq!(CertFormat::Der.to_string(), "DER");
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        let err = Certificate::parse(b"definitely not a certificate", "mem").unwrap_err();
        assert!(matches!(err, CertLabError::ParseError(_)));
    }

    #[test]
    fn test_pem_with_bad_payload_is_not_retried_as_der() {
        let text = pem_utils::encode(pem_utils::CERTIFICATE, b"\x30\x03\x02\x01\x01");
        let err = Certificate::parse(text.as_bytes(), "mem").unwrap_err();
        assert!(err.to_string().contains("failed to parse certificate"));
    }

    #[test]
    fn test_rsa_algorithm_identifier_has_null_parameters() {
        use der::Tagged;

        let id = SignatureAlgorithm::Sha256WithRSA.algorithm_identifier().unwrap();
        assert_eq!(id.parameters.unwrap().tag(), Tag::Null);
        let id = SignatureAlgorithm::Sha384WithECDSA.algorithm_identifier().unwrap();
        assert!(id.parameters.is_none());
    }
}
