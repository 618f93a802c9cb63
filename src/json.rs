//! Flat, serializable projections of the value objects.
//!
//! Field names are snake_case, timestamps RFC 3339, and empty lists are left
//! out of the output.

use serde::Serialize;
use time::OffsetDateTime;

use crate::cert::Certificate;
use crate::cert::params::DistinguishedName;
use crate::csr::CsrInfo;
use crate::error::Result;
use crate::remote::RemoteInspection;
use crate::tls::{TlsResult, TlsVersionInfo};
use crate::verify::VerificationResult;

/// Conversion into a JSON projection.
pub trait ToJson {
    type Json: Serialize;

    fn to_json(&self) -> Self::Json;

    /// Pretty-printed JSON.
    fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_json())?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonSubject {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub common_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub organization: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub organizational_unit: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub country: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub province: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locality: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub street_address: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub postal_code: Vec<String>,
}

impl From<DistinguishedName> for JsonSubject {
    fn from(name: DistinguishedName) -> Self {
        Self {
            common_name: name.common_name,
            organization: name.organization,
            organizational_unit: name.organizational_unit,
            country: name.country,
            province: name.province,
            locality: name.locality,
            street_address: name.street_address,
            postal_code: name.postal_code,
        }
    }
}

/// Chain entry summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonCertSummary {
    pub subject: String,
    pub issuer: String,
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    pub is_expired: bool,
    pub serial_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonCertificate {
    pub subject: JsonSubject,
    pub issuer: JsonSubject,
    pub serial_number: String,
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    pub is_ca: bool,
    pub is_expired: bool,
    pub days_until_expiry: i64,
    pub signature_algorithm: String,
    pub public_key_algorithm: String,
    pub public_key_size: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_usage: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ext_key_usage: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<JsonCertSummary>,
}

impl Certificate {
    pub fn summary(&self) -> JsonCertSummary {
        JsonCertSummary {
            subject: self.subject().to_string(),
            issuer: self.issuer().to_string(),
            not_before: self.not_before(),
            not_after: self.not_after(),
            is_expired: self.is_expired,
            serial_number: self.serial_hex(),
        }
    }
}

impl ToJson for Certificate {
    type Json = JsonCertificate;

    fn to_json(&self) -> JsonCertificate {
        let sans = self.sans();
        let key = self.public_key_info();
        JsonCertificate {
            subject: self.subject().into(),
            issuer: self.issuer().into(),
            serial_number: self.serial_hex(),
            not_before: self.not_before(),
            not_after: self.not_after(),
            is_ca: self.is_ca(),
            is_expired: self.is_expired,
            days_until_expiry: self.days_until_expiry,
            signature_algorithm: self.signature_algorithm_name(),
            public_key_algorithm: key.algorithm_name().to_string(),
            public_key_size: key.bits(),
            dns_names: sans.dns,
            ip_addresses: sans.ips.iter().map(|ip| ip.to_string()).collect(),
            email_addresses: sans.emails,
            uris: sans.uris,
            key_usage: self.key_usage_names().into_iter().map(String::from).collect(),
            ext_key_usage: self
                .ext_key_usage_names()
                .into_iter()
                .map(String::from)
                .collect(),
            source: self.source.clone(),
            format: self.format.to_string(),
            chain: Vec::new(),
        }
    }
}

impl ToJson for RemoteInspection {
    type Json = JsonCertificate;

    /// The leaf, with the chain folded in as summaries.
    fn to_json(&self) -> JsonCertificate {
        JsonCertificate {
            chain: self.chain.iter().map(Certificate::summary).collect(),
            ..self.leaf.to_json()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonCsrInfo {
    pub subject: JsonSubject,
    pub signature_algorithm: String,
    pub public_key_algorithm: String,
    pub public_key_size: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,
}

impl ToJson for CsrInfo {
    type Json = JsonCsrInfo;

    fn to_json(&self) -> JsonCsrInfo {
        let mut json = JsonCsrInfo {
            subject: self.subject.clone().into(),
            signature_algorithm: self.signature_algorithm.clone(),
            public_key_algorithm: self.public_key_algorithm.clone(),
            public_key_size: self.key_size,
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            email_addresses: Vec::new(),
            uris: Vec::new(),
        };
        for san in &self.sans {
            if let Some(ip) = san.strip_prefix("IP:") {
                json.ip_addresses.push(ip.to_string());
            } else if let Some(email) = san.strip_prefix("email:") {
                json.email_addresses.push(email.to_string());
            } else {
                json.dns_names.push(san.clone());
            }
        }
        json
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonVerificationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub certificate: JsonCertificate,
}

impl ToJson for VerificationResult {
    type Json = JsonVerificationResult;

    fn to_json(&self) -> JsonVerificationResult {
        JsonVerificationResult {
            is_valid: self.is_valid,
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
            certificate: self.certificate.to_json(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonTlsVersionInfo {
    /// Wire code as `0x%04x`.
    pub version: String,
    pub name: String,
    pub supported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&TlsVersionInfo> for JsonTlsVersionInfo {
    fn from(info: &TlsVersionInfo) -> Self {
        Self {
            version: info.version.hex(),
            name: info.name.clone(),
            supported: info.supported,
            error: info.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonTlsResult {
    pub host: String,
    pub port: u16,
    pub versions: Vec<JsonTlsVersionInfo>,
    /// Version name, empty when nothing was supported.
    pub min_supported: String,
    pub max_supported: String,
}

impl ToJson for TlsResult {
    type Json = JsonTlsResult;

    fn to_json(&self) -> JsonTlsResult {
        JsonTlsResult {
            host: self.host.clone(),
            port: self.port,
            versions: self.versions.iter().map(JsonTlsVersionInfo::from).collect(),
            min_supported: self
                .min_supported
                .map(|v| v.name().to_string())
                .unwrap_or_default(),
            max_supported: self
                .max_supported
                .map(|v| v.name().to_string())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::TlsVersion;

    #[test]
    fn test_tls_result_json_shape() {
        let result = TlsResult {
            host: "example.com".to_string(),
            port: 443,
            versions: vec![
                TlsVersionInfo {
                    version: TlsVersion::TLS11,
                    name: "TLS 1.1".to_string(),
                    supported: false,
                    error: Some("remote error: tls: protocol version not supported".to_string()),
                },
                TlsVersionInfo {
                    version: TlsVersion::TLS13,
                    name: "TLS 1.3".to_string(),
                    supported: true,
                    error: None,
                },
            ],
            min_supported: Some(TlsVersion::TLS13),
            max_supported: Some(TlsVersion::TLS13),
        };

        let value: serde_json::Value = serde_json::from_str(&result.to_json_string().unwrap()).unwrap();
        assert_eq!(value["versions"][0]["version"], "0x0302");
        assert!(value["versions"][1].get("error").is_none());
        assert_eq!(value["min_supported"], "TLS 1.3");
    }

    #[test]
    fn test_empty_probe_has_empty_names() {
        let result = TlsResult {
            host: "h".to_string(),
            port: 1,
            versions: Vec::new(),
            min_supported: None,
            max_supported: None,
        };
        let json = result.to_json();
        assert_eq!(json.min_supported, "");
        assert_eq!(json.max_supported, "");
    }

    #[test]
    fn test_csr_sans_split_by_prefix() {
        let info = CsrInfo {
            subject: DistinguishedName::builder()
                .common_name("x".to_string())
                .build(),
            sans: vec![
                "a.example.com".to_string(),
                "IP:10.0.0.1".to_string(),
                "email:a@example.com".to_string(),
            ],
            signature_algorithm: "SHA256-RSA".to_string(),
            public_key_algorithm: "RSA".to_string(),
            key_size: 2048,
        };
        let json = info.to_json();
        assert_eq!(json.dns_names, vec!["a.example.com"]);
        assert_eq!(json.ip_addresses, vec!["10.0.0.1"]);
        assert_eq!(json.email_addresses, vec!["a@example.com"]);
        assert!(json.uris.is_empty());
    }
}
