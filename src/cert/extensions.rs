use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use const_oid::AssociatedOid;
use const_oid::db::rfc5912;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use sha1::{Digest, Sha1};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::CertLabError;
use crate::san::SanSet;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use certlab::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// use certlab::san;
/// let san = SubjectAltName { names: san::classify(&["example.com", "IP:10.0.0.1"]) };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertLabError>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertLabError>
    where
        Self: Sized;
}

fn ia5(value: &str) -> Result<Ia5String, CertLabError> {
    Ia5String::try_from(value.to_string())
        .map_err(|e| CertLabError::InvalidInput(format!("{value:?} is not IA5: {e}")))
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// Name forms other than DNS, IP, email and URI are ignored when decoding.
#[derive(Debug, Clone, Default)]
pub struct SubjectAltName {
    pub names: SanSet,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertLabError> {
        let mut general_names = Vec::with_capacity(self.names.len());

        for dns in &self.names.dns {
            general_names.push(GeneralName::DnsName(ia5(dns)?));
        }
        for email in &self.names.emails {
            general_names.push(GeneralName::Rfc822Name(ia5(email)?));
        }
        for ip in &self.names.ips {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            general_names.push(GeneralName::IpAddress(OctetString::new(octets)?));
        }
        for uri in &self.names.uris {
            general_names.push(GeneralName::UniformResourceIdentifier(ia5(uri)?));
        }

        Ok(x509_cert::ext::pkix::SubjectAltName(general_names).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertLabError> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let mut names = SanSet::default();

        for name in san.0.iter() {
            match name {
                GeneralName::DnsName(dns) => names.dns.push(dns.to_string()),
                GeneralName::Rfc822Name(email) => names.emails.push(email.to_string()),
                GeneralName::UniformResourceIdentifier(uri) => names.uris.push(uri.to_string()),
                GeneralName::IpAddress(octets) => match octets.as_bytes() {
                    bytes if bytes.len() == 4 => {
                        let mut v4 = [0u8; 4];
                        v4.copy_from_slice(bytes);
                        names.ips.push(IpAddr::V4(Ipv4Addr::from(v4)));
                    }
                    bytes if bytes.len() == 16 => {
                        let mut v6 = [0u8; 16];
                        v6.copy_from_slice(bytes);
                        names.ips.push(IpAddr::V6(Ipv6Addr::from(v6)));
                    }
                    bytes => {
                        return Err(CertLabError::DecodingError(format!(
                            "IP address SAN of {} bytes",
                            bytes.len()
                        )));
                    }
                },
                _ => {}
            }
        }

        Ok(Self { names })
    }
}

/// Represents the Basic Constraints extension.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed, `None` for no limit.
#[derive(Debug, Clone, Default)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertLabError> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self, CertLabError> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertLabError> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertLabError> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
#[derive(Debug, Clone, Default)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertLabError> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertLabError> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku.0.iter().map(|oid| ExtendedKeyUsageOption::from(*oid)).collect();
        Ok(Self { usage })
    }
}

const ANY_EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37.0");
const ID_KP_IPSEC_END_SYSTEM: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.5");
const ID_KP_IPSEC_TUNNEL: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.6");
const ID_KP_IPSEC_USER: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.7");
const MS_SERVER_GATED_CRYPTO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.10.3.3");
const NS_SERVER_GATED_CRYPTO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113730.4.1");

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    Any,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    IpsecEndSystem,
    IpsecTunnel,
    IpsecUser,
    TimeStamping,
    OcspSigning,
    MicrosoftServerGatedCrypto,
    NetscapeServerGatedCrypto,
    Other(ObjectIdentifier),
}

static EXTENDED_KEY_USAGES: &[(ExtendedKeyUsageOption, ObjectIdentifier, &str)] = &[
    (ExtendedKeyUsageOption::Any, ANY_EXTENDED_KEY_USAGE, "Any"),
    (ExtendedKeyUsageOption::ServerAuth, rfc5912::ID_KP_SERVER_AUTH, "Server Authentication"),
    (ExtendedKeyUsageOption::ClientAuth, rfc5912::ID_KP_CLIENT_AUTH, "Client Authentication"),
    (ExtendedKeyUsageOption::CodeSigning, rfc5912::ID_KP_CODE_SIGNING, "Code Signing"),
    (ExtendedKeyUsageOption::EmailProtection, rfc5912::ID_KP_EMAIL_PROTECTION, "Email Protection"),
    (ExtendedKeyUsageOption::IpsecEndSystem, ID_KP_IPSEC_END_SYSTEM, "IPSec End System"),
    (ExtendedKeyUsageOption::IpsecTunnel, ID_KP_IPSEC_TUNNEL, "IPSec Tunnel"),
    (ExtendedKeyUsageOption::IpsecUser, ID_KP_IPSEC_USER, "IPSec User"),
    (ExtendedKeyUsageOption::TimeStamping, rfc5912::ID_KP_TIME_STAMPING, "Time Stamping"),
    (ExtendedKeyUsageOption::OcspSigning, rfc5912::ID_KP_OCSP_SIGNING, "OCSP Signing"),
    (
        ExtendedKeyUsageOption::MicrosoftServerGatedCrypto,
        MS_SERVER_GATED_CRYPTO,
        "Microsoft Server Gated Crypto",
    ),
    (
        ExtendedKeyUsageOption::NetscapeServerGatedCrypto,
        NS_SERVER_GATED_CRYPTO,
        "Netscape Server Gated Crypto",
    ),
];

impl ExtendedKeyUsageOption {
    /// Display name, `None` for unrecognized purposes.
    pub fn name(&self) -> Option<&'static str> {
        EXTENDED_KEY_USAGES
            .iter()
            .find(|(option, _, _)| option == self)
            .map(|(_, _, name)| *name)
    }
}

impl From<ObjectIdentifier> for ExtendedKeyUsageOption {
    fn from(oid: ObjectIdentifier) -> Self {
        EXTENDED_KEY_USAGES
            .iter()
            .find(|(_, known, _)| *known == oid)
            .map(|(option, _, _)| *option)
            .unwrap_or(ExtendedKeyUsageOption::Other(oid))
    }
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        if let ExtendedKeyUsageOption::Other(oid) = value {
            return oid;
        }
        EXTENDED_KEY_USAGES
            .iter()
            .find(|(option, _, _)| *option == value)
            .map(|(_, oid, _)| *oid)
            .unwrap_or(ANY_EXTENDED_KEY_USAGE)
    }
}

/// Represents the Subject Key Identifier extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl SubjectKeyIdentifier {
    /// SHA-1 over the subject public key bits (RFC 5280 method 1).
    pub fn from_public_key(spki: &SubjectPublicKeyInfoOwned) -> Self {
        Self(Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec())
    }
}

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertLabError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.as_slice())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertLabError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// Only the key identifier form is produced.
#[derive(Debug, Clone)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertLabError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertLabError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;

        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::san;

    #[test]
    fn test_basic_constraints_encoding_decoding() {
        let original = BasicConstraints {
            is_ca: true,
            max_path_length: Some(3),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = BasicConstraints::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original.is_ca, decoded.is_ca);
        assert_eq!(original.max_path_length, decoded.max_path_length);
    }

    #[test]
    fn test_subject_alt_name_all_forms() {
        let original = SubjectAltName {
            names: san::classify(&[
                "example.com",
                "*.example.com",
                "IP:192.168.1.10",
                "IP:2001:db8::1",
                "email:admin@example.com",
                "uri:spiffe://example.org/service",
            ]),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original.names, decoded.names);
    }

    #[test]
    fn test_subject_alt_name_rejects_non_ascii_dns() {
        let san = SubjectAltName {
            names: san::classify(&["bücher.example"]),
        };
        assert!(san.to_x509_extension_value().is_err());
    }

    #[test]
    fn test_key_usage_encoding_decoding() {
        let original = KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment);
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = KeyUsage::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_extended_key_usage_keeps_unknown_purposes() {
        let custom = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1");
        let original = ExtendedKeyUsage {
            usage: vec![
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::Other(custom),
            ],
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = ExtendedKeyUsage::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original.usage, decoded.usage);
        assert_eq!(decoded.usage[0].name(), Some("Server Authentication"));
        assert_eq!(decoded.usage[2].name(), None);
    }

    #[test]
    fn test_key_identifiers() {
        let ski = SubjectKeyIdentifier(vec![1, 2, 3, 4, 5]);
        let encoded = ski.to_x509_extension_value().unwrap();
        assert_eq!(SubjectKeyIdentifier::from_x509_extension_value(&encoded).unwrap(), ski);

        let aki = AuthorityKeyIdentifier {
            key_identifier: vec![9, 8, 7],
        };
        let encoded = aki.to_x509_extension_value().unwrap();
        let decoded = AuthorityKeyIdentifier::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(decoded.key_identifier, vec![9, 8, 7]);
    }
}
