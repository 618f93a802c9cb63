use std::fmt;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::Any;
use der::asn1::{PrintableStringRef, SetOfVec, Utf8StringRef};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use super::extensions::ToAndFromX509Extension;
use crate::error::CertLabError;

const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const PROVINCE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const STREET_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.9");
const POSTAL_CODE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.17");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Parameters for building an X.509 certificate.
///
/// The subject is an already-encoded name so a request's subject can be
/// carried into the issued certificate byte for byte.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - X.509 extensions, in emission order.
#[derive(Clone, Debug, Builder)]
pub struct CertificateTemplate {
    pub subject: Name,
    pub subject_public_key: SubjectPublicKeyInfoOwned,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// Every attribute except the common name may repeat.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    #[builder(default)]
    pub common_name: String,
    #[builder(default)]
    pub country: Vec<String>,
    #[builder(default)]
    pub province: Vec<String>,
    #[builder(default)]
    pub locality: Vec<String>,
    #[builder(default)]
    pub street_address: Vec<String>,
    #[builder(default)]
    pub postal_code: Vec<String>,
    #[builder(default)]
    pub organization: Vec<String>,
    #[builder(default)]
    pub organizational_unit: Vec<String>,
}

fn attribute(oid: ObjectIdentifier, value: &str) -> Result<RelativeDistinguishedName, CertLabError> {
    let value = match PrintableStringRef::new(value) {
        Ok(printable) => Any::encode_from(&printable)?,
        Err(_) => Any::encode_from(&Utf8StringRef::new(value)?)?,
    };
    let atv = AttributeTypeAndValue { oid, value };
    Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// Attributes are emitted as single-valued RDNs ordered country first and
    /// common name last. Values use PrintableString when they fit and
    /// UTF8String otherwise. Empty fields are omitted.
    pub fn as_x509_name(&self) -> Result<Name, CertLabError> {
        let mut rdns = Vec::new();

        let groups: [(ObjectIdentifier, &[String]); 7] = [
            (COUNTRY, &self.country),
            (PROVINCE, &self.province),
            (LOCALITY, &self.locality),
            (STREET_ADDRESS, &self.street_address),
            (POSTAL_CODE, &self.postal_code),
            (ORGANIZATION, &self.organization),
            (ORGANIZATIONAL_UNIT, &self.organizational_unit),
        ];
        for (oid, values) in groups {
            for value in values.iter().filter(|v| !v.is_empty()) {
                rdns.push(attribute(oid, value)?);
            }
        }
        if !self.common_name.is_empty() {
            rdns.push(attribute(COMMON_NAME, &self.common_name)?);
        }

        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Unrecognized attribute types are skipped.
    pub fn from_x509_name(x509dn: &Name) -> Self {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let value = String::from_utf8_lossy(attr.value.value()).into_owned();
                match attr.oid {
                    COMMON_NAME => dn.common_name = value,
                    COUNTRY => dn.country.push(value),
                    PROVINCE => dn.province.push(value),
                    LOCALITY => dn.locality.push(value),
                    STREET_ADDRESS => dn.street_address.push(value),
                    POSTAL_CODE => dn.postal_code.push(value),
                    ORGANIZATION => dn.organization.push(value),
                    ORGANIZATIONAL_UNIT => dn.organizational_unit.push(value),
                    _ => {}
                }
            }
        }

        dn
    }
}

impl fmt::Display for DistinguishedName {
    /// Renders `CN=..,OU=..,O=..,...,C=..`, most specific attribute first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.common_name.is_empty() {
            parts.push(format!("CN={}", self.common_name));
        }
        let groups: [(&str, &[String]); 7] = [
            ("OU", &self.organizational_unit),
            ("O", &self.organization),
            ("POSTALCODE", &self.postal_code),
            ("STREET", &self.street_address),
            ("L", &self.locality),
            ("ST", &self.province),
            ("C", &self.country),
        ];
        for (label, values) in groups {
            parts.extend(values.iter().map(|v| format!("{label}={v}")));
        }
        f.write_str(&parts.join(","))
    }
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    ///
    /// Fails when the end date falls outside the representable range.
    pub fn for_days(days: i64) -> Result<Self, CertLabError> {
        let now = OffsetDateTime::now_utc();
        let not_after = days
            .checked_mul(86_400)
            .map(Duration::seconds)
            .and_then(|span| now.checked_add(span))
            .ok_or_else(|| CertLabError::InvalidInput(format!("validity of {days} days is out of range")))?;
        Ok(Self {
            not_before: now,
            not_after,
        })
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: E,
        critical: bool,
    ) -> Result<Self, CertLabError> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E, CertLabError> {
        E::from_x509_extension_value(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::{Decode, Encode};

    #[test]
    fn test_validity_out_of_range() {
        assert!(matches!(
            Validity::for_days(5_000_000),
            Err(CertLabError::InvalidInput(_))
        ));
        assert!(Validity::for_days(i64::MAX).is_err());

        let validity = Validity::for_days(10).unwrap();
        assert_eq!((validity.not_after - validity.not_before).whole_days(), 10);
    }

    #[test]
    fn test_distinguished_name_round_trip() {
        let dn = DistinguishedName::builder()
            .common_name("test.example.com".to_string())
            .organization(vec!["Example Corp".to_string()])
            .organizational_unit(vec!["Platform".to_string()])
            .country(vec!["US".to_string()])
            .province(vec!["California".to_string()])
            .locality(vec!["San Francisco".to_string()])
            .build();

        let name = dn.as_x509_name().unwrap();
        let der = name.to_der().unwrap();
        let decoded = DistinguishedName::from_x509_name(&Name::from_der(&der).unwrap());
        assert_eq!(dn, decoded);
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let dn = DistinguishedName::builder()
            .common_name("only-cn".to_string())
            .organization(vec![String::new()])
            .build();
        let name = dn.as_x509_name().unwrap();
        assert_eq!(name.0.len(), 1);
    }

    #[test]
    fn test_non_printable_values_use_utf8() {
        let dn = DistinguishedName::builder()
            .common_name("*.example.com".to_string())
            .organization(vec!["Zürich AG".to_string()])
            .build();
        let name = dn.as_x509_name().unwrap();
        let decoded = DistinguishedName::from_x509_name(&name);
        assert_eq!(decoded.common_name, "*.example.com");
        assert_eq!(decoded.organization, vec!["Zürich AG"]);
    }

    #[test]
    fn test_display_order() {
        let dn = DistinguishedName::builder()
            .common_name("Test CA".to_string())
            .organization(vec!["Acme".to_string()])
            .country(vec!["US".to_string()])
            .build();
        assert_eq!(dn.to_string(), "CN=Test CA,O=Acme,C=US");
    }
}
