use der::Encode;
use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{CertLabError, Result};

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian serial number bytes.
/// * `signature_algorithm` - The algorithm the issuer signs with.
/// * `issuer` - The encoded issuer name.
/// * `validity` - The validity window.
/// * `subject` - The encoded subject name.
/// * `subject_public_key_info` - The subject's public key.
/// * `extensions` - X.509 extensions, in emission order.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

/// UTCTime through 2049, GeneralizedTime from 2050 on (RFC 5280 4.1.2.5).
fn encode_time(t: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let system_time: std::time::SystemTime = t.into();
    if t.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(UtcTime::from_system_time(
            system_time,
        )?))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_system_time(system_time)?,
        ))
    }
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| -> Result<x509_cert::ext::Extension> {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: encode_time(self.validity.not_before)?,
            not_after: encode_time(self.validity.not_after)?,
        };

        let serial_number = SerialNumber::new(self.serial_number.as_slice())
            .map_err(|e| CertLabError::CertificateError(format!("invalid serial number: {e}")))?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.algorithm_identifier()?,
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::DistinguishedName;
    use crate::key::{KeyPair, PublicKey};
    use time::Duration;

    fn tbs_for(validity: Validity) -> TbsCertificate {
        let key = KeyPair::generate_ecdsa_p256();
        let name = DistinguishedName::builder()
            .common_name("tbs.test".to_string())
            .build()
            .as_x509_name()
            .unwrap();
        TbsCertificate {
            serial_number: vec![1],
            signature_algorithm: key.signature_algorithm(),
            issuer: name.clone(),
            validity,
            subject: name,
            subject_public_key_info: PublicKey::from_key_pair(&key).to_x509spki().unwrap(),
            extensions: vec![],
        }
    }

    #[test]
    fn test_time_encoding_switches_at_2050() {
        let not_before = OffsetDateTime::now_utc();
        let far = time::Date::from_calendar_date(2060, time::Month::January, 1)
            .unwrap()
            .midnight()
            .assume_utc();
        let inner = tbs_for(Validity {
            not_before,
            not_after: far,
        })
        .to_tbs_certificate_inner()
        .unwrap();
        assert!(matches!(
            inner.validity.not_before,
            x509_cert::time::Time::UtcTime(_)
        ));
        assert!(matches!(
            inner.validity.not_after,
            x509_cert::time::Time::GeneralTime(_)
        ));
    }

    #[test]
    fn test_empty_extensions_are_omitted() {
        let inner = tbs_for(Validity::for_days(1).unwrap()).to_tbs_certificate_inner().unwrap();
        assert!(inner.extensions.is_none());
        assert_eq!(inner.version, Version::V3);
    }

    #[test]
    fn test_negative_validity_still_encodes() {
        let now = OffsetDateTime::now_utc();
        let tbs = tbs_for(Validity {
            not_before: now - Duration::days(10),
            not_after: now - Duration::days(5),
        });
        assert!(tbs.to_der().is_ok());
    }
}
