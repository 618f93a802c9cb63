use der::Encode;
use der::asn1::BitString;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::extensions::{AuthorityKeyIdentifier, SubjectKeyIdentifier};
use crate::cert::params::{CertificateTemplate, ExtensionParam, Validity};
use crate::cert::{CertFormat, Certificate};
use crate::error::Result;
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
pub trait Issuer {
    /// Returns the encoded name placed in the issuer field.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Key identifier to reference from issued certificates, if any.
    fn key_identifier(&self) -> Option<Vec<u8>>;

    /// Issues a certificate for `template`, valid for `validity`.
    ///
    /// An Authority Key Identifier is appended when the issuer has a key
    /// identifier. The result is re-parsed so callers get a full value object.
    fn issue(
        &self,
        template: &CertificateTemplate,
        validity: Validity,
        serial_number: &[u8],
    ) -> Result<Certificate> {
        let key = self.signing_key();
        let signature_algorithm = key.signature_algorithm();

        let mut extensions = template.extensions.clone();
        if let Some(key_identifier) = self.key_identifier() {
            extensions.push(ExtensionParam::from_extension(
                AuthorityKeyIdentifier { key_identifier },
                false,
            )?);
        }

        let tbs_cert = TbsCertificate {
            serial_number: serial_number.to_vec(),
            signature_algorithm,
            issuer: self.issuer_name(),
            validity,
            subject: template.subject.clone(),
            subject_public_key_info: template.subject_public_key.clone(),
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = key.sign_data(&tbs_cert_inner.to_der()?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.algorithm_identifier()?,
            signature: BitString::from_bytes(&signature)?,
        };

        Certificate::from_der(cert_inner.to_der()?, String::new(), CertFormat::Pem)
    }
}

/// Issuer for self-signed certificates: issuer name equals the subject.
pub struct SelfIssuer<'a> {
    pub name: Name,
    pub key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Name {
        self.name.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn key_identifier(&self) -> Option<Vec<u8>> {
        None
    }
}

/// A CA certificate together with its private key.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Name {
        // The name of the issuer is the subject of the certificate
        self.cert.inner.tbs_certificate.subject.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    /// The CA's own SKI, or one computed from its key when the extension is missing.
    fn key_identifier(&self) -> Option<Vec<u8>> {
        self.cert.subject_key_id().or_else(|| {
            PublicKey::from_key_pair(&self.key)
                .to_x509spki()
                .ok()
                .map(|spki| SubjectKeyIdentifier::from_public_key(&spki).0)
        })
    }
}
