//! Certificate signing requests: generation and parsing.
//!
//! A request is parsed once into a [`CertificateRequest`]. Both the signing
//! engine and the display projection ([`CsrInfo`]) read from that value.

use std::path::PathBuf;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, BitString, OctetString, SetOfVec};
use der::{Decode, Encode};
use log::{debug, info};
use x509_cert::attr::Attribute;
use x509_cert::ext::Extension;
use x509_cert::request::{CertReq, CertReqInfo, Version};

use crate::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
use crate::cert::names;
use crate::cert::params::DistinguishedName;
use crate::error::{CertLabError, Result};
use crate::generate::DEFAULT_KEY_SIZE;
use crate::key::{KeyPair, PublicKey, PublicKeyInfo};
use crate::output;
use crate::pem_utils;
use crate::san::{self, SanSet};

/// PKCS#9 extensionRequest attribute.
const EXTENSION_REQUEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.14");

/// Options for a new signing request.
///
/// Empty optional subject fields are left out of the subject. `email` is
/// carried as an email SAN ahead of any `email:` entries in `sans`.
#[derive(Debug, Clone, Builder)]
pub struct CsrOptions {
    #[builder(into)]
    pub common_name: String,
    #[builder(into)]
    pub organization: Option<String>,
    #[builder(into)]
    pub organizational_unit: Option<String>,
    #[builder(into)]
    pub country: Option<String>,
    #[builder(into)]
    pub province: Option<String>,
    #[builder(into)]
    pub locality: Option<String>,
    #[builder(into)]
    pub email: Option<String>,
    #[builder(default)]
    pub sans: Vec<String>,
    #[builder(default = DEFAULT_KEY_SIZE)]
    pub key_size: usize,
    #[builder(into, default = PathBuf::from("."))]
    pub output_dir: PathBuf,
}

/// Display projection of a signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrInfo {
    pub subject: DistinguishedName,
    /// DNS names bare, then `IP:` and `email:` prefixed entries.
    pub sans: Vec<String>,
    pub signature_algorithm: String,
    /// "RSA", "ECDSA", "Ed25519" or "Unknown".
    pub public_key_algorithm: String,
    /// 0 when the key type is unknown.
    pub key_size: usize,
}

/// A parsed PKCS#10 request.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub inner: CertReq,
    raw: Vec<u8>,
    sans: SanSet,
}

impl CertificateRequest {
    /// Parses DER bytes. A malformed SAN extension fails the whole parse.
    pub fn from_der(raw: Vec<u8>) -> Result<Self> {
        let inner = CertReq::from_der(&raw)
            .map_err(|e| CertLabError::ParseError(format!("failed to parse CSR: {e}")))?;
        let sans = requested_sans(&inner)
            .map_err(|e| CertLabError::ParseError(format!("failed to parse CSR: {e}")))?;
        Ok(Self { inner, raw, sans })
    }

    /// Parses the first PEM block in `data`, whatever its label.
    pub fn from_pem(data: &[u8]) -> Result<Self> {
        let block = pem_utils::decode_first(data)
            .ok_or_else(|| CertLabError::ParseError("failed to parse PEM block".to_string()))?;
        Self::from_der(block.into_contents())
    }

    pub fn to_der(&self) -> &[u8] {
        &self.raw
    }

    pub fn to_pem(&self) -> String {
        pem_utils::encode(pem_utils::CERTIFICATE_REQUEST, &self.raw)
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.info.subject)
    }

    /// Names requested through the extensionRequest attribute.
    pub fn sans(&self) -> &SanSet {
        &self.sans
    }

    pub fn signature_algorithm_name(&self) -> String {
        names::signature_algorithm_name(&self.inner.algorithm.oid)
    }

    pub fn public_key_info(&self) -> PublicKeyInfo {
        PublicKeyInfo::from_spki(&self.inner.info.public_key)
    }

    /// Checks the request's self-signature with its own public key.
    pub fn verify_signature(&self) -> Result<()> {
        let public_key = PublicKey::from_x509spki(&self.inner.info.public_key)
            .map_err(|e| CertLabError::SignatureVerification(e.to_string()))?;
        let message = self.inner.info.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CertLabError::SignatureVerification("signature has unused bits".to_string())
        })?;
        public_key.verify(self.inner.algorithm.oid, &message, signature)
    }

    pub fn info(&self) -> CsrInfo {
        let key = self.public_key_info();
        let mut sans = self.sans.dns.clone();
        sans.extend(self.sans.ips.iter().map(|ip| format!("IP:{ip}")));
        sans.extend(self.sans.emails.iter().map(|email| format!("email:{email}")));

        CsrInfo {
            subject: self.subject(),
            sans,
            signature_algorithm: self.signature_algorithm_name(),
            public_key_algorithm: key.algorithm_name().to_string(),
            key_size: key.bits(),
        }
    }
}

fn requested_sans(req: &CertReq) -> Result<SanSet> {
    let mut sans = SanSet::default();
    for attr in req.info.attributes.iter().filter(|a| a.oid == EXTENSION_REQUEST) {
        for value in attr.values.iter() {
            let extensions = Vec::<Extension>::from_der(&value.to_der()?)?;
            for ext in extensions
                .iter()
                .filter(|e| e.extn_id == SubjectAltName::OID)
            {
                let names = SubjectAltName::from_x509_extension_value(ext.extn_value.as_bytes())?.names;
                sans.dns.extend(names.dns);
                sans.ips.extend(names.ips);
                sans.emails.extend(names.emails);
                sans.uris.extend(names.uris);
            }
        }
    }
    Ok(sans)
}

fn extension_request(names: SanSet) -> Result<Attribute> {
    let extensions = vec![Extension {
        extn_id: SubjectAltName::OID,
        critical: false,
        extn_value: OctetString::new(SubjectAltName { names }.to_x509_extension_value()?)?,
    }];
    Ok(Attribute {
        oid: EXTENSION_REQUEST,
        values: SetOfVec::try_from(vec![Any::encode_from(&extensions)?])?,
    })
}

/// Builds and self-signs a request for `subject` with `key`.
pub fn build_request(
    subject: &DistinguishedName,
    names: SanSet,
    key: &KeyPair,
) -> Result<CertificateRequest> {
    let mut attributes = SetOfVec::new();
    if !names.is_empty() {
        attributes.insert(extension_request(names)?)?;
    }

    let info = CertReqInfo {
        version: Version::V1,
        subject: subject.as_x509_name()?,
        public_key: PublicKey::from_key_pair(key).to_x509spki()?,
        attributes,
    };

    let signature_algorithm = key.signature_algorithm();
    let signature = key.sign_data(&info.to_der()?)?;
    let req = CertReq {
        info,
        algorithm: signature_algorithm.algorithm_identifier()?,
        signature: BitString::from_bytes(&signature)?,
    };

    CertificateRequest::from_der(req.to_der()?)
}

/// A written request and the paths of its files.
#[derive(Debug, Clone)]
pub struct GeneratedCsr {
    pub request: CertificateRequest,
    pub info: CsrInfo,
    pub csr_path: PathBuf,
    pub key_path: PathBuf,
}

/// Generates an RSA key and a signing request.
///
/// Writes `<cn>.csr` and `<cn>.key` (sanitized) into the output directory.
pub fn generate_csr(options: &CsrOptions) -> Result<GeneratedCsr> {
    if options.common_name.trim().is_empty() {
        return Err(CertLabError::InvalidInput("common name is required".to_string()));
    }
    output::ensure_dir(&options.output_dir)?;

    let single = |v: &Option<String>| -> Vec<String> {
        v.iter().filter(|s| !s.is_empty()).cloned().collect()
    };
    let subject = DistinguishedName::builder()
        .common_name(options.common_name.clone())
        .organization(single(&options.organization))
        .organizational_unit(single(&options.organizational_unit))
        .country(single(&options.country))
        .province(single(&options.province))
        .locality(single(&options.locality))
        .build();

    let classified = san::classify(&options.sans);
    let mut emails = single(&options.email);
    emails.extend(classified.emails);
    let names = SanSet {
        emails,
        ..classified
    };

    debug!(
        "generating {}-bit RSA key for CSR {}",
        options.key_size, options.common_name
    );
    let key = KeyPair::generate_rsa(options.key_size)?;
    let request = build_request(&subject, names, &key)?;

    let csr_path = output::artifact_path(&options.output_dir, &options.common_name, ".csr");
    let key_path = output::artifact_path(&options.output_dir, &options.common_name, ".key");
    output::write_file(&csr_path, request.to_pem().as_bytes())?;
    output::write_private_key(&key_path, &key.to_pkcs8_pem()?)?;
    info!("generated CSR for {}", options.common_name);

    Ok(GeneratedCsr {
        info: request.info(),
        request,
        csr_path,
        key_path,
    })
}

/// Parses a PEM request into its display projection.
pub fn parse_csr(data: &[u8]) -> Result<CsrInfo> {
    Ok(CertificateRequest::from_pem(data)?.info())
}
