//! Issuing leaf certificates from signing requests with a local CA.

use std::fs;
use std::path::{Path, PathBuf};

use bon::Builder;
use log::{debug, info};
use rand_core::{OsRng, RngCore};

use crate::cert::Certificate;
use crate::cert::extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage, KeyUsages,
    SubjectAltName,
};
use crate::cert::params::{CertificateTemplate, ExtensionParam, Validity};
use crate::csr::CertificateRequest;
use crate::error::{CertLabError, Result};
use crate::generate::DEFAULT_DAYS;
use crate::issuer::{CertificateWithPrivateKey, Issuer};
use crate::key::KeyPair;
use crate::output;
use crate::san;

/// Options for signing a request.
#[derive(Debug, Clone, Builder)]
pub struct SignOptions {
    #[builder(into)]
    pub csr_path: PathBuf,
    #[builder(into)]
    pub ca_cert: PathBuf,
    #[builder(into)]
    pub ca_key: PathBuf,
    #[builder(default = DEFAULT_DAYS)]
    pub days: i64,
    /// When non-empty, replaces the request's own SANs entirely.
    #[builder(default)]
    pub sans: Vec<String>,
    #[builder(into, default = PathBuf::from("."))]
    pub output_dir: PathBuf,
}

/// A signed leaf and where it was written.
#[derive(Debug, Clone)]
pub struct SignedCertificate {
    pub certificate: Certificate,
    pub cert_path: PathBuf,
}

fn read(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| CertLabError::io(format!("failed to read {what}"), e))
}

/// 16 random bytes encoding a positive integer with no leading zero octet.
fn random_serial() -> Vec<u8> {
    let mut bytes = [0u8; 16];
    loop {
        OsRng.fill_bytes(&mut bytes);
        bytes[0] &= 0x7f;
        if bytes[0] != 0 {
            return bytes.to_vec();
        }
    }
}

/// Output file for a request: its file name minus `.csr`, then minus `.req`, plus `.crt`.
pub fn signed_cert_path(output_dir: &Path, csr_path: &Path) -> PathBuf {
    let base = csr_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = base.strip_suffix(".csr").unwrap_or(&base);
    let base = base.strip_suffix(".req").unwrap_or(base);
    output_dir.join(format!("{base}.crt"))
}

/// Signs the request at `options.csr_path` with the CA certificate and key.
///
/// The request's self-signature must verify before anything else is loaded.
/// Nothing is written unless every step succeeds.
pub fn sign_csr(options: &SignOptions) -> Result<SignedCertificate> {
    let request = CertificateRequest::from_pem(&read(&options.csr_path, "CSR")?)?;
    request.verify_signature()?;
    debug!(
        "verified CSR signature for {}",
        request.subject().common_name
    );

    let ca_cert = Certificate::parse(
        &read(&options.ca_cert, "CA certificate")?,
        options.ca_cert.display().to_string(),
    )?;
    let ca_key = KeyPair::from_pem(&read(&options.ca_key, "CA private key")?)?;
    let ca = CertificateWithPrivateKey {
        cert: ca_cert,
        key: ca_key,
    };

    let names = if options.sans.is_empty() {
        request.sans().clone()
    } else {
        debug!("replacing CSR SANs with {} override entries", options.sans.len());
        san::classify(&options.sans)
    };

    let mut extensions = vec![
        ExtensionParam::from_extension(
            KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment),
            true,
        )?,
        ExtensionParam::from_extension(
            ExtendedKeyUsage {
                usage: vec![
                    ExtendedKeyUsageOption::ServerAuth,
                    ExtendedKeyUsageOption::ClientAuth,
                ],
            },
            false,
        )?,
        ExtensionParam::from_extension(BasicConstraints::default(), true)?,
    ];
    if !names.is_empty() {
        extensions.push(ExtensionParam::from_extension(SubjectAltName { names }, false)?);
    }

    let template = CertificateTemplate::builder()
        .subject(request.inner.info.subject.clone())
        .subject_public_key(request.inner.info.public_key.clone())
        .extensions(extensions)
        .build();
    let mut certificate = ca.issue(&template, Validity::for_days(options.days)?, &random_serial())?;

    output::ensure_dir(&options.output_dir)?;
    let cert_path = signed_cert_path(&options.output_dir, &options.csr_path);
    output::write_file(&cert_path, certificate.to_pem().as_bytes())?;
    certificate.source = cert_path.display().to_string();
    info!(
        "signed certificate for {} with CA {}",
        certificate.subject().common_name,
        ca.cert.subject().common_name
    );

    Ok(SignedCertificate {
        certificate,
        cert_path,
    })
}
