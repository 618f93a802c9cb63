//! Self-signed leaf and CA certificate generation.

use std::path::PathBuf;

use bon::Builder;
use log::{debug, info};

use crate::cert::Certificate;
use crate::cert::extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage, KeyUsages,
    SubjectAltName, SubjectKeyIdentifier,
};
use crate::cert::params::{CertificateTemplate, DistinguishedName, ExtensionParam, Validity};
use crate::error::{CertLabError, Result};
use crate::issuer::{Issuer, SelfIssuer};
use crate::key::{KeyPair, PublicKey};
use crate::output;
use crate::san::{self, SanSet};

pub const DEFAULT_DAYS: i64 = 365;
pub const DEFAULT_KEY_SIZE: usize = 2048;
pub const DEFAULT_CA_DAYS: i64 = 3650;
pub const DEFAULT_CA_KEY_SIZE: usize = 4096;

/// Self-signed roots do not need serial uniqueness across a population.
const SELF_SIGNED_SERIAL: [u8; 1] = [1];

/// Options for a self-signed leaf certificate.
#[derive(Debug, Clone, Builder)]
pub struct GenerateOptions {
    #[builder(into)]
    pub common_name: String,
    #[builder(default = DEFAULT_DAYS)]
    pub days: i64,
    #[builder(default = DEFAULT_KEY_SIZE)]
    pub key_size: usize,
    /// Raw SAN strings; only DNS and IP entries are used.
    #[builder(default)]
    pub sans: Vec<String>,
    #[builder(into, default = PathBuf::from("."))]
    pub output_dir: PathBuf,
}

/// Options for a self-signed CA certificate.
#[derive(Debug, Clone, Builder)]
pub struct CaOptions {
    #[builder(into)]
    pub common_name: String,
    #[builder(into)]
    pub organization: Option<String>,
    #[builder(into)]
    pub country: Option<String>,
    #[builder(default = DEFAULT_CA_DAYS)]
    pub days: i64,
    #[builder(default = DEFAULT_CA_KEY_SIZE)]
    pub key_size: usize,
    #[builder(into, default = PathBuf::from("."))]
    pub output_dir: PathBuf,
}

/// A written certificate and the paths of its files.
#[derive(Debug, Clone)]
pub struct GeneratedCertificate {
    pub certificate: Certificate,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

fn require_common_name(common_name: &str) -> Result<()> {
    if common_name.trim().is_empty() {
        return Err(CertLabError::InvalidInput("common name is required".to_string()));
    }
    Ok(())
}

fn self_sign(
    subject: DistinguishedName,
    key: &KeyPair,
    extensions: Vec<ExtensionParam>,
    validity: Validity,
) -> Result<Certificate> {
    let name = subject.as_x509_name()?;
    let template = CertificateTemplate::builder()
        .subject(name.clone())
        .subject_public_key(PublicKey::from_key_pair(key).to_x509spki()?)
        .extensions(extensions)
        .build();

    SelfIssuer { name, key }.issue(&template, validity, &SELF_SIGNED_SERIAL)
}

fn write_pair(
    mut certificate: Certificate,
    key: &KeyPair,
    cert_path: PathBuf,
    key_path: PathBuf,
) -> Result<GeneratedCertificate> {
    output::write_file(&cert_path, certificate.to_pem().as_bytes())?;
    output::write_private_key(&key_path, &key.to_pkcs8_pem()?)?;
    certificate.source = cert_path.display().to_string();

    Ok(GeneratedCertificate {
        certificate,
        cert_path,
        key_path,
    })
}

/// Generates a self-signed server certificate and RSA key.
///
/// Writes `<cn>.crt` and `<cn>.key` (sanitized) into the output directory.
pub fn generate(options: &GenerateOptions) -> Result<GeneratedCertificate> {
    require_common_name(&options.common_name)?;
    let validity = Validity::for_days(options.days)?;
    output::ensure_dir(&options.output_dir)?;

    debug!(
        "generating {}-bit RSA key for {}",
        options.key_size, options.common_name
    );
    let key = KeyPair::generate_rsa(options.key_size)?;

    let classified = san::classify(&options.sans);
    let names = SanSet {
        dns: classified.dns,
        ips: classified.ips,
        ..SanSet::default()
    };

    let mut extensions = vec![
        ExtensionParam::from_extension(
            KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment),
            true,
        )?,
        ExtensionParam::from_extension(
            ExtendedKeyUsage {
                usage: vec![ExtendedKeyUsageOption::ServerAuth],
            },
            false,
        )?,
        ExtensionParam::from_extension(BasicConstraints::default(), true)?,
    ];
    if !names.is_empty() {
        extensions.push(ExtensionParam::from_extension(SubjectAltName { names }, false)?);
    }

    let subject = DistinguishedName::builder()
        .common_name(options.common_name.clone())
        .build();
    let certificate = self_sign(subject, &key, extensions, validity)?;

    let generated = write_pair(
        certificate,
        &key,
        output::artifact_path(&options.output_dir, &options.common_name, ".crt"),
        output::artifact_path(&options.output_dir, &options.common_name, ".key"),
    )?;
    info!("generated self-signed certificate for {}", options.common_name);
    Ok(generated)
}

/// Generates a self-signed CA certificate and RSA key.
///
/// Writes `<cn>-ca.crt` and `<cn>-ca.key` (sanitized) into the output directory.
pub fn generate_ca(options: &CaOptions) -> Result<GeneratedCertificate> {
    require_common_name(&options.common_name)?;
    let validity = Validity::for_days(options.days)?;
    output::ensure_dir(&options.output_dir)?;

    debug!(
        "generating {}-bit RSA CA key for {}",
        options.key_size, options.common_name
    );
    let key = KeyPair::generate_rsa(options.key_size)?;
    let spki = PublicKey::from_key_pair(&key).to_x509spki()?;

    let extensions = vec![
        ExtensionParam::from_extension(
            KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign | KeyUsages::DigitalSignature),
            true,
        )?,
        ExtensionParam::from_extension(
            ExtendedKeyUsage {
                usage: vec![
                    ExtendedKeyUsageOption::ServerAuth,
                    ExtendedKeyUsageOption::ClientAuth,
                    ExtendedKeyUsageOption::CodeSigning,
                    ExtendedKeyUsageOption::EmailProtection,
                    ExtendedKeyUsageOption::TimeStamping,
                ],
            },
            false,
        )?,
        ExtensionParam::from_extension(
            BasicConstraints {
                is_ca: true,
                max_path_length: None,
            },
            true,
        )?,
        ExtensionParam::from_extension(SubjectKeyIdentifier::from_public_key(&spki), false)?,
    ];

    let subject = DistinguishedName::builder()
        .common_name(options.common_name.clone())
        .organization(options.organization.iter().cloned().collect())
        .country(options.country.iter().cloned().collect())
        .build();
    let certificate = self_sign(subject, &key, extensions, validity)?;

    let generated = write_pair(
        certificate,
        &key,
        output::artifact_path(&options.output_dir, &options.common_name, "-ca.crt"),
        output::artifact_path(&options.output_dir, &options.common_name, "-ca.key"),
    )?;
    info!("generated CA certificate for {}", options.common_name);
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_generate_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let options = GenerateOptions::builder()
            .common_name("localhost")
            .key_size(1024)
            .days(30)
            .sans(vec![
                "localhost".to_string(),
                "IP:127.0.0.1".to_string(),
                "email:dropped@example.com".to_string(),
            ])
            .output_dir(dir.path())
            .build();

        let generated = generate(&options).unwrap();
        assert_eq!(generated.cert_path, dir.path().join("localhost.crt"));
        assert_eq!(generated.key_path, dir.path().join("localhost.key"));
        assert!(generated.key_path.exists());

        let cert = &generated.certificate;
        assert_eq!(cert.serial_hex(), "1");
        assert!(!cert.is_ca());
        assert_eq!(cert.subject().common_name, "localhost");
        assert_eq!(cert.issuer().common_name, "localhost");
        let sans = cert.sans();
        assert_eq!(sans.dns, vec!["localhost"]);
        assert_eq!(sans.ips.len(), 1);
        assert!(sans.emails.is_empty());
        assert_eq!(cert.key_usage_names(), vec!["Digital Signature", "Key Encipherment"]);
        assert_eq!(cert.ext_key_usage_names(), vec!["Server Authentication"]);
    }

    #[test]
    fn test_generate_ca() {
        let dir = tempfile::tempdir().unwrap();
        let options = CaOptions::builder()
            .common_name("Test CA")
            .organization("Acme")
            .country("US")
            .key_size(1024)
            .output_dir(dir.path())
            .build();

        let generated = generate_ca(&options).unwrap();
        assert_eq!(generated.cert_path, dir.path().join("Test_CA-ca.crt"));
        assert_eq!(generated.key_path, dir.path().join("Test_CA-ca.key"));

        let cert = &generated.certificate;
        assert!(cert.is_ca());
        assert_eq!(cert.subject().organization, vec!["Acme"]);
        assert_eq!(cert.subject().country, vec!["US"]);
        assert!(cert.subject_key_id().is_some());
        assert_eq!(
            cert.key_usage_names(),
            vec!["Digital Signature", "Certificate Sign", "CRL Sign"]
        );
        assert_eq!(cert.ext_key_usage_names().len(), 5);
        assert_eq!(
            cert.extension::<BasicConstraints>()
                .unwrap()
                .unwrap()
                .max_path_length,
            None
        );
        assert!(cert.days_until_expiry >= DEFAULT_CA_DAYS - 1);
    }

    #[test]
    fn test_out_of_range_days_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let options = GenerateOptions::builder()
            .common_name("far.example.com")
            .days(5_000_000)
            .output_dir(dir.path())
            .build();
        assert!(matches!(generate(&options), Err(CertLabError::InvalidInput(_))));

        let options = CaOptions::builder()
            .common_name("Far CA")
            .days(i64::MAX)
            .output_dir(dir.path())
            .build();
        assert!(matches!(generate_ca(&options), Err(CertLabError::InvalidInput(_))));
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_empty_common_name_rejected() {
        let options = GenerateOptions::builder().common_name("  ").build();
        assert!(matches!(
            generate(&options),
            Err(CertLabError::InvalidInput(_))
        ));
    }
}
