//! Static OID to display-name tables.

use const_oid::ObjectIdentifier;
use const_oid::db::{rfc5912, rfc8410};
use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsages;

const MD2_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.2");
const MD5_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.4");
const DSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.3");
const DSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.2");

static SIGNATURE_ALGORITHMS: &[(ObjectIdentifier, &str)] = &[
    (MD2_WITH_RSA, "MD2-RSA"),
    (MD5_WITH_RSA, "MD5-RSA"),
    (rfc5912::SHA_1_WITH_RSA_ENCRYPTION, "SHA1-RSA"),
    (rfc5912::SHA_256_WITH_RSA_ENCRYPTION, "SHA256-RSA"),
    (rfc5912::SHA_384_WITH_RSA_ENCRYPTION, "SHA384-RSA"),
    (rfc5912::SHA_512_WITH_RSA_ENCRYPTION, "SHA512-RSA"),
    (rfc5912::ID_RSASSA_PSS, "RSASSA-PSS"),
    (DSA_WITH_SHA1, "DSA-SHA1"),
    (DSA_WITH_SHA256, "DSA-SHA256"),
    (rfc5912::ECDSA_WITH_SHA_224, "ECDSA-SHA224"),
    (rfc5912::ECDSA_WITH_SHA_256, "ECDSA-SHA256"),
    (rfc5912::ECDSA_WITH_SHA_384, "ECDSA-SHA384"),
    (rfc5912::ECDSA_WITH_SHA_512, "ECDSA-SHA512"),
    (rfc8410::ID_ED_25519, "Ed25519"),
];

/// Human name for a signature algorithm OID, or the dotted OID when unlisted.
pub fn signature_algorithm_name(oid: &ObjectIdentifier) -> String {
    SIGNATURE_ALGORITHMS
        .iter()
        .find(|(known, _)| known == oid)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| oid.to_string())
}

static KEY_USAGES: &[(KeyUsages, &str)] = &[
    (KeyUsages::DigitalSignature, "Digital Signature"),
    (KeyUsages::NonRepudiation, "Content Commitment"),
    (KeyUsages::KeyEncipherment, "Key Encipherment"),
    (KeyUsages::DataEncipherment, "Data Encipherment"),
    (KeyUsages::KeyAgreement, "Key Agreement"),
    (KeyUsages::KeyCertSign, "Certificate Sign"),
    (KeyUsages::CRLSign, "CRL Sign"),
    (KeyUsages::EncipherOnly, "Encipher Only"),
    (KeyUsages::DecipherOnly, "Decipher Only"),
];

/// Names of the set key usage bits, in bit order.
pub fn key_usage_names(flags: FlagSet<KeyUsages>) -> Vec<&'static str> {
    KEY_USAGES
        .iter()
        .filter(|(bit, _)| flags.contains(*bit))
        .map(|(_, name)| *name)
        .collect()
}
