//! use certlab::error::CertLabError;

use thiserror::Error;

/// Represents errors that can occur in the certlab library.
///
/// Every variant carries the underlying cause so callers can surface it
/// verbatim instead of a generic category label.
#[derive(Debug, Error)]
pub enum CertLabError {
    /// Filesystem read, write or permission failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Input could not be parsed as the expected artifact.
    #[error("Failed to parse: {0}")]
    ParseError(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Error related to certificate operations.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// A signature did not verify.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    /// Key algorithm the operation cannot handle.
    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),

    /// Dial or socket level failure.
    #[error("failed to connect: {0}")]
    ConnectionError(String),

    /// TLS handshake failure.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// The peer completed a handshake without presenting a certificate.
    #[error("no certificates found")]
    NoCertificates,

    /// JSON projection failure.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    RsaError(String),

    /// Error from RSA PKCS1 operations.
    #[error("RSA PKCS1 error: {0}")]
    RsaPkcs1Error(String),
}

pub type Result<T> = std::result::Result<T, CertLabError>;

impl CertLabError {
    /// Wraps an I/O error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CertLabError::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<der::Error> for CertLabError {
    /// Converts a `der::Error` into a `CertLabError`.
    fn from(err: der::Error) -> Self {
        CertLabError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CertLabError {
    fn from(err: rsa::Error) -> Self {
        CertLabError::RsaError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for CertLabError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        CertLabError::RsaPkcs1Error(err.to_string())
    }
}

impl From<pkcs8::Error> for CertLabError {
    fn from(err: pkcs8::Error) -> Self {
        CertLabError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for CertLabError {
    fn from(err: pkcs8::spki::Error) -> Self {
        CertLabError::EncodingError(err.to_string())
    }
}

impl From<pem::PemError> for CertLabError {
    fn from(err: pem::PemError) -> Self {
        CertLabError::ParseError(err.to_string())
    }
}

impl From<rustls::Error> for CertLabError {
    fn from(err: rustls::Error) -> Self {
        CertLabError::TlsError(err.to_string())
    }
}

impl From<serde_json::Error> for CertLabError {
    fn from(err: serde_json::Error) -> Self {
        CertLabError::SerializationError(err.to_string())
    }
}
