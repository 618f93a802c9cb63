//! PEM armor helpers shared by the generators and readers.

use pem::{EncodeConfig, LineEnding, Pem};

pub const CERTIFICATE: &str = "CERTIFICATE";
pub const CERTIFICATE_REQUEST: &str = "CERTIFICATE REQUEST";
pub const PRIVATE_KEY: &str = "PRIVATE KEY";

/// Convert DER-encoded data into a PEM-encoded string with the provided label.
pub fn encode(label: &str, der: &[u8]) -> String {
    let block = Pem::new(label, der);
    pem::encode_config(&block, EncodeConfig::new().set_line_ending(LineEnding::LF))
}

/// Decode the first PEM block of `data`, if it holds one.
pub fn decode_first(data: &[u8]) -> Option<Pem> {
    pem::parse(data).ok()
}

/// DER payloads of every `CERTIFICATE` block in a bundle, in file order.
///
/// Blocks with other labels are skipped.
pub fn certificate_blocks(data: &[u8]) -> Vec<Vec<u8>> {
    pem::parse_many(data)
        .unwrap_or_default()
        .into_iter()
        .filter(|block| block.tag() == CERTIFICATE)
        .map(Pem::into_contents)
        .collect()
}
