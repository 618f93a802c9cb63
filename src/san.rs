//! Subject alternative name classification.
//!
//! SAN inputs arrive as flat strings. A bare value is a DNS name, while
//! `IP:`, `email:` and `uri:` prefixes select the other name forms. The
//! `IP:` tag is matched case-sensitively, the other two are not.

use std::net::IpAddr;

use log::warn;

const IP_PREFIX: &str = "IP:";
const EMAIL_PREFIX: &str = "email:";
const URI_PREFIX: &str = "uri:";

/// SAN values split by name form, each list in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanSet {
    pub dns: Vec<String>,
    pub ips: Vec<IpAddr>,
    pub emails: Vec<String>,
    pub uris: Vec<String>,
}

impl SanSet {
    pub fn is_empty(&self) -> bool {
        self.dns.is_empty() && self.ips.is_empty() && self.emails.is_empty() && self.uris.is_empty()
    }

    /// Total number of names across all forms.
    pub fn len(&self) -> usize {
        self.dns.len() + self.ips.len() + self.emails.len() + self.uris.len()
    }

    /// Flattens back into the prefixed string convention.
    ///
    /// DNS names stay bare, IPs and emails are re-prefixed. URIs are kept
    /// with their `uri:` tag so the output can be fed back to [`classify`].
    pub fn to_prefixed(&self) -> Vec<String> {
        let mut out = self.dns.clone();
        out.extend(self.ips.iter().map(|ip| format!("{IP_PREFIX}{ip}")));
        out.extend(self.emails.iter().map(|e| format!("{EMAIL_PREFIX}{e}")));
        out.extend(self.uris.iter().map(|u| format!("{URI_PREFIX}{u}")));
        out
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

/// Classifies SAN strings into typed buckets.
///
/// Malformed IP or URI values under a type prefix are dropped, never
/// promoted to DNS. URIs must be absolute (scheme included), so a relative
/// reference such as `uri:foo/bar` is dropped too. Unprefixed values,
/// wildcards included, go to the DNS list unvalidated.
pub fn classify<S: AsRef<str>>(sans: &[S]) -> SanSet {
    let mut set = SanSet::default();

    for san in sans {
        let san = san.as_ref();

        if let Some(rest) = san.strip_prefix(IP_PREFIX) {
            match rest.parse::<IpAddr>() {
                Ok(ip) => set.ips.push(ip),
                Err(_) => warn!("dropping malformed IP SAN {san:?}"),
            }
        } else if let Some(rest) = strip_prefix_ignore_case(san, EMAIL_PREFIX) {
            set.emails.push(rest.to_string());
        } else if let Some(rest) = strip_prefix_ignore_case(san, URI_PREFIX) {
            match url::Url::parse(rest) {
                Ok(_) => set.uris.push(rest.to_string()),
                Err(e) => warn!("dropping malformed URI SAN {san:?}: {e}"),
            }
        } else {
            set.dns.push(san.to_string());
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_mixed_inputs() {
        let set = classify(&["IP:10.0.0.1", "example.com", "email:a@b.com", "uri:https://x"]);
        assert_eq!(set.dns, vec!["example.com"]);
        assert_eq!(set.ips, vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);
        assert_eq!(set.emails, vec!["a@b.com"]);
        assert_eq!(set.uris, vec!["https://x"]);
    }

    #[test]
    fn test_classify_keeps_per_type_order() {
        let set = classify(&["b.example.com", "IP:10.0.0.2", "a.example.com", "IP:::1"]);
        assert_eq!(set.dns, vec!["b.example.com", "a.example.com"]);
        assert_eq!(
            set.ips,
            vec![
                "10.0.0.2".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );
    }

    #[test]
    fn test_classify_drops_malformed_typed_values() {
        let set = classify(&["IP:not-an-ip", "uri:not a uri", "ok.example.com"]);
        assert!(set.ips.is_empty());
        assert!(set.uris.is_empty());
        assert_eq!(set.dns, vec!["ok.example.com"]);
    }

    #[test]
    fn test_classify_requires_absolute_uris() {
        let set = classify(&["uri:foo/bar", "uri:urn:example:svc"]);
        assert_eq!(set.uris, vec!["urn:example:svc"]);
        assert!(set.dns.is_empty());
    }

    #[test]
    fn test_classify_prefix_case_rules() {
        let set = classify(&["EMAIL:ops@example.com", "URI:spiffe://cluster/ns", "ip:10.0.0.1"]);
        assert_eq!(set.emails, vec!["ops@example.com"]);
        assert_eq!(set.uris, vec!["spiffe://cluster/ns"]);
        // lowercase ip tag is not a recognized prefix
        assert_eq!(set.dns, vec!["ip:10.0.0.1"]);
        assert!(set.ips.is_empty());
    }

    #[test]
    fn test_wildcards_pass_through() {
        let set = classify(&["*.example.com"]);
        assert_eq!(set.dns, vec!["*.example.com"]);
    }

    #[test]
    fn test_to_prefixed() {
        let set = classify(&["IP:10.0.0.1", "example.com", "email:a@b.com"]);
        assert_eq!(
            set.to_prefixed(),
            vec!["example.com", "IP:10.0.0.1", "email:a@b.com"]
        );
        assert_eq!(set.len(), 3);
        assert!(!set.is_empty());
    }
}
