//! Capability sets exchanged in the `<hello>` greeting.
//!
//! A [`Capabilities`] value is an unordered set of capability URIs. Membership
//! can be tested with the full URI or with the shorthand used throughout the
//! NETCONF RFCs: `":candidate"` (or `":candidate:1.0"`) matches
//! `urn:ietf:params:netconf:capability:candidate:1.0`, and `":base"` matches
//! any `urn:ietf:params:netconf:base:*` URI.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

const NETCONF_URN_PREFIX: &str = "urn:ietf:params:netconf:";

/// Base protocol capability, version 1.0.
pub const BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";

/// Capabilities a client advertises when the caller does not choose its own.
pub const CLIENT_DEFAULT: &[&str] = &[
    BASE_1_0,
    "urn:ietf:params:netconf:capability:writable-running:1.0",
    "urn:ietf:params:netconf:capability:candidate:1.0",
    "urn:ietf:params:netconf:capability:confirmed-commit:1.0",
    "urn:ietf:params:netconf:capability:rollback-on-error:1.0",
    "urn:ietf:params:netconf:capability:startup:1.0",
    "urn:ietf:params:netconf:capability:url:1.0",
    "urn:ietf:params:netconf:capability:validate:1.0",
    "urn:ietf:params:netconf:capability:xpath:1.0",
    "urn:ietf:params:netconf:capability:notification:1.0",
    "urn:ietf:params:netconf:capability:interleave:1.0",
];

/// An unordered set of capability URIs.
///
/// Iteration order is stable (lexicographic) so greetings built from equal
/// sets are byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities {
    uris: BTreeSet<String>,
}

impl Capabilities {
    /// Creates a set from any collection of URIs. Duplicates collapse.
    pub fn new<I, S>(uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut capabilities = Self::default();
        for uri in uris {
            capabilities.add(uri);
        }
        capabilities
    }

    /// The default client capability catalog ([`CLIENT_DEFAULT`]).
    pub fn client_default() -> Self {
        Self::new(CLIENT_DEFAULT.iter().copied())
    }

    /// Adds a URI. Surrounding whitespace is ignored; blank input is dropped.
    ///
    /// Returns `true` if the URI was not already present.
    pub fn add(&mut self, uri: impl Into<String>) -> bool {
        let uri = uri.into();
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.uris.insert(trimmed.to_owned())
    }

    /// Returns `true` if `key` names a member, either as a full URI or as a
    /// `:name[:version]` shorthand.
    pub fn contains(&self, key: &str) -> bool {
        if self.uris.contains(key) {
            return true;
        }
        key.starts_with(':')
            && self
                .uris
                .iter()
                .any(|uri| abbreviations(uri).iter().any(|abbr| abbr == key))
    }

    /// Iterates the URIs in stable order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.uris.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Capabilities {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a Capabilities {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::collections::btree_set::Iter<'a, String>, fn(&String) -> &str>;

    fn into_iter(self) -> Self::IntoIter {
        self.uris.iter().map(String::as_str as fn(&String) -> &str)
    }
}

impl std::fmt::Display for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for uri in &self.uris {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(uri)?;
            first = false;
        }
        Ok(())
    }
}

/// Shorthand forms for a NETCONF-defined capability URI.
///
/// `urn:ietf:params:netconf:capability:startup:1.0` → `:startup`, `:startup:1.0`
/// `urn:ietf:params:netconf:base:1.1` → `:base`, `:base:1.1`
fn abbreviations(uri: &str) -> Vec<String> {
    let uri = uri.split_once('?').map_or(uri, |(head, _)| head);
    let Some(rest) = uri.strip_prefix(NETCONF_URN_PREFIX) else {
        return Vec::new();
    };
    let parts: Vec<&str> = rest.split(':').collect();
    match parts.as_slice() {
        ["capability", name, version] => vec![format!(":{name}"), format!(":{name}:{version}")],
        ["capability", name] => vec![format!(":{name}")],
        ["base", version] => vec![":base".to_owned(), format!(":base:{version}")],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_collapse() {
        let caps = Capabilities::new([BASE_1_0, BASE_1_0, " urn:example:x "]);
        assert_eq!(caps.len(), 2);
        assert!(caps.contains("urn:example:x"));
    }

    #[test]
    fn blank_uris_are_ignored() {
        let mut caps = Capabilities::default();
        assert!(!caps.add("  "));
        assert!(caps.is_empty());
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = Capabilities::new(["urn:b", "urn:a"]);
        let b = Capabilities::new(["urn:a", "urn:b", "urn:a"]);
        assert_eq!(a, b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec!["urn:a", "urn:b"]);
    }

    #[test]
    fn shorthand_lookup() {
        let caps = Capabilities::new([
            BASE_1_0,
            "urn:ietf:params:netconf:capability:candidate:1.0",
            "urn:ietf:params:netconf:capability:url:1.0?scheme=http,ftp,file",
        ]);
        assert!(caps.contains(":base"));
        assert!(caps.contains(":base:1.0"));
        assert!(caps.contains(":candidate"));
        assert!(caps.contains(":candidate:1.0"));
        assert!(caps.contains(":url"));
        assert!(!caps.contains(":candidate:1.1"));
        assert!(!caps.contains(":xpath"));
    }

    #[test]
    fn vendor_uris_have_no_shorthand() {
        let caps = Capabilities::new(["http://example.net/router/2.3/myfeature"]);
        assert!(!caps.contains(":myfeature"));
        assert!(caps.contains("http://example.net/router/2.3/myfeature"));
    }

    #[test]
    fn client_default_catalog() {
        let caps = Capabilities::client_default();
        assert_eq!(caps.len(), CLIENT_DEFAULT.len());
        assert!(caps.contains(":base:1.0"));
        assert!(caps.contains(":xpath"));
    }

    #[test]
    fn serializes_as_a_list() {
        let caps = Capabilities::new(["urn:b", "urn:a"]);
        let json = serde_json::to_string(&caps).unwrap();
        assert_eq!(json, r#"["urn:a","urn:b"]"#);
    }
}
