//! Request-building helpers shared by operations.

use netconf::{Capabilities, Datastore, Element};

use crate::OperationError;

/// Requires exactly one of a group of mutually exclusive parameters.
///
/// Pass `is_some()` (or an equivalent presence test) for each candidate.
pub fn one_of(present: &[bool]) -> Result<(), OperationError> {
    match present.iter().filter(|p| **p).count() {
        0 => Err(OperationError::InsufficientParameters),
        1 => Ok(()),
        _ => Err(OperationError::TooManyParameters),
    }
}

fn require(capabilities: Option<&Capabilities>, capability: &str) -> Result<(), OperationError> {
    match capabilities {
        Some(caps) if !caps.contains(capability) => Err(OperationError::MissingCapability {
            capability: capability.to_owned(),
        }),
        _ => Ok(()),
    }
}

/// Builds `<{wrapper}>` around either a datastore or a URL.
///
/// Exactly one of `datastore` and `url` must be given. The datastore becomes
/// an empty element named after it; the URL goes in a `<url>` element and
/// needs the `:url` capability when `capabilities` is supplied.
pub fn store_or_url(
    wrapper: &str,
    datastore: Option<&Datastore>,
    url: Option<&str>,
    capabilities: Option<&Capabilities>,
) -> Result<Element, OperationError> {
    one_of(&[datastore.is_some(), url.is_some()])?;
    let inner = match (datastore, url) {
        (Some(datastore), _) => Element::new(datastore.as_str()),
        (None, Some(url)) => {
            require(capabilities, ":url")?;
            Element::new("url").with_text(url)
        }
        (None, None) => return Err(OperationError::InsufficientParameters),
    };
    Ok(Element::new(wrapper).with_child(inner))
}

/// Selection criteria for `<get>`-style operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Subtree filter: the criteria element is copied under `<filter>`.
    Subtree(Element),
    /// XPath filter: the expression goes in the `select` attribute.
    XPath(String),
}

impl Filter {
    /// Builds a filter from a kind name and its criteria text.
    ///
    /// For `subtree` the criteria must be an XML fragment with a single
    /// root. For `xpath` it is the expression.
    pub fn parse(kind: &str, criteria: &str) -> Result<Self, OperationError> {
        match kind {
            "subtree" => Ok(Filter::Subtree(Element::parse(criteria)?)),
            "xpath" => Ok(Filter::XPath(criteria.to_owned())),
            other => Err(OperationError::InvalidFilterType {
                kind: other.to_owned(),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Filter::Subtree(_) => "subtree",
            Filter::XPath(_) => "xpath",
        }
    }
}

/// Builds the `<filter>` element for `filter`.
///
/// XPath filters need the `:xpath` capability when `capabilities` is
/// supplied.
pub fn build_filter(
    filter: &Filter,
    capabilities: Option<&Capabilities>,
) -> Result<Element, OperationError> {
    let element = Element::new("filter").with_attribute("type", filter.kind());
    match filter {
        Filter::Subtree(criteria) => Ok(element.with_child(criteria.clone())),
        Filter::XPath(expression) => {
            require(capabilities, ":xpath")?;
            Ok(element.with_attribute("select", expression.as_str()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_of_counts_presence() {
        assert!(matches!(
            one_of(&[false, false]),
            Err(OperationError::InsufficientParameters)
        ));
        assert!(one_of(&[false, true]).is_ok());
        assert!(matches!(
            one_of(&[true, true, false]),
            Err(OperationError::TooManyParameters)
        ));
        assert!(matches!(
            one_of(&[]),
            Err(OperationError::InsufficientParameters)
        ));
    }

    #[test]
    fn datastore_names_become_elements() {
        let source = store_or_url("source", Some(&Datastore::running()), None, None).unwrap();
        assert_eq!(source.to_xml().unwrap(), "<source><running/></source>");
    }

    #[test]
    fn store_and_url_are_mutually_exclusive() {
        assert!(matches!(
            store_or_url("source", None, None, None),
            Err(OperationError::InsufficientParameters)
        ));
        assert!(matches!(
            store_or_url("source", Some(&Datastore::running()), Some("ftp://h/c"), None),
            Err(OperationError::TooManyParameters)
        ));
    }

    #[test]
    fn url_text_is_escaped_not_spliced() {
        let target = store_or_url("target", None, Some("ftp://h/a<b/>"), None).unwrap();
        let xml = target.to_xml().unwrap();
        let reparsed = Element::parse(&xml).unwrap();
        assert_eq!(reparsed.children().len(), 1);
        let url = reparsed.child("url").unwrap();
        assert!(url.children().is_empty());
        assert_eq!(url.text(), Some("ftp://h/a<b/>"));
    }

    #[test]
    fn urls_need_the_url_capability() {
        let with_url = Capabilities::new(["urn:ietf:params:netconf:capability:url:1.0"]);
        let target =
            store_or_url("target", None, Some("ftp://host/cfg.xml"), Some(&with_url)).unwrap();
        assert_eq!(
            target.to_xml().unwrap(),
            "<target><url>ftp://host/cfg.xml</url></target>"
        );

        let without = Capabilities::new(["urn:ietf:params:netconf:base:1.0"]);
        assert!(matches!(
            store_or_url("target", None, Some("ftp://host/cfg.xml"), Some(&without)),
            Err(OperationError::MissingCapability { capability }) if capability == ":url"
        ));
        // No capability set means no check.
        assert!(store_or_url("target", None, Some("file:///cfg.xml"), None).is_ok());
    }

    #[test]
    fn subtree_filter_wraps_criteria() {
        let filter = Filter::parse("subtree", "<interfaces><interface/></interfaces>").unwrap();
        let element = build_filter(&filter, None).unwrap();
        assert_eq!(
            element.to_xml().unwrap(),
            r#"<filter type="subtree"><interfaces><interface/></interfaces></filter>"#
        );
    }

    #[test]
    fn xpath_filter_uses_select() {
        let caps = Capabilities::new(["urn:ietf:params:netconf:capability:xpath:1.0"]);
        let filter = Filter::parse("xpath", "/interfaces/interface").unwrap();
        let element = build_filter(&filter, Some(&caps)).unwrap();
        assert_eq!(element.attribute("type"), Some("xpath"));
        assert_eq!(element.attribute("select"), Some("/interfaces/interface"));

        let bare = Capabilities::new(["urn:ietf:params:netconf:base:1.0"]);
        assert!(matches!(
            build_filter(&filter, Some(&bare)),
            Err(OperationError::MissingCapability { .. })
        ));
    }

    #[test]
    fn unknown_filter_kind_is_rejected() {
        assert!(matches!(
            Filter::parse("regex", ".*"),
            Err(OperationError::InvalidFilterType { kind }) if kind == "regex"
        ));
    }
}
