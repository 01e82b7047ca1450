//! A small element tree for NETCONF documents.
//!
//! Requests are built as [`Element`] trees and serialized by exactly one
//! writer ([`Element::to_xml`] / [`Element::to_document`]). Inbound documents
//! are parsed back into the same shape by [`Element::parse`], which also
//! records where each element sits in the source text so sub-documents can be
//! handed out verbatim.
//!
//! Every builder call yields an owned, independent tree. There are no shared
//! templates to mutate.
//!
//! ## Namespaces
//!
//! A parsed element carries its resolved namespace URI. A built element with
//! no namespace inherits its parent's on the wire; one whose namespace
//! differs from its parent's is written with a default `xmlns` declaration.

use std::collections::BTreeMap;
use std::ops::Range;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::Writer;

use crate::XmlError;

// ---------------------------------------------------------------------------
// Root descriptor
// ---------------------------------------------------------------------------

/// Name and attributes of a document's root element.
///
/// Produced by [`parse_root`], which stops reading at the first start tag.
/// Listeners use it to decide cheaply whether a document concerns them before
/// paying for a full parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootElement {
    /// Resolved namespace URI of the root element, if bound.
    pub namespace: Option<String>,
    /// Local (unprefixed) name of the root element.
    pub name: String,
    /// Attributes keyed by their name as written. Namespace declarations are
    /// excluded.
    pub attributes: BTreeMap<String, String>,
}

impl RootElement {
    /// Returns `true` if the root's local name is `name`.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Looks up an attribute by its written name or by its local part.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        lookup_attribute(
            self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            name,
        )
    }

    /// Returns the root tag in `{namespace}name` notation.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{ns}}}{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Reads `raw` only up to its first start tag and describes the root element.
pub fn parse_root(raw: &str) -> Result<RootElement, XmlError> {
    let mut reader = NsReader::from_str(raw);
    loop {
        let (resolved, event) = reader.read_resolved_event().map_err(XmlError::parse)?;
        let namespace = owned_namespace(&resolved);
        match event {
            Event::Start(start) | Event::Empty(start) => {
                return Ok(RootElement {
                    namespace,
                    name: local_name(&start),
                    attributes: read_attributes(&start)?.into_iter().collect(),
                });
            }
            Event::Eof => return Err(XmlError::Empty),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Element tree
// ---------------------------------------------------------------------------

/// An XML element: name, namespace, attributes, ordered children, and text.
///
/// Mixed content is not modelled: `text` is the character data that precedes
/// the first child element, which is all NETCONF payloads use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: Option<String>,
    span: Option<Range<usize>>,
}

impl Element {
    /// Creates an element with the given local name and nothing else.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            attributes: Vec::new(),
            children: Vec::new(),
            text: None,
            span: None,
        }
    }

    /// Sets the namespace URI.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Appends an attribute. Attributes are written in insertion order.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Appends every element of `children`, preserving order.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    /// Sets the text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Appends a child element in place.
    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Looks up an attribute by its written name or by its local part.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        lookup_attribute(
            self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            name,
        )
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children with the given local name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Character data preceding the first child, as found.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Byte range of this element in the text it was parsed from.
    ///
    /// `None` for elements built in code.
    pub fn span(&self) -> Option<Range<usize>> {
        self.span.clone()
    }

    /// Returns this element's original serialization within `raw`.
    ///
    /// `raw` must be the text the tree was parsed from.
    pub fn source<'r>(&self, raw: &'r str) -> Option<&'r str> {
        self.span.as_ref().and_then(|span| raw.get(span.clone()))
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Serializes the tree as an XML fragment.
    pub fn to_xml(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        self.write_into(&mut writer, None)?;
        String::from_utf8(writer.into_inner()).map_err(XmlError::write)
    }

    /// Serializes the tree as a complete document with an XML declaration.
    pub fn to_document(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(XmlError::write)?;
        self.write_into(&mut writer, None)?;
        String::from_utf8(writer.into_inner()).map_err(XmlError::write)
    }

    fn write_into(
        &self,
        writer: &mut Writer<Vec<u8>>,
        inherited_namespace: Option<&str>,
    ) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        if let Some(ns) = self.namespace.as_deref() {
            if inherited_namespace != Some(ns) {
                start.push_attribute(("xmlns", ns));
            }
        }
        for (name, value) in &self.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        let text = self.text.as_deref().filter(|t| !t.is_empty());
        if self.children.is_empty() && text.is_none() {
            writer
                .write_event(Event::Empty(start))
                .map_err(XmlError::write)?;
            return Ok(());
        }

        writer
            .write_event(Event::Start(start))
            .map_err(XmlError::write)?;
        if let Some(text) = text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(XmlError::write)?;
        }
        let in_scope = self.namespace.as_deref().or(inherited_namespace);
        for child in &self.children {
            child.write_into(writer, in_scope)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(XmlError::write)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    /// Parses a complete document into a tree.
    ///
    /// Comments, processing instructions and the XML declaration are skipped.
    /// Each element's [`span`](Self::span) is recorded against `raw`.
    pub fn parse(raw: &str) -> Result<Element, XmlError> {
        let mut reader = NsReader::from_str(raw);
        let mut open: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let offset = reader.buffer_position() as usize;
            let (resolved, event) = reader.read_resolved_event().map_err(XmlError::parse)?;
            let namespace = owned_namespace(&resolved);
            match event {
                Event::Start(start) => {
                    let mut element = Element::from_start(&start, namespace)?;
                    element.span = Some(offset..offset);
                    open.push(element);
                }
                Event::Empty(start) => {
                    let mut element = Element::from_start(&start, namespace)?;
                    element.span = Some(offset..reader.buffer_position() as usize);
                    attach(element, &mut open, &mut root)?;
                }
                Event::End(_) => {
                    let mut element = open
                        .pop()
                        .ok_or_else(|| XmlError::parse("unexpected closing tag"))?;
                    if let Some(span) = element.span.as_mut() {
                        span.end = reader.buffer_position() as usize;
                    }
                    attach(element, &mut open, &mut root)?;
                }
                Event::Text(text) => {
                    if let Some(current) = open.last_mut() {
                        if current.children.is_empty() {
                            let text = text.unescape().map_err(XmlError::parse)?;
                            current.append_text(&text);
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = open.last_mut() {
                        if current.children.is_empty() {
                            current.append_text(&String::from_utf8_lossy(&data));
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !open.is_empty() {
            return Err(XmlError::parse("unexpected end of document"));
        }
        root.ok_or(XmlError::Empty)
    }

    fn from_start(start: &BytesStart<'_>, namespace: Option<String>) -> Result<Self, XmlError> {
        let mut element = Element::new(local_name(start));
        element.namespace = namespace;
        element.attributes = read_attributes(start)?;
        Ok(element)
    }

    fn append_text(&mut self, text: &str) {
        self.text.get_or_insert_with(String::new).push_str(text);
    }
}

fn attach(
    element: Element,
    open: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), XmlError> {
    if let Some(parent) = open.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(XmlError::parse("multiple root elements"));
    }
    Ok(())
}

fn owned_namespace(resolved: &ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn read_attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>, XmlError> {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(XmlError::parse)?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let name = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(XmlError::parse)?;
        attributes.push((name, value.into_owned()));
    }
    Ok(attributes)
}

fn lookup_attribute<'a>(
    mut attributes: impl Iterator<Item = (&'a str, &'a str)>,
    name: &str,
) -> Option<&'a str> {
    attributes.find_map(|(key, value)| {
        let local = key.rsplit_once(':').map_or(key, |(_, local)| local);
        (key == name || local == name).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

    #[test]
    fn builds_nested_request() {
        let rpc = Element::new("rpc")
            .with_namespace(BASE)
            .with_attribute("message-id", "101")
            .with_child(
                Element::new("lock")
                    .with_child(Element::new("target").with_child(Element::new("running"))),
            );
        assert_eq!(
            rpc.to_xml().unwrap(),
            format!(
                "<rpc xmlns=\"{BASE}\" message-id=\"101\"><lock><target><running/></target></lock></rpc>"
            )
        );
    }

    #[test]
    fn document_has_declaration() {
        let doc = Element::new("hello").to_document().unwrap();
        assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(doc.ends_with("<hello/>"));
    }

    #[test]
    fn text_is_escaped() {
        let xml = Element::new("url").with_text("a<b&c").to_xml().unwrap();
        assert_eq!(xml, "<url>a&lt;b&amp;c</url>");
    }

    #[test]
    fn foreign_namespace_is_declared() {
        let xml = Element::new("config")
            .with_namespace(BASE)
            .with_child(Element::new("top").with_namespace("urn:example"))
            .to_xml()
            .unwrap();
        assert_eq!(
            xml,
            format!("<config xmlns=\"{BASE}\"><top xmlns=\"urn:example\"/></config>")
        );
    }

    #[test]
    fn parses_namespaces_and_attributes() {
        let raw = format!(
            "<?xml version=\"1.0\"?>\n<nc:rpc-reply xmlns:nc=\"{BASE}\" nc:message-id=\"7\" extra=\"x\"><nc:ok/></nc:rpc-reply>"
        );
        let root = Element::parse(&raw).unwrap();
        assert_eq!(root.name(), "rpc-reply");
        assert_eq!(root.namespace(), Some(BASE));
        assert_eq!(root.attribute("message-id"), Some("7"));
        assert_eq!(root.attribute("extra"), Some("x"));
        assert_eq!(root.attributes().len(), 2);
        let ok = root.child("ok").unwrap();
        assert_eq!(ok.namespace(), Some(BASE));
    }

    #[test]
    fn spans_cover_original_text() {
        let raw = "<a>\n  <b x=\"1\">t</b>\n  <c/>\n</a>";
        let root = Element::parse(raw).unwrap();
        assert_eq!(root.source(raw), Some(raw));
        assert_eq!(root.children()[0].source(raw), Some("<b x=\"1\">t</b>"));
        assert_eq!(root.children()[1].source(raw), Some("<c/>"));
    }

    #[test]
    fn text_before_first_child_only() {
        let root = Element::parse("<a> head <b>inner</b> tail </a>").unwrap();
        assert_eq!(root.text(), Some(" head "));
        assert_eq!(root.child("b").unwrap().text(), Some("inner"));
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(matches!(Element::parse("<a><b></a>"), Err(XmlError::Parse { .. })));
        assert!(matches!(Element::parse("<a>"), Err(XmlError::Parse { .. })));
        assert_eq!(Element::parse("   "), Err(XmlError::Empty));
    }

    #[test]
    fn root_descriptor_is_partial() {
        // Only the first start tag is read, so trailing garbage is not seen.
        let root = parse_root(&format!(
            "<rpc-reply xmlns=\"{BASE}\" message-id=\"42\"><unterminated>"
        ))
        .unwrap();
        assert!(root.is("rpc-reply"));
        assert_eq!(root.namespace.as_deref(), Some(BASE));
        assert_eq!(root.attribute("message-id"), Some("42"));
        assert_eq!(root.qualified_name(), format!("{{{BASE}}}rpc-reply"));
    }

    #[test]
    fn root_descriptor_of_empty_input() {
        assert_eq!(parse_root(""), Err(XmlError::Empty));
    }
}
