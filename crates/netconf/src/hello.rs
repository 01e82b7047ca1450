//! The `<hello>` greeting exchanged once in each direction when a session
//! opens.
//!
//! Greetings are not RPCs: they carry no `message-id` and receive no reply.
//! The client's greeting lists its capabilities; the server's also carries the
//! session identifier it assigned.

use crate::xml::Element;
use crate::{Capabilities, HelloError, SessionId, XmlError, NETCONF_NS};

/// A parsed greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// Present only in greetings sent by a server.
    pub session_id: Option<SessionId>,
    /// Capabilities advertised by the sender.
    pub capabilities: Capabilities,
}

/// Builds the greeting document advertising `capabilities`.
pub fn build(capabilities: &Capabilities) -> Result<String, XmlError> {
    let uris = capabilities
        .iter()
        .map(|uri| Element::new("capability").with_text(uri));
    Element::new("hello")
        .with_namespace(NETCONF_NS)
        .with_child(Element::new("capabilities").with_children(uris))
        .to_document()
}

/// Parses a greeting document.
///
/// Capability order and duplicates are irrelevant. Elements other than
/// `session-id` and `capabilities` are ignored.
pub fn parse(raw: &str) -> Result<Hello, HelloError> {
    let root = Element::parse(raw)?;
    if root.name() != "hello" {
        return Err(HelloError::NotHello {
            found: root.name().to_owned(),
        });
    }

    let mut hello = Hello {
        session_id: None,
        capabilities: Capabilities::default(),
    };
    for child in root.children() {
        match child.name() {
            "session-id" => {
                hello.session_id = child.text().and_then(SessionId::new);
            }
            "capabilities" => {
                for capability in child.children_named("capability") {
                    if let Some(uri) = capability.text() {
                        hello.capabilities.add(uri);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(hello)
}
