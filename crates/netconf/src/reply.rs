//! The `<rpc-reply>` model.
//!
//! An [`RpcReply`] wraps the raw reply text and parses it lazily, exactly
//! once, on first access to any derived view. Parsing is guarded by a
//! [`OnceLock`], so a reply shared between threads is still parsed a single
//! time and every racing caller observes the same result.
//!
//! ## Error semantics
//!
//! RFC 6241 permits several `<rpc-error>` siblings in one reply; all are kept,
//! in document order. [`RpcReply::ok`] is `true` exactly when no
//! `<rpc-error>` was found, whether or not the server also sent `<ok/>`.
//!
//! ## Operation-specific payloads
//!
//! Replies are generic over a [`ReplyPayload`]. After the errors are
//! extracted, the payload type receives the already-parsed root element and
//! can pull out structured results without re-reading the raw text.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::xml::Element;
use crate::ReplyError;

// ---------------------------------------------------------------------------
// Payload hook
// ---------------------------------------------------------------------------

/// Extracts an operation-specific result from a parsed reply.
pub trait ReplyPayload: Sized + Send + Sync {
    /// Builds the payload from the reply root.
    ///
    /// `raw` is the text `root` was parsed from, for callers that need
    /// verbatim sub-documents (see [`Element::source`]).
    fn from_root(root: &Element, raw: &str) -> Result<Self, ReplyError>;
}

impl ReplyPayload for () {
    fn from_root(_root: &Element, _raw: &str) -> Result<Self, ReplyError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

struct Parsed<P> {
    root: Element,
    errors: Vec<RpcError>,
    payload: Result<P, ReplyError>,
}

/// A reply to an `<rpc>` request.
pub struct RpcReply<P = ()> {
    raw: String,
    parsed: OnceLock<Result<Parsed<P>, ReplyError>>,
}

impl<P: ReplyPayload> RpcReply<P> {
    /// Wraps a raw reply document. Nothing is parsed yet.
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            parsed: OnceLock::new(),
        }
    }

    /// The reply exactly as received.
    pub fn xml(&self) -> &str {
        &self.raw
    }

    /// Returns `true` once the reply has been parsed (successfully or not).
    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }

    /// Parses the reply if that has not happened yet.
    ///
    /// Later calls return the cached outcome without touching the raw text.
    pub fn parse(&self) -> Result<(), ReplyError> {
        self.parsed().map(|_| ())
    }

    /// `true` iff the reply contains no `<rpc-error>`.
    pub fn ok(&self) -> Result<bool, ReplyError> {
        Ok(self.parsed()?.errors.is_empty())
    }

    /// The first error, if any.
    pub fn error(&self) -> Result<Option<&RpcError>, ReplyError> {
        Ok(self.parsed()?.errors.first())
    }

    /// Every error, in document order.
    pub fn errors(&self) -> Result<&[RpcError], ReplyError> {
        Ok(&self.parsed()?.errors)
    }

    /// The operation-specific payload.
    ///
    /// A payload that could not be extracted fails only here; the error list
    /// stays readable.
    pub fn payload(&self) -> Result<&P, ReplyError> {
        self.parsed()?.payload.as_ref().map_err(Clone::clone)
    }

    /// The parsed `<rpc-reply>` element.
    pub fn root(&self) -> Result<&Element, ReplyError> {
        Ok(&self.parsed()?.root)
    }

    /// The reply root's direct children, serialized and concatenated.
    ///
    /// For operations whose result is nested one level inside the generic
    /// reply envelope. Each child is written with its resolved namespace, so
    /// the result stands alone even when the reply bound that namespace on
    /// `<rpc-reply>`.
    pub fn extract_subtree_xml(&self) -> Result<String, ReplyError> {
        let mut subtree = String::new();
        for child in self.root()?.children() {
            subtree.push_str(&child.to_xml()?);
        }
        Ok(subtree)
    }

    fn parsed(&self) -> Result<&Parsed<P>, ReplyError> {
        self.parsed
            .get_or_init(|| parse_reply(&self.raw))
            .as_ref()
            .map_err(Clone::clone)
    }
}

fn parse_reply<P: ReplyPayload>(raw: &str) -> Result<Parsed<P>, ReplyError> {
    let root = Element::parse(raw)?;
    let errors: Vec<RpcError> = root
        .children_named("rpc-error")
        .map(|element| RpcError::from_element(element, raw))
        .collect();
    debug!(
        errors = errors.len(),
        ok_marker = root.child("ok").is_some(),
        "parsed rpc-reply"
    );
    let payload = P::from_root(&root, raw);
    if let Err(e) = &payload {
        debug!(error = %e, "reply payload unavailable");
    }
    Ok(Parsed {
        root,
        errors,
        payload,
    })
}

impl<P> std::fmt::Debug for RpcReply<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcReply")
            .field("raw", &self.raw)
            .field("parsed", &self.parsed.get().is_some())
            .finish()
    }
}

impl<P> std::fmt::Display for RpcReply<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// Error record
// ---------------------------------------------------------------------------

/// One `<rpc-error>` reported by the server.
///
/// Known RFC 6241 fields are typed; any other child element of `<rpc-error>`
/// lands in [`extra`](Self::extra). Values are trimmed text, except
/// [`info`](Self::info), which keeps the `<error-info>` element's original
/// serialization because it may carry structured, application-defined
/// content.
///
/// Server-reported errors are data. They become a Rust error only when a
/// caller chooses to raise one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// `error-type`: transport, rpc, protocol or application.
    pub error_type: Option<String>,
    /// `error-tag`, e.g. `lock-denied`.
    pub tag: Option<String>,
    /// `error-severity`: error or warning.
    pub severity: Option<String>,
    /// `error-app-tag`.
    pub app_tag: Option<String>,
    /// `error-path`.
    pub path: Option<String>,
    /// `error-message`.
    pub message: Option<String>,
    /// `error-info`, verbatim.
    pub info: Option<String>,
    /// Unrecognised fields, keyed by local tag name.
    pub extra: BTreeMap<String, String>,
}

impl RpcError {
    fn from_element(element: &Element, raw: &str) -> Self {
        let mut error = RpcError::default();
        for field in element.children() {
            if field.name() == "error-info" {
                error.info = field.source(raw).map(str::to_owned);
                continue;
            }
            let text = field.text().map(str::trim).unwrap_or_default().to_owned();
            match field.name() {
                "error-type" => error.error_type = Some(text),
                "error-tag" => error.tag = Some(text),
                "error-severity" => error.severity = Some(text),
                "error-app-tag" => error.app_tag = Some(text),
                "error-path" => error.path = Some(text),
                "error-message" => error.message = Some(text),
                other => {
                    error.extra.insert(other.to_owned(), text);
                }
            }
        }
        error
    }

    /// Looks up any field by the local tag name it had in the reply
    /// (`"error-tag"`, `"error-info"`, or an unrecognised name).
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "error-type" => self.error_type.as_deref(),
            "error-tag" => self.tag.as_deref(),
            "error-severity" => self.severity.as_deref(),
            "error-app-tag" => self.app_tag.as_deref(),
            "error-path" => self.path.as_deref(),
            "error-message" => self.message.as_deref(),
            "error-info" => self.info.as_deref(),
            other => self.extra.get(other).map(String::as_str),
        }
    }

    /// Returns `true` if the field was present in the reply.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Every present field as `(tag name, value)`; known fields first.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        let known = [
            ("error-type", &self.error_type),
            ("error-tag", &self.tag),
            ("error-severity", &self.severity),
            ("error-app-tag", &self.app_tag),
            ("error-path", &self.path),
            ("error-message", &self.message),
            ("error-info", &self.info),
        ];
        known
            .into_iter()
            .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// `true` unless the server marked the error as a warning.
    pub fn is_error(&self) -> bool {
        self.severity.as_deref() != Some("warning")
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.tag, &self.message) {
            (Some(tag), Some(message)) => write!(f, "{tag}: {message}"),
            (None, Some(message)) => f.write_str(message),
            (Some(tag), None) => f.write_str(tag),
            (None, None) => f.write_str("rpc-error"),
        }
    }
}

impl std::error::Error for RpcError {}
