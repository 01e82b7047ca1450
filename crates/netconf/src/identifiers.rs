//! Newtype protocol identifiers.
//!
//! Every protocol value that carries identity is a distinct newtype wrapping a
//! `String`. This prevents accidentally passing, for example, a
//! [`MessageId`] where a [`SessionId`] is expected, even though both are
//! opaque strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty
            /// or whitespace only.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.len() == v.len() {
                    Some(Self(v))
                } else {
                    Some(Self(trimmed.to_owned()))
                }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Server-assigned identifier of a NETCONF session.
    ///
    /// Carried in the server's `<hello>` as `<session-id>`. Treated as opaque:
    /// servers are required to send a positive integer, but nothing in the
    /// client depends on that.
    SessionId
}

string_id! {
    /// Correlates an `<rpc>` request with its `<rpc-reply>`.
    ///
    /// The server echoes the `message-id` attribute back verbatim.
    MessageId
}

/// A named configuration datastore that operations act upon
/// (e.g. `"running"`, `"candidate"`, `"startup"`).
///
/// The name becomes an element name on the wire, so it must be an XML
/// NCName: a letter or `_` followed by letters, digits, `.`, `-` or `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Datastore(String);

impl MessageId {
    /// Generates a fresh, globally unique message identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Datastore {
    /// Creates a datastore name, returning `None` unless the trimmed value is
    /// a valid NCName.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        is_ncname(trimmed).then(|| Self(trimmed.to_owned()))
    }

    /// Returns the datastore name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `running` datastore.
    pub fn running() -> Self {
        Self("running".to_owned())
    }

    /// The `candidate` datastore (requires `:candidate`).
    pub fn candidate() -> Self {
        Self("candidate".to_owned())
    }

    /// The `startup` datastore (requires `:startup`).
    pub fn startup() -> Self {
        Self("startup".to_owned())
    }
}

impl std::fmt::Display for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Datastore {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Datastore::new(value.as_str()).ok_or_else(|| format!("invalid datastore name '{value}'"))
    }
}

impl From<Datastore> for String {
    fn from(datastore: Datastore) -> Self {
        datastore.0
    }
}

fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
