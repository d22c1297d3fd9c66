//! Typed identifiers for units of work, stimuli, twins, behaviours and routing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers keep a twin id from being passed where a unit-of-work
/// id is expected. They are plain strings underneath; the engine never
/// interprets their contents.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(UowId, "Unique identifier for an inbound unit of work.");
typed_id!(StimulusId, "Unique identifier for a stimulus held by the stimulus store.");
typed_id!(TwinId, "Opaque identity of a twin instance (a person, a room, ...).");
typed_id!(NodeRef, "Reference to the node a unit of work arrived from.");
typed_id!(EndpointRef, "Resolved egress endpoint a transport packet is sent to.");
typed_id!(ForwarderId, "A downstream forwarder registered against a twin.");
typed_id!(Topic, "An upstream subscription topic declared by a behaviour.");

impl UowId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl StimulusId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Identity of a pluggable behaviour: a name plus a version.
///
/// Two registrations with the same name but different versions are
/// distinct behaviours and are filtered and dispatched independently.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BehaviourId {
    /// Behaviour name.
    pub name: String,
    /// Behaviour version.
    pub version: String,
}

impl BehaviourId {
    /// Create a new behaviour identity.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for BehaviourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
