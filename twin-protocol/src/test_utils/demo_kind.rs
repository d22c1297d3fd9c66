//! DemoKind: a small resource enumeration for tests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource and event kinds of a directory/chat bridge, for tests.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoKind {
    /// A person in the directory.
    Practitioner,
    /// A role a person holds.
    PractitionerRole,
    /// A chat room.
    Room,
    /// A message posted to a room.
    RoomMessage,
}

impl fmt::Display for DemoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DemoKind::Practitioner => "practitioner",
            DemoKind::PractitionerRole => "practitioner_role",
            DemoKind::Room => "room",
            DemoKind::RoomMessage => "room_message",
        };
        f.write_str(s)
    }
}
