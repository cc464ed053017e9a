//! Remote operation kinds understood by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a remote command.
///
/// The discriminant is the one-byte prefix mixed into every fingerprint, so the
/// numbering is part of the fingerprint format and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationKind {
    HDel = 1,
    Expire = 2,
    HGet = 3,
    HGetAll = 4,
    Get = 5,
    Del = 6,
    SMembers = 7,
    MGet = 8,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::HDel,
        OperationKind::Expire,
        OperationKind::HGet,
        OperationKind::HGetAll,
        OperationKind::Get,
        OperationKind::Del,
        OperationKind::SMembers,
        OperationKind::MGet,
    ];

    /// Fingerprint prefix byte.
    pub fn prefix(self) -> u8 {
        self as u8
    }

    /// Command name as the remote store spells it.
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::HDel => "HDEL",
            OperationKind::Expire => "EXPIRE",
            OperationKind::HGet => "HGET",
            OperationKind::HGetAll => "HGETALL",
            OperationKind::Get => "GET",
            OperationKind::Del => "DEL",
            OperationKind::SMembers => "SMEMBERS",
            OperationKind::MGet => "MGET",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
