//! Per-command replies delivered to listeners.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A successful reply from the remote store.
///
/// One tagged type covers every command so the dispatcher keeps a single
/// fingerprint → outcome mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Int(i64),
    Bool(bool),
    Str(String),
    Map(BTreeMap<String, String>),
    List(Vec<String>),
    Values(Vec<Option<String>>),
}

/// A per-command failure. Shared by every listener of the command, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CommandError {
    /// The key (or field) does not exist.
    #[error("nil reply")]
    Nil,
    #[error("WRONGTYPE operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("backend error: {0}")]
    Backend(String),
}

/// What a single listener receives.
pub type Outcome = std::result::Result<Reply, CommandError>;

impl Reply {
    pub fn type_name(&self) -> &'static str {
        match self {
            Reply::Int(_) => "int",
            Reply::Bool(_) => "bool",
            Reply::Str(_) => "string",
            Reply::Map(_) => "map",
            Reply::List(_) => "list",
            Reply::Values(_) => "values",
        }
    }

    fn mismatch(self, expected: &'static str) -> Error {
        Error::UnexpectedReply {
            expected,
            actual: self.type_name(),
        }
    }

    pub fn into_int(self) -> Result<i64> {
        match self {
            Reply::Int(v) => Ok(v),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn into_bool(self) -> Result<bool> {
        match self {
            Reply::Bool(v) => Ok(v),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self {
            Reply::Str(v) => Ok(v),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn into_map(self) -> Result<BTreeMap<String, String>> {
        match self {
            Reply::Map(v) => Ok(v),
            other => Err(other.mismatch("map")),
        }
    }

    pub fn into_list(self) -> Result<Vec<String>> {
        match self {
            Reply::List(v) => Ok(v),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn into_values(self) -> Result<Vec<Option<String>>> {
        match self {
            Reply::Values(v) => Ok(v),
            other => Err(other.mismatch("values")),
        }
    }
}

/// Conversion from a raw reply into the value a typed command returns.
pub trait FromReply: Sized {
    fn from_reply(reply: Reply) -> Result<Self>;
}

impl FromReply for Reply {
    fn from_reply(reply: Reply) -> Result<Self> {
        Ok(reply)
    }
}

impl FromReply for i64 {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_int()
    }
}

impl FromReply for bool {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_bool()
    }
}

impl FromReply for String {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_string()
    }
}

impl FromReply for BTreeMap<String, String> {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_map()
    }
}

impl FromReply for Vec<String> {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_list()
    }
}

impl FromReply for Vec<Option<String>> {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_values()
    }
}
