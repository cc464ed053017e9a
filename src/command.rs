//! Typed commands and their canonical argument form.
//!
//! The engine only ever sees `(OperationKind, Vec<String>)`. [`Command::to_args`]
//! produces that form from a typed command and [`Command::from_args`] turns it
//! back into one on the executor side.

use crate::operation::OperationKind;
use crate::{Error, ErrorContext, Result};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    HDel { key: String, fields: Vec<String> },
    Expire { key: String, ttl: Duration },
    HGet { key: String, field: String },
    HGetAll { key: String },
    Get { key: String },
    Del { keys: Vec<String> },
    SMembers { key: String },
    MGet { keys: Vec<String> },
}

impl Command {
    pub fn kind(&self) -> OperationKind {
        match self {
            Command::HDel { .. } => OperationKind::HDel,
            Command::Expire { .. } => OperationKind::Expire,
            Command::HGet { .. } => OperationKind::HGet,
            Command::HGetAll { .. } => OperationKind::HGetAll,
            Command::Get { .. } => OperationKind::Get,
            Command::Del { .. } => OperationKind::Del,
            Command::SMembers { .. } => OperationKind::SMembers,
            Command::MGet { .. } => OperationKind::MGet,
        }
    }

    /// Canonical argument list, used for fingerprinting and submission.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Command::HDel { key, fields } => {
                let mut args = Vec::with_capacity(fields.len() + 1);
                args.push(key.clone());
                args.extend(fields.iter().cloned());
                args
            }
            // nanoseconds, so the round trip through a string is lossless
            Command::Expire { key, ttl } => vec![key.clone(), ttl.as_nanos().to_string()],
            Command::HGet { key, field } => vec![key.clone(), field.clone()],
            Command::HGetAll { key } | Command::Get { key } | Command::SMembers { key } => {
                vec![key.clone()]
            }
            Command::Del { keys } | Command::MGet { keys } => keys.clone(),
        }
    }

    pub fn into_parts(self) -> (OperationKind, Vec<String>) {
        (self.kind(), self.to_args())
    }

    /// Rebuild a typed command from its canonical arguments.
    pub fn from_args<S: AsRef<str>>(kind: OperationKind, args: &[S]) -> Result<Self> {
        let arg = |i: usize| args[i].as_ref().to_string();
        let rest = |from: usize| -> Vec<String> {
            args[from..].iter().map(|s| s.as_ref().to_string()).collect()
        };
        let cmd = match kind {
            OperationKind::HDel => {
                expect_at_least(kind, args.len(), 1)?;
                Command::HDel {
                    key: arg(0),
                    fields: rest(1),
                }
            }
            OperationKind::Expire => {
                expect_exactly(kind, args.len(), 2)?;
                let nanos: u64 = args[1].as_ref().parse().map_err(|_| {
                    Error::validation_with_context(
                        "expiration is not a nanosecond count",
                        ErrorContext::new()
                            .with_field_path("args[1]")
                            .with_details(args[1].as_ref().to_string())
                            .with_source("command"),
                    )
                })?;
                Command::Expire {
                    key: arg(0),
                    ttl: Duration::from_nanos(nanos),
                }
            }
            OperationKind::HGet => {
                expect_exactly(kind, args.len(), 2)?;
                Command::HGet {
                    key: arg(0),
                    field: arg(1),
                }
            }
            OperationKind::HGetAll => {
                expect_exactly(kind, args.len(), 1)?;
                Command::HGetAll { key: arg(0) }
            }
            OperationKind::Get => {
                expect_exactly(kind, args.len(), 1)?;
                Command::Get { key: arg(0) }
            }
            OperationKind::SMembers => {
                expect_exactly(kind, args.len(), 1)?;
                Command::SMembers { key: arg(0) }
            }
            OperationKind::Del => {
                expect_at_least(kind, args.len(), 1)?;
                Command::Del { keys: rest(0) }
            }
            OperationKind::MGet => {
                expect_at_least(kind, args.len(), 1)?;
                Command::MGet { keys: rest(0) }
            }
        };
        Ok(cmd)
    }
}

fn arity_error(kind: OperationKind, expected: String, got: usize) -> Error {
    Error::validation_with_context(
        format!("wrong number of arguments for {}", kind),
        ErrorContext::new()
            .with_details(format!("expected {}, got {}", expected, got))
            .with_source("command"),
    )
}

fn expect_exactly(kind: OperationKind, got: usize, n: usize) -> Result<()> {
    if got != n {
        return Err(arity_error(kind, n.to_string(), got));
    }
    Ok(())
}

fn expect_at_least(kind: OperationKind, got: usize, n: usize) -> Result<()> {
    if got < n {
        return Err(arity_error(kind, format!("at least {}", n), got));
    }
    Ok(())
}
