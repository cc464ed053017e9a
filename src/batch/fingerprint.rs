//! Fingerprint generation.

use crate::operation::OperationKind;
use sha2::{Digest, Sha256};
use std::fmt;

const ARG_DELIMITER: &[u8] = b",";

/// Dedup key for one (kind, args) pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

/// Derive the fingerprint of a command.
///
/// The digest covers the kind's prefix byte followed by every argument, each
/// terminated by `,`. Leading with the prefix keeps kinds with identical
/// arguments apart.
pub fn fingerprint<S: AsRef<str>>(kind: OperationKind, args: &[S]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update([kind.prefix()]);
    for arg in args {
        hasher.update(arg.as_ref().as_bytes());
        hasher.update(ARG_DELIMITER);
    }
    Fingerprint(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        let cases = [
            (
                vec!["a", "b", "c"],
                "6b23e5291e4989b8a7684eafdee18b55b0a2cab016d4a42a3feb7d70157c8a4f",
            ),
            (
                vec!["abc"],
                "5b14979300b6bec9418599a4f0b5770cb99c4f20ae4914a178f0e5025a3d925e",
            ),
        ];
        for (args, expected) in cases {
            let got = fingerprint(OperationKind::HDel, &args);
            assert_eq!(got.to_string(), expected);
            assert_eq!(got.to_string(), expected);
            assert_ne!(got, fingerprint(OperationKind::Del, &args));
        }
    }

    #[test]
    fn test_stable_across_calls_and_arg_types() {
        let owned = vec!["key".to_string(), "field".to_string()];
        let borrowed = ["key", "field"];
        assert_eq!(
            fingerprint(OperationKind::HGet, &owned),
            fingerprint(OperationKind::HGet, &borrowed)
        );
    }

    #[test]
    fn test_every_kind_differs_for_same_args() {
        let args = ["k1", "k2"];
        let mut seen = std::collections::HashSet::new();
        for kind in OperationKind::ALL {
            assert!(seen.insert(fingerprint(kind, &args)), "collision for {kind}");
        }
    }

    #[test]
    fn test_argument_order_matters() {
        assert_ne!(
            fingerprint(OperationKind::MGet, &["a", "b"]),
            fingerprint(OperationKind::MGet, &["b", "a"])
        );
    }
}
