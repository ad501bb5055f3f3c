//! Content-addressed task identity
//!
//! A task is identified by the MD5 digest of the submitted sample, rendered as
//! 32 lowercase hex characters. The same bytes always map to the same task, which
//! is what makes the identity usable as the deduplication key.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a rendered task identity
pub const TASK_ID_LEN: usize = 32;

/// Task identity wrapper for type-safe handle passing
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

/// Rejected task handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid task id '{0}': expected 32 hex characters")]
pub struct ParseTaskIdError(pub String);

impl TaskId {
    /// Get the full ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Compute the task identity for a sample
pub fn identify(bytes: &[u8]) -> TaskId {
    let digest = Md5::digest(bytes);
    TaskId(hex::encode(digest))
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = ParseTaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != TASK_ID_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseTaskIdError(s.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for TaskId {
    type Error = ParseTaskIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identify_known_digest() {
        assert_eq!(identify(b"ABC").as_str(), "902fbdd2b1df0c4f70b4a5d23525e932");
    }

    #[test]
    fn test_identify_empty_input() {
        assert_eq!(identify(b"").as_str(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_parse_normalizes_case() {
        let id: TaskId = "902FBDD2B1DF0C4F70B4A5D23525E932".parse().unwrap();
        assert_eq!(id, identify(b"ABC"));
    }

    #[test]
    fn test_parse_rejects_bad_handles() {
        assert!("".parse::<TaskId>().is_err());
        assert!("902fbdd2".parse::<TaskId>().is_err());
        assert!("../../../../etc/passwd/aaaaaaaaaaaaaaaaa".parse::<TaskId>().is_err());
        assert!("zz2fbdd2b1df0c4f70b4a5d23525e932".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = identify(b"ABC");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"902fbdd2b1df0c4f70b4a5d23525e932\"");

        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<TaskId>("\"nope\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_identify_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let first = identify(&bytes);
            prop_assert_eq!(&first, &identify(&bytes));
            prop_assert_eq!(first.as_str().len(), TASK_ID_LEN);
            prop_assert_eq!(first.as_str().parse::<TaskId>().unwrap(), first);
        }

        #[test]
        fn prop_distinct_content_distinct_identity(a in proptest::collection::vec(any::<u8>(), 0..64),
                                                   b in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assume!(a != b);
            prop_assert_ne!(identify(&a), identify(&b));
        }
    }
}
