//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for remote identifiers and content digests.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// RemoteId
// ============================================================================

/// Identifier of a file or folder on the remote service
///
/// Box identifiers are decimal strings, but the type only rejects values
/// that can never be sent in a URL path segment. Whether an id is
/// well-formed for a given endpoint is decided by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Id of the account's root folder
    pub const ROOT: &'static str = "0";

    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the id is empty or contains path separators or whitespace
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be empty".to_string(),
            ));
        }

        if id
            .chars()
            .any(|c| c == '/' || c == '?' || c == '#' || c.is_whitespace())
        {
            return Err(DomainError::InvalidRemoteId(format!(
                "Remote ID contains invalid characters: {id}"
            )));
        }

        Ok(Self(id))
    }

    /// The root folder id
    #[must_use]
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    /// Returns true if this is the root folder id
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    /// Returns true if the id consists only of ASCII digits
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.0.chars().all(|c| c.is_ascii_digit())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

// ============================================================================
// ContentHash
// ============================================================================

/// SHA-1 content digest as reported by the remote `sha1` field
///
/// Format: 40 hexadecimal characters, stored lowercase so that digests
/// computed locally and digests reported by the server compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of a hex-encoded SHA-1 digest
    const HEX_LEN: usize = 40;

    /// Create a new ContentHash
    ///
    /// # Errors
    /// Returns error if the value is not a 40 character hex string
    pub fn new(hash: String) -> Result<Self, DomainError> {
        if hash.len() != Self::HEX_LEN {
            return Err(DomainError::InvalidHash(format!(
                "expected {} hex characters, got {}",
                Self::HEX_LEN,
                hash.len()
            )));
        }

        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(format!(
                "not a hex digest: {hash}"
            )));
        }

        Ok(Self(hash.to_ascii_lowercase()))
    }

    /// Build a ContentHash from raw digest bytes
    ///
    /// # Errors
    /// Returns error if the digest is not 20 bytes long
    pub fn from_digest(digest: &[u8]) -> Result<Self, DomainError> {
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self::new(hex)
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod remote_id_tests {
        use super::*;

        #[test]
        fn test_valid_id() {
            let id = RemoteId::new("11446498".to_string()).unwrap();
            assert_eq!(id.as_str(), "11446498");
            assert!(id.is_numeric());
        }

        #[test]
        fn test_empty_fails() {
            assert!(RemoteId::new(String::new()).is_err());
        }

        #[test]
        fn test_separator_fails() {
            assert!(RemoteId::new("12/34".to_string()).is_err());
            assert!(RemoteId::new("12 34".to_string()).is_err());
        }

        #[test]
        fn test_non_numeric_is_accepted_but_flagged() {
            let id = RemoteId::new("abc".to_string()).unwrap();
            assert!(!id.is_numeric());
        }

        #[test]
        fn test_root() {
            let root = RemoteId::root();
            assert!(root.is_root());
            assert_eq!(root.as_str(), "0");
        }

        #[test]
        fn test_deserialize_rejects_empty() {
            let result: Result<RemoteId, _> = serde_json::from_str("\"\"");
            assert!(result.is_err());
        }
    }

    mod content_hash_tests {
        use super::*;

        const SHA1_HELLO: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

        #[test]
        fn test_valid_hash() {
            let hash = ContentHash::new(SHA1_HELLO.to_string()).unwrap();
            assert_eq!(hash.as_str(), SHA1_HELLO);
        }

        #[test]
        fn test_uppercase_is_normalized() {
            let upper = ContentHash::new(SHA1_HELLO.to_uppercase()).unwrap();
            let lower = ContentHash::new(SHA1_HELLO.to_string()).unwrap();
            assert_eq!(upper, lower);
        }

        #[test]
        fn test_wrong_length_fails() {
            assert!(ContentHash::new("abc".to_string()).is_err());
        }

        #[test]
        fn test_non_hex_fails() {
            let value = "z".repeat(40);
            assert!(ContentHash::new(value).is_err());
        }

        #[test]
        fn test_from_digest() {
            let digest = [0xabu8; 20];
            let hash = ContentHash::from_digest(&digest).unwrap();
            assert_eq!(hash.as_str(), "ab".repeat(20));
        }

        #[test]
        fn test_from_short_digest_fails() {
            assert!(ContentHash::from_digest(&[1, 2, 3]).is_err());
        }
    }
}
