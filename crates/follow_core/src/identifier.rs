use std::collections::BTreeSet;
use std::fmt;

/// Path segments the platform uses for navigation; never account handles.
pub const RESERVED_PATHS: &[&str] = &["explore", "accounts", "p", "reels", "stories", "direct"];

/// A set of accounts in one relationship direction, ordered by normalized handle.
pub type RelationSet = BTreeSet<Identifier>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("empty handle")]
    Empty,
    #[error("handle {0:?} contains whitespace or a path separator")]
    Malformed(String),
    #[error("handle {0:?} is a reserved navigation path")]
    Reserved(String),
}

/// A normalized, case-insensitive account handle.
///
/// Equality and ordering are defined on the normalized form, so `"Alice "`
/// and `"@alice"` parse to the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(IdentifierError::Malformed(trimmed.to_string()));
        }
        let normalized = trimmed.to_lowercase();
        if RESERVED_PATHS.contains(&normalized.as_str()) {
            return Err(IdentifierError::Reserved(normalized));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse every handle, silently dropping the ones that are not identifiers.
    pub fn collect_valid<I, S>(raw: I) -> RelationSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .filter_map(|s| Identifier::parse(s.as_ref()).ok())
            .collect()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which side of the relationship a harvest reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Accounts the acting user follows.
    Following,
    /// Accounts that follow the acting user.
    Followers,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Following => "following",
            Direction::Followers => "followers",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
