//! Key patterns for bulk expiry.

/// A key pattern: either a literal key or a glob with a trailing `*`
/// matching any suffix (`house/*` matches `house/1` and `house/2`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    Literal(String),
    Prefix(String),
}

impl KeyPattern {
    /// Parses a raw pattern. Only a trailing `*` is a wildcard; a `*`
    /// anywhere else is matched literally.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Literal(raw.to_string()),
        }
    }

    /// Whether this pattern matches the given key.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Literal(literal) => key == literal,
            Self::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
