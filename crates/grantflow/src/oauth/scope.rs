//! Space-delimited scope sets.

use std::fmt;

/// An ordered set of scope tokens.
///
/// Parsing splits on whitespace and drops duplicates while keeping first
/// occurrence order, so `Display` reproduces a canonical scope string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope(Vec<String>);

impl Scope {
    /// Parses a space-delimited scope string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        value.split_whitespace().collect()
    }

    /// Returns `true` if no scope tokens are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct scope tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the tokens in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns `true` if the token is present.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|t| t == token)
    }

    /// Returns `true` if every token is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Scope) -> bool {
        self.iter().all(|token| other.contains(token))
    }

    /// Returns the tokens also present in `other`, in this scope's order.
    #[must_use]
    pub fn intersect(&self, other: &Scope) -> Scope {
        self.iter().filter(|token| other.contains(token)).collect()
    }

    /// Returns the tokens not present in `other`.
    #[must_use]
    pub fn difference(&self, other: &Scope) -> Scope {
        self.iter().filter(|token| !other.contains(token)).collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Scope {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tokens: Vec<String> = Vec::new();
        for token in iter {
            let token = token.into();
            if !token.is_empty() && !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        Self(tokens)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}
