//! Label encoding shared by every stats backend
//!
//! Labels are kept as a flat, ordered sequence of alternating key/value
//! strings. Push-style backends consume the sequence as-is (each element
//! becomes a path segment) while registry-style backends need a key/value
//! map, obtained through [`Labels::as_map`].
//!
//! Construction never validates the length; an odd number of elements is only
//! an error when a map is requested.

use std::collections::HashMap;
use std::fmt;

use super::error::{StatsError, StatsResult};

/// Ordered key/value label sequence: `["path", "/users", "method", "GET"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Labels(Vec<String>);

impl Labels {
    /// Create an empty label set.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an empty label set with room for `pairs` key/value pairs.
    pub fn with_capacity(pairs: usize) -> Self {
        Self(Vec::with_capacity(pairs.saturating_mul(2)))
    }

    /// Append a key/value pair.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push(key.into());
        self.0.push(value.into());
        self
    }

    /// Builder-style variant of [`Labels::push`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Number of raw elements (not pairs).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw elements in insertion order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterate over raw elements in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Convert to a key/value map.
    ///
    /// Returns an empty map for an empty sequence. When a key appears more
    /// than once the last value wins.
    ///
    /// # Errors
    /// Returns [`StatsError::OddLength`] when the sequence has an odd number
    /// of elements.
    pub fn as_map(&self) -> StatsResult<HashMap<&str, &str>> {
        if self.0.len() % 2 != 0 {
            return Err(StatsError::OddLength { len: self.0.len() });
        }

        Ok(self.0.chunks_exact(2).map(|pair| (pair[0].as_str(), pair[1].as_str())).collect())
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl<S: Into<String>> From<Vec<S>> for Labels {
    fn from(values: Vec<S>) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Labels {
    fn from(values: [S; N]) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for Labels {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build a [`Labels`] value from a list of string-like expressions.
///
/// ```rust
/// use statskit_common::labels;
///
/// let labels = labels!["path", "/users", "method", "GET"];
/// assert_eq!(labels.len(), 4);
/// ```
#[macro_export]
macro_rules! labels {
    () => {
        $crate::stats::Labels::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::stats::Labels::from(vec![$(::std::string::String::from($value)),+])
    };
}
