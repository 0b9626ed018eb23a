//! Storefront session cookie jar.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The cookie string carried across requests to the upstream storefront.
///
/// The jar is opaque: it holds whatever `name=value` pairs the storefront
/// last issued, joined the way a `Cookie` request header expects them.
/// Cookies act as session credentials, so `Debug` redacts the value.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCookies(String);

impl SessionCookies {
    /// Create a cookie jar from an already-joined header value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Join individual `name=value` pairs into a jar.
    ///
    /// Returns `None` when no pairs are given, so callers can distinguish
    /// "the response set cookies" from "the response set none" and keep
    /// their existing jar in the latter case.
    #[must_use]
    pub fn from_pairs<I>(pairs: I) -> Option<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let joined = pairs
            .into_iter()
            .map(|pair| pair.as_ref().trim().to_owned())
            .filter(|pair| !pair.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        if joined.is_empty() {
            None
        } else {
            Some(Self(joined))
        }
    }

    /// Returns the `Cookie` header value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the jar holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SessionCookies(empty)")
        } else {
            f.write_str("SessionCookies([REDACTED])")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_joins_with_semicolons() {
        let jar = SessionCookies::from_pairs(["a=1", "b=2"]).expect("non-empty");
        assert_eq!(jar.as_str(), "a=1; b=2");
    }

    #[test]
    fn test_from_pairs_empty_is_none() {
        assert!(SessionCookies::from_pairs(Vec::<String>::new()).is_none());
        assert!(SessionCookies::from_pairs(["", "  "]).is_none());
    }

    #[test]
    fn test_debug_redacts_value() {
        let jar = SessionCookies::new("jsessionid=top-secret");
        let debug = format!("{jar:?}");
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_default_is_empty() {
        assert!(SessionCookies::default().is_empty());
    }
}
