//! Postal pincode type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Pincode`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum PincodeError {
    /// The input is not exactly six characters.
    #[error("pincode must be exactly {expected} digits (got {got})")]
    WrongLength {
        /// Required number of digits.
        expected: usize,
        /// Number of characters received.
        got: usize,
    },
    /// The input contains a non-digit character.
    #[error("pincode must contain only digits")]
    NotNumeric,
    /// The input starts with a zero, which no delivery region uses.
    #[error("pincode cannot start with 0")]
    LeadingZero,
}

/// A six-digit Indian postal pincode.
///
/// The upstream storefront resolves a pincode to the regional substore that
/// serves it, so pincodes are validated before any lookup is issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pincode(String);

impl Pincode {
    /// Number of digits in a pincode.
    pub const LENGTH: usize = 6;

    /// Parse a `Pincode` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly six ASCII digits or
    /// starts with a zero.
    pub fn parse(s: &str) -> Result<Self, PincodeError> {
        if s.len() != Self::LENGTH {
            return Err(PincodeError::WrongLength {
                expected: Self::LENGTH,
                got: s.len(),
            });
        }

        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PincodeError::NotNumeric);
        }

        if s.starts_with('0') {
            return Err(PincodeError::LeadingZero);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the pincode as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Pincode {
    type Err = PincodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Pincode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Pincode::parse("110001").is_ok());
        assert!(Pincode::parse("560034").is_ok());
    }

    #[test]
    fn test_parse_wrong_length() {
        assert!(matches!(
            Pincode::parse("1100"),
            Err(PincodeError::WrongLength { got: 4, .. })
        ));
        assert!(matches!(
            Pincode::parse("1100011"),
            Err(PincodeError::WrongLength { got: 7, .. })
        ));
    }

    #[test]
    fn test_parse_non_numeric() {
        assert!(matches!(
            Pincode::parse("11000a"),
            Err(PincodeError::NotNumeric)
        ));
    }

    #[test]
    fn test_parse_leading_zero() {
        assert!(matches!(
            Pincode::parse("010001"),
            Err(PincodeError::LeadingZero)
        ));
    }

    #[test]
    fn test_display() {
        let pincode = Pincode::parse("110001").unwrap();
        assert_eq!(format!("{pincode}"), "110001");
    }
}
