//! Link records and identifiers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Digits used by [`LinkId::to_short_code`], in ascending value order.
pub const SHORT_CODE_ALPHABET: &[u8; 62] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const BASE: i64 = 62;

/// Store-assigned identifier of a link.
///
/// Identifiers come from the `links` table's `AUTOINCREMENT` primary key, so
/// they are positive, strictly increasing and never reused within one
/// database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(i64);

impl LinkId {
    /// Creates a link ID from a raw row id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw row id.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Renders the identifier as a base62 short code.
    ///
    /// Digits follow [`SHORT_CODE_ALPHABET`], most significant first. Negative
    /// identifiers never come out of the store but still render, with a
    /// leading `-`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vitedb::LinkId;
    ///
    /// assert_eq!(LinkId::new(0).to_short_code(), "0");
    /// assert_eq!(LinkId::new(61).to_short_code(), "Z");
    /// assert_eq!(LinkId::new(62).to_short_code(), "10");
    /// ```
    #[must_use]
    pub fn to_short_code(self) -> String {
        let mut digits = Vec::new();
        let mut rest = self.0.unsigned_abs();
        loop {
            #[allow(clippy::cast_possible_truncation)]
            let digit = (rest % 62) as usize;
            digits.push(SHORT_CODE_ALPHABET[digit]);
            rest /= 62;
            if rest == 0 {
                break;
            }
        }
        if self.0 < 0 {
            digits.push(b'-');
        }
        digits.iter().rev().map(|&b| char::from(b)).collect()
    }

    /// Parses a base62 short code produced by [`LinkId::to_short_code`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty code, a character outside
    /// [`SHORT_CODE_ALPHABET`], or a value that does not fit in an `i64`.
    pub fn from_short_code(code: &str) -> Result<Self> {
        let (negative, digits) = match code.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, code),
        };
        if digits.is_empty() {
            return Err(Error::InvalidInput(format!(
                "short code '{code}' has no digits"
            )));
        }

        let mut value: i64 = 0;
        for c in digits.chars() {
            let digit = digit_value(c).ok_or_else(|| {
                Error::InvalidInput(format!("short code '{code}' contains invalid character '{c}'"))
            })?;
            value = value
                .checked_mul(BASE)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| Error::InvalidInput(format!("short code '{code}' is out of range")))?;
        }

        Ok(Self(if negative { -value } else { value }))
    }
}

fn digit_value(c: char) -> Option<i64> {
    let value = match c {
        '0'..='9' => u32::from(c) - u32::from('0'),
        'a'..='z' => u32::from(c) - u32::from('a') + 10,
        'A'..='Z' => u32::from(c) - u32::from('A') + 36,
        _ => return None,
    };
    Some(i64::from(value))
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for LinkId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for LinkId {
    type Err = Error;

    /// Parses a decimal identifier.
    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("invalid link id '{s}': {e}")))
    }
}

/// A stored link: destination URL and click counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Store-assigned identifier.
    pub id: LinkId,
    /// Destination URL, exactly as inserted.
    pub url: String,
    /// Number of recorded clicks.
    pub clicks: i64,
}
