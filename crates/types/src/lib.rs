//! Validated location types for stored uploads.
//!
//! Every upload is filed under a facility and a period (a visit date for photos, a month for
//! receipts). These values end up as directory names beneath the storage root, so they are
//! validated once, at the boundary, and carried around as newtypes afterwards. Code that holds a
//! [`FacilityId`], [`VisitDate`] or [`ReceiptMonth`] can join it onto a path without re-checking.
//!
//! ```text
//! <root>/photos/<FacilityId>/<VisitDate>/...
//! <root>/receipts/<FacilityId>/<ReceiptMonth>/...
//! ```

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// Maximum accepted length of a facility identifier.
pub const MAX_FACILITY_ID_LEN: usize = 64;

/// Errors produced when a location argument is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// Facility identifier is empty, too long, or contains characters outside `[A-Za-z0-9_-]`
    #[error("invalid facility id '{0}'")]
    InvalidFacilityId(String),

    /// Visit date is not a real calendar date in `YYYY-MM-DD` form
    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// Receipt month is not in `YYYY-MM` form
    #[error("invalid month '{0}' (expected YYYY-MM)")]
    InvalidMonth(String),
}

/// Identifier of a facility, safe to use as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FacilityId(String);

impl FacilityId {
    /// Parses a facility identifier.
    ///
    /// Only ASCII alphanumerics, `-` and `_` are accepted, so the result can never contain a
    /// separator, a `..` component or control characters.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::InvalidFacilityId`] if the input is empty, longer than
    /// [`MAX_FACILITY_ID_LEN`], or contains any other character.
    pub fn parse(input: &str) -> Result<Self, LocationError> {
        let ok = !input.is_empty()
            && input.len() <= MAX_FACILITY_ID_LEN
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'-' | b'_'));

        if !ok {
            return Err(LocationError::InvalidFacilityId(input.to_owned()));
        }
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A calendar date in `YYYY-MM-DD` form, used to group photos of one cleaning visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisitDate(NaiveDate);

impl VisitDate {
    /// Parses a strict `YYYY-MM-DD` date.
    ///
    /// The shape is checked byte by byte before the calendar check, so inputs such as
    /// `2024-3-5` or `+2024-03-05` are rejected even though chrono would accept them.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::InvalidDate`] on a malformed or impossible date.
    pub fn parse(input: &str) -> Result<Self, LocationError> {
        let err = || LocationError::InvalidDate(input.to_owned());

        if !matches_digit_pattern(input, "dddd-dd-dd") {
            return Err(err());
        }
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| err())
    }

    /// Returns the month this date falls in.
    pub fn month(&self) -> ReceiptMonth {
        ReceiptMonth(self.0.format("%Y-%m").to_string())
    }
}

/// A month in `YYYY-MM` form, used to group receipts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceiptMonth(String);

impl ReceiptMonth {
    /// Parses a strict `YYYY-MM` month.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::InvalidMonth`] if the shape is wrong or the month is not 01-12.
    pub fn parse(input: &str) -> Result<Self, LocationError> {
        let err = || LocationError::InvalidMonth(input.to_owned());

        if !matches_digit_pattern(input, "dddd-dd") {
            return Err(err());
        }
        let month: u32 = input[5..7].parse().map_err(|_| err())?;
        if !(1..=12).contains(&month) {
            return Err(err());
        }
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Checks `input` against a pattern where `d` is any ASCII digit and every other byte must
/// match literally.
fn matches_digit_pattern(input: &str, pattern: &str) -> bool {
    input.len() == pattern.len()
        && input
            .bytes()
            .zip(pattern.bytes())
            .all(|(b, p)| match p {
                b'd' => b.is_ascii_digit(),
                _ => b == p,
            })
}

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for VisitDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl fmt::Display for ReceiptMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FacilityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ReceiptMonth {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for FacilityId {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for VisitDate {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for ReceiptMonth {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Serde support: serialise as the canonical string, validate on the way back in.
macro_rules! string_serde {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                <$ty>::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(FacilityId);
string_serde!(VisitDate);
string_serde!(ReceiptMonth);
