//! Brazilian individual tax id (CPF).

use serde::{Deserialize, Serialize};
use thiserror::Error;

const LENGTH: usize = 11;

/// Reasons a string is rejected as a CPF.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxIdError {
    #[error("tax id must have {LENGTH} digits, found {0}")]
    WrongLength(usize),

    #[error("tax id cannot repeat a single digit")]
    RepeatedDigits,

    #[error("tax id check digits do not match")]
    ChecksumMismatch,
}

/// A checksum-validated CPF, stored as its 11 digits without punctuation.
///
/// Parsing accepts formatted input such as `"111.444.777-35"`; every
/// non-digit character is discarded before validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxId(String);

impl TaxId {
    /// Normalizes and validates a CPF.
    pub fn parse(input: &str) -> Result<Self, TaxIdError> {
        let digits: Vec<u32> = input.chars().filter_map(|c| c.to_digit(10)).collect();

        if digits.len() != LENGTH {
            return Err(TaxIdError::WrongLength(digits.len()));
        }
        if digits.iter().all(|d| *d == digits[0]) {
            return Err(TaxIdError::RepeatedDigits);
        }
        if check_digit(&digits[..9]) != digits[9] || check_digit(&digits[..10]) != digits[10] {
            return Err(TaxIdError::ChecksumMismatch);
        }

        Ok(Self(digits.iter().map(|d| char::from_digit(*d, 10).unwrap_or('0')).collect()))
    }

    /// Returns the bare digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Mod-11 check digit over `digits`, weighted from `len + 1` down to 2.
fn check_digit(digits: &[u32]) -> u32 {
    let weight_start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (weight_start - i as u32))
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        r => r,
    }
}

impl std::fmt::Display for TaxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TaxId {
    type Error = TaxIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaxId> for String {
    fn from(id: TaxId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_formatted_and_bare_input() {
        let formatted = TaxId::parse("111.444.777-35").unwrap();
        let bare = TaxId::parse("11144477735").unwrap();
        assert_eq!(formatted, bare);
        assert_eq!(formatted.as_str(), "11144477735");
    }

    #[test]
    fn accepts_another_known_valid_number() {
        assert!(TaxId::parse("529.982.247-25").is_ok());
    }

    #[test]
    fn rejects_bad_check_digits() {
        assert_eq!(
            TaxId::parse("111.444.777-36"),
            Err(TaxIdError::ChecksumMismatch)
        );
        assert_eq!(
            TaxId::parse("529.982.247-52"),
            Err(TaxIdError::ChecksumMismatch)
        );
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(TaxId::parse("1234"), Err(TaxIdError::WrongLength(4)));
        assert_eq!(TaxId::parse(""), Err(TaxIdError::WrongLength(0)));
    }

    #[test]
    fn rejects_repeated_digits() {
        assert_eq!(
            TaxId::parse("000.000.000-00"),
            Err(TaxIdError::RepeatedDigits)
        );
    }

    #[test]
    fn deserialization_validates() {
        let ok: TaxId = serde_json::from_str("\"111.444.777-35\"").unwrap();
        assert_eq!(ok.as_str(), "11144477735");
        assert!(serde_json::from_str::<TaxId>("\"123\"").is_err());
    }
}
