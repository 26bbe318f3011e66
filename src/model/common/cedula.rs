use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The national ID prefixes accepted by the identity gate.
const VALID_PREFIXES: [&str; 2] = ["012", "402"];

/// Expected digit count after stripping separators.
const CEDULA_LENGTH: usize = 11;

/// A validated national identity number (cédula).
///
/// Input may contain hyphens and whitespace as separators; the stored form is
/// the bare 11-digit string.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cedula(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidCedula {
    #[error("Cédula must contain only digits")]
    NonDigit,
    #[error("Cédula must be exactly {CEDULA_LENGTH} digits")]
    WrongLength,
    #[error("Cédula must start with 012 or 402")]
    UnknownPrefix,
}

impl Cedula {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Cedula {
    type Err = InvalidCedula;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect();
        if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
            return Err(InvalidCedula::NonDigit);
        }
        if cleaned.len() != CEDULA_LENGTH {
            return Err(InvalidCedula::WrongLength);
        }
        if !VALID_PREFIXES.iter().any(|prefix| cleaned.starts_with(prefix)) {
            return Err(InvalidCedula::UnknownPrefix);
        }
        Ok(Self(cleaned))
    }
}

impl TryFrom<String> for Cedula {
    type Error = InvalidCedula;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Cedula> for String {
    fn from(cedula: Cedula) -> Self {
        cedula.0
    }
}

impl Display for Cedula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_cedulas_with_either_prefix() {
        for valid in ["01234567890", "40298765432"] {
            assert!(valid.parse::<Cedula>().is_ok(), "{valid}");
        }
    }

    #[test]
    fn strips_separators_before_validating() {
        let cedula: Cedula = "012-3456789-0".parse().unwrap();
        assert_eq!(cedula.as_str(), "01234567890");
        let cedula: Cedula = " 402 9876543 2 ".parse().unwrap();
        assert_eq!(cedula.as_str(), "40298765432");
    }

    #[test]
    fn rejects_non_digit_input() {
        for bad in ["", "012345678ab", "cedula", "012_34567890"] {
            assert_eq!(bad.parse::<Cedula>(), Err(InvalidCedula::NonDigit), "{bad}");
        }
    }

    #[test]
    fn rejects_wrong_lengths() {
        for bad in ["0123456789", "012345678901", "012", "4"] {
            assert_eq!(bad.parse::<Cedula>(), Err(InvalidCedula::WrongLength), "{bad}");
        }
    }

    #[test]
    fn rejects_unknown_prefixes() {
        for bad in ["11234567890", "40134567890", "99912345678", "00123456789"] {
            assert_eq!(bad.parse::<Cedula>(), Err(InvalidCedula::UnknownPrefix), "{bad}");
        }
    }
}
