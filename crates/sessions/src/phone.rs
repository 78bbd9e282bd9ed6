//! Phone number normalization for outbound messages.

use wg_domain::config::WhatsAppConfig;

use crate::error::{Result, SessionError};

/// Suffix of an individual-chat wire address.
const CHAT_SUFFIX: &str = "@c.us";

/// Lengths of a local number (area code + subscriber) that get the
/// country code prepended.
const LOCAL_LENGTHS: std::ops::RangeInclusive<usize> = 10..=11;

/// Rules for turning user-entered phone numbers into wire numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonePolicy {
    country_code: String,
    min_digits: usize,
}

impl Default for PhonePolicy {
    fn default() -> Self {
        Self::new("55", 12)
    }
}

impl From<&WhatsAppConfig> for PhonePolicy {
    fn from(cfg: &WhatsAppConfig) -> Self {
        Self::new(&cfg.country_code, cfg.min_phone_digits)
    }
}

impl PhonePolicy {
    pub fn new(country_code: &str, min_digits: usize) -> Self {
        Self {
            country_code: country_code.to_owned(),
            min_digits,
        }
    }

    /// Strip everything but digits and make sure the number carries a
    /// country code.
    ///
    /// Numbers that already start with the country code are kept as-is.
    /// Otherwise a 10/11-digit local number gets the country code prepended
    /// and anything shorter is rejected.  The result must have at least
    /// `min_digits` digits.
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        let normalized = if digits.starts_with(&self.country_code) {
            digits
        } else if LOCAL_LENGTHS.contains(&digits.len()) {
            format!("{}{digits}", self.country_code)
        } else if digits.len() < *LOCAL_LENGTHS.start() {
            return Err(SessionError::InvalidPhoneNumber {
                digits: digits.len(),
                expected: format!(
                    "use the format with country code (e.g. {}11999999999)",
                    self.country_code
                ),
            });
        } else {
            digits
        };

        if normalized.len() < self.min_digits {
            return Err(SessionError::InvalidPhoneNumber {
                digits: normalized.len(),
                expected: format!(
                    "minimum {} digits (country code + area code + number)",
                    self.min_digits
                ),
            });
        }

        Ok(normalized)
    }
}

/// Wire address for an individual chat.
pub fn wire_address(normalized: &str) -> String {
    format!("{normalized}{CHAT_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PhonePolicy {
        PhonePolicy::default()
    }

    #[test]
    fn local_mobile_gets_country_code() {
        assert_eq!(policy().normalize("11987654321").unwrap(), "5511987654321");
        assert_eq!(wire_address("5511987654321"), "5511987654321@c.us");
    }

    #[test]
    fn local_landline_gets_country_code() {
        assert_eq!(policy().normalize("1133334444").unwrap(), "551133334444");
    }

    #[test]
    fn formatting_characters_are_stripped() {
        assert_eq!(
            policy().normalize("+55 (11) 98765-4321").unwrap(),
            "5511987654321"
        );
        assert_eq!(policy().normalize("(11) 98765-4321").unwrap(), "5511987654321");
    }

    #[test]
    fn normalized_number_is_unchanged() {
        let once = policy().normalize("5511987654321").unwrap();
        assert_eq!(once, "5511987654321");
        assert_eq!(policy().normalize(&once).unwrap(), once);
    }

    #[test]
    fn too_short_is_rejected_with_digit_count() {
        let err = policy().normalize("123").unwrap_err();
        match err {
            SessionError::InvalidPhoneNumber { digits, .. } => assert_eq!(digits, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn prefixed_but_short_fails_minimum_length() {
        let err = policy().normalize("5511999").unwrap_err();
        match err {
            SessionError::InvalidPhoneNumber { digits, expected } => {
                assert_eq!(digits, 7);
                assert!(expected.contains("12"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn long_foreign_number_passes_through() {
        // 12+ digits without the local prefix already carry a country code.
        assert_eq!(policy().normalize("351912345678").unwrap(), "351912345678");
        // 10/11 digits are always read as local numbers.
        assert_eq!(policy().normalize("14155550123").unwrap(), "5514155550123");
    }

    #[test]
    fn custom_country_code() {
        let pt = PhonePolicy::new("351", 12);
        assert_eq!(pt.normalize("9123456789").unwrap(), "3519123456789");
    }
}
