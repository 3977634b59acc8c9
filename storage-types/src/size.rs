// SPDX-License-Identifier: GPL-3.0-only

//! Human-readable size strings
//!
//! Sizes in install configurations are written as `<digits><unit>` where the
//! unit is one of `K`, `M` or `G` (binary multiples, case-sensitive). The same
//! string is handed verbatim to `sgdisk` and `lvcreate`, so nothing larger than
//! gibibytes and no fractional values are accepted.

use thiserror::Error;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeError {
    #[error("invalid size format: {0:?}")]
    InvalidFormat(String),
    #[error("size out of range: {0:?}")]
    Overflow(String),
}

/// Parse a size string such as `512M` or `20G` into a byte count.
pub fn parse_size(text: &str) -> Result<u64, SizeError> {
    let invalid = || SizeError::InvalidFormat(text.to_string());

    let unit = text.chars().last().ok_or_else(invalid)?;
    let multiplier = match unit {
        'G' => GIB,
        'M' => MIB,
        'K' => KIB,
        _ => return Err(invalid()),
    };

    let digits = &text[..text.len() - 1];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let value: u64 = digits
        .parse()
        .map_err(|_| SizeError::Overflow(text.to_string()))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| SizeError::Overflow(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_size("0K"), Ok(0));
        assert_eq!(parse_size("1K"), Ok(1024));
        assert_eq!(parse_size("512M"), Ok(512 * 1024 * 1024));
        assert_eq!(parse_size("4G"), Ok(4 * 1024 * 1024 * 1024));
    }

    #[test]
    fn rejects_malformed_sizes() {
        for text in ["", "G", "10X", "G10", "10", "1.5G", "10g", " 10G", "10G ", "-1G", "+1G"] {
            assert_eq!(
                parse_size(text),
                Err(SizeError::InvalidFormat(text.to_string())),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_values_that_overflow() {
        assert!(matches!(
            parse_size("99999999999999999999G"),
            Err(SizeError::Overflow(_))
        ));
        assert!(matches!(
            parse_size("18446744073709551615K"),
            Err(SizeError::Overflow(_))
        ));
    }
}
