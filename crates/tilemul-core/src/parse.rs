//! Numeric grammar for command-line values.
//!
//! A size is a run of decimal digits with an optional multiplicative suffix:
//! `K`/`M`/`G` scale by powers of 1000, `Ki`/`Mi`/`Gi` by powers of 1024.
//! The suffix letter is case-insensitive; the binary marker `i` is not.
//! A size list is a fixed number of sizes separated by single punctuation
//! characters (`1000,2000,500`, `0:1`, ...). Errors carry the byte offset of
//! the offending character so callers can point at it.

use thiserror::Error;

/// Errors from size and size-list parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A digit was required at `position`.
    #[error("expected a digit at byte {position}")]
    ExpectedDigit { position: usize },

    /// The value starting at `position` does not fit in a machine word.
    #[error("value at byte {position} does not fit in a machine word")]
    Overflow { position: usize },

    /// A punctuation separator was required at `position`.
    #[error("expected a punctuation separator at byte {position}")]
    ExpectedSeparator { position: usize },

    /// Input continued past the end of the grammar.
    #[error("unexpected trailing input at byte {position}")]
    TrailingInput { position: usize },
}

impl ParseError {
    /// Byte offset of the offending character.
    #[must_use]
    pub const fn position(&self) -> usize {
        match self {
            Self::ExpectedDigit { position }
            | Self::Overflow { position }
            | Self::ExpectedSeparator { position }
            | Self::TrailingInput { position } => *position,
        }
    }
}

// ── Suffixes ─────────────────────────────────────────────────────────────────

/// Multiplier for a suffix starting at `bytes[pos]`, plus the bytes it
/// consumed. `K`/`M`/`G` pick the exponent; a following lowercase `i`
/// switches the factor from 1000 to 1024.
fn parse_suffix(bytes: &[u8], pos: usize) -> Option<(usize, usize)> {
    let exponent = match bytes.get(pos)?.to_ascii_uppercase() {
        b'K' => 1u32,
        b'M' => 2,
        b'G' => 3,
        _ => return None,
    };
    let (factor, consumed) = if bytes.get(pos + 1) == Some(&b'i') {
        (1024usize, 2)
    } else {
        (1000usize, 1)
    };
    Some((factor.pow(exponent), consumed))
}

// ── Sizes ────────────────────────────────────────────────────────────────────

/// Parse one size starting at `pos`; returns the value and the position just
/// past its digits and suffix.
fn parse_size_at(bytes: &[u8], pos: usize) -> Result<(usize, usize), ParseError> {
    let mut cursor = pos;
    let mut value: usize = 0;
    while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
        let digit = usize::from(bytes[cursor] - b'0');
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit))
            .ok_or(ParseError::Overflow { position: pos })?;
        cursor += 1;
    }
    if cursor == pos {
        return Err(ParseError::ExpectedDigit { position: pos });
    }
    if let Some((multiplier, consumed)) = parse_suffix(bytes, cursor) {
        value = value
            .checked_mul(multiplier)
            .ok_or(ParseError::Overflow { position: pos })?;
        cursor += consumed;
    }
    Ok((value, cursor))
}

/// Parse the whole input as a single size.
pub fn parse_size(input: &str) -> Result<usize, ParseError> {
    let bytes = input.as_bytes();
    let (value, end) = parse_size_at(bytes, 0)?;
    if end != bytes.len() {
        return Err(ParseError::TrailingInput { position: end });
    }
    Ok(value)
}

/// Parse the whole input as exactly `N` sizes, each pair separated by one
/// punctuation character.
pub fn parse_size_list<const N: usize>(input: &str) -> Result<[usize; N], ParseError> {
    let bytes = input.as_bytes();
    let mut values = [0usize; N];
    let mut cursor = 0;
    for (i, slot) in values.iter_mut().enumerate() {
        if i > 0 {
            match bytes.get(cursor) {
                Some(b) if b.is_ascii_punctuation() => cursor += 1,
                _ => return Err(ParseError::ExpectedSeparator { position: cursor }),
            }
        }
        let (value, next) = parse_size_at(bytes, cursor)?;
        *slot = value;
        cursor = next;
    }
    if cursor != bytes.len() {
        return Err(ParseError::TrailingInput { position: cursor });
    }
    Ok(values)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Plain decimal renderings parse back to the same value.
        #[test]
        fn decimal_round_trip(value in 0usize..=u32::MAX as usize) {
            prop_assert_eq!(parse_size(&value.to_string()), Ok(value));
        }
    }

    proptest! {
        /// A decimal suffix multiplies by the stated factor.
        #[test]
        fn decimal_suffix_scales(value in 0usize..1_000_000) {
            prop_assert_eq!(parse_size(&format!("{value}K")), Ok(value * 1000));
            prop_assert_eq!(parse_size(&format!("{value}Ki")), Ok(value * 1024));
        }
    }

    proptest! {
        /// Every ASCII punctuation character separates a pair.
        #[test]
        fn any_separator_works(a in 0usize..10_000, b in 0usize..10_000) {
            for sep in "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~".chars() {
                prop_assert_eq!(
                    parse_size_list::<2>(&format!("{a}{sep}{b}")),
                    Ok([a, b])
                );
            }
        }
    }

    proptest! {
        /// Inputs that do not start with a digit fail at byte zero.
        #[test]
        fn leading_non_digit_fails(s in "[a-zA-Z:;,.#-][0-9a-zA-Z]{0,8}") {
            let err = parse_size(&s).unwrap_err();
            prop_assert_eq!(err.position(), 0);
        }
    }
}
