//! Device-selection descriptor grammar.
//!
//! A selector token is either a case-insensitive prefix of one of the class
//! keywords `GPU`, `CPU`, `Default`, or a `<platform>:<device>` index pair
//! (single punctuation separator, sizes with the usual suffixes). Anything
//! else is an unrecognized option, deliberately distinct from a device that
//! fails to resolve later.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::parse;

// ── Device classes ───────────────────────────────────────────────────────────

/// Broad device categories a selector can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Gpu,
    Cpu,
    Accelerator,
    Default,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu => write!(f, "GPU"),
            Self::Cpu => write!(f, "CPU"),
            Self::Accelerator => write!(f, "Accelerator"),
            Self::Default => write!(f, "Default"),
        }
    }
}

/// Keywords reachable from the grammar, in match order. `Accelerator` is
/// selectable through [`Selection::ByClass`] but has no keyword.
const CLASS_KEYWORDS: [(&str, DeviceClass); 3] = [
    ("GPU", DeviceClass::Gpu),
    ("CPU", DeviceClass::Cpu),
    ("Default", DeviceClass::Default),
];

// ── Selection ────────────────────────────────────────────────────────────────

/// A parsed device selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// First device of the class on the first platform that has one.
    ByClass(DeviceClass),
    /// Explicit platform and device indices.
    ByIndices { platform: usize, device: usize },
}

/// Errors from selector parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The token is neither a class-keyword prefix nor an index pair.
    #[error(
        "unrecognized device selector {token:?}: expected a prefix of \
         GPU, CPU or Default, or <platform>:<device>"
    )]
    UnrecognizedOption { token: String },
}

/// True when `token` is a case-insensitive prefix of `keyword`.
///
/// A token longer than the keyword never matches; the empty token matches
/// everything.
fn is_keyword_prefix(token: &str, keyword: &str) -> bool {
    token.len() <= keyword.len() && token.eq_ignore_ascii_case(&keyword[..token.len()])
}

/// Parse a selector token.
///
/// Keywords are tried in order (`GPU`, `CPU`, `Default`), so the empty token
/// resolves to GPU.
pub fn parse_selection(token: &str) -> Result<Selection, SelectionError> {
    for (keyword, class) in CLASS_KEYWORDS {
        if is_keyword_prefix(token, keyword) {
            return Ok(Selection::ByClass(class));
        }
    }
    match parse::parse_size_list::<2>(token) {
        Ok([platform, device]) => Ok(Selection::ByIndices { platform, device }),
        Err(_) => Err(SelectionError::UnrecognizedOption { token: token.to_owned() }),
    }
}

impl FromStr for Selection {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_selection(s)
    }
}
