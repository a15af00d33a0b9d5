//! Dimension planning: block padding and padding-waste accounting.
//!
//! Matrices A(M×N)·B(N×P)=C(M×P) are padded so every dimension becomes a
//! multiple of the block size. The planner derives all three paddings at
//! once; a [`DimensionSpec`] is immutable afterwards and is recomputed
//! wholesale when an input changes.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::parse::{self, ParseError};

// ── Precision ────────────────────────────────────────────────────────────────

/// Floating-point width of the matrix elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrecisionMode {
    /// 32-bit elements.
    Single,
    /// 64-bit elements.
    Double,
}

impl PrecisionMode {
    /// Element width in bytes.
    #[must_use]
    pub const fn element_width(self) -> usize {
        match self {
            Self::Single => 4,
            Self::Double => 8,
        }
    }
}

impl fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "fp32"),
            Self::Double => write!(f, "fp64"),
        }
    }
}

// ── Sizes ────────────────────────────────────────────────────────────────────

/// Logical matrix sizes M, N, P for A(M×N)·B(N×P)=C(M×P).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeTriple {
    pub m: usize,
    pub n: usize,
    pub p: usize,
}

impl SizeTriple {
    #[must_use]
    pub const fn new(m: usize, n: usize, p: usize) -> Self {
        Self { m, n, p }
    }
}

impl FromStr for SizeTriple {
    type Err = ParseError;

    /// Parses `M,N,P` (any single punctuation separator, suffixes allowed).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [m, n, p] = parse::parse_size_list::<3>(s)?;
        Ok(Self { m, n, p })
    }
}

impl fmt::Display for SizeTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.m, self.n, self.p)
    }
}

// ── Planning ─────────────────────────────────────────────────────────────────

/// Rows or columns to add so `x` becomes a multiple of `block_size`; zero
/// when it already is one.
///
/// # Panics
///
/// Panics if `block_size` is zero. [`DimensionSpec::plan`] validates the
/// block size before calling this.
#[must_use]
pub fn padding(x: usize, block_size: usize) -> usize {
    (block_size - x % block_size) % block_size
}

/// Errors from dimension planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Block sizes must be even and non-zero.
    #[error("block size must be even and non-zero, got {0}")]
    InvalidBlockSize(usize),

    /// A padded matrix would not be addressable.
    #[error("padded matrix of {rows}x{cols} exceeds the addressable size")]
    DimensionOverflow { rows: usize, cols: usize },

    /// The combined padding waste would not be countable in bytes.
    #[error("padding waste at block size {block_size} exceeds the countable range")]
    WasteOverflow { block_size: usize },
}

/// Logical sizes plus the paddings that make each one a multiple of the
/// block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionSpec {
    m: usize,
    n: usize,
    p: usize,
    block_size: usize,
    padding_m: usize,
    padding_n: usize,
    padding_p: usize,
}

impl DimensionSpec {
    /// Derive the paddings for `sizes` at `block_size`.
    ///
    /// Rejects odd or zero block sizes, plans whose padded extents or
    /// areas would overflow `usize` arithmetic, and plans whose combined
    /// padding waste could not be counted in bytes at the widest element
    /// width.
    pub fn plan(sizes: SizeTriple, block_size: usize) -> Result<Self, PlanError> {
        if block_size == 0 || block_size % 2 != 0 {
            return Err(PlanError::InvalidBlockSize(block_size));
        }
        let spec = Self {
            m: sizes.m,
            n: sizes.n,
            p: sizes.p,
            block_size,
            padding_m: padding(sizes.m, block_size),
            padding_n: padding(sizes.n, block_size),
            padding_p: padding(sizes.p, block_size),
        };
        validate_area(spec.m, spec.padding_m, spec.n, spec.padding_n)?; // A
        validate_area(spec.n, spec.padding_n, spec.p, spec.padding_p)?; // B
        validate_area(spec.m, spec.padding_m, spec.p, spec.padding_p)?; // C
        validate_waste(&spec)?;
        Ok(spec)
    }

    #[must_use]
    pub const fn m(&self) -> usize {
        self.m
    }

    #[must_use]
    pub const fn n(&self) -> usize {
        self.n
    }

    #[must_use]
    pub const fn p(&self) -> usize {
        self.p
    }

    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    #[must_use]
    pub const fn padding_m(&self) -> usize {
        self.padding_m
    }

    #[must_use]
    pub const fn padding_n(&self) -> usize {
        self.padding_n
    }

    #[must_use]
    pub const fn padding_p(&self) -> usize {
        self.padding_p
    }

    #[must_use]
    pub const fn padded_m(&self) -> usize {
        self.m + self.padding_m
    }

    #[must_use]
    pub const fn padded_n(&self) -> usize {
        self.n + self.padding_n
    }

    #[must_use]
    pub const fn padded_p(&self) -> usize {
        self.p + self.padding_p
    }

    /// Extra elements the paddings introduce, summed over A, B and C.
    ///
    /// Cannot overflow for a planned spec: [`DimensionSpec::plan`] bounds
    /// the tally at the widest element width.
    #[must_use]
    pub fn padding_waste_elements(&self) -> u64 {
        let extra = |rows: usize, row_pad: usize, cols: usize, col_pad: usize| {
            (rows + row_pad) as u64 * (cols + col_pad) as u64 - rows as u64 * cols as u64
        };
        extra(self.m, self.padding_m, self.n, self.padding_n)
            + extra(self.n, self.padding_n, self.p, self.padding_p)
            + extra(self.m, self.padding_m, self.p, self.padding_p)
    }

    /// Padding waste in bytes at the given element width.
    #[must_use]
    pub fn padding_waste_bytes(&self, mode: PrecisionMode) -> u64 {
        self.padding_waste_elements() * mode.element_width() as u64
    }
}

/// Padded extents and the padded area must stay addressable.
fn validate_area(
    rows: usize,
    row_pad: usize,
    cols: usize,
    col_pad: usize,
) -> Result<(), PlanError> {
    rows.checked_add(row_pad)
        .zip(cols.checked_add(col_pad))
        .and_then(|(r, c)| r.checked_mul(c))
        .map(|_| ())
        .ok_or(PlanError::DimensionOverflow { rows, cols })
}

/// The combined padding waste must be countable in bytes even at the
/// widest element width. Requires the padded areas to already be
/// validated against `usize`, which keeps the `u128` tally exact.
fn validate_waste(spec: &DimensionSpec) -> Result<(), PlanError> {
    let extra = |rows: usize, row_pad: usize, cols: usize, col_pad: usize| {
        (rows as u128 + row_pad as u128) * (cols as u128 + col_pad as u128)
            - rows as u128 * cols as u128
    };
    let elements = extra(spec.m, spec.padding_m, spec.n, spec.padding_n)
        + extra(spec.n, spec.padding_n, spec.p, spec.padding_p)
        + extra(spec.m, spec.padding_m, spec.p, spec.padding_p);
    let widest = PrecisionMode::Double.element_width() as u128;
    if elements * widest > u128::from(u64::MAX) {
        return Err(PlanError::WasteOverflow { block_size: spec.block_size });
    }
    Ok(())
}
