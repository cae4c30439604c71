//! Log-domain combination strategies
//!
//! A [`LogSum`] strategy approximates `ln(exp(x) + exp(y))` (the "max-star" operation used in
//! the BCJR recursions) and the related box-plus operation `2 * atanh(tanh(x/2) * tanh(y/2))`
//! (used at the check nodes of an LDPC decoder). Both are written as an exact part plus a
//! correction term, and the strategies differ only in how the correction term is computed.

use serde::{Deserialize, Serialize};

/// Threshold of the Linear-Log-MAP correction term (Valenti & Sun, 2001)
const LINEAR_THRESH: f64 = 2.506_816_400_220_01;

/// Slope of the Linear-Log-MAP correction term (Valenti & Sun, 2001)
const LINEAR_SLOPE: f64 = -0.249_041_818_917_1;

/// Bin width of the correction lookup table
const TABLE_STEP: f64 = 0.5;

/// Correction term `ln(1 + exp(-d))` sampled at the center of each bin of width `TABLE_STEP`
const TABLE: [f64; 8] = [
    0.575_939_419_878_843_6,
    0.386_871_006_114_899_94,
    0.251_929_081_345_372_9,
    0.160_224_150_438_087_24,
    0.100_206_558_916_747_21,
    0.061_967_589_003_198_625,
    0.038_041_371_687_783_126,
    0.023_245_464_372_425_029,
];

/// Enumeration of log-domain combination strategies
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum LogSum {
    /// Exact correction term `ln(1 + exp(-|x - y|))` (Log-MAP, sum-product)
    Exact,
    /// No correction term (Max-Log-MAP, min-sum)
    MaxOnly,
    /// Piecewise-linear correction term (Linear-Log-MAP, Valenti & Sun, 2001)
    Linear,
    /// Correction term read from a fixed 8-entry table and clipped to zero beyond it
    #[serde(alias = "Box")]
    LookupTable,
    /// Min-sum check nodes, `sign(x) * sign(y) * min(|x|, |y|)`
    MinBox,
    /// Min-sum check nodes with the magnitude reduced by a nonnegative offset
    OffsetMinBox(f64),
}

impl LogSum {
    /// Returns the name of the variant.
    fn name(&self) -> &str {
        match self {
            LogSum::Exact => "Exact",
            LogSum::MaxOnly => "Max-only",
            LogSum::Linear => "Linear",
            LogSum::LookupTable => "Lookup-table",
            LogSum::MinBox => "Min-box",
            LogSum::OffsetMinBox(_) => "Offset-min-box",
        }
    }

    /// Returns an approximation of `ln(exp(x) + exp(y))`.
    ///
    /// The min-box variants have no log-sum correction of their own, and reduce to `max(x, y)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::LogSum;
    ///
    /// assert_eq!(LogSum::MaxOnly.combine(1.2, 1.3), 1.3);
    /// assert!((LogSum::Exact.combine(0.0, 0.0) - 2f64.ln()).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn combine(self, x: f64, y: f64) -> f64 {
        x.max(y) + self.correction((x - y).abs())
    }

    /// Returns an approximation of `2 * atanh(tanh(x/2) * tanh(y/2))`.
    ///
    /// The result never has a sign opposite to `sign(x) * sign(y)`.
    #[must_use]
    pub fn boxplus(self, x: f64, y: f64) -> f64 {
        let sign = if (x < 0.0) ^ (y < 0.0) { -1.0 } else { 1.0 };
        let min_abs = x.abs().min(y.abs());
        let magnitude = match self {
            LogSum::MinBox => min_abs,
            LogSum::OffsetMinBox(offset) => (min_abs - offset).max(0.0),
            _ => {
                let value = sign * min_abs + self.correction((x + y).abs())
                    - self.correction((x - y).abs());
                (sign * value).max(0.0)
            }
        };
        sign * magnitude
    }

    /// Returns the combination of all given values, with `-inf` for an empty slice.
    ///
    /// Recursive strategies are applied as a pairwise tree reduction; all others are applied
    /// strictly from left to right.
    #[must_use]
    pub fn fold(self, values: &[f64]) -> f64 {
        if !self.is_recursive() {
            return values
                .iter()
                .fold(f64::NEG_INFINITY, |acc, &x| self.combine(acc, x));
        }
        let mut level = values.to_vec();
        while level.len() > 1 {
            level = level
                .chunks(2)
                .filter_map(|pair| pair.iter().copied().reduce(|x, y| self.combine(x, y)))
                .collect();
        }
        level.first().copied().unwrap_or(f64::NEG_INFINITY)
    }

    /// Returns `true` if the strategy is associative, so that more than two values may be
    /// combined pairwise in any order.
    #[must_use]
    pub fn is_recursive(self) -> bool {
        match self {
            LogSum::Exact | LogSum::MaxOnly | LogSum::MinBox => true,
            LogSum::Linear | LogSum::LookupTable | LogSum::OffsetMinBox(_) => false,
        }
    }

    /// Returns an upper bound on `|self.combine(x, y) - LogSum::Exact.combine(x, y)|`.
    #[must_use]
    pub fn max_error(self) -> f64 {
        match self {
            LogSum::Exact => 0.0,
            LogSum::Linear => 0.08,
            LogSum::LookupTable => 0.12,
            LogSum::MaxOnly | LogSum::MinBox | LogSum::OffsetMinBox(_) => std::f64::consts::LN_2,
        }
    }

    /// Returns the correction term for the given absolute difference.
    fn correction(self, abs_diff: f64) -> f64 {
        // Infinite or undefined differences (e.g., two infinite metrics) need no correction.
        if !abs_diff.is_finite() {
            return 0.0;
        }
        match self {
            LogSum::Exact => (-abs_diff).exp().ln_1p(),
            LogSum::Linear => linear_correction_term(abs_diff),
            LogSum::LookupTable => table_correction_term(abs_diff),
            LogSum::MaxOnly | LogSum::MinBox | LogSum::OffsetMinBox(_) => 0.0,
        }
    }
}

impl std::fmt::Display for LogSum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSum::OffsetMinBox(offset) => write!(f, "{} (offset {offset})", self.name()),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Returns the Linear-Log-MAP correction term.
fn linear_correction_term(abs_diff: f64) -> f64 {
    if abs_diff > LINEAR_THRESH {
        0.0
    } else {
        LINEAR_SLOPE * (abs_diff - LINEAR_THRESH)
    }
}

/// Returns the table-based correction term.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn table_correction_term(abs_diff: f64) -> f64 {
    // OK to cast: `abs_diff` is finite and nonnegative, and large values are clipped below.
    let bin = (abs_diff / TABLE_STEP).min(TABLE.len() as f64) as usize;
    TABLE.get(bin).copied().unwrap_or(0.0)
}
