//! This crate implements soft-decision forward error correction for three families of codes:
//! convolutional codes described by a [`Trellis`], turbo codes built from two or more
//! convolutional constituents separated by interleavers, and low-density parity-check (LDPC)
//! codes described by a [`SparseBitMatrix`].
//!
//! Decoders take log-likelihood-ratio (LLR) values, with positive values indicating that `Zero`
//! is more likely, and return bit decisions (optionally with posterior LLR values). Convolutional
//! codes are decoded with the BCJR algorithm, turbo codes by iterating between the BCJR decoders
//! of their constituents, and LDPC codes by belief propagation. The log-domain arithmetic used by
//! all three is selected with a [`LogSum`] strategy in the [`DecoderOptions`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use fec::{convolutional, Bit, Codec, Convolutional, DecoderOptions, Termination, Trellis};
//! use Bit::{One, Zero};
//!
//! let trellis = Arc::new(Trellis::feedforward(3, &[0b111, 0b101])?);
//! let options = convolutional::EncoderOptions::new(trellis, 4, Termination::Tail)?;
//! let codec = Codec::from(Convolutional::new(options)?);
//! let code_bits = codec.encode(&[One, Zero, One, One])?;
//! let code_bits_llr = fec::utils::saturated_llrs(&code_bits);
//! let info_bits_hat = codec.decode(&code_bits_llr, &DecoderOptions::default())?;
//! assert_eq!(info_bits_hat, [One, Zero, One, One]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(
    clippy::complexity,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    unused_import_braces,
    unused_qualifications
)]

use thiserror::Error;

pub mod codec;
pub mod convolutional;
pub mod ldpc;
pub mod logsum;
pub mod lte;
pub mod options;
pub mod permutation;
pub mod puncturing;
pub mod sparse;
pub mod trellis;
pub mod turbo;
pub mod utils;

pub use codec::{Codec, CodeKind, Decoded, Info, InfoIter};
pub use convolutional::Convolutional;
pub use ldpc::Ldpc;
pub use logsum::LogSum;
pub use options::{DecoderOptions, Scheduling};
pub use permutation::Permutation;
pub use puncturing::Puncturing;
pub use sparse::SparseBitMatrix;
pub use trellis::{Termination, Trellis};
pub use turbo::Turbo;

/// Magnitude at which channel and message LLR values are saturated
pub const LLR_LIMIT: f64 = 1e3;

/// Custom error type
#[derive(Error, Debug)]
pub enum Error {
    /// Length of an input disagrees with the size declared by a structural object
    #[error("Wrong number of {what} (expected {expected}, found {found})")]
    DimensionMismatch {
        /// Description of the mismatched input
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        found: usize,
    },
    /// Option value outside its accepted range
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Trellis, matrix or permutation violating its construction invariant
    #[error("Inconsistent structure: {0}")]
    InconsistentStructure(String),
    /// JSON encoding error
    #[error("{0}")]
    Serialization(#[from] serde_json::Error),
}

/// Enumeration of binary symbol values
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy)]
pub enum Bit {
    /// Binary symbol `0`
    Zero = 0,
    /// Binary symbol `1`
    One = 1,
}

impl Bit {
    /// Returns the bit at position `index` of `value`.
    #[must_use]
    pub fn from_bit_of(value: usize, index: usize) -> Self {
        Self::from((value >> index) & 1 == 1)
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value {
            Bit::One
        } else {
            Bit::Zero
        }
    }
}

impl From<Bit> for usize {
    fn from(bit: Bit) -> Self {
        match bit {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }
}

/// Checks that a sequence has the expected length.
pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), Error> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            what,
            expected,
            found,
        })
    }
}

/// Returns LLR value clamped to `[-LLR_LIMIT, LLR_LIMIT]`, with NaN treated as an erasure.
pub(crate) fn saturate(llr: f64) -> f64 {
    if llr.is_nan() {
        0.0
    } else {
        llr.clamp(-LLR_LIMIT, LLR_LIMIT)
    }
}

/// Returns LLR value unchanged if finite, and saturated otherwise.
pub(crate) fn sanitize(llr: f64) -> f64 {
    if llr.is_finite() {
        llr
    } else {
        saturate(llr)
    }
}
