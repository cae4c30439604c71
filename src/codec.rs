//! Common interface to all codecs
//!
//! [`Codec`] wraps a convolutional, turbo or LDPC codec behind the same encode and decode
//! operations, and adds helpers that process several blocks in parallel.
//!
//! # Examples
//!
//! ```
//! use fec::{lte, utils, Codec, CodeKind, DecoderOptions};
//!
//! let codec = Codec::from(lte::turbo(40)?);
//! let info = codec.info();
//! assert_eq!(info.kind, CodeKind::Turbo);
//! assert_eq!((info.input_size, info.output_size), (40, 132));
//! assert_eq!(codec.constituents().count(), 2);
//!
//! let info_bits = utils::random_bits(3 * info.input_size);
//! let code_bits = codec.encode_blocks(&info_bits)?;
//! let decoded = codec.decode_blocks(&utils::saturated_llrs(&code_bits), &DecoderOptions::default())?;
//! let info_bits_hat: Vec<_> = decoded.into_iter().flat_map(|block| block.bits).collect();
//! assert_eq!(info_bits_hat, info_bits);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{check_len, saturate, Bit, Convolutional, DecoderOptions, Error, Ldpc, Turbo};

/// Enumeration of code families
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum CodeKind {
    /// Convolutional code
    Convolutional,
    /// Turbo code
    Turbo,
    /// Low-density parity-check code
    Ldpc,
}

impl std::fmt::Display for CodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeKind::Convolutional => write!(f, "Convolutional"),
            CodeKind::Turbo => write!(f, "Turbo"),
            CodeKind::Ldpc => write!(f, "LDPC"),
        }
    }
}

/// Sizes of a code
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy)]
pub struct Info {
    /// Code family
    pub kind: CodeKind,
    /// Number of message bits per block
    pub input_size: usize,
    /// Number of code bits per block
    pub output_size: usize,
}

impl Info {
    /// Returns the code rate (message bits per code bit).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rate(&self) -> f64 {
        self.input_size as f64 / self.output_size as f64
    }
}

impl std::fmt::Display for Info {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} code, {} message bits, {} code bits",
            self.kind, self.input_size, self.output_size
        )
    }
}

/// Iterator over the sizes of the constituents of a code
///
/// A clone continues from the same position and advances independently of the original. Every
/// call to `constituents` starts a fresh iteration.
#[derive(Clone, Debug)]
pub struct InfoIter<'a> {
    /// Remaining constituents
    constituents: std::slice::Iter<'a, Convolutional>,
}

impl<'a> InfoIter<'a> {
    /// Returns iterator over given constituents.
    pub(crate) fn new(constituents: &'a [Convolutional]) -> Self {
        Self {
            constituents: constituents.iter(),
        }
    }
}

impl Iterator for InfoIter<'_> {
    type Item = Info;

    fn next(&mut self) -> Option<Info> {
        self.constituents.next().map(Convolutional::info)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.constituents.size_hint()
    }
}

impl ExactSizeIterator for InfoIter<'_> {}

/// Result of soft decoding one block
#[derive(Clone, PartialEq, Debug)]
pub struct Decoded {
    /// Decisions on the message bits
    pub bits: Vec<Bit>,
    /// Posterior LLR values of the message bits
    pub llrs: Vec<f64>,
    /// Number of decoder iterations run
    pub iterations: usize,
}

/// Codec of any supported family
#[derive(Clone, Debug)]
pub enum Codec {
    /// Convolutional codec
    Convolutional(Convolutional),
    /// Turbo codec
    Turbo(Turbo),
    /// LDPC codec
    Ldpc(Ldpc),
}

impl Codec {
    /// Returns the sizes of the code.
    #[must_use]
    pub fn info(&self) -> Info {
        match self {
            Codec::Convolutional(codec) => codec.info(),
            Codec::Turbo(codec) => codec.info(),
            Codec::Ldpc(codec) => codec.info(),
        }
    }

    /// Returns iterator over the sizes of the constituents (empty unless the code is turbo).
    #[must_use]
    pub fn constituents(&self) -> InfoIter<'_> {
        match self {
            Codec::Turbo(codec) => codec.constituents(),
            Codec::Convolutional(_) | Codec::Ldpc(_) => InfoIter::new(&[]),
        }
    }

    /// Returns code bits for one block of message bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `info_bits.len()` is not equal to `self.info().input_size`.
    pub fn encode(&self, info_bits: &[Bit]) -> Result<Vec<Bit>, Error> {
        match self {
            Codec::Convolutional(codec) => codec.encode(info_bits),
            Codec::Turbo(codec) => codec.encode(info_bits),
            Codec::Ldpc(codec) => codec.encode(info_bits),
        }
    }

    /// Returns message bit decisions for one block of code bit LLR values.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` is not equal to `self.info().output_size`.
    pub fn decode(&self, code_bits_llr: &[f64], options: &DecoderOptions) -> Result<Vec<Bit>, Error> {
        Ok(self.soft_decode(code_bits_llr, options)?.bits)
    }

    /// Returns message bit decisions, posterior LLR values and iteration count for one block of
    /// code bit LLR values.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` is not equal to `self.info().output_size`.
    pub fn soft_decode(
        &self,
        code_bits_llr: &[f64],
        options: &DecoderOptions,
    ) -> Result<Decoded, Error> {
        match self {
            Codec::Convolutional(codec) => codec.soft_decode(code_bits_llr, options),
            Codec::Turbo(codec) => codec.soft_decode(code_bits_llr, options),
            Codec::Ldpc(codec) => codec.soft_decode(code_bits_llr, options),
        }
    }

    /// Returns the number of extrinsic LLR values exchanged by [`Codec::app_decode`].
    ///
    /// This is the number of input bits (message and tail) of a convolutional code, `N * K` for
    /// a turbo code, and the number of nonzero entries of the parity-check matrix of an LDPC
    /// code.
    #[must_use]
    pub fn extrinsic_size(&self) -> usize {
        match self {
            Codec::Convolutional(codec) => codec.num_steps() * codec.trellis().input_width(),
            Codec::Turbo(codec) => codec.extrinsic_size(),
            Codec::Ldpc(codec) => codec.extrinsic_size(),
        }
    }

    /// Returns posterior LLR values of the message bits and outgoing extrinsic LLR values for one
    /// block of code bit LLR values and incoming extrinsic LLR values.
    ///
    /// For a convolutional code, the incoming values are priors on the input bits and the
    /// outgoing ones are the posterior minus the prior. For turbo and LDPC codes, they are the
    /// decoder state described in [`Turbo::app_decode`] and [`Ldpc::app_decode`], so that
    /// feeding the outgoing values back in resumes iterative decoding.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` is not equal to `self.info().output_size`, or
    /// if `extrinsic_in.len()` is not equal to `self.extrinsic_size()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::{lte, utils, Codec, DecoderOptions};
    ///
    /// let codec = Codec::from(lte::turbo(40)?);
    /// let info_bits = utils::random_bits(codec.info().input_size);
    /// let code_bits_llr = utils::saturated_llrs(&codec.encode(&info_bits)?);
    /// let extrinsic_in = vec![0.0; codec.extrinsic_size()];
    /// let (llrs, _) = codec.app_decode(&code_bits_llr, &extrinsic_in, &DecoderOptions::default())?;
    /// assert_eq!(utils::hard_decisions(&llrs), info_bits);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn app_decode(
        &self,
        code_bits_llr: &[f64],
        extrinsic_in: &[f64],
        options: &DecoderOptions,
    ) -> Result<(Vec<f64>, Vec<f64>), Error> {
        match self {
            Codec::Convolutional(codec) => {
                check_len("extrinsic LLR values", self.extrinsic_size(), extrinsic_in.len())?;
                let mut llrs = codec.app_decode(code_bits_llr, extrinsic_in, options.log_sum())?;
                let extrinsic_out = llrs
                    .iter()
                    .zip(extrinsic_in)
                    .map(|(post, &prior)| post - saturate(prior))
                    .collect();
                llrs.truncate(codec.input_size());
                Ok((llrs, extrinsic_out))
            }
            Codec::Turbo(codec) => codec.app_decode(code_bits_llr, extrinsic_in, options),
            Codec::Ldpc(codec) => codec.app_decode(code_bits_llr, extrinsic_in, options),
        }
    }

    /// Returns code bits for consecutive blocks of message bits, encoded in parallel.
    ///
    /// # Errors
    ///
    /// Returns an error if `info_bits.len()` is not a multiple of `self.info().input_size`.
    pub fn encode_blocks(&self, info_bits: &[Bit]) -> Result<Vec<Bit>, Error> {
        let block_size = self.info().input_size;
        check_whole_blocks("information bits", block_size, info_bits.len())?;
        Ok(info_bits
            .par_chunks(block_size)
            .map(|block| self.encode(block))
            .collect::<Result<Vec<_>, Error>>()?
            .concat())
    }

    /// Returns decoding results for consecutive blocks of code bit LLR values, decoded in
    /// parallel.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` is not a multiple of `self.info().output_size`.
    pub fn decode_blocks(
        &self,
        code_bits_llr: &[f64],
        options: &DecoderOptions,
    ) -> Result<Vec<Decoded>, Error> {
        let block_size = self.info().output_size;
        check_whole_blocks("code bit LLR values", block_size, code_bits_llr.len())?;
        code_bits_llr
            .par_chunks(block_size)
            .map(|block| self.soft_decode(block, options))
            .collect()
    }
}

impl From<Convolutional> for Codec {
    fn from(codec: Convolutional) -> Self {
        Codec::Convolutional(codec)
    }
}

impl From<Turbo> for Codec {
    fn from(codec: Turbo) -> Self {
        Codec::Turbo(codec)
    }
}

impl From<Ldpc> for Codec {
    fn from(codec: Ldpc) -> Self {
        Codec::Ldpc(codec)
    }
}

/// Checks that a sequence splits into whole blocks.
fn check_whole_blocks(what: &'static str, block_size: usize, found: usize) -> Result<(), Error> {
    if found % block_size == 0 {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            what,
            expected: found.next_multiple_of(block_size),
            found,
        })
    }
}
