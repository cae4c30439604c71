//! Turbo code: parallel concatenation of two or more convolutional codes
//!
//! Constituent `0` encodes the message in natural order, and constituent `i > 0` encodes it as
//! permuted by interleaver `i - 1`. The codeword is laid out as
//!
//! ```text
//! | message (K) | tail inputs of constituent 0 | ... | tail inputs of constituent N-1 |
//! | parity of constituent 0 (incl. tail) | ... | parity of constituent N-1 (incl. tail) |
//! ```
//!
//! where the tail parts are empty under [`Termination::Truncate`]. Decoding exchanges extrinsic
//! information between the BCJR decoders of the constituents.

use std::sync::Arc;

use itertools::izip;
use tracing::{debug, trace};

use crate::{
    check_len,
    codec::{CodeKind, Decoded, Info, InfoIter},
    convolutional::{self, DecoderWorkspace},
    puncturing::{check_mask_rows, mask_keeps},
    sanitize, saturate, utils, Bit, Convolutional, DecoderOptions, Error, Permutation,
    Puncturing, Scheduling, Termination, Trellis,
};

/// Options for a turbo encoder
#[derive(Clone, Debug)]
pub struct EncoderOptions {
    /// Trellis of every constituent (one shared trellis, or one per constituent)
    trellises: Vec<Arc<Trellis>>,
    /// Interleavers for constituents `1` to `N - 1`
    interleavers: Vec<Arc<Permutation>>,
    /// Termination policy of every constituent
    termination: Termination,
}

impl EncoderOptions {
    /// Returns options for a turbo encoder.
    ///
    /// # Parameters
    ///
    /// - `trellises`: Trellis of the constituents. Either a single trellis shared by all `N`
    ///   constituents, or `N` trellises. Every trellis must have one input bit per step.
    ///
    /// - `interleavers`: Interleavers for constituents `1` to `N - 1`, with `N >= 2`. All must
    ///   have the same length, which is the block length of the code.
    ///
    /// - `termination`: Termination policy of every constituent.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than two constituents, if the number of trellises is
    /// neither `1` nor `N`, if the interleavers differ in length, if a trellis has more than one
    /// input bit per step, or if a trellis lacks the zero-tail needed for [`Termination::Tail`].
    pub fn new(
        trellises: Vec<Arc<Trellis>>,
        interleavers: Vec<Arc<Permutation>>,
        termination: Termination,
    ) -> Result<Self, Error> {
        let Some(first_interleaver) = interleavers.first() else {
            return Err(Error::InvalidConfiguration(
                "Turbo code needs at least two constituents (one interleaver)".to_string(),
            ));
        };
        let num_constituents = interleavers.len() + 1;
        if trellises.len() != 1 && trellises.len() != num_constituents {
            return Err(Error::InvalidConfiguration(format!(
                "Expected 1 or {num_constituents} trellises, found {}",
                trellises.len()
            )));
        }
        for interleaver in &interleavers {
            check_len("interleaver entries", first_interleaver.len(), interleaver.len())?;
        }
        for trellis in &trellises {
            if trellis.input_width() != 1 {
                return Err(Error::InconsistentStructure(format!(
                    "Turbo constituent must have 1 input bit per step (found {})",
                    trellis.input_width()
                )));
            }
            trellis.num_tail_steps(termination)?;
        }
        Ok(Self {
            trellises,
            interleavers,
            termination,
        })
    }

    /// Returns the number of constituents.
    #[must_use]
    pub fn num_constituents(&self) -> usize {
        self.interleavers.len() + 1
    }

    /// Returns the block length (number of message bits).
    #[must_use]
    pub fn block_len(&self) -> usize {
        self.interleavers.first().map_or(0, |interleaver| interleaver.len())
    }

    /// Returns the termination policy.
    #[must_use]
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Returns the trellis of a constituent.
    fn trellis(&self, index: usize) -> &Arc<Trellis> {
        if self.trellises.len() == 1 {
            &self.trellises[0]
        } else {
            &self.trellises[index]
        }
    }
}

/// Order of the transmitted bits of a punctured turbo codeword
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub enum BitOrdering {
    /// Bits of each step sent together (message bit, then parity bits of every constituent)
    #[default]
    Alternate,
    /// Bits sent in codeword order (all message bits, then tails, then parity streams)
    Group,
}

/// Options for puncturing a turbo codeword
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PunctureOptions {
    /// Periodic masks for the message bits and the message-step parity bits of each constituent
    mask: Vec<Vec<bool>>,
    /// Periodic masks for the tail input bits and the tail parity bits of each constituent
    tail_mask: Vec<Vec<bool>>,
    /// Order of the transmitted bits
    bit_ordering: BitOrdering,
}

impl PunctureOptions {
    /// Returns options for puncturing a turbo codeword.
    ///
    /// # Parameters
    ///
    /// - `mask`: Either empty (keep everything), or `N + 1` nonempty periodic masks: one for the
    ///   message bits, then one for the message-step parity bits of each constituent. A bit is
    ///   kept if `row[j % row.len()]`, where `j` is its index within its stream.
    ///
    /// - `tail_mask`: Either empty, or `N + 1` nonempty periodic masks: one for the tail input
    ///   bits, then one for the tail parity bits of each constituent.
    ///
    /// - `bit_ordering`: Order of the transmitted bits.
    #[must_use]
    pub fn new(mask: Vec<Vec<bool>>, tail_mask: Vec<Vec<bool>>, bit_ordering: BitOrdering) -> Self {
        Self {
            mask,
            tail_mask,
            bit_ordering,
        }
    }

    /// Returns the masks for the message steps.
    #[must_use]
    pub fn mask(&self) -> &[Vec<bool>] {
        &self.mask
    }

    /// Returns the masks for the tail steps.
    #[must_use]
    pub fn tail_mask(&self) -> &[Vec<bool>] {
        &self.tail_mask
    }

    /// Returns the order of the transmitted bits.
    #[must_use]
    pub fn bit_ordering(&self) -> BitOrdering {
        self.bit_ordering
    }
}

/// Turbo codec
#[derive(Clone, Debug)]
pub struct Turbo {
    /// Convolutional constituents, each over a block of message bits
    constituents: Vec<Convolutional>,
    /// Interleavers for constituents `1` to `N - 1`
    interleavers: Vec<Arc<Permutation>>,
    /// Number of message bits per block
    block_len: usize,
    /// Termination policy of every constituent
    termination: Termination,
}

impl Turbo {
    /// Returns turbo codec with given options.
    ///
    /// # Errors
    ///
    /// Returns an error if a constituent cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use fec::{turbo, Permutation, Termination, Trellis, Turbo};
    ///
    /// let trellis = Arc::new(Trellis::recursive(0o13, &[0o15])?);
    /// let interleaver = Arc::new(Permutation::new(&[3, 0, 1, 2])?);
    /// let options = turbo::EncoderOptions::new(vec![trellis], vec![interleaver], Termination::Tail)?;
    /// let codec = Turbo::new(options)?;
    /// assert_eq!(codec.input_size(), 4);
    /// assert_eq!(codec.output_size(), 24);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(options: EncoderOptions) -> Result<Self, Error> {
        let block_len = options.block_len();
        let constituents = (0 .. options.num_constituents())
            .map(|index| {
                let constituent_options = convolutional::EncoderOptions::new(
                    Arc::clone(options.trellis(index)),
                    block_len,
                    options.termination,
                )?;
                Convolutional::new(constituent_options)
            })
            .collect::<Result<Vec<_>, Error>>()?;
        debug!(
            "Turbo codec: {} constituents, block length {}",
            constituents.len(),
            block_len
        );
        Ok(Self {
            constituents,
            interleavers: options.interleavers,
            block_len,
            termination: options.termination,
        })
    }

    /// Returns the number of message bits per block.
    #[must_use]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Returns the termination policy.
    #[must_use]
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Returns the number of constituents.
    #[must_use]
    pub fn num_constituents(&self) -> usize {
        self.constituents.len()
    }

    /// Returns the interleavers of constituents `1` to `N - 1`.
    #[must_use]
    pub fn interleavers(&self) -> &[Arc<Permutation>] {
        &self.interleavers
    }

    /// Returns the number of message bits per block.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.block_len
    }

    /// Returns the number of code bits per block.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.block_len
            + self
                .constituents
                .iter()
                .map(|constituent| self.num_tail_bits(constituent) + constituent.output_size())
                .sum::<usize>()
    }

    /// Returns the sizes of the code.
    #[must_use]
    pub fn info(&self) -> Info {
        Info {
            kind: CodeKind::Turbo,
            input_size: self.input_size(),
            output_size: self.output_size(),
        }
    }

    /// Returns iterator over the sizes of the constituents.
    #[must_use]
    pub fn constituents(&self) -> InfoIter<'_> {
        InfoIter::new(&self.constituents)
    }

    /// Returns code bits for given message bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `info_bits.len()` is not equal to `self.input_size()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use fec::{turbo, Bit, Permutation, Termination, Trellis, Turbo};
    /// use Bit::{One, Zero};
    ///
    /// let trellis = Arc::new(Trellis::recursive(0o13, &[0o15])?);
    /// let interleaver = Arc::new(Permutation::new(&[3, 0, 1, 2])?);
    /// let options = turbo::EncoderOptions::new(vec![trellis], vec![interleaver], Termination::Tail)?;
    /// let codec = Turbo::new(options)?;
    /// let code_bits = codec.encode(&[One, Zero, Zero, One])?;
    /// assert_eq!(&code_bits[.. 4], [One, Zero, Zero, One]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode(&self, info_bits: &[Bit]) -> Result<Vec<Bit>, Error> {
        check_len("information bits", self.block_len, info_bits.len())?;
        let mut code_bits = Vec::with_capacity(self.output_size());
        code_bits.extend_from_slice(info_bits);
        let mut all_parity_bits = Vec::with_capacity(self.constituents.len());
        let mut constituent_info_bits = Vec::with_capacity(self.block_len);
        let mut tail_bits = Vec::new();
        for (index, constituent) in self.constituents.iter().enumerate() {
            self.interleave(index, info_bits, &mut constituent_info_bits)?;
            let mut parity_bits = Vec::with_capacity(constituent.output_size());
            convolutional::encode(
                &constituent_info_bits,
                constituent.trellis(),
                self.termination,
                &mut tail_bits,
                &mut parity_bits,
            );
            code_bits.extend_from_slice(&tail_bits);
            all_parity_bits.push(parity_bits);
        }
        code_bits.extend(all_parity_bits.into_iter().flatten());
        Ok(code_bits)
    }

    /// Returns message bit decisions for given code bit LLR values.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` is not equal to `self.output_size()`.
    pub fn decode(&self, code_bits_llr: &[f64], options: &DecoderOptions) -> Result<Vec<Bit>, Error> {
        Ok(self.soft_decode(code_bits_llr, options)?.bits)
    }

    /// Returns message bit decisions and posterior LLR values for given code bit LLR values.
    ///
    /// Every iteration runs the BCJR decoder of each constituent once, either one after the other
    /// with the latest extrinsic information ([`Scheduling::Serial`]), or all on the extrinsic
    /// information of the previous iteration ([`Scheduling::Parallel`]). The prior of a
    /// constituent is the message LLR plus the extrinsic information of all other constituents,
    /// and its extrinsic information is its posterior minus its prior, scaled by the gain in
    /// `options`. Decoding always runs the requested number of iterations.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` is not equal to `self.output_size()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use fec::{turbo, utils, Bit, DecoderOptions, Permutation, Termination, Trellis, Turbo};
    /// use Bit::{One, Zero};
    ///
    /// let trellis = Arc::new(Trellis::recursive(0o13, &[0o15])?);
    /// let interleaver = Arc::new(Permutation::new(&[3, 0, 1, 2])?);
    /// let options = turbo::EncoderOptions::new(vec![trellis], vec![interleaver], Termination::Tail)?;
    /// let codec = Turbo::new(options)?;
    /// let code_bits = codec.encode(&[One, Zero, Zero, One])?;
    /// let decoded = codec.soft_decode(&utils::saturated_llrs(&code_bits), &DecoderOptions::default())?;
    /// assert_eq!(decoded.bits, [One, Zero, Zero, One]);
    /// assert_eq!(decoded.iterations, 8);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn soft_decode(
        &self,
        code_bits_llr: &[f64],
        options: &DecoderOptions,
    ) -> Result<Decoded, Error> {
        let extrinsic = vec![vec![0.0; self.block_len]; self.constituents.len()];
        let (decoded, _) = self.iterate(code_bits_llr, extrinsic, options)?;
        Ok(decoded)
    }

    /// Returns the number of extrinsic LLR values exchanged by [`Turbo::app_decode`] (one per
    /// message bit and constituent).
    #[must_use]
    pub fn extrinsic_size(&self) -> usize {
        self.constituents.len() * self.block_len
    }

    /// Returns posterior LLR values of the message bits and the decoder state reached, starting
    /// from a given decoder state.
    ///
    /// The state is the extrinsic information of every constituent, in message order, laid out
    /// as `| constituent 0 (K) | ... | constituent N-1 (K) |`. Decoding from an all-zero state
    /// is the same as [`Turbo::soft_decode`], and passing the returned state back in resumes
    /// decoding exactly where it stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` is not equal to `self.output_size()`, or if
    /// `extrinsic_in.len()` is not equal to `self.extrinsic_size()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::{lte, utils, DecoderOptions};
    ///
    /// let codec = lte::turbo(40)?;
    /// let info_bits = utils::random_bits(codec.input_size());
    /// let code_bits_llr = utils::saturated_llrs(&codec.encode(&info_bits)?);
    /// let options = DecoderOptions::default();
    /// let (llrs, state) = codec.app_decode(&code_bits_llr, &vec![0.0; 80], &options)?;
    /// assert_eq!(utils::hard_decisions(&llrs), info_bits);
    /// assert_eq!(state.len(), codec.extrinsic_size());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn app_decode(
        &self,
        code_bits_llr: &[f64],
        extrinsic_in: &[f64],
        options: &DecoderOptions,
    ) -> Result<(Vec<f64>, Vec<f64>), Error> {
        check_len("extrinsic LLR values", self.extrinsic_size(), extrinsic_in.len())?;
        let extrinsic = extrinsic_in
            .chunks(self.block_len)
            .map(|chunk| chunk.iter().map(|&x| sanitize(x)).collect())
            .collect();
        let (decoded, extrinsic) = self.iterate(code_bits_llr, extrinsic, options)?;
        Ok((decoded.llrs, extrinsic.concat()))
    }

    /// Returns the puncturing of codewords selected by given masks.
    ///
    /// Message bits are selected by row `0` of `options.mask()`, indexed by message bit, and the
    /// parity bits of the message steps of constituent `i` by row `i + 1`, indexed by bit within
    /// that parity stream. The tail input bits of each constituent are selected by row `0` of
    /// `options.tail_mask()` and its tail parity bits by row `i + 1`, both indexed from the
    /// start of the tail of that constituent. Empty mask sets keep every bit.
    ///
    /// With [`BitOrdering::Group`], transmitted bits keep their codeword order. With
    /// [`BitOrdering::Alternate`], each message bit is followed by the parity bits of every
    /// constituent for the same step, and then each constituent sends its tail steps in the same
    /// fashion.
    ///
    /// # Errors
    ///
    /// Returns an error if a mask set has neither `0` nor `N + 1` rows, if a row is empty, or if
    /// the masks drop every code bit.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::{lte, turbo::{BitOrdering, PunctureOptions}};
    ///
    /// let codec = lte::turbo(40)?;
    /// let mask = vec![vec![true], vec![true, false], vec![false, true]];
    /// let options = PunctureOptions::new(mask, vec![], BitOrdering::Alternate);
    /// let puncturing = codec.puncturing(&options)?;
    /// assert_eq!(puncturing.len(), 92);
    /// assert_eq!(&puncturing.as_slice()[.. 4], [0, 46, 1, 90]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn puncturing(&self, options: &PunctureOptions) -> Result<Puncturing, Error> {
        let num_streams = self.constituents.len() + 1;
        check_mask_rows("puncturing mask", &options.mask, num_streams)?;
        check_mask_rows("tail puncturing mask", &options.tail_mask, num_streams)?;
        let row = |rows: &[Vec<bool>], stream: usize, index: usize| {
            rows.get(stream).map_or(true, |mask| mask_keeps(mask, index))
        };
        let num_tails: usize = self
            .constituents
            .iter()
            .map(|constituent| self.num_tail_bits(constituent))
            .sum();
        let mut tail_offset = self.block_len;
        let mut parity_offset = self.block_len + num_tails;
        // Kept positions of every stream, one entry per step
        let mut message_steps = vec![Vec::new(); self.block_len];
        let mut tail_steps = Vec::with_capacity(self.constituents.len());
        for (k, step) in message_steps.iter_mut().enumerate() {
            if row(options.mask(), 0, k) {
                step.push(k);
            }
        }
        for (i, constituent) in self.constituents.iter().enumerate() {
            let width = constituent.trellis().output_width();
            for (k, step) in message_steps.iter_mut().enumerate() {
                step.extend(
                    (k * width .. (k + 1) * width)
                        .filter(|&j| row(options.mask(), i + 1, j))
                        .map(|j| parity_offset + j),
                );
            }
            let tail_parity_offset = parity_offset + self.block_len * width;
            let constituent_tail_steps: Vec<Vec<usize>> = (0 .. self.num_tail_bits(constituent))
                .map(|t| {
                    let mut step = Vec::with_capacity(1 + width);
                    if row(options.tail_mask(), 0, t) {
                        step.push(tail_offset + t);
                    }
                    step.extend(
                        (t * width .. (t + 1) * width)
                            .filter(|&j| row(options.tail_mask(), i + 1, j))
                            .map(|j| tail_parity_offset + j),
                    );
                    step
                })
                .collect();
            tail_steps.push(constituent_tail_steps);
            tail_offset += self.num_tail_bits(constituent);
            parity_offset += constituent.output_size();
        }
        let mut kept: Vec<usize> = message_steps
            .into_iter()
            .chain(tail_steps.into_iter().flatten())
            .flatten()
            .collect();
        if options.bit_ordering == BitOrdering::Group {
            kept.sort_unstable();
        }
        Puncturing::new(&kept, self.output_size())
    }

    /// Runs iterative decoding from given extrinsic information, and returns the decoding result
    /// along with the final extrinsic information.
    fn iterate(
        &self,
        code_bits_llr: &[f64],
        mut extrinsic: Vec<Vec<f64>>,
        options: &DecoderOptions,
    ) -> Result<(Decoded, Vec<Vec<f64>>), Error> {
        check_len("code bit LLR values", self.output_size(), code_bits_llr.len())?;
        let code_bits_llr: Vec<f64> = code_bits_llr.iter().map(|&x| saturate(x)).collect();
        let (systematic_llr, all_tail_llr, all_parity_llr) = self.split_codeword(&code_bits_llr);
        let mut workspaces: Vec<DecoderWorkspace> = self
            .constituents
            .iter()
            .map(|constituent| {
                DecoderWorkspace::new(constituent.trellis(), constituent.num_steps(), options.log_sum())
            })
            .collect();
        for i_iter in 0 .. options.iterations() {
            match options.scheduling() {
                Scheduling::Serial => {
                    for (index, ws) in workspaces.iter_mut().enumerate() {
                        extrinsic[index] = self.constituent_extrinsic(
                            index,
                            systematic_llr,
                            all_tail_llr[index],
                            all_parity_llr[index],
                            &extrinsic,
                            options.gain(),
                            ws,
                        )?;
                    }
                }
                Scheduling::Parallel => {
                    extrinsic = workspaces
                        .iter_mut()
                        .enumerate()
                        .map(|(index, ws)| {
                            self.constituent_extrinsic(
                                index,
                                systematic_llr,
                                all_tail_llr[index],
                                all_parity_llr[index],
                                &extrinsic,
                                options.gain(),
                                ws,
                            )
                        })
                        .collect::<Result<Vec<_>, Error>>()?;
                }
            }
            trace!(
                "Turbo iteration {} of {}: {} message bit decisions changed sign",
                i_iter + 1,
                options.iterations(),
                sign_changes(systematic_llr, &extrinsic)
            );
        }
        let llrs = posterior(systematic_llr, &extrinsic, usize::MAX);
        let decoded = Decoded {
            bits: utils::hard_decisions(&llrs),
            llrs,
            iterations: options.iterations(),
        };
        Ok((decoded, extrinsic))
    }

    /// Returns deinterleaved extrinsic information from one constituent decoder.
    #[allow(clippy::too_many_arguments)]
    fn constituent_extrinsic(
        &self,
        index: usize,
        systematic_llr: &[f64],
        tail_llr: &[f64],
        parity_llr: &[f64],
        extrinsic: &[Vec<f64>],
        gain: f64,
        ws: &mut DecoderWorkspace,
    ) -> Result<Vec<f64>, Error> {
        let constituent = &self.constituents[index];
        let prior = posterior(systematic_llr, extrinsic, index);
        let mut constituent_prior = Vec::with_capacity(constituent.num_steps());
        self.interleave(index, &prior, &mut constituent_prior)?;
        // Tail bits are seen by this constituent alone
        constituent_prior.extend_from_slice(tail_llr);
        convolutional::decode(
            parity_llr,
            &constituent_prior,
            constituent.trellis(),
            self.termination,
            ws,
        )?;
        let interleaved_extrinsic: Vec<f64> = izip!(&ws.llr_posterior, &constituent_prior)
            .take(self.block_len)
            .map(|(post, prior)| gain * (post - prior))
            .collect();
        let mut new_extrinsic = Vec::with_capacity(self.block_len);
        self.deinterleave(index, &interleaved_extrinsic, &mut new_extrinsic)?;
        Ok(new_extrinsic)
    }

    /// Returns the number of tail input bits of a constituent.
    fn num_tail_bits(&self, constituent: &Convolutional) -> usize {
        constituent.num_steps() - self.block_len
    }

    /// Splits a codeword into its message part, and the tail and parity parts of every
    /// constituent.
    fn split_codeword<'a, T>(&self, code: &'a [T]) -> (&'a [T], Vec<&'a [T]>, Vec<&'a [T]>) {
        let (systematic, mut rest) = code.split_at(self.block_len);
        let mut all_tail = Vec::with_capacity(self.constituents.len());
        for constituent in &self.constituents {
            let (tail, remaining) = rest.split_at(self.num_tail_bits(constituent));
            all_tail.push(tail);
            rest = remaining;
        }
        let mut all_parity = Vec::with_capacity(self.constituents.len());
        for constituent in &self.constituents {
            let (parity, remaining) = rest.split_at(constituent.output_size());
            all_parity.push(parity);
            rest = remaining;
        }
        (systematic, all_tail, all_parity)
    }

    /// Permutes message-order values into the order seen by a constituent.
    fn interleave<T: Copy>(&self, index: usize, input: &[T], output: &mut Vec<T>) -> Result<(), Error> {
        match index.checked_sub(1) {
            None => {
                output.clear();
                output.extend_from_slice(input);
                Ok(())
            }
            Some(i) => self.interleavers[i].interleave(input, output),
        }
    }

    /// Permutes values in the order seen by a constituent back into message order.
    fn deinterleave<T: Copy>(
        &self,
        index: usize,
        output: &[T],
        input: &mut Vec<T>,
    ) -> Result<(), Error> {
        match index.checked_sub(1) {
            None => {
                input.clear();
                input.extend_from_slice(output);
                Ok(())
            }
            Some(i) => self.interleavers[i].deinterleave(output, input),
        }
    }
}

/// Returns message LLR values plus the extrinsic information of every constituent except
/// `excluded`.
fn posterior(systematic_llr: &[f64], extrinsic: &[Vec<f64>], excluded: usize) -> Vec<f64> {
    systematic_llr
        .iter()
        .enumerate()
        .map(|(k, &llr)| {
            llr + extrinsic
                .iter()
                .enumerate()
                .filter(|&(index, _)| index != excluded)
                .map(|(_, ext)| ext[k])
                .sum::<f64>()
        })
        .collect()
}

/// Returns the number of message bits whose decision differs from the channel decision.
fn sign_changes(systematic_llr: &[f64], extrinsic: &[Vec<f64>]) -> usize {
    let llrs = posterior(systematic_llr, extrinsic, usize::MAX);
    utils::error_count(
        &utils::hard_decisions(&llrs),
        &utils::hard_decisions(systematic_llr),
    )
}

#[cfg(test)]
mod tests_of_turbo {
    use float_eq::assert_float_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::LogSum;
    use Bit::{One, Zero};

    const ALL_LOG_SUMS: [LogSum; 4] = [
        LogSum::Exact,
        LogSum::MaxOnly,
        LogSum::Linear,
        LogSum::LookupTable,
    ];

    fn small_codec(termination: Termination) -> Turbo {
        let trellis = Arc::new(Trellis::recursive(0o13, &[0o15]).unwrap());
        let interleaver = Arc::new(Permutation::new(&[3, 0, 1, 2]).unwrap());
        let options = EncoderOptions::new(vec![trellis], vec![interleaver], termination).unwrap();
        Turbo::new(options).unwrap()
    }

    #[test]
    fn test_encoder_options() {
        let trellis = Arc::new(Trellis::recursive(0o13, &[0o15]).unwrap());
        let interleaver = Arc::new(Permutation::new(&[3, 0, 1, 2]).unwrap());
        // Too few constituents
        assert!(matches!(
            EncoderOptions::new(vec![Arc::clone(&trellis)], vec![], Termination::Tail),
            Err(Error::InvalidConfiguration(_))
        ));
        // Wrong number of trellises
        assert!(matches!(
            EncoderOptions::new(
                vec![Arc::clone(&trellis); 3],
                vec![Arc::clone(&interleaver)],
                Termination::Tail
            ),
            Err(Error::InvalidConfiguration(_))
        ));
        // Interleavers of different lengths
        assert!(matches!(
            EncoderOptions::new(
                vec![Arc::clone(&trellis)],
                vec![
                    Arc::clone(&interleaver),
                    Arc::new(Permutation::identity(5).unwrap())
                ],
                Termination::Tail
            ),
            Err(Error::DimensionMismatch {
                expected: 4,
                found: 5,
                ..
            })
        ));
        // Trellis with two input bits per step
        let wide = Arc::new(Trellis::new(2, 2, &[0, 0, 0, 0], &[0, 1, 2, 3]).unwrap());
        assert!(matches!(
            EncoderOptions::new(vec![wide], vec![Arc::clone(&interleaver)], Termination::Tail),
            Err(Error::InconsistentStructure(_))
        ));
        // Valid input
        let options = EncoderOptions::new(
            vec![Arc::clone(&trellis), trellis],
            vec![interleaver],
            Termination::Truncate,
        )
        .unwrap();
        assert_eq!(options.num_constituents(), 2);
        assert_eq!(options.block_len(), 4);
        assert_eq!(options.termination(), Termination::Truncate);
    }

    #[test]
    fn test_sizes() {
        let codec = small_codec(Termination::Tail);
        assert_eq!(codec.block_len(), 4);
        assert_eq!(codec.num_constituents(), 2);
        assert_eq!(codec.output_size(), 24);
        let info = codec.info();
        assert_eq!(info.kind, CodeKind::Turbo);
        assert_eq!((info.input_size, info.output_size), (4, 24));
        let constituents: Vec<Info> = codec.constituents().collect();
        assert_eq!(constituents.len(), 2);
        for constituent in constituents {
            assert_eq!(constituent.kind, CodeKind::Convolutional);
            assert_eq!((constituent.input_size, constituent.output_size), (4, 7));
        }
        let codec = small_codec(Termination::Truncate);
        assert_eq!(codec.output_size(), 12);
    }

    #[test]
    fn test_encode() {
        let codec = small_codec(Termination::Tail);
        // Invalid input
        assert!(matches!(
            codec.encode(&[Zero, One, One]),
            Err(Error::DimensionMismatch { .. })
        ));
        // Valid input
        let code_bits = codec.encode(&[One, Zero, Zero, One]).unwrap();
        assert_eq!(
            code_bits,
            [
                One, Zero, Zero, One, // message
                One, One, Zero, // tail inputs of constituent 0
                Zero, One, Zero, // tail inputs of constituent 1
                One, One, One, Zero, Zero, One, Zero, // parity of constituent 0
                One, Zero, Zero, Zero, One, One, Zero, // parity of constituent 1
            ]
        );
        let (systematic, all_tail, all_parity) = codec.split_codeword(&code_bits);
        assert_eq!(systematic, [One, Zero, Zero, One]);
        assert_eq!(all_tail, [[One, One, Zero], [Zero, One, Zero]]);
        assert_eq!(all_parity[1], [One, Zero, Zero, Zero, One, One, Zero]);
    }

    #[test]
    fn test_decode() {
        let codec = small_codec(Termination::Tail);
        // Invalid input
        assert!(matches!(
            codec.decode(&[10.0, -10.0, -10.0], &DecoderOptions::default()),
            Err(Error::DimensionMismatch {
                expected: 24,
                found: 3,
                ..
            })
        ));
        // Valid input
        let code_bits = codec.encode(&[One, Zero, Zero, One]).unwrap();
        let code_bits_llr: Vec<f64> = code_bits
            .iter()
            .map(|&bit| if bit == Zero { 1.0 } else { -1.0 })
            .collect();
        for log_sum in ALL_LOG_SUMS {
            for scheduling in [Scheduling::Serial, Scheduling::Parallel] {
                let options = DecoderOptions::new(8, log_sum, scheduling, false, 1.0).unwrap();
                let decoded = codec.soft_decode(&code_bits_llr, &options).unwrap();
                assert_eq!(decoded.bits, [One, Zero, Zero, One]);
                assert_eq!(decoded.llrs.len(), 4);
                assert_eq!(decoded.iterations, 8);
            }
        }
    }

    #[test]
    fn test_round_trip() {
        let mut rng = StdRng::seed_from_u64(11);
        let block_len = 120;
        let trellises = vec![
            Arc::new(Trellis::recursive(0o13, &[0o15]).unwrap()),
            Arc::new(Trellis::recursive(0o7, &[0o5]).unwrap()),
            Arc::new(Trellis::recursive(0o13, &[0o15, 0o17]).unwrap()),
        ];
        let interleavers = vec![
            Arc::new(Permutation::random_with_rng(block_len, &mut rng).unwrap()),
            Arc::new(Permutation::random_with_rng(block_len, &mut rng).unwrap()),
        ];
        for termination in [Termination::Tail, Termination::Truncate] {
            let options =
                EncoderOptions::new(trellises.clone(), interleavers.clone(), termination).unwrap();
            let codec = Turbo::new(options).unwrap();
            for log_sum in ALL_LOG_SUMS {
                for scheduling in [Scheduling::Serial, Scheduling::Parallel] {
                    let options = DecoderOptions::new(4, log_sum, scheduling, false, 0.75).unwrap();
                    let info_bits = utils::random_bits_with_rng(block_len, &mut rng);
                    let code_bits = codec.encode(&info_bits).unwrap();
                    assert_eq!(code_bits.len(), codec.output_size());
                    let decoded = codec
                        .decode(&utils::saturated_llrs(&code_bits), &options)
                        .unwrap();
                    assert_eq!(decoded, info_bits);
                }
            }
        }
    }

    #[test]
    fn test_more_iterations_do_not_hurt() {
        let codec = crate::lte::turbo(512).unwrap();
        let mut rng = StdRng::seed_from_u64(2024);
        let num_blocks = 50;
        let mut all_info_bits = Vec::with_capacity(num_blocks);
        let mut all_code_bits_llr = Vec::with_capacity(num_blocks);
        for _ in 0 .. num_blocks {
            let info_bits = utils::random_bits_with_rng(codec.input_size(), &mut rng);
            let code_bits = codec.encode(&info_bits).unwrap();
            all_code_bits_llr.push(utils::bpsk_awgn_channel(&code_bits, -4.0, &mut rng));
            all_info_bits.push(info_bits);
        }
        let error_counts: Vec<usize> = [1, 2, 4, 8]
            .into_iter()
            .map(|iterations| {
                let options =
                    DecoderOptions::new(iterations, LogSum::Exact, Scheduling::Serial, false, 1.0)
                        .unwrap();
                all_info_bits
                    .iter()
                    .zip(&all_code_bits_llr)
                    .map(|(info_bits, code_bits_llr)| {
                        let info_bits_hat = codec.decode(code_bits_llr, &options).unwrap();
                        utils::error_count(&info_bits_hat, info_bits)
                    })
                    .sum()
            })
            .collect();
        assert!(error_counts.windows(2).all(|pair| pair[1] <= pair[0]));
        assert!(error_counts[3] < error_counts[0]);
    }

    #[test]
    fn test_app_decode_resumes() {
        let codec = crate::lte::turbo(40).unwrap();
        let mut rng = StdRng::seed_from_u64(77);
        let info_bits = utils::random_bits_with_rng(codec.input_size(), &mut rng);
        let code_bits = codec.encode(&info_bits).unwrap();
        let code_bits_llr = utils::bpsk_awgn_channel(&code_bits, -3.0, &mut rng);
        let to_bits = |x: &[f64]| x.iter().map(|y| y.to_bits()).collect::<Vec<u64>>();
        let zeros = vec![0.0; codec.extrinsic_size()];
        assert_eq!(zeros.len(), 80);
        for scheduling in [Scheduling::Serial, Scheduling::Parallel] {
            let options_for = |iterations| {
                DecoderOptions::new(iterations, LogSum::Linear, scheduling, false, 0.75).unwrap()
            };
            let (llrs_all, extrinsic_all) = codec
                .app_decode(&code_bits_llr, &zeros, &options_for(5))
                .unwrap();
            let decoded = codec.soft_decode(&code_bits_llr, &options_for(5)).unwrap();
            assert_eq!(to_bits(&decoded.llrs), to_bits(&llrs_all));
            let (_, extrinsic_first) = codec
                .app_decode(&code_bits_llr, &zeros, &options_for(2))
                .unwrap();
            let (llrs_resumed, extrinsic_resumed) = codec
                .app_decode(&code_bits_llr, &extrinsic_first, &options_for(3))
                .unwrap();
            assert_eq!(to_bits(&llrs_resumed), to_bits(&llrs_all));
            assert_eq!(to_bits(&extrinsic_resumed), to_bits(&extrinsic_all));
        }
        // Invalid input
        let options = DecoderOptions::default();
        assert!(matches!(
            codec.app_decode(&code_bits_llr, &zeros[.. 40], &options),
            Err(Error::DimensionMismatch {
                what: "extrinsic LLR values",
                expected: 80,
                found: 40,
            })
        ));
        assert!(matches!(
            codec.app_decode(&code_bits_llr[1 ..], &zeros, &options),
            Err(Error::DimensionMismatch {
                what: "code bit LLR values",
                ..
            })
        ));
    }

    #[test]
    fn test_puncturing() {
        let codec = crate::lte::turbo(40).unwrap();
        // No masks
        let puncturing = codec.puncturing(&PunctureOptions::default()).unwrap();
        assert_eq!(puncturing.len(), 132);
        assert_eq!(&puncturing.as_slice()[.. 6], [0, 46, 89, 1, 47, 90]);
        assert_eq!(
            &puncturing.as_slice()[120 ..],
            [40, 86, 41, 87, 42, 88, 43, 129, 44, 130, 45, 131]
        );
        let options = PunctureOptions::new(vec![], vec![], BitOrdering::Group);
        let puncturing = codec.puncturing(&options).unwrap();
        assert!(puncturing.as_slice().iter().copied().eq(0 .. 132));
        // Rate 1/2 on the message steps
        let mask = vec![vec![true], vec![true, false], vec![false, true]];
        let options = PunctureOptions::new(mask.clone(), vec![], BitOrdering::Alternate);
        assert_eq!(options.bit_ordering(), BitOrdering::Alternate);
        let puncturing = codec.puncturing(&options).unwrap();
        assert_eq!(puncturing.len(), 92);
        assert_eq!(&puncturing.as_slice()[.. 6], [0, 46, 1, 90, 2, 48]);
        let options = PunctureOptions::new(mask, vec![], BitOrdering::Group);
        let puncturing = codec.puncturing(&options).unwrap();
        assert_eq!(puncturing.len(), 92);
        assert!(puncturing.as_slice()[.. 46].iter().copied().eq(0 .. 46));
        assert_eq!(&puncturing.as_slice()[46 .. 49], [46, 48, 50]);
        // Tail input bits dropped
        let tail_mask = vec![vec![false], vec![true], vec![true]];
        let options = PunctureOptions::new(vec![], tail_mask, BitOrdering::Alternate);
        let puncturing = codec.puncturing(&options).unwrap();
        assert_eq!(puncturing.len(), 126);
        assert_eq!(&puncturing.as_slice()[120 ..], [86, 87, 88, 129, 130, 131]);
        // Invalid masks
        for options in [
            PunctureOptions::new(vec![vec![true], vec![true]], vec![], BitOrdering::Group),
            PunctureOptions::new(vec![], vec![vec![true], vec![], vec![true]], BitOrdering::Group),
            PunctureOptions::new(
                vec![vec![false]; 3],
                vec![vec![false]; 3],
                BitOrdering::Alternate,
            ),
        ] {
            assert!(matches!(
                codec.puncturing(&options),
                Err(Error::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_punctured_round_trip() {
        let codec = crate::lte::turbo(40).unwrap();
        let mask = vec![vec![true], vec![true, false], vec![false, true]];
        let options = PunctureOptions::new(mask, vec![], BitOrdering::Alternate);
        let puncturing = codec.puncturing(&options).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut sent = Vec::new();
        let mut code_bits_llr = Vec::new();
        for _ in 0 .. 10 {
            let info_bits = utils::random_bits_with_rng(codec.input_size(), &mut rng);
            let code_bits = codec.encode(&info_bits).unwrap();
            puncturing.puncture(&code_bits, &mut sent).unwrap();
            assert_eq!(sent.len(), 92);
            puncturing
                .depuncture(&utils::saturated_llrs(&sent), &mut code_bits_llr)
                .unwrap();
            // Odd parity bits of constituent 0 and even ones of constituent 1 were dropped
            assert_eq!(code_bits_llr[47], 0.0);
            assert_eq!(code_bits_llr[89], 0.0);
            assert_eq!(
                code_bits_llr.iter().filter(|&&x| x == 0.0).count(),
                codec.output_size() - 92
            );
            let info_bits_hat = codec
                .decode(&code_bits_llr, &DecoderOptions::default())
                .unwrap();
            assert_eq!(info_bits_hat, info_bits);
        }
    }

    #[test]
    fn test_posterior() {
        let extrinsic = vec![vec![1.0, 2.0], vec![10.0, 20.0], vec![100.0, 200.0]];
        assert_float_eq!(
            posterior(&[0.5, -0.5], &extrinsic, 1),
            vec![101.5, 201.5],
            abs_all <= 1e-8
        );
        assert_float_eq!(
            posterior(&[0.5, -0.5], &extrinsic, usize::MAX),
            vec![111.5, 221.5],
            abs_all <= 1e-8
        );
    }
}
