//! Low-density parity-check (LDPC) code: systematic encoder and belief-propagation decoder

use std::sync::Arc;

use tracing::{debug, trace, Level};

use crate::{
    check_len,
    codec::{CodeKind, Decoded, Info},
    puncturing::mask_keeps,
    sanitize, saturate, utils, Bit, DecoderOptions, Error, LogSum, Puncturing, SparseBitMatrix,
};

/// Number of bits in a word of a packed row
const WORD_BITS: usize = u64::BITS as usize;

/// Options for an LDPC encoder
#[derive(Clone, Debug)]
pub struct EncoderOptions {
    /// Parity-check matrix of the code
    check_matrix: Arc<SparseBitMatrix>,
}

impl EncoderOptions {
    /// Returns options for an LDPC encoder with given parity-check matrix.
    #[must_use]
    pub fn new(check_matrix: Arc<SparseBitMatrix>) -> Self {
        Self { check_matrix }
    }

    /// Returns the parity-check matrix.
    #[must_use]
    pub fn check_matrix(&self) -> &Arc<SparseBitMatrix> {
        &self.check_matrix
    }
}

/// Parity bit given by a linear combination of message bits
#[derive(Clone, Eq, PartialEq, Debug)]
struct ParityEquation {
    /// Position of the parity bit in the codeword
    position: usize,
    /// Message bits involved, packed into words (bit `i` is message bit `i`)
    message_mask: Vec<u64>,
}

/// LDPC codec
///
/// The codeword is any word `c` with `H * c = 0`. At construction, `H` is brought to reduced
/// row echelon form with pivots searched from the last column backwards; the pivot columns hold
/// parity bits, and the remaining columns (in increasing order) hold the message bits. A
/// full-rank `H` whose rightmost square block is invertible thus gives codewords laid out as
/// `| message | parity |`.
#[derive(Clone, Debug)]
pub struct Ldpc {
    /// Parity-check matrix of the code
    check_matrix: Arc<SparseBitMatrix>,
    /// Codeword positions of the message bits
    message_positions: Vec<usize>,
    /// Equation of every parity bit
    parity_equations: Vec<ParityEquation>,
}

impl Ldpc {
    /// Returns LDPC codec with given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the parity-check matrix has full column rank, so that the code has no
    /// message bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use fec::{ldpc, Ldpc, SparseBitMatrix};
    ///
    /// let entries = [(0, 0), (0, 1), (0, 3), (1, 1), (1, 2), (1, 4), (2, 0), (2, 4), (2, 5)];
    /// let check_matrix = Arc::new(SparseBitMatrix::new(3, 6, &entries)?);
    /// let codec = Ldpc::new(ldpc::EncoderOptions::new(check_matrix))?;
    /// assert_eq!(codec.input_size(), 3);
    /// assert_eq!(codec.output_size(), 6);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(options: EncoderOptions) -> Result<Self, Error> {
        let check_matrix = options.check_matrix;
        let (pivots, reduced_rows) = reduced_row_echelon_form(&check_matrix);
        let num_cols = check_matrix.num_cols();
        if pivots.len() == num_cols {
            return Err(Error::InconsistentStructure(format!(
                "Parity-check matrix has full column rank {num_cols}, leaving no message bits"
            )));
        }
        let mut is_pivot = vec![false; num_cols];
        for &col in &pivots {
            is_pivot[col] = true;
        }
        let message_positions: Vec<usize> = (0 .. num_cols).filter(|&col| !is_pivot[col]).collect();
        let parity_equations = pivots
            .iter()
            .zip(&reduced_rows)
            .map(|(&position, row)| {
                let mut message_mask = vec![0; message_positions.len().div_ceil(WORD_BITS)];
                for (i, &col) in message_positions.iter().enumerate() {
                    if bit_of(row, col) {
                        message_mask[i / WORD_BITS] |= 1 << (i % WORD_BITS);
                    }
                }
                ParityEquation {
                    position,
                    message_mask,
                }
            })
            .collect();
        debug!(
            "LDPC codec: {} code bits, {} message bits, {} checks",
            num_cols,
            message_positions.len(),
            check_matrix.num_rows()
        );
        Ok(Self {
            check_matrix,
            message_positions,
            parity_equations,
        })
    }

    /// Returns the parity-check matrix.
    #[must_use]
    pub fn check_matrix(&self) -> &Arc<SparseBitMatrix> {
        &self.check_matrix
    }

    /// Returns the codeword positions of the message bits, in increasing order.
    #[must_use]
    pub fn message_positions(&self) -> &[usize] {
        &self.message_positions
    }

    /// Returns the number of message bits per block.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.message_positions.len()
    }

    /// Returns the number of code bits per block.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.check_matrix.num_cols()
    }

    /// Returns the sizes of the code.
    #[must_use]
    pub fn info(&self) -> Info {
        Info {
            kind: CodeKind::Ldpc,
            input_size: self.input_size(),
            output_size: self.output_size(),
        }
    }

    /// Returns codeword for given message bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `info_bits.len()` is not equal to `self.input_size()`.
    pub fn encode(&self, info_bits: &[Bit]) -> Result<Vec<Bit>, Error> {
        check_len("information bits", self.input_size(), info_bits.len())?;
        let mut packed_info_bits = vec![0u64; info_bits.len().div_ceil(WORD_BITS)];
        for (i, &bit) in info_bits.iter().enumerate() {
            if bit == Bit::One {
                packed_info_bits[i / WORD_BITS] |= 1 << (i % WORD_BITS);
            }
        }
        let mut code_bits = vec![Bit::Zero; self.output_size()];
        for (&position, &bit) in self.message_positions.iter().zip(info_bits) {
            code_bits[position] = bit;
        }
        for equation in &self.parity_equations {
            let num_ones: u32 = equation
                .message_mask
                .iter()
                .zip(&packed_info_bits)
                .map(|(mask, bits)| (mask & bits).count_ones())
                .sum();
            code_bits[equation.position] = Bit::from(num_ones % 2 == 1);
        }
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
    /// Belief propagation runs with a flooding schedule: every iteration updates all check
    /// nodes and then all variable nodes. Check nodes combine incoming messages with
    /// [`LogSum::boxplus`] and scale them by the gain in `options`. Decoding stops after the
    /// requested number of iterations, or as soon as the hard decisions satisfy every check if
    /// early exit is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` is not equal to `self.output_size()`.
    pub fn soft_decode(
        &self,
        code_bits_llr: &[f64],
        options: &DecoderOptions,
    ) -> Result<Decoded, Error> {
        let check_to_var = vec![0.0; self.extrinsic_size()];
        let (decoded, _) = self.belief_propagation(code_bits_llr, check_to_var, options)?;
        Ok(decoded)
    }

    /// Returns the number of extrinsic LLR values exchanged by [`Ldpc::app_decode`] (one per
    /// nonzero entry of the parity-check matrix).
    #[must_use]
    pub fn extrinsic_size(&self) -> usize {
        self.check_matrix.num_entries()
    }

    /// Returns posterior LLR values of the message bits and the decoder state reached, starting
    /// from a given decoder state.
    ///
    /// The state is the check-to-variable messages of the last iteration, indexed by edge (row by
    /// row, in column order within a row). Decoding from an all-zero state is the same as
    /// [`Ldpc::soft_decode`], and passing the returned state back in resumes decoding exactly
    /// where it stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` is not equal to `self.output_size()`, or if
    /// `extrinsic_in.len()` is not equal to `self.extrinsic_size()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use fec::{ldpc, utils, DecoderOptions, Ldpc, SparseBitMatrix};
    ///
    /// let codec = Ldpc::new(ldpc::EncoderOptions::new(Arc::new(SparseBitMatrix::gallager(24, 3, 6, 1)?)))?;
    /// let info_bits = utils::random_bits(codec.input_size());
    /// let code_bits_llr = utils::saturated_llrs(&codec.encode(&info_bits)?);
    /// let options = DecoderOptions::default();
    /// let (_, state) = codec.app_decode(&code_bits_llr, &vec![0.0; codec.extrinsic_size()], &options)?;
    /// let (llrs, _) = codec.app_decode(&code_bits_llr, &state, &options)?;
    /// assert_eq!(utils::hard_decisions(&llrs), info_bits);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn app_decode(
        &self,
        code_bits_llr: &[f64],
        extrinsic_in: &[f64],
        options: &DecoderOptions,
    ) -> Result<(Vec<f64>, Vec<f64>), Error> {
        check_len("extrinsic LLR values", self.extrinsic_size(), extrinsic_in.len())?;
        let check_to_var = extrinsic_in.iter().map(|&x| sanitize(x)).collect();
        let (decoded, check_to_var) = self.belief_propagation(code_bits_llr, check_to_var, options)?;
        Ok((decoded.llrs, check_to_var))
    }

    /// Returns the puncturing of codewords selected by given masks.
    ///
    /// A code bit is transmitted if `options.mask()` keeps its codeword position and, for a
    /// message bit, if `options.syst_mask()` also keeps its index among the message bits.
    /// Transmitted bits keep their codeword order.
    ///
    /// # Errors
    ///
    /// Returns an error if the masks drop every code bit.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use fec::{ldpc, Ldpc, SparseBitMatrix};
    ///
    /// let entries = [(0, 0), (0, 1), (0, 3), (1, 1), (1, 2), (1, 4), (2, 0), (2, 4), (2, 5)];
    /// let codec = Ldpc::new(ldpc::EncoderOptions::new(Arc::new(SparseBitMatrix::new(3, 6, &entries)?)))?;
    /// let options = ldpc::PunctureOptions::new(vec![], vec![false, true]);
    /// assert_eq!(codec.puncturing(&options)?.as_slice(), [1, 3, 4, 5]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn puncturing(&self, options: &PunctureOptions) -> Result<Puncturing, Error> {
        let num_cols = self.output_size();
        let mut message_index = vec![None; num_cols];
        for (index, &position) in self.message_positions.iter().enumerate() {
            message_index[position] = Some(index);
        }
        let kept: Vec<usize> = (0 .. num_cols)
            .filter(|&position| {
                mask_keeps(&options.mask, position)
                    && message_index[position]
                        .map_or(true, |index| mask_keeps(&options.syst_mask, index))
            })
            .collect();
        Puncturing::new(&kept, num_cols)
    }

    /// Runs belief propagation from given check-to-variable messages, and returns the decoding
    /// result along with the final check-to-variable messages.
    fn belief_propagation(
        &self,
        code_bits_llr: &[f64],
        mut check_to_var: Vec<f64>,
        options: &DecoderOptions,
    ) -> Result<(Decoded, Vec<f64>), Error> {
        check_len("code bit LLR values", self.output_size(), code_bits_llr.len())?;
        let h = &*self.check_matrix;
        let channel_llr: Vec<f64> = code_bits_llr.iter().map(|&x| saturate(x)).collect();
        let mut var_to_check = vec![0.0; h.num_entries()];
        let mut total_llr = vec![0.0; h.num_cols()];
        update_variable_nodes(h, &channel_llr, &check_to_var, &mut total_llr, &mut var_to_check);
        let mut incoming = Vec::new();
        let mut outgoing = Vec::new();
        let mut iterations = 0;
        while iterations < options.iterations() {
            for row in 0 .. h.num_rows() {
                incoming.clear();
                incoming.extend(h.row(row).map(|entry| var_to_check[entry.edge]));
                check_node_messages(options.log_sum(), &incoming, &mut outgoing);
                for (entry, &message) in h.row(row).zip(&outgoing) {
                    check_to_var[entry.edge] = options.gain() * saturate(message);
                }
            }
            update_variable_nodes(h, &channel_llr, &check_to_var, &mut total_llr, &mut var_to_check);
            iterations += 1;
            if options.early_exit() || tracing::enabled!(Level::TRACE) {
                let num_unsatisfied = h
                    .syndrome(&utils::hard_decisions(&total_llr))?
                    .iter()
                    .filter(|&&bit| bit == Bit::One)
                    .count();
                trace!(
                    "LDPC iteration {}: {} unsatisfied checks",
                    iterations,
                    num_unsatisfied
                );
                if options.early_exit() && num_unsatisfied == 0 {
                    debug!("LDPC decoder converged after {} iterations", iterations);
                    break;
                }
            }
        }
        let llrs: Vec<f64> = self
            .message_positions
            .iter()
            .map(|&position| total_llr[position])
            .collect();
        let decoded = Decoded {
            bits: utils::hard_decisions(&llrs),
            llrs,
            iterations,
        };
        Ok((decoded, check_to_var))
    }
}

/// Options for puncturing an LDPC codeword
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PunctureOptions {
    /// Periodic mask over codeword positions
    mask: Vec<bool>,
    /// Periodic mask over message bits
    syst_mask: Vec<bool>,
}

impl PunctureOptions {
    /// Returns options for puncturing an LDPC codeword.
    ///
    /// # Parameters
    ///
    /// - `mask`: Periodic mask over codeword positions (`true` keeps the bit at position `p` if
    ///   `mask[p % mask.len()]`). An empty mask keeps every position.
    ///
    /// - `syst_mask`: Periodic mask over message bits, indexed by message bit number rather than
    ///   codeword position. An empty mask keeps every message bit.
    #[must_use]
    pub fn new(mask: Vec<bool>, syst_mask: Vec<bool>) -> Self {
        Self { mask, syst_mask }
    }

    /// Returns the mask over codeword positions.
    #[must_use]
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Returns the mask over message bits.
    #[must_use]
    pub fn syst_mask(&self) -> &[bool] {
        &self.syst_mask
    }
}

/// Updates posterior LLR values and variable-to-check messages from check-to-variable messages.
fn update_variable_nodes(
    h: &SparseBitMatrix,
    channel_llr: &[f64],
    check_to_var: &[f64],
    total_llr: &mut [f64],
    var_to_check: &mut [f64],
) {
    for (col, total) in total_llr.iter_mut().enumerate() {
        *total = channel_llr[col]
            + h.col(col)
                .map(|entry| check_to_var[entry.edge])
                .sum::<f64>();
        for entry in h.col(col) {
            var_to_check[entry.edge] = *total - check_to_var[entry.edge];
        }
    }
}

/// Computes the message from a check node to each of its edges, combining the messages
/// received on all other edges.
///
/// Associative strategies use prefix and suffix combinations; the others fold the other
/// messages from left to right. For [`LogSum::OffsetMinBox`], the offset is applied once to the
/// min-sum magnitude. A check node with a single edge sends `+inf`.
pub(crate) fn check_node_messages(log_sum: LogSum, incoming: &[f64], outgoing: &mut Vec<f64>) {
    outgoing.clear();
    match log_sum {
        LogSum::OffsetMinBox(offset) => {
            check_node_messages(LogSum::MinBox, incoming, outgoing);
            for message in outgoing.iter_mut() {
                *message = message.signum() * (message.abs() - offset).max(0.0);
            }
        }
        _ if log_sum.is_recursive() => {
            // Combination of the first `i` messages
            let mut prefix = Vec::with_capacity(incoming.len() + 1);
            prefix.push(f64::INFINITY);
            for &x in incoming {
                let last = prefix[prefix.len() - 1];
                prefix.push(log_sum.boxplus(last, x));
            }
            let mut suffix = f64::INFINITY;
            outgoing.resize(incoming.len(), 0.0);
            for (i, &x) in incoming.iter().enumerate().rev() {
                outgoing[i] = log_sum.boxplus(prefix[i], suffix);
                suffix = log_sum.boxplus(suffix, x);
            }
        }
        _ => {
            outgoing.extend((0 .. incoming.len()).map(|i| {
                incoming
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, &x)| x)
                    .reduce(|acc, x| log_sum.boxplus(acc, x))
                    .unwrap_or(f64::INFINITY)
            }));
        }
    }
}

/// Returns pivot columns and corresponding reduced rows of a matrix in reduced row echelon form
/// over GF(2), with pivots searched from the last column backwards.
fn reduced_row_echelon_form(matrix: &SparseBitMatrix) -> (Vec<usize>, Vec<Vec<u64>>) {
    let num_words = matrix.num_cols().div_ceil(WORD_BITS);
    let mut rows: Vec<Vec<u64>> = (0 .. matrix.num_rows())
        .map(|row| {
            let mut words = vec![0; num_words];
            for entry in matrix.row(row) {
                words[entry.col / WORD_BITS] |= 1 << (entry.col % WORD_BITS);
            }
            words
        })
        .collect();
    let mut pivots = Vec::new();
    for col in (0 .. matrix.num_cols()).rev() {
        let rank = pivots.len();
        if rank == rows.len() {
            break;
        }
        let Some(pivot_row) = (rank .. rows.len()).find(|&r| bit_of(&rows[r], col)) else {
            continue;
        };
        rows.swap(rank, pivot_row);
        let pivot = rows[rank].clone();
        for (r, row) in rows.iter_mut().enumerate() {
            if r != rank && bit_of(row, col) {
                row.iter_mut().zip(&pivot).for_each(|(x, y)| *x ^= y);
            }
        }
        pivots.push(col);
    }
    rows.truncate(pivots.len());
    (pivots, rows)
}

/// Returns `true` if bit `index` of a packed row is set.
fn bit_of(words: &[u64], index: usize) -> bool {
    (words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1
}

#[cfg(test)]
mod tests_of_ldpc {
    use float_eq::assert_float_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::Scheduling;
    use Bit::{One, Zero};

    const ALL_LOG_SUMS: [LogSum; 6] = [
        LogSum::Exact,
        LogSum::MaxOnly,
        LogSum::Linear,
        LogSum::LookupTable,
        LogSum::MinBox,
        LogSum::OffsetMinBox(0.25),
    ];

    fn new_codec(check_matrix: SparseBitMatrix) -> Ldpc {
        Ldpc::new(EncoderOptions::new(Arc::new(check_matrix))).unwrap()
    }

    fn matrix_from_rows(num_cols: usize, rows: &[&[usize]]) -> SparseBitMatrix {
        let entries: Vec<(usize, usize)> = rows
            .iter()
            .enumerate()
            .flat_map(|(r, cols)| cols.iter().map(move |&c| (r, c)))
            .collect();
        SparseBitMatrix::new(rows.len(), num_cols, &entries).unwrap()
    }

    // Example 2.5 in Johnson, "Iterative Error Correction"
    fn johnson_matrix() -> SparseBitMatrix {
        matrix_from_rows(6, &[&[0, 1, 3], &[1, 2, 4], &[0, 4, 5], &[2, 3, 5]])
    }

    fn rate_two_thirds_matrix() -> SparseBitMatrix {
        matrix_from_rows(
            12,
            &[
                &[0, 1, 4, 5, 6, 7, 8, 10, 11],
                &[0, 2, 3, 4, 5, 7, 8, 9, 10],
                &[0, 1, 2, 3, 5, 6, 8, 9, 11],
                &[1, 2, 3, 4, 6, 7, 9, 10, 11],
            ],
        )
    }

    fn to_llrs(bits: &[Bit]) -> Vec<f64> {
        bits.iter()
            .map(|&bit| if bit == Zero { 1.3863 } else { -1.3863 })
            .collect()
    }

    #[test]
    fn test_new() {
        let codec = new_codec(johnson_matrix());
        // Rows add up to zero, so the rank is 3
        assert_eq!(codec.input_size(), 3);
        assert_eq!(codec.output_size(), 6);
        assert_eq!(codec.info().kind, CodeKind::Ldpc);
        assert!(codec.message_positions().windows(2).all(|w| w[0] < w[1]));
        // Full column rank
        let check_matrix = SparseBitMatrix::new(2, 2, &[(0, 0), (1, 1)]).unwrap();
        assert!(matches!(
            Ldpc::new(EncoderOptions::new(Arc::new(check_matrix))),
            Err(Error::InconsistentStructure(_))
        ));
    }

    #[test]
    fn test_encode() {
        let codec = new_codec(rate_two_thirds_matrix());
        assert_eq!(codec.message_positions(), [0, 1, 2, 3, 4, 5, 6, 7]);
        // Invalid input
        assert!(matches!(
            codec.encode(&[One, Zero]),
            Err(Error::DimensionMismatch {
                expected: 8,
                found: 2,
                ..
            })
        ));
        // Valid input
        assert_eq!(
            codec
                .encode(&[One, Zero, One, One, Zero, Zero, One, Zero])
                .unwrap(),
            [One, Zero, One, One, Zero, Zero, One, Zero, One, Zero, Zero, One]
        );
        assert_eq!(
            codec
                .encode(&[Zero, One, Zero, Zero, One, One, One, Zero])
                .unwrap(),
            [Zero, One, Zero, Zero, One, One, One, Zero, One, Zero, One, Zero]
        );
    }

    #[test]
    fn test_encode_gives_codewords() {
        let mut rng = StdRng::seed_from_u64(8);
        for check_matrix in [
            johnson_matrix(),
            SparseBitMatrix::gallager(96, 3, 6, 2).unwrap(),
            SparseBitMatrix::gallager(150, 4, 10, 3).unwrap(),
        ] {
            let codec = new_codec(check_matrix);
            for _ in 0 .. 10 {
                let info_bits = utils::random_bits_with_rng(codec.input_size(), &mut rng);
                let code_bits = codec.encode(&info_bits).unwrap();
                assert!(codec.check_matrix().is_codeword(&code_bits).unwrap());
                let message: Vec<Bit> = codec
                    .message_positions()
                    .iter()
                    .map(|&position| code_bits[position])
                    .collect();
                assert_eq!(message, info_bits);
            }
        }
    }

    #[test]
    fn test_decode_single_error() {
        let codec = new_codec(johnson_matrix());
        let codeword = [Zero, Zero, One, Zero, One, One];
        let options = DecoderOptions::new(100, LogSum::Exact, Scheduling::Serial, true, 1.0).unwrap();
        let expected: Vec<Bit> = codec
            .message_positions()
            .iter()
            .map(|&position| codeword[position])
            .collect();
        for j in 0 .. codeword.len() {
            let mut bad_codeword = codeword;
            bad_codeword[j] = if codeword[j] == Zero { One } else { Zero };
            let decoded = codec.soft_decode(&to_llrs(&bad_codeword), &options).unwrap();
            assert_eq!(decoded.bits, expected);
            assert_eq!(decoded.iterations, 1);
        }
    }

    #[test]
    fn test_decode_iterations() {
        let codec = new_codec(johnson_matrix());
        let code_bits_llr = to_llrs(&[Zero, Zero, One, Zero, One, One]);
        let options = DecoderOptions::new(5, LogSum::MaxOnly, Scheduling::Serial, false, 1.0).unwrap();
        assert_eq!(
            codec.soft_decode(&code_bits_llr, &options).unwrap().iterations,
            5
        );
        let options = DecoderOptions::new(5, LogSum::MaxOnly, Scheduling::Serial, true, 1.0).unwrap();
        assert_eq!(
            codec.soft_decode(&code_bits_llr, &options).unwrap().iterations,
            1
        );
        // Invalid input
        assert!(matches!(
            codec.decode(&code_bits_llr[1 ..], &options),
            Err(Error::DimensionMismatch {
                expected: 6,
                found: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_round_trip() {
        let mut rng = StdRng::seed_from_u64(21);
        let codec = new_codec(SparseBitMatrix::gallager(120, 3, 6, 5).unwrap());
        for log_sum in ALL_LOG_SUMS {
            for early_exit in [false, true] {
                let options =
                    DecoderOptions::new(10, log_sum, Scheduling::Serial, early_exit, 0.875).unwrap();
                let info_bits = utils::random_bits_with_rng(codec.input_size(), &mut rng);
                let code_bits = codec.encode(&info_bits).unwrap();
                let decoded = codec
                    .soft_decode(&utils::saturated_llrs(&code_bits), &options)
                    .unwrap();
                assert_eq!(decoded.bits, info_bits);
                assert!(decoded.llrs.iter().all(|x| !x.is_nan()));
            }
        }
    }

    #[test]
    fn test_decode_extreme_values() {
        let codec = new_codec(SparseBitMatrix::gallager(24, 3, 6, 9).unwrap());
        let mut code_bits_llr = vec![0.0; 24];
        code_bits_llr[0] = f64::INFINITY;
        code_bits_llr[1] = f64::NEG_INFINITY;
        code_bits_llr[2] = f64::NAN;
        for log_sum in ALL_LOG_SUMS {
            let options = DecoderOptions::new(4, log_sum, Scheduling::Serial, false, 1.0).unwrap();
            let decoded = codec.soft_decode(&code_bits_llr, &options).unwrap();
            assert!(decoded.llrs.iter().all(|x| !x.is_nan()));
        }
    }

    #[test]
    fn test_check_node_messages() {
        let incoming = [1.5, -0.7, 2.2];
        let mut outgoing = Vec::new();
        for log_sum in ALL_LOG_SUMS {
            check_node_messages(log_sum, &incoming, &mut outgoing);
            assert_eq!(outgoing.len(), 3);
            // Each edge receives the combination of the two other edges only
            assert_float_eq!(outgoing[0], log_sum.boxplus(-0.7, 2.2), abs <= 1e-8);
            assert_float_eq!(outgoing[1], log_sum.boxplus(1.5, 2.2), abs <= 1e-8);
            assert_float_eq!(outgoing[2], log_sum.boxplus(1.5, -0.7), abs <= 1e-8);
        }
        check_node_messages(LogSum::MinBox, &incoming, &mut outgoing);
        assert_float_eq!(outgoing, vec![-0.7, 1.5, -0.7], abs_all <= 1e-8);
        // Single edge
        check_node_messages(LogSum::Exact, &[0.3], &mut outgoing);
        assert_eq!(outgoing, [f64::INFINITY]);
    }

    #[test]
    fn test_check_node_messages_exclude_own_edge() {
        let incoming = [1.5, -0.7, 2.2, -3.1, 0.4];
        let mut outgoing = Vec::new();
        let mut perturbed_outgoing = Vec::new();
        for log_sum in ALL_LOG_SUMS {
            check_node_messages(log_sum, &incoming, &mut outgoing);
            for i in 0 .. incoming.len() {
                for replacement in [-(incoming[i] + 3.7), 0.0, 50.0] {
                    let mut perturbed = incoming;
                    perturbed[i] = replacement;
                    check_node_messages(log_sum, &perturbed, &mut perturbed_outgoing);
                    assert_eq!(
                        perturbed_outgoing[i].to_bits(),
                        outgoing[i].to_bits(),
                        "{log_sum:?}, edge {i}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_app_decode_resumes() {
        let mut rng = StdRng::seed_from_u64(34);
        let codec = new_codec(SparseBitMatrix::gallager(120, 3, 6, 5).unwrap());
        let info_bits = utils::random_bits_with_rng(codec.input_size(), &mut rng);
        let code_bits = codec.encode(&info_bits).unwrap();
        let code_bits_llr = utils::bpsk_awgn_channel(&code_bits, 1.0, &mut rng);
        let options_for = |iterations| {
            DecoderOptions::new(iterations, LogSum::Linear, Scheduling::Serial, false, 0.875)
                .unwrap()
        };
        let zeros = vec![0.0; codec.extrinsic_size()];
        assert_eq!(zeros.len(), codec.check_matrix().num_entries());
        let (llrs_all, extrinsic_all) = codec
            .app_decode(&code_bits_llr, &zeros, &options_for(7))
            .unwrap();
        let decoded = codec.soft_decode(&code_bits_llr, &options_for(7)).unwrap();
        let to_bits = |x: &[f64]| x.iter().map(|y| y.to_bits()).collect::<Vec<u64>>();
        assert_eq!(to_bits(&decoded.llrs), to_bits(&llrs_all));
        let (_, extrinsic_first) = codec
            .app_decode(&code_bits_llr, &zeros, &options_for(3))
            .unwrap();
        let (llrs_resumed, extrinsic_resumed) = codec
            .app_decode(&code_bits_llr, &extrinsic_first, &options_for(4))
            .unwrap();
        assert_eq!(to_bits(&llrs_resumed), to_bits(&llrs_all));
        assert_eq!(to_bits(&extrinsic_resumed), to_bits(&extrinsic_all));
        // Invalid input
        assert!(matches!(
            codec.app_decode(&code_bits_llr, &zeros[1 ..], &options_for(1)),
            Err(Error::DimensionMismatch {
                what: "extrinsic LLR values",
                ..
            })
        ));
        // Non-finite state is saturated
        let mut extrinsic_in = zeros;
        extrinsic_in[0] = f64::NAN;
        extrinsic_in[1] = f64::INFINITY;
        let (llrs, _) = codec
            .app_decode(&code_bits_llr, &extrinsic_in, &options_for(2))
            .unwrap();
        assert!(llrs.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_puncturing() {
        let codec = new_codec(johnson_matrix());
        let puncturing = codec.puncturing(&PunctureOptions::default()).unwrap();
        assert_eq!(puncturing.as_slice(), [0, 1, 2, 3, 4, 5]);
        let puncturing = codec
            .puncturing(&PunctureOptions::new(vec![true, false], vec![]))
            .unwrap();
        assert_eq!(puncturing.as_slice(), [0, 2, 4]);
        // Every bit dropped
        assert!(matches!(
            codec.puncturing(&PunctureOptions::new(vec![false], vec![])),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_punctured_round_trip() {
        let mut rng = StdRng::seed_from_u64(55);
        let codec = new_codec(SparseBitMatrix::gallager(120, 3, 6, 5).unwrap());
        let mut syst_mask = vec![true; 8];
        syst_mask[7] = false;
        let puncture_options = PunctureOptions::new(vec![], syst_mask);
        let puncturing = codec.puncturing(&puncture_options).unwrap();
        let num_dropped = (0 .. codec.input_size()).filter(|m| m % 8 == 7).count();
        assert_eq!(puncturing.len(), codec.output_size() - num_dropped);
        let dropped: Vec<usize> = codec
            .message_positions()
            .iter()
            .enumerate()
            .filter(|&(m, _)| m % 8 == 7)
            .map(|(_, &position)| position)
            .collect();
        assert!(dropped.iter().all(|p| !puncturing.as_slice().contains(p)));
        let options = DecoderOptions::new(20, LogSum::Exact, Scheduling::Serial, true, 1.0).unwrap();
        let mut sent = Vec::new();
        let mut code_bits_llr = Vec::new();
        for _ in 0 .. 5 {
            let info_bits = utils::random_bits_with_rng(codec.input_size(), &mut rng);
            let code_bits = codec.encode(&info_bits).unwrap();
            puncturing.puncture(&code_bits, &mut sent).unwrap();
            puncturing
                .depuncture(&utils::saturated_llrs(&sent), &mut code_bits_llr)
                .unwrap();
            assert!(dropped.iter().all(|&p| code_bits_llr[p] == 0.0));
            assert_eq!(codec.decode(&code_bits_llr, &options).unwrap(), info_bits);
        }
    }

    #[test]
    fn test_reduced_row_echelon_form() {
        let (pivots, rows) = reduced_row_echelon_form(&johnson_matrix());
        assert_eq!(pivots, [5, 4, 3]);
        for (i, (&col, row)) in pivots.iter().zip(&rows).enumerate() {
            for (j, &other_col) in pivots.iter().enumerate() {
                assert_eq!(bit_of(row, other_col), i == j, "pivot {col}");
            }
        }
    }
}
