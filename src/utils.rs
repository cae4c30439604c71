//! # Helpers for preparing decoder inputs and checking decoder outputs
//!
//! The [`random_bits`] function returns a given number of random bits; the [`saturated_llrs`]
//! function maps bits to LLR values of the highest confidence a decoder accepts; the
//! [`hard_decisions`] function slices LLR values to bits; and the [`error_count`] function
//! returns the number of errors in a sequence with respect to a reference sequence.
//!
//! # Examples
//!
//! ```
//! use fec::utils;
//!
//! let bits = utils::random_bits(40);
//! let bits_llr = utils::saturated_llrs(&bits);
//! let bits_hat = utils::hard_decisions(&bits_llr);
//! assert_eq!(utils::error_count(&bits_hat, &bits), 0);
//! ```

use rand::Rng;

use crate::{Bit, LLR_LIMIT};

/// Returns given number of random bits.
#[must_use]
pub fn random_bits(num_bits: usize) -> Vec<Bit> {
    random_bits_with_rng(num_bits, &mut rand::rng())
}

/// Returns given number of random bits drawn from a given generator.
#[must_use]
pub fn random_bits_with_rng<R: Rng + ?Sized>(num_bits: usize, rng: &mut R) -> Vec<Bit> {
    (0 .. num_bits)
        .map(|_| Bit::from(rng.random_bool(0.5)))
        .collect()
}

/// Returns LLR values of `+LLR_LIMIT` for `Zero` and `-LLR_LIMIT` for `One`.
#[must_use]
pub fn saturated_llrs(bits: &[Bit]) -> Vec<f64> {
    bits.iter()
        .map(|bit| match bit {
            Bit::Zero => LLR_LIMIT,
            Bit::One => -LLR_LIMIT,
        })
        .collect()
}

/// Returns hard decisions on LLR values.
///
/// Nonnegative values are mapped to `Zero`, and negative values to `One`.
#[must_use]
pub fn hard_decisions(llrs: &[f64]) -> Vec<Bit> {
    llrs.iter()
        .map(|&x| if x >= 0.0 { Bit::Zero } else { Bit::One })
        .collect()
}

/// Returns number of errors in a sequence with respect to a reference sequence.
///
/// # Parameters
///
/// - `seq`: Sequence in which errors must be counted.
///
/// - `ref_seq`: Reference sequence to which the given sequence is compared.
///
/// # Returns
///
/// - `err_count`: Number of positions in which the two sequences differ. If they are of different
///   lengths, then the longer sequence is effectively truncated to the length of the shorter one.
pub fn error_count<T: PartialEq>(seq: &[T], ref_seq: &[T]) -> usize {
    ref_seq
        .iter()
        .zip(seq.iter())
        .filter(|&(x, y)| x != y)
        .count()
}

/// Returns LLR values at BPSK-AWGN channel output corresponding to given input bits.
///
/// If the BPSK symbols are `+1.0` and `-1.0`, the noise variance is
/// `0.5 / 10f64.powf(0.1 * es_over_n0_db)`.
#[cfg(test)]
pub(crate) fn bpsk_awgn_channel<R: Rng + ?Sized>(
    bits: &[Bit],
    es_over_n0_db: f64,
    rng: &mut R,
) -> Vec<f64> {
    use rand_distr::StandardNormal;

    let es_over_n0 = 10f64.powf(0.1 * es_over_n0_db);
    let noise_var = 0.5 / es_over_n0;
    bits.iter()
        .map(|b| match b {
            Bit::Zero => 1f64,
            Bit::One => -1f64,
        })
        .map(|x| 4.0 * es_over_n0 * (x + noise_var.sqrt() * rng.sample::<f64, _>(StandardNormal)))
        .collect()
}

#[cfg(test)]
mod tests_of_functions {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use Bit::{One, Zero};

    #[test]
    fn test_random_bits() {
        assert!(random_bits(0).is_empty());
        let num_bits = 10000;
        let bits = random_bits(num_bits);
        let num_zeros = bits.iter().filter(|&b| *b == Zero).count();
        let num_ones = bits.iter().filter(|&b| *b == One).count();
        assert!(num_zeros > 9 * num_bits / 20 && num_ones > 9 * num_bits / 20);
        let first = random_bits_with_rng(64, &mut StdRng::seed_from_u64(3));
        let second = random_bits_with_rng(64, &mut StdRng::seed_from_u64(3));
        assert_eq!(first, second);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_saturated_llrs() {
        assert!(saturated_llrs(&[]).is_empty());
        assert_eq!(saturated_llrs(&[Zero, One]), [LLR_LIMIT, -LLR_LIMIT]);
    }

    #[test]
    fn test_hard_decisions() {
        assert!(hard_decisions(&[]).is_empty());
        assert_eq!(hard_decisions(&[0.0, 0.01, -0.01]), [Zero, Zero, One]);
    }

    #[test]
    fn test_error_count() {
        assert_eq!(error_count(&[], &[One, Zero]), 0);
        assert_eq!(error_count(&[One, Zero], &[]), 0);
        // Longer `seq`
        let ref_seq = [One, Zero, Zero, One, One, One, Zero, Zero];
        let seq = [One, One, Zero, Zero, One, One, Zero, Zero, Zero, One];
        assert_eq!(error_count(&seq, &ref_seq), 2);
        // Shorter `seq`
        let ref_seq = [One, Zero, Zero, One, One, One, Zero, Zero, Zero, One];
        let seq = [One, One, Zero, Zero, One, One, Zero, Zero];
        assert_eq!(error_count(&seq, &ref_seq), 2);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_bpsk_awgn_channel() {
        let mut rng = StdRng::seed_from_u64(17);
        assert!(bpsk_awgn_channel(&[], 0.0, &mut rng).is_empty());
        let es_over_n0_db = 20f64;
        let num_bits = 10000;
        let bits = random_bits_with_rng(num_bits, &mut rng);
        let bits_llr = bpsk_awgn_channel(&bits, es_over_n0_db, &mut rng);
        let es_over_n0 = 10f64.powf(0.1 * es_over_n0_db);
        let noise_var_est = bits_llr
            .iter()
            .zip(bits)
            .map(|(y, b)| match b {
                Zero => y - 4.0 * es_over_n0,
                One => y + 4.0 * es_over_n0,
            })
            .map(|x| x * x)
            .sum::<f64>()
            / num_bits as f64;
        assert!(noise_var_est > 7.2 * es_over_n0 && noise_var_est < 8.8 * es_over_n0);
    }
}
