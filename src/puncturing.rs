//! Puncturing (selection of transmitted code bits) for codewords of a given length

use itertools::Itertools;

use crate::{check_len, Error};

/// Ordered selection of codeword positions to be transmitted
///
/// Puncturing keeps the code bits at the selected positions, in the order of the selection, and
/// drops the others. Depuncturing puts received LLR values back in place, with `0` (no
/// information) at every dropped position.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Puncturing {
    /// Codeword position of each transmitted bit
    kept: Vec<usize>,
    /// Number of bits in a full codeword
    codeword_len: usize,
}

impl Puncturing {
    /// Returns puncturing given by a table of kept positions.
    ///
    /// # Parameters
    ///
    /// - `kept`: Codeword positions to transmit, in transmission order. Must be distinct and in
    ///   `[0, codeword_len)`.
    ///
    /// - `codeword_len`: Number of bits in a full codeword.
    ///
    /// # Errors
    ///
    /// Returns an error if `kept` is empty, or holds a repeated or out-of-range position.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Puncturing;
    ///
    /// let puncturing = Puncturing::new(&[0, 2, 3], 4)?;
    /// let mut sent = Vec::new();
    /// puncturing.puncture(&['a', 'b', 'c', 'd'], &mut sent)?;
    /// assert_eq!(sent, ['a', 'c', 'd']);
    /// assert!(Puncturing::new(&[0, 0], 4).is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(kept: &[usize], codeword_len: usize) -> Result<Self, Error> {
        if kept.is_empty() {
            return Err(Error::InvalidConfiguration(
                "Puncturing must keep at least one code bit".to_string(),
            ));
        }
        if let Some(&position) = kept.iter().find(|&&position| position >= codeword_len) {
            return Err(Error::InconsistentStructure(format!(
                "Position {position} is outside a codeword of {codeword_len} bits"
            )));
        }
        if let Some(position) = kept.iter().duplicates().next() {
            return Err(Error::InconsistentStructure(format!(
                "Position {position} is kept more than once"
            )));
        }
        Ok(Self {
            kept: kept.to_vec(),
            codeword_len,
        })
    }

    /// Returns the number of transmitted bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kept.len()
    }

    /// Returns `true` if no bit is transmitted (never the case once built).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }

    /// Returns the number of bits in a full codeword.
    #[must_use]
    pub fn codeword_len(&self) -> usize {
        self.codeword_len
    }

    /// Returns the codeword position of each transmitted bit.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.kept
    }

    /// Generates the transmitted sequence from a full codeword.
    ///
    /// # Parameters
    ///
    /// - `code`: Full codeword (bits or LLR values).
    ///
    /// - `sent`: Buffer for the transmitted sequence (any pre-existing contents will be cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `code.len()` is not equal to `self.codeword_len()`.
    pub fn puncture<T: Copy>(&self, code: &[T], sent: &mut Vec<T>) -> Result<(), Error> {
        check_len("code bits", self.codeword_len, code.len())?;
        sent.clear();
        sent.extend(self.kept.iter().map(|&position| code[position]));
        Ok(())
    }

    /// Generates full-codeword LLR values from received ones, with `0` at dropped positions.
    ///
    /// # Parameters
    ///
    /// - `received_llr`: LLR values of the transmitted bits.
    ///
    /// - `code_llr`: Buffer for the full-codeword LLR values (any pre-existing contents will be
    ///   cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `received_llr.len()` is not equal to `self.len()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Puncturing;
    ///
    /// let puncturing = Puncturing::new(&[3, 0], 4)?;
    /// let mut code_llr = Vec::new();
    /// puncturing.depuncture(&[-1.5, 2.0], &mut code_llr)?;
    /// assert_eq!(code_llr, [2.0, 0.0, 0.0, -1.5]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn depuncture(&self, received_llr: &[f64], code_llr: &mut Vec<f64>) -> Result<(), Error> {
        check_len("received LLR values", self.len(), received_llr.len())?;
        code_llr.clear();
        code_llr.resize(self.codeword_len, 0.0);
        for (&position, &llr) in self.kept.iter().zip(received_llr) {
            code_llr[position] = llr;
        }
        Ok(())
    }
}

/// Returns `true` if a periodic mask keeps index `index` (an empty mask keeps everything).
pub(crate) fn mask_keeps(mask: &[bool], index: usize) -> bool {
    mask.is_empty() || mask[index % mask.len()]
}

/// Checks that a set of periodic masks is empty or has one nonempty row per stream.
pub(crate) fn check_mask_rows(
    what: &str,
    rows: &[Vec<bool>],
    num_streams: usize,
) -> Result<(), Error> {
    if rows.is_empty() {
        return Ok(());
    }
    if rows.len() != num_streams {
        return Err(Error::InvalidConfiguration(format!(
            "Expected 0 or {num_streams} rows in {what}, found {}",
            rows.len()
        )));
    }
    if rows.iter().any(Vec::is_empty) {
        return Err(Error::InvalidConfiguration(format!(
            "Rows of {what} cannot be empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests_of_puncturing {
    use super::*;

    #[test]
    fn test_new() {
        assert!(matches!(
            Puncturing::new(&[], 4),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Puncturing::new(&[0, 4], 4),
            Err(Error::InconsistentStructure(_))
        ));
        assert!(matches!(
            Puncturing::new(&[1, 2, 1], 4),
            Err(Error::InconsistentStructure(_))
        ));
        let puncturing = Puncturing::new(&[2, 0], 4).unwrap();
        assert_eq!(puncturing.len(), 2);
        assert!(!puncturing.is_empty());
        assert_eq!(puncturing.codeword_len(), 4);
        assert_eq!(puncturing.as_slice(), [2, 0]);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_puncture_and_depuncture() {
        let puncturing = Puncturing::new(&[4, 1, 2], 5).unwrap();
        let mut sent = Vec::new();
        assert!(matches!(
            puncturing.puncture(&[1.0, 2.0, 3.0], &mut sent),
            Err(Error::DimensionMismatch {
                expected: 5,
                found: 3,
                ..
            })
        ));
        puncturing
            .puncture(&[1.0, 2.0, 3.0, 4.0, 5.0], &mut sent)
            .unwrap();
        assert_eq!(sent, [5.0, 2.0, 3.0]);
        let mut code_llr = vec![9.0; 2];
        assert!(puncturing.depuncture(&[1.0], &mut code_llr).is_err());
        puncturing.depuncture(&sent, &mut code_llr).unwrap();
        assert_eq!(code_llr, [0.0, 2.0, 3.0, 0.0, 5.0]);
    }

    #[test]
    fn test_mask_keeps() {
        assert!(mask_keeps(&[], 7));
        let mask = [true, false, false];
        let kept: Vec<usize> = (0 .. 7).filter(|&k| mask_keeps(&mask, k)).collect();
        assert_eq!(kept, [0, 3, 6]);
    }

    #[test]
    fn test_check_mask_rows() {
        assert!(check_mask_rows("mask", &[], 3).is_ok());
        assert!(check_mask_rows("mask", &[vec![true], vec![false, true]], 2).is_ok());
        assert!(check_mask_rows("mask", &[vec![true]], 2).is_err());
        assert!(check_mask_rows("mask", &[vec![true], vec![]], 2).is_err());
    }
}
