//! Permutation (interleaver) for sequences of a given length

use rand::{seq::SliceRandom, Rng};

use crate::{check_len, Error};

/// Bijection over the indices `[0, L)` of a sequence
///
/// Both directions of the bijection are stored, so that interleaving and deinterleaving are
/// equally cheap.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Permutation {
    /// Input index for each output index (needed in interleaving)
    all_in_index_given_out_index: Vec<usize>,
    /// Output index for each input index (needed in deinterleaving)
    all_out_index_given_in_index: Vec<usize>,
}

impl Permutation {
    /// Returns permutation given by a table of indices.
    ///
    /// # Parameters
    ///
    /// - `perm`: Permutation of integers in `[0, L)` for some positive integer `L`. If the
    ///   interleaver input is the sequence `x[0], x[1], ..., x[L-1]`, then its output is the
    ///   sequence `x[perm[0]], x[perm[1]], ..., x[perm[L-1]]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `perm` is not a permutation of the integers in `[0, L)` for some
    /// positive integer `L`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Permutation;
    ///
    /// let permutation = Permutation::new(&[0, 3, 2, 5, 4, 7, 6, 1])?;
    /// assert_eq!(permutation.len(), 8);
    /// assert!(Permutation::new(&[0, 3, 3, 1]).is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(perm: &[usize]) -> Result<Self, Error> {
        if perm.is_empty() {
            return Err(Error::InconsistentStructure(
                "Permutation cannot be empty".to_string(),
            ));
        }
        let mut seen = vec![false; perm.len()];
        for &index in perm {
            if index >= perm.len() || seen[index] {
                return Err(Error::InconsistentStructure(format!(
                    "Expected permutation of all integers in the range [0, {}), found {index} \
                    out of range or repeated",
                    perm.len(),
                )));
            }
            seen[index] = true;
        }
        Ok(Self::from_valid_perm(perm.to_vec()))
    }

    /// Returns the identity permutation of a given length.
    ///
    /// # Errors
    ///
    /// Returns an error if `length` is `0`.
    pub fn identity(length: usize) -> Result<Self, Error> {
        check_positive_length(length)?;
        Ok(Self::from_valid_perm((0 .. length).collect()))
    }

    /// Returns uniformly random permutation of a given length.
    ///
    /// # Errors
    ///
    /// Returns an error if `length` is `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Permutation;
    ///
    /// let permutation = Permutation::random(8)?;
    /// let mut indices = permutation.as_slice().to_vec();
    /// indices.sort_unstable();
    /// assert_eq!(indices, [0, 1, 2, 3, 4, 5, 6, 7]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn random(length: usize) -> Result<Self, Error> {
        Self::random_with_rng(length, &mut rand::rng())
    }

    /// Returns uniformly random permutation of a given length, drawn from a given generator.
    ///
    /// # Errors
    ///
    /// Returns an error if `length` is `0`.
    pub fn random_with_rng<R: Rng + ?Sized>(length: usize, rng: &mut R) -> Result<Self, Error> {
        check_positive_length(length)?;
        let mut perm_vec: Vec<usize> = (0 .. length).collect();
        perm_vec.shuffle(rng);
        Ok(Self::from_valid_perm(perm_vec))
    }

    /// Returns the length of the permuted sequences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.all_in_index_given_out_index.len()
    }

    /// Returns `true` if the permutation is over an empty sequence (never the case once built).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all_in_index_given_out_index.is_empty()
    }

    /// Returns the input index that lands at output index `out_index`.
    #[must_use]
    pub fn input_index(&self, out_index: usize) -> usize {
        self.all_in_index_given_out_index[out_index]
    }

    /// Returns the output index at which input index `in_index` lands.
    #[must_use]
    pub fn output_index(&self, in_index: usize) -> usize {
        self.all_out_index_given_in_index[in_index]
    }

    /// Returns the input index for each output index.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.all_in_index_given_out_index
    }

    /// Generates interleaver output given its input.
    ///
    /// # Parameters
    ///
    /// - `input`: Interleaver input.
    ///
    /// - `output`: Buffer for interleaver output (any pre-existing contents will be cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `input.len()` is not equal to `self.len()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Permutation;
    ///
    /// let permutation = Permutation::new(&[0, 3, 2, 5, 4, 7, 6, 1])?;
    /// let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
    /// let mut output = Vec::new();
    /// permutation.interleave(&input, &mut output)?;
    /// assert_eq!(output, ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn interleave<T: Copy>(&self, input: &[T], output: &mut Vec<T>) -> Result<(), Error> {
        check_len("interleaver inputs", self.len(), input.len())?;
        output.clear();
        output.extend(self.all_in_index_given_out_index.iter().map(|&k| input[k]));
        Ok(())
    }

    /// Generates interleaver input given its output.
    ///
    /// # Parameters
    ///
    /// - `output`: Interleaver output.
    ///
    /// - `input`: Buffer for interleaver input (any pre-existing contents will be cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `output.len()` is not equal to `self.len()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Permutation;
    ///
    /// let permutation = Permutation::new(&[0, 3, 2, 5, 4, 7, 6, 1])?;
    /// let output = ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b'];
    /// let mut input = Vec::new();
    /// permutation.deinterleave(&output, &mut input)?;
    /// assert_eq!(input, ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn deinterleave<T: Copy>(&self, output: &[T], input: &mut Vec<T>) -> Result<(), Error> {
        check_len("deinterleaver inputs", self.len(), output.len())?;
        input.clear();
        input.extend(self.all_out_index_given_in_index.iter().map(|&k| output[k]));
        Ok(())
    }

    /// Returns permutation corresponding to a valid table.
    fn from_valid_perm(perm_vec: Vec<usize>) -> Self {
        let mut all_out_index_given_in_index = vec![0; perm_vec.len()];
        for (out_index, &in_index) in perm_vec.iter().enumerate() {
            all_out_index_given_in_index[in_index] = out_index;
        }
        Self {
            all_in_index_given_out_index: perm_vec,
            all_out_index_given_in_index,
        }
    }
}

/// Checks that a permutation length is positive.
fn check_positive_length(length: usize) -> Result<(), Error> {
    if length == 0 {
        Err(Error::InconsistentStructure(
            "Length of permutation must be a positive integer".to_string(),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests_of_permutation {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn is_bijection(permutation: &Permutation) -> bool {
        (0 .. permutation.len()).all(|k| {
            permutation.input_index(permutation.output_index(k)) == k
                && permutation.output_index(permutation.input_index(k)) == k
        })
    }

    #[test]
    fn test_new() {
        // Invalid input
        assert!(Permutation::new(&[]).is_err());
        assert!(Permutation::new(&[1, 2, 3, 4]).is_err());
        assert!(Permutation::new(&[0, 1, 2, 4]).is_err());
        assert!(matches!(
            Permutation::new(&[0, 0, 1, 2]),
            Err(Error::InconsistentStructure(_))
        ));
        // Valid input
        let permutation = Permutation::new(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        assert_eq!(permutation.len(), 8);
        assert!(!permutation.is_empty());
        assert_eq!(permutation.as_slice(), [0, 3, 2, 5, 4, 7, 6, 1]);
        assert_eq!(
            permutation.all_out_index_given_in_index,
            [0, 7, 2, 1, 4, 3, 6, 5]
        );
        assert!(is_bijection(&permutation));
    }

    #[test]
    fn test_identity() {
        assert!(Permutation::identity(0).is_err());
        let permutation = Permutation::identity(5).unwrap();
        assert_eq!(permutation.as_slice(), [0, 1, 2, 3, 4]);
        assert!(is_bijection(&permutation));
    }

    #[test]
    fn test_random() {
        // Invalid input
        assert!(Permutation::random(0).is_err());
        // Valid input
        for length in [1, 8, 100] {
            let permutation = Permutation::random(length).unwrap();
            assert_eq!(permutation.len(), length);
            assert!(is_bijection(&permutation));
        }
        let first = Permutation::random_with_rng(64, &mut StdRng::seed_from_u64(7)).unwrap();
        let second = Permutation::random_with_rng(64, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_interleave() {
        let permutation = Permutation::new(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        let mut output = Vec::new();
        // Invalid input
        let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g'];
        assert!(matches!(
            permutation.interleave(&input, &mut output),
            Err(Error::DimensionMismatch {
                expected: 8,
                found: 7,
                ..
            })
        ));
        // Valid input
        let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
        for _ in 0 .. 2 {
            permutation.interleave(&input, &mut output).unwrap();
            assert_eq!(output, ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b']);
        }
    }

    #[test]
    fn test_deinterleave() {
        let permutation = Permutation::new(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        let mut input = Vec::new();
        // Invalid output
        let output = ['a', 'd', 'c', 'f', 'e', 'h', 'g'];
        assert!(permutation.deinterleave(&output, &mut input).is_err());
        // Valid output
        let output = ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b'];
        for _ in 0 .. 2 {
            permutation.deinterleave(&output, &mut input).unwrap();
            assert_eq!(input, ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h']);
        }
    }
}
