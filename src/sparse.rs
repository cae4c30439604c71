//! Sparse binary matrix with row-wise and column-wise traversal

use std::ops::Range;

use itertools::Itertools;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{check_len, Bit, Error};

/// Nonzero entry of a sparse binary matrix
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy)]
pub struct Entry {
    /// Row index
    pub row: usize,
    /// Column index
    pub col: usize,
    /// Edge index, shared by the row and column views of the entry
    pub edge: usize,
}

/// Sparse binary matrix, such as the parity-check matrix of an LDPC code
///
/// Only the nonzero entries are stored, in compressed row lists (sorted by column) and
/// compressed column lists (sorted by row). Each entry has an edge index in `[0, K)`, where `K`
/// is the number of entries; edges are numbered in row-major order. The matrix cannot be
/// changed once built.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SparseBitMatrix {
    /// Number of rows
    num_rows: usize,
    /// Number of columns
    num_cols: usize,
    /// Range of edges in each row (row `r` owns edges `row_offsets[r] .. row_offsets[r + 1]`)
    row_offsets: Vec<usize>,
    /// Row index of each edge
    edge_rows: Vec<usize>,
    /// Column index of each edge
    edge_cols: Vec<usize>,
    /// Range of each column in `col_edges`
    col_offsets: Vec<usize>,
    /// Edges of each column, sorted by row
    col_edges: Vec<usize>,
}

impl SparseBitMatrix {
    /// Returns sparse binary matrix with given nonzero entries.
    ///
    /// # Parameters
    ///
    /// - `num_rows`: Number of rows. Must be positive.
    ///
    /// - `num_cols`: Number of columns. Must be positive.
    ///
    /// - `entries`: Positions `(row, col)` of the nonzero entries, in any order.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension is `0`, or if an entry is out of range or repeated.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::SparseBitMatrix;
    ///
    /// let h = SparseBitMatrix::new(2, 3, &[(0, 0), (0, 1), (1, 1), (1, 2)])?;
    /// assert_eq!(h.num_entries(), 4);
    /// assert_eq!(h.row(1).map(|e| e.col).collect::<Vec<_>>(), [1, 2]);
    /// assert_eq!(h.col(1).map(|e| e.row).collect::<Vec<_>>(), [0, 1]);
    /// assert!(SparseBitMatrix::new(2, 3, &[(0, 0), (0, 0)]).is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(num_rows: usize, num_cols: usize, entries: &[(usize, usize)]) -> Result<Self, Error> {
        if num_rows == 0 || num_cols == 0 {
            return Err(Error::InconsistentStructure(format!(
                "Matrix dimensions must be positive (found {num_rows} x {num_cols})"
            )));
        }
        if let Some(&(row, col)) = entries
            .iter()
            .find(|&&(row, col)| row >= num_rows || col >= num_cols)
        {
            return Err(Error::InconsistentStructure(format!(
                "Entry ({row}, {col}) is outside a {num_rows} x {num_cols} matrix"
            )));
        }
        if let Some((row, col)) = entries.iter().duplicates().next() {
            return Err(Error::InconsistentStructure(format!(
                "Entry ({row}, {col}) appears more than once"
            )));
        }
        let mut sorted = entries.to_vec();
        sorted.sort_unstable();
        // Row view
        let mut row_offsets = vec![0; num_rows + 1];
        for &(row, _) in &sorted {
            row_offsets[row + 1] += 1;
        }
        for r in 0 .. num_rows {
            row_offsets[r + 1] += row_offsets[r];
        }
        let (edge_rows, edge_cols): (Vec<usize>, Vec<usize>) = sorted.into_iter().unzip();
        // Column view
        let mut col_offsets = vec![0; num_cols + 1];
        for &col in &edge_cols {
            col_offsets[col + 1] += 1;
        }
        for c in 0 .. num_cols {
            col_offsets[c + 1] += col_offsets[c];
        }
        let mut col_edges = vec![0; edge_cols.len()];
        let mut next_slot = col_offsets.clone();
        // Edges are visited in row-major order, so each column ends up sorted by row
        for (edge, &col) in edge_cols.iter().enumerate() {
            col_edges[next_slot[col]] = edge;
            next_slot[col] += 1;
        }
        Ok(Self {
            num_rows,
            num_cols,
            row_offsets,
            edge_rows,
            edge_cols,
            col_offsets,
            col_edges,
        })
    }

    /// Returns the parity-check matrix of a random regular LDPC code (Gallager construction).
    ///
    /// The matrix has `n` columns of weight `wc` and `n * wc / wr` rows of weight `wr`. Its rows
    /// form `wc` bands; in the first band, row `i` covers columns `[i * wr, (i + 1) * wr)`, and
    /// every other band is a random column permutation of the first one.
    ///
    /// # Parameters
    ///
    /// - `n`: Number of columns (code length). Must be a positive multiple of `wr`.
    ///
    /// - `wc`: Column weight. Must be positive.
    ///
    /// - `wr`: Row weight. Must be at least `2`.
    ///
    /// - `seed`: Seed for the random permutations.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters violate the conditions above.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::SparseBitMatrix;
    ///
    /// let h = SparseBitMatrix::gallager(20, 3, 4, 1)?;
    /// assert_eq!(h.num_rows(), 15);
    /// assert!((0 .. 20).all(|c| h.col_degree(c) == 3));
    /// assert!((0 .. 15).all(|r| h.row_degree(r) == 4));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn gallager(n: usize, wc: usize, wr: usize, seed: u64) -> Result<Self, Error> {
        if wc == 0 || wr < 2 || n == 0 || n % wr != 0 {
            return Err(Error::InconsistentStructure(format!(
                "Gallager construction requires a positive column weight, a row weight of at \
                least 2 and a length that is a multiple of the row weight (found n = {n}, \
                wc = {wc}, wr = {wr})"
            )));
        }
        let rows_per_band = n / wr;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut cols: Vec<usize> = (0 .. n).collect();
        let mut entries = Vec::with_capacity(n * wc);
        for band in 0 .. wc {
            if band > 0 {
                cols.shuffle(&mut rng);
            }
            for (k, &col) in cols.iter().enumerate() {
                entries.push((band * rows_per_band + k / wr, col));
            }
        }
        Self::new(rows_per_band * wc, n, &entries)
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Returns the number of nonzero entries.
    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.edge_rows.len()
    }

    /// Returns the number of nonzero entries in row `row`.
    #[must_use]
    pub fn row_degree(&self, row: usize) -> usize {
        self.row_offsets[row + 1] - self.row_offsets[row]
    }

    /// Returns the number of nonzero entries in column `col`.
    #[must_use]
    pub fn col_degree(&self, col: usize) -> usize {
        self.col_offsets[col + 1] - self.col_offsets[col]
    }

    /// Returns `true` if the entry at `(row, col)` is nonzero.
    #[must_use]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.num_rows
            && self.edge_cols[self.row_range(row)]
                .binary_search(&col)
                .is_ok()
    }

    /// Returns iterator over the nonzero entries of row `row`, in column order.
    #[must_use]
    pub fn row(&self, row: usize) -> RowIter<'_> {
        RowIter {
            matrix: self,
            edges: self.row_range(row),
        }
    }

    /// Returns iterator over the nonzero entries of column `col`, in row order.
    #[must_use]
    pub fn col(&self, col: usize) -> ColIter<'_> {
        ColIter {
            matrix: self,
            col,
            slots: self.col_offsets[col] .. self.col_offsets[col + 1],
        }
    }

    /// Returns iterator over all nonzero entries, in row-major order.
    #[must_use]
    pub fn iter(&self) -> RowIter<'_> {
        RowIter {
            matrix: self,
            edges: 0 .. self.num_entries(),
        }
    }

    /// Returns the syndrome `H * bits` of a word.
    ///
    /// # Errors
    ///
    /// Returns an error if `bits.len()` does not equal the number of columns.
    pub fn syndrome(&self, bits: &[Bit]) -> Result<Vec<Bit>, Error> {
        check_len("code bits", self.num_cols, bits.len())?;
        Ok((0 .. self.num_rows)
            .map(|r| {
                Bit::from(
                    self.row(r)
                        .filter(|entry| bits[entry.col] == Bit::One)
                        .count()
                        % 2
                        == 1,
                )
            })
            .collect())
    }

    /// Returns `true` if a word satisfies every parity check.
    ///
    /// # Errors
    ///
    /// Returns an error if `bits.len()` does not equal the number of columns.
    pub fn is_codeword(&self, bits: &[Bit]) -> Result<bool, Error> {
        Ok(self.syndrome(bits)?.iter().all(|&bit| bit == Bit::Zero))
    }

    /// Returns the range of edges in row `row`.
    fn row_range(&self, row: usize) -> Range<usize> {
        self.row_offsets[row] .. self.row_offsets[row + 1]
    }

    /// Returns the entry of a given edge.
    fn entry(&self, edge: usize) -> Entry {
        Entry {
            row: self.edge_rows[edge],
            col: self.edge_cols[edge],
            edge,
        }
    }
}

impl<'a> IntoIterator for &'a SparseBitMatrix {
    type Item = Entry;
    type IntoIter = RowIter<'a>;

    fn into_iter(self) -> RowIter<'a> {
        self.iter()
    }
}

/// Iterator over a range of edges in row-major order
#[derive(Clone, Debug)]
pub struct RowIter<'a> {
    /// Matrix being traversed
    matrix: &'a SparseBitMatrix,
    /// Remaining edges
    edges: Range<usize>,
}

impl Iterator for RowIter<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        self.edges.next().map(|edge| self.matrix.entry(edge))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.edges.size_hint()
    }
}

impl ExactSizeIterator for RowIter<'_> {}

/// Iterator over the entries of a column in row order
#[derive(Clone, Debug)]
pub struct ColIter<'a> {
    /// Matrix being traversed
    matrix: &'a SparseBitMatrix,
    /// Column index
    col: usize,
    /// Remaining positions in the column list
    slots: Range<usize>,
}

impl Iterator for ColIter<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        self.slots.next().map(|slot| {
            let edge = self.matrix.col_edges[slot];
            Entry {
                row: self.matrix.edge_rows[edge],
                col: self.col,
                edge,
            }
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl ExactSizeIterator for ColIter<'_> {}
