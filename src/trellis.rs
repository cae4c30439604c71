//! Trellis (finite-state machine) of a convolutional encoder

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{Bit, Error};

/// Largest supported number of input bits per trellis step
const MAX_INPUT_WIDTH: usize = 8;

/// Largest supported number of output bits per trellis step
const MAX_OUTPUT_WIDTH: usize = 16;

/// Largest supported encoder memory length for shift-register trellises
const MAX_MEMORY_LEN: usize = 16;

/// Enumeration of trellis termination policies
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub enum Termination {
    /// Tail steps are appended to drive the encoder back to state `0`
    #[default]
    Tail,
    /// Encoding stops after the last message step, in whatever state the encoder is left
    Truncate,
}

/// State transition for a given state and input symbol
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy)]
pub struct Transition {
    /// State after the transition
    pub next_state: usize,
    /// Output symbol emitted during the transition (bit `j` is output bit `j` of the step)
    pub output: usize,
}

/// Input sequence driving every state back to state `0`
#[derive(Clone, Eq, PartialEq, Debug)]
struct ZeroTail {
    /// Input symbol to apply in each state
    inputs: Vec<usize>,
    /// Number of tail steps
    len: usize,
}

/// Trellis of a convolutional encoder
///
/// A trellis with `k` input bits and `n` output bits per step has `2^k` input symbols and a
/// transition (next state and output symbol) for every pair of state and input symbol. Bit `i`
/// of an input symbol is input bit `i` of the step, and bit `j` of an output symbol is output
/// bit `j` of the step. Encoding always starts in state `0`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Trellis {
    /// Number of states
    num_states: usize,
    /// Number of input bits per step
    input_width: usize,
    /// Number of output bits per step
    output_width: usize,
    /// Transition for each state and input symbol, indexed by `state << input_width | input`
    transitions: Vec<Transition>,
    /// Zero-tail, if every state can be driven back to state `0`
    zero_tail: Option<ZeroTail>,
}

impl Trellis {
    /// Returns trellis with an explicit transition table.
    ///
    /// # Parameters
    ///
    /// - `input_width`: Number of input bits per step. Must be in `[1, 8]`.
    ///
    /// - `output_width`: Number of output bits per step. Must be in `[1, 16]`.
    ///
    /// - `next_states`: Next state for each state and input symbol, indexed by
    ///   `state * 2^input_width + input`. Its length determines the number of states.
    ///
    /// - `outputs`: Output symbol for each state and input symbol, indexed the same way.
    ///
    /// # Errors
    ///
    /// Returns an error if a width is out of range, if the table lengths differ or are not a
    /// positive multiple of `2^input_width`, or if a next state or output symbol is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Trellis;
    ///
    /// // Accumulator: `y_k = x_k + y_{k-1}`
    /// let trellis = Trellis::new(1, 1, &[0, 1, 1, 0], &[0, 1, 1, 0])?;
    /// assert_eq!(trellis.num_states(), 2);
    /// assert_eq!(trellis.tail_len(), Some(1));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(
        input_width: usize,
        output_width: usize,
        next_states: &[usize],
        outputs: &[usize],
    ) -> Result<Self, Error> {
        if input_width == 0 || input_width > MAX_INPUT_WIDTH {
            return Err(Error::InconsistentStructure(format!(
                "Number of input bits per step must be in the range [1, {MAX_INPUT_WIDTH}] \
                (found {input_width})"
            )));
        }
        if output_width == 0 || output_width > MAX_OUTPUT_WIDTH {
            return Err(Error::InconsistentStructure(format!(
                "Number of output bits per step must be in the range [1, {MAX_OUTPUT_WIDTH}] \
                (found {output_width})"
            )));
        }
        let num_inputs = 1 << input_width;
        if next_states.is_empty() || next_states.len() % num_inputs != 0 {
            return Err(Error::InconsistentStructure(format!(
                "Transition table length must be a positive multiple of {num_inputs} (found {})",
                next_states.len()
            )));
        }
        if outputs.len() != next_states.len() {
            return Err(Error::InconsistentStructure(format!(
                "Expected {} output symbols, found {}",
                next_states.len(),
                outputs.len()
            )));
        }
        let num_states = next_states.len() / num_inputs;
        if let Some(&state) = next_states.iter().find(|&&s| s >= num_states) {
            return Err(Error::InconsistentStructure(format!(
                "Next state {state} is outside the range [0, {num_states})"
            )));
        }
        let num_outputs = 1 << output_width;
        if let Some(&output) = outputs.iter().find(|&&y| y >= num_outputs) {
            return Err(Error::InconsistentStructure(format!(
                "Output symbol {output} does not fit in {output_width} bits"
            )));
        }
        let transitions = next_states
            .iter()
            .zip(outputs)
            .map(|(&next_state, &output)| Transition { next_state, output })
            .collect();
        Ok(Self::from_valid_table(
            num_states,
            input_width,
            output_width,
            transitions,
        ))
    }

    /// Returns trellis of a rate-`1/n` feedforward (non-recursive) convolutional encoder.
    ///
    /// # Parameters
    ///
    /// - `constraint_len`: Constraint length `L` of the code. Must be in `[1, 17]`.
    ///
    /// - `generators`: Integer representations of the `n` generator polynomials, each in the
    ///   range `[1, 2^L)`. The MSB of a generator taps the current input bit and the LSB taps the
    ///   oldest one.
    ///
    /// # Errors
    ///
    /// Returns an error if `constraint_len` is out of range, if `generators` is empty or has more
    /// than `16` elements, or if any generator is outside `[1, 2^L)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Trellis;
    ///
    /// let trellis = Trellis::feedforward(3, &[0b111, 0b101])?;
    /// assert_eq!(trellis.num_states(), 4);
    /// assert_eq!(trellis.output_width(), 2);
    /// assert_eq!(trellis.tail_len(), Some(2));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn feedforward(constraint_len: usize, generators: &[usize]) -> Result<Self, Error> {
        if constraint_len == 0 || constraint_len > MAX_MEMORY_LEN + 1 {
            return Err(Error::InconsistentStructure(format!(
                "Constraint length must be in the range [1, {}] (found {constraint_len})",
                MAX_MEMORY_LEN + 1
            )));
        }
        let two_pow_constraint_len = 1 << constraint_len;
        if generators.is_empty() || generators.len() > MAX_OUTPUT_WIDTH {
            return Err(Error::InconsistentStructure(format!(
                "Expected between 1 and {MAX_OUTPUT_WIDTH} generator polynomials (found {})",
                generators.len()
            )));
        }
        if generators
            .iter()
            .any(|&g| g == 0 || g >= two_pow_constraint_len)
        {
            return Err(Error::InconsistentStructure(format!(
                "For constraint length of {constraint_len}, each generator polynomial must be in \
                the range [1, {two_pow_constraint_len}) (found {generators:?})"
            )));
        }
        let memory_len = constraint_len - 1;
        Ok(Self::shift_register(memory_len, 1 << memory_len, generators))
    }

    /// Returns trellis of a recursive convolutional encoder that emits parity bits only.
    ///
    /// This is the usual constituent of a turbo code, whose systematic bits are transmitted
    /// once for all constituents.
    ///
    /// # Parameters
    ///
    /// - `feedback`: Integer representation of the feedback polynomial. For a code of
    ///   constraint length `L`, it must be in the range `(2^(L-1), 2^L)`.
    ///
    /// - `feedforwards`: Integer representations of the feedforward polynomials, each in the
    ///   range `[1, 2^L)` and different from `feedback`.
    ///
    /// # Errors
    ///
    /// Returns an error if `feedback` is `0` or a power of `2`, or if `feedforwards` is empty
    /// or holds a polynomial outside `[1, 2^L)` or equal to `feedback`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Trellis;
    ///
    /// let trellis = Trellis::recursive(0o13, &[0o15])?; // LTE constituent encoder
    /// assert_eq!(trellis.num_states(), 8);
    /// assert_eq!(trellis.output_width(), 1);
    /// assert_eq!(trellis.tail_len(), Some(3));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn recursive(feedback: usize, feedforwards: &[usize]) -> Result<Self, Error> {
        let constraint_len = constraint_length(feedback, feedforwards)?;
        Ok(Self::shift_register(
            constraint_len - 1,
            feedback,
            feedforwards,
        ))
    }

    /// Returns trellis of a recursive systematic convolutional (RSC) encoder.
    ///
    /// # Parameters
    ///
    /// - `code_polynomials`: Integer representations of the generator polynomials. The first
    ///   element is the feedback polynomial (its output is the systematic bit), and all
    ///   subsequent ones are the feedforward polynomials (their outputs are the parity bits).
    ///   The output bits of each step appear in the same order as the polynomials.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than two code polynomials, or if they violate the
    /// conditions of [`Trellis::recursive`].
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Trellis;
    ///
    /// let trellis = Trellis::recursive_systematic(&[0o13, 0o15])?;
    /// assert_eq!(trellis.output_width(), 2);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn recursive_systematic(code_polynomials: &[usize]) -> Result<Self, Error> {
        if code_polynomials.len() < 2 {
            return Err(Error::InconsistentStructure(
                "Expected at least two code polynomials".to_string(),
            ));
        }
        let constraint_len = constraint_length(code_polynomials[0], &code_polynomials[1 ..])?;
        Ok(Self::shift_register(
            constraint_len - 1,
            code_polynomials[0],
            code_polynomials,
        ))
    }

    /// Returns the number of states.
    #[must_use]
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Returns the number of input bits per step.
    #[must_use]
    pub fn input_width(&self) -> usize {
        self.input_width
    }

    /// Returns the number of output bits per step.
    #[must_use]
    pub fn output_width(&self) -> usize {
        self.output_width
    }

    /// Returns the number of input symbols.
    #[must_use]
    pub fn num_input_symbols(&self) -> usize {
        1 << self.input_width
    }

    /// Returns the transition out of `state` for input symbol `input`, or `None` if either is
    /// out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::Trellis;
    ///
    /// let trellis = Trellis::feedforward(3, &[0b111, 0b101])?;
    /// assert_eq!(trellis.transition(1, 0).map(|t| t.output), Some(0b11));
    /// assert_eq!(trellis.transition(4, 0), None);
    /// assert_eq!(trellis.transition(0, 2), None);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn transition(&self, state: usize, input: usize) -> Option<Transition> {
        if state < self.num_states && input < self.num_input_symbols() {
            Some(self.step(state, input))
        } else {
            None
        }
    }

    /// Returns the transition out of a valid state for a valid input symbol.
    pub(crate) fn step(&self, state: usize, input: usize) -> Transition {
        self.transitions[state << self.input_width | input]
    }

    /// Returns the number of zero-tail steps, or `None` if some state cannot be driven back to
    /// state `0` (or state `0` cannot stay there).
    #[must_use]
    pub fn tail_len(&self) -> Option<usize> {
        self.zero_tail.as_ref().map(|tail| tail.len)
    }

    /// Returns the zero-tail input symbol for `state`.
    #[must_use]
    pub fn tail_input(&self, state: usize) -> Option<usize> {
        self.zero_tail
            .as_ref()
            .and_then(|tail| tail.inputs.get(state).copied())
    }

    /// Returns the number of steps appended to a block under the given termination.
    pub(crate) fn num_tail_steps(&self, termination: Termination) -> Result<usize, Error> {
        match termination {
            Termination::Truncate => Ok(0),
            Termination::Tail => self.tail_len().ok_or_else(|| {
                Error::InconsistentStructure(
                    "Tail termination requires a trellis whose states can all be driven back to \
                    state 0"
                        .to_string(),
                )
            }),
        }
    }

    /// Returns all transitions in table order.
    pub(crate) fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Returns trellis of a shift-register encoder.
    ///
    /// With `m` the memory length, the register content on the arrival of input bit `x` is
    /// `s_k = parity((x << m | state) & feedback)`, the augmented state is `s_k << m | state`,
    /// output bit `j` is `parity(augmented & taps[j])`, and the next state is `augmented >> 1`.
    /// A feedback polynomial of `1 << m` gives a feedforward encoder.
    fn shift_register(memory_len: usize, feedback: usize, taps: &[usize]) -> Self {
        let num_states = 1 << memory_len;
        let mut transitions = Vec::with_capacity(2 * num_states);
        for state in 0 .. num_states {
            for input in 0 .. 2 {
                let msb = parity((input << memory_len | state) & feedback);
                let aug_state_index = msb << memory_len | state;
                let output = taps
                    .iter()
                    .enumerate()
                    .map(|(j, &tap)| parity(aug_state_index & tap) << j)
                    .sum();
                transitions.push(Transition {
                    next_state: aug_state_index >> 1,
                    output,
                });
            }
        }
        Self::from_valid_table(num_states, 1, taps.len(), transitions)
    }

    /// Returns trellis corresponding to a valid transition table.
    fn from_valid_table(
        num_states: usize,
        input_width: usize,
        output_width: usize,
        transitions: Vec<Transition>,
    ) -> Self {
        let zero_tail = zero_tail(num_states, input_width, &transitions);
        Self {
            num_states,
            input_width,
            output_width,
            transitions,
            zero_tail,
        }
    }
}

/// Returns constraint length corresponding to given feedback and feedforward polynomials.
fn constraint_length(feedback: usize, feedforwards: &[usize]) -> Result<usize, Error> {
    if feedforwards.is_empty() || feedforwards.len() + 1 > MAX_OUTPUT_WIDTH {
        return Err(Error::InconsistentStructure(format!(
            "Expected between 1 and {} feedforward polynomials (found {})",
            MAX_OUTPUT_WIDTH - 1,
            feedforwards.len()
        )));
    }
    if feedback == 0 || feedback & (feedback - 1) == 0 {
        return Err(Error::InconsistentStructure(
            "Feedback polynomial cannot be 0 or a power of 2".to_string(),
        ));
    }
    // OK to cast `u32` to `usize`: Numbers involved will always be small enough.
    let constraint_len = (usize::BITS - feedback.leading_zeros()) as usize;
    if constraint_len > MAX_MEMORY_LEN + 1 {
        return Err(Error::InconsistentStructure(format!(
            "Constraint length cannot exceed {} (found {constraint_len})",
            MAX_MEMORY_LEN + 1
        )));
    }
    let two_pow_constraint_len = 1 << constraint_len;
    if feedforwards
        .iter()
        .any(|&x| x == 0 || x == feedback || x >= two_pow_constraint_len)
    {
        return Err(Error::InconsistentStructure(format!(
            "For constraint length of {constraint_len}, each feedforward polynomial \
            must be in the range [1, {two_pow_constraint_len}), and cannot equal the \
            feedback polynomial {feedback}",
        )));
    }
    Ok(constraint_len)
}

/// Returns the zero-tail of a transition table, if it exists.
///
/// The distance of each state to state `0` is found by a breadth-first search over reversed
/// transitions. The tail input of a state is the smallest input symbol leading to a state
/// closest to state `0`, and the tail length is the largest distance.
fn zero_tail(
    num_states: usize,
    input_width: usize,
    transitions: &[Transition],
) -> Option<ZeroTail> {
    let num_inputs = 1 << input_width;
    let mut predecessors = vec![Vec::new(); num_states];
    for (index, transition) in transitions.iter().enumerate() {
        predecessors[transition.next_state].push(index >> input_width);
    }
    let mut distance = vec![usize::MAX; num_states];
    distance[0] = 0;
    let mut queue = VecDeque::from([0]);
    while let Some(state) = queue.pop_front() {
        for &prev_state in &predecessors[state] {
            if distance[prev_state] == usize::MAX {
                distance[prev_state] = distance[state] + 1;
                queue.push_back(prev_state);
            }
        }
    }
    if distance.contains(&usize::MAX) {
        return None;
    }
    let inputs: Vec<usize> = (0 .. num_states)
        .map(|state| {
            (0 .. num_inputs)
                .min_by_key(|&input| {
                    distance[transitions[state << input_width | input].next_state]
                })
                .unwrap_or(0)
        })
        .collect();
    // State `0` must be able to stay where it is
    if transitions[inputs[0]].next_state != 0 {
        return None;
    }
    let len = distance.iter().copied().max().unwrap_or(0);
    Some(ZeroTail { inputs, len })
}

/// Returns XOR of bits in the binary representation of given integer.
fn parity(num: usize) -> usize {
    usize::from(num.count_ones() % 2 == 1)
}

/// Returns the input symbol formed by given bits, with the first bit as LSB.
pub(crate) fn symbol_from_bits(bits: &[Bit]) -> usize {
    bits.iter()
        .enumerate()
        .map(|(i, &bit)| usize::from(bit) << i)
        .sum()
}
