//! Convolutional code: trellis encoder and BCJR decoder

use std::sync::Arc;

use tracing::debug;

use crate::{
    check_len,
    codec::{CodeKind, Decoded, Info},
    saturate,
    trellis::{symbol_from_bits, Transition},
    utils, Bit, DecoderOptions, Error, LogSum, Termination, Trellis,
};

const INF: f64 = 1e100;

/// Options for a convolutional encoder
#[derive(Clone, Debug)]
pub struct EncoderOptions {
    /// Trellis of the encoder
    trellis: Arc<Trellis>,
    /// Number of message steps per block
    block_len: usize,
    /// Termination policy
    termination: Termination,
}

impl EncoderOptions {
    /// Returns options for a convolutional encoder.
    ///
    /// # Parameters
    ///
    /// - `trellis`: Trellis of the encoder.
    ///
    /// - `block_len`: Number of message steps per block (each step consumes
    ///   `trellis.input_width()` bits). Must be positive.
    ///
    /// - `termination`: Termination policy of every block.
    ///
    /// # Errors
    ///
    /// Returns an error if `block_len` is `0`, or if `termination` is [`Termination::Tail`] but
    /// the trellis has no zero-tail.
    pub fn new(
        trellis: Arc<Trellis>,
        block_len: usize,
        termination: Termination,
    ) -> Result<Self, Error> {
        if block_len == 0 {
            return Err(Error::InvalidConfiguration(
                "Block length must be a positive integer".to_string(),
            ));
        }
        trellis.num_tail_steps(termination)?;
        Ok(Self {
            trellis,
            block_len,
            termination,
        })
    }

    /// Returns the trellis of the encoder.
    #[must_use]
    pub fn trellis(&self) -> &Arc<Trellis> {
        &self.trellis
    }

    /// Returns the number of message steps per block.
    #[must_use]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Returns the termination policy.
    #[must_use]
    pub fn termination(&self) -> Termination {
        self.termination
    }
}

/// Convolutional codec
///
/// A block of `block_len * k` message bits is encoded into `(block_len + t) * n` code bits,
/// where `k` and `n` are the input and output widths of the trellis, and `t` is the number of
/// tail steps (the zero-tail length for [`Termination::Tail`], and `0` for
/// [`Termination::Truncate`]). Decoding is by the BCJR algorithm.
#[derive(Clone, Debug)]
pub struct Convolutional {
    /// Trellis of the encoder
    trellis: Arc<Trellis>,
    /// Number of message steps per block
    block_len: usize,
    /// Termination policy
    termination: Termination,
    /// Number of tail steps per block
    num_tail_steps: usize,
}

impl Convolutional {
    /// Returns convolutional codec with given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the termination policy is not supported by the trellis.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use fec::{convolutional, Convolutional, Termination, Trellis};
    ///
    /// let trellis = Arc::new(Trellis::feedforward(3, &[0b111, 0b101])?);
    /// let options = convolutional::EncoderOptions::new(trellis, 4, Termination::Tail)?;
    /// let codec = Convolutional::new(options)?;
    /// assert_eq!(codec.input_size(), 4);
    /// assert_eq!(codec.output_size(), 12);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(options: EncoderOptions) -> Result<Self, Error> {
        let num_tail_steps = options.trellis.num_tail_steps(options.termination)?;
        debug!(
            "Convolutional codec: {} states, {} message steps, {} tail steps",
            options.trellis.num_states(),
            options.block_len,
            num_tail_steps
        );
        Ok(Self {
            trellis: options.trellis,
            block_len: options.block_len,
            termination: options.termination,
            num_tail_steps,
        })
    }

    /// Returns the trellis of the encoder.
    #[must_use]
    pub fn trellis(&self) -> &Arc<Trellis> {
        &self.trellis
    }

    /// Returns the termination policy.
    #[must_use]
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Returns the number of message steps per block.
    #[must_use]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Returns the number of trellis steps per block (message steps plus tail steps).
    #[must_use]
    pub fn num_steps(&self) -> usize {
        self.block_len + self.num_tail_steps
    }

    /// Returns the number of message bits per block.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.block_len * self.trellis.input_width()
    }

    /// Returns the number of code bits per block.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.num_steps() * self.trellis.output_width()
    }

    /// Returns the sizes of the code.
    #[must_use]
    pub fn info(&self) -> Info {
        Info {
            kind: CodeKind::Convolutional,
            input_size: self.input_size(),
            output_size: self.output_size(),
        }
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
    /// use fec::{convolutional, Bit, Convolutional, Termination, Trellis};
    /// use Bit::{One, Zero};
    ///
    /// let trellis = Arc::new(Trellis::feedforward(3, &[0b111, 0b101])?);
    /// let options = convolutional::EncoderOptions::new(trellis, 4, Termination::Tail)?;
    /// let codec = Convolutional::new(options)?;
    /// let code_bits = codec.encode(&[One, Zero, One, One])?;
    /// assert_eq!(
    ///     code_bits,
    ///     [One, One, One, Zero, Zero, Zero, Zero, One, Zero, One, One, One]
    /// );
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode(&self, info_bits: &[Bit]) -> Result<Vec<Bit>, Error> {
        check_len("information bits", self.input_size(), info_bits.len())?;
        let mut tail_bits = Vec::new();
        let mut code_bits = Vec::with_capacity(self.output_size());
        encode(
            info_bits,
            &self.trellis,
            self.termination,
            &mut tail_bits,
            &mut code_bits,
        );
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
    /// Only the log-sum strategy of `options` is used. The iteration count of the result is
    /// always `1`.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` is not equal to `self.output_size()`.
    pub fn soft_decode(
        &self,
        code_bits_llr: &[f64],
        options: &DecoderOptions,
    ) -> Result<Decoded, Error> {
        let prior = vec![0.0; self.num_steps() * self.trellis.input_width()];
        let mut llrs = self.app_decode(code_bits_llr, &prior, options.log_sum())?;
        llrs.truncate(self.input_size());
        Ok(Decoded {
            bits: utils::hard_decisions(&llrs),
            llrs,
            iterations: 1,
        })
    }

    /// Returns posterior LLR values of all input bits (message bits followed by tail bits).
    ///
    /// This is the soft-input soft-output core of the decoder.
    ///
    /// # Parameters
    ///
    /// - `code_bits_llr`: LLR values for the code bits. Must have length `self.output_size()`.
    ///
    /// - `input_bits_llr_prior`: Prior LLR values for the input bits of every step, message
    ///   steps followed by tail steps. Must have length `self.num_steps() * k`.
    ///
    /// - `log_sum`: Log-domain combination strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if either input has the wrong length.
    pub fn app_decode(
        &self,
        code_bits_llr: &[f64],
        input_bits_llr_prior: &[f64],
        log_sum: LogSum,
    ) -> Result<Vec<f64>, Error> {
        check_len("code bit LLR values", self.output_size(), code_bits_llr.len())?;
        check_len(
            "prior LLR values",
            self.num_steps() * self.trellis.input_width(),
            input_bits_llr_prior.len(),
        )?;
        let code_bits_llr: Vec<f64> = code_bits_llr.iter().map(|&x| saturate(x)).collect();
        let prior: Vec<f64> = input_bits_llr_prior.iter().map(|&x| saturate(x)).collect();
        let mut ws = DecoderWorkspace::new(&self.trellis, self.num_steps(), log_sum);
        decode(&code_bits_llr, &prior, &self.trellis, self.termination, &mut ws)?;
        Ok(ws.llr_posterior)
    }
}

/// Branch metrics of all input and output symbols at one step
#[derive(Debug)]
struct BranchMetrics {
    /// Metric of each input symbol, from prior LLR values
    input: Vec<f64>,
    /// Metric of each output symbol, from code bit LLR values
    output: Vec<f64>,
}

impl BranchMetrics {
    /// Returns new buffer of branch metrics.
    fn new(trellis: &Trellis) -> Self {
        Self {
            input: Vec::with_capacity(trellis.num_input_symbols()),
            output: Vec::with_capacity(1 << trellis.output_width()),
        }
    }

    /// Computes symbol metrics for one step.
    fn compute(&mut self, input_bits_llr_prior: &[f64], output_bits_llr: &[f64]) {
        symbol_metrics(input_bits_llr_prior, &mut self.input);
        symbol_metrics(output_bits_llr, &mut self.output);
    }

    /// Returns branch metric for given input symbol and transition.
    fn value(&self, input: usize, transition: Transition) -> f64 {
        self.input[input] + self.output[transition.output]
    }
}

/// Calculator for beta values
#[derive(Debug)]
struct BetaCalculator {
    /// Number of encoder states
    num_states: usize,
    /// Log-domain combination strategy
    log_sum: LogSum,
    /// Beta values for all states after every step but the first, latest step last
    all_beta_val: Vec<f64>,
    /// Vector of beta values at previous time instant
    beta_val_prev: Vec<f64>,
}

impl BetaCalculator {
    /// Returns new calculator for beta values.
    fn new(num_states: usize, num_steps: usize, log_sum: LogSum) -> Self {
        Self {
            num_states,
            log_sum,
            all_beta_val: Vec::with_capacity(num_steps * num_states),
            beta_val_prev: Vec::with_capacity(num_states),
        }
    }

    /// Initializes beta values for all states after the last step.
    fn init_beta_values_after_last_step(&mut self, termination: Termination) {
        self.all_beta_val.clear();
        match termination {
            Termination::Tail => {
                self.all_beta_val.push(0.0);
                self.all_beta_val.resize(self.num_states, -INF);
            }
            Termination::Truncate => {
                self.all_beta_val.resize(self.num_states, 0.0);
            }
        }
    }

    /// Initializes beta values for all states at previous time instant.
    fn init_previous_beta_values(&mut self) {
        self.beta_val_prev.clear();
        self.beta_val_prev.resize(self.num_states, -INF);
    }

    /// Returns beta value of a state after the current step.
    fn beta_value_after_step(&self, state: usize) -> f64 {
        self.all_beta_val[self.all_beta_val.len() - self.num_states + state]
    }

    /// Updates beta value for a state at previous time instant.
    fn update_previous_beta_value(&mut self, state: usize, branch_metric: f64, next_state: usize) {
        let beta_next = self.beta_value_after_step(next_state);
        self.beta_val_prev[state] = self
            .log_sum
            .combine(self.beta_val_prev[state], branch_metric + beta_next);
    }

    /// Recenters beta values for all states at previous time instant.
    fn recenter_previous_beta_values(&mut self) {
        recenter(&mut self.beta_val_prev);
    }

    /// Saves beta values for all states at previous time instant.
    fn save_previous_beta_values(&mut self) {
        self.all_beta_val.extend(&self.beta_val_prev);
    }

    /// Deletes beta values for all states after the current step.
    fn delete_beta_values_after_step(&mut self) {
        self.all_beta_val
            .truncate(self.all_beta_val.len() - self.num_states);
    }
}

/// Calculator for alpha values
#[derive(Debug)]
struct AlphaCalculator {
    /// Number of encoder states
    num_states: usize,
    /// Log-domain combination strategy
    log_sum: LogSum,
    /// Vector of alpha values for all states before a step
    alpha_val: Vec<f64>,
    /// Vector of alpha values at next time instant
    alpha_val_next: Vec<f64>,
}

impl AlphaCalculator {
    /// Returns new calculator for alpha values.
    fn new(num_states: usize, log_sum: LogSum) -> Self {
        Self {
            num_states,
            log_sum,
            alpha_val: Vec::with_capacity(num_states),
            alpha_val_next: Vec::with_capacity(num_states),
        }
    }

    /// Initializes alpha values for all states before the first step.
    fn init_alpha_values_before_first_step(&mut self) {
        self.alpha_val.clear();
        self.alpha_val.push(0.0);
        self.alpha_val.resize(self.num_states, -INF);
    }

    /// Initializes alpha values for all states at next time instant.
    fn init_next_alpha_values(&mut self) {
        self.alpha_val_next.clear();
        self.alpha_val_next.resize(self.num_states, -INF);
    }

    /// Updates alpha value for a state at next time instant.
    fn update_next_alpha_value(&mut self, state: usize, branch_metric: f64, next_state: usize) {
        self.alpha_val_next[next_state] = self.log_sum.combine(
            self.alpha_val_next[next_state],
            self.alpha_val[state] + branch_metric,
        );
    }

    /// Recenters alpha values for all states at next time instant.
    fn recenter_next_alpha_values(&mut self) {
        recenter(&mut self.alpha_val_next);
    }

    /// Updates alpha values for all states before the next step.
    fn update_alpha_values_before_step(&mut self) {
        std::mem::swap(&mut self.alpha_val, &mut self.alpha_val_next);
    }
}

/// Workspace for BCJR decoder
#[derive(Debug)]
pub(crate) struct DecoderWorkspace {
    /// Calculator for beta values of all states after every step
    beta_calc: BetaCalculator,
    /// Calculator for alpha values of all states before a step
    alpha_calc: AlphaCalculator,
    /// Branch metrics of the current step
    branch_metrics: BranchMetrics,
    /// Log-domain combination strategy
    log_sum: LogSum,
    /// Candidate metrics for each input bit of the current step being `Zero`
    metrics_for_zero: Vec<Vec<f64>>,
    /// Candidate metrics for each input bit of the current step being `One`
    metrics_for_one: Vec<Vec<f64>>,
    /// Buffer for posterior LLR values for all input bits
    pub(crate) llr_posterior: Vec<f64>,
}

impl DecoderWorkspace {
    /// Returns new workspace for decoder.
    pub(crate) fn new(trellis: &Trellis, num_steps: usize, log_sum: LogSum) -> Self {
        let num_states = trellis.num_states();
        let input_width = trellis.input_width();
        Self {
            beta_calc: BetaCalculator::new(num_states, num_steps, log_sum),
            alpha_calc: AlphaCalculator::new(num_states, log_sum),
            branch_metrics: BranchMetrics::new(trellis),
            log_sum,
            metrics_for_zero: vec![Vec::with_capacity(trellis.transitions().len()); input_width],
            metrics_for_one: vec![Vec::with_capacity(trellis.transitions().len()); input_width],
            llr_posterior: Vec::with_capacity(num_steps * input_width),
        }
    }

    /// Initializes candidate metrics for the input bits being `Zero` and `One`.
    fn init_metrics_for_zero_and_one(&mut self) {
        self.metrics_for_zero.iter_mut().for_each(Vec::clear);
        self.metrics_for_one.iter_mut().for_each(Vec::clear);
    }

    /// Adds candidate metric of a state transition for every input bit of the step.
    fn update_metrics_for_zero_and_one(
        &mut self,
        state: usize,
        input: usize,
        branch_metric: f64,
        next_state: usize,
    ) {
        let cand_metric = self.alpha_calc.alpha_val[state]
            + branch_metric
            + self.beta_calc.beta_value_after_step(next_state);
        for (i, (zero, one)) in self
            .metrics_for_zero
            .iter_mut()
            .zip(self.metrics_for_one.iter_mut())
            .enumerate()
        {
            match Bit::from_bit_of(input, i) {
                Bit::Zero => zero.push(cand_metric),
                Bit::One => one.push(cand_metric),
            }
        }
    }

    /// Saves posterior LLR values of the input bits of the current step.
    fn save_posterior_llr_values(&mut self) {
        for (zero, one) in self.metrics_for_zero.iter().zip(&self.metrics_for_one) {
            self.llr_posterior
                .push(self.log_sum.fold(zero) - self.log_sum.fold(one));
        }
    }
}

/// Generates code bits (and tail input bits) from convolutional encoder.
///
/// # Parameters
///
/// - `info_bits`: Message bits to be encoded. Their number must be a multiple of the input width.
///
/// - `trellis`: Trellis of the encoder.
///
/// - `termination`: Termination policy, assumed to be supported by the trellis.
///
/// - `tail_bits`: Vector to which the input bits of the tail steps must be written (any
///   pre-existing elements will be cleared first).
///
/// - `code_bits`: Vector to which the code bits must be written (any pre-existing elements will
///   be cleared first).
pub(crate) fn encode(
    info_bits: &[Bit],
    trellis: &Trellis,
    termination: Termination,
    tail_bits: &mut Vec<Bit>,
    code_bits: &mut Vec<Bit>,
) {
    let input_width = trellis.input_width();
    let output_width = trellis.output_width();
    tail_bits.clear();
    code_bits.clear();
    let mut state = 0;
    let mut inputs: Vec<usize> = info_bits
        .chunks_exact(input_width)
        .map(symbol_from_bits)
        .collect();
    // Tail inputs depend on the state reached after the message
    if termination == Termination::Tail {
        let mut tail_state = inputs
            .iter()
            .fold(0, |s, &input| trellis.step(s, input).next_state);
        for _ in 0 .. trellis.tail_len().unwrap_or(0) {
            let input = trellis.tail_input(tail_state).unwrap_or(0);
            tail_bits.extend((0 .. input_width).map(|i| Bit::from_bit_of(input, i)));
            tail_state = trellis.step(tail_state, input).next_state;
            inputs.push(input);
        }
    }
    for input in inputs {
        let transition = trellis.step(state, input);
        code_bits.extend((0 .. output_width).map(|j| Bit::from_bit_of(transition.output, j)));
        state = transition.next_state;
    }
}

/// Generates posterior LLR values of all input bits from BCJR decoder.
///
/// # Parameters
///
/// - `code_bits_llr`: LLR values for the code bits.
///
/// - `input_bits_llr_prior`: Prior LLR values for the input bits of every step.
///
/// - `trellis`: Trellis of the encoder.
///
/// - `termination`: Termination policy of the block.
///
/// - `workspace`: Workspace for the decoder, to which posterior LLR values for the input bits
///   must be written (any pre-existing elements will be cleared first).
///
/// # Errors
///
/// Returns an error if the number of prior LLR values is not a multiple of the input width, or
/// if the number of code bit LLR values does not match the number of steps.
pub(crate) fn decode(
    code_bits_llr: &[f64],
    input_bits_llr_prior: &[f64],
    trellis: &Trellis,
    termination: Termination,
    workspace: &mut DecoderWorkspace,
) -> Result<(), Error> {
    let num_steps = input_bits_llr_prior.len() / trellis.input_width();
    check_len(
        "prior LLR values",
        num_steps * trellis.input_width(),
        input_bits_llr_prior.len(),
    )?;
    check_len(
        "code bit LLR values",
        num_steps * trellis.output_width(),
        code_bits_llr.len(),
    )?;
    run_bcjr_backward_pass(
        code_bits_llr,
        input_bits_llr_prior,
        trellis,
        termination,
        workspace,
    );
    run_bcjr_forward_pass(code_bits_llr, input_bits_llr_prior, trellis, workspace);
    Ok(())
}

/// Runs backward pass through the trellis in the BCJR decoding algorithm.
fn run_bcjr_backward_pass(
    code_bits_llr: &[f64],
    input_bits_llr_prior: &[f64],
    trellis: &Trellis,
    termination: Termination,
    workspace: &mut DecoderWorkspace,
) {
    workspace
        .beta_calc
        .init_beta_values_after_last_step(termination);
    // Beta values before the first step are never needed
    for (prior_chunk, code_chunk) in input_bits_llr_prior
        .chunks_exact(trellis.input_width())
        .zip(code_bits_llr.chunks_exact(trellis.output_width()))
        .skip(1)
        .rev()
    {
        workspace.branch_metrics.compute(prior_chunk, code_chunk);
        compute_previous_beta_values(trellis, workspace);
        workspace.beta_calc.save_previous_beta_values();
    }
}

/// Runs forward pass through the trellis in the BCJR decoding algorithm.
fn run_bcjr_forward_pass(
    code_bits_llr: &[f64],
    input_bits_llr_prior: &[f64],
    trellis: &Trellis,
    workspace: &mut DecoderWorkspace,
) {
    workspace.alpha_calc.init_alpha_values_before_first_step();
    workspace.llr_posterior.clear();
    for (prior_chunk, code_chunk) in input_bits_llr_prior
        .chunks_exact(trellis.input_width())
        .zip(code_bits_llr.chunks_exact(trellis.output_width()))
    {
        workspace.branch_metrics.compute(prior_chunk, code_chunk);
        compute_next_alpha_values(trellis, workspace);
        workspace.save_posterior_llr_values();
        workspace.beta_calc.delete_beta_values_after_step();
        workspace.alpha_calc.update_alpha_values_before_step();
    }
}

/// Computes beta values for all states at previous time instant.
fn compute_previous_beta_values(trellis: &Trellis, workspace: &mut DecoderWorkspace) {
    let input_width = trellis.input_width();
    let input_mask = trellis.num_input_symbols() - 1;
    workspace.beta_calc.init_previous_beta_values();
    for (index, &transition) in trellis.transitions().iter().enumerate() {
        let branch_metric = workspace.branch_metrics.value(index & input_mask, transition);
        workspace.beta_calc.update_previous_beta_value(
            index >> input_width,
            branch_metric,
            transition.next_state,
        );
    }
    workspace.beta_calc.recenter_previous_beta_values();
}

/// Computes alpha values for all states at next time instant, along with the candidate metrics
/// for the input bits of the step.
fn compute_next_alpha_values(trellis: &Trellis, workspace: &mut DecoderWorkspace) {
    let input_width = trellis.input_width();
    let input_mask = trellis.num_input_symbols() - 1;
    workspace.alpha_calc.init_next_alpha_values();
    workspace.init_metrics_for_zero_and_one();
    for (index, &transition) in trellis.transitions().iter().enumerate() {
        let state = index >> input_width;
        let input = index & input_mask;
        let branch_metric = workspace.branch_metrics.value(input, transition);
        workspace.update_metrics_for_zero_and_one(
            state,
            input,
            branch_metric,
            transition.next_state,
        );
        workspace
            .alpha_calc
            .update_next_alpha_value(state, branch_metric, transition.next_state);
    }
    workspace.alpha_calc.recenter_next_alpha_values();
}

/// Subtracts the largest value from all values.
fn recenter(values: &mut [f64]) {
    let max = values.iter().copied().fold(-INF, f64::max);
    values.iter_mut().for_each(|x| *x -= max);
}

/// Fills a buffer with the metric of every symbol formed by bits with given LLR values.
fn symbol_metrics(bits_llr: &[f64], metrics: &mut Vec<f64>) {
    metrics.clear();
    for symbol in 0 .. 1 << bits_llr.len() {
        metrics.push(
            bits_llr
                .iter()
                .enumerate()
                .map(|(i, &llr)| bit_metric_from_llr(Bit::from_bit_of(symbol, i), llr))
                .sum(),
        );
    }
}

/// Returns metric for given bit corresponding to given LLR value.
fn bit_metric_from_llr(bit: Bit, llr_val: f64) -> f64 {
    match bit {
        Bit::Zero => llr_val / 2.0,
        Bit::One => -llr_val / 2.0,
    }
}
