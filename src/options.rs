//! Decoder options shared by all codecs

use serde::{Deserialize, Serialize};

use crate::{Error, LogSum};

/// Enumeration of turbo decoding schedules
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub enum Scheduling {
    /// Constituents decode one after another, each using the latest extrinsic information of
    /// all others
    #[default]
    Serial,
    /// Constituents decode side by side using the extrinsic information of the previous
    /// iteration, which is then updated for all of them at once
    Parallel,
}

/// Options controlling a decoder
///
/// The options are validated when constructed and cannot be changed afterwards. Options that
/// do not apply to a codec are ignored by it (e.g., `scheduling` for LDPC codes, or
/// `iterations` for convolutional codes).
#[derive(Clone, PartialEq, Debug, Copy, Serialize, Deserialize)]
#[serde(try_from = "RawDecoderOptions")]
pub struct DecoderOptions {
    /// Number of turbo or belief-propagation iterations
    iterations: usize,
    /// Log-domain combination strategy
    log_sum: LogSum,
    /// Turbo decoding schedule
    scheduling: Scheduling,
    /// Whether LDPC decoding stops as soon as all parity checks are satisfied
    early_exit: bool,
    /// Scale factor applied to extrinsic (turbo) or check-to-variable (LDPC) messages
    gain: f64,
}

impl DecoderOptions {
    /// Returns decoder options with the given values.
    ///
    /// # Parameters
    ///
    /// - `iterations`: Number of turbo or belief-propagation iterations. Must be positive.
    ///
    /// - `log_sum`: Log-domain combination strategy. An offset in
    ///   [`LogSum::OffsetMinBox`] must be finite and nonnegative.
    ///
    /// - `scheduling`: Turbo decoding schedule.
    ///
    /// - `early_exit`: Whether LDPC decoding stops as soon as the hard decisions satisfy all
    ///   parity checks.
    ///
    /// - `gain`: Scale factor for extrinsic or check-to-variable messages. Must be in `(0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is outside its accepted range.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::{DecoderOptions, LogSum, Scheduling};
    ///
    /// let options = DecoderOptions::new(8, LogSum::Linear, Scheduling::Serial, false, 1.0)?;
    /// assert_eq!(options.iterations(), 8);
    /// assert!(DecoderOptions::new(0, LogSum::Exact, Scheduling::Serial, false, 1.0).is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(
        iterations: usize,
        log_sum: LogSum,
        scheduling: Scheduling,
        early_exit: bool,
        gain: f64,
    ) -> Result<Self, Error> {
        if iterations == 0 {
            return Err(Error::InvalidConfiguration(
                "Number of iterations must be a positive integer".to_string(),
            ));
        }
        if let LogSum::OffsetMinBox(offset) = log_sum {
            if !offset.is_finite() || offset < 0.0 {
                return Err(Error::InvalidConfiguration(format!(
                    "Min-box offset must be finite and nonnegative (found {offset})"
                )));
            }
        }
        if !(gain > 0.0 && gain <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "Gain must be in the range (0, 1] (found {gain})"
            )));
        }
        Ok(Self {
            iterations,
            log_sum,
            scheduling,
            early_exit,
            gain,
        })
    }

    /// Returns decoder options parsed from a JSON object.
    ///
    /// Fields missing from the object take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, has unknown fields, or holds values outside
    /// their accepted ranges.
    ///
    /// # Examples
    ///
    /// ```
    /// use fec::{DecoderOptions, LogSum};
    ///
    /// let options = DecoderOptions::from_json(r#"{"iterations": 4, "log_sum": "Linear"}"#)?;
    /// assert_eq!(options.iterations(), 4);
    /// assert_eq!(options.log_sum(), LogSum::Linear);
    /// assert!(DecoderOptions::from_json(r#"{"iterations": 4, "colour": "red"}"#).is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfiguration(e.to_string()))
    }

    /// Returns the options as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the number of iterations.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Returns the log-domain combination strategy.
    #[must_use]
    pub fn log_sum(&self) -> LogSum {
        self.log_sum
    }

    /// Returns the turbo decoding schedule.
    #[must_use]
    pub fn scheduling(&self) -> Scheduling {
        self.scheduling
    }

    /// Returns `true` if LDPC decoding stops once all parity checks are satisfied.
    #[must_use]
    pub fn early_exit(&self) -> bool {
        self.early_exit
    }

    /// Returns the message scale factor.
    #[must_use]
    pub fn gain(&self) -> f64 {
        self.gain
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            iterations: 8,
            log_sum: LogSum::Exact,
            scheduling: Scheduling::Serial,
            early_exit: false,
            gain: 1.0,
        }
    }
}

impl std::fmt::Display for DecoderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} decoding, {} iterations",
            self.log_sum, self.iterations
        )
    }
}

/// Unvalidated decoder options, as read from a serialized form
#[derive(Deserialize)]
#[serde(deny_unknown_fields, default)]
struct RawDecoderOptions {
    iterations: usize,
    log_sum: LogSum,
    scheduling: Scheduling,
    early_exit: bool,
    gain: f64,
}

impl Default for RawDecoderOptions {
    fn default() -> Self {
        let options = DecoderOptions::default();
        Self {
            iterations: options.iterations,
            log_sum: options.log_sum,
            scheduling: options.scheduling,
            early_exit: options.early_exit,
            gain: options.gain,
        }
    }
}

impl TryFrom<RawDecoderOptions> for DecoderOptions {
    type Error = Error;

    fn try_from(raw: RawDecoderOptions) -> Result<Self, Error> {
        DecoderOptions::new(
            raw.iterations,
            raw.log_sum,
            raw.scheduling,
            raw.early_exit,
            raw.gain,
        )
    }
}
