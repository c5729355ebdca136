//! Waveform descriptors and signal-table synthesis.
//!
//! ## Main Structures and Enumerations:
//!
//! - `WaveKind`: An enumeration of the supported waveform shapes: `CONST`,
//!   `SINE`, `RAMP` and `SQUARE`.
//!
//! - `WaveSpec`: A general waveform description composed of a kind
//!   (`WaveKind`) and a set of arguments (`WaveArgs`). Convenience
//!   constructors exist per kind, and [`WaveSpec::eval_inplace`] populates a
//!   sample buffer with one full period of the shape.
//!
//! - `SignalTable`: One precomputed period of samples with a cyclic cursor
//!   and a completed-cycle counter. The analog-output generator emits one
//!   table entry per tick, so synthesis cost is paid once up front.
//!
//! ## Utilities:
//!
//! - The `WaveArgs` type alias provides a convenient way to define waveform
//!   arguments using a dictionary with string keys and float values; the
//!   module uses the `maplit` crate for terse hashmap construction.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;

use maplit::hashmap;
use ndarray::Array1;

use crate::error::{Error, Result};

/// Type alias for waveform arguments: a dictionary with key-value pairs of
/// string (argument name) and float (value)
pub type WaveArgs = HashMap<String, f64>;

/// Enum type for the supported waveform shapes.
#[derive(Clone, PartialEq)]
pub enum WaveKind {
    CONST,
    SINE,
    RAMP,
    SQUARE,
}

impl fmt::Display for WaveKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                WaveKind::CONST => "CONST",
                WaveKind::SINE => "SINE",
                WaveKind::RAMP => "RAMP",
                WaveKind::SQUARE => "SQUARE",
            }
        )
    }
}

/// Struct for a general waveform description, consisting of kind and
/// arguments.
///
/// Every kind expects a `period` argument giving the table length in
/// samples. Behavior of the remaining keys is defined in
/// [`WaveSpec::eval_inplace`]:
///
/// 1. `WaveKind::CONST`: `offset` (default `0.0`)
/// 2. `WaveKind::SINE`: `amplitude` (default `1.0`), `offset` (default `0.0`)
/// 3. `WaveKind::RAMP`: same as `SINE`
/// 4. `WaveKind::SQUARE`: same as `SINE`
#[derive(Clone, PartialEq)]
pub struct WaveSpec {
    pub kind: WaveKind,
    pub args: WaveArgs,
}

impl WaveSpec {
    /// Constructs a `WaveSpec` object.
    ///
    /// This is the foundational constructor upon which the per-kind wrappers
    /// are built. It ensures the `args` dictionary contains the required
    /// `period` key; a missing key will cause a panic.
    pub fn new(kind: WaveKind, args: WaveArgs) -> Self {
        if !args.contains_key("period") {
            panic!("Expected wave kind {} to contain key period", kind)
        }
        WaveSpec { kind, args }
    }

    pub fn new_const(offset: f64, period: usize) -> WaveSpec {
        WaveSpec::new(
            WaveKind::CONST,
            hashmap! {
                "period".to_string() => period as f64,
                "offset".to_string() => offset,
            },
        )
    }

    pub fn new_sine(period: usize, amplitude: Option<f64>, offset: Option<f64>) -> WaveSpec {
        WaveSpec::new(WaveKind::SINE, Self::shape_args(period, amplitude, offset))
    }

    pub fn new_ramp(period: usize, amplitude: Option<f64>, offset: Option<f64>) -> WaveSpec {
        WaveSpec::new(WaveKind::RAMP, Self::shape_args(period, amplitude, offset))
    }

    pub fn new_square(period: usize, amplitude: Option<f64>, offset: Option<f64>) -> WaveSpec {
        WaveSpec::new(
            WaveKind::SQUARE,
            Self::shape_args(period, amplitude, offset),
        )
    }

    fn shape_args(period: usize, amplitude: Option<f64>, offset: Option<f64>) -> WaveArgs {
        let mut args: WaveArgs = hashmap! {"period".to_string() => period as f64};
        // For each optional argument, if specified, insert into dictionary
        [("amplitude", amplitude), ("offset", offset)]
            .iter()
            .for_each(|(key, opt_value)| {
                if let Some(value) = *opt_value {
                    args.insert(key.to_string(), value);
                }
            });
        args
    }

    /// Evaluates one period of the waveform into the given buffer.
    ///
    /// The buffer length is the period; entry `i` receives the sample at
    /// table position `i`:
    ///
    /// - `CONST`: `offset`
    /// - `SINE`: `offset + amplitude * sin(2π·i/period)`
    /// - `RAMP`: `offset + amplitude * i/period`
    /// - `SQUARE`: `offset + amplitude` for the first half period,
    ///   `offset - amplitude` for the second
    pub fn eval_inplace(&self, arr: &mut ndarray::ArrayViewMut1<f64>) {
        let period = arr.len() as f64;
        // Default values can be set by default with unwrap_or
        let amplitude = *self.args.get("amplitude").unwrap_or(&1.0);
        let offset = *self.args.get("offset").unwrap_or(&0.0);

        match self.kind {
            WaveKind::CONST => arr.fill(offset),
            WaveKind::SINE => {
                for (i, v) in arr.iter_mut().enumerate() {
                    *v = offset + amplitude * (2.0 * PI * i as f64 / period).sin();
                }
            }
            WaveKind::RAMP => {
                for (i, v) in arr.iter_mut().enumerate() {
                    *v = offset + amplitude * (i as f64 / period);
                }
            }
            WaveKind::SQUARE => {
                let half = arr.len() / 2;
                for (i, v) in arr.iter_mut().enumerate() {
                    *v = if i < half {
                        offset + amplitude
                    } else {
                        offset - amplitude
                    };
                }
            }
        }
    }
}

impl fmt::Display for WaveSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let args_string = self
            .args
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "[{}, {{{}}}]", self.kind, args_string)
    }
}

/// One precomputed waveform period with a cyclic read cursor.
pub struct SignalTable {
    values: Array1<f64>,
    index: usize,
    cycles: usize,
}

impl SignalTable {
    /// Synthesizes a table from a waveform description.
    ///
    /// The `period` argument must round to a positive sample count,
    /// otherwise [`Error::InvalidParameter`] is returned.
    pub fn from_spec(spec: &WaveSpec) -> Result<Self> {
        let period = *spec.args.get("period").unwrap();
        let rounded = period.round();
        if !rounded.is_finite() || rounded < 1.0 {
            return Err(Error::InvalidParameter(format!(
                "waveform period must be a positive sample count, got {}",
                period
            )));
        }
        let mut values = Array1::zeros(rounded as usize);
        spec.eval_inplace(&mut values.view_mut());
        Ok(Self {
            values,
            index: 0,
            cycles: 0,
        })
    }

    /// Wraps a caller-supplied sample array, e.g. loaded from a file by the
    /// front end.
    pub fn from_values(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InvalidParameter(
                "custom signal table must not be empty".to_string(),
            ));
        }
        Ok(Self {
            values: Array1::from_vec(values),
            index: 0,
            cycles: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Number of complete periods emitted so far.
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Fractional number of periods emitted so far, e.g. `1.5` after one
    /// full period plus half of the next.
    pub fn progress(&self) -> f64 {
        self.cycles as f64 + self.index as f64 / self.values.len() as f64
    }

    /// Returns the sample under the cursor and advances it, counting a cycle
    /// each time the cursor wraps.
    pub fn next_value(&mut self) -> f64 {
        let value = self.values[self.index];
        self.index = (self.index + 1) % self.values.len();
        if self.index == 0 {
            self.cycles += 1;
        }
        value
    }

    /// Rewinds the cursor and clears the cycle counter.
    pub fn reset(&mut self) {
        self.index = 0;
        self.cycles = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_table_matches_closed_form() {
        let spec = WaveSpec::new_sine(4, Some(1.0), Some(1.0));
        let table = SignalTable::from_spec(&spec).unwrap();
        let expected = [1.0, 2.0, 1.0, 0.0];
        for (value, want) in table.values().iter().zip(expected) {
            assert!((value - want).abs() < 1e-9, "got {}, want {}", value, want);
        }
    }

    #[test]
    fn ramp_rises_from_offset() {
        let spec = WaveSpec::new_ramp(4, Some(2.0), Some(1.0));
        let table = SignalTable::from_spec(&spec).unwrap();
        let expected = [1.0, 1.5, 2.0, 2.5];
        for (value, want) in table.values().iter().zip(expected) {
            assert!((value - want).abs() < 1e-9);
        }
    }

    #[test]
    fn square_splits_period_in_halves() {
        let spec = WaveSpec::new_square(4, Some(1.0), Some(2.0));
        let table = SignalTable::from_spec(&spec).unwrap();
        assert_eq!(table.values().to_vec(), vec![3.0, 3.0, 1.0, 1.0]);
    }

    #[test]
    fn const_fills_offset() {
        let table = SignalTable::from_spec(&WaveSpec::new_const(1.5, 3)).unwrap();
        assert_eq!(table.values().to_vec(), vec![1.5, 1.5, 1.5]);
    }

    #[test]
    fn cursor_cycles_and_counts() {
        let mut table = SignalTable::from_values(vec![1.0, 2.0, 3.0]).unwrap();
        let emitted: Vec<f64> = (0..6).map(|_| table.next_value()).collect();
        assert_eq!(emitted, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        assert_eq!(table.cycles(), 2);
        assert_eq!(table.progress(), 2.0);
        table.reset();
        assert_eq!(table.cycles(), 0);
        assert_eq!(table.next_value(), 1.0);
        assert!((table.progress() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_period_is_rejected() {
        let spec = WaveSpec::new(
            WaveKind::SINE,
            hashmap! {"period".to_string() => 0.0},
        );
        assert!(matches!(
            SignalTable::from_spec(&spec),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_custom_table_is_rejected() {
        assert!(matches!(
            SignalTable::from_values(Vec::new()),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    #[should_panic(expected = "Expected wave kind SINE to contain key period")]
    fn missing_period_panics() {
        WaveSpec::new(WaveKind::SINE, WaveArgs::new());
    }
}
