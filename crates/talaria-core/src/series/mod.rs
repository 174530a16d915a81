//! Resampling and interpolation engine for sensor time-series
//!
//! A [`Series`] owns two parallel sequences: ordered keys (`x`, typically Unix
//! seconds) and optional values (`y`). It supports:
//!
//! - Sorting by key
//! - Resampling onto a uniform grid ([`Series::make_continuous`])
//! - Savitzky-Golay smoothing of a continuous series
//! - Interpolated point and array lookup with linear or nearest-neighbour modes
//! - In-place scaling and threshold-based discarding of values
//!
//! Missing values are explicit `None` entries. NaN is never used as a marker
//! inside the engine.
//!
//! # Examples
//!
//! ```
//! use talaria_core::series::{Interpolation, Resolution, Series};
//!
//! let mut series = Series::new(vec![20.0, 0.0, 10.0], vec![10.0, 0.0, 5.0])?;
//! series.sort();
//! assert_eq!(series.lookup(5.0, Interpolation::Linear)?, Some(2.5));
//!
//! series.make_continuous(Resolution::Count(4))?;
//! assert_eq!(series.len(), 4);
//! # Ok::<(), talaria_core::series::SeriesError>(())
//! ```

use log::debug;
use thiserror::Error;

mod interpolation;

pub use interpolation::Interpolation;

use crate::smoothing::SavitzkyGolay;
use crate::source::{Channel, SensorReading};

/// Values above this are treated as sensor faults by [`Series::discard_above`]
pub const DEFAULT_DISCARD_THRESHOLD: f64 = 600_000_000.0;

/// Error types for series operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    /// A parameter was outside its accepted range
    #[error("Invalid argument `{param}`: {details}")]
    InvalidArgument {
        /// Name of the offending parameter
        param: &'static str,
        /// What was wrong with it
        details: &'static str,
    },

    /// The series is not in the state the operation requires
    #[error("Series must be {required} before {operation}")]
    InvalidState {
        /// Required state ("sorted" or "continuous")
        required: &'static str,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Unknown interpolation mode name
    #[error("Unknown interpolation mode \"{mode}\"")]
    UnsupportedMode {
        /// The rejected name
        mode: String,
    },

    /// The series has no data points
    #[error("Series has no data points")]
    NoData,
}

/// Result type for series operations
pub type SeriesResult<T> = Result<T, SeriesError>;

/// Target grid for [`Series::make_continuous`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Number of points spread over the key range
    Count(usize),
    /// Spacing between consecutive keys
    Step(f64),
}

/// Smoothing window size for [`Series::smooth`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Window {
    /// Window size in points
    Points(usize),
    /// Window size in key units, converted using the grid step
    Duration(f64),
}

/// Ordered key/value time-series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    x: Vec<f64>,
    y: Vec<Option<f64>>,
    sorted: bool,
    /// Grid spacing once the series has been made continuous
    step: Option<f64>,
}

impl Series {
    /// Create an unsorted series from parallel keys and values
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> SeriesResult<Self> {
        Self::from_options(x, y.into_iter().map(Some).collect())
    }

    /// Create an unsorted series whose values may be missing
    pub fn from_options(x: Vec<f64>, y: Vec<Option<f64>>) -> SeriesResult<Self> {
        if x.len() != y.len() {
            return Err(SeriesError::InvalidArgument {
                param: "y",
                details: "keys and values must have the same length",
            });
        }

        Ok(Self {
            x,
            y,
            sorted: false,
            step: None,
        })
    }

    /// Build an unsorted series from source readings, keyed by Unix seconds
    pub fn from_readings(readings: &[SensorReading], channel: Channel) -> Self {
        Self {
            x: readings.iter().map(SensorReading::unix_seconds).collect(),
            y: readings.iter().map(|r| Some(r.value(channel))).collect(),
            sorted: false,
            step: None,
        }
    }

    /// Crate-internal constructor used by the codec
    pub(crate) fn from_parts(x: Vec<f64>, y: Vec<Option<f64>>, sorted: bool) -> Self {
        Self {
            x,
            y,
            sorted,
            step: None,
        }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Check if the series has no points
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Keys
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Values (`None` marks a missing value)
    pub fn y(&self) -> &[Option<f64>] {
        &self.y
    }

    /// First key, if any
    pub fn first_x(&self) -> Option<f64> {
        self.x.first().copied()
    }

    /// Last key, if any
    pub fn last_x(&self) -> Option<f64> {
        self.x.last().copied()
    }

    /// Whether keys are known to be non-decreasing
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Whether the series lies on a uniform grid
    pub fn is_continuous(&self) -> bool {
        self.step.is_some()
    }

    /// Grid spacing of a continuous series
    pub fn step(&self) -> Option<f64> {
        self.step
    }

    fn require_sorted(&self, operation: &'static str) -> SeriesResult<()> {
        if self.sorted {
            Ok(())
        } else {
            Err(SeriesError::InvalidState {
                required: "sorted",
                operation,
            })
        }
    }

    /// Reorder points by ascending key
    pub fn sort(&mut self) {
        let mut order: Vec<usize> = (0..self.x.len()).collect();
        order.sort_unstable_by(|&i, &j| self.x[i].total_cmp(&self.x[j]));

        self.x = order.iter().map(|&i| self.x[i]).collect();
        self.y = order.iter().map(|&i| self.y[i]).collect();
        self.sorted = true;
    }

    /// Resample onto a uniform grid starting at the first key.
    ///
    /// Each new value is the linear lookup of the grid key on the current
    /// series, so this both fills gaps and changes the sampling rate. The
    /// grid covers `[x[0], x[last])`.
    pub fn make_continuous(&mut self, resolution: Resolution) -> SeriesResult<()> {
        match resolution {
            Resolution::Count(n) if n <= 1 => {
                return Err(SeriesError::InvalidArgument {
                    param: "count",
                    details: "point count must be greater than 1",
                });
            }
            Resolution::Step(p) if !(p.is_finite() && p > 0.0) => {
                return Err(SeriesError::InvalidArgument {
                    param: "step",
                    details: "step must be finite and positive",
                });
            }
            _ => {}
        }

        self.require_sorted("resampling")?;
        let (start, end) = match (self.first_x(), self.last_x()) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(SeriesError::NoData),
        };

        let span = end - start;
        let (count, step) = match resolution {
            Resolution::Count(n) => (n, span / n as f64),
            Resolution::Step(p) => (((span / p) as usize).max(1), p),
        };

        let new_x: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
        let new_y = new_x
            .iter()
            .map(|&v| interpolation::evaluate(&self.x, &self.y, v, Interpolation::Linear))
            .collect();

        debug!(
            "Resampled series: {} -> {} points (step {})",
            self.x.len(),
            count,
            step
        );

        self.x = new_x;
        self.y = new_y;
        self.step = Some(step);
        Ok(())
    }

    /// Evaluate the series at `v`
    ///
    /// Keys outside the series range are not rejected: the search settles on
    /// the first or last pair of points and the interpolation formula is
    /// applied to that pair.
    pub fn lookup(&self, v: f64, mode: Interpolation) -> SeriesResult<Option<f64>> {
        self.require_sorted("lookup")?;
        if self.is_empty() {
            return Err(SeriesError::NoData);
        }

        Ok(interpolation::evaluate(&self.x, &self.y, v, mode))
    }

    /// Evaluate the series at each key in `values`
    pub fn lookup_many(&self, values: &[f64], mode: Interpolation) -> SeriesResult<Vec<Option<f64>>> {
        self.require_sorted("lookup")?;
        if self.is_empty() {
            return Err(SeriesError::NoData);
        }

        Ok(values
            .iter()
            .map(|&v| interpolation::evaluate(&self.x, &self.y, v, mode))
            .collect())
    }

    /// Mark every value above `threshold` as missing.
    ///
    /// Returns the number of values discarded.
    pub fn discard_above(&mut self, threshold: f64) -> usize {
        let mut discarded = 0;
        for value in self.y.iter_mut() {
            if value.is_some_and(|v| v > threshold) {
                *value = None;
                discarded += 1;
            }
        }
        discarded
    }

    /// Apply a Savitzky-Golay filter to the values of a continuous series.
    ///
    /// The window is clamped to the series length and made odd; the
    /// polynomial order is clamped below the window size. Series with fewer
    /// than 2 points are left untouched.
    pub fn smooth(&mut self, window: Window, poly_order: usize) -> SeriesResult<()> {
        let Some(step) = self.step else {
            return Err(SeriesError::InvalidState {
                required: "continuous",
                operation: "smoothing",
            });
        };

        if self.len() < 2 {
            return Ok(());
        }

        let points = match window {
            Window::Points(n) => n,
            Window::Duration(secs) if step > 0.0 => (secs / step) as usize,
            Window::Duration(_) => self.len(),
        };

        let filter = SavitzkyGolay::clamped(points, poly_order, self.len())?;
        debug!(
            "Smoothing {} points (window {}, order {})",
            self.len(),
            filter.window(),
            filter.poly_order()
        );
        self.y = filter.apply(&self.y);
        Ok(())
    }

    /// Divide every value by `divisor`
    pub fn scale(&mut self, divisor: f64) -> SeriesResult<()> {
        if divisor == 0.0 || !divisor.is_finite() {
            return Err(SeriesError::InvalidArgument {
                param: "divisor",
                details: "divisor must be finite and non-zero",
            });
        }

        for value in self.y.iter_mut().flatten() {
            *value /= divisor;
        }
        Ok(())
    }

    /// Independent copy of keys and values
    pub fn snapshot(&self) -> (Vec<f64>, Vec<Option<f64>>) {
        (self.x.clone(), self.y.clone())
    }

    /// Drop the backing buffers and reset all flags
    pub fn release(&mut self) {
        self.x = Vec::new();
        self.y = Vec::new();
        self.sorted = false;
        self.step = None;
    }
}
