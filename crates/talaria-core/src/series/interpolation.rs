//! Interpolated lookup over sorted series keys
//!
//! Provides the bracketing binary search and the linear / nearest-neighbour
//! evaluation used by [`Series::lookup`](super::Series::lookup).

use core::fmt;
use core::str::FromStr;

use super::SeriesError;

/// Interpolation mode used when a query falls between two keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Straight line between the bracketing points
    #[default]
    Linear,
    /// Value of the closer bracketing point (ties resolve to the lower key)
    Nearest,
}

impl Interpolation {
    /// Name accepted by [`FromStr`]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Nearest => "nearest",
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interpolation {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("linear") {
            Ok(Self::Linear)
        } else if s.eq_ignore_ascii_case("nearest") {
            Ok(Self::Nearest)
        } else {
            Err(SeriesError::UnsupportedMode { mode: s.into() })
        }
    }
}

/// Outcome of the bracketing search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Bracket {
    /// The query equals the key at this index
    Exact(usize),
    /// The query lies between (or beyond) these two adjacent indices
    Between(usize, usize),
}

/// Narrow `[0, len - 1]` down to the adjacent pair bracketing `v`.
///
/// Queries outside the key range converge on the first or last pair.
/// Requires `x.len() >= 2`.
pub(super) fn bracket(x: &[f64], v: f64) -> Bracket {
    let mut a = 0;
    let mut b = x.len() - 1;

    while a != b - 1 {
        let c = (b - a) / 2 + a;
        if x[c] == v {
            return Bracket::Exact(c);
        } else if x[c] < v {
            a = c;
        } else {
            b = c;
        }
    }

    if x[a] == v {
        Bracket::Exact(a)
    } else if x[b] == v {
        Bracket::Exact(b)
    } else {
        Bracket::Between(a, b)
    }
}

/// Evaluate the series described by `x` / `y` at `v`.
///
/// Returns `None` when the value(s) needed for the result are missing or
/// when `v` is NaN. `x` must be sorted and non-empty.
pub(super) fn evaluate(
    x: &[f64],
    y: &[Option<f64>],
    v: f64,
    mode: Interpolation,
) -> Option<f64> {
    if v.is_nan() {
        return None;
    }

    if x.len() == 1 {
        return y[0];
    }

    match bracket(x, v) {
        Bracket::Exact(index) => y[index],
        Bracket::Between(a, b) => match mode {
            Interpolation::Nearest => {
                let d_a = v - x[a];
                let d_b = x[b] - v;
                if d_b < d_a { y[b] } else { y[a] }
            }
            Interpolation::Linear => {
                let (x_a, x_b) = (x[a], x[b]);
                if x_a == x_b {
                    return y[b];
                }
                let (y_a, y_b) = (y[a]?, y[b]?);
                let t = (v - x_a) / (x_b - x_a);
                Some((y_b - y_a) * t + y_a)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("linear".parse::<Interpolation>().unwrap(), Interpolation::Linear);
        assert_eq!("Nearest".parse::<Interpolation>().unwrap(), Interpolation::Nearest);
        assert_eq!(Interpolation::default(), Interpolation::Linear);
    }

    #[test]
    fn test_parse_unknown_mode() {
        let err = "cubic".parse::<Interpolation>().unwrap_err();
        assert_eq!(
            err,
            SeriesError::UnsupportedMode {
                mode: "cubic".into()
            }
        );
    }

    #[test]
    fn test_bracket_exact_and_between() {
        let x = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(bracket(&x, 20.0), Bracket::Exact(2));
        assert_eq!(bracket(&x, 0.0), Bracket::Exact(0));
        assert_eq!(bracket(&x, 40.0), Bracket::Exact(4));
        assert_eq!(bracket(&x, 25.0), Bracket::Between(2, 3));
        assert_eq!(bracket(&x, 5.0), Bracket::Between(0, 1));
    }

    #[test]
    fn test_bracket_clamps_out_of_range() {
        let x = [0.0, 10.0, 20.0];
        assert_eq!(bracket(&x, -50.0), Bracket::Between(0, 1));
        assert_eq!(bracket(&x, 99.0), Bracket::Between(1, 2));
    }

    #[test]
    fn test_evaluate_missing_neighbour() {
        let x = [0.0, 10.0, 20.0];
        let y = [Some(0.0), None, Some(10.0)];
        assert_eq!(evaluate(&x, &y, 5.0, Interpolation::Linear), None);
        assert_eq!(evaluate(&x, &y, 1.0, Interpolation::Nearest), Some(0.0));
        assert_eq!(evaluate(&x, &y, f64::NAN, Interpolation::Linear), None);
    }

    #[test]
    fn test_evaluate_degenerate_bracket() {
        let x = [0.0, 0.0];
        let y = [Some(1.0), Some(2.0)];
        // Zero-width bracket resolves to the upper value.
        assert_eq!(evaluate(&x, &y, 3.0, Interpolation::Linear), Some(2.0));
    }
}
