//! Savitzky-Golay smoothing over a uniform grid
//!
//! Each output is the value at its own position of a least-squares polynomial
//! fitted over a sliding window of odd size. Interior points use a fixed set
//! of convolution coefficients; the first and last `window / 2` points are
//! evaluated from a polynomial fitted to the first / last full window.
//!
//! Offsets inside the window are normalised to `[-1, 1]` before fitting so
//! that large windows (a day and a half of 15 minute samples is 144 points)
//! stay well conditioned.

use crate::series::{SeriesError, SeriesResult};

/// Pivot magnitude below which the normal equations are treated as singular
const SINGULAR_PIVOT: f64 = 1e-12;

/// Savitzky-Golay filter with precomputed centre coefficients
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    poly_order: usize,
    /// Normal-equation matrix `AᵀA` of the normalised design matrix
    gram: Vec<Vec<f64>>,
    /// Convolution coefficients for the centre of the window
    centre: Vec<f64>,
}

impl SavitzkyGolay {
    /// Create a filter.
    ///
    /// `window` must be odd and positive, `poly_order` must be smaller than
    /// `window`.
    pub fn new(window: usize, poly_order: usize) -> SeriesResult<Self> {
        if window == 0 || window % 2 == 0 {
            return Err(SeriesError::InvalidArgument {
                param: "window",
                details: "window size must be odd and positive",
            });
        }
        if poly_order >= window {
            return Err(SeriesError::InvalidArgument {
                param: "poly_order",
                details: "polynomial order must be less than the window size",
            });
        }

        let mut filter = Self {
            window,
            poly_order,
            gram: Vec::new(),
            centre: Vec::new(),
        };

        let terms = poly_order + 1;
        let mut gram = vec![vec![0.0; terms]; terms];
        for j in 0..window {
            let row = powers(filter.offset(j), poly_order);
            for (m, gram_row) in gram.iter_mut().enumerate() {
                for (k, cell) in gram_row.iter_mut().enumerate() {
                    *cell += row[m] * row[k];
                }
            }
        }
        filter.gram = gram;

        let weights = solve(filter.gram.clone(), powers(0.0, poly_order)).ok_or(
            SeriesError::InvalidArgument {
                param: "poly_order",
                details: "normal equations are singular",
            },
        )?;
        filter.centre = (0..window)
            .map(|j| dot(&powers(filter.offset(j), poly_order), &weights))
            .collect();

        Ok(filter)
    }

    /// Create the filter closest to `(points, poly_order)` that fits a series
    /// of `len` points: the window is clamped to `len` and made odd, the
    /// order is clamped below the window.
    pub fn clamped(points: usize, poly_order: usize, len: usize) -> SeriesResult<Self> {
        let mut window = points.min(len).max(1);
        if window % 2 == 0 {
            window -= 1;
        }
        Self::new(window, poly_order.min(window - 1))
    }

    /// Window size in points
    pub fn window(&self) -> usize {
        self.window
    }

    /// Polynomial order
    pub fn poly_order(&self) -> usize {
        self.poly_order
    }

    /// Normalised offset of window position `j` from the window centre
    fn offset(&self, j: usize) -> f64 {
        let half = self.window / 2;
        (j as f64 - half as f64) / half.max(1) as f64
    }

    /// Smooth `data`.
    ///
    /// An output is `None` when any value its fit depends on is missing.
    /// Data shorter than the window is returned unchanged.
    pub fn apply(&self, data: &[Option<f64>]) -> Vec<Option<f64>> {
        let n = data.len();
        let w = self.window;
        if n < w {
            return data.to_vec();
        }

        let half = w / 2;
        let mut out = vec![None; n];

        for i in half..n - half {
            out[i] = self.convolve(&data[i - half..=i + half]);
        }

        self.fill_edge(&data[..w], &mut out[..half], 0);
        self.fill_edge(&data[n - w..], &mut out[n - half..], w - half);

        out
    }

    fn convolve(&self, window: &[Option<f64>]) -> Option<f64> {
        let mut acc = 0.0;
        for (c, value) in self.centre.iter().zip(window) {
            acc += c * (*value)?;
        }
        Some(acc)
    }

    /// Fit the full `window` and evaluate it at positions
    /// `first_position..first_position + out.len()`
    fn fill_edge(&self, window: &[Option<f64>], out: &mut [Option<f64>], first_position: usize) {
        let values: Option<Vec<f64>> = window.iter().copied().collect();
        let Some(coefficients) = values.and_then(|values| self.fit(&values)) else {
            return;
        };

        for (k, slot) in out.iter_mut().enumerate() {
            let t = self.offset(first_position + k);
            *slot = Some(dot(&powers(t, self.poly_order), &coefficients));
        }
    }

    /// Least-squares polynomial coefficients over one window
    fn fit(&self, values: &[f64]) -> Option<Vec<f64>> {
        let mut rhs = vec![0.0; self.poly_order + 1];
        for (j, value) in values.iter().enumerate() {
            let row = powers(self.offset(j), self.poly_order);
            for (acc, p) in rhs.iter_mut().zip(row) {
                *acc += p * value;
            }
        }
        solve(self.gram.clone(), rhs)
    }
}

fn powers(t: f64, order: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(order + 1);
    let mut p = 1.0;
    for _ in 0..=order {
        row.push(p);
        p *= t;
    }
    row
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solve `matrix * z = rhs` by Gaussian elimination with partial pivoting
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))?;
        if matrix[pivot][col].abs() < SINGULAR_PIVOT {
            return None;
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut z = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * z[k]).sum();
        z[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Some(z)
}
