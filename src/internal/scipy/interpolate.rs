//! SciPy interpolation port.
//!
//! Ported from scipy.interpolate.splrep / splev for the interpolating case
//! (`s = 0`, `k = 3`), which yields the not-a-knot cubic spline.
//! License: BSD 3-Clause (SciPy Developers)

use crate::{Error, Result};

/// Interpolating spline through a set of samples.
///
/// Stored as second derivatives ("moments") at the knots. The degree drops
/// with the number of samples: cubic from four, quadratic for three, linear
/// for two.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    moments: Vec<f64>,
}

impl CubicSpline {
    /// Fit the spline.
    ///
    /// # Arguments
    /// * `x` - Knots, finite and strictly increasing
    /// * `y` - Sample values, one per knot
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::InvalidInput(format!(
                "spline needs as many values as knots, got {} and {}",
                y.len(),
                x.len()
            )));
        }
        if x.len() < 2 {
            return Err(Error::InvalidInput("spline needs at least 2 knots".to_string()));
        }
        if x.iter().any(|v| !v.is_finite()) || x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidInput(
                "spline knots must be finite and strictly increasing".to_string(),
            ));
        }

        let moments = match x.len() {
            2 => vec![0.0; 2],
            3 => {
                let (h0, h1) = (x[1] - x[0], x[2] - x[1]);
                let (d0, d1) = ((y[1] - y[0]) / h0, (y[2] - y[1]) / h1);
                vec![2.0 * (d1 - d0) / (h0 + h1); 3]
            }
            _ => not_a_knot_moments(x, y),
        };

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            moments,
        })
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        let (i, h, a, b) = self.locate(t);
        let (m0, m1) = (self.moments[i], self.moments[i + 1]);
        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (self.y[i] / h - m0 * h / 6.0) * a
            + (self.y[i + 1] / h - m1 * h / 6.0) * b
    }

    /// First derivative at `t`.
    pub fn derivative(&self, t: f64) -> f64 {
        let (i, h, a, b) = self.locate(t);
        let (m0, m1) = (self.moments[i], self.moments[i + 1]);
        -m0 * a * a / (2.0 * h) + m1 * b * b / (2.0 * h) - (self.y[i] / h - m0 * h / 6.0)
            + (self.y[i + 1] / h - m1 * h / 6.0)
    }

    /// Second derivative at `t`.
    pub fn second_derivative(&self, t: f64) -> f64 {
        let (i, h, a, b) = self.locate(t);
        (self.moments[i] * a + self.moments[i + 1] * b) / h
    }

    /// Interval index, its width and the distances to both of its ends.
    /// Points outside the knots use the nearest interval.
    fn locate(&self, t: f64) -> (usize, f64, f64, f64) {
        let last = self.x.len() - 2;
        let i = self.x.partition_point(|&v| v <= t).saturating_sub(1).min(last);
        let h = self.x[i + 1] - self.x[i];
        (i, h, self.x[i + 1] - t, t - self.x[i])
    }
}

/// Moments of the not-a-knot spline, four knots or more.
///
/// The not-a-knot conditions give the two end moments in terms of their
/// neighbours; substituting them leaves a tridiagonal system over the inner
/// moments.
fn not_a_knot_moments(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let slope: Vec<f64> = (0..n - 1).map(|i| (y[i + 1] - y[i]) / h[i]).collect();

    // Row r solves for moment r + 1
    let m = n - 2;
    let mut sub = vec![0.0; m];
    let mut diag = vec![0.0; m];
    let mut sup = vec![0.0; m];
    let mut rhs = vec![0.0; m];
    for r in 0..m {
        let i = r + 1;
        sub[r] = h[i - 1];
        diag[r] = 2.0 * (h[i - 1] + h[i]);
        sup[r] = h[i];
        rhs[r] = 6.0 * (slope[i] - slope[i - 1]);
    }
    diag[0] += h[0] * (h[0] + h[1]) / h[1];
    sup[0] -= h[0] * h[0] / h[1];
    diag[m - 1] += h[n - 2] * (h[n - 3] + h[n - 2]) / h[n - 3];
    sub[m - 1] -= h[n - 2] * h[n - 2] / h[n - 3];

    // Thomas algorithm
    for r in 1..m {
        let w = sub[r] / diag[r - 1];
        diag[r] -= w * sup[r - 1];
        rhs[r] -= w * rhs[r - 1];
    }
    let mut inner = vec![0.0; m];
    inner[m - 1] = rhs[m - 1] / diag[m - 1];
    for r in (0..m - 1).rev() {
        inner[r] = (rhs[r] - sup[r] * inner[r + 1]) / diag[r];
    }

    let first = ((h[0] + h[1]) * inner[0] - h[0] * inner[1]) / h[1];
    let last = ((h[n - 3] + h[n - 2]) * inner[m - 1] - h[n - 2] * inner[m - 2]) / h[n - 3];

    let mut moments = Vec::with_capacity(n);
    moments.push(first);
    moments.extend(inner);
    moments.push(last);
    moments
}
