//! NumPy-like reductions over matrices holding `NaN` sentinels.

use nalgebra::DMatrix;

use crate::{Error, Result};

/// Equivalent of `np.ma.masked_invalid(matrix).compressed()`.
///
/// Returns the finite entries in column-major order.
pub fn finite_values(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix.iter().copied().filter(|x| x.is_finite()).collect()
}

/// Maximum over finite entries, `None` if there are none.
pub fn nanmax(matrix: &DMatrix<f64>) -> Option<f64> {
    matrix
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(None, |acc, x| Some(acc.map_or(x, |a: f64| a.max(x))))
}

/// Minimum over finite entries, `None` if there are none.
pub fn nanmin(matrix: &DMatrix<f64>) -> Option<f64> {
    matrix
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(None, |acc, x| Some(acc.map_or(x, |a: f64| a.min(x))))
}

/// Equivalent of `np.percentile(values, q)` with the default linear method.
///
/// # Arguments
/// * `values` - Finite values (order does not matter)
/// * `q` - Percentile in `[0, 100]`
///
/// # Returns
/// `None` for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> Result<Option<f64>> {
    if !(0.0..=100.0).contains(&q) {
        return Err(Error::InvalidConfig(format!(
            "percentile must be within [0, 100], got {}",
            q
        )));
    }
    if values.is_empty() {
        return Ok(None);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Ok(Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction))
}
