//! SciPy functions port.
//!
//! Ported from:
//! - scipy.optimize
//! - scipy.interpolate
//!
//! License: BSD 3-Clause (SciPy Developers)

mod interpolate;
mod optimize;

pub use interpolate::*;
pub use optimize::*;
