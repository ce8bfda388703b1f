//! NumPy functions port.
//!
//! Ported from:
//! - numpy.ma (masked_invalid / compressed)
//! - numpy.nanmax, numpy.nanmin
//! - numpy.percentile (linear interpolation)

mod array;

pub use array::*;
