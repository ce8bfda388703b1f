//! Internal modules ported from external libraries.
//!
//! These modules contain code adapted from:
//! - scipy: Linear sum assignment, interpolating splines
//! - numpy: Masked reductions and percentiles

pub mod scipy;
pub mod numpy;
