//! Calibration of climate model output against an observed baseline.
//!
//! A model's projection is not used directly. Instead the change between the
//! model's own historical run and its projection is applied to the observed
//! baseline, cell by cell:
//!
//! - additive measurements (temperatures, elevation): `b + (p - h)`
//! - multiplicative measurements (precipitation, evapotranspiration):
//!   `b * clamp(p / h, 0, 10)`
//!
//! The model grid is usually much coarser than the baseline, so each baseline
//! cell takes `h` and `p` from the model cell containing its centre.

pub mod delta;
pub mod resample;

pub use delta::{
    apply_delta, calibrate, calibrate_monthly, calibrate_point, ratio, MAX_RATIO, MIN_RATIO,
    NEAR_ZERO,
};
pub use resample::{cell_lookup, resample_nearest};
