//! Inclusion algorithms.
//!
//! Pure functions producing [`UniverseFrame`]s on the run calendar. Each one
//! decides, per timestamp and instrument, whether the instrument is eligible:
//!
//! - [`range_validity`]: listing/delisting date ranges
//! - [`ranking`]: cross-sectional rank threshold with hysteresis
//! - [`rolling_validity`]: enough observations in a trailing window
//! - [`rolling_correlation_rank_validity`]: drop the worse-ranked member of
//!   every highly correlated pair
//! - [`combine_validity`]: pointwise AND of any number of frames
//!
//! [`UniverseFrame`]: crate::frame::UniverseFrame

pub mod combine;
pub mod correlation;
pub mod hysteresis;
pub mod range;
pub mod ranking;
pub mod rolling;

pub use combine::{and3, combine_validity};
pub use correlation::{pearson, rolling_correlation_rank_validity};
pub use hysteresis::hold_inclusion;
pub use range::{range_validity, ValidityRange};
pub use ranking::{competition_rank, ranking};
pub use rolling::rolling_validity;

use crate::error::{Result, UniverseError};

/// Shared check for percentage parameters.
pub(crate) fn check_fraction(parameter: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(UniverseError::out_of_range(
            parameter,
            format!("{value} must be between 0 and 1"),
        ))
    }
}
