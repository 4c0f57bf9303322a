#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Statistics over normalized daily series.
//!
//! * [`reference`]: per-month percentile curves from a historical window
//! * [`calendar`]: gap-aware daily calendars joined with a curve
//! * [`composite`]: standardized or normalized averages of station groups
//! * [`distribution`]: the parametric fits behind the curves

pub mod calendar;
pub mod composite;
pub mod distribution;
pub mod reference;

pub use calendar::{LeapDay, align, align_with};
pub use composite::{CompositeStrategy, combine};
pub use distribution::{DistributionModel, FittedDistribution};
pub use reference::{
    InsufficientHistory, ReferenceOutcome, StatsError, compute_reference_curve, select_window,
};
