//! Scheduled and actual bus headways at every stop of a route.
//!
//! Scheduled headways come from timetable visits, gated by the active
//! service windows at each stop. Actual headways come from vehicle position
//! samples: samples become motion intervals, intervals are interpolated to
//! stop-crossing times, and crossings become headways. Both flows end in the
//! same statistics and Average Wait Time.

pub mod config;
pub mod crossing;
pub mod error;
pub mod fetch;
pub mod headways;
pub mod intervals;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod service_windows;
pub mod services;
pub mod stats;

pub use error::{Anomaly, HeadwayError};
