//! Contracts for the external collaborators feeding the two headway flows.
//!
//! Providers are batch-returning: each call delivers everything for its
//! keys or fails. Concrete clients live in the binary's `infra` module.

pub mod pattern_api;
pub mod position_api;
pub mod schedule_api;

pub use pattern_api::PatternProvider;
pub use position_api::{PositionProvider, SampleWindow};
pub use schedule_api::ScheduleProvider;
