//! Concrete clients for the upstream feeds.

pub mod bustracker;
pub mod ghostbuses;
pub mod timetable;
