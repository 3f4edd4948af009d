mod client;

pub use client::BusTrackerClient;
