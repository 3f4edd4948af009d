mod client;

pub use client::GhostBusClient;
