//! quadop — fan-out/fan-in arithmetic job coordinator.
//!
//! One submitted job decomposes into four concurrent sub-operations (add,
//! subtract, multiply, divide); their outcomes are aggregated into a single
//! terminal status with monotonically advancing progress.

pub mod api;
pub mod compute;
pub mod config;
pub mod error;
pub mod job;
pub mod store;
