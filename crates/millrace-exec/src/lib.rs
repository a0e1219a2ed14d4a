#![forbid(unsafe_code)]
//! millrace-exec: the single-threaded cooperative pipeline driver.
//!
//! One driver per pipeline; there is no intra-pipeline concurrency.
//! Parallelism comes from running independent drivers over disjoint
//! document slices and recombining their partial aggregates downstream.

pub mod driver;

pub use driver::{CancellationToken, Driver};
