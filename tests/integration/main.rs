//! Integration test binary: all pipeline integration tests in one crate.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod helpers;

mod config_wiring;
mod job_lifecycle;
mod scenarios;
