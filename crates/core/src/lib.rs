#![forbid(unsafe_code)]

//! Shared models and pure logic for the pipeline harness: trigger naming and
//! response decoding, watcher policy, configuration and golden comparison.

pub mod config;
pub mod diff;
pub mod golden;
pub mod model;
pub mod response;
pub mod watch;

pub use config::*;
pub use golden::{compare_scan, compare_scan_at, compare_stages, GoldenError, SONAR_SCAN_GOLDEN};
pub use model::*;
pub use response::{parse_trigger_response, ResponseError};
pub use watch::*;
