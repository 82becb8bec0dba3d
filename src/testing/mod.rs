//! Testing utilities for the routing fabric.
//!
//! Provides a recording event listener, service-advertisement factories,
//! and a one-call partition-service constructor, plus the integration test
//! suites for multi-instance partition assignment and the queue fabric.

mod partition_integration_tests;
mod utils;

pub use utils::{
    isolated_service_info, partition_service_for, service_info, RecordingEventListener,
};
