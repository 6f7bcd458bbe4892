//! Integration test suite entry point.

mod control_loop_tests;
mod discovery_tests;
mod warm_start_tests;
