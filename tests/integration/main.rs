//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the scripted mock link. All tests run on the host with no
//! Bluetooth adapter required.

mod mock_link;
mod transfer_flow_tests;
