//! Shared test helpers for `syncloop-core` integration tests.
//!
//! Lightweight recording fakes for the core ports, so worker-loop tests can
//! assert on exactly which queue operations ran and how often the handler
//! was called.

#![allow(dead_code)]

pub mod fakes;
