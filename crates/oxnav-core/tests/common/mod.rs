//! Common test utilities for navigator integration tests.

#![allow(dead_code)]

pub mod harness;

pub use harness::{LocalNavigator, MemoryNavigator, init_tracing};
