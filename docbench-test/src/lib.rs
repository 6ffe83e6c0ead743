//! Test utilities for docbench and its client.
//!
//! This crate provides utilities to facilitate testing against a document service without running
//! a real cluster. See the modules for all available utilities.

pub mod server;
pub mod tracing;
