//! Docbench drives write and read workloads against a document service and measures throughput
//! and error rate.
//!
//! The heart of the crate is the [`engine`]: a fixed population of [`WorkItem`](engine::WorkItem)s
//! is distributed over a bounded pool of concurrent workers and every outcome is collected until
//! all workers have finished. The surrounding modules generate the [`record`]s that are written,
//! keep the [`record_log`] of confirmed writes that searches are sampled from, and turn a finished
//! run into a [`report`].
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod bench;
pub mod cli;
pub mod config;
pub mod engine;
pub mod http;
pub mod observability;
pub mod record;
pub mod record_log;
pub mod remote;
pub mod report;
