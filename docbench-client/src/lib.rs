//! # Docbench Client
//!
//! An asynchronous client for document services that speak the Elasticsearch REST dialect. It
//! covers exactly what the benchmark harness needs: provisioning an index, writing documents one
//! by one or in bulk, counting exact term matches and flushing.
//!
//! A [`Client`] is cheap to clone and safe to share between many concurrent tasks, all requests go
//! through one pooled [`reqwest::Client`].
//!
//! ## Usage
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use docbench_client::{Client, Index};
//!
//! #[tokio::main]
//! # async fn main() -> docbench_client::Result<()> {
//!     let client = Client::builder("http://localhost:9200/").build()?;
//!     let index = Index::new("bench");
//!
//!     let document = BTreeMap::from([("data0", "hello")]);
//!     let id = client.create(&index, "some-id", &document).await?;
//!     let hits = client.count_term(&index, "data0", "hello").await?;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod admin;
mod bulk;
mod client;
mod create;
mod error;
mod search;

pub use admin::*;
pub use bulk::*;
pub use client::*;
pub use error::*;

#[cfg(test)]
mod tests;
