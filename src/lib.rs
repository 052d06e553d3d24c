//! Validated add, update, delete and get commands over blob containers and
//! message queues.
//!
//! Every command checks that its container or queue exists (or not) as the
//! caller expects, normalizes its payload and only then calls the storage
//! backend. Backends sit behind [`blob_store::BlobBackend`] and
//! [`queue_store::QueueBackend`].

pub mod blob;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod existence;
pub mod metrics;
pub mod payload;
pub mod queue;
pub mod return_option;
pub mod tracing;
pub mod utils;

#[cfg(test)]
mod testing;

pub use client::StorageClient;
pub use error::{Result, StorageError};
