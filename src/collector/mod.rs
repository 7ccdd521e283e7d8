//! MongoDB statistics collection
//!
//! Runs administrative commands against a MongoDB server and hands back the
//! raw response documents.
//!
//! # Example
//!
//! ```ignore
//! use mongo_collectd::collector::{MongoSource, StatusSource};
//! use mongodb::bson::doc;
//!
//! let source = MongoSource::new(&options)?;
//! let status = source.run_command("admin", doc! { "serverStatus": 1 }).await?;
//! ```

mod client;
pub mod document;

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::error::CollectorError;

pub use client::MongoSource;

/// Collector operation result type
pub type CollectResult<T> = Result<T, CollectorError>;

/// First and last oplog entry times, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OplogBounds {
    pub head: u32,
    pub tail: u32,
}

/// Source of command responses
///
/// The production implementation is [`MongoSource`]; tests substitute
/// canned documents.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Run an administrative command against `database`
    async fn run_command(&self, database: &str, command: Document) -> CollectResult<Document>;

    /// Names of the collections in `database`
    async fn list_collection_names(&self, database: &str) -> CollectResult<Vec<String>>;

    /// Oldest and newest `local.oplog.rs` entry times, if the oplog has entries
    async fn oplog_bounds(&self) -> CollectResult<Option<OplogBounds>>;
}

/// Name of a command document (its first key)
pub fn command_name(command: &Document) -> &str {
    command.keys().next().map(String::as_str).unwrap_or("")
}
