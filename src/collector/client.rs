//! MongoDB driver-backed status source
//!
//! One pooled client per process, connected directly to the configured
//! member so a secondary reports its own statistics.

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::Client;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{command_name, CollectResult, OplogBounds, StatusSource};
use crate::config::MongoOptions;
use crate::error::CollectorError;

/// Status source backed by the official MongoDB driver
#[derive(Clone)]
pub struct MongoSource {
    client: Client,
    address: String,
}

impl MongoSource {
    /// Create a source for the configured server
    ///
    /// The driver connects lazily; connection failures surface on the first
    /// command of each poll.
    pub fn new(options: &MongoOptions) -> CollectResult<Self> {
        let client = Client::with_options(Self::client_options(options))?;

        Ok(Self {
            client,
            address: format!("{}:{}", options.host, options.port),
        })
    }

    /// `host:port` of the monitored server
    pub fn address(&self) -> &str {
        &self.address
    }

    fn client_options(options: &MongoOptions) -> ClientOptions {
        let timeout = Duration::from_millis(options.timeout_ms);

        let mut client_options = ClientOptions::default();
        client_options.hosts = vec![ServerAddress::Tcp {
            host: options.host.clone(),
            port: Some(options.port),
        }];
        client_options.direct_connection = Some(true);
        client_options.connect_timeout = Some(timeout);
        client_options.server_selection_timeout = Some(timeout);
        client_options.app_name = Some(format!("mongo-collectd/{}", env!("CARGO_PKG_VERSION")));

        if let (Some(user), Some(password)) = (&options.user, &options.password) {
            let mut credential = Credential::default();
            credential.username = Some(user.clone());
            credential.password = Some(password.clone());
            credential.source = Some("admin".to_string());
            client_options.credential = Some(credential);
        }

        client_options
    }
}

#[async_trait]
impl StatusSource for MongoSource {
    #[instrument(skip(self, command), fields(address = %self.address, command = command_name(&command)))]
    async fn run_command(&self, database: &str, command: Document) -> CollectResult<Document> {
        let name = command_name(&command).to_string();

        debug!(database = %database, "Running command");

        self.client
            .database(database)
            .run_command(command)
            .await
            .map_err(|source| CollectorError::Command {
                command: name,
                database: database.to_string(),
                source,
            })
    }

    #[instrument(skip(self), fields(address = %self.address))]
    async fn list_collection_names(&self, database: &str) -> CollectResult<Vec<String>> {
        self.client
            .database(database)
            .list_collection_names()
            .filter(doc! { "type": "collection" })
            .await
            .map_err(|source| CollectorError::Command {
                command: "listCollections".to_string(),
                database: database.to_string(),
                source,
            })
    }

    #[instrument(skip(self), fields(address = %self.address))]
    async fn oplog_bounds(&self) -> CollectResult<Option<OplogBounds>> {
        let oplog = self
            .client
            .database("local")
            .collection::<Document>("oplog.rs");

        let head = oplog
            .find_one(doc! {})
            .sort(doc! { "$natural": 1 })
            .await?;
        let tail = oplog
            .find_one(doc! {})
            .sort(doc! { "$natural": -1 })
            .await?;

        let (head, tail) = match (head, tail) {
            (Some(head), Some(tail)) => (head, tail),
            _ => return Ok(None),
        };

        let ts = |entry: &Document| {
            entry
                .get_timestamp("ts")
                .map(|ts| ts.time)
                .map_err(|_| CollectorError::UnexpectedType {
                    field: "oplog.rs.ts".to_string(),
                    expected: "timestamp".to_string(),
                })
        };

        Ok(Some(OplogBounds {
            head: ts(&head)?,
            tail: ts(&tail)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_options_without_auth() {
        let options = MongoOptions::default();
        let client_options = MongoSource::client_options(&options);

        assert_eq!(client_options.hosts.len(), 1);
        assert_eq!(client_options.direct_connection, Some(true));
        assert_eq!(client_options.connect_timeout, Some(Duration::from_millis(5000)));
        assert!(client_options.credential.is_none());
    }

    #[test]
    fn test_client_options_with_auth() {
        let options = MongoOptions {
            user: Some("monitor".to_string()),
            password: Some("secret".to_string()),
            ..MongoOptions::default()
        };
        let client_options = MongoSource::client_options(&options);

        let credential = client_options.credential.expect("credential set");
        assert_eq!(credential.username.as_deref(), Some("monitor"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
    }

    #[test]
    fn test_user_without_password_skips_auth() {
        let options = MongoOptions {
            user: Some("monitor".to_string()),
            ..MongoOptions::default()
        };
        assert!(MongoSource::client_options(&options).credential.is_none());
    }

    #[tokio::test]
    async fn test_source_new_is_lazy() {
        let source = MongoSource::new(&MongoOptions::default());
        assert!(source.is_ok());
        assert_eq!(source.unwrap().address(), "127.0.0.1:27017");
    }
}
