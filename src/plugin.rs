//! Poll entry points
//!
//! A plugin runs the commands for one poll, turns the responses into samples
//! and keeps whatever state must survive to the next poll. State is only
//! committed once the whole poll succeeded, so a failed poll is as if it never
//! happened.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::doc;
use tracing::{debug, instrument};

use crate::collector::{CollectResult, StatusSource};
use crate::config::{CollectConfig, MongoOptions, PluginKind, StatusProfile};
use crate::transformer::{db_stats, oplog, replset, server_status, Sample, SampleBatch};
use crate::tracker::TrackerState;

/// One poll per invocation of `read`
#[async_trait]
pub trait ReadPlugin: Send {
    /// collectd plugin name
    fn name(&self) -> &'static str;

    /// Poll once
    ///
    /// On error nothing is returned and plugin state is left as it was.
    async fn read(&mut self) -> CollectResult<Vec<Sample>>;
}

/// Build the plugin selected in the configuration
pub fn build(
    kind: PluginKind,
    source: Arc<dyn StatusSource>,
    options: &MongoOptions,
    collect: &CollectConfig,
) -> Box<dyn ReadPlugin> {
    match kind {
        PluginKind::Mongodb => Box::new(MongoPlugin::new(source, options, collect)),
        PluginKind::Replset => Box::new(ReplSetPlugin::new(source)),
    }
}

/// `mongodb`: server status and per-database statistics
pub struct MongoPlugin {
    source: Arc<dyn StatusSource>,
    port: u16,
    databases: Vec<String>,
    profile: StatusProfile,
    db_stats: bool,
    replication: bool,
    state: TrackerState,
}

impl MongoPlugin {
    pub fn new(source: Arc<dyn StatusSource>, options: &MongoOptions, collect: &CollectConfig) -> Self {
        Self {
            source,
            port: options.port,
            databases: options.databases.clone(),
            profile: collect.profile,
            db_stats: collect.db_stats,
            replication: collect.replication,
            state: TrackerState::new(),
        }
    }

    /// Previous-poll values carried into the next poll
    pub fn state(&self) -> TrackerState {
        self.state
    }

    async fn database_stats(&self, database: &str, batch: &mut SampleBatch) -> CollectResult<()> {
        let instance = db_stats::instance(self.port, database);

        let stats = self.source.run_command(database, doc! { "dbStats": 1 }).await?;
        db_stats::database(&stats, &instance, batch);

        for collection in self.source.list_collection_names(database).await? {
            if collection.starts_with("system.") {
                continue;
            }

            let stats = self
                .source
                .run_command(database, doc! { "collStats": collection.as_str() })
                .await?;
            db_stats::collection(&collection, &stats, &instance, batch);
        }

        Ok(())
    }
}

#[async_trait]
impl ReadPlugin for MongoPlugin {
    fn name(&self) -> &'static str {
        PluginKind::Mongodb.as_str()
    }

    #[instrument(skip(self), fields(plugin = PluginKind::Mongodb.as_str(), port = self.port))]
    async fn read(&mut self) -> CollectResult<Vec<Sample>> {
        let mut batch = SampleBatch::new(self.name());
        let instance = self.port.to_string();

        let status = self
            .source
            .run_command("admin", doc! { "serverStatus": 1 })
            .await?;

        let state = match self.profile {
            StatusProfile::Full => server_status::full(&status, &instance, self.state, &mut batch),
            StatusProfile::Simple => {
                server_status::simple(&status, &instance, &mut batch);
                self.state
            }
        };

        if self.replication {
            replication(self.source.as_ref(), &mut batch).await?;
        }

        if self.db_stats {
            for database in &self.databases {
                self.database_stats(database, &mut batch).await?;
            }
        }

        self.state = state;
        debug!(samples = batch.len(), "Poll complete");
        Ok(batch.into_samples())
    }
}

/// `mongodb_replset`: replica set member status and oplog window
///
/// Replication lag is computed within a single poll, so this plugin keeps no
/// state between polls.
pub struct ReplSetPlugin {
    source: Arc<dyn StatusSource>,
}

impl ReplSetPlugin {
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ReadPlugin for ReplSetPlugin {
    fn name(&self) -> &'static str {
        PluginKind::Replset.as_str()
    }

    #[instrument(skip(self), fields(plugin = PluginKind::Replset.as_str()))]
    async fn read(&mut self) -> CollectResult<Vec<Sample>> {
        let mut batch = SampleBatch::new(self.name());
        replication(self.source.as_ref(), &mut batch).await?;
        debug!(samples = batch.len(), "Poll complete");
        Ok(batch.into_samples())
    }
}

async fn replication(source: &dyn StatusSource, batch: &mut SampleBatch) -> CollectResult<()> {
    let rs_status = source
        .run_command("admin", doc! { "replSetGetStatus": 1 })
        .await?;
    replset::status(&rs_status, batch)?;

    let oplog_stats = source
        .run_command("local", doc! { "collStats": "oplog.rs" })
        .await?;
    oplog::stats(&oplog_stats, batch);

    if let Some(bounds) = source.oplog_bounds().await? {
        oplog::bounds(bounds, batch);
    }

    Ok(())
}
