//! Direct client backend.
//!
//! Constructed from the full resolved endpoint list with credentials and
//! database index passed as construction parameters; there is no separate
//! post-connect handshake. A single endpoint is dialed as a plain client; a
//! multi-host list builds a cluster client. Driver errors are mapped into
//! the adapter's error taxonomy, never thrown through.

use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::Client;
use std::time::Duration;

use keystash_core::{CacheError, Result};

use super::driver::{endpoint_url, Driver};
use crate::dsn::{ConnectionConfig, Credentials, Endpoint, Failover};

#[derive(Clone)]
pub(crate) enum DirectConn {
    Single(MultiplexedConnection),
    Cluster(ClusterConnection),
}

impl ConnectionLike for DirectConn {
    fn req_packed_command<'a>(
        &'a mut self,
        cmd: &'a redis::Cmd,
    ) -> redis::RedisFuture<'a, redis::Value> {
        match self {
            Self::Single(conn) => conn.req_packed_command(cmd),
            Self::Cluster(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a redis::Pipeline,
        offset: usize,
        count: usize,
    ) -> redis::RedisFuture<'a, Vec<redis::Value>> {
        match self {
            Self::Single(conn) => conn.req_packed_commands(cmd, offset, count),
            Self::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            Self::Single(conn) => conn.get_db(),
            Self::Cluster(conn) => conn.get_db(),
        }
    }
}

pub(crate) type DirectTransport = Driver<DirectConn>;

impl Driver<DirectConn> {
    pub(crate) async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let target = config
            .endpoints
            .iter()
            .map(Endpoint::describe)
            .collect::<Vec<_>>()
            .join(",");

        let dial = async {
            if let [endpoint] = config.endpoints.as_slice() {
                let url = endpoint_url(endpoint, config.tls, config.credentials.as_ref(), config.dbindex);
                let client = Client::open(url.as_str())?;
                client
                    .get_multiplexed_async_connection()
                    .await
                    .map(DirectConn::Single)
            } else {
                if config.dbindex != 0 {
                    tracing::warn!(
                        dbindex = config.dbindex,
                        "database selection is not supported on a multi-host direct client"
                    );
                }
                let urls: Vec<String> = config
                    .endpoints
                    .iter()
                    .map(|e| endpoint_url(e, config.tls, None, 0))
                    .collect();
                let mut builder = ClusterClientBuilder::new(urls);
                match &config.credentials {
                    None => {}
                    Some(Credentials::Password(password)) => {
                        builder = builder.password(password.clone());
                    }
                    Some(Credentials::UserPassword { username, password }) => {
                        builder = builder
                            .username(username.clone())
                            .password(password.clone());
                    }
                }
                if matches!(config.failover, Failover::Distribute | Failover::Replicas) {
                    builder = builder.read_from_replicas();
                }
                let client = builder.build()?;
                client.get_async_connection().await.map(DirectConn::Cluster)
            }
        };

        let conn = match config.timeout_secs {
            0 => dial.await,
            secs => tokio::time::timeout(Duration::from_secs(secs), dial)
                .await
                .map_err(|_| {
                    CacheError::invalid(format!(
                        "Cache connection \"{target}\" failed: connect timed out after {secs}s."
                    ))
                })?,
        }
        .map_err(|e| {
            CacheError::invalid(format!("Cache connection \"{target}\" failed: {e}."))
        })?;

        tracing::info!(endpoints = %target, "direct cache transport connected");
        Ok(Driver::new(conn))
    }
}
