//! Managed single-node backend.
//!
//! Dials only the *first* resolved endpoint, even when the DSN produced a
//! multi-host list. The handshake runs through the transport primitives
//! after the socket is up: ping, then `AUTH` when credentials were
//! captured, then `SELECT` for a non-zero database index. Any handshake
//! failure surfaces as `InvalidArgument` carrying the driver error text.

use redis::aio::{ConnectionManager, ConnectionLike, MultiplexedConnection};
use redis::Client;
use std::time::Duration;

use keystash_core::{CacheError, Result};

use super::driver::{endpoint_url, Driver};
use super::Transport;
use crate::dsn::ConnectionConfig;

/// One multiplexed connection; the persistent flag selects the
/// auto-reconnecting managed handle over a one-shot connection.
#[derive(Clone)]
pub(crate) enum ManagedConn {
    Persistent(ConnectionManager),
    Transient(MultiplexedConnection),
}

impl ConnectionLike for ManagedConn {
    fn req_packed_command<'a>(
        &'a mut self,
        cmd: &'a redis::Cmd,
    ) -> redis::RedisFuture<'a, redis::Value> {
        match self {
            Self::Persistent(conn) => conn.req_packed_command(cmd),
            Self::Transient(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a redis::Pipeline,
        offset: usize,
        count: usize,
    ) -> redis::RedisFuture<'a, Vec<redis::Value>> {
        match self {
            Self::Persistent(conn) => conn.req_packed_commands(cmd, offset, count),
            Self::Transient(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            Self::Persistent(conn) => conn.get_db(),
            Self::Transient(conn) => conn.get_db(),
        }
    }
}

pub(crate) type ManagedTransport = Driver<ManagedConn>;

impl Driver<ManagedConn> {
    pub(crate) async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let endpoint = config
            .endpoints
            .first()
            .ok_or_else(|| CacheError::invalid("Cache connection failed: no endpoint resolved."))?;
        let target = endpoint.describe();
        let url = endpoint_url(endpoint, config.tls, None, 0);
        let client = Client::open(url.as_str()).map_err(|e| handshake_error(&target, &e))?;

        let dial = async {
            if config.persistent || config.persistent_id.is_some() {
                ConnectionManager::new(client)
                    .await
                    .map(ManagedConn::Persistent)
            } else {
                client
                    .get_multiplexed_async_connection()
                    .await
                    .map(ManagedConn::Transient)
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
        .map_err(|e| handshake_error(&target, &e))?;

        let transport = Driver::new(conn);
        if !transport.is_connected().await {
            return Err(CacheError::invalid(format!(
                "Cache connection \"{target}\" failed: ping unanswered."
            )));
        }
        if let Some(credentials) = &config.credentials {
            transport
                .auth(credentials)
                .await
                .map_err(|e| handshake_error(&target, &e))?;
        }
        if config.dbindex != 0 {
            transport
                .select(config.dbindex)
                .await
                .map_err(|e| handshake_error(&target, &e))?;
        }
        tracing::info!(
            endpoint = %target,
            persistent = config.persistent,
            "managed cache transport connected"
        );
        Ok(transport)
    }
}

fn handshake_error(target: &str, err: &dyn std::fmt::Display) -> CacheError {
    CacheError::invalid(format!("Cache connection \"{target}\" failed: {err}."))
}
