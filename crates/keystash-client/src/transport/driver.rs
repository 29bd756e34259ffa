//! Shared data-plane implementation for the real store backends.
//!
//! Both backend client shapes end up holding a cloneable async connection
//! handle; everything past the handshake is identical, so the primitive
//! operations are implemented once over any [`ConnectionLike`] handle.

use async_trait::async_trait;
use redis::aio::ConnectionLike;
use redis::AsyncCommands;
use std::collections::HashMap;

use crate::dsn::{Credentials, Endpoint};

use super::{Transport, TransportResult};

/// Key length enforced by the remote-store backends.
pub(crate) const MAX_KEY_LENGTH: usize = 1024;

/// Render an endpoint as a driver connection URL.
///
/// TLS renders as the secure scheme prefix on the dialed endpoint.
/// Credentials and database index are only embedded for the direct backend;
/// the managed handshake applies them post-connect instead.
pub(crate) fn endpoint_url(
    endpoint: &Endpoint,
    tls: bool,
    credentials: Option<&Credentials>,
    dbindex: u32,
) -> String {
    match endpoint {
        Endpoint::Tcp { host, port, .. } => {
            let scheme = if tls { "rediss" } else { "redis" };
            let userinfo = match credentials {
                None => String::new(),
                Some(Credentials::Password(password)) => format!(":{password}@"),
                Some(Credentials::UserPassword { username, password }) => {
                    format!("{username}:{password}@")
                }
            };
            let db = if dbindex == 0 {
                String::new()
            } else {
                format!("/{dbindex}")
            };
            format!("{scheme}://{userinfo}{host}:{port}{db}")
        }
        Endpoint::Unix { path, .. } => {
            let mut url = format!("redis+unix://{path}");
            let mut separator = '?';
            if dbindex != 0 {
                url.push(separator);
                url.push_str(&format!("db={dbindex}"));
                separator = '&';
            }
            match credentials {
                None => {}
                Some(Credentials::Password(password)) => {
                    url.push(separator);
                    url.push_str(&format!("pass={password}"));
                }
                Some(Credentials::UserPassword { username, password }) => {
                    url.push(separator);
                    url.push_str(&format!("user={username}&pass={password}"));
                }
            }
            url
        }
    }
}

/// Data-plane wrapper around a cloneable driver connection handle.
pub(crate) struct Driver<C> {
    conn: C,
}

impl<C> Driver<C> {
    pub(crate) fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> Transport for Driver<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> TransportResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> TransportResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl_secs: u64) -> TransportResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn unlink(&self, keys: &[String]) -> TransportResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = conn.unlink(keys).await?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> TransportResult<bool> {
        let mut conn = self.conn.clone();
        let present: bool = conn.exists(key).await?;
        Ok(present)
    }

    async fn h_get(&self, key: &str, member: &str) -> TransportResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.hget(key, member).await?;
        Ok(value)
    }

    async fn h_set(&self, key: &str, member: &str, value: &[u8]) -> TransportResult<()> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(key, member, value).await?;
        Ok(())
    }

    async fn h_del(&self, key: &str, member: &str) -> TransportResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.hdel(key, member).await?;
        Ok(removed > 0)
    }

    async fn h_exists(&self, key: &str, member: &str) -> TransportResult<bool> {
        let mut conn = self.conn.clone();
        let present: bool = conn.hexists(key, member).await?;
        Ok(present)
    }

    async fn h_get_all(&self, key: &str) -> TransportResult<Vec<(String, Vec<u8>)>> {
        let mut conn = self.conn.clone();
        let entries: HashMap<String, Vec<u8>> = conn.hgetall(key).await?;
        Ok(entries.into_iter().collect())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> TransportResult<bool> {
        let mut conn = self.conn.clone();
        let applied: bool = conn
            .expire(key, i64::try_from(ttl_secs).unwrap_or(i64::MAX))
            .await?;
        Ok(applied)
    }

    async fn ttl(&self, key: &str) -> TransportResult<i64> {
        let mut conn = self.conn.clone();
        let remaining: i64 = conn.ttl(key).await?;
        Ok(remaining)
    }

    async fn keys(&self, pattern: &str) -> TransportResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    async fn is_connected(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }

    async fn auth(&self, credentials: &Credentials) -> TransportResult<()> {
        let mut cmd = redis::cmd("AUTH");
        match credentials {
            Credentials::Password(password) => {
                cmd.arg(password);
            }
            Credentials::UserPassword { username, password } => {
                cmd.arg(username).arg(password);
            }
        }
        let mut conn = self.conn.clone();
        cmd.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn select(&self, dbindex: u32) -> TransportResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SELECT")
            .arg(dbindex)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    fn max_key_length(&self) -> Option<usize> {
        Some(MAX_KEY_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_url_carries_scheme_and_db() {
        let endpoint = Endpoint::Tcp {
            host: "cache1".into(),
            port: 7000,
            params: vec![],
        };
        assert_eq!(endpoint_url(&endpoint, false, None, 0), "redis://cache1:7000");
        assert_eq!(endpoint_url(&endpoint, true, None, 3), "rediss://cache1:7000/3");
    }

    #[test]
    fn tcp_url_embeds_credentials_for_direct_construction() {
        let endpoint = Endpoint::Tcp {
            host: "cache1".into(),
            port: 6379,
            params: vec![],
        };
        let creds = Credentials::UserPassword {
            username: "app".into(),
            password: "pw".into(),
        };
        assert_eq!(
            endpoint_url(&endpoint, false, Some(&creds), 0),
            "redis://app:pw@cache1:6379"
        );
        let pw_only = Credentials::Password("pw".into());
        assert_eq!(
            endpoint_url(&endpoint, false, Some(&pw_only), 2),
            "redis://:pw@cache1:6379/2"
        );
    }

    #[test]
    fn unix_url_uses_query_parameters() {
        let endpoint = Endpoint::Unix {
            path: "/run/store.sock".into(),
            params: vec![],
        };
        assert_eq!(
            endpoint_url(&endpoint, false, None, 0),
            "redis+unix:///run/store.sock"
        );
        let creds = Credentials::Password("pw".into());
        assert_eq!(
            endpoint_url(&endpoint, false, Some(&creds), 4),
            "redis+unix:///run/store.sock?db=4&pass=pw"
        );
    }
}
