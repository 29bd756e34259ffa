//! In-memory transport.
//!
//! Implements the full primitive surface over a process-local map with lazy
//! TTL eviction. Used by the test suites and handy for local development;
//! it enforces no key-length limit. Fault toggles let tests exercise the
//! degraded paths (failed writes, failed expiry) that a live store only
//! produces under load.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::dsn::Credentials;

use super::{Transport, TransportError, TransportResult};

#[derive(Debug, Clone)]
enum Stored {
    Flat(Vec<u8>),
    Table(HashMap<String, Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Stored,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local transport with native-style TTL behavior.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    entries: Mutex<HashMap<String, Entry>>,
    fail_writes: AtomicBool,
    fail_expire: AtomicBool,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write primitive report failure.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the expire primitive report failure.
    pub fn fail_expire(&self, fail: bool) {
        self.fail_expire.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> TransportResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| TransportError("memory transport lock poisoned".to_string()))
    }

    fn check_writes(&self) -> TransportResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError("simulated write failure".to_string()));
        }
        Ok(())
    }

    fn purge(entries: &mut HashMap<String, Entry>, key: &str) {
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.expired(now)) {
            entries.remove(key);
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get(&self, key: &str) -> TransportResult<Option<Vec<u8>>> {
        let mut entries = self.lock()?;
        Self::purge(&mut entries, key);
        Ok(entries.get(key).and_then(|e| match &e.value {
            Stored::Flat(bytes) => Some(bytes.clone()),
            Stored::Table(_) => None,
        }))
    }

    async fn set(&self, key: &str, value: &[u8]) -> TransportResult<()> {
        self.check_writes()?;
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Stored::Flat(value.to_vec()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl_secs: u64) -> TransportResult<()> {
        self.check_writes()?;
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Stored::Flat(value.to_vec()),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn unlink(&self, keys: &[String]) -> TransportResult<u64> {
        self.check_writes()?;
        let mut entries = self.lock()?;
        let mut removed = 0;
        for key in keys {
            Self::purge(&mut entries, key);
            if entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> TransportResult<bool> {
        let mut entries = self.lock()?;
        Self::purge(&mut entries, key);
        Ok(entries.contains_key(key))
    }

    async fn h_get(&self, key: &str, member: &str) -> TransportResult<Option<Vec<u8>>> {
        let mut entries = self.lock()?;
        Self::purge(&mut entries, key);
        Ok(entries.get(key).and_then(|e| match &e.value {
            Stored::Table(table) => table.get(member).cloned(),
            Stored::Flat(_) => None,
        }))
    }

    async fn h_set(&self, key: &str, member: &str, value: &[u8]) -> TransportResult<()> {
        self.check_writes()?;
        let mut entries = self.lock()?;
        Self::purge(&mut entries, key);
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Stored::Table(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Stored::Table(table) => {
                table.insert(member.to_string(), value.to_vec());
                Ok(())
            }
            Stored::Flat(_) => Err(TransportError(
                "value at key holds the wrong kind".to_string(),
            )),
        }
    }

    async fn h_del(&self, key: &str, member: &str) -> TransportResult<bool> {
        self.check_writes()?;
        let mut entries = self.lock()?;
        Self::purge(&mut entries, key);
        let Some(entry) = entries.get_mut(key) else {
            return Ok(false);
        };
        let removed = match &mut entry.value {
            Stored::Table(table) => table.remove(member).is_some(),
            Stored::Flat(_) => false,
        };
        if let Stored::Table(table) = &entry.value {
            if table.is_empty() {
                entries.remove(key);
            }
        }
        Ok(removed)
    }

    async fn h_exists(&self, key: &str, member: &str) -> TransportResult<bool> {
        let mut entries = self.lock()?;
        Self::purge(&mut entries, key);
        Ok(entries.get(key).is_some_and(|e| match &e.value {
            Stored::Table(table) => table.contains_key(member),
            Stored::Flat(_) => false,
        }))
    }

    async fn h_get_all(&self, key: &str) -> TransportResult<Vec<(String, Vec<u8>)>> {
        let mut entries = self.lock()?;
        Self::purge(&mut entries, key);
        Ok(entries.get(key).map_or_else(Vec::new, |e| match &e.value {
            Stored::Table(table) => table
                .iter()
                .map(|(m, v)| (m.clone(), v.clone()))
                .collect(),
            Stored::Flat(_) => Vec::new(),
        }))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> TransportResult<bool> {
        if self.fail_expire.load(Ordering::SeqCst) {
            return Err(TransportError("simulated expire failure".to_string()));
        }
        let mut entries = self.lock()?;
        Self::purge(&mut entries, key);
        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> TransportResult<i64> {
        let mut entries = self.lock()?;
        Self::purge(&mut entries, key);
        let Some(entry) = entries.get(key) else {
            return Ok(-2);
        };
        Ok(entry.expires_at.map_or(-1, |at| {
            let remaining = at.saturating_duration_since(Instant::now());
            let secs = remaining.as_secs();
            let secs = if remaining.subsec_nanos() > 0 { secs + 1 } else { secs };
            i64::try_from(secs).unwrap_or(i64::MAX)
        }))
    }

    async fn keys(&self, pattern: &str) -> TransportResult<Vec<String>> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        entries.retain(|_, e| !e.expired(now));
        Ok(entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn auth(&self, _credentials: &Credentials) -> TransportResult<()> {
        Ok(())
    }

    async fn select(&self, _dbindex: u32) -> TransportResult<()> {
        Ok(())
    }

    fn max_key_length(&self) -> Option<usize> {
        None
    }
}

/// Store-style glob match supporting `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let (mut star_p, mut star_t) = (usize::MAX, 0);
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star_p = p;
            star_t = t;
            p += 1;
        } else if star_p != usize::MAX {
            p = star_p + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn flat_roundtrip_and_unlink() {
        block_on(async {
            let transport = MemoryTransport::new();
            transport.set("k", b"v").await.unwrap();
            assert_eq!(transport.get("k").await.unwrap(), Some(b"v".to_vec()));
            assert!(transport.exists("k").await.unwrap());
            assert_eq!(transport.unlink(&["k".to_string()]).await.unwrap(), 1);
            assert!(!transport.exists("k").await.unwrap());
        });
    }

    #[test]
    fn ttl_reports_store_conventions() {
        block_on(async {
            let transport = MemoryTransport::new();
            assert_eq!(transport.ttl("missing").await.unwrap(), -2);
            transport.set("eternal", b"v").await.unwrap();
            assert_eq!(transport.ttl("eternal").await.unwrap(), -1);
            transport.set_with_expiry("mortal", b"v", 60).await.unwrap();
            let remaining = transport.ttl("mortal").await.unwrap();
            assert!((1..=60).contains(&remaining));
        });
    }

    #[test]
    fn table_members_are_independent() {
        block_on(async {
            let transport = MemoryTransport::new();
            transport.h_set("t", "a", b"1").await.unwrap();
            transport.h_set("t", "b", b"2").await.unwrap();
            assert!(transport.h_exists("t", "a").await.unwrap());
            assert_eq!(transport.h_get("t", "b").await.unwrap(), Some(b"2".to_vec()));
            assert!(transport.h_del("t", "a").await.unwrap());
            assert!(!transport.h_exists("t", "a").await.unwrap());
            assert_eq!(transport.h_get_all("t").await.unwrap().len(), 1);
        });
    }

    #[test]
    fn glob_matches_store_patterns() {
        assert!(glob_match("app:*", "app:user.1"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("app:*", "other:user.1"));
        assert!(!glob_match("a?c", "ac"));
    }

    #[test]
    fn fault_toggles_fail_primitives() {
        block_on(async {
            let transport = MemoryTransport::new();
            transport.fail_writes(true);
            assert!(transport.set("k", b"v").await.is_err());
            transport.fail_writes(false);
            transport.set("k", b"v").await.unwrap();
            transport.fail_expire(true);
            assert!(transport.expire("k", 5).await.is_err());
        });
    }
}
