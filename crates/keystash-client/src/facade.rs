//! Public adapter facade.
//!
//! [`StashClient`] owns the transport handle and composes DSN resolution,
//! key validation, lifetime normalization and the typed accessor into the
//! caller-facing operations: typed flat reads, table (hash) member
//! operations, lifetime management and namespace-scoped maintenance.
//!
//! One logical transport handle per client; operations are single awaited
//! round trips with no internal locking, retry or pipelining. Callers that
//! share a client across tasks provide their own synchronization.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;

use keystash_core::{
    CacheError, CacheValue, KeyValidator, Lifetime, Result, TypedRead, ValueKind,
};

use crate::dsn::{self, Options, SerializerMode};
use crate::serializer::{JsonSerializer, Serializer};
use crate::transport::{self, Transport};

/// Typed caching client over a remote key/value and hash-table store.
pub struct StashClient {
    origin: Option<(String, Options)>,
    transport: Arc<dyn Transport>,
    serializer: Option<Arc<dyn Serializer>>,
    validator: KeyValidator,
    default_lifetime: Option<u64>,
}

impl StashClient {
    /// Resolve `dsn` plus `overlay`, perform the backend handshake and
    /// build a client.
    pub async fn connect(
        dsn: &str,
        overlay: Options,
        namespace: &str,
        default_lifetime: Lifetime,
    ) -> Result<Self> {
        let config = dsn::resolve(dsn, &overlay)?;
        let transport: Arc<dyn Transport> = Arc::from(transport::connect(&config).await?);
        let serializer = serializer_for(config.serializer);
        Self::assemble(
            Some((dsn.to_string(), overlay)),
            transport,
            serializer,
            namespace,
            default_lifetime,
        )
    }

    /// Build a client over an injected transport. Used by the test suites
    /// and for process-local caching via the memory transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        namespace: &str,
        default_lifetime: Lifetime,
    ) -> Result<Self> {
        Self::assemble(None, transport, None, namespace, default_lifetime)
    }

    fn assemble(
        origin: Option<(String, Options)>,
        transport: Arc<dyn Transport>,
        serializer: Option<Arc<dyn Serializer>>,
        namespace: &str,
        default_lifetime: Lifetime,
    ) -> Result<Self> {
        let mut validator = KeyValidator::new(transport.max_key_length());
        validator.set_namespace(namespace)?;
        Ok(Self {
            origin,
            transport,
            serializer,
            validator,
            default_lifetime: default_lifetime.normalize(None),
        })
    }

    /// Discard the transport handle and rebuild it from the stored DSN and
    /// overlay. Namespace and default lifetime are preserved.
    pub async fn reconnect(&mut self) -> Result<()> {
        let Some((dsn, overlay)) = self.origin.clone() else {
            return Err(CacheError::invalid(
                "Cannot reconnect a client built from an injected transport.",
            ));
        };
        let config = dsn::resolve(&dsn, &overlay)?;
        let transport: Arc<dyn Transport> = Arc::from(transport::connect(&config).await?);
        if self.serializer.is_none() {
            self.serializer = serializer_for(config.serializer);
        }
        self.transport = transport;
        tracing::info!("cache client reconnected");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    /// Key prefix of this instance, including the trailing separator.
    pub fn namespace(&self) -> &str {
        self.validator.namespace()
    }

    pub fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        self.validator.set_namespace(namespace)
    }

    /// Default lifetime in seconds applied when an operation passes
    /// [`Lifetime::Default`], or `None` for persistent storage.
    pub fn default_lifetime(&self) -> Option<u64> {
        self.default_lifetime
    }

    pub fn set_default_lifetime(&mut self, lifetime: Lifetime) {
        self.default_lifetime = lifetime.normalize(None);
    }

    /// Install the serializer used for structured values.
    pub fn set_serializer(&mut self, serializer: Arc<dyn Serializer>) {
        self.serializer = Some(serializer);
    }

    // =========================================================================
    // FLAT READS
    // =========================================================================

    /// Fetch a value without a type constraint. The stored text passes
    /// through unchanged.
    pub async fn get(&self, key: &str) -> Result<CacheValue> {
        self.read(key, None, TypedRead::new(ValueKind::Mixed, None)?)
            .await
    }

    /// Like [`Self::get`], returning `default` when the key is absent. The
    /// requested type is inferred from the default.
    pub async fn get_or(
        &self,
        key: &str,
        default: impl Into<CacheValue> + Send,
    ) -> Result<CacheValue> {
        self.read(
            key,
            None,
            TypedRead::new(ValueKind::Mixed, Some(default.into()))?,
        )
        .await
    }

    pub async fn get_bool(&self, key: &str) -> Result<bool> {
        expect_bool(
            self.read(key, None, TypedRead::new(ValueKind::Bool, None)?)
                .await?,
        )
    }

    pub async fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        expect_bool(
            self.read(
                key,
                None,
                TypedRead::new(ValueKind::Bool, Some(default.into()))?,
            )
            .await?,
        )
    }

    pub async fn get_int(&self, key: &str) -> Result<i64> {
        expect_int(
            self.read(key, None, TypedRead::new(ValueKind::Int, None)?)
                .await?,
        )
    }

    pub async fn get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        expect_int(
            self.read(
                key,
                None,
                TypedRead::new(ValueKind::Int, Some(default.into()))?,
            )
            .await?,
        )
    }

    pub async fn get_float(&self, key: &str) -> Result<f64> {
        expect_float(
            self.read(key, None, TypedRead::new(ValueKind::Float, None)?)
                .await?,
        )
    }

    pub async fn get_float_or(&self, key: &str, default: f64) -> Result<f64> {
        expect_float(
            self.read(
                key,
                None,
                TypedRead::new(ValueKind::Float, Some(default.into()))?,
            )
            .await?,
        )
    }

    pub async fn get_string(&self, key: &str) -> Result<String> {
        expect_string(
            self.read(key, None, TypedRead::new(ValueKind::String, None)?)
                .await?,
        )
    }

    pub async fn get_string_or(&self, key: &str, default: &str) -> Result<String> {
        expect_string(
            self.read(
                key,
                None,
                TypedRead::new(ValueKind::String, Some(default.into()))?,
            )
            .await?,
        )
    }

    /// Fetch a structured list value through the serializer.
    pub async fn get_array(&self, key: &str) -> Result<Vec<Json>> {
        expect_array(
            self.read(key, None, TypedRead::new(ValueKind::Array, None)?)
                .await?,
        )
    }

    pub async fn get_array_or(&self, key: &str, default: Vec<Json>) -> Result<Vec<Json>> {
        expect_array(
            self.read(
                key,
                None,
                TypedRead::new(ValueKind::Array, Some(CacheValue::Array(default)))?,
            )
            .await?,
        )
    }

    /// Fetch a structured value and constrain it to `T`. A stored value of
    /// a different shape fails with `InvalidArgument`.
    pub async fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .read(key, None, TypedRead::new(ValueKind::Object, None)?)
            .await?;
        constrain_object(key, value)
    }

    /// Like [`Self::get_object`], but an absent key *or* a stored value
    /// that does not match `T` returns `default` instead of failing.
    pub async fn get_object_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        let placeholder = CacheValue::Object(Json::Null);
        let value = self
            .read(key, None, TypedRead::new(ValueKind::Object, Some(placeholder))?)
            .await?;
        match value {
            CacheValue::Object(Json::Null) => Ok(default),
            CacheValue::Object(json) => Ok(serde_json::from_value(json).unwrap_or(default)),
            _ => Ok(default),
        }
    }

    // =========================================================================
    // FLAT WRITES
    // =========================================================================

    /// Persist a value under `key`, optionally with a lifetime.
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<CacheValue> + Send,
        lifetime: Lifetime,
    ) -> Result<()> {
        let value = value.into();
        let wire_key = self.validator.validate(key, true)?;
        let ttl = lifetime.normalize(self.default_lifetime);
        let payload = self.encode(key, &value)?;
        let written = match ttl {
            Some(secs) => {
                self.transport
                    .set_with_expiry(&wire_key, &payload, secs)
                    .await
            }
            None => self.transport.set(&wire_key, &payload).await,
        };
        written.map_err(|e| {
            tracing::warn!(key, error = %e, "cache write failed");
            CacheError::write_failed(key, None)
        })
    }

    /// Serialize `value` and persist it under `key`.
    pub async fn set_object<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        lifetime: Lifetime,
    ) -> Result<()> {
        let json = serde_json::to_value(value).map_err(|e| {
            CacheError::invalid(format!("Value for key \"{key}\" failed to encode: {e}."))
        })?;
        self.set(key, CacheValue::Object(json), lifetime).await
    }

    /// Remove `key`. Returns `true` when the key existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let wire_key = self.validator.validate(key, true)?;
        let removed = self.transport.unlink(&[wire_key]).await.map_err(|e| {
            tracing::warn!(key, error = %e, "cache delete failed");
            CacheError::write_failed(key, None)
        })?;
        Ok(removed == 1)
    }

    pub async fn has(&self, key: &str) -> Result<bool> {
        let wire_key = self.validator.validate(key, true)?;
        self.transport
            .exists(&wire_key)
            .await
            .map_err(CacheError::transport)
    }

    // =========================================================================
    // TABLE (HASH) OPERATIONS
    // =========================================================================

    /// Fetch a member from a table without a type constraint.
    pub async fn get_item(&self, key: &str, member: &str) -> Result<CacheValue> {
        self.read(key, Some(member), TypedRead::new(ValueKind::Mixed, None)?)
            .await
    }

    pub async fn get_item_or(
        &self,
        key: &str,
        member: &str,
        default: impl Into<CacheValue> + Send,
    ) -> Result<CacheValue> {
        self.read(
            key,
            Some(member),
            TypedRead::new(ValueKind::Mixed, Some(default.into()))?,
        )
        .await
    }

    pub async fn get_item_object<T: DeserializeOwned>(&self, key: &str, member: &str) -> Result<T> {
        let value = self
            .read(key, Some(member), TypedRead::new(ValueKind::Object, None)?)
            .await?;
        constrain_object(key, value)
    }

    pub async fn get_item_object_or<T: DeserializeOwned>(
        &self,
        key: &str,
        member: &str,
        default: T,
    ) -> Result<T> {
        let placeholder = CacheValue::Object(Json::Null);
        let value = self
            .read(
                key,
                Some(member),
                TypedRead::new(ValueKind::Object, Some(placeholder))?,
            )
            .await?;
        match value {
            CacheValue::Object(Json::Null) => Ok(default),
            CacheValue::Object(json) => Ok(serde_json::from_value(json).unwrap_or(default)),
            _ => Ok(default),
        }
    }

    /// Persist a member into a table.
    ///
    /// Members share one expiry on the table key, so a requested lifetime
    /// applies to the whole table. When applying it fails, the member
    /// written here is rolled back before the error is surfaced.
    pub async fn set_item(
        &self,
        key: &str,
        member: &str,
        value: impl Into<CacheValue> + Send,
        lifetime: Lifetime,
    ) -> Result<()> {
        let value = value.into();
        let wire_key = self.validator.validate(key, true)?;
        let wire_member = self.validator.validate(member, false)?;
        let ttl = lifetime.normalize(self.default_lifetime);
        let payload = self.encode(key, &value)?;
        self.transport
            .h_set(&wire_key, &wire_member, &payload)
            .await
            .map_err(|e| {
                tracing::warn!(key, member, error = %e, "cache member write failed");
                CacheError::write_failed(key, Some(member))
            })?;
        let Some(secs) = ttl else {
            return Ok(());
        };
        match self.transport.expire(&wire_key, secs).await {
            Ok(true) => Ok(()),
            outcome => {
                if let Err(e) = &outcome {
                    tracing::warn!(key, member, error = %e, "table expiry failed");
                }
                if let Err(e) = self.transport.h_del(&wire_key, &wire_member).await {
                    tracing::warn!(key, member, error = %e, "rollback delete failed");
                }
                Err(CacheError::write_failed(key, Some(member)))
            }
        }
    }

    /// Serialize `value` and persist it as a table member.
    pub async fn set_item_object<T: Serialize + Sync>(
        &self,
        key: &str,
        member: &str,
        value: &T,
        lifetime: Lifetime,
    ) -> Result<()> {
        let json = serde_json::to_value(value).map_err(|e| {
            CacheError::invalid(format!("Value for key \"{key}\" failed to encode: {e}."))
        })?;
        self.set_item(key, member, CacheValue::Object(json), lifetime)
            .await
    }

    /// Remove a member from a table. Returns `true` when it existed.
    pub async fn delete_item(&self, key: &str, member: &str) -> Result<bool> {
        let wire_key = self.validator.validate(key, true)?;
        let wire_member = self.validator.validate(member, false)?;
        self.transport
            .h_del(&wire_key, &wire_member)
            .await
            .map_err(|e| {
                tracing::warn!(key, member, error = %e, "cache member delete failed");
                CacheError::write_failed(key, Some(member))
            })
    }

    pub async fn has_item(&self, key: &str, member: &str) -> Result<bool> {
        let wire_key = self.validator.validate(key, true)?;
        let wire_member = self.validator.validate(member, false)?;
        self.transport
            .h_exists(&wire_key, &wire_member)
            .await
            .map_err(CacheError::transport)
    }

    /// Fetch a whole table, members sorted by member key.
    pub async fn get_table(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let wire_key = self.validator.validate(key, true)?;
        let entries = self
            .transport
            .h_get_all(&wire_key)
            .await
            .map_err(CacheError::transport)?;
        if entries.is_empty() {
            return Err(CacheError::not_found(key, None));
        }
        entries
            .into_iter()
            .map(|(member, raw)| {
                String::from_utf8(raw).map(|text| (member, text)).map_err(|_| {
                    CacheError::invalid(format!(
                        "Stored member in table \"{key}\" is not valid UTF-8."
                    ))
                })
            })
            .collect()
    }

    // =========================================================================
    // LIFETIME OPERATIONS
    // =========================================================================

    /// Remaining lifetime of `key` in seconds, or `None` for no expiry.
    pub async fn get_lifetime(&self, key: &str) -> Result<Option<u64>> {
        let wire_key = self.validator.validate(key, true)?;
        match self
            .transport
            .ttl(&wire_key)
            .await
            .map_err(CacheError::transport)?
        {
            -2 => Err(CacheError::not_found(key, None)),
            t if t < 0 => Ok(None),
            t => Ok(Some(t.unsigned_abs())),
        }
    }

    /// Set or reset the lifetime of `key`. Returns `false` when the key
    /// does not exist or no positive lifetime resolved.
    pub async fn set_lifetime(&self, key: &str, lifetime: Lifetime) -> Result<bool> {
        let wire_key = self.validator.validate(key, true)?;
        match lifetime.normalize(self.default_lifetime) {
            Some(secs) => self.transport.expire(&wire_key, secs).await.map_err(|e| {
                tracing::warn!(key, error = %e, "expiry update failed");
                CacheError::write_failed(key, None)
            }),
            None => Ok(false),
        }
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// List keys in this namespace matching a store-style glob pattern,
    /// returned with the namespace stripped.
    pub async fn get_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let namespaced = format!("{}{pattern}", self.validator.namespace());
        let keys = self
            .transport
            .keys(&namespaced)
            .await
            .map_err(CacheError::transport)?;
        let prefix = self.validator.namespace();
        Ok(keys
            .iter()
            .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
            .collect())
    }

    /// Wipe every key in this namespace. Returns `true` when nothing
    /// remains afterwards.
    pub async fn clear(&self) -> Result<bool> {
        let pattern = format!("{}*", self.validator.namespace());
        let keys = self
            .transport
            .keys(&pattern)
            .await
            .map_err(CacheError::transport)?;
        if !keys.is_empty() {
            self.transport.unlink(&keys).await.map_err(|e| {
                tracing::warn!(error = %e, "cache clear failed");
                CacheError::write_failed(pattern.clone(), None)
            })?;
        }
        let residue = self
            .transport
            .keys(&pattern)
            .await
            .map_err(CacheError::transport)?;
        if residue.is_empty() {
            Ok(true)
        } else {
            tracing::warn!(count = residue.len(), "cache clear left residual keys");
            Ok(false)
        }
    }

    // =========================================================================
    // TYPED ACCESSOR CORE
    // =========================================================================

    /// Validate, check existence, fetch and decode. Validation failures
    /// surface before any transport round trip; an absent key or member
    /// resolves to the request default or `NotFound`.
    async fn read(&self, key: &str, member: Option<&str>, read: TypedRead) -> Result<CacheValue> {
        let Some(raw) = self.fetch_raw(key, member).await? else {
            return read
                .into_default()
                .ok_or_else(|| CacheError::not_found(key, member));
        };
        self.decode(key, read, &raw)
    }

    async fn fetch_raw(&self, key: &str, member: Option<&str>) -> Result<Option<Vec<u8>>> {
        let wire_key = self.validator.validate(key, true)?;
        let wire_member = match member {
            Some(m) => Some(self.validator.validate(m, false)?),
            None => None,
        };
        let present = match &wire_member {
            Some(m) => self.transport.h_exists(&wire_key, m).await,
            None => self.transport.exists(&wire_key).await,
        }
        .map_err(CacheError::transport)?;
        if !present {
            tracing::debug!(key, member, "cache miss");
            return Ok(None);
        }
        match &wire_member {
            Some(m) => self.transport.h_get(&wire_key, m).await,
            None => self.transport.get(&wire_key).await,
        }
        .map_err(CacheError::transport)
    }

    fn decode(&self, key: &str, read: TypedRead, raw: &[u8]) -> Result<CacheValue> {
        if !read.kind().is_structured() {
            return CacheValue::parse_wire(read.kind(), raw);
        }
        let serializer = self.serializer()?;
        let json = serializer.decode(raw).map_err(|e| {
            CacheError::invalid(format!(
                "Stored value for key \"{key}\" failed to decode: {e}."
            ))
        })?;
        match (read.kind(), json) {
            (ValueKind::Array, Json::Array(items)) => Ok(CacheValue::Array(items)),
            (ValueKind::Object, json @ Json::Object(_)) => Ok(CacheValue::Object(json)),
            (kind, _) => match read.into_default() {
                // An instance default absorbs an object shape mismatch; an
                // array request stays strict.
                Some(default) if kind == ValueKind::Object => Ok(default),
                _ => Err(CacheError::invalid(format!(
                    "Stored value for key \"{key}\" does not match requested type \"{}\".",
                    kind.as_str()
                ))),
            },
        }
    }

    fn encode(&self, key: &str, value: &CacheValue) -> Result<Vec<u8>> {
        match value.to_wire() {
            Some(bytes) => Ok(bytes),
            None => {
                let serializer = self.serializer()?;
                serializer.encode(&value.to_json()).map_err(|e| {
                    CacheError::invalid(format!("Value for key \"{key}\" failed to encode: {e}."))
                })
            }
        }
    }

    fn serializer(&self) -> Result<&Arc<dyn Serializer>> {
        self.serializer
            .as_ref()
            .ok_or_else(|| CacheError::invalid("Serializer is not defined."))
    }
}

fn serializer_for(mode: SerializerMode) -> Option<Arc<dyn Serializer>> {
    match mode {
        SerializerMode::None => None,
        SerializerMode::Json => Some(Arc::new(JsonSerializer)),
    }
}

fn constrain_object<T: DeserializeOwned>(key: &str, value: CacheValue) -> Result<T> {
    match value {
        CacheValue::Object(json) => serde_json::from_value(json).map_err(|e| {
            CacheError::invalid(format!(
                "Stored object for key \"{key}\" does not match the requested type: {e}."
            ))
        }),
        other => Err(CacheError::invalid(format!(
            "Stored value for key \"{key}\" is not an object (found \"{}\").",
            other.kind().as_str()
        ))),
    }
}

fn expect_bool(value: CacheValue) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| CacheError::invalid("Decoded value is not a bool."))
}

fn expect_int(value: CacheValue) -> Result<i64> {
    value
        .as_int()
        .ok_or_else(|| CacheError::invalid("Decoded value is not an int."))
}

fn expect_float(value: CacheValue) -> Result<f64> {
    value
        .as_float()
        .ok_or_else(|| CacheError::invalid("Decoded value is not a float."))
}

fn expect_string(value: CacheValue) -> Result<String> {
    match value {
        CacheValue::String(text) => Ok(text),
        _ => Err(CacheError::invalid("Decoded value is not a string.")),
    }
}

fn expect_array(value: CacheValue) -> Result<Vec<Json>> {
    match value {
        CacheValue::Array(items) => Ok(items),
        _ => Err(CacheError::invalid("Decoded value is not an array.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryTransport;
    use serde::Deserialize;
    use serde_json::json;

    fn memory_client(namespace: &str) -> (Arc<MemoryTransport>, StashClient) {
        let transport = Arc::new(MemoryTransport::new());
        let client =
            StashClient::with_transport(transport.clone(), namespace, Lifetime::Default)
                .unwrap();
        (transport, client)
    }

    fn json_client(namespace: &str) -> (Arc<MemoryTransport>, StashClient) {
        let (transport, mut client) = memory_client(namespace);
        client.set_serializer(Arc::new(JsonSerializer));
        (transport, client)
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Waypoint {
        callsign: String,
        sequence: u32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Roster {
        members: Vec<String>,
    }

    #[tokio::test]
    async fn scalar_roundtrip_with_lifetime() {
        let (_, client) = memory_client("app");
        client.set("hits", 42, Lifetime::Seconds(60)).await.unwrap();
        assert_eq!(client.get_int("hits").await.unwrap(), 42);
        let remaining = client.get_lifetime("hits").await.unwrap().unwrap();
        assert!((1..=60).contains(&remaining));
    }

    #[tokio::test]
    async fn typed_getters_cover_every_scalar_kind() {
        let (_, client) = memory_client("app");
        client.set("flag", true, Lifetime::Default).await.unwrap();
        client.set("count", -3, Lifetime::Default).await.unwrap();
        client.set("ratio", 0.5, Lifetime::Default).await.unwrap();
        client.set("name", "reaper", Lifetime::Default).await.unwrap();
        assert!(client.get_bool("flag").await.unwrap());
        assert_eq!(client.get_int("count").await.unwrap(), -3);
        assert!((client.get_float("ratio").await.unwrap() - 0.5).abs() < f64::EPSILON);
        assert_eq!(client.get_string("name").await.unwrap(), "reaper");
    }

    #[tokio::test]
    async fn missing_key_without_default_is_not_found() {
        let (_, client) = memory_client("app");
        let err = client.get("missing").await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::NotFound { ref key, member: None } if key == "missing"
        ));
    }

    #[tokio::test]
    async fn missing_key_with_default_returns_it() {
        let (_, client) = memory_client("app");
        assert_eq!(client.get_int_or("missing", 42).await.unwrap(), 42);
        assert_eq!(
            client.get_or("missing", "fallback").await.unwrap(),
            CacheValue::from("fallback")
        );
    }

    #[tokio::test]
    async fn stored_text_rejects_int_request_even_with_default() {
        let (_, client) = memory_client("app");
        client.set("word", "hello", Lifetime::Default).await.unwrap();
        let err = client.get_int_or("word", 42).await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn mixed_read_passes_stored_text_through() {
        let (_, client) = memory_client("app");
        client.set("hits", 42, Lifetime::Default).await.unwrap();
        assert_eq!(client.get("hits").await.unwrap(), CacheValue::from("42"));
    }

    #[tokio::test]
    async fn malformed_keys_fail_before_any_transport_call() {
        let (transport, client) = memory_client("app");
        transport.fail_writes(true);
        for key in ["", "bad:key", "bad{key}", "a/b"] {
            let err = client.set(key, 1, Lifetime::Default).await.unwrap_err();
            assert!(matches!(err, CacheError::InvalidArgument(_)), "key {key:?}");
        }
    }

    #[tokio::test]
    async fn table_member_lifecycle() {
        let (_, client) = memory_client("app");
        client
            .set_item("fleet", "alpha", "ready", Lifetime::Default)
            .await
            .unwrap();
        assert!(client.has_item("fleet", "alpha").await.unwrap());
        assert_eq!(
            client.get_item("fleet", "alpha").await.unwrap(),
            CacheValue::from("ready")
        );
        assert!(client.delete_item("fleet", "alpha").await.unwrap());
        assert!(!client.has_item("fleet", "alpha").await.unwrap());
        let err = client.get_item("fleet", "alpha").await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::NotFound { member: Some(ref m), .. } if m == "alpha"
        ));
    }

    #[tokio::test]
    async fn failed_table_expiry_rolls_the_member_back() {
        let (transport, client) = memory_client("app");
        transport.fail_expire(true);
        let err = client
            .set_item("fleet", "alpha", "ready", Lifetime::Seconds(30))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::WriteFailed { .. }));
        assert!(!client.has_item("fleet", "alpha").await.unwrap());
    }

    #[tokio::test]
    async fn member_lifetime_applies_to_the_whole_table() {
        let (_, client) = memory_client("app");
        client
            .set_item("fleet", "alpha", "ready", Lifetime::Seconds(45))
            .await
            .unwrap();
        let remaining = client.get_lifetime("fleet").await.unwrap().unwrap();
        assert!((1..=45).contains(&remaining));
    }

    #[tokio::test]
    async fn structured_values_need_a_serializer() {
        let (_, client) = memory_client("app");
        let err = client
            .set("list", CacheValue::Array(vec![json!(1)]), Lifetime::Default)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Serializer is not defined"));
    }

    #[tokio::test]
    async fn array_roundtrip_through_serializer() {
        let (_, client) = json_client("app");
        let items = vec![json!("a"), json!(2), json!({"nested": true})];
        client
            .set("list", CacheValue::Array(items.clone()), Lifetime::Default)
            .await
            .unwrap();
        assert_eq!(client.get_array("list").await.unwrap(), items);
        assert_eq!(
            client.get_array_or("absent", vec![json!(0)]).await.unwrap(),
            vec![json!(0)]
        );
    }

    #[tokio::test]
    async fn object_roundtrip_through_serializer() {
        let (_, client) = json_client("app");
        let wp = Waypoint {
            callsign: "REAPER-1".into(),
            sequence: 4,
        };
        client.set_object("wp", &wp, Lifetime::Default).await.unwrap();
        assert_eq!(client.get_object::<Waypoint>("wp").await.unwrap(), wp);
    }

    #[tokio::test]
    async fn object_mismatch_raises_without_default_and_yields_default_with_one() {
        let (_, client) = json_client("app");
        let wp = Waypoint {
            callsign: "REAPER-1".into(),
            sequence: 4,
        };
        client.set_object("wp", &wp, Lifetime::Default).await.unwrap();

        let err = client.get_object::<Roster>("wp").await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidArgument(_)));

        let fallback = Roster { members: vec![] };
        let got = client
            .get_object_or::<Roster>("wp", Roster { members: vec![] })
            .await
            .unwrap();
        assert_eq!(got, fallback);
    }

    #[tokio::test]
    async fn object_default_covers_missing_keys_too() {
        let (_, client) = json_client("app");
        let fallback = Waypoint {
            callsign: "SPARE".into(),
            sequence: 0,
        };
        let got = client
            .get_object_or::<Waypoint>("absent", fallback.clone())
            .await
            .unwrap();
        assert_eq!(got, fallback);
    }

    #[tokio::test]
    async fn item_object_roundtrip() {
        let (_, client) = json_client("app");
        let wp = Waypoint {
            callsign: "EAGLE-2".into(),
            sequence: 1,
        };
        client
            .set_item_object("route", "leg1", &wp, Lifetime::Default)
            .await
            .unwrap();
        assert_eq!(
            client
                .get_item_object::<Waypoint>("route", "leg1")
                .await
                .unwrap(),
            wp
        );
    }

    #[tokio::test]
    async fn get_table_returns_members_sorted() {
        let (_, client) = memory_client("app");
        for member in ["zulu", "alpha", "mike"] {
            client
                .set_item("fleet", member, "ok", Lifetime::Default)
                .await
                .unwrap();
        }
        let table = client.get_table("fleet").await.unwrap();
        let members: Vec<&str> = table.keys().map(String::as_str).collect();
        assert_eq!(members, vec!["alpha", "mike", "zulu"]);
    }

    #[tokio::test]
    async fn get_table_on_missing_key_is_not_found() {
        let (_, client) = memory_client("app");
        assert!(matches!(
            client.get_table("absent").await.unwrap_err(),
            CacheError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn delete_reports_whether_the_key_existed() {
        let (_, client) = memory_client("app");
        client.set("k", 1, Lifetime::Default).await.unwrap();
        assert!(client.delete("k").await.unwrap());
        assert!(!client.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn lifetime_can_be_set_after_the_fact() {
        let (_, client) = memory_client("app");
        client.set("k", 1, Lifetime::Default).await.unwrap();
        assert_eq!(client.get_lifetime("k").await.unwrap(), None);
        assert!(client.set_lifetime("k", Lifetime::Seconds(90)).await.unwrap());
        let remaining = client.get_lifetime("k").await.unwrap().unwrap();
        assert!((1..=90).contains(&remaining));
        assert!(!client.set_lifetime("k", Lifetime::none()).await.unwrap());
    }

    #[tokio::test]
    async fn default_lifetime_is_applied_and_overridable() {
        let (_, mut client) = memory_client("app");
        client.set_default_lifetime(Lifetime::Seconds(30));
        assert_eq!(client.default_lifetime(), Some(30));
        client.set("k", 1, Lifetime::Default).await.unwrap();
        assert!(client.get_lifetime("k").await.unwrap().is_some());
        client.set("eternal", 1, Lifetime::none()).await.unwrap();
        assert_eq!(client.get_lifetime("eternal").await.unwrap(), None);
    }

    #[tokio::test]
    async fn namespaces_isolate_clients_sharing_a_store() {
        let transport = Arc::new(MemoryTransport::new());
        let one =
            StashClient::with_transport(transport.clone(), "one", Lifetime::Default).unwrap();
        let two =
            StashClient::with_transport(transport.clone(), "two", Lifetime::Default).unwrap();
        one.set("k", "from-one", Lifetime::Default).await.unwrap();
        two.set("k", "from-two", Lifetime::Default).await.unwrap();
        assert_eq!(one.get_string("k").await.unwrap(), "from-one");
        assert_eq!(two.get_string("k").await.unwrap(), "from-two");

        assert!(one.clear().await.unwrap());
        assert!(!one.has("k").await.unwrap());
        assert_eq!(two.get_string("k").await.unwrap(), "from-two");
    }

    #[tokio::test]
    async fn get_keys_strips_the_namespace() {
        let (_, client) = memory_client("jobs");
        client.set("pending.1", 1, Lifetime::Default).await.unwrap();
        client.set("pending.2", 1, Lifetime::Default).await.unwrap();
        client.set("done.1", 1, Lifetime::Default).await.unwrap();
        let mut keys = client.get_keys("pending.*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["pending.1", "pending.2"]);
    }

    #[tokio::test]
    async fn injected_transport_cannot_reconnect() {
        let (_, mut client) = memory_client("app");
        assert!(matches!(
            client.reconnect().await.unwrap_err(),
            CacheError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn namespace_roundtrips_through_the_facade() {
        let (_, mut client) = memory_client("app");
        assert_eq!(client.namespace(), "app:");
        client.set_namespace("other").unwrap();
        assert_eq!(client.namespace(), "other:");
        assert!(client.set_namespace("bad:ns").is_err());
    }
}
