//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_core::ProviderKind;
use strata_storage::storage::{
    sanitize_key, DownloadResult, DownloadedObject, IntegrationLookup, ListOptions, ObjectInfo,
    ProviderResolver, SecretStore, StorageProvider, UploadOptions, UploadResult,
    DEFAULT_CONTENT_TYPE,
};
use strata_storage::{Result, StorageError};

/// Provider operation recorded by [`MemoryProvider`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Upload,
    Download,
    Delete,
    Exists,
    /// An `exists` call returned
    ExistsDone,
    List,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// In-memory provider that records every call
#[derive(Default)]
pub struct MemoryProvider {
    objects: Mutex<HashMap<String, StoredObject>>,
    calls: Mutex<Vec<(Op, String)>>,
    deny_writes: AtomicBool,
    deny_reads: AtomicBool,
    deny_deletes: AtomicBool,
    panic_keys: Mutex<HashSet<String>>,
    exists_delay: Mutex<Option<Duration>>,
    key_delays: Mutex<HashMap<String, Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                metadata: HashMap::new(),
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn calls(&self) -> Vec<(Op, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, key)| key)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn deny_writes(&self) {
        self.deny_writes.store(true, Ordering::SeqCst);
    }

    pub fn deny_reads(&self) {
        self.deny_reads.store(true, Ordering::SeqCst);
    }

    pub fn deny_deletes(&self) {
        self.deny_deletes.store(true, Ordering::SeqCst);
    }

    /// Make `exists` panic for this key
    pub fn panic_on(&self, key: &str) {
        self.panic_keys.lock().unwrap().insert(key.to_string());
    }

    /// Make every `exists` call sleep, so overlapping checks can be observed
    pub fn set_exists_delay(&self, delay: Duration) {
        *self.exists_delay.lock().unwrap() = Some(delay);
    }

    /// Make `exists` sleep for this key only, overriding the global delay
    pub fn set_key_delay(&self, key: &str, delay: Duration) {
        self.key_delays
            .lock()
            .unwrap()
            .insert(key.to_string(), delay);
    }

    /// Position of the first recorded call matching `op` and `key`
    pub fn position(&self, op: Op, key: &str) -> Option<usize> {
        self.calls()
            .iter()
            .position(|(o, k)| *o == op && k == key)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, op: Op, key: &str) {
        self.calls.lock().unwrap().push((op, key.to_string()));
    }
}

struct InFlight<'a>(&'a MemoryProvider);

impl<'a> InFlight<'a> {
    fn enter(provider: &'a MemoryProvider) -> Self {
        let now = provider.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        provider.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(provider)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn bucket(&self) -> &str {
        "memory"
    }

    async fn upload(&self, key: &str, data: &[u8], options: UploadOptions) -> UploadResult {
        let key = sanitize_key(key);
        self.record(Op::Upload, &key);
        if self.deny_writes.load(Ordering::SeqCst) {
            return UploadResult::Failure {
                key,
                error: "Access Denied".to_string(),
            };
        }

        self.objects.lock().unwrap().insert(
            key.clone(),
            StoredObject {
                data: data.to_vec(),
                content_type: options
                    .content_type
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                metadata: options.metadata,
            },
        );
        UploadResult::Success {
            key,
            etag: None,
            size: data.len() as u64,
        }
    }

    async fn download(&self, key: &str) -> DownloadResult {
        let key = sanitize_key(key);
        self.record(Op::Download, &key);
        if self.deny_reads.load(Ordering::SeqCst) {
            return DownloadResult::Failure {
                error: "Access Denied".to_string(),
            };
        }

        match self.object(&key) {
            Some(object) => DownloadResult::Success(DownloadedObject {
                size: object.data.len() as u64,
                data: Bytes::from(object.data),
                content_type: object.content_type,
            }),
            None => DownloadResult::Failure {
                error: "NoSuchKey".to_string(),
            },
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let key = sanitize_key(key);
        self.record(Op::Delete, &key);
        if self.deny_deletes.load(Ordering::SeqCst) {
            return false;
        }
        self.objects.lock().unwrap().remove(&key);
        true
    }

    async fn exists(&self, key: &str) -> bool {
        let key = sanitize_key(key);
        self.record(Op::Exists, &key);
        let _guard = InFlight::enter(self);

        let key_delay = self.key_delays.lock().unwrap().get(&key).copied();
        let delay = key_delay.or(*self.exists_delay.lock().unwrap());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_keys.lock().unwrap().contains(&key) {
            panic!("simulated backend fault for {}", key);
        }

        let found = self.objects.lock().unwrap().contains_key(&key);
        self.record(Op::ExistsDone, &key);
        found
    }

    async fn list(&self, prefix: &str, options: ListOptions) -> Vec<ObjectInfo> {
        let prefix = sanitize_key(prefix);
        self.record(Op::List, &prefix);

        let mut objects: Vec<ObjectInfo> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, object)| ObjectInfo {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Utc::now(),
                etag: String::new(),
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(max_keys) = options.max_keys {
            objects.truncate(max_keys);
        }
        objects
    }

    async fn signed_url(&self, key: &str, _expires_in: Duration) -> Result<String> {
        Ok(format!("memory://{}", sanitize_key(key)))
    }
}

/// Resolver that hands out the same provider for every organization
pub struct FixedResolver(pub Arc<MemoryProvider>);

#[async_trait]
impl ProviderResolver for FixedResolver {
    async fn resolve(&self, _organization_id: &str) -> Result<Arc<dyn StorageProvider>> {
        let provider: Arc<dyn StorageProvider> = self.0.clone();
        Ok(provider)
    }
}

/// Resolver that always fails
pub struct FailingResolver;

#[async_trait]
impl ProviderResolver for FailingResolver {
    async fn resolve(&self, _organization_id: &str) -> Result<Arc<dyn StorageProvider>> {
        Err(StorageError::Configuration(
            "Default R2 storage credentials not configured".to_string(),
        ))
    }
}

/// Static organization → integration bindings
#[derive(Default)]
pub struct StaticIntegrations(pub HashMap<String, String>);

#[async_trait]
impl IntegrationLookup for StaticIntegrations {
    async fn lookup_integration(&self, organization_id: &str) -> Result<Option<String>> {
        Ok(self.0.get(organization_id).cloned())
    }
}

/// Static secret store
#[derive(Default)]
pub struct StaticSecrets(pub HashMap<String, String>);

#[async_trait]
impl SecretStore for StaticSecrets {
    async fn lookup_secret_by_name(&self, name: &str) -> Result<Option<String>> {
        Ok(self.0.get(name).cloned())
    }
}
