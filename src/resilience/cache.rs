//! Response cache with TTL and LRU eviction
//!
//! Cache keys are a SHA-256 digest over the method name and the canonical
//! form of the parameters (object keys sorted recursively), so identical
//! calls with differently-ordered parameters share an entry. Expiry is
//! checked lazily on read and by a periodic sweep; once the cache is full
//! the least-recently-used entry is evicted.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// A cached value with its insertion time and TTL
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub inserted: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.inserted) > self.ttl
    }
}

/// LRU + TTL response cache keyed by (method, canonical params)
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    access_order: VecDeque<String>,
    max_size: usize,
    default_ttl: Duration,
    ttl_overrides: HashMap<String, Duration>,
}

impl ResponseCache {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            access_order: VecDeque::new(),
            max_size,
            default_ttl,
            ttl_overrides: HashMap::new(),
        }
    }

    /// Set per-method TTL overrides
    pub fn with_ttl_overrides(mut self, overrides: HashMap<String, Duration>) -> Self {
        self.ttl_overrides = overrides;
        self
    }

    /// TTL applied to entries for a method
    pub fn ttl_for(&self, method: &str) -> Duration {
        self.ttl_overrides
            .get(method)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Look up a cached response, touching LRU order on a hit
    pub fn get(&mut self, method: &str, params: &Value) -> Option<Value> {
        self.get_at(method, params, Instant::now())
    }

    /// Look up at an explicit time
    pub fn get_at(&mut self, method: &str, params: &Value, now: Instant) -> Option<Value> {
        let key = cache_key(method, params);

        match self.entries.get(&key) {
            Some(entry) if !entry.is_expired_at(now) => {
                let value = entry.value.clone();
                self.touch(&key);
                Some(value)
            }
            Some(_) => {
                self.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Insert a response, evicting LRU entries at capacity
    pub fn insert(&mut self, method: &str, params: &Value, value: Value) {
        self.insert_at(method, params, value, Instant::now());
    }

    /// Insert at an explicit time
    pub fn insert_at(&mut self, method: &str, params: &Value, value: Value, now: Instant) {
        let key = cache_key(method, params);
        let ttl = self.ttl_for(method);

        while self.entries.len() >= self.max_size && !self.entries.contains_key(&key) {
            match self.access_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }

        self.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                inserted: now,
                ttl,
            },
        );
        self.touch(&key);
    }

    /// Drop all expired entries
    pub fn sweep_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            self.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &str) {
        self.access_order.retain(|k| k != key);
        self.access_order.push_back(key.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.access_order.retain(|k| k != key);
    }
}

/// Deterministic cache key: digest over method and canonical params
pub fn cache_key(method: &str, params: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(params, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Serialize a JSON value with object keys sorted recursively
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
