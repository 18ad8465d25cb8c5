//! Resource record cache.
//!
//! [`RrCache`] indexes records by lowercased owner name. Entries expire at
//! arrival time + TTL, a record carrying the cache-flush class bit evicts
//! every older record with the same (name, type) before insertion, and a
//! TTL=0 "goodbye" schedules matching live entries for deletion one second
//! out (RFC 6762 §10.1) instead of being stored itself.

#[cfg(test)]
mod cache_test;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::config::GOODBYE_GRACE;
use crate::message::{DnsType, Resource};

/// Callback observing cache changes; receives the owner name whose bucket
/// gained, lost, or replaced data. Runs outside the cache lock.
pub type ChangeHook = Box<dyn Fn(&str) + Send + Sync>;

struct CacheEntry {
    rr: Resource,
    expires: Instant,
    seq: u64,
}

#[derive(Default)]
struct Buckets {
    by_name: HashMap<String, Vec<CacheEntry>>,
    // Insertion counter; keeps iteration order stable for lookups.
    seq: u64,
}

#[derive(Default)]
pub struct RrCache {
    inner: Mutex<Buckets>,
    hook: Mutex<Option<ChangeHook>>,
}

impl RrCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or clears) the single change callback.
    pub fn set_change_hook(&self, hook: Option<ChangeHook>) {
        *self.hook.lock().unwrap() = hook;
    }

    fn fire_hook(&self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let hook = self.hook.lock().unwrap();
        if let Some(hook) = hook.as_ref() {
            for name in names {
                hook(name);
            }
        }
    }

    /// Inserts or refreshes a record.
    pub fn add(&self, rr: &Resource) {
        self.add_all_at(std::slice::from_ref(rr), Instant::now());
    }

    /// Inserts a batch of records under one lock acquisition, so a change
    /// callback never observes half of a message's record set.
    pub fn add_all(&self, rrs: &[Resource]) {
        self.add_all_at(rrs, Instant::now());
    }

    pub(crate) fn add_at(&self, rr: &Resource, now: Instant) {
        self.add_all_at(std::slice::from_ref(rr), now);
    }

    pub(crate) fn add_all_at(&self, rrs: &[Resource], now: Instant) {
        let mut changed: Vec<String> = vec![];
        {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            for rr in rrs {
                let name = rr.header.name.data.to_lowercase();
                if Self::insert_locked(inner, rr, &name, now) && !changed.contains(&name) {
                    changed.push(name);
                }
            }
        }
        self.fire_hook(&changed);
    }

    // Returns whether the bucket's visible data changed.
    fn insert_locked(inner: &mut Buckets, rr: &Resource, name: &str, now: Instant) -> bool {
        let typ = rr.header.typ;

        if rr.header.ttl == 0 {
            // Goodbye: schedule matching entries for deletion shortly,
            // leaving a window for last-moment queries to observe them.
            if let Some(bucket) = inner.by_name.get_mut(name) {
                let deadline = now + GOODBYE_GRACE;
                for e in bucket
                    .iter_mut()
                    .filter(|e| e.rr.header.typ == typ && e.rr.body == rr.body)
                {
                    e.expires = e.expires.min(deadline);
                }
            }
            return false;
        }

        let expires = now + Duration::from_secs(u64::from(rr.header.ttl));
        let seq = inner.seq;
        let bucket = inner.by_name.entry(name.to_owned()).or_default();
        let mut changed = false;

        if rr.cache_flush() {
            let before = bucket.len();
            bucket.retain(|e| e.rr.header.typ != typ || e.rr.body == rr.body);
            changed |= bucket.len() != before;
        }

        match bucket
            .iter_mut()
            .find(|e| e.rr.header.typ == typ && e.rr.body == rr.body)
        {
            Some(e) => {
                // Duplicate data refreshes the lifetime in place.
                e.rr.header.ttl = rr.header.ttl;
                e.rr.header.class = rr.header.class;
                e.expires = expires;
            }
            None => {
                let mut rr = rr.clone();
                rr.header.name.data = name.to_owned();
                bucket.push(CacheEntry { rr, expires, seq });
                inner.seq += 1;
                changed = true;
            }
        }
        changed
    }

    /// Writes every live record under `name` matching `typ` onto `out`,
    /// followed by a `None` sentinel. `DnsType::Any` matches all types.
    ///
    /// Delivery is best-effort: once the caller's channel is full the rest
    /// of the matches (and the sentinel) are dropped rather than blocking.
    pub fn lookup(&self, name: &str, typ: DnsType, out: &mpsc::Sender<Option<Resource>>) {
        self.lookup_at(name, typ, out, Instant::now());
    }

    pub(crate) fn lookup_at(
        &self,
        name: &str,
        typ: DnsType,
        out: &mpsc::Sender<Option<Resource>>,
        now: Instant,
    ) {
        for rr in self.matching_at(name, typ, now) {
            if out.try_send(Some(rr)).is_err() {
                return;
            }
        }
        let _ = out.try_send(None);
    }

    /// Snapshot of the live records under `name` matching `typ`, in
    /// insertion order.
    pub(crate) fn matching(&self, name: &str, typ: DnsType) -> Vec<Resource> {
        self.matching_at(name, typ, Instant::now())
    }

    pub(crate) fn matching_at(&self, name: &str, typ: DnsType, now: Instant) -> Vec<Resource> {
        let name = name.to_lowercase();
        let inner = self.inner.lock().unwrap();
        let Some(bucket) = inner.by_name.get(&name) else {
            return vec![];
        };
        let mut live: Vec<&CacheEntry> = bucket
            .iter()
            .filter(|e| e.expires > now && typ.matches(e.rr.header.typ))
            .collect();
        live.sort_by_key(|e| e.seq);
        live.into_iter().map(|e| e.rr.clone()).collect()
    }

    /// Drops every expired entry. Called opportunistically by the janitor.
    pub fn flush_expired(&self) {
        self.flush_expired_at(Instant::now());
    }

    pub(crate) fn flush_expired_at(&self, now: Instant) {
        let mut removed = vec![];
        {
            let mut inner = self.inner.lock().unwrap();
            inner.by_name.retain(|name, bucket| {
                let before = bucket.len();
                bucket.retain(|e| e.expires > now);
                if bucket.len() != before {
                    removed.push(name.clone());
                }
                !bucket.is_empty()
            });
        }
        self.fire_hook(&removed);
    }
}
