//! Service discovery: subscriptions, snapshots and watchers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use crate::cache::RrCache;
use crate::config::{INITIAL_BACKOFF, MAX_BACKOFF};
use crate::message::{
    CLASS_INET, DnsType, Message, Name, Question, RData, Resource,
};
use crate::service::service_fqdn;

/// A view of one advertised service instance, assembled from the cache.
///
/// Watcher deltas reuse the type: an addition carries the current record
/// sets, a removal carries the name with every set empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Instance name with the service suffix stripped, e.g. `"system1"`.
    pub name: String,
    /// Live SRV records under the instance name.
    pub srv_rrs: Vec<Resource>,
    /// Live TXT records under the instance name.
    pub txt_rrs: Vec<Resource>,
    /// Live A/AAAA records under the SRV targets.
    pub addr_rrs: Vec<Resource>,
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServiceInstance{{{}: {} srv, {} txt, {} addr}}",
            self.name,
            self.srv_rrs.len(),
            self.txt_rrs.len(),
            self.addr_rrs.len()
        )
    }
}

/// Stops a watcher; the watcher's channel closes once stopped.
pub struct WatchHandle {
    id: u64,
    discovery: Arc<Discovery>,
}

impl WatchHandle {
    pub fn stop(self) {
        self.discovery.remove_watcher(self.id);
    }
}

struct Subscription {
    service: String,
    next_query: Instant,
    period: Duration,
}

struct WatcherEntry {
    id: u64,
    service: String,
    notify_tx: mpsc::Sender<()>,
}

pub(crate) struct Discovery {
    cache: Arc<RrCache>,
    shutdown: watch::Receiver<bool>,
    subscriptions: Mutex<Vec<Subscription>>,
    watchers: Mutex<Vec<WatcherEntry>>,
    next_watcher_id: AtomicU64,
}

/// A PTR query for a service name.
pub(crate) fn ptr_query(fqdn: &str) -> Message {
    Message {
        questions: vec![Question {
            name: Name {
                data: fqdn.to_owned(),
            },
            typ: DnsType::Ptr,
            class: CLASS_INET,
        }],
        ..Default::default()
    }
}

/// An A + AAAA query for a host name.
pub(crate) fn address_query(fqdn: &str) -> Message {
    let question = |typ| Question {
        name: Name {
            data: fqdn.to_owned(),
        },
        typ,
        class: CLASS_INET,
    };
    Message {
        questions: vec![question(DnsType::A), question(DnsType::Aaaa)],
        ..Default::default()
    }
}

impl Discovery {
    pub(crate) fn new(cache: Arc<RrCache>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            cache,
            shutdown,
            subscriptions: Mutex::new(vec![]),
            watchers: Mutex::new(vec![]),
            next_watcher_id: AtomicU64::new(1),
        }
    }

    /// Registers interest in a service type. The caller sends the first
    /// query; re-queries follow the doubling backoff.
    pub(crate) fn subscribe(&self, service: &str, now: Instant) {
        let mut subs = self.subscriptions.lock().unwrap();
        if subs.iter().any(|s| s.service == service) {
            return;
        }
        subs.push(Subscription {
            service: service.to_owned(),
            next_query: now + INITIAL_BACKOFF,
            period: INITIAL_BACKOFF,
        });
    }

    /// Service names whose re-query is due, advancing each backoff.
    pub(crate) fn due_queries(&self, now: Instant) -> Vec<String> {
        let mut out = vec![];
        let mut subs = self.subscriptions.lock().unwrap();
        for s in subs.iter_mut() {
            if s.next_query <= now {
                out.push(service_fqdn(&s.service));
                s.period = (s.period * 2).min(MAX_BACKOFF);
                s.next_query = now + s.period;
            }
        }
        out
    }

    /// Drops every subscription back to the fast query cadence. Called
    /// when the interface set changes.
    pub(crate) fn reset_backoff(&self, now: Instant) {
        let mut subs = self.subscriptions.lock().unwrap();
        for s in subs.iter_mut() {
            s.period = INITIAL_BACKOFF;
            s.next_query = now;
        }
    }

    /// Snapshot of the instances of a service currently in the cache.
    pub(crate) fn assemble(&self, service: &str) -> Vec<ServiceInstance> {
        let fqdn = service_fqdn(service);
        let suffix = format!(".{fqdn}");
        let mut out = vec![];
        let mut seen = HashSet::new();

        for prr in self.cache.matching(&fqdn, DnsType::Ptr) {
            let RData::Ptr(ptr) = &prr.body else {
                continue;
            };
            let instance = ptr.ptr.data.to_lowercase();
            if !seen.insert(instance.clone()) {
                continue;
            }

            let srv_rrs = self.cache.matching(&instance, DnsType::Srv);
            let txt_rrs = self.cache.matching(&instance, DnsType::Txt);

            let mut addr_rrs = vec![];
            let mut targets = HashSet::new();
            for rr in &srv_rrs {
                if let RData::Srv(srv) = &rr.body {
                    let target = srv.target.data.to_lowercase();
                    if targets.insert(target.clone()) {
                        addr_rrs.extend(self.cache.matching(&target, DnsType::A));
                        addr_rrs.extend(self.cache.matching(&target, DnsType::Aaaa));
                    }
                }
            }

            let name = instance
                .strip_suffix(&suffix)
                .unwrap_or(&instance)
                .to_owned();
            out.push(ServiceInstance {
                name,
                srv_rrs,
                txt_rrs,
                addr_rrs,
            });
        }
        out
    }

    /// Starts a watcher for a service type. Returns the delta channel and
    /// the handle that stops it. The current instance set is reported
    /// first; afterwards the watcher wakes on cache changes under the
    /// service name.
    pub(crate) fn watch(
        self: &Arc<Self>,
        service: &str,
    ) -> (mpsc::Receiver<ServiceInstance>, WatchHandle) {
        let (out_tx, out_rx) = mpsc::channel(32);
        let (notify_tx, notify_rx) = mpsc::channel(8);
        let id = self.next_watcher_id.fetch_add(1, Ordering::Relaxed);

        // Prime one recompute so the watcher reports existing instances.
        let _ = notify_tx.try_send(());
        self.watchers.lock().unwrap().push(WatcherEntry {
            id,
            service: service.to_owned(),
            notify_tx,
        });

        tokio::spawn(run_watcher(
            Arc::clone(self),
            service.to_owned(),
            notify_rx,
            out_tx,
            self.shutdown.clone(),
        ));

        (
            out_rx,
            WatchHandle {
                id,
                discovery: Arc::clone(self),
            },
        )
    }

    fn remove_watcher(&self, id: u64) {
        self.watchers.lock().unwrap().retain(|w| w.id != id);
    }

    /// Drops every watcher, closing their channels.
    pub(crate) fn clear_watchers(&self) {
        self.watchers.lock().unwrap().clear();
    }

    /// Wakes the watchers whose service the changed cache name belongs to.
    pub(crate) fn notify_watchers(&self, changed_name: &str) {
        let changed = changed_name.to_lowercase();
        for w in self.watchers.lock().unwrap().iter() {
            let fqdn = service_fqdn(&w.service);
            if changed == fqdn || changed.ends_with(&format!(".{fqdn}")) {
                // A full notify queue already guarantees a recompute.
                let _ = w.notify_tx.try_send(());
            }
        }
    }
}

// Payload-only view of an instance, so TTL refreshes don't read as changes.
type InstanceKey = (Vec<RData>, Vec<RData>);

fn instance_key(inst: &ServiceInstance) -> InstanceKey {
    (
        inst.srv_rrs.iter().map(|rr| rr.body.clone()).collect(),
        inst.txt_rrs.iter().map(|rr| rr.body.clone()).collect(),
    )
}

async fn run_watcher(
    discovery: Arc<Discovery>,
    service: String,
    mut notify_rx: mpsc::Receiver<()>,
    out_tx: mpsc::Sender<ServiceInstance>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut known: HashMap<String, InstanceKey> = HashMap::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            n = notify_rx.recv() => {
                if n.is_none() {
                    // Stopped: all notify senders are gone.
                    break;
                }

                let instances = discovery.assemble(&service);
                let mut current = HashSet::new();
                for inst in instances {
                    if inst.srv_rrs.is_empty() && inst.txt_rrs.is_empty() {
                        // A bare PTR with no data yet; empty sets would
                        // read as a removal downstream.
                        continue;
                    }
                    current.insert(inst.name.clone());
                    let key = instance_key(&inst);
                    if known.get(&inst.name) != Some(&key) {
                        known.insert(inst.name.clone(), key);
                        if out_tx.try_send(inst).is_err() {
                            log::trace!("watcher for {service} dropped a delta");
                        }
                    }
                }

                let gone: Vec<String> = known
                    .keys()
                    .filter(|name| !current.contains(*name))
                    .cloned()
                    .collect();
                for name in gone {
                    known.remove(&name);
                    let removal = ServiceInstance {
                        name,
                        ..Default::default()
                    };
                    if out_tx.try_send(removal).is_err() {
                        log::trace!("watcher for {service} dropped a removal");
                    }
                }
            }
        }
    }
    log::trace!("watcher for {service} exited");
}
