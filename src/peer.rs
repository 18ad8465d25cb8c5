//! The mDNS peer: public API and the tasks behind it.
//!
//! A peer runs one receive task per endpoint (inside the engine), the
//! dispatcher draining the engine's fan-in channel, and one periodic task
//! driving the cache janitor, interface scans, re-announces and
//! subscription queries. Watcher tasks come and go with subscriptions.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use crate::cache::RrCache;
use crate::config::{Config, IFACE_SCAN_TICKS, RESOLVE_TIMEOUT, TICK_INTERVAL};
use crate::discovery::{Discovery, ServiceInstance, WatchHandle, address_query, ptr_query};
use crate::engine::{Inbound, NetEngine};
use crate::error::{Error, Result};
use crate::message::{DnsType, RData};
use crate::service::{ServiceRegistry, host_fqdn, response_message, service_fqdn};

/// A multicast DNS / DNS-SD peer.
///
/// Announces local services, discovers services announced by other peers
/// on the same link, and resolves `.local.` names, entirely over
/// link-local multicast.
pub struct Mdns {
    cache: Arc<RrCache>,
    engine: Arc<NetEngine>,
    services: Arc<ServiceRegistry>,
    discovery: Arc<Discovery>,
    shutdown_tx: watch::Sender<bool>,
    stopped: AtomicBool,
}

impl Mdns {
    /// Builds a peer: opens endpoints on every usable interface and starts
    /// the dispatcher and periodic tasks.
    ///
    /// # Errors
    ///
    /// [`Error::ErrNoInterface`] when no endpoint can be opened in either
    /// address family.
    pub async fn new(config: Config) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (inbound_tx, inbound_rx) = mpsc::channel(64);

        let engine = Arc::new(NetEngine::new(
            config.clone(),
            inbound_tx,
            shutdown_rx.clone(),
        ));
        engine.scan_interfaces();
        if !engine.has_endpoints() {
            return Err(Error::ErrNoInterface);
        }

        let cache = Arc::new(RrCache::new());
        let services = Arc::new(ServiceRegistry::new(&config.host_name));
        let discovery = Arc::new(Discovery::new(Arc::clone(&cache), shutdown_rx.clone()));

        // Cache changes wake the watchers. stop() clears this hook, which
        // also breaks the cache -> discovery reference cycle.
        let hook_discovery = Arc::clone(&discovery);
        cache.set_change_hook(Some(Box::new(move |name| {
            hook_discovery.notify_watchers(name);
        })));

        tokio::spawn(dispatch_loop(
            inbound_rx,
            Arc::clone(&cache),
            Arc::clone(&services),
            Arc::clone(&engine),
            shutdown_rx.clone(),
        ));
        tokio::spawn(periodic_loop(
            Arc::clone(&cache),
            Arc::clone(&services),
            Arc::clone(&discovery),
            Arc::clone(&engine),
            shutdown_rx,
        ));

        Ok(Self {
            cache,
            engine,
            services,
            discovery,
            shutdown_tx,
            stopped: AtomicBool::new(false),
        })
    }

    fn ensure_running(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            Err(Error::ErrPeerStopped)
        } else {
            Ok(())
        }
    }

    /// Registers and announces a service instance. The announcement goes
    /// out immediately and again a second later, then on a doubling
    /// schedule. An empty `host` uses the peer's configured host name.
    pub async fn add_service(
        &self,
        service: &str,
        host: &str,
        port: u16,
        txt: &[&str],
    ) -> Result<()> {
        self.ensure_running()?;
        let addrs = self.engine.addresses();
        let records = self
            .services
            .add(service, host, port, txt, &addrs, Instant::now());
        self.cache.add_all(&records);
        log::debug!("announcing {service}/{host}:{port}");
        self.engine.send_all(&response_message(records)).await;
        Ok(())
    }

    /// Withdraws a service instance: its records go out with TTL 0, twice.
    pub async fn remove_service(
        &self,
        service: &str,
        host: &str,
        port: u16,
        txt: &[&str],
    ) -> Result<()> {
        self.ensure_running()?;
        let addrs = self.engine.addresses();
        let records = self.services.remove(service, host, port, txt, &addrs)?;
        self.cache.add_all(&records);
        log::debug!("withdrawing {service}/{host}:{port}");
        let msg = response_message(records);
        self.engine.send_all(&msg).await;

        // The goodbye repeats once in case the first multicast is lost.
        let engine = Arc::clone(&self.engine);
        let mut shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    engine.send_all(&msg).await;
                }
            }
        });
        Ok(())
    }

    /// Starts querying for instances of a service type, with backoff.
    pub async fn subscribe_to_service(&self, service: &str) {
        if self.ensure_running().is_err() {
            return;
        }
        self.discovery.subscribe(service, Instant::now());
        self.engine.send_all(&ptr_query(&service_fqdn(service))).await;
    }

    /// Snapshot of the service instances currently known to the cache.
    pub fn service_discovery(&self, service: &str) -> Vec<ServiceInstance> {
        self.discovery.assemble(service)
    }

    /// Live membership deltas for a service type. The current instances
    /// arrive first; later additions carry their record sets and removals
    /// carry the bare name. Stopping the handle closes the channel.
    pub fn service_member_watch(
        &self,
        service: &str,
    ) -> (mpsc::Receiver<ServiceInstance>, WatchHandle) {
        self.discovery.watch(service)
    }

    /// Resolves a host label to addresses, waiting up to a second for
    /// answers to arrive. An empty list means nobody answered; mDNS makes
    /// no completeness promise.
    pub async fn resolve_address(&self, host: &str) -> Result<Vec<IpAddr>> {
        self.ensure_running()?;
        let fqdn = host_fqdn(host);
        self.engine.send_all(&address_query(&fqdn)).await;

        let deadline = Instant::now() + RESOLVE_TIMEOUT;
        loop {
            let addrs = self.cached_addresses(&fqdn);
            if !addrs.is_empty() {
                return Ok(addrs);
            }
            if Instant::now() >= deadline {
                return Ok(vec![]);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn cached_addresses(&self, fqdn: &str) -> Vec<IpAddr> {
        let mut out = vec![];
        for rr in self.cache.matching(fqdn, DnsType::A) {
            if let RData::A(a) = &rr.body {
                out.push(IpAddr::V4(a.ip()));
            }
        }
        for rr in self.cache.matching(fqdn, DnsType::Aaaa) {
            if let RData::Aaaa(a) = &rr.body {
                out.push(IpAddr::V6(a.ip()));
            }
        }
        out
    }

    /// Shuts the peer down: withdraws every local service, stops the
    /// tasks, closes watcher channels and endpoints. Idempotent.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let addrs = self.engine.addresses();
        for records in self.services.remove_all(&addrs) {
            self.cache.add_all(&records);
            self.engine.send_all(&response_message(records)).await;
        }

        // Hook first: watchers must not be woken once shutdown starts.
        self.cache.set_change_hook(None);
        let _ = self.shutdown_tx.send(true);
        self.discovery.clear_watchers();
        self.engine.close_all();
        log::debug!("peer stopped");
    }
}

async fn dispatch_loop(
    mut inbound_rx: mpsc::Receiver<Inbound>,
    cache: Arc<RrCache>,
    services: Arc<ServiceRegistry>,
    engine: Arc<NetEngine>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            inbound = inbound_rx.recv() => {
                let Some(inbound) = inbound else { break };
                dispatch(inbound, &cache, &services, &engine).await;
            }
        }
    }
    log::trace!("dispatcher exited");
}

async fn dispatch(
    inbound: Inbound,
    cache: &RrCache,
    services: &ServiceRegistry,
    engine: &NetEngine,
) {
    let Inbound { msg, src, ifindex } = inbound;
    if msg.header.response {
        let records: Vec<_> = msg
            .answers
            .iter()
            .chain(msg.additionals.iter())
            .cloned()
            .collect();
        cache.add_all(&records);
    } else {
        // Known answers inside queries are answers all the same.
        cache.add_all(&msg.answers);
        let addrs = engine.addresses();
        if let Some((resp, unicast)) = services.handle_query(&msg, &addrs) {
            if unicast {
                engine.send_unicast(&resp, src).await;
            } else {
                engine.send_one(&resp, ifindex).await;
            }
        }
    }
}

async fn periodic_loop(
    cache: Arc<RrCache>,
    services: Arc<ServiceRegistry>,
    discovery: Arc<Discovery>,
    engine: Arc<NetEngine>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                ticks += 1;
                cache.flush_expired();

                let now = Instant::now();
                for records in services.due_announcements(now, &engine.addresses()) {
                    cache.add_all(&records);
                    engine.send_all(&response_message(records)).await;
                }
                for fqdn in discovery.due_queries(now) {
                    engine.send_all(&ptr_query(&fqdn)).await;
                }

                if ticks % IFACE_SCAN_TICKS == 0 && engine.scan_interfaces() {
                    discovery.reset_backoff(Instant::now());
                }
            }
        }
    }
    log::trace!("periodic task exited");
}
