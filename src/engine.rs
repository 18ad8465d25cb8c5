//! Network engine: endpoint lifecycle and message fan-in.
//!
//! The engine enumerates interfaces, keeps one [`Endpoint`] per usable
//! (interface, family) pair, runs a receive task per endpoint, and funnels
//! every parsed message through a single bounded channel so ordering within
//! the engine is preserved.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use tokio::sync::{mpsc, watch};

use crate::config::{Config, MAX_PACKET_SIZE};
use crate::endpoint::Endpoint;
use crate::message::Message;

/// A parsed packet with its source and receiving interface.
pub(crate) struct Inbound {
    pub(crate) msg: Message,
    pub(crate) src: SocketAddr,
    pub(crate) ifindex: u32,
}

// Key: interface name plus family.
type EndpointKey = (String, bool);

pub(crate) struct NetEngine {
    config: Config,
    endpoints: Mutex<HashMap<EndpointKey, Arc<Endpoint>>>,
    inbound_tx: mpsc::Sender<Inbound>,
    shutdown: watch::Receiver<bool>,
}

impl NetEngine {
    pub(crate) fn new(
        config: Config,
        inbound_tx: mpsc::Sender<Inbound>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            endpoints: Mutex::new(HashMap::new()),
            inbound_tx,
            shutdown,
        }
    }

    /// Re-enumerates interfaces: opens endpoints for new (interface,
    /// family) pairs and closes endpoints whose interface vanished.
    /// Returns whether the endpoint set changed.
    pub(crate) fn scan_interfaces(&self) -> bool {
        let mut changed = false;
        let mut found: HashSet<EndpointKey> = HashSet::new();

        for intf in if_addrs::get_if_addrs().unwrap_or_default() {
            if intf.is_loopback() != self.config.loopback_only {
                continue;
            }
            let key = (intf.name.clone(), intf.ip().is_ipv6());
            if found.contains(&key) {
                // One endpoint per (interface, family); further addresses
                // on the same pair ride the first.
                continue;
            }
            found.insert(key.clone());
            if self.endpoints.lock().unwrap().contains_key(&key) {
                continue;
            }

            let ifindex = intf.index.unwrap_or(0);
            let built = match intf.ip() {
                IpAddr::V4(ip) => Endpoint::v4(&intf.name, ifindex, ip, self.config.ipv4_group),
                IpAddr::V6(ip) => Endpoint::v6(&intf.name, ifindex, ip, self.config.ipv6_group),
            };
            match built {
                Ok(ep) => {
                    log::debug!(
                        "multicast endpoint on {} ({}) joined {}",
                        intf.name,
                        ep.addr,
                        ep.group
                    );
                    let ep = Arc::new(ep);
                    self.spawn_recv(Arc::clone(&ep));
                    self.endpoints.lock().unwrap().insert(key, ep);
                    changed = true;
                }
                Err(e) => {
                    log::debug!("cannot open endpoint on {}: {}", intf.name, e);
                }
            }
        }

        self.endpoints.lock().unwrap().retain(|key, ep| {
            if found.contains(key) {
                true
            } else {
                log::debug!("interface {} vanished, closing endpoint", key.0);
                ep.close();
                changed = true;
                false
            }
        });

        changed
    }

    fn spawn_recv(&self, ep: Arc<Endpoint>) {
        let inbound_tx = self.inbound_tx.clone();
        let mut shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_PACKET_SIZE];
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ep.wait_closed() => break,
                    res = ep.socket.recv_from(&mut buf) => {
                        let (len, src) = match res {
                            Ok(r) => r,
                            Err(e) => {
                                log::debug!("recv on {}: {}", ep.ifname, e);
                                continue;
                            }
                        };
                        let data = BytesMut::from(&buf[..len]);
                        let mut msg = Message::default();
                        if let Err(e) = msg.unpack(&data) {
                            log::debug!("dropping unparsable packet from {}: {}", src, e);
                            continue;
                        }
                        if inbound_tx
                            .send(Inbound { msg, src, ifindex: ep.ifindex })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }
            log::trace!("receive loop on {} exited", ep.ifname);
        });
    }

    fn snapshot(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints.lock().unwrap().values().cloned().collect()
    }

    pub(crate) fn has_endpoints(&self) -> bool {
        !self.endpoints.lock().unwrap().is_empty()
    }

    /// Interface addresses of every open endpoint.
    pub(crate) fn addresses(&self) -> Vec<IpAddr> {
        self.snapshot().iter().map(|ep| ep.addr).collect()
    }

    /// Sends a message on every endpoint.
    pub(crate) async fn send_all(&self, msg: &Message) {
        let data = match msg.pack() {
            Ok(d) => d,
            Err(e) => {
                log::warn!("failed to pack message: {}", e);
                return;
            }
        };
        for ep in self.snapshot() {
            ep.send(&data).await;
        }
    }

    /// Sends a message on the endpoints of one interface.
    pub(crate) async fn send_one(&self, msg: &Message, ifindex: u32) {
        let data = match msg.pack() {
            Ok(d) => d,
            Err(e) => {
                log::warn!("failed to pack message: {}", e);
                return;
            }
        };
        for ep in self.snapshot() {
            if ep.ifindex == ifindex {
                ep.send(&data).await;
            }
        }
    }

    /// Sends a message unicast to `dst` over a family-matching endpoint.
    pub(crate) async fn send_unicast(&self, msg: &Message, dst: SocketAddr) {
        let data = match msg.pack() {
            Ok(d) => d,
            Err(e) => {
                log::warn!("failed to pack message: {}", e);
                return;
            }
        };
        if let Some(ep) = self
            .snapshot()
            .into_iter()
            .find(|ep| ep.addr.is_ipv4() == dst.is_ipv4())
        {
            ep.send_unicast(&data, dst).await;
        }
    }

    /// Closes every endpoint.
    pub(crate) fn close_all(&self) {
        let mut endpoints = self.endpoints.lock().unwrap();
        for ep in endpoints.values() {
            ep.close();
        }
        endpoints.clear();
    }
}
