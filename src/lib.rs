//! # mdns-peer
//!
//! A multicast DNS (mDNS) / DNS-SD peer for Rust.
//!
//! A peer announces local services on the link, discovers services
//! announced by other peers, and resolves `.local.` names to addresses,
//! entirely over IPv4 and IPv6 link-local multicast UDP. There is no
//! central server: every peer multicasts its questions and its
//! authoritative answers on every usable interface (RFC 6762, RFC 6763).
//!
//! ## What's inside
//!
//! - A resource-record cache with per-record TTL expiry, cache-flush
//!   semantics and TTL=0 "goodbye" deletion.
//! - A multicast engine with one UDP socket per (interface, family), all
//!   feeding a single dispatcher.
//! - A service layer that answers queries from the local authoritative
//!   set, announces on a doubling schedule, and withdraws with goodbyes.
//! - Discovery with periodic queries, point-in-time snapshots and live
//!   membership watchers.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use mdns_peer::{Config, Mdns};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let peer = Mdns::new(Config::new("myhost")).await?;
//!
//!     // Announce a service on port 8080.
//!     peer.add_service("chat", "myhost", 8080, &["version=1"]).await?;
//!
//!     // Look for other instances of the same service.
//!     peer.subscribe_to_service("chat").await;
//!     tokio::time::sleep(std::time::Duration::from_secs(3)).await;
//!     for instance in peer.service_discovery("chat") {
//!         println!("found {instance}");
//!     }
//!
//!     // Or watch membership changes as they happen.
//!     let (mut members, watch) = peer.service_member_watch("chat");
//!     if let Some(delta) = members.recv().await {
//!         println!("membership change: {delta}");
//!     }
//!     watch.stop();
//!
//!     peer.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol notes
//!
//! - Queries and responses go to `224.0.0.251:5353` / `[ff02::fb]:5353`
//!   with TTL/hop-limit 255 and multicast loopback on; the groups are
//!   configurable for test rigs.
//! - The top bit of the class field is honored both ways: cache-flush on
//!   records, unicast-response on questions.
//! - Parsing is tolerant: a record with a corrupt length or unknown type
//!   degrades to an opaque body; only a corrupt message header drops the
//!   packet.

#![warn(rust_2018_idioms)]

pub(crate) mod cache;
pub mod config;
pub(crate) mod discovery;
pub(crate) mod endpoint;
pub(crate) mod engine;
pub mod error;
pub mod message;
pub(crate) mod peer;
pub(crate) mod service;

pub use cache::{ChangeHook, RrCache};
pub use config::{Config, MDNS_GROUP_IPV4, MDNS_GROUP_IPV6, MDNS_PORT};
pub use discovery::{ServiceInstance, WatchHandle};
pub use error::{Error, Result};
pub use peer::Mdns;
