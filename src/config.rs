//! Configuration for an mDNS peer.
//!
//! [`Config`] follows the builder pattern:
//!
//! ```rust
//! use mdns_peer::Config;
//!
//! let config = Config::new("myhost")
//!     .with_loopback_only(true);
//! ```

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;

/// The mDNS IPv4 multicast group (224.0.0.251:5353).
pub const MDNS_GROUP_IPV4: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(224, 0, 0, 251), MDNS_PORT);

/// The mDNS IPv6 multicast group ([ff02::fb]:5353).
pub const MDNS_GROUP_IPV6: SocketAddrV6 = SocketAddrV6::new(
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb),
    MDNS_PORT,
    0,
    0,
);

/// The standard mDNS port (5353).
pub const MDNS_PORT: u16 = 5353;

/// Multicast TTL / hop limit required by RFC 6762.
pub(crate) const MULTICAST_TTL: u32 = 255;

/// TTL in seconds for records this peer announces. 75 minutes, the RFC
/// 6762 §10 default, which outlives the longest re-announce gap.
pub(crate) const RESPONSE_TTL: u32 = 4500;

/// Grace period before a goodbye (TTL=0) record deletes its cache entries.
pub(crate) const GOODBYE_GRACE: Duration = Duration::from_secs(1);

/// Period of the internal tick driving the janitor, re-announces and
/// subscription queries.
pub(crate) const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// How many ticks between interface re-scans.
pub(crate) const IFACE_SCAN_TICKS: u64 = 10;

/// First re-announce / re-query delay; doubles until [`MAX_BACKOFF`].
pub(crate) const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Cap on the announce and query backoff.
pub(crate) const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// How long `resolve_address` waits for answers to arrive.
pub(crate) const RESOLVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Largest packet the receive path accepts.
pub(crate) const MAX_PACKET_SIZE: usize = 4096;

/// Configuration for an mDNS peer.
///
/// # Fields
///
/// - `host_name`: the unqualified host label this peer answers for
/// - `ipv4_group` / `ipv6_group`: the multicast groups to join (standard
///   mDNS groups by default; tests use private groups to stay off the LAN)
/// - `loopback_only`: restrict endpoints to loopback interfaces
#[derive(Clone, Debug)]
pub struct Config {
    /// Unqualified host label, e.g. `"printer"` for `printer.local.`.
    pub host_name: String,

    /// IPv4 multicast group and port.
    ///
    /// Default: `224.0.0.251:5353`.
    pub ipv4_group: SocketAddrV4,

    /// IPv6 multicast group and port.
    ///
    /// Default: `[ff02::fb]:5353`.
    pub ipv6_group: SocketAddrV6,

    /// When set, only loopback interfaces get endpoints. Multicast-capable
    /// non-loopback interfaces are used otherwise.
    ///
    /// Default: `false`.
    pub loopback_only: bool,
}

impl Config {
    /// Create a configuration for the given host label with the standard
    /// mDNS groups.
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            ipv4_group: MDNS_GROUP_IPV4,
            ipv6_group: MDNS_GROUP_IPV6,
            loopback_only: false,
        }
    }

    /// Override the IPv4 multicast group.
    pub fn with_ipv4_group(mut self, group: SocketAddrV4) -> Self {
        self.ipv4_group = group;
        self
    }

    /// Override the IPv6 multicast group.
    pub fn with_ipv6_group(mut self, group: SocketAddrV6) -> Self {
        self.ipv6_group = group;
        self
    }

    /// Restrict the peer to loopback interfaces.
    pub fn with_loopback_only(mut self, loopback_only: bool) -> Self {
        self.loopback_only = loopback_only;
        self
    }
}
