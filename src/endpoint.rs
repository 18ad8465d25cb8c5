//! Per-interface multicast UDP endpoints.
//!
//! One [`Endpoint`] exists per (interface, address family). The socket is
//! configured before it becomes a tokio socket: reuse-address/port so
//! several peers can share the port, joined to the mDNS group on its
//! specific interface, TTL/hop-limit 255 and multicast loopback on, both
//! required by RFC 6762.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Notify;

use crate::config::MULTICAST_TTL;
use crate::error::Result;

pub(crate) struct Endpoint {
    pub(crate) socket: UdpSocket,
    /// Multicast destination for sends, scope-qualified for IPv6.
    pub(crate) group: SocketAddr,
    pub(crate) ifname: String,
    pub(crate) ifindex: u32,
    /// The interface address, used when synthesizing A/AAAA records.
    pub(crate) addr: IpAddr,
    closed: Notify,
}

impl Endpoint {
    pub(crate) fn v4(
        ifname: &str,
        ifindex: u32,
        ifaddr: Ipv4Addr,
        group: SocketAddrV4,
    ) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;

        // Binding the group address filters unrelated unicast traffic, but
        // only Linux accepts it; elsewhere the wildcard must do.
        let bind_ip = if cfg!(target_os = "linux") {
            IpAddr::V4(*group.ip())
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };
        socket.bind(&SocketAddr::new(bind_ip, group.port()).into())?;

        socket.join_multicast_v4(group.ip(), &ifaddr)?;
        socket.set_multicast_if_v4(&ifaddr)?;
        socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
        socket.set_multicast_loop_v4(true)?;

        Ok(Endpoint {
            socket: UdpSocket::from_std(socket.into())?,
            group: SocketAddr::V4(group),
            ifname: ifname.to_owned(),
            ifindex,
            addr: IpAddr::V4(ifaddr),
            closed: Notify::new(),
        })
    }

    pub(crate) fn v6(
        ifname: &str,
        ifindex: u32,
        ifaddr: Ipv6Addr,
        group: SocketAddrV6,
    ) -> Result<Self> {
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_only_v6(true)?;
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;

        let bind = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, group.port(), 0, 0);
        socket.bind(&SocketAddr::V6(bind).into())?;

        socket.join_multicast_v6(group.ip(), ifindex)?;
        socket.set_multicast_if_v6(ifindex)?;
        socket.set_multicast_hops_v6(MULTICAST_TTL)?;
        socket.set_multicast_loop_v6(true)?;

        // Sends need the interface scope on the group address.
        let dest = SocketAddrV6::new(*group.ip(), group.port(), 0, ifindex);

        Ok(Endpoint {
            socket: UdpSocket::from_std(socket.into())?,
            group: SocketAddr::V6(dest),
            ifname: ifname.to_owned(),
            ifindex,
            addr: IpAddr::V6(ifaddr),
            closed: Notify::new(),
        })
    }

    /// Sends one packet to the multicast group. Failures are drops; mDNS
    /// retries through re-announce and query backoff.
    pub(crate) async fn send(&self, payload: &[u8]) {
        match self.socket.send_to(payload, self.group).await {
            Ok(n) => log::trace!("sent {} bytes on {} to {}", n, self.ifname, self.group),
            Err(e) => log::debug!("send on {} to {}: {}", self.ifname, self.group, e),
        }
    }

    /// Sends one packet to a unicast destination.
    pub(crate) async fn send_unicast(&self, payload: &[u8], dst: SocketAddr) {
        match self.socket.send_to(payload, dst).await {
            Ok(n) => log::trace!("sent {} bytes on {} to {}", n, self.ifname, dst),
            Err(e) => log::debug!("send on {} to {}: {}", self.ifname, dst, e),
        }
    }

    /// Tells the endpoint's receive loop to exit.
    pub(crate) fn close(&self) {
        self.closed.notify_one();
    }

    pub(crate) async fn wait_closed(&self) {
        self.closed.notified().await;
    }
}
