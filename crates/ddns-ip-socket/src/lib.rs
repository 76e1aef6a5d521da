// # Socket Address Probe
//
// This crate provides the UDP-socket based address probe for the DDNS system.
//
// ## How it works
//
// A UDP socket is bound to the unspecified address of the requested family
// and `connect`ed to a well-known public endpoint. Connecting a datagram
// socket sends nothing; it only makes the kernel pick a route and a source
// address. That source address, read back with `local_addr()`, is the
// address other hosts would see traffic coming from (before any NAT).
//
// ## Notes
//
// - No packet leaves the host, so the probe works without outbound access
//   to the target as long as a route exists.
// - Behind NAT this yields the private address. That matches what the
//   daemon is meant to publish for IPv6, where addresses are global.

use ddns_core::config::ProbeConfig;
use ddns_core::traits::{AddressProbe, IpVersion};
use ddns_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

/// Address probe backed by a routing lookup on a connected UDP socket
#[derive(Debug, Clone)]
pub struct SocketAddressProbe {
    /// Endpoint steering the IPv4 route lookup
    ipv4_target: SocketAddr,

    /// Endpoint steering the IPv6 route lookup
    ipv6_target: SocketAddr,
}

impl SocketAddressProbe {
    /// Create a probe from the `[probe]` configuration section
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            ipv4_target: config.ipv4_target,
            ipv6_target: config.ipv6_target,
        }
    }

    fn target(&self, version: IpVersion) -> SocketAddr {
        match version {
            IpVersion::V4 => self.ipv4_target,
            IpVersion::V6 => self.ipv6_target,
        }
    }

    async fn lookup(&self, version: IpVersion) -> Result<IpAddr> {
        let target = self.target(version);
        if !version.matches(&target.ip()) {
            return Err(Error::probe(format!(
                "{} probe target {} is not an {} address",
                version, target, version
            )));
        }

        let bind: SocketAddr = match version {
            IpVersion::V4 => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpVersion::V6 => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|e| Error::probe(format!("Cannot open {} socket: {}", version, e)))?;

        socket
            .connect(target)
            .await
            .map_err(|e| Error::probe(format!("No {} route to {}: {}", version, target, e)))?;

        let local = socket
            .local_addr()
            .map_err(|e| Error::probe(format!("Cannot read local {} address: {}", version, e)))?
            .ip();

        if local.is_unspecified() {
            return Err(Error::probe(format!(
                "Kernel selected no {} source address for {}",
                version, target
            )));
        }

        Ok(local)
    }
}

#[async_trait::async_trait]
impl AddressProbe for SocketAddressProbe {
    async fn current(&self, version: IpVersion) -> Result<IpAddr> {
        match self.lookup(version).await {
            Ok(ip) => {
                tracing::debug!(%version, address = %ip, "Probed outbound address");
                Ok(ip)
            }
            Err(e) => {
                tracing::warn!(%version, error = %e, "Address probe failed");
                Err(e)
            }
        }
    }
}
