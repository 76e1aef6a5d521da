// # Address Probe Trait
//
// Defines the interface for discovering the host's current outbound address.
//
// ## Implementations
//
// - UDP socket routing lookup: `ddns-ip-socket` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::AddressProbe;
// use ddns_core::traits::IpVersion;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let probe = /* AddressProbe implementation */;
//
//     let v6 = probe.current(IpVersion::V6).await?;
//     println!("outbound IPv6: {}", v6);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Whether `ip` belongs to this family
    pub fn matches(&self, ip: &IpAddr) -> bool {
        matches!(
            (self, ip),
            (IpVersion::V4, IpAddr::V4(_)) | (IpVersion::V6, IpAddr::V6(_))
        )
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IpVersion::V4 => "IPv4",
            IpVersion::V6 => "IPv6",
        })
    }
}

/// Trait for local address probes
///
/// A probe answers one question: which local address would the OS use for
/// outbound traffic of the given family right now.
///
/// # Contract
///
/// - Every call re-reads the address; implementations must not cache.
/// - The returned address is of the requested family.
/// - When the family has no route (e.g., no IPv6 connectivity) the call
///   fails with [`Error::Probe`](crate::Error::Probe). It never falls back
///   to the other family.
#[async_trait]
pub trait AddressProbe: Send + Sync {
    /// Get the current outbound address of the given family
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The current address
    /// - `Err(Error::Probe)`: If no address is available for that family
    async fn current(&self, version: IpVersion) -> Result<IpAddr, crate::Error>;
}
