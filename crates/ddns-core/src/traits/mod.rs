//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressProbe`]: Discover the current outbound address
//! - [`DnsProvider`]: Read and write DNS records via provider APIs

pub mod address_probe;
pub mod dns_provider;

pub use address_probe::{AddressProbe, IpVersion};
pub use dns_provider::{DnsProvider, DnsRecord};
