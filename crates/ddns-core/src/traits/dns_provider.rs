// # DNS Provider Trait
//
// Defines the interface for reading and writing DNS records via a provider API.
//
// ## Implementations
//
// - Tencent Cloud DNSPod: `ddns-provider-dnspod` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
// use ddns_core::config::RecordType;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let records = provider
//         .list_records("example.com", Some("home"), Some(RecordType::A))
//         .await?;
//
//     for record in records {
//         println!("{} -> {} ({})", record.id, record.value, record.line);
//     }
//
//     Ok(())
// }
// ```

use crate::config::{DomainTarget, RecordType};
use async_trait::async_trait;
use std::net::IpAddr;

/// One provider-side DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// The record ID (provider-specific, opaque)
    pub id: String,
    /// The record value (an IP address for A/AAAA)
    pub value: String,
    /// The provider routing line
    pub line: String,
}

impl DnsRecord {
    /// Create a new record
    pub fn new(id: impl Into<String>, value: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            line: line.into(),
        }
    }

    /// Whether the record value denotes `address`
    ///
    /// Values are compared as addresses when they parse, so differently
    /// formatted IPv6 text still matches.
    pub fn points_to(&self, address: &IpAddr) -> bool {
        match self.value.trim().parse::<IpAddr>() {
            Ok(ip) => ip == *address,
            Err(_) => self.value == address.to_string(),
        }
    }
}

/// Trait for DNS provider implementations
///
/// This trait defines the interface for managing A/AAAA records.
/// Implementations must handle the specifics of each provider's API.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Single-shot calls
///
/// Every method performs exactly one remote request. Providers do not retry,
/// batch, cache, or decide whether a write is needed; the `Reconciler` owns
/// those decisions and the per-call deadline.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List records for a (sub)domain
    ///
    /// # Parameters
    ///
    /// - `domain`: The registered domain (e.g., "example.com")
    /// - `sub_domain`: Host label; `None` means the apex
    /// - `record_type`: Restrict the listing to one type
    ///
    /// # Returns
    ///
    /// - `Ok(vec![])`: The provider has no matching record
    /// - `Ok(records)`: The matching records
    /// - `Err(Error)`: Transport, authentication, or API failure. Never
    ///   reported as an empty listing.
    async fn list_records(
        &self,
        domain: &str,
        sub_domain: Option<&str>,
        record_type: Option<RecordType>,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create a record for the target pointing at `value`
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The new record's ID
    /// - `Err(Error)`: If the create failed
    async fn create_record(
        &self,
        target: &DomainTarget,
        value: &str,
    ) -> Result<String, crate::Error>;

    /// Rewrite an existing record in place, keeping its ID
    ///
    /// Type and line are taken from `target`.
    async fn modify_record(
        &self,
        target: &DomainTarget,
        record_id: &str,
        value: &str,
    ) -> Result<(), crate::Error>;

    /// Delete a record by ID
    async fn delete_record(&self, domain: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_to_compares_addresses() {
        let record = DnsRecord::new("1", "2001:DB8:0:0::1", "默认");
        assert!(record.points_to(&"2001:db8::1".parse().unwrap()));
        assert!(!record.points_to(&"2001:db8::2".parse().unwrap()));

        let record = DnsRecord::new("2", "1.2.3.4", "默认");
        assert!(record.points_to(&IpAddr::from([1, 2, 3, 4])));
        assert!(!record.points_to(&IpAddr::from([1, 2, 3, 5])));
    }

    #[test]
    fn test_points_to_unparseable_value() {
        let record = DnsRecord::new("3", "not-an-ip", "默认");
        assert!(!record.points_to(&IpAddr::from([1, 2, 3, 4])));
    }
}
