// # ddns-core
//
// Core library for the DDNS reconciliation daemon.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping one DNS record in
// sync with the host's outbound address:
// - **AddressProbe**: Trait for discovering the current local address
// - **DnsProvider**: Trait for listing and writing records via provider APIs
// - **Reconciler**: Periodic loop that converges the provider onto the probed address
// - **RecordState / plan**: Pure state machine deciding the corrective action
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Reconcile, don't cache**: Every tick reads the provider's actual state
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: A tick against a converged record issues no writes

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{AddressProbe, DnsProvider, DnsRecord, IpVersion};
pub use engine::{EngineEvent, Outcome, Reconciler};
pub use config::{DdnsConfig, DomainTarget, RecordType};
pub use error::{Error, Result};
