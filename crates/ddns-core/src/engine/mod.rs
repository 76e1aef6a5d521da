//! Core DDNS reconciler
//!
//! The Reconciler is responsible for:
//! - Probing the current local address via AddressProbe
//! - Reading the provider's records for the configured target
//! - Applying the minimal corrective action via DnsProvider
//! - Repeating that on a fixed interval until shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐      ┌──────────────┐      ┌──────────────┐
//! │ AddressProbe │◀─────│  Reconciler  │─────▶│ DnsProvider  │
//! │  (current)   │      └──────────────┘      │ (list/write) │
//! └──────────────┘              │             └──────────────┘
//!                               ▼
//!                        ┌─────────────┐
//!                        │   Events    │
//!                        │  (notify)   │
//!                        └─────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. Probe the address of the target's family
//! 2. List the provider's records for (domain, sub_domain, record_type)
//! 3. Classify them (`Absent` / `Single` / `Multiple`) and plan an action
//! 4. Apply the action
//! 5. Sleep for the interval (or a backoff delay after a failure)
//!
//! Every tick runs the same step, so states that appear after the first
//! convergence (records edited by hand in the provider console) are healed
//! on the next tick.

pub mod state;

pub use state::{Action, RecordState, plan};

use crate::config::{DdnsConfig, DomainTarget, RecordType};
use crate::error::{Error, Result};
use crate::traits::{AddressProbe, DnsProvider, DnsRecord};
use rand::Rng;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, Span, debug, error, info, warn};

/// Maximum fraction shaved off a backoff delay
const JITTER_RATIO: f64 = 0.2;

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Loop started
    Started {
        fqdn: String,
        record_type: RecordType,
    },

    /// A record was created for an absent target
    RecordCreated { record_id: String, value: IpAddr },

    /// Duplicates were deleted and one record was created
    RecordsReplaced {
        record_id: String,
        deleted: usize,
        failed: usize,
        value: IpAddr,
    },

    /// A record was modified in place
    RecordModified {
        record_id: String,
        previous: String,
        value: IpAddr,
    },

    /// The record already matched (no write issued)
    RecordUnchanged { record_id: String, value: IpAddr },

    /// Deleting one duplicate failed; remaining deletions continued
    DeleteFailed { record_id: String, error: String },

    /// A tick failed and will be retried after a backoff delay
    TickFailed {
        error: String,
        consecutive_failures: u32,
    },

    /// Loop stopped
    Stopped { reason: String },
}

/// Result of one successful reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Target was absent; one record created
    Created { record_id: String, value: IpAddr },

    /// Target had duplicates; they were deleted and one record created
    Replaced {
        record_id: String,
        deleted: usize,
        failed: usize,
        value: IpAddr,
    },

    /// Single record rewritten in place
    Modified {
        record_id: String,
        previous: String,
        value: IpAddr,
    },

    /// Single record already correct
    Unchanged { record_id: String, value: IpAddr },
}

impl Outcome {
    /// Whether the pass issued a provider write
    pub fn wrote(&self) -> bool {
        !matches!(self, Outcome::Unchanged { .. })
    }
}

/// Core DDNS reconciler
///
/// Keeps exactly one provider record for the configured [`DomainTarget`]
/// pointing at the host's current address.
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Start with [`Reconciler::run()`], passing a shutdown receiver
/// 3. Send `true` on the shutdown channel (or drop the sender) to stop
///
/// ## Cancellation
///
/// The shutdown signal is checked before the probe, before and after the
/// listing call, and during the sleep between ticks. Once an action starts
/// writing it runs to completion so a replacement never stops halfway.
///
/// ## Deadlines
///
/// Each provider call is bounded by `request_timeout`; a call that exceeds
/// it fails the tick with [`Error::Timeout`].
pub struct Reconciler {
    /// Record to keep in sync
    target: DomainTarget,

    /// Local address source
    probe: Box<dyn AddressProbe>,

    /// DNS provider for reading and writing records
    provider: Box<dyn DnsProvider>,

    /// Delay between successful ticks
    interval: Duration,

    /// Deadline for each provider call
    request_timeout: Duration,

    /// First delay after a failed tick
    retry_base: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,

    /// Span every log line of this reconciler is recorded in
    span: Span,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `probe`: Address probe implementation
    /// - `provider`: DNS provider implementation
    /// - `config`: DDNS configuration
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields engine events
    pub fn new(
        probe: Box<dyn AddressProbe>,
        provider: Box<dyn DnsProvider>,
        config: DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let span = tracing::info_span!(
            "reconciler",
            fqdn = %config.dns.fqdn(),
            record_type = %config.dns.record_type,
            provider = provider.provider_name(),
        );

        let reconciler = Self {
            interval: config.engine.interval(),
            request_timeout: config.engine.request_timeout(),
            retry_base: config.engine.retry_base(),
            target: config.dns,
            probe,
            provider,
            event_tx: tx,
            span,
        };

        Ok((reconciler, rx))
    }

    /// Override the delay between ticks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the per-call deadline
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Override the first retry delay
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    /// Record this reconciler's logs inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The managed target
    pub fn target(&self) -> &DomainTarget {
        &self.target
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(Outcome)`: The target now has exactly one correct record
    ///   (unless a duplicate deletion failed, see [`Outcome::Replaced`])
    /// - `Err(Error)`: Probe or provider failure; nothing after the failing
    ///   step was attempted
    pub async fn reconcile_once(&self) -> Result<Outcome> {
        self.reconcile(None).instrument(self.span.clone()).await
    }

    /// Run the reconciliation loop until shutdown
    ///
    /// Errors inside a tick are logged and retried; they never end the loop.
    ///
    /// # Parameters
    ///
    /// - `shutdown`: Receiver that stops the loop when it observes `true`
    ///   or when its sender is dropped
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let span = self.span.clone();

        async move {
            self.emit_event(EngineEvent::Started {
                fqdn: self.target.fqdn(),
                record_type: self.target.record_type,
            });
            info!(interval = ?self.interval, "Reconciler started");

            let mut failures: u32 = 0;

            loop {
                let delay = match self.reconcile(Some(&shutdown)).await {
                    Ok(outcome) => {
                        if failures > 0 {
                            info!(after_failures = failures, "Reconciliation recovered");
                        }
                        debug!(?outcome, "Tick complete");
                        failures = 0;
                        self.interval
                    }
                    Err(Error::Cancelled) => break,
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        let delay = backoff_delay(self.retry_base, self.interval, failures);
                        error!(
                            error = %e,
                            consecutive_failures = failures,
                            retry_in = ?delay,
                            "Reconciliation tick failed"
                        );
                        self.emit_event(EngineEvent::TickFailed {
                            error: e.to_string(),
                            consecutive_failures: failures,
                        });
                        delay
                    }
                };

                if is_shutdown(&shutdown) {
                    break;
                }

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            debug!("Shutdown sender dropped");
                            break;
                        }
                    }
                }

                if is_shutdown(&shutdown) {
                    break;
                }
            }

            info!("Shutdown signal received, reconciler stopped");
            self.emit_event(EngineEvent::Stopped {
                reason: "Shutdown signal".to_string(),
            });

            Ok(())
        }
        .instrument(span)
        .await
    }

    /// One pass: probe, list, plan, apply
    async fn reconcile(&self, shutdown: Option<&watch::Receiver<bool>>) -> Result<Outcome> {
        ensure_running(shutdown)?;

        let version = self.target.record_type.ip_version();
        let address = self.probe.current(version).await?;
        if !version.matches(&address) {
            return Err(Error::probe(format!(
                "probe returned {} for an {} record",
                address, version
            )));
        }
        debug!(%address, "Probed local address");

        ensure_running(shutdown)?;

        let records = self
            .call(
                "list",
                self.provider.list_records(
                    &self.target.domain,
                    Some(self.target.host_label()),
                    Some(self.target.record_type),
                ),
            )
            .await?;

        ensure_running(shutdown)?;

        let state = RecordState::from_records(records);
        debug!(state = state.name(), "Observed provider records");

        match plan(state, &address, &self.target) {
            Action::Noop(record) => {
                debug!(record_id = %record.id, %address, "Record already up to date");
                self.emit_event(EngineEvent::RecordUnchanged {
                    record_id: record.id.clone(),
                    value: address,
                });
                Ok(Outcome::Unchanged {
                    record_id: record.id,
                    value: address,
                })
            }
            Action::Create => {
                let record_id = self.create(address).await?;
                self.emit_event(EngineEvent::RecordCreated {
                    record_id: record_id.clone(),
                    value: address,
                });
                Ok(Outcome::Created {
                    record_id,
                    value: address,
                })
            }
            Action::Modify(record) => self.modify(record, address).await,
            Action::ReplaceAll(stale) => self.replace_all(stale, address).await,
        }
    }

    async fn create(&self, address: IpAddr) -> Result<String> {
        let value = address.to_string();

        match self
            .call("create", self.provider.create_record(&self.target, &value))
            .await
        {
            Ok(record_id) => {
                info!(%record_id, %value, line = %self.target.record_line, "Created DNS record");
                Ok(record_id)
            }
            Err(e) => {
                error!(%value, error = %e, "Failed to create DNS record");
                Err(e)
            }
        }
    }

    async fn modify(&self, record: DnsRecord, address: IpAddr) -> Result<Outcome> {
        let value = address.to_string();

        if let Err(e) = self
            .call(
                "modify",
                self.provider.modify_record(&self.target, &record.id, &value),
            )
            .await
        {
            error!(record_id = %record.id, %value, error = %e, "Failed to modify DNS record");
            return Err(e);
        }

        info!(
            record_id = %record.id,
            previous = %record.value,
            previous_line = %record.line,
            %value,
            line = %self.target.record_line,
            "Modified DNS record"
        );
        self.emit_event(EngineEvent::RecordModified {
            record_id: record.id.clone(),
            previous: record.value.clone(),
            value: address,
        });

        Ok(Outcome::Modified {
            record_id: record.id,
            previous: record.value,
            value: address,
        })
    }

    async fn replace_all(&self, stale: Vec<DnsRecord>, address: IpAddr) -> Result<Outcome> {
        warn!(count = stale.len(), "Found duplicate DNS records, replacing them");

        let mut deleted = 0;
        let mut failed = 0;

        for record in &stale {
            match self
                .call(
                    "delete",
                    self.provider.delete_record(&self.target.domain, &record.id),
                )
                .await
            {
                Ok(()) => {
                    deleted += 1;
                    info!(record_id = %record.id, value = %record.value, "Deleted DNS record");
                }
                Err(e) => {
                    failed += 1;
                    error!(
                        record_id = %record.id,
                        value = %record.value,
                        error = %e,
                        "Failed to delete DNS record"
                    );
                    self.emit_event(EngineEvent::DeleteFailed {
                        record_id: record.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let record_id = self.create(address).await?;
        self.emit_event(EngineEvent::RecordsReplaced {
            record_id: record_id.clone(),
            deleted,
            failed,
            value: address,
        });

        Ok(Outcome::Replaced {
            record_id,
            deleted,
            failed,
            value: address,
        })
    }

    /// Await one provider call under the per-call deadline
    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "{} {} did not complete within {:?}",
                self.provider.provider_name(),
                operation,
                self.request_timeout
            ))),
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full or closed, dropping event");
        }
    }
}

fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

fn ensure_running(shutdown: Option<&watch::Receiver<bool>>) -> Result<()> {
    match shutdown {
        Some(rx) if is_shutdown(rx) => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Delay before the next tick after `failures` consecutive failed ticks
///
/// `retry_base * 2^(failures - 1)`, capped at `interval`, minus up to
/// `JITTER_RATIO` of random jitter.
pub(crate) fn backoff_delay(retry_base: Duration, interval: Duration, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(20);
    let delay = retry_base.saturating_mul(1u32 << exponent).min(interval);
    let jitter = rand::rng().random_range(0.0..JITTER_RATIO);
    delay.saturating_sub(delay.mul_f64(jitter))
}
