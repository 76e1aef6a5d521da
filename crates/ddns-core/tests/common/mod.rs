//! Test doubles and common utilities for reconciler contract tests
//!
//! - [`FakeProvider`]: in-memory record store with call counters and
//!   failure injection
//! - [`ScriptedProbe`]: returns a queued sequence of addresses or failures
//!
//! Both are `Clone` and share their state between clones, so a test keeps
//! one handle for assertions and boxes another into the Reconciler.

#![allow(dead_code)]

use ddns_core::config::{
    ApiConfig, DdnsConfig, DomainTarget, EngineConfig, LogConfig, ProbeConfig, RecordType,
};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{AddressProbe, DnsProvider, DnsRecord, IpVersion};
use ddns_core::{EngineEvent, Reconciler};
use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Arguments of the most recent `list_records` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListArgs {
    pub domain: String,
    pub sub_domain: Option<String>,
    pub record_type: Option<RecordType>,
}

#[derive(Default)]
struct ProviderState {
    records: Mutex<Vec<DnsRecord>>,
    next_id: AtomicU64,

    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    modify_calls: AtomicUsize,
    delete_calls: AtomicUsize,

    created_values: Mutex<Vec<String>>,
    deleted_ids: Mutex<Vec<String>>,
    last_list: Mutex<Option<ListArgs>>,

    fail_list: AtomicBool,
    fail_create: AtomicBool,
    fail_modify: AtomicBool,
    failing_deletes: Mutex<HashSet<String>>,
    list_delay: Mutex<Option<Duration>>,
}

/// In-memory DnsProvider
#[derive(Clone, Default)]
pub struct FakeProvider {
    state: Arc<ProviderState>,
}

impl FakeProvider {
    /// Provider holding no records
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Provider pre-seeded with `records`
    pub fn with_records(records: Vec<DnsRecord>) -> Self {
        let provider = Self::default();
        provider.state.next_id.store(1000, Ordering::SeqCst);
        *provider.state.records.lock().unwrap() = records;
        provider
    }

    /// Current provider-side records
    pub fn records(&self) -> Vec<DnsRecord> {
        self.state.records.lock().unwrap().clone()
    }

    /// Replace the records (simulates edits made outside the daemon)
    pub fn set_records(&self, records: Vec<DnsRecord>) {
        *self.state.records.lock().unwrap() = records;
    }

    pub fn list_calls(&self) -> usize {
        self.state.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.state.create_calls.load(Ordering::SeqCst)
    }

    pub fn modify_calls(&self) -> usize {
        self.state.modify_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.state.delete_calls.load(Ordering::SeqCst)
    }

    /// Total number of write calls (create + modify + delete)
    pub fn write_calls(&self) -> usize {
        self.create_calls() + self.modify_calls() + self.delete_calls()
    }

    /// Any provider call at all
    pub fn total_calls(&self) -> usize {
        self.list_calls() + self.write_calls()
    }

    pub fn created_values(&self) -> Vec<String> {
        self.state.created_values.lock().unwrap().clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.state.deleted_ids.lock().unwrap().clone()
    }

    pub fn last_list(&self) -> Option<ListArgs> {
        self.state.last_list.lock().unwrap().clone()
    }

    /// Make `list_records` fail until reset
    pub fn fail_list(&self, fail: bool) {
        self.state.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_modify(&self, fail: bool) {
        self.state.fail_modify.store(fail, Ordering::SeqCst);
    }

    /// Make deleting `record_id` fail
    pub fn fail_delete(&self, record_id: &str) {
        self.state
            .failing_deletes
            .lock()
            .unwrap()
            .insert(record_id.to_string());
    }

    /// Make every `list_records` call take `delay`
    pub fn delay_list(&self, delay: Duration) {
        *self.state.list_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait::async_trait]
impl DnsProvider for FakeProvider {
    async fn list_records(
        &self,
        domain: &str,
        sub_domain: Option<&str>,
        record_type: Option<RecordType>,
    ) -> Result<Vec<DnsRecord>> {
        self.state.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.last_list.lock().unwrap() = Some(ListArgs {
            domain: domain.to_string(),
            sub_domain: sub_domain.map(str::to_string),
            record_type,
        });

        let delay = *self.state.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.state.fail_list.load(Ordering::SeqCst) {
            return Err(Error::http("injected list failure"));
        }

        Ok(self.records())
    }

    async fn create_record(&self, target: &DomainTarget, value: &str) -> Result<String> {
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.state.fail_create.load(Ordering::SeqCst) {
            return Err(Error::provider("fake", "injected create failure"));
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.state
            .records
            .lock()
            .unwrap()
            .push(DnsRecord::new(id.clone(), value, target.record_line.clone()));
        self.state
            .created_values
            .lock()
            .unwrap()
            .push(value.to_string());

        Ok(id)
    }

    async fn modify_record(
        &self,
        target: &DomainTarget,
        record_id: &str,
        value: &str,
    ) -> Result<()> {
        self.state.modify_calls.fetch_add(1, Ordering::SeqCst);

        if self.state.fail_modify.load(Ordering::SeqCst) {
            return Err(Error::rate_limited("injected modify failure"));
        }

        let mut records = self.state.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| Error::provider("fake", format!("no record {}", record_id)))?;

        record.value = value.to_string();
        record.line = target.record_line.clone();
        Ok(())
    }

    async fn delete_record(&self, _domain: &str, record_id: &str) -> Result<()> {
        self.state.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.state.failing_deletes.lock().unwrap().contains(record_id) {
            return Err(Error::provider("fake", format!("cannot delete {}", record_id)));
        }

        self.state.records.lock().unwrap().retain(|r| r.id != record_id);
        self.state
            .deleted_ids
            .lock()
            .unwrap()
            .push(record_id.to_string());
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Debug, Clone)]
enum Step {
    Address(IpAddr),
    Fail(String),
}

/// AddressProbe returning a scripted sequence
///
/// Each call consumes one step; the last step repeats forever.
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    steps: Arc<Mutex<VecDeque<Step>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    /// Probe that always returns `ip`
    pub fn fixed(ip: &str) -> Self {
        Self::sequence(&[ip])
    }

    /// Probe returning `ips` in order, then repeating the last one
    pub fn sequence(ips: &[&str]) -> Self {
        let probe = Self::default();
        for ip in ips {
            probe.push(ip);
        }
        probe
    }

    /// Probe that always fails
    pub fn failing(message: &str) -> Self {
        let probe = Self::default();
        probe.push_failure(message);
        probe
    }

    pub fn push(&self, ip: &str) {
        let ip = ip.parse().expect("test address parses");
        self.steps.lock().unwrap().push_back(Step::Address(ip));
    }

    pub fn push_failure(&self, message: &str) {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Fail(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressProbe for ScriptedProbe {
    async fn current(&self, _version: IpVersion) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().cloned()
            }
        };

        match step {
            Some(Step::Address(ip)) => Ok(ip),
            Some(Step::Fail(message)) => Err(Error::probe(message)),
            None => Err(Error::probe("no scripted address")),
        }
    }
}

/// Record shorthand with the default line
pub fn record(id: &str, value: &str) -> DnsRecord {
    DnsRecord::new(id, value, "默认")
}

/// Helper to create a minimal DdnsConfig for `home.example.com`
pub fn minimal_config(record_type: RecordType) -> DdnsConfig {
    DdnsConfig {
        api: ApiConfig {
            secret_id: "AKIDtest".to_string(),
            secret_key: "test-key".to_string(),
        },
        dns: DomainTarget::new("example.com", record_type, "默认").with_sub_domain("home"),
        log: LogConfig::default(),
        engine: EngineConfig {
            interval_secs: 3600,
            request_timeout_secs: 30,
            retry_base_secs: 1,
            event_channel_capacity: 100,
        },
        probe: ProbeConfig::default(),
    }
}

/// Build a reconciler over the given doubles
pub fn reconciler_for(
    probe: &ScriptedProbe,
    provider: &FakeProvider,
    config: DdnsConfig,
) -> (Reconciler, mpsc::Receiver<EngineEvent>) {
    Reconciler::new(Box::new(probe.clone()), Box::new(provider.clone()), config)
        .expect("reconciler construction succeeds")
}

/// Drain every event currently buffered
pub fn drain_events(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Poll `condition` every few milliseconds until it holds or `within` elapses
pub async fn wait_until(within: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
