//! Record-state machine
//!
//! Pure decision logic: classify what the provider holds for a target and
//! pick the corrective action. No I/O happens here.
//!
//! | Observed state | Action |
//! |---|---|
//! | `Absent` | `Create` |
//! | `Multiple` | `ReplaceAll` (delete every record, then create one) |
//! | `Single`, value or line differs | `Modify` (record id preserved) |
//! | `Single`, value and line match | `Noop` |

use crate::config::DomainTarget;
use crate::traits::DnsRecord;
use std::net::IpAddr;

/// Provider-side representation of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    /// No record exists
    Absent,
    /// Exactly one record exists
    Single(DnsRecord),
    /// More than one record exists (anomaly)
    Multiple(Vec<DnsRecord>),
}

impl RecordState {
    /// Classify a successful listing
    pub fn from_records(mut records: Vec<DnsRecord>) -> Self {
        match records.len() {
            0 => RecordState::Absent,
            1 => RecordState::Single(records.remove(0)),
            _ => RecordState::Multiple(records),
        }
    }

    /// Short name for logs and events
    pub fn name(&self) -> &'static str {
        match self {
            RecordState::Absent => "absent",
            RecordState::Single(_) => "single",
            RecordState::Multiple(_) => "multiple",
        }
    }
}

/// Corrective action for one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create one record
    Create,
    /// Delete all of these, then create one record
    ReplaceAll(Vec<DnsRecord>),
    /// Rewrite this record in place
    Modify(DnsRecord),
    /// Record already correct
    Noop(DnsRecord),
}

impl Action {
    /// Whether the action issues any provider write
    pub fn is_write(&self) -> bool {
        !matches!(self, Action::Noop(_))
    }
}

/// Decide the corrective action for `state` given the current address
pub fn plan(state: RecordState, address: &IpAddr, target: &DomainTarget) -> Action {
    match state {
        RecordState::Absent => Action::Create,
        RecordState::Multiple(records) => Action::ReplaceAll(records),
        RecordState::Single(record) => {
            if record.points_to(address) && record.line == target.record_line {
                Action::Noop(record)
            } else {
                Action::Modify(record)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordType;

    fn target() -> DomainTarget {
        DomainTarget::new("example.com", RecordType::A, "默认").with_sub_domain("home")
    }

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_classify_listing() {
        assert_eq!(RecordState::from_records(vec![]), RecordState::Absent);

        let one = DnsRecord::new("1", "1.2.3.4", "默认");
        assert_eq!(
            RecordState::from_records(vec![one.clone()]),
            RecordState::Single(one.clone())
        );

        let two = DnsRecord::new("2", "1.2.3.5", "默认");
        let state = RecordState::from_records(vec![one, two]);
        assert_eq!(state.name(), "multiple");
    }

    #[test]
    fn test_absent_creates() {
        let action = plan(RecordState::Absent, &addr("1.2.3.4"), &target());
        assert_eq!(action, Action::Create);
        assert!(action.is_write());
    }

    #[test]
    fn test_multiple_replaces_all() {
        let records = vec![
            DnsRecord::new("1", "1.2.3.3", "默认"),
            DnsRecord::new("2", "1.2.3.4", "默认"),
        ];
        // Even when one of them already matches, duplicates are replaced
        let action = plan(
            RecordState::Multiple(records.clone()),
            &addr("1.2.3.4"),
            &target(),
        );
        assert_eq!(action, Action::ReplaceAll(records));
    }

    #[test]
    fn test_single_matching_is_noop() {
        let record = DnsRecord::new("7", "1.2.3.4", "默认");
        let action = plan(RecordState::Single(record.clone()), &addr("1.2.3.4"), &target());
        assert_eq!(action, Action::Noop(record));
        assert!(!action.is_write());
    }

    #[test]
    fn test_single_value_drift_modifies() {
        let record = DnsRecord::new("7", "1.2.3.4", "默认");
        let action = plan(RecordState::Single(record.clone()), &addr("1.2.3.9"), &target());
        assert_eq!(action, Action::Modify(record));
    }

    #[test]
    fn test_single_line_drift_modifies() {
        let record = DnsRecord::new("7", "1.2.3.4", "电信");
        let action = plan(RecordState::Single(record.clone()), &addr("1.2.3.4"), &target());
        assert_eq!(action, Action::Modify(record));
    }
}
