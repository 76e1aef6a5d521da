//! Contract Test: Record-State Reconciliation
//!
//! One pass must leave exactly one record pointing at the probed address,
//! whatever the provider held before.
//!
//! Constraints verified:
//! - Absent → one create
//! - Multiple → every record deleted, then one create
//! - Single with the right value and line → no write at all
//! - The listing is scoped to (domain, host label, record type)

mod common;

use common::*;
use ddns_core::config::RecordType;
use ddns_core::{EngineEvent, Outcome};
use tokio_test::assert_ok;

#[tokio::test]
async fn absent_record_is_created() {
    let probe = ScriptedProbe::fixed("1.2.3.4");
    let provider = FakeProvider::new();
    let (reconciler, mut events) = reconciler_for(&probe, &provider, minimal_config(RecordType::A));

    let outcome = assert_ok!(reconciler.reconcile_once().await);

    assert!(matches!(outcome, Outcome::Created { .. }));
    assert_eq!(provider.create_calls(), 1);
    assert_eq!(provider.modify_calls() + provider.delete_calls(), 0);

    let records = provider.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, "1.2.3.4");
    assert_eq!(records[0].line, "默认");

    assert!(matches!(
        drain_events(&mut events).as_slice(),
        [EngineEvent::RecordCreated { .. }]
    ));
}

#[tokio::test]
async fn aaaa_record_is_created_from_ipv6_probe() {
    let probe = ScriptedProbe::fixed("2001:db8::1");
    let provider = FakeProvider::new();
    let (reconciler, _events) =
        reconciler_for(&probe, &provider, minimal_config(RecordType::Aaaa));

    assert_ok!(reconciler.reconcile_once().await);

    assert_eq!(provider.create_calls(), 1);
    assert_eq!(provider.created_values(), vec!["2001:db8::1".to_string()]);
    assert_eq!(
        provider.last_list().unwrap().record_type,
        Some(RecordType::Aaaa)
    );
}

#[tokio::test]
async fn duplicates_are_replaced_by_one_record() {
    let probe = ScriptedProbe::fixed("1.2.3.5");
    let provider = FakeProvider::with_records(vec![record("1", "1.2.3.3"), record("2", "1.2.3.4")]);
    let (reconciler, mut events) = reconciler_for(&probe, &provider, minimal_config(RecordType::A));

    let outcome = assert_ok!(reconciler.reconcile_once().await);

    match outcome {
        Outcome::Replaced { deleted, failed, value, .. } => {
            assert_eq!(deleted, 2);
            assert_eq!(failed, 0);
            assert_eq!(value.to_string(), "1.2.3.5");
        }
        other => panic!("expected replacement, got {other:?}"),
    }

    let mut deleted = provider.deleted_ids();
    deleted.sort();
    assert_eq!(deleted, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(provider.created_values(), vec!["1.2.3.5".to_string()]);
    assert_eq!(provider.modify_calls(), 0);

    let records = provider.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, "1.2.3.5");

    assert!(drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, EngineEvent::RecordsReplaced { deleted: 2, .. })));
}

#[tokio::test]
async fn duplicates_are_replaced_even_when_one_matches() {
    let probe = ScriptedProbe::fixed("1.2.3.4");
    let provider = FakeProvider::with_records(vec![
        record("1", "1.2.3.4"),
        record("2", "1.2.3.4"),
        record("3", "9.9.9.9"),
    ]);
    let (reconciler, _events) = reconciler_for(&probe, &provider, minimal_config(RecordType::A));

    assert_ok!(reconciler.reconcile_once().await);

    assert_eq!(provider.delete_calls(), 3);
    assert_eq!(provider.create_calls(), 1);
    assert_eq!(provider.records().len(), 1);
}

#[tokio::test]
async fn matching_single_record_is_left_alone() {
    let probe = ScriptedProbe::fixed("1.2.3.4");
    let provider = FakeProvider::with_records(vec![record("7", "1.2.3.4")]);
    let (reconciler, mut events) = reconciler_for(&probe, &provider, minimal_config(RecordType::A));

    let outcome = assert_ok!(reconciler.reconcile_once().await);

    assert!(!outcome.wrote());
    assert_eq!(provider.list_calls(), 1);
    assert_eq!(provider.write_calls(), 0, "a converged record must not be rewritten");
    assert!(matches!(
        drain_events(&mut events).as_slice(),
        [EngineEvent::RecordUnchanged { record_id, .. }] if record_id == "7"
    ));
}

#[tokio::test]
async fn stale_single_record_is_modified_in_place() {
    let probe = ScriptedProbe::fixed("1.2.3.9");
    let provider = FakeProvider::with_records(vec![record("7", "1.2.3.4")]);
    let (reconciler, _events) = reconciler_for(&probe, &provider, minimal_config(RecordType::A));

    let outcome = assert_ok!(reconciler.reconcile_once().await);

    assert_eq!(
        outcome,
        Outcome::Modified {
            record_id: "7".to_string(),
            previous: "1.2.3.4".to_string(),
            value: "1.2.3.9".parse().unwrap(),
        }
    );
    assert_eq!(provider.modify_calls(), 1);
    assert_eq!(provider.create_calls() + provider.delete_calls(), 0);
    assert_eq!(provider.records(), vec![record("7", "1.2.3.9")]);
}

#[tokio::test]
async fn listing_is_scoped_to_the_target() {
    let probe = ScriptedProbe::fixed("1.2.3.4");
    let provider = FakeProvider::new();
    let (reconciler, _events) = reconciler_for(&probe, &provider, minimal_config(RecordType::A));

    assert_ok!(reconciler.reconcile_once().await);

    assert_eq!(
        provider.last_list(),
        Some(ListArgs {
            domain: "example.com".to_string(),
            sub_domain: Some("home".to_string()),
            record_type: Some(RecordType::A),
        })
    );
}

#[tokio::test]
async fn apex_target_lists_with_at_label() {
    let probe = ScriptedProbe::fixed("1.2.3.4");
    let provider = FakeProvider::new();
    let mut config = minimal_config(RecordType::A);
    config.dns.sub_domain = None;
    let (reconciler, _events) = reconciler_for(&probe, &provider, config);

    assert_ok!(reconciler.reconcile_once().await);

    assert_eq!(provider.last_list().unwrap().sub_domain.as_deref(), Some("@"));
}
