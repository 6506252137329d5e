//! Test: full pipeline success path

use crate::helpers::*;
use vcd_preflight::execution::RunState;
use vcd_preflight::persistence::keys;

#[tokio::test]
async fn test_eligible_environment_passes_and_reports_identifiers() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    let mut engine = engine_with(mock.clone(), &dir);

    let report = engine.execute().await.expect("preflight should pass");

    assert_eq!(report.source_org_vdc_id, "urn:vcloud:vdc:src");
    assert_eq!(report.edge_gateway_id, "urn:vcloud:gateway:edge1");
    assert_eq!(report.org_vdc_networks.len(), 1);
    assert!(report.bgp_config.is_some());
    // The bare-record IPSec site normalized to a one-element site list
    let ipsec = report.ipsec_config.expect("ipsec config captured");
    assert_eq!(ipsec.sites.unwrap().site.into_vec().len(), 1);

    assert_eq!(*engine.state(), RunState::Completed);
}

#[tokio::test]
async fn test_successful_run_accumulates_the_fact_document() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    let mut engine = engine_with(mock, &dir);

    engine.execute().await.expect("preflight should pass");

    let document = engine.store().read_all().unwrap();
    for key in [
        keys::ORGANIZATION,
        keys::SOURCE_ORG_VDC,
        keys::SOURCE_PROVIDER_VDC,
        keys::TARGET_PROVIDER_VDC,
        keys::SOURCE_EXTERNAL_NETWORK,
        keys::TARGET_EXTERNAL_NETWORK,
        keys::DUMMY_EXTERNAL_NETWORK,
        keys::SOURCE_ORG_VDC_COMPUTE_POLICY_LIST,
        keys::SOURCE_VM_AFFINITY_RULES,
        keys::SOURCE_EDGE_GATEWAY,
        keys::SOURCE_ORG_VDC_NETWORKS,
        keys::SOURCE_EDGE_GATEWAY_DHCP,
        keys::SOURCE_EDGE_GATEWAY_FIREWALL,
        keys::SOURCE_EDGE_GATEWAY_NAT,
        keys::SOURCE_EDGE_GATEWAY_ROUTING,
    ] {
        assert!(document.contains_key(key), "fact '{}' missing", key);
    }
    // DNS relay was off, so no DNS fact is recorded
    assert!(!document.contains_key(keys::SOURCE_EDGE_GATEWAY_DNS));
}

#[tokio::test]
async fn test_successful_run_performs_no_compensation() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    let mut engine = engine_with(mock.clone(), &dir);

    engine.execute().await.expect("preflight should pass");

    assert_eq!(mock.call_count("POST", "action/enable"), 0);
    // The one PUT is the disable, never a restore
    assert_eq!(mock.call_count("PUT", "vmAffinityRule"), 1);
    // The session was mutated (disable) and torn down (logout)
    assert_eq!(mock.call_count("POST", "action/disable"), 1);
    assert_eq!(mock.call_count("DELETE", "sessions/sess-1"), 1);
}

#[tokio::test]
async fn test_affinity_disable_waits_for_task_completion() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    let mut engine = engine_with(mock.clone(), &dir);

    engine.execute().await.expect("preflight should pass");

    let put = mock.call_position("PUT", "vmAffinityRule/r1").unwrap();
    let poll = mock.call_position("GET", "task/affinity-1").unwrap();
    assert!(put < poll, "task poll must follow the rule update");
}
