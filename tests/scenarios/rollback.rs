//! Test: failure handling and rollback accounting

use crate::helpers::*;
use serde_json::json;
use vcd_preflight::execution::RunState;

#[tokio::test]
async fn test_two_edge_gateways_fail_and_set_both_rollback_flags() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    mock.on(
        "GET",
        "orgVdc.id==urn:vcloud:vdc:src",
        200,
        json!({"resultTotal": 2, "values": [
            {"id": "urn:vcloud:gateway:edge1", "name": "edge-1", "edgeGatewayUplinks": []},
            {"id": "urn:vcloud:gateway:edge2", "name": "edge-2", "edgeGatewayUplinks": []}
        ]}),
    );
    let mut engine = engine_with(mock.clone(), &dir);

    let err = engine.execute().await.unwrap_err();
    assert!(err.to_string().contains("More than One Edge gateway"));
    assert!(err.to_string().contains("validate-single-edge-gateway"));

    // Both mutations had happened, so both flags are set afterwards
    assert!(engine.flags().source_org_vdc_disabled());
    assert!(engine.flags().affinity_rules_disabled());
    assert!(matches!(engine.state(), RunState::Failed { .. }));
}

#[tokio::test]
async fn test_compensations_run_once_each_in_fixed_order() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    mock.on(
        "GET",
        "orgVdc.id==urn:vcloud:vdc:src",
        200,
        json!({"resultTotal": 2, "values": []}),
    );
    let mut engine = engine_with(mock.clone(), &dir);

    engine.execute().await.unwrap_err();

    // The source org VDC is re-enabled exactly once
    assert_eq!(mock.call_count("POST", "action/enable"), 1);
    // One PUT disabled the rule, one restored it
    assert_eq!(mock.call_count("PUT", "vmAffinityRule/r1"), 2);

    // Fixed compensation order: re-enable the VDC, then restore the rules
    let enable = mock.call_position("POST", "action/enable").unwrap();
    let restore = mock
        .calls()
        .iter()
        .rposition(|call| call.starts_with("PUT") && call.contains("vmAffinityRule/r1"))
        .unwrap();
    assert!(enable < restore, "VDC re-enable must precede rule restore");
}

#[tokio::test]
async fn test_failure_before_any_mutation_compensates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    // Fast provisioning trips the pipeline long before the first mutation
    mock.on("GET", "/api/admin/vdc/src", 200, source_org_vdc(true, true));
    let mut engine = engine_with(mock.clone(), &dir);

    let err = engine.execute().await.unwrap_err();
    assert!(err.to_string().contains("fast provisioning"));
    assert!(err.to_string().contains("validate-not-fast-provisioned"));

    assert!(!engine.flags().source_org_vdc_disabled());
    assert!(!engine.flags().affinity_rules_disabled());
    assert_eq!(mock.call_count("POST", "action/enable"), 0);
    assert_eq!(mock.call_count("PUT", "vmAffinityRule"), 0);
}

#[tokio::test]
async fn test_failure_between_mutations_compensates_only_the_first() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    // The target PVDC lacks the source's storage profile; the pipeline
    // fails after the VDC was disabled but before affinity rules were
    let mut pvdc = provider_vdc("nsxt-pvdc", "t", 14);
    pvdc["storageProfiles"] = json!([{"name": "silver", "href": ""}]);
    mock.on("GET", "/api/admin/providervdc/t", 200, pvdc);
    let mut engine = engine_with(mock.clone(), &dir);

    let err = engine.execute().await.unwrap_err();
    assert!(err.to_string().contains("validate-storage-profiles"));

    assert!(engine.flags().source_org_vdc_disabled());
    assert!(!engine.flags().affinity_rules_disabled());
    assert_eq!(mock.call_count("POST", "action/enable"), 1);
    assert_eq!(mock.call_count("PUT", "vmAffinityRule"), 0);
}

#[tokio::test]
async fn test_subnet_mismatch_fails_with_different_subnets() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    mock.on(
        "GET",
        "/cloudapi/1.0.0/externalNetworks",
        200,
        json!({"resultTotal": 3, "values": [
            external_network("ext-net-v", "PORTGROUP", "10.1.1.1", 24),
            external_network("ext-net-t", "NSXT_TIER0", "10.1.1.1", 25),
            external_network("dummy-net", "PORTGROUP", "172.16.1.1", 24)
        ]}),
    );
    let mut engine = engine_with(mock.clone(), &dir);

    let err = engine.execute().await.unwrap_err();
    assert!(err.to_string().contains("different subnets"));
    // Only the first mutation had happened by then
    assert_eq!(mock.call_count("POST", "action/enable"), 1);
    assert_eq!(mock.call_count("PUT", "vmAffinityRule"), 0);
}

#[tokio::test]
async fn test_dnat_range_rule_fails_naming_the_rule() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    mock.on(
        "GET",
        "/network/edges/edge1/nat/config",
        200,
        json!({"nat64Rules": null, "natRules": {"natRule": [
            {"ruleId": "196609", "action": "dnat", "translatedAddress": "10.1.1.1-10.1.1.10"}
        ]}}),
    );
    let mut engine = engine_with(mock.clone(), &dir);

    let err = engine.execute().await.unwrap_err();
    assert!(err.to_string().contains("196609"));

    // Both mutations are compensated after a service-level failure
    assert_eq!(mock.call_count("POST", "action/enable"), 1);
    assert_eq!(mock.call_count("PUT", "vmAffinityRule/r1"), 2);
}

#[tokio::test]
async fn test_failed_compensation_does_not_block_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    mock.on(
        "GET",
        "orgVdc.id==urn:vcloud:vdc:src",
        200,
        json!({"resultTotal": 2, "values": []}),
    );
    // Re-enabling the VDC fails; the rule restore must still be attempted
    mock.on(
        "POST",
        "/api/admin/vdc/src/action/enable",
        500,
        json!({"message": "VDC is busy"}),
    );
    let mut engine = engine_with(mock.clone(), &dir);

    let err = engine.execute().await.unwrap_err();
    // Rollback never masks the triggering failure
    assert!(err.to_string().contains("More than One Edge gateway"));

    assert_eq!(mock.call_count("POST", "action/enable"), 1);
    assert_eq!(mock.call_count("PUT", "vmAffinityRule/r1"), 2);
}

#[tokio::test]
async fn test_dedicated_external_network_blocks_before_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockVcd::new();
    mock.on(
        "GET",
        "edgeGatewayUplinks.uplinkId==",
        200,
        json!({"resultTotal": 1, "values": [
            {"id": "urn:vcloud:gateway:other", "name": "other-edge",
             "edgeGatewayUplinks": [{"dedicated": true}]}
        ]}),
    );
    let mut engine = engine_with(mock.clone(), &dir);

    let err = engine.execute().await.unwrap_err();
    assert!(err.to_string().contains("dedicated external network"));
    assert_eq!(mock.call_count("POST", "action/disable"), 0);
}
