//! Persistence layer for the shared fact document

pub mod store;

pub use store::{FactStore, StoreError};

/// Fact keys accumulated by the pipeline
///
/// The namespace is flat and pipeline-defined; no two keys may collide in
/// meaning. Writers never truncate unrelated keys.
pub mod keys {
    pub const ORGANIZATION: &str = "Organization";
    pub const SOURCE_ORG_VDC: &str = "sourceOrgVDC";
    pub const TARGET_ORG_VDC: &str = "targetOrgVDC";
    pub const SOURCE_PROVIDER_VDC: &str = "sourceProviderVDC";
    pub const TARGET_PROVIDER_VDC: &str = "targetProviderVDC";
    pub const SOURCE_EXTERNAL_NETWORK: &str = "sourceExternalNetwork";
    pub const TARGET_EXTERNAL_NETWORK: &str = "targetExternalNetwork";
    pub const DUMMY_EXTERNAL_NETWORK: &str = "dummyExternalNetwork";
    pub const SOURCE_ORG_VDC_COMPUTE_POLICY_LIST: &str = "sourceOrgVDCComputePolicyList";
    pub const SOURCE_VM_AFFINITY_RULES: &str = "sourceVMAffinityRules";
    pub const SOURCE_EDGE_GATEWAY: &str = "sourceEdgeGateway";
    pub const SOURCE_ORG_VDC_NETWORKS: &str = "sourceOrgVDCNetworks";
    pub const SOURCE_EDGE_GATEWAY_DHCP: &str = "sourceEdgeGatewayDHCP";
    pub const SOURCE_EDGE_GATEWAY_FIREWALL: &str = "sourceEdgeGatewayFirewall";
    pub const SOURCE_EDGE_GATEWAY_NAT: &str = "sourceEdgeGatewayNAT";
    pub const SOURCE_EDGE_GATEWAY_ROUTING: &str = "sourceEdgeGatewayRouting";
    pub const SOURCE_EDGE_GATEWAY_DNS: &str = "sourceEdgeGatewayDNS";
}
