//! Wire payload types for the VCD administrative API
//!
//! Only the fields the validation checks actually read are modeled; the raw
//! payloads are stored untyped in the fact document. Collections that the
//! API may flatten to a bare record use [`OneOrMany`].

use crate::core::shape::OneOrMany;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named reference to another entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub href: String,
}

/// Organization references returned by the admin API root
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgList {
    pub organization_references: OneOrMany<Reference>,
}

/// An organization with its VDC references
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrg {
    pub name: String,
    pub vdcs: OneOrMany<Reference>,
}

/// A resource entity owned by an org VDC (vApp, disk, template, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntity {
    pub name: String,
    #[serde(default)]
    pub href: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

/// An organization VDC as returned by the admin API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminVdc {
    pub id: String,
    pub name: String,
    pub is_enabled: bool,
    #[serde(default)]
    pub uses_fast_provisioning: bool,
    #[serde(default)]
    pub vdc_storage_profiles: OneOrMany<Reference>,
    pub provider_vdc_reference: Reference,
    #[serde(default)]
    pub network_pool_reference: Option<Reference>,
    #[serde(default)]
    pub resource_entities: Option<OneOrMany<ResourceEntity>>,
}

impl AdminVdc {
    /// Resource entities normalized to a sequence; absent means empty
    pub fn entities(&self) -> Vec<ResourceEntity> {
        self.resource_entities
            .clone()
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
    }
}

/// One page of a cloudapi listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub result_total: u64,
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

/// A subnet definition on an external network
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub gateway: String,
    pub prefix_length: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetValues {
    pub values: Vec<Subnet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkBacking {
    pub backing_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkBackings {
    pub values: Vec<NetworkBacking>,
}

/// An external (provider-level) network
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalNetwork {
    pub id: String,
    pub name: String,
    pub network_backings: NetworkBackings,
    pub subnets: SubnetValues,
}

impl ExternalNetwork {
    /// True when the first network backing is an NSX-T tier-0 router
    pub fn is_nsxt_backed(&self) -> bool {
        self.network_backings
            .values
            .first()
            .is_some_and(|backing| backing.backing_type == "NSXT_TIER0")
    }
}

/// Provider VDC summary from the cloudapi listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderVdcSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nsx_t_manager: Option<Reference>,
}

/// A supported hardware version name, e.g. `vmx-14`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareVersion {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    pub supported_hardware_versions: OneOrMany<HardwareVersion>,
}

/// A provider VDC as returned by the admin API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderVdc {
    pub id: String,
    pub name: String,
    pub is_enabled: bool,
    #[serde(default)]
    pub storage_profiles: OneOrMany<Reference>,
    pub capabilities: ProviderCapabilities,
}

/// A network pool backing an org VDC
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPool {
    pub name: String,
    pub pool_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeUplink {
    #[serde(default)]
    pub dedicated: bool,
}

/// An edge gateway from the cloudapi listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeGateway {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub edge_gateway_uplinks: Vec<EdgeUplink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    pub id: String,
}

/// An org VDC network from the cloudapi listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgVdcNetwork {
    pub id: String,
    pub name: String,
    pub network_type: String,
    #[serde(default)]
    pub shared: bool,
    pub org_vdc: OwnerRef,
}

/// DHCP activation state of an org VDC network
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DhcpStatus {
    pub enabled: bool,
}

/// VDC compute policy references attached to an org VDC
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputePolicyRefs {
    #[serde(default)]
    pub vdc_compute_policy_reference: OneOrMany<Reference>,
}

/// A VDC compute policy from the cloudapi listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputePolicy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pvdc_id: Option<String>,
}

/// Detail view of a single compute policy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputePolicyDetail {
    #[serde(default)]
    pub is_sizing_only: bool,
}

/// A VM affinity rule on the source org VDC
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffinityRule {
    pub id: String,
    pub name: String,
    pub is_enabled: bool,
    pub is_mandatory: bool,
    pub polarity: String,
    #[serde(default)]
    pub vm_references: OneOrMany<Reference>,
}

/// Affinity rules listing for an org VDC
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmAffinityRules {
    #[serde(default)]
    pub vm_affinity_rule: Option<OneOrMany<AffinityRule>>,
}

impl VmAffinityRules {
    pub fn into_rules(self) -> Vec<AffinityRule> {
        self.vm_affinity_rule
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
    }
}

/// A long-running task record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub operation_name: String,
    pub status: String,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// The current cloudapi session record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSession {
    pub id: String,
}

// -- edge gateway service payloads -----------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    pub protocol: String,
    #[serde(default)]
    pub port: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleApplication {
    #[serde(default)]
    pub service: Option<OneOrMany<ServiceEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEndpoint {
    #[serde(default)]
    pub vnic_group_id: Option<OneOrMany<String>>,
    #[serde(default)]
    pub grouping_object_id: Option<OneOrMany<String>>,
}

/// A single edge firewall rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRule {
    pub id: String,
    pub rule_type: String,
    pub action: String,
    #[serde(default)]
    pub application: Option<RuleApplication>,
    #[serde(default)]
    pub source: Option<RuleEndpoint>,
    #[serde(default)]
    pub destination: Option<RuleEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRules {
    #[serde(default)]
    pub firewall_rule: Option<OneOrMany<FirewallRule>>,
}

/// Edge firewall configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallConfig {
    pub enabled: bool,
    pub firewall_rules: FirewallRules,
}

/// A single edge NAT rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatRule {
    pub rule_id: String,
    pub action: String,
    pub translated_address: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatRules {
    pub nat_rule: OneOrMany<NatRule>,
}

/// Edge NAT configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatConfig {
    #[serde(default)]
    pub nat64_rules: Option<Value>,
    #[serde(default)]
    pub nat_rules: Option<NatRules>,
}

/// A single IPSec site definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpsecSite {
    #[serde(default)]
    pub name: Option<String>,
    pub ipsec_session_type: String,
    pub encryption_algorithm: String,
    pub authentication_mode: String,
    pub digest_algorithm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpsecSites {
    pub site: OneOrMany<IpsecSite>,
}

/// Edge IPSec VPN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpsecConfig {
    #[serde(default)]
    pub sites: Option<IpsecSites>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OspfConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Edge routing configuration; only the OSPF flag is validated
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfig {
    pub ospf: OspfConfig,
}

/// Uniform shape for edge services that only carry an enabled flag
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFlag {
    #[serde(default)]
    pub enabled: bool,
}

// -- vApp payloads ----------------------------------------------------------

/// VM power status code for a suspended VM
pub const VM_STATUS_SUSPENDED: i64 = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VappVm {
    #[serde(default)]
    pub name: Option<String>,
    pub status: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VappChildren {
    #[serde(default)]
    pub vm: Option<OneOrMany<VappVm>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpScope {
    pub gateway: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpScopes {
    pub ip_scope: OneOrMany<IpScope>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VappNetworkConfiguration {
    #[serde(default)]
    pub parent_network: Option<Reference>,
    #[serde(default)]
    pub ip_scopes: Option<IpScopes>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VappNetworkConfig {
    pub network_name: String,
    pub configuration: VappNetworkConfiguration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfigSection {
    #[serde(default)]
    pub network_config: Option<OneOrMany<VappNetworkConfig>>,
}

/// A vApp with its VMs and network configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vapp {
    #[serde(default)]
    pub children: Option<VappChildren>,
    pub network_config_section: NetworkConfigSection,
}

impl Vapp {
    /// VMs in the vApp normalized to a sequence; absent children means empty
    pub fn vms(&self) -> Vec<VappVm> {
        self.children
            .as_ref()
            .and_then(|children| children.vm.clone())
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
    }
}
