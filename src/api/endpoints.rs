//! URL builders and wire constants for the VCD administrative API

/// Accept header requesting the JSON rendering of the legacy API
pub const VCD_API_ACCEPT: &str = "application/*+json;version=34.0";

/// Header carrying the bearer token on a successful login
pub const ACCESS_TOKEN_HEADER: &str = "x-vmware-vcloud-access-token";

/// Resource entity type marker for vApps
pub const TYPE_VAPP: &str = "application/vnd.vmware.vcloud.vApp+xml";

/// Resource entity type marker for independent disks
pub const TYPE_INDEPENDENT_DISK: &str = "application/vnd.vmware.vcloud.disk+xml";

/// Network pool backing required on the source side
pub const NETWORK_POOL_VXLAN: &str = "VXLAN";

/// Operation name of the affinity-rule update task
pub const AFFINITY_RULE_UPDATE_TASK: &str = "affinityRuleUpdate";

/// Page size for the compute-policy listing
pub const COMPUTE_POLICY_PAGE_SIZE: u64 = 25;

/// Gateway address marking a DHCP-only vApp network
pub const VAPP_DHCP_ONLY_GATEWAY: &str = "196.254.254.254";

/// Strip the urn prefix from a VCD id, e.g. `urn:vcloud:vdc:abc` -> `abc`
pub fn bare_id(urn: &str) -> &str {
    urn.rsplit(':').next().unwrap_or(urn)
}

pub fn api_url(endpoint: &str) -> String {
    format!("{}/api", endpoint.trim_end_matches('/'))
}

pub fn admin_api_url(endpoint: &str) -> String {
    format!("{}/admin", api_url(endpoint))
}

pub fn open_api_url(endpoint: &str) -> String {
    format!("{}/cloudapi/1.0.0", endpoint.trim_end_matches('/'))
}

fn nsx_proxy_url(endpoint: &str) -> String {
    format!("{}/network/edges", endpoint.trim_end_matches('/'))
}

pub fn login_url(endpoint: &str) -> String {
    format!("{}/sessions", api_url(endpoint))
}

pub fn session_probe_url(endpoint: &str) -> String {
    format!("{}/session", api_url(endpoint))
}

pub fn current_session_url(endpoint: &str) -> String {
    format!("{}/sessions/current", open_api_url(endpoint))
}

pub fn delete_session_url(endpoint: &str, session_id: &str) -> String {
    format!("{}/sessions/{}", open_api_url(endpoint), session_id)
}

pub fn external_networks_url(endpoint: &str) -> String {
    format!("{}/externalNetworks", open_api_url(endpoint))
}

pub fn provider_vdcs_url(endpoint: &str) -> String {
    format!("{}/providerVdcs", open_api_url(endpoint))
}

pub fn provider_vdc_admin_url(endpoint: &str, pvdc_id: &str) -> String {
    format!("{}/providervdc/{}", admin_api_url(endpoint), bare_id(pvdc_id))
}

pub fn org_vdc_admin_url(endpoint: &str, vdc_id: &str) -> String {
    format!("{}/vdc/{}", admin_api_url(endpoint), bare_id(vdc_id))
}

pub fn org_vdc_disable_url(endpoint: &str, vdc_id: &str) -> String {
    format!("{}/action/disable", org_vdc_admin_url(endpoint, vdc_id))
}

pub fn org_vdc_enable_url(endpoint: &str, vdc_id: &str) -> String {
    format!("{}/action/enable", org_vdc_admin_url(endpoint, vdc_id))
}

pub fn org_vdc_compute_policy_refs_url(endpoint: &str, vdc_id: &str) -> String {
    format!(
        "{}/computePolicyReferences",
        org_vdc_admin_url(endpoint, vdc_id)
    )
}

pub fn compute_policies_url(endpoint: &str) -> String {
    format!("{}/vdcComputePolicies", open_api_url(endpoint))
}

pub fn compute_policies_page_url(endpoint: &str, page: u64, page_size: u64) -> String {
    format!(
        "{}?page={}&pageSize={}",
        compute_policies_url(endpoint),
        page,
        page_size
    )
}

pub fn edge_gateways_url(endpoint: &str) -> String {
    format!("{}/edgeGateways", open_api_url(endpoint))
}

pub fn org_vdc_edge_gateways_url(endpoint: &str, org_vdc_id: &str) -> String {
    format!(
        "{}?filter=(orgVdc.id=={})",
        edge_gateways_url(endpoint),
        org_vdc_id
    )
}

pub fn dedicated_uplink_gateways_url(endpoint: &str, external_network_id: &str) -> String {
    format!(
        "{}?filter=(edgeGatewayUplinks.uplinkId=={})",
        edge_gateways_url(endpoint),
        external_network_id
    )
}

pub fn org_vdc_networks_url(endpoint: &str) -> String {
    format!("{}/orgVdcNetworks", open_api_url(endpoint))
}

pub fn org_vdc_network_dhcp_url(endpoint: &str, network_id: &str) -> String {
    format!("{}/{}/dhcp", org_vdc_networks_url(endpoint), network_id)
}

pub fn affinity_rules_url(endpoint: &str, vdc_id: &str) -> String {
    format!("{}/vdc/{}/vmAffinityRules", api_url(endpoint), bare_id(vdc_id))
}

pub fn affinity_rule_url(endpoint: &str, rule_id: &str) -> String {
    format!("{}/vmAffinityRule/{}", api_url(endpoint), bare_id(rule_id))
}

pub fn edge_gateway_admin_url(endpoint: &str, gateway_id: &str) -> String {
    format!("{}/edgeGateway/{}", admin_api_url(endpoint), gateway_id)
}

pub fn edge_dhcp_url(endpoint: &str, gateway_id: &str) -> String {
    format!("{}/{}/dhcp/config", nsx_proxy_url(endpoint), gateway_id)
}

pub fn edge_dhcp_relay_url(endpoint: &str, gateway_id: &str) -> String {
    format!("{}/relay", edge_dhcp_url(endpoint, gateway_id))
}

pub fn edge_firewall_url(endpoint: &str, gateway_id: &str) -> String {
    format!("{}/{}/firewall/config", nsx_proxy_url(endpoint), gateway_id)
}

pub fn edge_nat_url(endpoint: &str, gateway_id: &str) -> String {
    format!("{}/{}/nat/config", nsx_proxy_url(endpoint), gateway_id)
}

pub fn edge_ipsec_url(endpoint: &str, gateway_id: &str) -> String {
    format!("{}/{}/ipsec/config", nsx_proxy_url(endpoint), gateway_id)
}

pub fn edge_bgp_url(endpoint: &str, gateway_id: &str) -> String {
    format!(
        "{}/{}/routing/config/bgp",
        nsx_proxy_url(endpoint),
        gateway_id
    )
}

pub fn edge_routing_url(endpoint: &str, gateway_id: &str) -> String {
    format!("{}/{}/routing/config", nsx_proxy_url(endpoint), gateway_id)
}

pub fn edge_load_balancer_url(endpoint: &str, gateway_id: &str) -> String {
    format!(
        "{}/{}/loadbalancer/config",
        nsx_proxy_url(endpoint),
        gateway_id
    )
}

pub fn edge_l2vpn_url(endpoint: &str, gateway_id: &str) -> String {
    format!("{}/{}/l2vpn/config", nsx_proxy_url(endpoint), gateway_id)
}

pub fn edge_sslvpn_url(endpoint: &str, gateway_id: &str) -> String {
    format!("{}/{}/sslvpn/config", nsx_proxy_url(endpoint), gateway_id)
}

pub fn edge_dns_url(endpoint: &str, gateway_id: &str) -> String {
    format!("{}/{}/dns/config", nsx_proxy_url(endpoint), gateway_id)
}
