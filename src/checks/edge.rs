//! Edge gateway checks and service configuration capture

use crate::api::{endpoints, ApiClient, VcdSession};
use crate::core::error::PreflightError;
use crate::core::model::{
    EdgeGateway, FirewallConfig, FirewallRule, IpsecConfig, IpsecSite, NatConfig, NatRule, Page,
    RoutingConfig, RuleEndpoint, ServiceFlag,
};
use crate::core::shape::OneOrMany;
use crate::persistence::{keys, FactStore};
use serde_json::Value;
use tracing::{debug, info};

const RULE_TYPE_USER: &str = "user";
const RULE_TYPE_DEFAULT_POLICY: &str = "default_policy";

/// Exactly one edge gateway must serve the source org VDC
///
/// Stores the gateway record and returns its id.
pub async fn validate_single_edge_gateway<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    org_vdc_id: &str,
) -> Result<String, PreflightError> {
    debug!("getting org VDC edge gateway details");
    let response = session
        .get(&endpoints::org_vdc_edge_gateways_url(
            session.endpoint(),
            org_vdc_id,
        ))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve org VDC edge gateway details",
            response.error_message(),
        ));
    }
    let raw: Value = response.json()?;
    let page: Page<EdgeGateway> = response.json()?;
    if page.result_total > 1 {
        return Err(PreflightError::validation(
            "More than One Edge gateway exist for source Org VDC",
        ));
    }
    info!("getting the source edge gateway details");
    let gateway = page.values.first().ok_or_else(|| {
        PreflightError::validation("no edge gateway exists for the source org VDC")
    })?;
    store.write(keys::SOURCE_EDGE_GATEWAY, raw["values"][0].clone())?;
    debug!("single edge gateway exists in the source org VDC");
    Ok(gateway.id.clone())
}

/// Capture and validate every service configured on the source edge
/// gateway; returns the BGP and IPSec configurations for the caller
pub async fn fetch_edge_gateway_services<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    edge_gateway_id: &str,
) -> Result<(Option<Value>, Option<IpsecConfig>), PreflightError> {
    let gateway_id = endpoints::bare_id(edge_gateway_id);
    let dhcp = fetch_dhcp_config(session, gateway_id).await?;
    let firewall = fetch_firewall_config(session, gateway_id).await?;
    let nat = fetch_nat_config(session, gateway_id).await?;
    let ipsec = fetch_ipsec_config(session, gateway_id).await?;
    let bgp = fetch_bgp_config(session, gateway_id).await?;
    let routing = fetch_routing_config(session, gateway_id).await?;
    check_load_balancer_disabled(session, gateway_id).await?;
    check_l2vpn_disabled(session, gateway_id).await?;
    check_sslvpn_disabled(session, gateway_id).await?;
    let dns = fetch_dns_config(session, gateway_id).await?;

    store.write(keys::SOURCE_EDGE_GATEWAY_DHCP, dhcp)?;
    store.write(
        keys::SOURCE_EDGE_GATEWAY_FIREWALL,
        serde_json::to_value(&firewall).expect("firewall rules serialize"),
    )?;
    store.write(
        keys::SOURCE_EDGE_GATEWAY_NAT,
        nat.unwrap_or(Value::Null),
    )?;
    store.write(keys::SOURCE_EDGE_GATEWAY_ROUTING, routing)?;
    if let Some(dns) = dns {
        store.write(keys::SOURCE_EDGE_GATEWAY_DNS, dns)?;
    }
    debug!("source edge gateway services configuration retrieved");
    Ok((bgp, ipsec))
}

/// DHCP may be configured, but neither relay nor static bindings survive
/// the migration
async fn fetch_dhcp_config<C: ApiClient>(
    session: &VcdSession<C>,
    gateway_id: &str,
) -> Result<Value, PreflightError> {
    debug!("getting DHCP configuration of the source edge gateway");
    let relay_response = session
        .get(&endpoints::edge_dhcp_relay_url(session.endpoint(), gateway_id))
        .await?;
    if relay_response.is_success() {
        let relay: Value = relay_response.json()?;
        if !relay.get("relay").map(Value::is_null).unwrap_or(true) {
            return Err(PreflightError::validation(
                "relay is configured in the DHCP of the source edge gateway",
            ));
        }
    }
    let response = session
        .get(&endpoints::edge_dhcp_url(session.endpoint(), gateway_id))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve the DHCP configuration of the source edge gateway",
            response.error_message(),
        ));
    }
    let dhcp: Value = response.json()?;
    if !dhcp
        .get("staticBindings")
        .map(Value::is_null)
        .unwrap_or(true)
    {
        return Err(PreflightError::validation(
            "static binding is present in the DHCP configuration of the source edge gateway",
        ));
    }
    Ok(dhcp)
}

fn endpoint_grouping_objects(endpoint: &RuleEndpoint) -> Vec<String> {
    endpoint
        .grouping_object_id
        .clone()
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
}

/// The shapes the target firewall cannot express
fn validate_firewall_rule(rule: &FirewallRule) -> Result<(), PreflightError> {
    if let Some(application) = &rule.application {
        let services = application
            .service
            .clone()
            .map(OneOrMany::into_vec)
            .unwrap_or_default();
        for service in services {
            let is_l4 = service.protocol == "tcp" || service.protocol == "udp";
            if is_l4 && service.port.as_deref() == Some("any") {
                return Err(PreflightError::validation(format!(
                    "'any' as a TCP/UDP port is not supported in the target firewall (rule {})",
                    rule.id
                )));
            }
        }
    }
    for endpoint in [&rule.source, &rule.destination].into_iter().flatten() {
        if endpoint.vnic_group_id.is_some() {
            return Err(PreflightError::validation(format!(
                "a vNIC group is present in firewall rule {}",
                rule.id
            )));
        }
        for grouping_object in endpoint_grouping_objects(endpoint) {
            if !grouping_object.contains("ipset") && !grouping_object.contains("network") {
                return Err(PreflightError::validation(format!(
                    "the object type in firewall rule {} is not supported",
                    rule.id
                )));
            }
        }
    }
    Ok(())
}

/// The firewall must be enabled and every user rule expressible in the
/// target; user rules plus non-accept default policies are captured
async fn fetch_firewall_config<C: ApiClient>(
    session: &VcdSession<C>,
    gateway_id: &str,
) -> Result<Vec<FirewallRule>, PreflightError> {
    debug!("getting firewall configuration of the source edge gateway");
    let response = session
        .get(&endpoints::edge_firewall_url(session.endpoint(), gateway_id))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve the firewall configuration of the source edge gateway",
            response.error_message(),
        ));
    }
    let config: FirewallConfig = response.json()?;
    if !config.enabled {
        return Err(PreflightError::validation(
            "the firewall is disabled in the source edge gateway",
        ));
    }
    let rules = config
        .firewall_rules
        .firewall_rule
        .map(OneOrMany::into_vec)
        .unwrap_or_default();
    let mut captured: Vec<FirewallRule> = rules
        .iter()
        .filter(|rule| rule.rule_type == RULE_TYPE_USER)
        .cloned()
        .collect();
    captured.extend(
        rules
            .iter()
            .filter(|rule| rule.rule_type == RULE_TYPE_DEFAULT_POLICY && rule.action != "accept")
            .cloned(),
    );
    for rule in &captured {
        validate_firewall_rule(rule)?;
    }
    Ok(captured)
}

/// DNAT rules translating to a range or subnet cannot be migrated
fn validate_nat_rule(rule: &NatRule) -> Result<(), PreflightError> {
    let translated = &rule.translated_address;
    if rule.action == "dnat" && (translated.contains('-') || translated.contains('/')) {
        return Err(PreflightError::validation(format!(
            "DNAT rule {} translates to an IP range or network, which cannot be used in the target edge gateway",
            rule.rule_id
        )));
    }
    Ok(())
}

async fn fetch_nat_config<C: ApiClient>(
    session: &VcdSession<C>,
    gateway_id: &str,
) -> Result<Option<Value>, PreflightError> {
    debug!("getting NAT configuration of the source edge gateway");
    let response = session
        .get(&endpoints::edge_nat_url(session.endpoint(), gateway_id))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve the NAT configuration of the source edge gateway",
            response.error_message(),
        ));
    }
    let raw: Value = response.json()?;
    let config: NatConfig = response.json()?;
    if config.nat64_rules.is_some() {
        return Err(PreflightError::validation(
            "a NAT64 rule is configured in the source but not supported in the target",
        ));
    }
    let Some(nat_rules) = config.nat_rules else {
        return Ok(None);
    };
    for rule in nat_rules.nat_rule.into_vec() {
        validate_nat_rule(&rule)?;
    }
    Ok(Some(raw))
}

/// IPSec sites must be policy based with the target's supported ciphers
fn validate_ipsec_site(site: &IpsecSite) -> Result<(), PreflightError> {
    let label = site.name.as_deref().unwrap_or("<unnamed>");
    if site.ipsec_session_type != "policybasedsession" {
        return Err(PreflightError::validation(format!(
            "source IPSec site {} uses a route-based session type, which is not supported",
            label
        )));
    }
    if site.encryption_algorithm != "aes256" {
        return Err(PreflightError::validation(format!(
            "source IPSec site {} is configured with unsupported encryption algorithm {}",
            label, site.encryption_algorithm
        )));
    }
    if site.authentication_mode != "psk" {
        return Err(PreflightError::validation(
            "certificate authentication mode is not supported in the target edge gateway",
        ));
    }
    if site.digest_algorithm != "sha1" {
        return Err(PreflightError::validation(format!(
            "digest algorithm {} is not supported in the target edge gateway",
            site.digest_algorithm
        )));
    }
    Ok(())
}

async fn fetch_ipsec_config<C: ApiClient>(
    session: &VcdSession<C>,
    gateway_id: &str,
) -> Result<Option<IpsecConfig>, PreflightError> {
    debug!("getting IPSec configuration of the source edge gateway");
    let response = session
        .get(&endpoints::edge_ipsec_url(session.endpoint(), gateway_id))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve the IPSec configuration of the source edge gateway",
            response.error_message(),
        ));
    }
    let config: IpsecConfig = response.json()?;
    let Some(sites) = &config.sites else {
        return Ok(None);
    };
    for site in sites.site.iter() {
        validate_ipsec_site(site)?;
    }
    Ok(Some(config))
}

async fn fetch_bgp_config<C: ApiClient>(
    session: &VcdSession<C>,
    gateway_id: &str,
) -> Result<Option<Value>, PreflightError> {
    debug!("getting BGP configuration of the source edge gateway");
    let response = session
        .get(&endpoints::edge_bgp_url(session.endpoint(), gateway_id))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve the BGP configuration of the source edge gateway",
            response.error_message(),
        ));
    }
    if response.body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(response.json()?))
}

/// OSPF has no counterpart on the target side
async fn fetch_routing_config<C: ApiClient>(
    session: &VcdSession<C>,
    gateway_id: &str,
) -> Result<Value, PreflightError> {
    debug!("getting routing configuration of the source edge gateway");
    let response = session
        .get(&endpoints::edge_routing_url(session.endpoint(), gateway_id))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve the routing configuration of the source edge gateway",
            response.error_message(),
        ));
    }
    let routing: RoutingConfig = response.json()?;
    if routing.ospf.enabled {
        return Err(PreflightError::validation(
            "the OSPF routing protocol is configured in the source but not supported in the target",
        ));
    }
    Ok(response.json()?)
}

async fn check_service_disabled<C: ApiClient>(
    session: &VcdSession<C>,
    url: String,
    service: &str,
) -> Result<(), PreflightError> {
    debug!("getting {} configuration of the source edge gateway", service);
    let response = session.get(&url).await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            format!(
                "failed to retrieve the {} configuration of the source edge gateway",
                service
            ),
            response.error_message(),
        ));
    }
    let flag: ServiceFlag = response.json()?;
    if flag.enabled {
        return Err(PreflightError::validation(format!(
            "the {} service is configured in the source but not supported in the target",
            service
        )));
    }
    Ok(())
}

async fn check_load_balancer_disabled<C: ApiClient>(
    session: &VcdSession<C>,
    gateway_id: &str,
) -> Result<(), PreflightError> {
    check_service_disabled(
        session,
        endpoints::edge_load_balancer_url(session.endpoint(), gateway_id),
        "load balancer",
    )
    .await
}

async fn check_l2vpn_disabled<C: ApiClient>(
    session: &VcdSession<C>,
    gateway_id: &str,
) -> Result<(), PreflightError> {
    check_service_disabled(
        session,
        endpoints::edge_l2vpn_url(session.endpoint(), gateway_id),
        "L2 VPN",
    )
    .await
}

async fn check_sslvpn_disabled<C: ApiClient>(
    session: &VcdSession<C>,
    gateway_id: &str,
) -> Result<(), PreflightError> {
    check_service_disabled(
        session,
        endpoints::edge_sslvpn_url(session.endpoint(), gateway_id),
        "SSL VPN",
    )
    .await
}

/// Capture DNS forwarders when the gateway relays DNS over its default
/// route; gateways without that setting carry no DNS fact
async fn fetch_dns_config<C: ApiClient>(
    session: &VcdSession<C>,
    gateway_id: &str,
) -> Result<Option<Value>, PreflightError> {
    let response = session
        .get(&endpoints::edge_gateway_admin_url(
            session.endpoint(),
            gateway_id,
        ))
        .await?;
    if response.is_success() {
        let gateway: Value = response.json()?;
        let relay_enabled = gateway["configuration"]["useDefaultRouteForDnsRelay"]
            .as_bool()
            .unwrap_or(false);
        if !relay_enabled {
            return Ok(None);
        }
    }
    debug!("getting DNS configuration of the source edge gateway");
    let response = session
        .get(&endpoints::edge_dns_url(session.endpoint(), gateway_id))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve the DNS configuration of the source edge gateway",
            response.error_message(),
        ));
    }
    let dns: Value = response.json()?;
    let forwarders = dns["dnsViews"]["dnsView"]["forwarders"].clone();
    if forwarders.is_null() {
        return Err(PreflightError::remote(
            "failed to retrieve the DNS configuration of the source edge gateway",
            "the DNS view carries no forwarders",
        ));
    }
    Ok(Some(forwarders))
}
