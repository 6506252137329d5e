//! External network and org VDC network checks

use crate::api::{endpoints, ApiClient, VcdSession};
use crate::core::error::PreflightError;
use crate::core::model::{DhcpStatus, EdgeGateway, ExternalNetwork, OrgVdcNetwork, Page, Subnet};
use crate::persistence::{keys, FactStore};
use serde_json::Value;
use std::net::IpAddr;
use tracing::debug;

const NETWORK_TYPE_ISOLATED: &str = "ISOLATED";
const NETWORK_TYPE_DIRECT: &str = "DIRECT";

/// Fetch an external network by name and store it on the side its backing
/// implies (tier-0 backed networks are the target side); dummy networks are
/// stored under their own key regardless of backing
pub async fn fetch_external_network<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    network_name: &str,
    is_dummy: bool,
) -> Result<String, PreflightError> {
    debug!("getting external network {} details", network_name);
    let response = session
        .get(&endpoints::external_networks_url(session.endpoint()))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            format!("failed to retrieve external network {}", network_name),
            response.error_message(),
        ));
    }
    let raw: Value = response.json()?;
    let page: Page<ExternalNetwork> = response.json()?;
    for (index, network) in page.values.iter().enumerate() {
        if network.name != network_name {
            continue;
        }
        let key = if is_dummy {
            keys::DUMMY_EXTERNAL_NETWORK
        } else if network.is_nsxt_backed() {
            keys::TARGET_EXTERNAL_NETWORK
        } else {
            keys::SOURCE_EXTERNAL_NETWORK
        };
        let record = raw["values"][index].clone();
        store.write(key, record)?;
        debug!("retrieved external network {} details", network_name);
        return Ok(network.id.clone());
    }
    Err(PreflightError::validation(format!(
        "external network {} was not found",
        network_name
    )))
}

/// No other edge gateway may hold the target external network as a
/// dedicated uplink
pub async fn validate_dedicated_external_network<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
) -> Result<(), PreflightError> {
    let target: ExternalNetwork = store.fact(keys::TARGET_EXTERNAL_NETWORK)?;
    let response = session
        .get(&endpoints::dedicated_uplink_gateways_url(
            session.endpoint(),
            &target.id,
        ))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve edge gateway uplinks",
            response.error_message(),
        ));
    }
    let page: Page<EdgeGateway> = response.json()?;
    for gateway in &page.values {
        if gateway
            .edge_gateway_uplinks
            .first()
            .is_some_and(|uplink| uplink.dedicated)
        {
            return Err(PreflightError::validation(format!(
                "edge gateway {} is using dedicated external network {} and a new edge gateway cannot be created",
                gateway.name, target.name
            )));
        }
    }
    debug!("no other edge gateway is using the target external network as dedicated");
    Ok(())
}

/// Network address of a gateway/prefix pair, host bits masked away
fn network_address(gateway: &str, prefix_length: u8) -> Result<(IpAddr, u8), PreflightError> {
    let address: IpAddr = gateway.parse().map_err(|_| {
        PreflightError::validation(format!("invalid gateway address {}", gateway))
    })?;
    let network = match address {
        IpAddr::V4(v4) => {
            if prefix_length > 32 {
                return Err(PreflightError::validation(format!(
                    "invalid prefix length {}",
                    prefix_length
                )));
            }
            let mask = if prefix_length == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(prefix_length))
            };
            IpAddr::V4((u32::from(v4) & mask).into())
        }
        IpAddr::V6(v6) => {
            if prefix_length > 128 {
                return Err(PreflightError::validation(format!(
                    "invalid prefix length {}",
                    prefix_length
                )));
            }
            let mask = if prefix_length == 0 {
                0
            } else {
                u128::MAX << (128 - u32::from(prefix_length))
            };
            IpAddr::V6((u128::from(v6) & mask).into())
        }
    };
    Ok((network, prefix_length))
}

fn first_subnet(network: &ExternalNetwork) -> Result<&Subnet, PreflightError> {
    network.subnets.values.first().ok_or_else(|| {
        PreflightError::validation(format!(
            "external network {} has no subnet configuration",
            network.name
        ))
    })
}

/// Source and target external networks must share their subnet
pub fn validate_external_network_subnets(store: &FactStore) -> Result<(), PreflightError> {
    let source: ExternalNetwork = store.fact(keys::SOURCE_EXTERNAL_NETWORK)?;
    let target: ExternalNetwork = store.fact(keys::TARGET_EXTERNAL_NETWORK)?;
    let source_subnet = first_subnet(&source)?;
    let target_subnet = first_subnet(&target)?;
    let source_network = network_address(&source_subnet.gateway, source_subnet.prefix_length)?;
    let target_network = network_address(&target_subnet.gateway, target_subnet.prefix_length)?;
    if source_network != target_network {
        return Err(PreflightError::validation(
            "source and target external networks have different subnets",
        ));
    }
    debug!("source and target external networks have the same subnet");
    Ok(())
}

/// Fetch the org VDC networks belonging to the given org VDC and store them
pub async fn fetch_org_vdc_networks<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    org_vdc_id: &str,
    fact_key: &str,
) -> Result<Vec<OrgVdcNetwork>, PreflightError> {
    debug!("getting org VDC network details");
    let response = session
        .get(&endpoints::org_vdc_networks_url(session.endpoint()))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve org VDC networks",
            response.error_message(),
        ));
    }
    let raw: Value = response.json()?;
    let page: Page<OrgVdcNetwork> = response.json()?;
    let mut networks = Vec::new();
    let mut records = Vec::new();
    for (index, network) in page.values.into_iter().enumerate() {
        if network.org_vdc.id == org_vdc_id {
            records.push(raw["values"][index].clone());
            networks.push(network);
        }
    }
    store.write(fact_key, Value::Array(records))?;
    debug!("org VDC network details retrieved");
    Ok(networks)
}

/// DHCP must not be enabled on isolated org VDC networks
pub async fn validate_dhcp_disabled_on_isolated<C: ApiClient>(
    session: &VcdSession<C>,
    networks: &[OrgVdcNetwork],
) -> Result<(), PreflightError> {
    for network in networks {
        if network.network_type != NETWORK_TYPE_ISOLATED {
            continue;
        }
        let response = session
            .get(&endpoints::org_vdc_network_dhcp_url(
                session.endpoint(),
                &network.id,
            ))
            .await?;
        if !response.is_success() {
            return Err(PreflightError::remote(
                format!("failed to retrieve DHCP state of network {}", network.name),
                response.error_message(),
            ));
        }
        let dhcp: DhcpStatus = response.json()?;
        if dhcp.enabled {
            return Err(PreflightError::validation(format!(
                "DHCP is enabled on source isolated org VDC network {}",
                network.name
            )));
        }
    }
    debug!("DHCP is not enabled on any source isolated org VDC network");
    Ok(())
}

/// Shared org VDC networks block the migration
pub fn validate_no_shared_networks(networks: &[OrgVdcNetwork]) -> Result<(), PreflightError> {
    for network in networks {
        if network.shared {
            return Err(PreflightError::validation(format!(
                "org VDC network {} is a shared network; no shared networks may exist",
                network.name
            )));
        }
    }
    debug!("no source org VDC networks are shared");
    Ok(())
}

/// Direct org VDC networks cannot be migrated
pub fn validate_no_direct_networks(networks: &[OrgVdcNetwork]) -> Result<(), PreflightError> {
    for network in networks {
        if network.network_type == NETWORK_TYPE_DIRECT {
            return Err(PreflightError::validation(format!(
                "direct network {} exists in the source org VDC and cannot be migrated",
                network.name
            )));
        }
    }
    debug!("no direct networks exist in the source org VDC");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn external_network(name: &str, gateway: &str, prefix: u8) -> Value {
        json!({
            "id": format!("urn:vcloud:network:{}", name),
            "name": name,
            "networkBackings": {"values": [{"backingType": "NSXT_TIER0"}]},
            "subnets": {"values": [{"gateway": gateway, "prefixLength": prefix}]}
        })
    }

    #[test]
    fn test_network_address_masks_host_bits() {
        let (address, prefix) = network_address("10.1.1.77", 24).unwrap();
        assert_eq!(address, "10.1.1.0".parse::<IpAddr>().unwrap());
        assert_eq!(prefix, 24);
    }

    #[test]
    fn test_same_gateway_different_prefix_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = FactStore::new(dir.path().join("facts.json"));
        store
            .write(keys::SOURCE_EXTERNAL_NETWORK, external_network("src", "10.1.1.1", 24))
            .unwrap();
        store
            .write(keys::TARGET_EXTERNAL_NETWORK, external_network("tgt", "10.1.1.1", 25))
            .unwrap();
        let err = validate_external_network_subnets(&store).unwrap_err();
        assert!(err.to_string().contains("different subnets"));
    }

    #[test]
    fn test_matching_subnets_pass() {
        let dir = tempfile::tempdir().unwrap();
        let store = FactStore::new(dir.path().join("facts.json"));
        store
            .write(keys::SOURCE_EXTERNAL_NETWORK, external_network("src", "10.1.1.1", 24))
            .unwrap();
        store
            .write(keys::TARGET_EXTERNAL_NETWORK, external_network("tgt", "10.1.1.254", 24))
            .unwrap();
        assert!(validate_external_network_subnets(&store).is_ok());
    }

    fn org_network(name: &str, network_type: &str, shared: bool) -> OrgVdcNetwork {
        serde_json::from_value(json!({
            "id": format!("urn:vcloud:network:{}", name),
            "name": name,
            "networkType": network_type,
            "shared": shared,
            "orgVdc": {"id": "urn:vcloud:vdc:src"}
        }))
        .unwrap()
    }

    #[test]
    fn test_shared_network_is_rejected() {
        let networks = vec![org_network("net-a", "NAT_ROUTED", false), org_network("net-b", "ISOLATED", true)];
        let err = validate_no_shared_networks(&networks).unwrap_err();
        assert!(err.to_string().contains("net-b"));
    }

    #[test]
    fn test_direct_network_is_rejected() {
        let networks = vec![org_network("net-a", "DIRECT", false)];
        let err = validate_no_direct_networks(&networks).unwrap_err();
        assert!(err.to_string().contains("net-a"));
    }
}
