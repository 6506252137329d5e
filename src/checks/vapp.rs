//! vApp-level checks on the source org VDC

use crate::api::{endpoints, ApiClient, VcdSession};
use crate::core::error::PreflightError;
use crate::core::model::{AdminVdc, ResourceEntity, Vapp, VM_STATUS_SUSPENDED};
use crate::core::shape::OneOrMany;
use crate::persistence::{keys, FactStore};
use tracing::debug;

/// vApp entities of the source org VDC from the stored record
fn source_vapps(store: &FactStore) -> Result<Vec<ResourceEntity>, PreflightError> {
    let vdc: AdminVdc = store.fact(keys::SOURCE_ORG_VDC)?;
    Ok(vdc
        .entities()
        .into_iter()
        .filter(|entity| entity.entity_type == endpoints::TYPE_VAPP)
        .collect())
}

async fn fetch_vapp<C: ApiClient>(
    session: &VcdSession<C>,
    entity: &ResourceEntity,
) -> Result<Vapp, PreflightError> {
    let response = session.get(&entity.href).await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            format!("failed to retrieve vApp {}", entity.name),
            response.error_message(),
        ));
    }
    Ok(response.json()?)
}

/// Empty vApps cannot be moved by the migration APIs
pub async fn validate_no_empty_vapps<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
) -> Result<(), PreflightError> {
    for entity in source_vapps(store)? {
        let vapp = fetch_vapp(session, &entity).await?;
        if vapp.children.is_none() {
            return Err(PreflightError::validation(format!(
                "empty source vApp '{}' exists in the source org VDC",
                entity.name
            )));
        }
    }
    debug!("no empty vApps exist in the source org VDC");
    Ok(())
}

/// Suspended VMs cannot be migrated
pub async fn validate_no_suspended_vms<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
) -> Result<(), PreflightError> {
    for entity in source_vapps(store)? {
        let vapp = fetch_vapp(session, &entity).await?;
        let vms = vapp.vms();
        if vms.is_empty() {
            debug!("source vApp {} has no VM present in it", entity.name);
            continue;
        }
        for vm in vms {
            if vm.status == VM_STATUS_SUSPENDED {
                return Err(PreflightError::validation(format!(
                    "a VM in vApp {} is in suspended state and cannot be migrated",
                    entity.name
                )));
            }
        }
    }
    debug!("no suspended VMs in source vApps");
    Ok(())
}

/// vApp-private networks cannot be carried over
///
/// A network config whose parent network name differs from its own name is
/// a vApp network; so is a parentless one unless it is the DHCP-only
/// placeholder gateway.
pub async fn validate_no_vapp_networks<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
) -> Result<(), PreflightError> {
    for entity in source_vapps(store)? {
        let vapp = fetch_vapp(session, &entity).await?;
        let configs = vapp
            .network_config_section
            .network_config
            .map(OneOrMany::into_vec)
            .unwrap_or_default();
        for config in configs {
            match &config.configuration.parent_network {
                Some(parent) => {
                    if config.network_name != parent.name {
                        return Err(PreflightError::validation(format!(
                            "vApp network {} exists in vApp {}",
                            config.network_name, entity.name
                        )));
                    }
                }
                None => {
                    let gateway = config
                        .configuration
                        .ip_scopes
                        .as_ref()
                        .and_then(|scopes| scopes.ip_scope.iter().next().cloned())
                        .map(|scope| scope.gateway)
                        .unwrap_or_default();
                    if gateway != endpoints::VAPP_DHCP_ONLY_GATEWAY {
                        return Err(PreflightError::validation(format!(
                            "vApp network {} exists in vApp {}",
                            config.network_name, entity.name
                        )));
                    }
                }
            }
            debug!(
                "network {} within vApp {} is not a vApp network",
                config.network_name, entity.name
            );
        }
    }
    Ok(())
}
