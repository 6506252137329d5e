//! Organization and org VDC checks

use crate::api::{endpoints, ApiClient, VcdSession};
use crate::core::error::PreflightError;
use crate::core::model::{AdminOrg, AdminVdc, NetworkPool, OrgList};
use crate::persistence::{keys, FactStore};
use serde_json::Value;
use tracing::{debug, warn};

/// Resolve the organization URL from the admin API root
pub async fn fetch_org_url<C: ApiClient>(
    session: &VcdSession<C>,
    org_name: &str,
) -> Result<String, PreflightError> {
    debug!("getting organization {} URL", org_name);
    let response = session
        .get(&endpoints::admin_api_url(session.endpoint()))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            format!("failed to retrieve organization {} URL", org_name),
            response.error_message(),
        ));
    }
    let listing: OrgList = response.json()?;
    listing
        .organization_references
        .into_vec()
        .into_iter()
        .find(|reference| reference.name == org_name)
        .map(|reference| reference.href)
        .ok_or_else(|| {
            PreflightError::validation(format!(
                "organization {} was not found on this VMware Cloud Director",
                org_name
            ))
        })
}

/// Resolve an org VDC URL inside the organization
///
/// Writes the `Organization` fact on first sight so later checks can read
/// the VDC listing without re-fetching.
pub async fn fetch_org_vdc_url<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    org_url: &str,
    org_vdc_name: &str,
) -> Result<String, PreflightError> {
    debug!("getting org VDC {} URL", org_vdc_name);
    let response = session.get(org_url).await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            format!("failed to retrieve org VDC {} URL", org_vdc_name),
            response.error_message(),
        ));
    }
    let raw: Value = response.json()?;
    let org: AdminOrg = response.json()?;
    if !store.contains(keys::ORGANIZATION)? {
        store.write(keys::ORGANIZATION, raw)?;
    }
    org.vdcs
        .into_vec()
        .into_iter()
        .find(|vdc| vdc.name == org_vdc_name)
        .map(|vdc| vdc.href)
        .ok_or_else(|| {
            PreflightError::validation(format!(
                "org VDC {} does not belong to organization {}",
                org_vdc_name, org.name
            ))
        })
}

/// Fetch the org VDC record, store it under `fact_key` and return its id
pub async fn fetch_org_vdc_details<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    org_url: &str,
    org_vdc_name: &str,
    fact_key: &str,
) -> Result<String, PreflightError> {
    let vdc_url = fetch_org_vdc_url(session, store, org_url, org_vdc_name).await?;
    let response = session.get(&vdc_url).await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            format!("failed to retrieve details of org VDC {}", org_vdc_name),
            response.error_message(),
        ));
    }
    let raw: Value = response.json()?;
    let vdc: AdminVdc = response.json()?;
    store.write(fact_key, raw)?;
    debug!("retrieved org VDC {} details", org_vdc_name);
    Ok(vdc.id)
}

/// The target org VDC name must not be taken yet
pub fn validate_no_target_org_vdc(
    store: &FactStore,
    target_name: &str,
) -> Result<(), PreflightError> {
    let org: AdminOrg = store.fact(keys::ORGANIZATION)?;
    for vdc in org.vdcs.iter() {
        if vdc.name == target_name {
            return Err(PreflightError::validation(format!(
                "target org VDC '{}' already exists",
                target_name
            )));
        }
    }
    debug!("no org VDC named '{}' exists yet", target_name);
    Ok(())
}

/// Fast-provisioned org VDCs are not migrated
pub fn validate_not_fast_provisioned(store: &FactStore) -> Result<(), PreflightError> {
    let vdc: AdminVdc = store.fact(keys::SOURCE_ORG_VDC)?;
    if vdc.uses_fast_provisioning {
        return Err(PreflightError::validation(format!(
            "fast provisioning is enabled on source org VDC {}; fast provisioned org VDCs are not migrated",
            vdc.name
        )));
    }
    debug!("fast provisioning is not enabled on the source org VDC");
    Ok(())
}

/// The source network pool must be VXLAN backed
pub async fn validate_source_network_pool<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
) -> Result<(), PreflightError> {
    let vdc: AdminVdc = store.fact(keys::SOURCE_ORG_VDC)?;
    let pool_reference = vdc.network_pool_reference.ok_or_else(|| {
        PreflightError::validation("no network pool is associated with the source org VDC")
    })?;
    let response = session.get(&pool_reference.href).await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve the source org VDC network pool",
            response.error_message(),
        ));
    }
    let pool: NetworkPool = response.json()?;
    if pool.pool_type != endpoints::NETWORK_POOL_VXLAN {
        return Err(PreflightError::validation(format!(
            "source org VDC network pool {} is not VXLAN backed",
            pool.name
        )));
    }
    debug!("source org VDC network pool {} is VXLAN backed", pool.name);
    Ok(())
}

/// The source org VDC must sit on the NSX-V provider VDC
pub fn validate_nsxv_backed(
    store: &FactStore,
    source_provider_vdc_id: &str,
    nsxt_backed: bool,
) -> Result<(), PreflightError> {
    let vdc: AdminVdc = store.fact(keys::SOURCE_ORG_VDC)?;
    let backing_id = vdc.provider_vdc_reference.id.as_deref().unwrap_or_default();
    if backing_id == source_provider_vdc_id && !nsxt_backed {
        debug!("source org VDC {} is NSX-V backed", vdc.name);
        return Ok(());
    }
    Err(PreflightError::validation(format!(
        "source org VDC {} is not NSX-V backed",
        vdc.name
    )))
}

/// Independent disks cannot be migrated
pub async fn validate_no_independent_disks<C: ApiClient>(
    session: &VcdSession<C>,
    org_vdc_id: &str,
) -> Result<(), PreflightError> {
    let response = session
        .get(&endpoints::org_vdc_admin_url(session.endpoint(), org_vdc_id))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve source org VDC resource entities",
            response.error_message(),
        ));
    }
    let vdc: AdminVdc = response.json()?;
    let entities = vdc.entities();
    if entities.is_empty() {
        debug!("no resource entity is available in the source org VDC");
        return Ok(());
    }
    for entity in &entities {
        if entity.entity_type == endpoints::TYPE_INDEPENDENT_DISK {
            return Err(PreflightError::validation(format!(
                "independent disk {} exists in the source org VDC",
                entity.name
            )));
        }
    }
    debug!("independent disks do not exist in the source org VDC");
    Ok(())
}

/// Disable the source org VDC so no operations race the migration
///
/// Skips the call when the VDC was already disabled; the compensation path
/// consults the stored record, so re-enabling never flips a VDC that was
/// disabled before the run started.
pub async fn disable_source_org_vdc<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    org_vdc_id: &str,
) -> Result<(), PreflightError> {
    let vdc: AdminVdc = store.fact(keys::SOURCE_ORG_VDC)?;
    if !vdc.is_enabled {
        warn!("source org VDC {} is already disabled", vdc.name);
        return Ok(());
    }
    let response = session
        .post(
            &endpoints::org_vdc_disable_url(session.endpoint(), org_vdc_id),
            None,
        )
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            format!("failed to disable source org VDC {}", vdc.name),
            response.error_message(),
        ));
    }
    debug!("source org VDC {} disabled", vdc.name);
    Ok(())
}

/// Compensation: re-enable the source org VDC if the run disabled it
pub async fn enable_source_org_vdc<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    org_vdc_id: &str,
) -> Result<(), PreflightError> {
    let vdc: AdminVdc = store.fact(keys::SOURCE_ORG_VDC)?;
    if !vdc.is_enabled {
        debug!("not enabling source org VDC {}; it was disabled before the run", vdc.name);
        return Ok(());
    }
    let response = session
        .post(
            &endpoints::org_vdc_enable_url(session.endpoint(), org_vdc_id),
            None,
        )
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            format!("failed to enable source org VDC {}", vdc.name),
            response.error_message(),
        ));
    }
    debug!("source org VDC {} enabled", vdc.name);
    Ok(())
}
