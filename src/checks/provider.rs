//! Provider VDC checks

use crate::api::{endpoints, ApiClient, VcdSession};
use crate::core::error::PreflightError;
use crate::core::model::{
    AdminVdc, ComputePolicy, ComputePolicyDetail, ComputePolicyRefs, HardwareVersion, Page,
    ProviderVdc, ProviderVdcSummary,
};
use crate::persistence::{keys, FactStore};
use serde_json::Value;
use tracing::debug;

const SYSTEM_DEFAULT_POLICY: &str = "System Default";

/// Resolve a provider VDC id and whether an NSX-T manager backs it
pub async fn fetch_provider_vdc<C: ApiClient>(
    session: &VcdSession<C>,
    pvdc_name: &str,
) -> Result<(String, bool), PreflightError> {
    debug!("getting provider VDC {} id", pvdc_name);
    let response = session
        .get(&endpoints::provider_vdcs_url(session.endpoint()))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            format!("failed to retrieve provider VDC {} id", pvdc_name),
            response.error_message(),
        ));
    }
    let page: Page<ProviderVdcSummary> = response.json()?;
    page.values
        .into_iter()
        .find(|pvdc| pvdc.name == pvdc_name)
        .map(|pvdc| (pvdc.id, pvdc.nsx_t_manager.is_some()))
        .ok_or_else(|| {
            PreflightError::validation(format!("provider VDC {} was not found", pvdc_name))
        })
}

/// Fetch the provider VDC record and store it on the matching side
pub async fn fetch_provider_vdc_details<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    pvdc_id: &str,
    nsxt_backed: bool,
) -> Result<(), PreflightError> {
    let response = session
        .get(&endpoints::provider_vdc_admin_url(
            session.endpoint(),
            pvdc_id,
        ))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve provider VDC details",
            response.error_message(),
        ));
    }
    let raw: Value = response.json()?;
    let pvdc: ProviderVdc = response.json()?;
    let key = if nsxt_backed {
        keys::TARGET_PROVIDER_VDC
    } else {
        keys::SOURCE_PROVIDER_VDC
    };
    store.write(key, raw)?;
    debug!("provider VDC {} details retrieved", pvdc.name);
    Ok(())
}

/// The target provider VDC must be enabled
pub fn validate_target_provider_vdc_enabled(store: &FactStore) -> Result<(), PreflightError> {
    let pvdc: ProviderVdc = store.fact(keys::TARGET_PROVIDER_VDC)?;
    if !pvdc.is_enabled {
        return Err(PreflightError::validation(format!(
            "target provider VDC {} is not enabled",
            pvdc.name
        )));
    }
    debug!("target provider VDC {} is enabled", pvdc.name);
    Ok(())
}

/// Highest hardware version supported by a provider VDC, e.g. `("vmx", 14)`
fn highest_hardware_version(
    versions: &[HardwareVersion],
) -> Result<(String, u64), PreflightError> {
    let mut highest: Option<(String, u64)> = None;
    for version in versions {
        let (family, number) = version.name.rsplit_once('-').ok_or_else(|| {
            PreflightError::validation(format!(
                "unrecognized hardware version name {}",
                version.name
            ))
        })?;
        let number: u64 = number.parse().map_err(|_| {
            PreflightError::validation(format!(
                "unrecognized hardware version name {}",
                version.name
            ))
        })?;
        if highest.as_ref().is_none_or(|(_, current)| number > *current) {
            highest = Some((family.to_string(), number));
        }
    }
    highest.ok_or_else(|| {
        PreflightError::validation("provider VDC reports no supported hardware versions")
    })
}

/// The target must support at least the source's highest hardware version
pub fn validate_hardware_versions(store: &FactStore) -> Result<(), PreflightError> {
    let source: ProviderVdc = store.fact(keys::SOURCE_PROVIDER_VDC)?;
    let target: ProviderVdc = store.fact(keys::TARGET_PROVIDER_VDC)?;
    let source_versions = source
        .capabilities
        .supported_hardware_versions
        .clone()
        .into_vec();
    let target_versions = target
        .capabilities
        .supported_hardware_versions
        .clone()
        .into_vec();
    let (source_family, source_highest) = highest_hardware_version(&source_versions)?;
    let (target_family, target_highest) = highest_hardware_version(&target_versions)?;
    if source_highest > target_highest {
        return Err(PreflightError::validation(format!(
            "hardware versions of source and target provider VDCs are not compatible; \
             the target must support at least the source version (source {}-{}, target {}-{})",
            source_family, source_highest, target_family, target_highest
        )));
    }
    debug!("hardware versions of source and target provider VDCs are compatible");
    Ok(())
}

/// Retrieve every VDC compute policy, page by page
pub async fn fetch_compute_policies<C: ApiClient>(
    session: &VcdSession<C>,
) -> Result<Vec<ComputePolicy>, PreflightError> {
    debug!("getting VDC compute policies");
    let response = session
        .get(&endpoints::compute_policies_url(session.endpoint()))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve VDC compute policies",
            response.error_message(),
        ));
    }
    let first: Page<ComputePolicy> = response.json()?;
    let total = first.result_total;
    let mut policies = Vec::new();
    let mut page_no = 1;
    while (policies.len() as u64) < total {
        let response = session
            .get(&endpoints::compute_policies_page_url(
                session.endpoint(),
                page_no,
                endpoints::COMPUTE_POLICY_PAGE_SIZE,
            ))
            .await?;
        if !response.is_success() {
            return Err(PreflightError::remote(
                "failed to retrieve VDC compute policies",
                response.error_message(),
            ));
        }
        let page: Page<ComputePolicy> = response.json()?;
        if page.values.is_empty() {
            break;
        }
        policies.extend(page.values);
        debug!("compute policies retrieved so far: {}", policies.len());
        page_no += 1;
    }
    Ok(policies)
}

/// Every placement policy on the source org VDC must exist in the target
/// provider VDC
pub async fn validate_placement_policies<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    source_org_vdc_id: &str,
) -> Result<(), PreflightError> {
    let response = session
        .get(&endpoints::org_vdc_compute_policy_refs_url(
            session.endpoint(),
            source_org_vdc_id,
        ))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve source org VDC compute policies",
            response.error_message(),
        ));
    }
    let refs: ComputePolicyRefs = response.json()?;
    let source_policies = refs.vdc_compute_policy_reference.into_vec();
    store.write(
        keys::SOURCE_ORG_VDC_COMPUTE_POLICY_LIST,
        serde_json::to_value(&source_policies).expect("policy references serialize"),
    )?;

    let source_vdc: AdminVdc = store.fact(keys::SOURCE_ORG_VDC)?;
    let target_pvdc: ProviderVdc = store.fact(keys::TARGET_PROVIDER_VDC)?;

    // Policies on the target PVDC carrying a source policy's name, counted once
    let all_policies = fetch_compute_policies(session).await?;
    let source_names: Vec<&str> = source_policies
        .iter()
        .map(|reference| reference.name.as_str())
        .collect();
    let mut target_names: Vec<String> = Vec::new();
    for policy in &all_policies {
        if policy.pvdc_id.as_deref() == Some(target_pvdc.id.as_str())
            && source_names.contains(&policy.name.as_str())
            && !target_names.contains(&policy.name)
        {
            target_names.push(policy.name.clone());
        }
    }

    // Placement (non sizing-only) policies on the source, counted once
    let mut placement_names: Vec<String> = Vec::new();
    for reference in &source_policies {
        if reference.name == SYSTEM_DEFAULT_POLICY {
            continue;
        }
        let response = session.get(&reference.href).await?;
        if !response.is_success() {
            return Err(PreflightError::remote(
                format!("failed to retrieve compute policy {}", reference.name),
                response.error_message(),
            ));
        }
        let detail: ComputePolicyDetail = response.json()?;
        if !detail.is_sizing_only && !placement_names.contains(&reference.name) {
            placement_names.push(reference.name.clone());
        }
    }

    if placement_names.len() != target_names.len() {
        return Err(PreflightError::validation(format!(
            "target provider VDC {} does not have the placement policies of source org VDC {}",
            target_pvdc.name, source_vdc.name
        )));
    }
    debug!("source org VDC placement policies exist in the target provider VDC");
    Ok(())
}

/// Storage profiles of the source org VDC must all exist in the target
/// provider VDC
pub fn validate_storage_profiles(store: &FactStore) -> Result<(), PreflightError> {
    let source_vdc: AdminVdc = store.fact(keys::SOURCE_ORG_VDC)?;
    let target_pvdc: ProviderVdc = store.fact(keys::TARGET_PROVIDER_VDC)?;
    let source_profiles = source_vdc.vdc_storage_profiles.into_vec();
    let target_profiles = target_pvdc.storage_profiles.into_vec();

    let found: Vec<&str> = source_profiles
        .iter()
        .filter(|source| target_profiles.iter().any(|target| target.name == source.name))
        .map(|profile| profile.name.as_str())
        .collect();
    debug!("storage profiles found in target provider VDC: {:?}", found);

    if found.len() != source_profiles.len() {
        return Err(PreflightError::validation(
            "storage profiles in the target provider VDC must match those of the source org VDC",
        ));
    }
    debug!("storage profiles in the target provider VDC match the source org VDC");
    Ok(())
}
