//! VM affinity rule handling
//!
//! Affinity rules are captured, then disabled for the duration of the
//! migration. Each update is a long-running task the pipeline waits out.
//! The restore path replays each rule's original enablement from the fact
//! document.

use crate::api::{endpoints, ApiClient, VcdSession};
use crate::core::error::PreflightError;
use crate::core::model::{AffinityRule, VmAffinityRules};
use crate::execution::poller::TaskMonitor;
use crate::persistence::{keys, FactStore};
use tracing::debug;

/// Capture the source org VDC's affinity rules into the fact document
pub async fn fetch_affinity_rules<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    org_vdc_id: &str,
) -> Result<(), PreflightError> {
    debug!("getting source org VDC affinity rules");
    let response = session
        .get(&endpoints::affinity_rules_url(session.endpoint(), org_vdc_id))
        .await?;
    if !response.is_success() {
        return Err(PreflightError::remote(
            "failed to retrieve VM affinity rules of the source org VDC",
            response.error_message(),
        ));
    }
    let listing: VmAffinityRules = response.json()?;
    let rules = listing.into_rules();
    store.write(
        keys::SOURCE_VM_AFFINITY_RULES,
        serde_json::to_value(&rules).expect("affinity rules serialize"),
    )?;
    debug!("retrieved {} source org VDC affinity rules", rules.len());
    Ok(())
}

async fn update_rule<C: ApiClient>(
    session: &VcdSession<C>,
    monitor: &TaskMonitor,
    rule: &AffinityRule,
    enabled: bool,
) -> Result<(), PreflightError> {
    let payload = AffinityRule {
        is_enabled: enabled,
        ..rule.clone()
    };
    let body = serde_json::to_string(&payload).expect("affinity rule serializes");
    let response = session
        .put(
            &endpoints::affinity_rule_url(session.endpoint(), &rule.id),
            body,
        )
        .await?;
    if !response.is_success() {
        let verb = if enabled { "enable" } else { "disable" };
        return Err(PreflightError::remote(
            format!("failed to {} affinity rule {}", verb, rule.name),
            response.error_message(),
        ));
    }
    let task_url = response.header("location").ok_or_else(|| {
        PreflightError::remote(
            format!("affinity rule {} update returned no task location", rule.name),
            response.error_message(),
        )
    })?;
    monitor
        .wait_for_completion(
            session,
            task_url,
            endpoints::AFFINITY_RULE_UPDATE_TASK,
            false,
        )
        .await?;
    Ok(())
}

/// Disable every captured affinity rule
pub async fn disable_affinity_rules<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    monitor: &TaskMonitor,
) -> Result<(), PreflightError> {
    let rules: Vec<AffinityRule> = store.fact(keys::SOURCE_VM_AFFINITY_RULES)?;
    for rule in &rules {
        update_rule(session, monitor, rule, false).await?;
        debug!("affinity rule {} disabled in source", rule.name);
    }
    Ok(())
}

/// Compensation: put every rule back to its originally captured enablement
pub async fn restore_affinity_rules<C: ApiClient>(
    session: &VcdSession<C>,
    store: &FactStore,
    monitor: &TaskMonitor,
) -> Result<(), PreflightError> {
    let rules: Vec<AffinityRule> = store.fact(keys::SOURCE_VM_AFFINITY_RULES)?;
    for rule in &rules {
        update_rule(session, monitor, rule, rule.is_enabled).await?;
        debug!("affinity rule {} restored in source", rule.name);
    }
    Ok(())
}
