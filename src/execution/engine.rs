//! Preflight pipeline driver
//!
//! Runs the discovery and validation steps strictly in declaration order,
//! fails fast on the first error, and honors the accumulated rollback
//! flags before re-raising that error. Identity and metadata discovery
//! precede every rule check that reads it; the source org VDC is disabled
//! only after every non-mutating precondition has passed, and everything
//! that depends on a mutation runs after it.

use crate::api::{ApiClient, VcdSession};
use crate::checks::{affinity, edge, network, org, provider, vapp};
use crate::core::config::MigrationConfig;
use crate::core::error::PreflightError;
use crate::core::model::{IpsecConfig, OrgVdcNetwork};
use crate::execution::poller::TaskMonitor;
use crate::execution::rollback::{RollbackAction, RollbackFlags};
use crate::persistence::{keys, FactStore};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The pipeline step names, in their mandatory execution order
pub const STEP_SEQUENCE: &[&str] = &[
    "establish-session",
    "fetch-organization",
    "fetch-source-org-vdc",
    "validate-target-org-vdc-absent",
    "validate-no-empty-vapps",
    "validate-no-suspended-vms",
    "validate-no-vapp-networks",
    "validate-not-fast-provisioned",
    "fetch-source-external-network",
    "fetch-target-external-network",
    "fetch-dummy-external-network",
    "validate-dedicated-external-network",
    "fetch-source-provider-vdc",
    "validate-source-network-pool",
    "validate-org-vdc-nsxv-backed",
    "fetch-target-provider-vdc",
    "validate-hardware-version",
    "validate-target-provider-vdc-enabled",
    "disable-source-org-vdc",
    "validate-placement-policies",
    "validate-storage-profiles",
    "validate-external-network-subnets",
    "fetch-affinity-rules",
    "disable-affinity-rules",
    "validate-single-edge-gateway",
    "fetch-org-vdc-networks",
    "validate-dhcp-on-isolated-networks",
    "validate-no-shared-networks",
    "validate-no-direct-networks",
    "fetch-edge-gateway-services",
    "validate-no-independent-disks",
];

/// Pipeline run state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running { step: &'static str, index: usize },
    Completed,
    Failed { step: String },
}

/// Events emitted while the pipeline runs
#[derive(Debug, Clone)]
pub enum PreflightEvent {
    RunStarted {
        run_id: Uuid,
        total_steps: usize,
    },
    StepStarted {
        name: &'static str,
        index: usize,
        total: usize,
    },
    StepCompleted {
        name: &'static str,
    },
    RunFailed {
        step: String,
        error: String,
    },
    RollbackStarted {
        action: RollbackAction,
    },
    RollbackCompleted {
        action: RollbackAction,
    },
    RollbackFailed {
        action: RollbackAction,
        error: String,
    },
    RunCompleted {
        run_id: Uuid,
    },
}

/// Type for event handlers
pub type EventHandler = Box<dyn Fn(&PreflightEvent) + Send + Sync>;

/// Everything the migration phase needs from a successful preflight run
#[derive(Debug)]
pub struct PreflightReport {
    pub source_org_vdc_id: String,
    pub org_vdc_networks: Vec<OrgVdcNetwork>,
    pub edge_gateway_id: String,
    pub bgp_config: Option<Value>,
    pub ipsec_config: Option<IpsecConfig>,
    pub completed_at: DateTime<Utc>,
}

/// The validation pipeline engine
///
/// Owns exactly one session, one fact store and the rollback flags for the
/// duration of a run; no concurrent run against the same store is
/// supported.
pub struct PreflightEngine<C: ApiClient> {
    session: VcdSession<C>,
    store: FactStore,
    config: MigrationConfig,
    monitor: TaskMonitor,
    handlers: Vec<EventHandler>,
    state: RunState,
    flags: RollbackFlags,
    run_id: Uuid,
    step_cursor: usize,
    source_org_vdc_id: Option<String>,
}

impl<C: ApiClient> PreflightEngine<C> {
    pub fn new(session: VcdSession<C>, store: FactStore, config: MigrationConfig) -> Self {
        let monitor = TaskMonitor::new(
            Duration::from_secs(config.timeouts.task_deadline_secs),
            Duration::from_secs(config.timeouts.poll_interval_secs),
        );
        Self {
            session,
            store,
            config,
            monitor,
            handlers: Vec::new(),
            state: RunState::NotStarted,
            flags: RollbackFlags::new(),
            run_id: Uuid::new_v4(),
            step_cursor: 0,
            source_org_vdc_id: None,
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&PreflightEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn flags(&self) -> &RollbackFlags {
        &self.flags
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    fn emit(&self, event: PreflightEvent) {
        for handler in &self.handlers {
            handler(&event);
        }
    }

    /// Mark the previous step complete and begin the next one
    fn enter(&mut self, name: &'static str) {
        self.finish_step();
        let index = self.step_cursor;
        self.step_cursor += 1;
        debug_assert_eq!(STEP_SEQUENCE.get(index), Some(&name));
        self.state = RunState::Running { step: name, index };
        self.emit(PreflightEvent::StepStarted {
            name,
            index,
            total: STEP_SEQUENCE.len(),
        });
    }

    fn finish_step(&mut self) {
        if let RunState::Running { step, .. } = &self.state {
            let name = *step;
            self.emit(PreflightEvent::StepCompleted { name });
        }
    }

    /// Execute the full preflight validation
    ///
    /// On failure the accumulated rollback flags are honored best-effort
    /// and the original error is re-raised, annotated with the failing
    /// step. The session is invalidated at teardown either way.
    pub async fn execute(&mut self) -> Result<PreflightReport, PreflightError> {
        self.emit(PreflightEvent::RunStarted {
            run_id: self.run_id,
            total_steps: STEP_SEQUENCE.len(),
        });
        let result = match self.run_steps().await {
            Ok(report) => {
                self.finish_step();
                self.state = RunState::Completed;
                self.emit(PreflightEvent::RunCompleted { run_id: self.run_id });
                Ok(report)
            }
            Err(err) => {
                let step = match &self.state {
                    RunState::Running { step, .. } => step.to_string(),
                    _ => "unknown".to_string(),
                };
                error!("error occurred while performing source validation - {}", err);
                let err = err.at_step(&step);
                self.emit(PreflightEvent::RunFailed {
                    step: step.clone(),
                    error: err.to_string(),
                });
                self.roll_back().await;
                self.state = RunState::Failed { step };
                Err(err)
            }
        };
        if let Err(logout_err) = self.session.logout().await {
            warn!("failed to invalidate the session at teardown: {}", logout_err);
        }
        result
    }

    async fn run_steps(&mut self) -> Result<PreflightReport, PreflightError> {
        let organization = self.config.organization.clone();
        let source_vdc_name = self.config.source_org_vdc.clone();
        let target_vdc_name = self.config.target_org_vdc_name();
        let source_side = self.config.nsxv_provider_vdc.clone();
        let target_side = self.config.nsxt_provider_vdc.clone();

        self.enter("establish-session");
        self.session.login().await?;

        self.enter("fetch-organization");
        info!("getting the organization {} details", organization);
        let org_url = org::fetch_org_url(&self.session, &organization).await?;

        self.enter("fetch-source-org-vdc");
        info!("getting the source org VDC {} details", source_vdc_name);
        let source_org_vdc_id = org::fetch_org_vdc_details(
            &self.session,
            &self.store,
            &org_url,
            &source_vdc_name,
            keys::SOURCE_ORG_VDC,
        )
        .await?;
        self.source_org_vdc_id = Some(source_org_vdc_id.clone());

        self.enter("validate-target-org-vdc-absent");
        info!("validating that no target org VDC named {} exists", target_vdc_name);
        org::validate_no_target_org_vdc(&self.store, &target_vdc_name)?;

        self.enter("validate-no-empty-vapps");
        info!("validating that no empty vApps exist in the source org VDC");
        vapp::validate_no_empty_vapps(&self.session, &self.store).await?;

        self.enter("validate-no-suspended-vms");
        info!("validating that no suspended VMs exist in the source vApps");
        vapp::validate_no_suspended_vms(&self.session, &self.store).await?;

        self.enter("validate-no-vapp-networks");
        info!("validating that vApps have no private vApp networks");
        vapp::validate_no_vapp_networks(&self.session, &self.store).await?;

        self.enter("validate-not-fast-provisioned");
        info!("validating that the source org VDC is not fast provisioned");
        org::validate_not_fast_provisioned(&self.store)?;

        self.enter("fetch-source-external-network");
        info!("getting the source external network {} details", source_side.external_network);
        network::fetch_external_network(
            &self.session,
            &self.store,
            &source_side.external_network,
            false,
        )
        .await?;

        self.enter("fetch-target-external-network");
        info!("getting the target external network {} details", target_side.external_network);
        network::fetch_external_network(
            &self.session,
            &self.store,
            &target_side.external_network,
            false,
        )
        .await?;

        self.enter("fetch-dummy-external-network");
        info!(
            "getting the dummy external network {} details",
            source_side.dummy_external_network
        );
        network::fetch_external_network(
            &self.session,
            &self.store,
            &source_side.dummy_external_network,
            true,
        )
        .await?;

        self.enter("validate-dedicated-external-network");
        info!("validating that no other edge gateway dedicates the target external network");
        network::validate_dedicated_external_network(&self.session, &self.store).await?;

        self.enter("fetch-source-provider-vdc");
        info!("getting the source provider VDC {} details", source_side.name);
        let (source_pvdc_id, source_nsxt_backed) =
            provider::fetch_provider_vdc(&self.session, &source_side.name).await?;
        provider::fetch_provider_vdc_details(
            &self.session,
            &self.store,
            &source_pvdc_id,
            source_nsxt_backed,
        )
        .await?;

        self.enter("validate-source-network-pool");
        info!("validating that the source network pool is VXLAN backed");
        org::validate_source_network_pool(&self.session, &self.store).await?;

        self.enter("validate-org-vdc-nsxv-backed");
        info!("validating that the source org VDC is NSX-V backed");
        org::validate_nsxv_backed(&self.store, &source_pvdc_id, source_nsxt_backed)?;

        self.enter("fetch-target-provider-vdc");
        info!("getting the target provider VDC {} details", target_side.name);
        let (target_pvdc_id, target_nsxt_backed) =
            provider::fetch_provider_vdc(&self.session, &target_side.name).await?;
        provider::fetch_provider_vdc_details(
            &self.session,
            &self.store,
            &target_pvdc_id,
            target_nsxt_backed,
        )
        .await?;

        self.enter("validate-hardware-version");
        info!("validating the hardware versions of the source and target provider VDCs");
        provider::validate_hardware_versions(&self.store)?;

        self.enter("validate-target-provider-vdc-enabled");
        info!("validating that the target provider VDC {} is enabled", target_side.name);
        provider::validate_target_provider_vdc_enabled(&self.store)?;

        // First mutation: runs only after every precondition above passed,
        // to keep its exposure window minimal
        self.enter("disable-source-org-vdc");
        info!("disabling the source org VDC {}", source_vdc_name);
        org::disable_source_org_vdc(&self.session, &self.store, &source_org_vdc_id).await?;
        self.flags.mark_source_org_vdc_disabled();

        self.enter("validate-placement-policies");
        info!("validating that source org VDC placement policies exist in the target provider VDC");
        provider::validate_placement_policies(&self.session, &self.store, &source_org_vdc_id)
            .await?;

        self.enter("validate-storage-profiles");
        info!("validating that source and target storage profiles match");
        provider::validate_storage_profiles(&self.store)?;

        self.enter("validate-external-network-subnets");
        info!("validating that source and target external networks share a subnet");
        network::validate_external_network_subnets(&self.store)?;

        self.enter("fetch-affinity-rules");
        info!("getting the VM affinity rules of the source org VDC");
        affinity::fetch_affinity_rules(&self.session, &self.store, &source_org_vdc_id).await?;

        self.enter("disable-affinity-rules");
        info!("disabling the source org VDC affinity rules");
        affinity::disable_affinity_rules(&self.session, &self.store, &self.monitor).await?;
        self.flags.mark_affinity_rules_disabled();

        self.enter("validate-single-edge-gateway");
        info!("validating that a single edge gateway exists in the source org VDC");
        let edge_gateway_id =
            edge::validate_single_edge_gateway(&self.session, &self.store, &source_org_vdc_id)
                .await?;

        self.enter("fetch-org-vdc-networks");
        info!("getting the org VDC networks of the source org VDC");
        let org_vdc_networks = network::fetch_org_vdc_networks(
            &self.session,
            &self.store,
            &source_org_vdc_id,
            keys::SOURCE_ORG_VDC_NETWORKS,
        )
        .await?;

        self.enter("validate-dhcp-on-isolated-networks");
        info!("validating that DHCP is disabled on isolated org VDC networks");
        network::validate_dhcp_disabled_on_isolated(&self.session, &org_vdc_networks).await?;

        self.enter("validate-no-shared-networks");
        info!("validating that no org VDC network is shared");
        network::validate_no_shared_networks(&org_vdc_networks)?;

        self.enter("validate-no-direct-networks");
        info!("validating that no org VDC network is direct");
        network::validate_no_direct_networks(&org_vdc_networks)?;

        self.enter("fetch-edge-gateway-services");
        info!("getting the services configured on the source edge gateway");
        let (bgp_config, ipsec_config) =
            edge::fetch_edge_gateway_services(&self.session, &self.store, &edge_gateway_id).await?;

        self.enter("validate-no-independent-disks");
        info!("validating that no independent disks exist in the source org VDC");
        org::validate_no_independent_disks(&self.session, &source_org_vdc_id).await?;

        Ok(PreflightReport {
            source_org_vdc_id,
            org_vdc_networks,
            edge_gateway_id,
            bgp_config,
            ipsec_config,
            completed_at: Utc::now(),
        })
    }

    /// Reverse the mutations whose flag is set, in the fixed compensation
    /// order; every compensation is attempted even when an earlier one
    /// fails, and secondary failures are logged, never raised
    async fn roll_back(&mut self) {
        for action in self.flags.actions() {
            info!("rollback: {}", action.describe());
            self.emit(PreflightEvent::RollbackStarted { action });
            let result = match action {
                RollbackAction::ReenableSourceOrgVdc => match &self.source_org_vdc_id {
                    Some(org_vdc_id) => {
                        org::enable_source_org_vdc(&self.session, &self.store, org_vdc_id).await
                    }
                    None => Ok(()),
                },
                RollbackAction::RestoreAffinityRules => {
                    affinity::restore_affinity_rules(&self.session, &self.store, &self.monitor)
                        .await
                }
            };
            match result {
                Ok(()) => self.emit(PreflightEvent::RollbackCompleted { action }),
                Err(err) => {
                    error!("rollback action '{}' failed: {}", action.describe(), err);
                    self.emit(PreflightEvent::RollbackFailed {
                        action,
                        error: err.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_index(name: &str) -> usize {
        STEP_SEQUENCE
            .iter()
            .position(|step| *step == name)
            .unwrap_or_else(|| panic!("step {} not declared", name))
    }

    #[test]
    fn test_step_names_are_unique() {
        let mut names: Vec<&str> = STEP_SEQUENCE.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), STEP_SEQUENCE.len());
    }

    #[test]
    fn test_discovery_precedes_dependent_checks() {
        assert!(step_index("fetch-source-org-vdc") < step_index("validate-not-fast-provisioned"));
        assert!(step_index("fetch-target-provider-vdc") < step_index("validate-storage-profiles"));
        assert!(
            step_index("fetch-target-external-network")
                < step_index("validate-external-network-subnets")
        );
    }

    #[test]
    fn test_mutation_runs_after_every_non_mutating_precondition() {
        let disable = step_index("disable-source-org-vdc");
        for precondition in [
            "validate-target-org-vdc-absent",
            "validate-no-empty-vapps",
            "validate-no-suspended-vms",
            "validate-no-vapp-networks",
            "validate-not-fast-provisioned",
            "validate-dedicated-external-network",
            "validate-source-network-pool",
            "validate-org-vdc-nsxv-backed",
            "validate-hardware-version",
            "validate-target-provider-vdc-enabled",
        ] {
            assert!(
                step_index(precondition) < disable,
                "{} must run before the disable mutation",
                precondition
            );
        }
    }

    #[test]
    fn test_mutation_dependent_checks_run_after_mutations() {
        assert!(step_index("disable-affinity-rules") < step_index("validate-single-edge-gateway"));
        assert!(step_index("disable-source-org-vdc") < step_index("fetch-affinity-rules"));
        assert!(
            step_index("validate-single-edge-gateway") < step_index("fetch-edge-gateway-services")
        );
    }
}
