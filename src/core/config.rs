//! Migration configuration from YAML

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Connection details for the VMware Cloud Director instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcdConnection {
    /// Base URL, e.g. `https://vcd.example.com`
    pub endpoint: String,

    /// Administrator user name; the system context is appended at login
    pub username: String,

    /// Administrator password
    pub password: String,

    /// Whether to verify the server TLS certificate
    #[serde(default = "default_true")]
    pub verify_tls: bool,
}

/// The NSX-V backed side of the migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceProviderConfig {
    /// Provider VDC name backing the source org VDC
    pub name: String,

    /// External network uplinking the source edge gateway
    pub external_network: String,

    /// Placeholder external network used during the bridging phase
    pub dummy_external_network: String,
}

/// The NSX-T backed side of the migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetProviderConfig {
    /// Provider VDC name the org VDC migrates onto
    pub name: String,

    /// Tier-0 backed external network for the target edge gateway
    pub external_network: String,
}

/// Task polling limits, overridable per deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTimeouts {
    /// Hard ceiling for a long-running task to reach a terminal state
    #[serde(default = "default_task_deadline")]
    pub task_deadline_secs: u64,

    /// Sleep between task status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for TaskTimeouts {
    fn default() -> Self {
        Self {
            task_deadline_secs: default_task_deadline(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_task_deadline() -> u64 {
    3600
}

fn default_poll_interval() -> u64 {
    10
}

/// Full configuration for a preflight validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// VCD connection details
    pub vcd: VcdConnection,

    /// Organization owning the source org VDC
    pub organization: String,

    /// Name of the org VDC to migrate
    pub source_org_vdc: String,

    /// Name the migrated org VDC will take; defaults to `{source}-t`
    #[serde(default)]
    pub target_org_vdc: Option<String>,

    /// NSX-V provider VDC side
    pub nsxv_provider_vdc: SourceProviderConfig,

    /// NSX-T provider VDC side
    pub nsxt_provider_vdc: TargetProviderConfig,

    /// Task polling limits
    #[serde(default)]
    pub timeouts: TaskTimeouts,

    /// Override for the fact document location
    #[serde(default)]
    pub facts_path: Option<PathBuf>,
}

impl MigrationConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: MigrationConfig =
            serde_yaml::from_str(yaml).context("Failed to parse migration config")?;
        config.validate()?;
        Ok(config)
    }

    /// Name the target org VDC must not yet exist under
    pub fn target_org_vdc_name(&self) -> String {
        self.target_org_vdc
            .clone()
            .unwrap_or_else(|| format!("{}-t", self.source_org_vdc))
    }

    /// Sanity-check required fields
    pub fn validate(&self) -> Result<()> {
        if !self.vcd.endpoint.starts_with("http") {
            anyhow::bail!("vcd.endpoint must be an http(s) URL");
        }
        for (field, value) in [
            ("vcd.username", &self.vcd.username),
            ("organization", &self.organization),
            ("source_org_vdc", &self.source_org_vdc),
            ("nsxv_provider_vdc.name", &self.nsxv_provider_vdc.name),
            ("nsxt_provider_vdc.name", &self.nsxt_provider_vdc.name),
            (
                "nsxv_provider_vdc.external_network",
                &self.nsxv_provider_vdc.external_network,
            ),
            (
                "nsxt_provider_vdc.external_network",
                &self.nsxt_provider_vdc.external_network,
            ),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", field);
            }
        }
        if self.timeouts.poll_interval_secs == 0 {
            anyhow::bail!("timeouts.poll_interval_secs must be greater than zero");
        }
        Ok(())
    }
}
