//! Run settings
//!
//! Every timeout, backoff, concurrency limit and naming convention the
//! orchestrator uses lives here. A settings file only needs the keys it
//! overrides:
//!
//! ```yaml
//! timeouts:
//!   stack_secs: 1800
//! concurrency:
//!   per_region: 2
//! mesh:
//!   topology: hub
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timeouts: Timeouts,
    pub backoff: Backoff,
    pub concurrency: Concurrency,
    pub routing: Routing,
    pub stack: StackSettings,
    pub mesh: MeshSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load the explicit file if given, otherwise the discovered one, otherwise defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match crate::find_settings_file() {
            Some(path) => Self::from_file(path),
            None => {
                tracing::debug!("No settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency.max_in_flight == 0 || self.concurrency.per_region == 0 {
            return Err(ConfigError::InvalidSettings(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(ConfigError::InvalidSettings(
                "backoff.multiplier must be >= 1.0".to_string(),
            ));
        }
        if self.backoff.initial_delay_ms > self.backoff.max_delay_ms {
            return Err(ConfigError::InvalidSettings(
                "backoff.initial_delay_ms must not exceed backoff.max_delay_ms".to_string(),
            ));
        }
        if self.timeouts.call_secs == 0 {
            return Err(ConfigError::InvalidSettings(
                "timeouts.call_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Bound on any single provider call
    pub call_secs: u64,
    /// Bound on waiting for a stack to reach a terminal state
    pub stack_secs: u64,
    /// Bound on each peering status wait
    pub peering_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            call_secs: 30,
            stack_secs: 1800,
            peering_secs: 120,
        }
    }
}

impl Timeouts {
    pub fn call(&self) -> Duration {
        Duration::from_secs(self.call_secs)
    }

    pub fn stack(&self) -> Duration {
        Duration::from_secs(self.stack_secs)
    }

    pub fn peering(&self) -> Duration {
        Duration::from_secs(self.peering_secs)
    }
}

/// Capped exponential backoff for status polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Concurrency {
    /// Items processed at once within a phase
    pub max_in_flight: usize,
    /// Items touching the same region at once
    pub per_region: usize,
}

impl Default for Concurrency {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            per_region: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Routing {
    pub table_tag_key: String,
    pub table_tag_value: String,
    /// Stack parameter holding a VPC's CIDR block
    pub cidr_parameter: String,
}

impl Default for Routing {
    fn default() -> Self {
        Self {
            table_tag_key: "aws:cloudformation:logical-id".to_string(),
            table_tag_value: "PublicRouteTable".to_string(),
            cidr_parameter: "VPCCIDRBlock".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    /// Logical id of the VPC resource inside each stack
    pub vpc_logical_id: String,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            vpc_logical_id: "VPC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Every VPC peers with every other VPC
    #[default]
    Mesh,
    /// The first VPC peers with every other VPC; the rest stay unpeered
    Hub,
}

impl std::str::FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mesh" => Ok(Topology::Mesh),
            "hub" => Ok(Topology::Hub),
            other => Err(format!("unknown topology '{other}' (expected mesh or hub)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    pub topology: Topology,
}
