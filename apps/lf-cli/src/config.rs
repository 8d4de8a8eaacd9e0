//! YAML run configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use lf_scan::ScanOptions;
use lf_sim::{IntegratorSettings, Protocol, SteadyStateSettings};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Settings shared by every subcommand.
///
/// ```yaml
/// integrator:
///   method: rk4
///   max_step: 0.01
/// steady_state:
///   tolerance: 1.0e-8
/// protocol:
///   - duration: 10
///     overrides: { k_in: 0.0 }
///   - duration: 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub integrator: IntegratorSettings,
    pub steady_state: SteadyStateSettings,
    /// Replaces the plain time course of `simulate` and `scan` when set
    pub protocol: Option<Protocol>,
    pub points_per_segment: usize,
    pub initial_conditions: BTreeMap<String, f64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        let scan = ScanOptions::default();
        Self {
            integrator: scan.integrator,
            steady_state: scan.steady_state,
            protocol: None,
            points_per_segment: scan.points_per_segment,
            initial_conditions: scan.initial_conditions,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> CliResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load_or_default(path: Option<&Path>) -> CliResult<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            integrator: self.integrator.clone(),
            steady_state: self.steady_state.clone(),
            points_per_segment: self.points_per_segment,
            initial_conditions: self.initial_conditions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        assert_eq!(RunConfig::from_yaml("{}").unwrap(), RunConfig::default());
    }

    #[test]
    fn reads_integrator_and_protocol() {
        let yaml = r#"
integrator:
  method: rk4
  max_step: 0.5
steady_state:
  newton_polish: true
protocol:
  - duration: 1.0
    overrides: { k_in: 0.0 }
  - duration: 2.0
points_per_segment: 4
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.integrator, IntegratorSettings::Rk4 { max_step: 0.5 });
        assert!(config.steady_state.newton_polish);
        let protocol = config.protocol.as_ref().unwrap();
        assert_eq!(protocol.segments().len(), 2);
        assert_eq!(protocol.total_duration(), 3.0);
        assert_eq!(config.scan_options().points_per_segment, 4);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            RunConfig::from_yaml("integrater: {}"),
            Err(CliError::Config(_))
        ));
    }
}
