// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::cluster::{ClusterDescription, ClusterTopology};
use crate::error::Error;
use crate::resources::{ClusterResourceModel, CoreResourceLimits, SocLayout};
use crate::router::MulticastSlotCheck;
use crate::ChipId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub multicast_check: MulticastSlotCheck,
}

/// Everything needed to set up routing for one build.
///
/// ```yaml
/// cluster_description: /path/to/cluster.yaml
/// soc_layout: /path/to/soc.yaml   # optional, defaults to a wormhole layout
/// core_limits:
///   max_ethernet_streams: 8
/// planner:
///   multicast_check: ConsumerCore
/// active_chips: [0, 1]            # optional, defaults to all chips
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BuildConfig {
    pub cluster_description: PathBuf,
    #[serde(default)]
    pub soc_layout: Option<PathBuf>,
    #[serde(default)]
    pub core_limits: CoreResourceLimits,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub active_chips: Option<Vec<ChipId>>,
}

impl BuildConfig {
    pub fn new<P: AsRef<Path>>(cluster_description: P) -> Self {
        Self {
            cluster_description: cluster_description.as_ref().to_path_buf(),
            soc_layout: None,
            core_limits: CoreResourceLimits::default(),
            planner: PlannerConfig::default(),
            active_chips: None,
        }
    }

    pub fn from_file<P: AsRef<Path>>(file_name: P) -> Result<Self, Error> {
        let file = File::open(file_name.as_ref())
            .map_err(|_| Error::FileNotFound(file_name.as_ref().display().to_string()))?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_str(config: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(config)?)
    }

    pub fn soc_layout(&self) -> Result<SocLayout, Error> {
        match &self.soc_layout {
            Some(path) => SocLayout::from_file(path),
            None => Ok(SocLayout::wormhole()),
        }
    }

    /// Ledgers for the active chips of `topology` with the configured limits.
    pub fn resource_model(
        &self,
        topology: &ClusterTopology,
        soc: &SocLayout,
    ) -> Result<ClusterResourceModel, Error> {
        ClusterResourceModel::for_cluster(topology, soc, &self.core_limits)
    }
}

impl ClusterTopology {
    /// Load the cluster description named by `config` and apply its active
    /// chip subset.
    pub fn from_config(config: &BuildConfig) -> Result<Self, Error> {
        let desc = ClusterDescription::from_file(&config.cluster_description)?;
        let mut topology = Self::from_description(&desc)?;
        if let Some(active_chips) = &config.active_chips {
            topology.restrict_active(active_chips)?;
        }
        Ok(topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testdata(name: &str) -> String {
        format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    #[test]
    fn read_yaml_build_config() {
        let config = BuildConfig::from_str(
            "---
cluster_description: cluster.yaml
core_limits:
  max_ethernet_streams: 4
  l1_memory_size: 1024
planner:
  multicast_check: ConsumerCore
active_chips: [0, 2]
",
        )
        .unwrap();
        assert_eq!(config.cluster_description, PathBuf::from("cluster.yaml"));
        assert_eq!(config.soc_layout, None);
        assert_eq!(config.core_limits.max_ethernet_streams, 4);
        assert_eq!(config.core_limits.l1_memory_size, 1024);
        // unspecified limits keep their defaults
        assert_eq!(
            config.core_limits.max_multicast_streams,
            CoreResourceLimits::default().max_multicast_streams
        );
        assert_eq!(config.planner.multicast_check, MulticastSlotCheck::ConsumerCore);
        assert_eq!(config.active_chips, Some(vec![0, 2]));
    }

    #[test]
    fn minimal_build_config() {
        let config = BuildConfig::from_str("cluster_description: c.yaml").unwrap();
        assert_eq!(config, BuildConfig::new("c.yaml"));
        assert_eq!(config.planner.multicast_check, MulticastSlotCheck::Disabled);
        assert_eq!(config.soc_layout().unwrap(), SocLayout::wormhole());
    }

    #[test]
    fn invalid_build_config() {
        assert!(matches!(
            BuildConfig::from_str("core_limits: {}"),
            Err(Error::InvalidYaml(_))
        ));
    }

    #[test]
    fn topology_from_config() {
        let _logger = env_logger::builder().try_init();
        let mut config = BuildConfig::new(testdata("wormhole_4chip_square_cluster.yaml"));
        let topology = ClusterTopology::from_config(&config).unwrap();
        assert_eq!(topology.number_of_chips(), 4);

        config.active_chips = Some(vec![0, 2]);
        let topology = ClusterTopology::from_config(&config).unwrap();
        assert_eq!(topology.number_of_chips(), 2);
        assert!(topology.directly_connected_channels(0, 1).is_empty());
        assert_eq!(topology.directly_connected_channels(0, 2).len(), 4);

        let soc = config.soc_layout().unwrap();
        let model = config.resource_model(&topology, &soc).unwrap();
        assert_eq!(model.len(), 2 * (4 + 80));

        config.active_chips = Some(vec![0, 9]);
        assert_eq!(
            ClusterTopology::from_config(&config).unwrap_err(),
            Error::UnknownChip(9)
        );
    }

    #[test]
    fn missing_cluster_description() {
        let config = BuildConfig::new("/nonexistent/cluster.yaml");
        assert_eq!(
            ClusterTopology::from_config(&config).unwrap_err(),
            Error::FileNotFound("/nonexistent/cluster.yaml".to_string())
        );
        assert!(BuildConfig::from_file("/nonexistent/build.yaml").is_err());
    }
}
