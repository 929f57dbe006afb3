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

use crate::cluster::ClusterTopology;
use crate::error::Error;
use crate::resources::ledger::{
    CoreResourceLimits, ExceededResource, LedgerUsage, ResourceKind, ResourceLedger,
};
use crate::resources::soc::{CoreCoord, SocDescriptor};
use crate::ChipId;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A core of a specific chip.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoreLocation {
    pub chip: ChipId,
    pub core: CoreCoord,
}

impl CoreLocation {
    pub fn new(chip: ChipId, core: CoreCoord) -> Self {
        Self { chip, core }
    }
}

impl Display for CoreLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "(c={}, y={}, x={})", self.chip, self.core.y, self.core.x)
    }
}

/// Saved usage of every ledger in a model.
#[derive(Clone, Debug)]
pub struct ModelCheckpoint {
    usage: BTreeMap<CoreLocation, LedgerUsage>,
}

/// Owner of the ledgers of every core used by a build.
///
/// A core without a ledger is not part of the build. Looking one up with
/// `core` or `core_mut` is a caller bug and panics; use `get` when absence
/// is expected.
#[derive(Clone, Debug)]
pub struct ClusterResourceModel {
    chip_hw_cores: BTreeMap<CoreLocation, ResourceLedger>,
}

impl ClusterResourceModel {
    pub fn new(chip_hw_cores: BTreeMap<CoreLocation, ResourceLedger>) -> Result<Self, Error> {
        if chip_hw_cores.is_empty() {
            return Err(Error::EmptyResourceModel);
        }
        Ok(Self { chip_hw_cores })
    }

    /// One ledger per ethernet core with a connected channel and per worker
    /// core, for every active chip of `topology`.
    pub fn for_cluster<S: SocDescriptor>(
        topology: &ClusterTopology,
        soc: &S,
        limits: &CoreResourceLimits,
    ) -> Result<Self, Error> {
        let mut chip_hw_cores = BTreeMap::new();
        for chip in topology.chips().iter() {
            for chan in topology.active_channels(*chip) {
                let core = soc
                    .ethernet_core(chan)
                    .ok_or(Error::UnmappedEthernetChannel(*chip, chan))?;
                chip_hw_cores.insert(
                    CoreLocation::new(*chip, core),
                    ResourceLedger::new(limits, true),
                );
            }
            for core in soc.worker_cores().iter() {
                chip_hw_cores.insert(
                    CoreLocation::new(*chip, *core),
                    ResourceLedger::new(limits, false),
                );
            }
        }
        log::debug!(
            "Resource model for {} chips with {} cores",
            topology.number_of_chips(),
            chip_hw_cores.len()
        );
        Self::new(chip_hw_cores)
    }

    pub fn len(&self) -> usize {
        self.chip_hw_cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chip_hw_cores.is_empty()
    }

    pub fn contains(&self, location: &CoreLocation) -> bool {
        self.chip_hw_cores.contains_key(location)
    }

    pub fn get(&self, location: &CoreLocation) -> Option<&ResourceLedger> {
        self.chip_hw_cores.get(location)
    }

    pub fn core(&self, location: &CoreLocation) -> &ResourceLedger {
        match self.chip_hw_cores.get(location) {
            Some(ledger) => ledger,
            None => panic!(
                "Core {} not available in current temporal epoch",
                location
            ),
        }
    }

    pub fn core_mut(&mut self, location: &CoreLocation) -> &mut ResourceLedger {
        match self.chip_hw_cores.get_mut(location) {
            Some(ledger) => ledger,
            None => panic!(
                "Core {} not available in current temporal epoch",
                location
            ),
        }
    }

    pub fn cores(&self) -> impl Iterator<Item = (&CoreLocation, &ResourceLedger)> {
        self.chip_hw_cores.iter()
    }

    pub fn any_limit_exceeded(&self, ignored: &[ResourceKind]) -> bool {
        self.chip_hw_cores
            .values()
            .any(|ledger| ledger.any_limit_exceeded(ignored))
    }

    /// Every exceeded resource, ordered by core location.
    pub fn exceeded_resources(
        &self,
        ignored: &[ResourceKind],
    ) -> Vec<(CoreLocation, ExceededResource)> {
        self.chip_hw_cores
            .iter()
            .flat_map(|(location, ledger)| {
                ledger
                    .exceeded_resources(ignored)
                    .into_iter()
                    .map(move |exceeded| (*location, exceeded))
            })
            .collect()
    }

    pub fn checkpoint(&self) -> ModelCheckpoint {
        ModelCheckpoint {
            usage: self
                .chip_hw_cores
                .iter()
                .map(|(location, ledger)| (*location, ledger.usage()))
                .collect(),
        }
    }

    /// Restore the usage saved in `checkpoint`. Cores the checkpoint does not
    /// know about are left untouched.
    pub fn rollback(&mut self, checkpoint: ModelCheckpoint) {
        log::debug!("Rolling back {} core ledgers", checkpoint.usage.len());
        for (location, usage) in checkpoint.usage {
            if let Some(ledger) = self.chip_hw_cores.get_mut(&location) {
                ledger.restore_usage(usage);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{topologies, ClusterDescription};
    use crate::resources::soc::SocLayout;

    fn square() -> ClusterTopology {
        let desc =
            ClusterDescription::from_str(include_str!("../../testdata/wormhole_4chip_square_cluster.yaml"))
                .unwrap();
        ClusterTopology::from_description(&desc).unwrap()
    }

    #[test]
    fn test_empty_model_is_rejected() {
        assert_eq!(
            ClusterResourceModel::new(BTreeMap::new()).unwrap_err(),
            Error::EmptyResourceModel
        );
    }

    #[test]
    fn test_model_for_cluster() {
        let _logger = env_logger::builder().try_init();
        let topology = square();
        let soc = SocLayout::wormhole();
        let model =
            ClusterResourceModel::for_cluster(&topology, &soc, &CoreResourceLimits::default())
                .unwrap();
        // 8 connected channels and 80 workers per chip
        assert_eq!(model.len(), 4 * (8 + 80));

        let eth = CoreLocation::new(0, soc.ethernet_core(0).unwrap());
        assert_eq!(model.core(&eth).max_ethernet_streams(), 8);
        let worker = CoreLocation::new(2, soc.worker_cores()[0]);
        assert_eq!(model.core(&worker).max_ethernet_streams(), 0);

        // channel 8 is not connected on chip 0
        let unused = CoreLocation::new(0, soc.ethernet_core(8).unwrap());
        assert!(!model.contains(&unused));
        assert!(model.get(&unused).is_none());
    }

    #[test]
    fn test_model_respects_active_chips() {
        let mut topology = square();
        topology.restrict_active(&[0, 1]).unwrap();
        let soc = SocLayout::wormhole();
        let model =
            ClusterResourceModel::for_cluster(&topology, &soc, &CoreResourceLimits::default())
                .unwrap();
        // only the 0<->1 links remain
        assert_eq!(model.len(), 2 * (4 + 80));
        assert!(model.cores().all(|(location, _)| location.chip < 2));
    }

    #[test]
    fn test_unmapped_channel() {
        let topology = ClusterTopology::from_description(&topologies::line(2, 2)).unwrap();
        let soc = SocLayout {
            ethernet_cores: vec![CoreCoord::new(1, 0)],
            ..Default::default()
        };
        let result =
            ClusterResourceModel::for_cluster(&topology, &soc, &CoreResourceLimits::default());
        assert_eq!(result.unwrap_err(), Error::UnmappedEthernetChannel(0, 1));
    }

    #[test]
    #[should_panic(expected = "Core (c=3, y=4, x=4) not available in current temporal epoch")]
    fn test_unknown_core_is_fatal() {
        let topology = ClusterTopology::from_description(&topologies::line(2, 1)).unwrap();
        let model = ClusterResourceModel::for_cluster(
            &topology,
            &SocLayout::wormhole(),
            &CoreResourceLimits::default(),
        )
        .unwrap();
        model.core(&CoreLocation::new(3, CoreCoord::new(4, 4)));
    }

    #[test]
    fn test_exceeded_resources_and_rollback() {
        let _logger = env_logger::builder().try_init();
        let topology = ClusterTopology::from_description(&topologies::line(2, 1)).unwrap();
        let soc = SocLayout::wormhole();
        let mut model =
            ClusterResourceModel::for_cluster(&topology, &soc, &CoreResourceLimits::default())
                .unwrap();
        let eth = CoreLocation::new(1, soc.ethernet_core(0).unwrap());
        let worker = CoreLocation::new(0, soc.worker_cores()[3]);

        model.core_mut(&eth).add_ethernet_streams(2);
        let checkpoint = model.checkpoint();
        assert!(!model.any_limit_exceeded(&[]));

        model.core_mut(&eth).add_ethernet_streams(7);
        model.core_mut(&worker).add_dram_input();
        model.core_mut(&worker).add_ethernet_streams(1);
        assert!(model.any_limit_exceeded(&[]));
        let exceeded = model.exceeded_resources(&[]);
        assert_eq!(exceeded.len(), 2);
        assert_eq!(exceeded[0].0, worker);
        assert_eq!(exceeded[0].1.kind, ResourceKind::EthernetStreams);
        assert_eq!(exceeded[0].1.limit, 0);
        assert_eq!(exceeded[1].0, eth);
        assert_eq!(exceeded[1].1.used, 9);
        assert!(!model.any_limit_exceeded(&[ResourceKind::EthernetStreams]));

        model.rollback(checkpoint);
        assert!(!model.any_limit_exceeded(&[]));
        assert_eq!(model.core(&eth).used_ethernet_stream_count(), 2);
        assert_eq!(model.core(&worker).used_dram_input_slots(), 0);
    }
}
