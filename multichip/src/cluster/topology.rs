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

use crate::cluster::description::ClusterDescription;
use crate::error::Error;
use crate::ChannelId;
use crate::ChipId;
use bitvec::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Formatter};

/// Physical location of a chip in a multi-rack system.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EthCoord {
    pub x: i32,
    pub y: i32,
    pub rack: i32,
    pub shelf: i32,
}

impl EthCoord {
    pub fn new(x: i32, y: i32, rack: i32, shelf: i32) -> Self {
        Self { x, y, rack, shelf }
    }

    fn from_description(chip: ChipId, coords: &[i32]) -> Result<Self, Error> {
        match coords {
            [x, y, rack, shelf] => Ok(Self::new(*x, *y, *rack, *shelf)),
            _ => Err(Error::InvalidEthCoord(chip, coords.len())),
        }
    }
}

impl Display for EthCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "EthCoord(x={}, y={}, rack={}, shelf={})",
            self.x, self.y, self.rack, self.shelf
        )
    }
}

/// Returns the chip ids {0, .., num_chips - 1}.
pub fn sequential_chip_ids(num_chips: usize) -> BTreeSet<ChipId> {
    (0..num_chips).collect()
}

/// Validated model of the cluster.
///
/// The topology is immutable after construction except for the active chip
/// set. Chips outside the active set are treated as absent by every query
/// below, which allows a build to target a subset of a physical cluster.
/// Enumeration orders (chips, channels) are ascending, so query results are
/// reproducible across runs.
#[derive(Clone, Debug, Default)]
pub struct ClusterTopology {
    all_chips: BTreeSet<ChipId>,
    chips_with_mmio: BTreeSet<ChipId>,
    active_chips: BTreeSet<ChipId>,
    chip_locations: HashMap<ChipId, EthCoord>,
    /// chip -> channel -> (remote chip, remote channel); symmetric.
    ethernet_connections: BTreeMap<ChipId, BTreeMap<ChannelId, (ChipId, ChannelId)>>,
    harvesting_masks: HashMap<ChipId, u32>,
    noc_translation_enabled: HashMap<ChipId, bool>,
}

impl ClusterTopology {
    /// Build and validate a topology. Every chip starts active.
    pub fn from_description(desc: &ClusterDescription) -> Result<Self, Error> {
        let mut topo = Self::default();
        for (chip, coords) in desc.chips.iter() {
            let location = EthCoord::from_description(*chip, coords)?;
            topo.chip_locations.insert(*chip, location);
            topo.all_chips.insert(*chip);
        }

        for entry in desc.chips_with_mmio.iter() {
            let mmio_chip = entry.chip_id()?;
            topo.check_known(mmio_chip)?;
            topo.chips_with_mmio.insert(mmio_chip);
        }

        for [first, second] in desc.ethernet_connections.iter() {
            topo.check_known(first.chip)?;
            topo.check_known(second.chip)?;
            topo.insert_connection(first.chip, first.chan, second.chip, second.chan)?;
            topo.insert_connection(second.chip, second.chan, first.chip, first.chan)?;
        }

        for entry in desc.harvesting.iter() {
            for (chip, info) in entry.iter() {
                topo.check_known(*chip)?;
                topo.harvesting_masks.insert(*chip, info.harvest_mask);
                topo.noc_translation_enabled.insert(*chip, info.noc_translation);
            }
        }

        topo.enable_all();
        topo.log_description();
        Ok(topo)
    }

    /// A cluster of host-attached chips without ethernet links.
    pub fn mmio_only<I: IntoIterator<Item = ChipId>>(chip_ids: I) -> Self {
        let mut topo = Self::default();
        for chip in chip_ids {
            topo.all_chips.insert(chip);
            topo.chips_with_mmio.insert(chip);
            topo.chip_locations.insert(chip, EthCoord::default());
        }
        topo.enable_all();
        topo
    }

    fn check_known(&self, chip: ChipId) -> Result<(), Error> {
        if self.all_chips.contains(&chip) {
            Ok(())
        } else {
            Err(Error::UnknownChip(chip))
        }
    }

    // A channel may be listed more than once as long as every listing agrees
    // on the far end.
    fn insert_connection(
        &mut self,
        chip: ChipId,
        chan: ChannelId,
        remote_chip: ChipId,
        remote_chan: ChannelId,
    ) -> Result<(), Error> {
        let channels = self.ethernet_connections.entry(chip).or_default();
        match channels.get(&chan) {
            Some(existing) if *existing != (remote_chip, remote_chan) => {
                Err(Error::InconsistentEthernetConnection(chip, chan))
            }
            Some(_) => Ok(()),
            None => {
                channels.insert(chan, (remote_chip, remote_chan));
                Ok(())
            }
        }
    }

    fn log_description(&self) {
        log::debug!("Device IDs and Locations:");
        for chip in self.all_chips.iter() {
            log::debug!("\tchip: {},  {}", chip, self.chip_locations[chip]);
        }
        log::debug!("Ethernet Connectivity Descriptor:");
        for (chip, channels) in self.ethernet_connections.iter() {
            for (chan, (remote_chip, remote_chan)) in channels.iter() {
                log::debug!(
                    "\tchip: {}, chan: {}  <-->  chip: {}, chan: {}",
                    chip,
                    chan,
                    remote_chip,
                    remote_chan
                );
            }
        }
    }

    fn is_active(&self, chip: ChipId) -> bool {
        self.active_chips.contains(&chip)
    }

    /// Narrow the visible chips to `chip_ids`.
    pub fn restrict_active(&mut self, chip_ids: &[ChipId]) -> Result<(), Error> {
        for chip in chip_ids {
            self.check_known(*chip)?;
        }
        self.active_chips = chip_ids.iter().copied().collect();
        Ok(())
    }

    pub fn enable_all(&mut self) {
        self.active_chips = self.all_chips.clone();
    }

    pub fn is_mmio_capable(&self, chip: ChipId) -> bool {
        self.chips_with_mmio.contains(&chip)
    }

    /// The MMIO-capable chip whose id is numerically closest to `chip`.
    ///
    /// Chips are assumed to be numbered along the physical grid, so id
    /// distance approximates link distance. Ties go to the lower id.
    pub fn closest_mmio_chip(&self, chip: ChipId) -> ChipId {
        let mut min_distance = usize::MAX;
        let mut closest_chip = chip;
        for mmio_chip in self.chips_with_mmio.iter() {
            let distance = if *mmio_chip > chip {
                mmio_chip - chip
            } else {
                chip - mmio_chip
            };
            if distance < min_distance {
                min_distance = distance;
                closest_chip = *mmio_chip;
            }
        }
        assert!(
            self.is_mmio_capable(closest_chip),
            "Closest MMIO chip to chip {} must be MMIO capable",
            chip
        );
        closest_chip
    }

    /// All (channel on `first`, channel on `second`) pairs that directly
    /// connect the two chips, in ascending order of the channel on `first`.
    pub fn directly_connected_channels(
        &self,
        first: ChipId,
        second: ChipId,
    ) -> Vec<(ChannelId, ChannelId)> {
        if !self.is_active(first) || !self.is_active(second) {
            return vec![];
        }
        self.ethernet_connections
            .get(&first)
            .map(|channels| {
                channels
                    .iter()
                    .filter(|(_, (remote_chip, _))| *remote_chip == second)
                    .map(|(chan, (_, remote_chan))| (*chan, *remote_chan))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn are_channels_connected(
        &self,
        first: ChipId,
        first_chan: ChannelId,
        second: ChipId,
        second_chan: ChannelId,
    ) -> bool {
        self.remote_endpoint(first, first_chan) == Some((second, second_chan))
    }

    /// The chip and channel at the far end of `chan` on `chip`.
    pub fn remote_endpoint(&self, chip: ChipId, chan: ChannelId) -> Option<(ChipId, ChannelId)> {
        if !self.is_active(chip) {
            return None;
        }
        let (remote_chip, remote_chan) = *self.ethernet_connections.get(&chip)?.get(&chan)?;
        if self.is_active(remote_chip) {
            Some((remote_chip, remote_chan))
        } else {
            None
        }
    }

    pub fn has_active_ethernet_link(&self, chip: ChipId, chan: ChannelId) -> bool {
        self.remote_endpoint(chip, chan).is_some()
    }

    pub fn has_ethernet_connectivity(&self) -> bool {
        !self.ethernet_connections().is_empty()
    }

    /// The ethernet adjacency restricted to active chips. Active chips without
    /// active links are omitted.
    pub fn ethernet_connections(
        &self,
    ) -> BTreeMap<ChipId, BTreeMap<ChannelId, (ChipId, ChannelId)>> {
        self.ethernet_connections
            .iter()
            .filter(|(chip, _)| self.is_active(**chip))
            .map(|(chip, channels)| {
                let active = channels
                    .iter()
                    .filter(|(_, (remote_chip, _))| self.is_active(*remote_chip))
                    .map(|(chan, remote)| (*chan, *remote))
                    .collect::<BTreeMap<_, _>>();
                (*chip, active)
            })
            .filter(|(_, channels)| !channels.is_empty())
            .collect()
    }

    /// Connected channels of `chip` in ascending order.
    pub fn active_channels(&self, chip: ChipId) -> Vec<ChannelId> {
        self.ethernet_connections
            .get(&chip)
            .map(|channels| {
                channels
                    .keys()
                    .filter(|chan| self.has_active_ethernet_link(chip, **chan))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Active chips.
    pub fn chips(&self) -> &BTreeSet<ChipId> {
        &self.active_chips
    }

    /// Every chip of the physical cluster, active or not.
    pub fn all_chips(&self) -> &BTreeSet<ChipId> {
        &self.all_chips
    }

    pub fn number_of_chips(&self) -> usize {
        self.active_chips.len()
    }

    pub fn chips_with_mmio(&self) -> BTreeSet<ChipId> {
        self.chips_with_mmio
            .intersection(&self.active_chips)
            .copied()
            .collect()
    }

    pub fn chip_locations(&self) -> HashMap<ChipId, EthCoord> {
        self.active_chips
            .iter()
            .filter_map(|chip| self.chip_locations.get(chip).map(|loc| (*chip, *loc)))
            .collect()
    }

    pub fn location(&self, chip: ChipId) -> Option<EthCoord> {
        if !self.is_active(chip) {
            return None;
        }
        self.chip_locations.get(&chip).copied()
    }

    /// Harvesting mask of an active chip; chips absent from the harvesting
    /// description are unharvested.
    pub fn harvesting_mask(&self, chip: ChipId) -> Option<u32> {
        if !self.is_active(chip) {
            return None;
        }
        Some(self.harvesting_masks.get(&chip).copied().unwrap_or(0))
    }

    pub fn noc_translation_enabled(&self, chip: ChipId) -> Option<bool> {
        if !self.is_active(chip) {
            return None;
        }
        Some(
            self.noc_translation_enabled
                .get(&chip)
                .copied()
                .unwrap_or(false),
        )
    }

    /// Indices of the harvested rows, decoded from the harvesting mask.
    pub fn harvested_rows(&self, chip: ChipId) -> Option<Vec<usize>> {
        let mask = self.harvesting_mask(chip)?;
        Some(mask.view_bits::<Lsb0>().iter_ones().collect())
    }
}
