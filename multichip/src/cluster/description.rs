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

use crate::error::Error;
use crate::ChannelId;
use crate::ChipId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One end of an ethernet link.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ChipEndpoint {
    pub chip: ChipId,
    pub chan: ChannelId,
}

/// An entry of `chips_with_mmio`. Discovery tools emit either the bare chip
/// id or a single-entry map from chip id to its PCI device number.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MmioChip {
    Id(ChipId),
    Mapped(BTreeMap<ChipId, usize>),
}

impl MmioChip {
    /// The chip id of the entry. A mapped entry must name exactly one chip.
    pub fn chip_id(&self) -> Result<ChipId, Error> {
        match self {
            Self::Id(chip) => Ok(*chip),
            Self::Mapped(map) => {
                let mut chips = map.keys();
                match (chips.next(), chips.next()) {
                    (Some(chip), None) => Ok(*chip),
                    _ => Err(Error::InvalidYaml(format!(
                        "chips_with_mmio entry must map exactly one chip, found {}",
                        map.len()
                    ))),
                }
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HarvestingInfo {
    pub noc_translation: bool,
    pub harvest_mask: u32,
}

/// The serialized cluster description.
///
/// ```yaml
/// chips:
///   0: [0, 0, 0, 0]
///   1: [1, 0, 0, 0]
/// chips_with_mmio:
///   - 0: 0
/// ethernet_connections:
///   - [{chip: 0, chan: 0}, {chip: 1, chan: 0}]
/// harvesting:
///   - 1: {noc_translation: true, harvest_mask: 1}
/// ```
///
/// Loading performs no semantic validation; see
/// `ClusterTopology::from_description`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ClusterDescription {
    /// chip id -> (x, y, rack, shelf)
    pub chips: BTreeMap<ChipId, Vec<i32>>,
    #[serde(default)]
    pub chips_with_mmio: Vec<MmioChip>,
    #[serde(default)]
    pub ethernet_connections: Vec<[ChipEndpoint; 2]>,
    #[serde(default)]
    pub harvesting: Vec<BTreeMap<ChipId, HarvestingInfo>>,
}

impl ClusterDescription {
    pub fn from_file<P: AsRef<Path>>(file_name: P) -> Result<Self, Error> {
        let file = File::open(file_name.as_ref())
            .map_err(|_| Error::FileNotFound(file_name.as_ref().display().to_string()))?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_str(description: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(description)?)
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn add_chip(&mut self, chip: ChipId, location: [i32; 4]) {
        self.chips.insert(chip, location.to_vec());
    }

    pub fn add_mmio_chip(&mut self, chip: ChipId) {
        self.chips_with_mmio.push(MmioChip::Id(chip));
    }

    /// Record one bidirectional link; only one direction is listed, the
    /// reverse is implied.
    pub fn connect(&mut self, chip_a: ChipId, chan_a: ChannelId, chip_b: ChipId, chan_b: ChannelId) {
        self.ethernet_connections.push([
            ChipEndpoint {
                chip: chip_a,
                chan: chan_a,
            },
            ChipEndpoint {
                chip: chip_b,
                chan: chan_b,
            },
        ]);
    }

    pub fn set_harvesting(&mut self, chip: ChipId, info: HarvestingInfo) {
        self.harvesting.push(BTreeMap::from([(chip, info)]));
    }
}
