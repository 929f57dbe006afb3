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
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Physical (NOC) coordinate of a core within a chip.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct CoreCoord {
    pub x: usize,
    pub y: usize,
}

impl CoreCoord {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl Display for CoreCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "(y={}, x={})", self.y, self.x)
    }
}

/// Read-only view of a chip's core layout.
///
/// Only the mapping from ethernet channels to the cores that host them and
/// the classification of cores is needed to build a resource model.
pub trait SocDescriptor {
    /// The core hosting ethernet channel `chan`.
    fn ethernet_core(&self, chan: ChannelId) -> Option<CoreCoord>;
    fn ethernet_cores(&self) -> &[CoreCoord];
    fn worker_cores(&self) -> &[CoreCoord];
    fn dram_cores(&self) -> &[CoreCoord];

    fn is_ethernet_core(&self, core: CoreCoord) -> bool {
        self.ethernet_cores().contains(&core)
    }

    fn is_dram_core(&self, core: CoreCoord) -> bool {
        self.dram_cores().contains(&core)
    }
}

/// Serialized SoC layout; ethernet cores are listed in channel order.
///
/// ```yaml
/// ethernet_cores: [{x: 9, y: 0}, {x: 1, y: 0}]
/// worker_cores: [{x: 1, y: 1}]
/// dram_cores: [{x: 0, y: 0}]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SocLayout {
    pub ethernet_cores: Vec<CoreCoord>,
    #[serde(default)]
    pub worker_cores: Vec<CoreCoord>,
    #[serde(default)]
    pub dram_cores: Vec<CoreCoord>,
}

impl SocLayout {
    pub fn from_file<P: AsRef<Path>>(file_name: P) -> Result<Self, Error> {
        let file = File::open(file_name.as_ref())
            .map_err(|_| Error::FileNotFound(file_name.as_ref().display().to_string()))?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_str(layout: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(layout)?)
    }

    /// A 10x12 grid with 16 ethernet cores on rows 0 and 6, DRAM cores on
    /// columns 0 and 5, and 8x10 workers in between.
    pub fn wormhole() -> Self {
        const ETH_COLUMNS: [usize; 8] = [9, 1, 8, 2, 7, 3, 6, 4];
        let ethernet_cores = [0, 6]
            .iter()
            .flat_map(|y| ETH_COLUMNS.iter().map(move |x| CoreCoord::new(*x, *y)))
            .collect();
        let worker_cores = (1..=11)
            .filter(|y| *y != 6)
            .flat_map(|y| {
                (1..=9)
                    .filter(|x| *x != 5)
                    .map(move |x| CoreCoord::new(x, y))
            })
            .collect();
        let dram_cores = [(0, 0), (0, 1), (0, 11), (0, 5), (0, 6), (0, 7)]
            .iter()
            .chain([(5, 0), (5, 1), (5, 11), (5, 2), (5, 9), (5, 10)].iter())
            .chain([(5, 3), (5, 4), (5, 8), (5, 5), (5, 6), (5, 7)].iter())
            .map(|(x, y)| CoreCoord::new(*x, *y))
            .collect();
        Self {
            ethernet_cores,
            worker_cores,
            dram_cores,
        }
    }
}

impl SocDescriptor for SocLayout {
    fn ethernet_core(&self, chan: ChannelId) -> Option<CoreCoord> {
        self.ethernet_cores.get(chan).copied()
    }

    fn ethernet_cores(&self) -> &[CoreCoord] {
        &self.ethernet_cores
    }

    fn worker_cores(&self) -> &[CoreCoord] {
        &self.worker_cores
    }

    fn dram_cores(&self) -> &[CoreCoord] {
        &self.dram_cores
    }
}
