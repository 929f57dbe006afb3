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

use std::fmt;

use crate::ChannelId;
use crate::ChipId;

#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// A description or configuration file could not be read.
    FileNotFound(String),
    /// A description or configuration file is not valid YAML for its schema.
    InvalidYaml(String),
    /// A chip location does not have exactly (x, y, rack, shelf) entries.
    InvalidEthCoord(ChipId, usize),
    /// Two ethernet connection entries disagree about the far end of a channel.
    InconsistentEthernetConnection(ChipId, ChannelId),
    /// A connection, MMIO, harvesting or active-set entry names a chip that
    /// is not part of the cluster.
    UnknownChip(ChipId),
    /// The SoC descriptor has no core for a connected ethernet channel.
    UnmappedEthernetChannel(ChipId, ChannelId),
    EmptyResourceModel,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FileNotFound(name) => {
                write!(f, "ERROR: file {} does not exist or is not readable", name)
            }
            Self::InvalidYaml(msg) => write!(f, "ERROR: Invalid YAML: {}", msg),
            Self::InvalidEthCoord(chip, size) => {
                write!(
                    f,
                    "ERROR: chip {} has {} location coordinates; (x, y, rack, shelf) coords must be size 4",
                    chip, size
                )
            }
            Self::InconsistentEthernetConnection(chip, chan) => {
                write!(
                    f,
                    "ERROR: Duplicate eth connection found for chip {}, chan {}",
                    chip, chan
                )
            }
            Self::UnknownChip(chip) => write!(f, "ERROR: Unknown chip {}", chip),
            Self::UnmappedEthernetChannel(chip, chan) => {
                write!(
                    f,
                    "ERROR: ethernet channel {} of chip {} has no core in the SoC descriptor",
                    chan, chip
                )
            }
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::InvalidYaml(e.to_string())
    }
}
