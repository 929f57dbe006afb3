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

//! cluster topology: which chips exist and how their ethernet channels are
//! wired together.
//!
//! A `ClusterDescription` is the serialized form produced by an external
//! discovery tool. `ClusterTopology` is the validated, queryable model built
//! from it, and `ClusterGraph` is the chip-level graph the router searches.

mod description;
mod graph;
pub mod topologies;
mod topology;

pub use description::{ChipEndpoint, ClusterDescription, HarvestingInfo, MmioChip};
pub use graph::ClusterGraph;
pub use topology::{sequential_chip_ids, ClusterTopology, EthCoord};
