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

//! Chip-to-chip route planning for multi-chip accelerator clusters.
//!
//! A cluster is a set of chips connected by point-to-point ethernet links.
//! Moving data from a producer chip to a consumer chip that is not directly
//! connected requires relaying it over intermediate chips, and every hop
//! consumes streams on the ethernet cores at both ends of the link it uses.
//! This crate models:
//!   - the cluster topology (`ClusterTopology`) and its chip graph
//!   (`ClusterGraph`);
//!   - per-core hardware resource ledgers (`ResourceLedger`) owned by a
//!   `ClusterResourceModel`;
//!   - a capacity-aware shortest path planner (`RoutePlanner`) and its
//!   resource-agnostic hop count variant.
//!
//! The planner never consumes capacity itself. A successful plan is returned
//! as a `RouteReservation` that must be committed against the resource model
//! by the caller.

mod cluster;
mod config;
mod error;
mod resources;
mod router;

/// Identifier of a chip in the cluster.
pub type ChipId = usize;

/// Identifier of an ethernet endpoint, unique per chip.
pub type ChannelId = usize;

pub use crate::cluster::topologies;
pub use crate::cluster::{
    sequential_chip_ids, ChipEndpoint, ClusterDescription, ClusterGraph, ClusterTopology,
    EthCoord, HarvestingInfo, MmioChip,
};
pub use crate::config::{BuildConfig, PlannerConfig};
pub use crate::error::Error;
pub use crate::resources::{
    ClusterResourceModel, CoreCoord, CoreLocation, CoreResourceLimits, ExceededResource,
    LedgerUsage, ModelCheckpoint, ResourceKind, ResourceLedger, ResourceUsageSnapshot,
    SocDescriptor, SocLayout,
};
pub use crate::router::{
    EdgeWeight, HopChannels, MulticastSlotCheck, Route, RoutePlanner, RouteRequest,
    RouteReservation, EDGE_WEIGHT_INFINITY,
};
