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

use crate::cluster::ClusterGraph;
use crate::config::PlannerConfig;
use crate::resources::{ClusterResourceModel, CoreLocation, ResourceLedger, SocDescriptor};
use crate::router::path::{shortest_path, EdgeWeight, EDGE_WEIGHT_INFINITY};
use crate::router::reservation::{HopChannels, RouteReservation};
use crate::router::Route;
use crate::{ChannelId, ChipId};
use serde::{Deserialize, Serialize};

/// Extra feasibility check applied to multicast transfers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum MulticastSlotCheck {
    /// Multicast transfers are checked like unicast ones.
    Disabled,
    /// The consumer-side core of every hop must have a free multicast slot.
    ConsumerCore,
}

impl Default for MulticastSlotCheck {
    fn default() -> Self {
        Self::Disabled
    }
}

/// One chip-crossing data dependency to be routed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RouteRequest {
    pub producer: ChipId,
    pub consumer: ChipId,
    /// The data is read from a DRAM queue on the producer side.
    pub producer_is_dram: bool,
    /// The data is written to a DRAM queue on the consumer side.
    pub consumer_is_dram: bool,
    pub is_multicast: bool,
}

impl RouteRequest {
    pub fn new(producer: ChipId, consumer: ChipId) -> Self {
        Self {
            producer,
            consumer,
            ..Default::default()
        }
    }

    pub fn from_dram(self) -> Self {
        Self {
            producer_is_dram: true,
            ..self
        }
    }

    pub fn to_dram(self) -> Self {
        Self {
            consumer_is_dram: true,
            ..self
        }
    }

    pub fn multicast(self) -> Self {
        Self {
            is_multicast: true,
            ..self
        }
    }
}

/// Plans routes against a fixed resource model snapshot.
///
/// The planner only borrows the model; planning never changes ledger
/// state, so repeated queries against the same state give the same answer.
pub struct RoutePlanner<'a, S: SocDescriptor> {
    graph: &'a ClusterGraph,
    model: &'a ClusterResourceModel,
    soc: &'a S,
    config: PlannerConfig,
}

impl<'a, S: SocDescriptor> RoutePlanner<'a, S> {
    pub fn new(
        graph: &'a ClusterGraph,
        model: &'a ClusterResourceModel,
        soc: &'a S,
        config: PlannerConfig,
    ) -> Self {
        Self {
            graph,
            model,
            soc,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    fn ethernet_core(&self, chip: ChipId, chan: ChannelId) -> Option<CoreLocation> {
        let core = self.soc.ethernet_core(chan);
        if core.is_none() {
            log::warn!("chip {} chan {} has no ethernet core", chip, chan);
        }
        core.map(|core| CoreLocation::new(chip, core))
    }

    /// Unicast feasibility of one channel pair; logs the first failed check.
    fn unicast_feasible(
        request: &RouteRequest,
        producer_core: &ResourceLedger,
        consumer_core: &ResourceLedger,
    ) -> Result<(), &'static str> {
        if !producer_core.has_available_ethernet_slots(1) {
            return Err("no ethernet stream slot on producer core");
        }
        if !consumer_core.has_available_ethernet_slots(1) {
            return Err("no ethernet stream slot on consumer core");
        }
        if request.producer_is_dram && !producer_core.has_available_dram_input_slot() {
            return Err("no dram input slot on producer core");
        }
        if request.consumer_is_dram && !consumer_core.has_available_dram_output_slots(1) {
            return Err("no dram output slot on consumer core");
        }
        Ok(())
    }

    fn multicast_feasible(
        &self,
        request: &RouteRequest,
        consumer_core: &ResourceLedger,
    ) -> Result<(), &'static str> {
        match self.config.multicast_check {
            MulticastSlotCheck::ConsumerCore
                if request.is_multicast && !consumer_core.has_available_multicast_slots(1) =>
            {
                Err("no multicast slot on consumer core")
            }
            _ => Ok(()),
        }
    }

    /// Cost of carrying `request` over one channel pair, or `None` if the pair
    /// is not usable.
    fn channel_pair_cost(
        &self,
        request: &RouteRequest,
        from: ChipId,
        from_chan: ChannelId,
        to: ChipId,
        to_chan: ChannelId,
    ) -> Option<HopChannels> {
        let from_core = self.ethernet_core(from, from_chan)?;
        let to_core = self.ethernet_core(to, to_chan)?;
        let producer_core = self.model.core(&from_core);
        let consumer_core = self.model.core(&to_core);

        let feasible = Self::unicast_feasible(request, producer_core, consumer_core)
            .and_then(|_| self.multicast_feasible(request, consumer_core));
        if let Err(reason) = feasible {
            log::trace!(
                "chip {} chan {} -> chip {} chan {} rejected: {}",
                from,
                from_chan,
                to,
                to_chan,
                reason
            );
            return None;
        }

        let cost = std::cmp::max(
            producer_core.used_ethernet_stream_count(),
            consumer_core.used_ethernet_stream_count(),
        ) + producer_core.max_ethernet_streams();
        log::trace!(
            "chip {} chan {} -> chip {} chan {} costs {}",
            from,
            from_chan,
            to,
            to_chan,
            cost
        );
        Some(HopChannels {
            from_chan,
            to_chan,
            from_core,
            to_core,
            cost,
        })
    }

    /// The cheapest feasible channel pair between two adjacent chips; the
    /// first one in channel order wins ties.
    fn best_channel_pair(
        &self,
        request: &RouteRequest,
        from: ChipId,
        to: ChipId,
    ) -> Option<HopChannels> {
        let mut best: Option<HopChannels> = None;
        for (from_chan, to_chan) in self
            .graph
            .topology()
            .directly_connected_channels(from, to)
        {
            if let Some(candidate) = self.channel_pair_cost(request, from, from_chan, to, to_chan) {
                if best.as_ref().map_or(true, |b| candidate.cost < b.cost) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Weight of the hop `from -> to` for `request`.
    pub fn edge_weight(&self, request: &RouteRequest, from: ChipId, to: ChipId) -> EdgeWeight {
        let weight = self
            .best_channel_pair(request, from, to)
            .map_or(EDGE_WEIGHT_INFINITY, |hop| hop.cost);
        if weight == EDGE_WEIGHT_INFINITY {
            log::trace!("chip {} -> chip {}: no feasible channel pair", from, to);
        }
        weight
    }

    fn plan(&self, request: &RouteRequest) -> Option<Route> {
        if request.producer == request.consumer {
            log::warn!(
                "Route requested from chip {} to itself; no ethernet hops needed",
                request.producer
            );
            return None;
        }
        let hops = shortest_path(self.graph, request.producer, request.consumer, |from, to| {
            self.edge_weight(request, from, to)
        });
        match hops {
            Some(hops) if !hops.is_empty() => Some(Route::new(hops)),
            _ => {
                log::error!(
                    "Failed to find viable route from chip {} to {}. Out of ethernet resources \
                     somewhere between the two or no such connectivity exists",
                    request.producer,
                    request.consumer
                );
                None
            }
        }
    }

    /// Lowest cost route whose every hop has a feasible channel pair.
    /// Returns an empty route on failure.
    pub fn route(&self, request: &RouteRequest) -> Route {
        self.plan(request).unwrap_or_default()
    }

    /// Like `route`, but also picks the channel pair of every hop. Nothing is
    /// consumed until the reservation is committed.
    pub fn reserve(&self, request: &RouteRequest) -> Option<RouteReservation> {
        let route = self.plan(request)?;
        let hops = route
            .hops()
            .iter()
            .map(|(from, to)| self.best_channel_pair(request, *from, *to))
            .collect::<Option<Vec<_>>>()?;
        let multicast_slot =
            request.is_multicast && self.config.multicast_check != MulticastSlotCheck::Disabled;
        Some(RouteReservation::new(*request, route, hops, multicast_slot))
    }

    /// Number of hops on the shortest path between two chips, ignoring all
    /// resource usage.
    pub fn hop_count(&self, from: ChipId, to: ChipId) -> Option<usize> {
        let hops = shortest_path(self.graph, from, to, |_, _| 1);
        if hops.is_none() {
            log::error!("No ethernet path between chip {} and chip {}", from, to);
        }
        hops.map(|hops| hops.len())
    }
}
