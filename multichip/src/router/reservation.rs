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

use crate::resources::{ClusterResourceModel, CoreLocation};
use crate::router::planner::RouteRequest;
use crate::router::path::EdgeWeight;
use crate::router::Route;
use crate::ChannelId;

/// The channel pair chosen for one hop of a route.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HopChannels {
    pub from_chan: ChannelId,
    pub to_chan: ChannelId,
    /// Ethernet core hosting `from_chan`, on the producer side of the hop.
    pub from_core: CoreLocation,
    /// Ethernet core hosting `to_chan`, on the consumer side of the hop.
    pub to_core: CoreLocation,
    pub cost: EdgeWeight,
}

/// A planned route that has not consumed any capacity yet.
///
/// Dropping a reservation releases nothing because nothing was taken;
/// capacity is only consumed by `commit`.
#[must_use = "a reservation consumes no capacity until it is committed"]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteReservation {
    request: RouteRequest,
    route: Route,
    hops: Vec<HopChannels>,
    multicast_slot: bool,
}

impl RouteReservation {
    pub(crate) fn new(
        request: RouteRequest,
        route: Route,
        hops: Vec<HopChannels>,
        multicast_slot: bool,
    ) -> Self {
        assert_eq!(route.len(), hops.len());
        Self {
            request,
            route,
            hops,
            multicast_slot,
        }
    }

    pub fn request(&self) -> &RouteRequest {
        &self.request
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn hops(&self) -> &[HopChannels] {
        &self.hops
    }

    /// Consume the capacity of this route in `model` and return the route.
    ///
    /// Every hop takes an ethernet stream on both of its cores. A DRAM source
    /// takes an input slot on the first producer-side core, a DRAM destination
    /// an output slot on the last consumer-side core. Multicast transfers take
    /// a multicast stream on the last consumer-side core if the planner
    /// checked for one.
    pub fn commit(self, model: &mut ClusterResourceModel) -> Route {
        for hop in self.hops.iter() {
            model.core_mut(&hop.from_core).add_ethernet_streams(1);
            model.core_mut(&hop.to_core).add_ethernet_streams(1);
        }
        if let (Some(first), Some(last)) = (self.hops.first(), self.hops.last()) {
            if self.request.producer_is_dram {
                model.core_mut(&first.from_core).add_dram_input();
            }
            if self.request.consumer_is_dram {
                model.core_mut(&last.to_core).add_dram_output_slots(1);
            }
            if self.multicast_slot {
                model.core_mut(&last.to_core).add_multicast_streams(1);
            }
        }
        log::debug!(
            "Committed route {} over {} ethernet links",
            self.route,
            self.hops.len()
        );
        self.route
    }
}

#[cfg(test)]
mod tests {
    use crate::cluster::{topologies, ClusterGraph, ClusterTopology};
    use crate::config::PlannerConfig;
    use crate::resources::{
        ClusterResourceModel, CoreLocation, CoreResourceLimits, ResourceKind, SocDescriptor,
        SocLayout,
    };
    use crate::router::{MulticastSlotCheck, RoutePlanner, RouteRequest};

    fn line_model(limits: &CoreResourceLimits) -> (ClusterGraph, ClusterResourceModel, SocLayout) {
        let topology = ClusterTopology::from_description(&topologies::line(3, 1)).unwrap();
        let soc = SocLayout::wormhole();
        let model = ClusterResourceModel::for_cluster(&topology, &soc, limits).unwrap();
        (ClusterGraph::new(&topology), model, soc)
    }

    #[test]
    fn test_commit_consumes_hop_capacity() {
        let _logger = env_logger::builder().try_init();
        let (graph, mut model, soc) = line_model(&CoreResourceLimits::default());
        let request = RouteRequest::new(0, 2).from_dram().to_dram();
        let reservation = RoutePlanner::new(&graph, &model, &soc, PlannerConfig::default())
            .reserve(&request)
            .unwrap();
        assert_eq!(reservation.request(), &request);
        assert_eq!(reservation.route().hops(), &[(0, 1), (1, 2)]);
        // nothing is taken before the commit
        assert!(model
            .cores()
            .all(|(_, ledger)| ledger.used_ethernet_stream_count() == 0));

        let route = reservation.commit(&mut model);
        assert_eq!(route.hops(), &[(0, 1), (1, 2)]);

        // line(3, 1): 0:0 <-> 1:0 and 1:1 <-> 2:0
        let core = |chip, chan| CoreLocation::new(chip, soc.ethernet_core(chan).unwrap());
        for location in [core(0, 0), core(1, 0), core(1, 1), core(2, 0)].iter() {
            assert_eq!(model.core(location).used_ethernet_stream_count(), 1);
        }
        assert_eq!(model.core(&core(0, 0)).used_dram_input_slots(), 1);
        assert_eq!(model.core(&core(1, 0)).used_dram_input_slots(), 0);
        assert_eq!(model.core(&core(2, 0)).used_dram_output_slots(), 1);
        assert_eq!(model.core(&core(1, 1)).used_dram_output_slots(), 0);
        assert!(!model.any_limit_exceeded(&[]));
    }

    #[test]
    fn test_committed_routes_exhaust_links() {
        let _logger = env_logger::builder().try_init();
        let limits = CoreResourceLimits {
            max_ethernet_streams: 3,
            max_non_multicast_ethernet_streams: 3,
            ..Default::default()
        };
        let (graph, mut model, soc) = line_model(&limits);
        let request = RouteRequest::new(0, 2);
        let mut committed = 0;
        loop {
            let reservation =
                RoutePlanner::new(&graph, &model, &soc, PlannerConfig::default()).reserve(&request);
            match reservation {
                Some(reservation) => {
                    reservation.commit(&mut model);
                    committed += 1;
                }
                None => break,
            }
        }
        assert_eq!(committed, 3);
        assert!(!model.any_limit_exceeded(&[]));
    }

    #[test]
    fn test_multicast_commit() {
        let (graph, mut model, soc) = line_model(&CoreResourceLimits::default());
        let request = RouteRequest::new(2, 0).multicast();
        let last_core = CoreLocation::new(0, soc.ethernet_core(0).unwrap());

        let reservation = RoutePlanner::new(&graph, &model, &soc, PlannerConfig::default())
            .reserve(&request)
            .unwrap();
        reservation.commit(&mut model);
        assert_eq!(model.core(&last_core).used(ResourceKind::MulticastStreams), 0);

        let config = PlannerConfig {
            multicast_check: MulticastSlotCheck::ConsumerCore,
        };
        let reservation = RoutePlanner::new(&graph, &model, &soc, config)
            .reserve(&request)
            .unwrap();
        assert_eq!(reservation.hops().last().unwrap().to_core, last_core);
        reservation.commit(&mut model);
        assert_eq!(model.core(&last_core).used(ResourceKind::MulticastStreams), 1);
        assert_eq!(model.core(&last_core).used_ethernet_stream_count(), 2);
    }

    #[test]
    fn test_dropped_reservation_is_free() {
        let (graph, model, soc) = line_model(&CoreResourceLimits::default());
        let checkpoint = model.checkpoint();
        {
            let planner = RoutePlanner::new(&graph, &model, &soc, PlannerConfig::default());
            let _ = planner.reserve(&RouteRequest::new(0, 2));
        }
        let mut restored = model.clone();
        restored.rollback(checkpoint);
        assert_eq!(
            model.cores().map(|(_, l)| l.usage()).collect::<Vec<_>>(),
            restored.cores().map(|(_, l)| l.usage()).collect::<Vec<_>>()
        );
    }
}
