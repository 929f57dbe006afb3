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

//! Capacity-aware chip-to-chip routing.
//!
//! `RoutePlanner` weights every chip-to-chip hop by the load of the least
//! loaded feasible ethernet channel pair between the two chips and runs a
//! shortest path search over the `ClusterGraph`. Planning is read-only with
//! respect to the `ClusterResourceModel`; see `RouteReservation`.

use crate::ChipId;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

mod path;
mod planner;
mod reservation;

pub use crate::router::path::{EdgeWeight, EDGE_WEIGHT_INFINITY};
pub use crate::router::planner::{MulticastSlotCheck, RoutePlanner, RouteRequest};
pub use crate::router::reservation::{HopChannels, RouteReservation};

/// Ordered chip hops from a producer to a consumer.
///
/// A route is empty only when routing failed; otherwise consecutive hops
/// share a chip and no chip is visited twice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Route {
    hops: Vec<(ChipId, ChipId)>,
}

impl Route {
    pub(crate) fn new(hops: Vec<(ChipId, ChipId)>) -> Self {
        Self { hops }
    }

    pub fn hops(&self) -> &[(ChipId, ChipId)] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn producer(&self) -> Option<ChipId> {
        self.hops.first().map(|(from, _)| *from)
    }

    pub fn consumer(&self) -> Option<ChipId> {
        self.hops.last().map(|(_, to)| *to)
    }

    /// Every chip on the route, producer first.
    pub fn chips(&self) -> Vec<ChipId> {
        self.producer()
            .into_iter()
            .chain(self.hops.iter().map(|(_, to)| *to))
            .collect()
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        if self.is_empty() {
            return write!(f, "<no route>");
        }
        write!(f, "{}", self.chips().iter().join(" -> "))
    }
}

impl From<Route> for Vec<(ChipId, ChipId)> {
    fn from(route: Route) -> Self {
        route.hops
    }
}
