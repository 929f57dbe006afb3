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

use crate::cluster::topology::ClusterTopology;
use crate::ChipId;
use itertools::Itertools;
use petgraph::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};

/// Chip-level view of a cluster: one node per active chip and one directed
/// edge A -> B for every ordered pair of chips joined by at least one
/// ethernet link.
///
/// The graph keeps its own copy of the topology it was built from. Changing
/// the active chip set of the original topology afterwards does not affect
/// an existing graph; build a new one instead.
#[derive(Clone, Debug)]
pub struct ClusterGraph {
    topology: ClusterTopology,
    graph: DiGraph<ChipId, ()>,
    node_id_of_chip: HashMap<ChipId, NodeIndex>,
}

impl ClusterGraph {
    pub fn new(topology: &ClusterTopology) -> Self {
        let mut graph = DiGraph::new();
        // chips() is ordered, so node indices are dense and stable for a
        // given active set.
        let node_id_of_chip = topology
            .chips()
            .iter()
            .map(|chip| (*chip, graph.add_node(*chip)))
            .collect::<HashMap<_, _>>();

        for chip in topology.chips().iter() {
            let neighbors = topology
                .active_channels(*chip)
                .into_iter()
                .filter_map(|chan| topology.remote_endpoint(*chip, chan))
                .map(|(remote_chip, _)| remote_chip)
                .filter(|remote_chip| remote_chip != chip)
                .unique()
                .sorted()
                .collect::<Vec<_>>();
            for neighbor in neighbors {
                graph.add_edge(node_id_of_chip[chip], node_id_of_chip[&neighbor], ());
            }
        }

        Self {
            topology: topology.clone(),
            graph,
            node_id_of_chip,
        }
    }

    /// The topology snapshot this graph was built from.
    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    /// Chips with a direct ethernet link to `chip`.
    pub fn neighbors(&self, chip: ChipId) -> BTreeSet<ChipId> {
        match self.node_id_of_chip(chip) {
            Some(node_id) => self
                .graph
                .neighbors(node_id)
                .map(|n| self.chip_of_node(n))
                .collect(),
            None => BTreeSet::new(),
        }
    }

    pub fn contains_chip(&self, chip: ChipId) -> bool {
        self.node_id_of_chip.contains_key(&chip)
    }

    pub fn chip_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub(crate) fn node_id_of_chip(&self, chip: ChipId) -> Option<NodeIndex> {
        self.node_id_of_chip.get(&chip).copied()
    }

    pub(crate) fn chip_of_node(&self, node_id: NodeIndex) -> ChipId {
        self.graph[node_id]
    }

    pub(crate) fn successors(&self, node_id: NodeIndex) -> petgraph::graph::Neighbors<()> {
        self.graph.neighbors(node_id)
    }

    pub fn to_graphviz(&self) -> String {
        use petgraph::dot::{Config, Dot};

        format!(
            "{:?}",
            Dot::with_attr_getters(
                &self.graph,
                &[Config::NodeNoLabel, Config::EdgeNoLabel],
                &|_, edge| {
                    let src = self.chip_of_node(edge.source());
                    let dst = self.chip_of_node(edge.target());
                    format!(
                        "label=\"{} links\"",
                        self.topology.directly_connected_channels(src, dst).len()
                    )
                },
                &|_, node| format!("label=\"chip {}\"", node.1),
            )
        )
    }
}

impl Display for ClusterGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.to_graphviz())
    }
}
