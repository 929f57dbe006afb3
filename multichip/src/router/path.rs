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
use crate::ChipId;
use petgraph::prelude::*;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

pub type EdgeWeight = usize;

/// Weight of a hop that cannot be used. Distances saturate at this value.
pub const EDGE_WEIGHT_INFINITY: EdgeWeight = EdgeWeight::MAX;

/// Lowest weight path from `producer` to `consumer` as a list of chip hops.
///
/// `edge_weight(from, to)` is evaluated lazily, at most once per graph edge,
/// and may return `EDGE_WEIGHT_INFINITY` to block a hop. Returns `None` if
/// either chip is not in the graph or the consumer is unreachable through
/// finite weight hops. `producer == consumer` yields an empty path.
pub(crate) fn shortest_path<F>(
    graph: &ClusterGraph,
    producer: ChipId,
    consumer: ChipId,
    mut edge_weight: F,
) -> Option<Vec<(ChipId, ChipId)>>
where
    F: FnMut(ChipId, ChipId) -> EdgeWeight,
{
    let source = graph.node_id_of_chip(producer)?;
    let target = graph.node_id_of_chip(consumer)?;

    let node_count = graph.chip_count();
    let mut distances = vec![EDGE_WEIGHT_INFINITY; node_count];
    // every node starts as its own predecessor
    let mut predecessors = (0..node_count).map(NodeIndex::new).collect::<Vec<_>>();
    let mut queue = BinaryHeap::new();

    distances[source.index()] = 0;
    queue.push(Reverse((0, source)));
    while let Some(Reverse((distance, node))) = queue.pop() {
        if distance > distances[node.index()] {
            continue;
        }
        let from = graph.chip_of_node(node);
        for next in graph.successors(node) {
            let to = graph.chip_of_node(next);
            let candidate = distance.saturating_add(edge_weight(from, to));
            if candidate < distances[next.index()] {
                distances[next.index()] = candidate;
                predecessors[next.index()] = node;
                queue.push(Reverse((candidate, next)));
            }
        }
    }

    let mut hops = vec![];
    let mut visited = HashSet::new();
    let mut current = target;
    while current != source {
        if !visited.insert(current) {
            return None;
        }
        let previous = predecessors[current.index()];
        hops.push((graph.chip_of_node(previous), graph.chip_of_node(current)));
        current = previous;
    }
    hops.reverse();
    Some(hops)
}
