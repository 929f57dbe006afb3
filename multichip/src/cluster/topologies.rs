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

//! Generators for regular cluster descriptions.
//!
//! These build the same `ClusterDescription` a discovery tool would emit for
//! a regular wiring, which is convenient for tests and benchmarks. Chip 0 is
//! always the MMIO-capable chip. Channels are handed out per chip in
//! ascending order as links are added, so the same call always produces the
//! same channel numbering.

use crate::cluster::description::ClusterDescription;
use crate::ChannelId;
use crate::ChipId;
use std::collections::HashMap;

/// a map to remember the next free ethernet channel of each chip.
struct ChannelAllocator {
    map: HashMap<ChipId, ChannelId>,
}

impl ChannelAllocator {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    // return the next available channel
    fn get_next(&mut self, chip: ChipId) -> ChannelId {
        let value = self.map.entry(chip).or_insert(0);
        let chan = *value;
        *value += 1;
        chan
    }
}

fn link(
    desc: &mut ClusterDescription,
    channels: &mut ChannelAllocator,
    a: ChipId,
    b: ChipId,
    links_per_pair: usize,
) {
    for _ in 0..links_per_pair {
        let chan_a = channels.get_next(a);
        let chan_b = channels.get_next(b);
        desc.connect(a, chan_a, b, chan_b);
    }
}

/// return the linear index of the element in a multi-dimensional grid
/// The element is represented as a vector of coordinates in `dims`.
fn linearize_index(elem: &[usize], dims: &[usize]) -> usize {
    let mut index: usize = 0;
    for (d, c) in elem.iter().enumerate() {
        index += c * dims[0..d].iter().product::<usize>();
    }
    index
}

fn build_line(num_chips: usize, links_per_pair: usize, channels: &mut ChannelAllocator) -> ClusterDescription {
    let mut desc = ClusterDescription::default();
    for chip in 0..num_chips {
        desc.add_chip(chip, [chip as i32, 0, 0, 0]);
    }
    if num_chips > 0 {
        desc.add_mmio_chip(0);
    }
    for chip in 1..num_chips {
        link(&mut desc, channels, chip - 1, chip, links_per_pair);
    }
    desc
}

/// `num_chips` chips in a line: 0 - 1 - ... - (n-1).
pub fn line(num_chips: usize, links_per_pair: usize) -> ClusterDescription {
    build_line(num_chips, links_per_pair, &mut ChannelAllocator::new())
}

/// A line whose ends are joined. Needs at least 3 chips to differ from a
/// line.
pub fn ring(num_chips: usize, links_per_pair: usize) -> ClusterDescription {
    let mut channels = ChannelAllocator::new();
    let mut desc = build_line(num_chips, links_per_pair, &mut channels);
    if num_chips > 2 {
        link(&mut desc, &mut channels, num_chips - 1, 0, links_per_pair);
    }
    desc
}

/// A 2D grid of `cols` x `rows` chips; chip (x, y) has id `y * cols + x`.
///
/// <pre>
/// 0 --- 1 --- 2   ^
/// |     |     |   |
/// 3 --- 4 --- 5   rows
/// |     |     |   |
/// 6 --- 7 --- 8   v
/// < -- cols -->
/// </pre>
pub fn mesh(cols: usize, rows: usize, links_per_pair: usize) -> ClusterDescription {
    let dims = [cols, rows];
    let mut desc = ClusterDescription::default();
    let mut channels = ChannelAllocator::new();
    for y in 0..rows {
        for x in 0..cols {
            desc.add_chip(linearize_index(&[x, y], &dims), [x as i32, y as i32, 0, 0]);
        }
    }
    if cols * rows > 0 {
        desc.add_mmio_chip(0);
    }
    for y in 0..rows {
        for x in 0..cols {
            let chip = linearize_index(&[x, y], &dims);
            if x + 1 < cols {
                let east = linearize_index(&[x + 1, y], &dims);
                link(&mut desc, &mut channels, chip, east, links_per_pair);
            }
            if y + 1 < rows {
                let south = linearize_index(&[x, y + 1], &dims);
                link(&mut desc, &mut channels, chip, south, links_per_pair);
            }
        }
    }
    desc
}
