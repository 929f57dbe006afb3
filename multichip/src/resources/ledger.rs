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

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Size of one tile header in bytes.
const TILE_HEADER_SIZE_BYTES: usize = 16;
/// Number of tile headers buffered per phase for each additional tile size.
const MAX_TILES_MSG_INFO_BUF_PER_PHASE: usize = 2048;

/// Independently limited resources of a core.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum ResourceKind {
    ExtraStreams,
    L1Memory,
    InputFromDram,
    OutputToDram,
    EthernetStreams,
    MulticastStreams,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::ExtraStreams,
        ResourceKind::L1Memory,
        ResourceKind::InputFromDram,
        ResourceKind::OutputToDram,
        ResourceKind::EthernetStreams,
        ResourceKind::MulticastStreams,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ExtraStreams => "extra streams",
            Self::L1Memory => "l1 memory",
            Self::InputFromDram => "input from dram slots",
            Self::OutputToDram => "output to dram slots",
            Self::EthernetStreams => "ethernet streams",
            Self::MulticastStreams => "multicast streams",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.name())
    }
}

/// Per-core capacity limits.
///
/// constructed programmatically or read from a config file. The same limits
/// apply to every core of a build; cores without ethernet links get an
/// ethernet stream limit of zero when their ledger is created.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreResourceLimits {
    pub l1_memory_size: usize, // in bytes
    /// Streams that can transmit over ethernet on an ethernet core.
    pub max_ethernet_streams: usize,
    /// Ethernet streams beyond this count are carved out of the multicast
    /// streams of the core.
    pub max_non_multicast_ethernet_streams: usize,
    pub max_multicast_streams: usize,
    pub max_input_from_dram_streams: usize,
    pub max_output_to_dram_streams: usize,
    pub max_extra_streams: usize,
    /// L1 cost of supporting each tile size beyond the first on a core.
    pub extra_tile_header_buffer_size: usize,
}

impl Default for CoreResourceLimits {
    fn default() -> Self {
        Self {
            l1_memory_size: 1_499_136,
            max_ethernet_streams: 8,
            max_non_multicast_ethernet_streams: 4,
            max_multicast_streams: 4,
            max_input_from_dram_streams: 8,
            max_output_to_dram_streams: 4,
            max_extra_streams: 6,
            extra_tile_header_buffer_size: MAX_TILES_MSG_INFO_BUF_PER_PHASE
                * TILE_HEADER_SIZE_BYTES,
        }
    }
}

/// One resource whose usage is over its limit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceededResource {
    pub kind: ResourceKind,
    pub used: usize,
    pub limit: usize,
}

impl ExceededResource {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

impl Display for ExceededResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}: used {} of {}", self.kind, self.used, self.limit)
    }
}

/// Whether the sum of `amounts` is at most `limit`; a sum that overflows
/// never fits.
fn fits(amounts: &[usize], limit: usize) -> bool {
    amounts
        .iter()
        .try_fold(0usize, |total, amount| total.checked_add(*amount))
        .map_or(false, |total| total <= limit)
}

/// The mutable part of a ledger. Saved and restored to undo provisional
/// allocations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerUsage {
    l1_bytes: usize,
    input_from_dram_slots: usize,
    output_to_dram_slots: usize,
    // multicast streams that are not ethernet streams
    multicast_streams: usize,
    ethernet_streams: usize,
    extra_streams: usize,
    tile_sizes: BTreeSet<usize>,
}

/// Used vs. maximum capacity of one core.
#[derive(Clone, Debug)]
pub struct ResourceLedger {
    limits: CoreResourceLimits,
    used: LedgerUsage,
}

impl ResourceLedger {
    pub fn new(limits: &CoreResourceLimits, supports_ethernet: bool) -> Self {
        let mut limits = *limits;
        if !supports_ethernet {
            limits.max_ethernet_streams = 0;
        }
        Self {
            limits,
            used: LedgerUsage::default(),
        }
    }

    pub fn limits(&self) -> &CoreResourceLimits {
        &self.limits
    }

    /// Free L1 bytes; zero when the core is over-allocated.
    pub fn available_l1_bytes(&self) -> usize {
        self.limits.l1_memory_size.saturating_sub(self.used.l1_bytes)
    }

    pub fn used_l1_bytes(&self) -> usize {
        self.used.l1_bytes
    }

    pub fn can_allocate_bytes(&self, num_bytes: usize) -> bool {
        fits(&[self.used.l1_bytes, num_bytes], self.limits.l1_memory_size)
    }

    pub fn has_available_ethernet_slots(&self, num_streams: usize) -> bool {
        fits(
            &[
                self.used.ethernet_streams,
                self.used.multicast_streams,
                num_streams,
            ],
            self.limits.max_ethernet_streams,
        )
    }

    pub fn has_available_multicast_slots(&self, num_streams: usize) -> bool {
        fits(
            &[self.used_multicast_stream_count(), num_streams],
            self.limits.max_multicast_streams,
        ) && self.has_extra_stream_slots(num_streams)
    }

    pub fn has_available_dram_input_slot(&self) -> bool {
        self.used.input_from_dram_slots < self.limits.max_input_from_dram_streams
    }

    pub fn available_dram_input_slots(&self) -> usize {
        self.limits
            .max_input_from_dram_streams
            .saturating_sub(self.used.input_from_dram_slots)
    }

    pub fn has_available_dram_output_slots(&self, num_outputs: usize) -> bool {
        fits(
            &[self.used.output_to_dram_slots, num_outputs],
            self.limits.max_output_to_dram_streams,
        )
    }

    pub fn has_extra_stream_slots(&self, num_streams: usize) -> bool {
        fits(&[self.used.extra_streams, num_streams], self.limits.max_extra_streams)
    }

    pub fn used_ethernet_stream_count(&self) -> usize {
        self.used.ethernet_streams
    }

    pub fn max_ethernet_streams(&self) -> usize {
        self.limits.max_ethernet_streams
    }

    /// Multicast streams in use, including those taken by ethernet streams
    /// past the non-multicast threshold.
    pub fn used_multicast_stream_count(&self) -> usize {
        self.used
            .multicast_streams
            .saturating_add(self.multicast_streams_used_by_ethernet())
    }

    fn multicast_streams_used_by_ethernet(&self) -> usize {
        self.used
            .ethernet_streams
            .saturating_sub(self.limits.max_non_multicast_ethernet_streams)
    }

    pub fn used_extra_streams(&self) -> usize {
        self.used.extra_streams
    }

    pub fn used_dram_input_slots(&self) -> usize {
        self.used.input_from_dram_slots
    }

    pub fn used_dram_output_slots(&self) -> usize {
        self.used.output_to_dram_slots
    }

    pub fn tile_size_is_used(&self, tile_size_in_bytes: usize) -> bool {
        self.used.tile_sizes.contains(&tile_size_in_bytes)
    }

    /// L1 bytes needed to support `tile_size_in_bytes` on top of the tile
    /// sizes already in use. The first tile size on a core is free.
    pub fn extra_header_bytes_for_tile_size(&self, tile_size_in_bytes: usize) -> usize {
        if self.used.tile_sizes.is_empty() || self.tile_size_is_used(tile_size_in_bytes) {
            0
        } else {
            self.limits.extra_tile_header_buffer_size
        }
    }

    /// The current `used` value of `kind`, as reported in snapshots.
    pub fn used(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::ExtraStreams => self.used.extra_streams,
            ResourceKind::L1Memory => self.used.l1_bytes,
            ResourceKind::InputFromDram => self.used.input_from_dram_slots,
            ResourceKind::OutputToDram => self.used.output_to_dram_slots,
            ResourceKind::EthernetStreams => self.used.ethernet_streams,
            ResourceKind::MulticastStreams => self.used_multicast_stream_count(),
        }
    }

    pub fn limit(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::ExtraStreams => self.limits.max_extra_streams,
            ResourceKind::L1Memory => self.limits.l1_memory_size,
            ResourceKind::InputFromDram => self.limits.max_input_from_dram_streams,
            ResourceKind::OutputToDram => self.limits.max_output_to_dram_streams,
            ResourceKind::EthernetStreams => self.limits.max_ethernet_streams,
            ResourceKind::MulticastStreams => self.limits.max_multicast_streams,
        }
    }

    /// Every resource not in `ignored` whose usage is over its limit.
    ///
    /// The multicast check counts only multicast streams that are not
    /// ethernet streams; ethernet overflow is reported under ethernet
    /// streams.
    pub fn exceeded_resources(&self, ignored: &[ResourceKind]) -> Vec<ExceededResource> {
        ResourceKind::ALL
            .iter()
            .filter(|kind| !ignored.contains(kind))
            .filter_map(|kind| {
                let used = match kind {
                    ResourceKind::MulticastStreams => self.used.multicast_streams,
                    _ => self.used(*kind),
                };
                let limit = self.limit(*kind);
                if used > limit {
                    Some(ExceededResource {
                        kind: *kind,
                        used,
                        limit,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn any_limit_exceeded(&self, ignored: &[ResourceKind]) -> bool {
        !self.exceeded_resources(ignored).is_empty()
    }

    pub fn allocate_bytes(&mut self, num_bytes: usize) {
        self.used.l1_bytes += num_bytes;
    }

    /// Allocate a buffer of `num_bytes` holding tiles of
    /// `tile_size_in_bytes`, including any tile header surcharge.
    pub fn allocate_buffer(&mut self, num_bytes: usize, tile_size_in_bytes: usize) {
        let extra_bytes = self.extra_header_bytes_for_tile_size(tile_size_in_bytes);
        self.allocate_bytes(num_bytes + extra_bytes);
        self.register_tile_size(tile_size_in_bytes);
    }

    pub fn register_tile_size(&mut self, tile_size_in_bytes: usize) {
        self.used.tile_sizes.insert(tile_size_in_bytes);
    }

    pub fn add_ethernet_streams(&mut self, num_streams: usize) {
        self.used.ethernet_streams += num_streams;
    }

    pub fn add_multicast_streams(&mut self, num_streams: usize) {
        self.used.multicast_streams += num_streams;
    }

    pub fn add_dram_input(&mut self) {
        self.used.input_from_dram_slots += 1;
    }

    pub fn add_dram_output_slots(&mut self, num_outputs: usize) {
        self.used.output_to_dram_slots += num_outputs;
    }

    pub fn add_extra_streams(&mut self, num_streams: usize) {
        self.used.extra_streams += num_streams;
    }

    pub fn release_extra_streams(&mut self, num_streams: usize) {
        self.used.extra_streams = self.used.extra_streams.saturating_sub(num_streams);
    }

    pub fn usage(&self) -> LedgerUsage {
        self.used.clone()
    }

    pub fn restore_usage(&mut self, usage: LedgerUsage) {
        self.used = usage;
    }
}

/// The `used` values of a set of resources of one core at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceUsageSnapshot {
    pub resources_used: BTreeMap<ResourceKind, usize>,
}

impl ResourceUsageSnapshot {
    /// Record `kinds`, or every resource kind if `kinds` is empty.
    pub fn capture(ledger: &ResourceLedger, kinds: &[ResourceKind]) -> Self {
        let kinds = if kinds.is_empty() {
            &ResourceKind::ALL[..]
        } else {
            kinds
        };
        Self {
            resources_used: kinds.iter().map(|kind| (*kind, ledger.used(*kind))).collect(),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<usize> {
        self.resources_used.get(&kind).copied()
    }
}
