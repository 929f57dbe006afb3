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

//! Routes random producer/consumer pairs over a mesh cluster, committing
//! every route, until the cluster runs out of ethernet capacity.
use anyhow::Context;
use multichip::topologies;
use multichip::BuildConfig;
use multichip::ClusterGraph;
use multichip::ClusterResourceModel;
use multichip::ClusterTopology;
use multichip::MulticastSlotCheck;
use multichip::PlannerConfig;
use multichip::ResourceKind;
use multichip::RoutePlanner;
use multichip::RouteRequest;
use multichip::SocLayout;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::BTreeMap;

const SEED: u64 = 0x6d75_6c74_6963_6869;
const NUM_REQUESTS: usize = 2000;

fn setup() -> anyhow::Result<(ClusterTopology, SocLayout, PlannerConfig, ClusterResourceModel)> {
    // a build config on the command line replaces the generated mesh
    match std::env::args().nth(1) {
        Some(config_file) => {
            let config = BuildConfig::from_file(&config_file)
                .with_context(|| format!("reading build config {}", config_file))?;
            let topology = ClusterTopology::from_config(&config)?;
            let soc = config.soc_layout()?;
            let model = config.resource_model(&topology, &soc)?;
            Ok((topology, soc, config.planner, model))
        }
        None => {
            let topology = ClusterTopology::from_description(&topologies::mesh(4, 4, 2))?;
            let soc = SocLayout::wormhole();
            let config = PlannerConfig {
                multicast_check: MulticastSlotCheck::ConsumerCore,
            };
            let model = ClusterResourceModel::for_cluster(
                &topology,
                &soc,
                &multichip::CoreResourceLimits::default(),
            )?;
            Ok((topology, soc, config, model))
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let (topology, soc, config, mut model) = setup()?;
    let graph = ClusterGraph::new(&topology);
    let chips = topology.chips().iter().copied().collect::<Vec<_>>();
    anyhow::ensure!(chips.len() > 1, "need at least two active chips");
    log::info!(
        "Cluster with {} chips and {} chip-to-chip links",
        graph.chip_count(),
        graph.link_count()
    );

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(SEED);
    let mut committed = 0;
    let mut failed = 0;
    let mut hops_by_length = BTreeMap::new();
    for _ in 0..NUM_REQUESTS {
        let producer = chips[rng.gen_range(0..chips.len())];
        let consumer = chips[rng.gen_range(0..chips.len())];
        if producer == consumer {
            continue;
        }
        let mut request = RouteRequest::new(producer, consumer);
        request.producer_is_dram = rng.gen_bool(0.25);
        request.consumer_is_dram = rng.gen_bool(0.25);
        request.is_multicast = rng.gen_bool(0.1);

        let planner = RoutePlanner::new(&graph, &model, &soc, config);
        let shortest = planner.hop_count(producer, consumer);
        match planner.reserve(&request) {
            Some(reservation) => {
                let route = reservation.commit(&mut model);
                let detour = shortest.map_or(0, |hops| route.len() - hops);
                *hops_by_length.entry((route.len(), detour)).or_insert(0) += 1;
                committed += 1;
            }
            None => failed += 1,
        }
    }

    log::info!("Committed {} routes, {} failed", committed, failed);
    for ((length, detour), count) in hops_by_length.iter() {
        log::info!("  {} routes of {} hops ({} above shortest)", count, length, detour);
    }
    for (location, exceeded) in model.exceeded_resources(&[]) {
        log::warn!("Core {} exceeded {}", location, exceeded);
    }
    let busiest = model
        .cores()
        .max_by_key(|(_, ledger)| ledger.used(ResourceKind::EthernetStreams));
    if let Some((location, ledger)) = busiest {
        log::info!(
            "Busiest ethernet core {} with {} of {} streams",
            location,
            ledger.used_ethernet_stream_count(),
            ledger.max_ethernet_streams()
        );
    }
    anyhow::ensure!(
        !model.any_limit_exceeded(&[]),
        "committed routes exceeded core limits"
    );
    Ok(())
}
