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

//! per-core hardware resource accounting.
//!
//! Every core that takes part in a build has a `ResourceLedger` that tracks
//! used against maximum capacity for each `ResourceKind`. Ledgers are owned
//! by a `ClusterResourceModel`. Mutations never reject or clamp: a planner
//! may provisionally over-allocate, and must query the ledgers (or roll back
//! to a checkpoint) before committing.

mod ledger;
mod model;
mod soc;

pub use ledger::{
    CoreResourceLimits, ExceededResource, LedgerUsage, ResourceKind, ResourceLedger,
    ResourceUsageSnapshot,
};
pub use model::{ClusterResourceModel, CoreLocation, ModelCheckpoint};
pub use soc::{CoreCoord, SocDescriptor, SocLayout};
