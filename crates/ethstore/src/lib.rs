// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Daily staking reward rate of beacon chain validators.
//!
//! For one day of the chain, the engine determines which validators were active for the whole
//! day, scans every block of the day for execution fees earned by proposers and for deposits
//! topping up validators, and turns the resulting balance changes into an APR for the whole
//! cohort and for each caller-named validator set.

use std::{collections::HashMap, sync::Arc};

pub mod aggregate;
pub mod beacon;
pub mod chain;
pub mod cohort;
pub mod config;
pub mod day;
pub mod error;
pub mod scanner;
pub mod tx;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{aggregate, validator_sets_from_lists, DayRewards, RewardTotals, ValidatorSets};
pub use beacon::{BeaconApi, BeaconClient, BeaconError};
pub use chain::{resolve_day, ChainDay, ChainParams, DaySelector};
pub use cohort::{build_cohort, is_eligible, Cohort, Validator};
pub use config::EthStoreConfig;
pub use day::{assemble, DayResult};
pub use error::{EthStoreError, Result};
pub use scanner::scan_blocks;

/// Compute the result for `day` against the beacon node at `address`.
///
/// `day` is a day number or `"finalized"`/`"latest"`. `validator_sets` maps set names to the
/// validator indices they contain.
pub async fn calculate(
    address: &str,
    day: &str,
    validator_sets: &HashMap<String, Vec<u64>>,
    config: &EthStoreConfig,
) -> Result<DayResult> {
    let client = BeaconClient::from_config(address, config)?;
    tracing::debug!("Using beacon node at {}", client.base_url());
    calculate_with_client(Arc::new(client), day, validator_sets, config).await
}

/// Like [calculate], with any [BeaconApi] implementation.
pub async fn calculate_with_client<C>(
    client: Arc<C>,
    day: &str,
    validator_sets: &HashMap<String, Vec<u64>>,
    config: &EthStoreConfig,
) -> Result<DayResult>
where
    C: BeaconApi + 'static,
{
    let selector: DaySelector = day.parse()?;
    let validator_sets = validator_sets_from_lists(validator_sets);

    let chain_day = resolve_day(client.as_ref(), selector).await?;
    if config.debug() {
        tracing::debug!(
            "Calculating day {} ({}, first epoch: {}, first slot: {}, first slot of next day: {})",
            chain_day.day,
            chain_day.day_time,
            chain_day.first_epoch,
            chain_day.first_slot,
            chain_day.first_slot_of_next_day
        );
    }

    let cohort = build_cohort(client.as_ref(), &chain_day).await?;
    let cohort = scan_blocks(client, &chain_day, cohort, config).await?;
    let rewards = aggregate(&cohort, &validator_sets)?;
    let result = assemble(&chain_day, rewards);

    if config.debug() {
        tracing::debug!("Day {}: {:?}", result.day, result);
        for (name, set) in &result.validator_sets {
            tracing::debug!("Day {} set {}: {:?}", result.day, name, set);
        }
    }

    Ok(result)
}

/// Blocking form of [calculate] for callers without an async runtime.
///
/// Must not be called from within a tokio runtime.
pub fn calculate_blocking(
    address: &str,
    day: &str,
    validator_sets: &HashMap<String, Vec<u64>>,
    config: &EthStoreConfig,
) -> Result<DayResult> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(calculate(address, day, validator_sets, config))
}
