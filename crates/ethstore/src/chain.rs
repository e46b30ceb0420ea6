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

//! Slot and epoch arithmetic, and resolution of the day to compute.

use std::{fmt, ops::RangeInclusive, str::FromStr};

use chrono::{DateTime, Utc};

use crate::{
    beacon::{wire::quoted_u64, BeaconApi, ChainConfig},
    error::{EthStoreError, Result},
    types::{Epoch, Slot, SECONDS_PER_DAY},
};

const SLOTS_PER_EPOCH: &str = "SLOTS_PER_EPOCH";
const SECONDS_PER_SLOT: &str = "SECONDS_PER_SLOT";

/// Timing constants of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParams {
    pub slots_per_epoch: u64,
    pub seconds_per_slot: u64,
    pub slots_per_day: u64,
}

impl ChainParams {
    /// Build from explicit constants.
    pub fn new(slots_per_epoch: u64, seconds_per_slot: u64) -> Result<Self> {
        if slots_per_epoch == 0 {
            return Err(EthStoreError::Config(format!("{SLOTS_PER_EPOCH} must be non-zero")));
        }
        if seconds_per_slot == 0 || seconds_per_slot > SECONDS_PER_DAY {
            return Err(EthStoreError::Config(format!(
                "{SECONDS_PER_SLOT} must be between 1 and {SECONDS_PER_DAY}, got {seconds_per_slot}"
            )));
        }
        let slots_per_day = SECONDS_PER_DAY / seconds_per_slot;
        Ok(Self { slots_per_epoch, seconds_per_slot, slots_per_day })
    }

    /// Read the constants out of the node's chain configuration.
    pub fn from_config(config: &ChainConfig) -> Result<Self> {
        Self::new(config_u64(config, SLOTS_PER_EPOCH)?, config_u64(config, SECONDS_PER_SLOT)?)
    }

    pub fn epoch_of(&self, slot: Slot) -> Epoch {
        slot / self.slots_per_epoch
    }
}

fn config_u64(config: &ChainConfig, key: &str) -> Result<u64> {
    let value = config
        .get(key)
        .ok_or_else(|| EthStoreError::Config(format!("undefined {key} in chain config")))?;
    quoted_u64::from_value(value).ok_or_else(|| {
        EthStoreError::Config(format!("invalid format of {key} in chain config: {value}"))
    })
}

/// Which day to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySelector {
    /// The most recent day that is entirely finalized.
    Finalized,
    /// An explicit day number, counted from genesis.
    Day(u64),
}

impl FromStr for DaySelector {
    type Err = EthStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "finalized" | "latest" => Ok(Self::Finalized),
            _ => s.parse().map(Self::Day).map_err(|e: std::num::ParseIntError| {
                EthStoreError::Validation { input: s.to_string(), reason: e.to_string() }
            }),
        }
    }
}

impl fmt::Display for DaySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finalized => f.write_str("finalized"),
            Self::Day(day) => write!(f, "{day}"),
        }
    }
}

/// Slot and epoch boundaries of one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainDay {
    pub day: u64,
    /// Wall-clock time of the day's first slot.
    pub day_time: DateTime<Utc>,
    pub first_slot: Slot,
    /// Last slot of the day, inclusive.
    pub last_slot: Slot,
    pub first_slot_of_next_day: Slot,
    pub first_epoch: Epoch,
    /// Epoch containing [Self::last_slot].
    pub last_epoch: Epoch,
}

impl ChainDay {
    /// Boundaries of `day` for a chain with the given params and genesis time (unix seconds).
    pub fn new(day: u64, params: &ChainParams, genesis_time: u64) -> Result<Self> {
        let first_slot =
            day.checked_mul(params.slots_per_day).ok_or(EthStoreError::Overflow("first slot"))?;
        let first_slot_of_next_day = first_slot
            .checked_add(params.slots_per_day)
            .ok_or(EthStoreError::Overflow("first slot of next day"))?;
        let last_slot = first_slot_of_next_day - 1;

        let day_time = first_slot
            .checked_mul(params.seconds_per_slot)
            .and_then(|offset| offset.checked_add(genesis_time))
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or(EthStoreError::Overflow("day start time"))?;

        Ok(Self {
            day,
            day_time,
            first_slot,
            last_slot,
            first_slot_of_next_day,
            first_epoch: params.epoch_of(first_slot),
            last_epoch: params.epoch_of(last_slot),
        })
    }

    /// Every slot of the day.
    pub fn slots(&self) -> RangeInclusive<Slot> {
        self.first_slot..=self.last_slot
    }

    pub fn slot_count(&self) -> u64 {
        self.first_slot_of_next_day - self.first_slot
    }
}

/// Pick the day number for `selector`.
///
/// The finalized selector stays one full day behind the day containing the finalized slot, so
/// that the chosen day is finalized even if finality lags by up to a day.
pub async fn resolve_day_number<C>(
    client: &C,
    selector: DaySelector,
    params: &ChainParams,
) -> Result<u64>
where
    C: BeaconApi + ?Sized,
{
    match selector {
        DaySelector::Day(day) => Ok(day),
        DaySelector::Finalized => {
            let finalized_slot = client.finalized_slot().await?;
            (finalized_slot / params.slots_per_day).checked_sub(1).ok_or_else(|| {
                EthStoreError::Validation {
                    input: selector.to_string(),
                    reason: format!("no fully finalized day yet (finalized slot {finalized_slot})"),
                }
            })
        }
    }
}

/// Fetch the chain parameters and resolve the day to compute.
pub async fn resolve_day<C>(client: &C, selector: DaySelector) -> Result<ChainDay>
where
    C: BeaconApi + ?Sized,
{
    let params = ChainParams::from_config(&client.chain_config().await?)?;
    let day = resolve_day_number(client, selector, &params).await?;
    let genesis_time = client.genesis_time().await?;
    ChainDay::new(day, &params, genesis_time)
}
