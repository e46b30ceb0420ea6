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

//! The result of a day computation.

use std::collections::BTreeMap;

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{DayRewards, GroupRewards},
    chain::ChainDay,
    types::{Epoch, Gwei},
};

/// Reward figures for one day, globally or for one validator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayResult {
    pub day: u64,
    pub day_time: DateTime<Utc>,
    /// Annualized reward rate; `None` when the group has no validators.
    pub apr: Option<Decimal>,
    pub validators: u64,
    pub start_epoch: Epoch,
    #[serde(rename = "effectiveBalance")]
    pub effective_balance_gwei: Gwei,
    #[serde(rename = "startBalance")]
    pub start_balance_gwei: Gwei,
    #[serde(rename = "endBalance")]
    pub end_balance_gwei: Gwei,
    #[serde(rename = "depositsSum")]
    pub deposits_sum_gwei: Gwei,
    #[serde(rename = "withdrawalsSum", default)]
    pub withdrawals_sum_gwei: Gwei,
    #[serde(rename = "txFeesSum", with = "u256_decimal")]
    pub tx_fees_sum_wei: U256,
    /// Per-set results. Always empty on the set results themselves.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub validator_sets: BTreeMap<String, DayResult>,
}

impl DayResult {
    fn for_group(day: &ChainDay, group: GroupRewards) -> Self {
        let totals = group.totals;
        Self {
            day: day.day,
            day_time: day.day_time,
            apr: group.apr,
            validators: totals.validators,
            start_epoch: day.first_epoch,
            effective_balance_gwei: totals.effective_balance_gwei,
            start_balance_gwei: totals.start_balance_gwei,
            end_balance_gwei: totals.end_balance_gwei,
            deposits_sum_gwei: totals.deposits_sum_gwei,
            withdrawals_sum_gwei: totals.withdrawals_sum_gwei,
            tx_fees_sum_wei: totals.tx_fees_sum_wei,
            validator_sets: BTreeMap::new(),
        }
    }
}

/// Package the day's rewards into the global result with its per-set results.
pub fn assemble(day: &ChainDay, rewards: DayRewards) -> DayResult {
    let validator_sets = rewards
        .sets
        .into_iter()
        .map(|(name, group)| (name, DayResult::for_group(day, group)))
        .collect();
    DayResult { validator_sets, ..DayResult::for_group(day, rewards.global) }
}

/// Wei amounts as decimal strings, which JSON consumers can hold without losing precision.
mod u256_decimal {
    use alloy::primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(de::Error::custom)
    }
}
