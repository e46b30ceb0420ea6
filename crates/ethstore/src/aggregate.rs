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

//! Reward aggregation and APR computation.
//!
//! All reward math runs on [Decimal]. Balances are converted from gwei to wei before they meet
//! execution fees, and nothing passes through a float.

use std::collections::{BTreeMap, HashMap, HashSet};

use alloy::primitives::U256;
use rust_decimal::Decimal;

use crate::{
    cohort::{Cohort, Validator},
    error::{EthStoreError, Result},
    types::{Gwei, ValidatorIndex, DAYS_PER_YEAR, GWEI_TO_WEI},
};

/// Caller-named groups of validator indices. Groups may overlap.
pub type ValidatorSets = HashMap<String, HashSet<ValidatorIndex>>;

/// Turn name → index list pairs into lookup sets.
pub fn validator_sets_from_lists(lists: &HashMap<String, Vec<ValidatorIndex>>) -> ValidatorSets {
    lists
        .iter()
        .map(|(name, indices)| (name.clone(), indices.iter().copied().collect()))
        .collect()
}

/// Summed figures of a group of validators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardTotals {
    pub validators: u64,
    pub effective_balance_gwei: Gwei,
    pub start_balance_gwei: Gwei,
    pub end_balance_gwei: Gwei,
    pub deposits_sum_gwei: Gwei,
    pub withdrawals_sum_gwei: Gwei,
    pub tx_fees_sum_wei: U256,
}

impl RewardTotals {
    pub fn add(&mut self, validator: &Validator) {
        self.validators += 1;
        self.effective_balance_gwei += validator.effective_balance_gwei;
        self.start_balance_gwei += validator.start_balance_gwei;
        self.end_balance_gwei += validator.end_balance_gwei;
        self.deposits_sum_gwei += validator.deposits_sum_gwei;
        self.withdrawals_sum_gwei += validator.withdrawals_sum_gwei;
        self.tx_fees_sum_wei += validator.tx_fees_sum_wei;
    }

    /// Balance change not explained by deposits or withdrawals. Negative when penalties
    /// outweigh rewards.
    pub fn consensus_reward_gwei(&self) -> i128 {
        i128::from(self.end_balance_gwei)
            - i128::from(self.start_balance_gwei)
            - i128::from(self.deposits_sum_gwei)
            + i128::from(self.withdrawals_sum_gwei)
    }

    /// Consensus reward plus execution fees, in wei.
    pub fn total_reward_wei(&self) -> Result<Decimal> {
        let fees = u128::try_from(self.tx_fees_sum_wei)
            .ok()
            .and_then(|fees| i128::try_from(fees).ok())
            .and_then(|fees| Decimal::try_from_i128_with_scale(fees, 0).ok())
            .ok_or(EthStoreError::Overflow("execution fee sum"))?;
        let consensus = Decimal::try_from_i128_with_scale(self.consensus_reward_gwei(), 0)
            .map_err(|_| EthStoreError::Overflow("consensus reward"))?
            .checked_mul(Decimal::from(GWEI_TO_WEI))
            .ok_or(EthStoreError::Overflow("consensus reward in wei"))?;
        fees.checked_add(consensus).ok_or(EthStoreError::Overflow("total reward"))
    }

    /// Annualized reward rate: `365 * total_reward / effective_balance`, both in wei.
    ///
    /// `None` when the group has no effective balance, which includes empty groups.
    pub fn apr(&self) -> Result<Option<Decimal>> {
        if self.effective_balance_gwei == 0 {
            return Ok(None);
        }
        let yearly = self
            .total_reward_wei()?
            .checked_mul(Decimal::from(DAYS_PER_YEAR))
            .ok_or(EthStoreError::Overflow("annualized reward"))?;
        let stake = Decimal::from(self.effective_balance_gwei)
            .checked_mul(Decimal::from(GWEI_TO_WEI))
            .ok_or(EthStoreError::Overflow("effective balance in wei"))?;
        yearly.checked_div(stake).map(Some).ok_or(EthStoreError::Overflow("apr"))
    }
}

/// Totals of one group together with its APR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRewards {
    pub totals: RewardTotals,
    pub apr: Option<Decimal>,
}

impl GroupRewards {
    fn from_totals(totals: RewardTotals) -> Result<Self> {
        let apr = totals.apr()?;
        Ok(Self { totals, apr })
    }
}

/// Rewards of the whole cohort and of each named set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRewards {
    pub global: GroupRewards,
    pub sets: BTreeMap<String, GroupRewards>,
}

/// Sum the cohort into a global total and into every named set, then compute the APRs.
///
/// Every named set is reported, even when none of its members are in the cohort.
pub fn aggregate(cohort: &Cohort, validator_sets: &ValidatorSets) -> Result<DayRewards> {
    let mut global = RewardTotals::default();
    let mut sets: BTreeMap<&str, RewardTotals> =
        validator_sets.keys().map(|name| (name.as_str(), RewardTotals::default())).collect();

    for validator in cohort.iter() {
        global.add(validator);
        for (name, members) in validator_sets {
            if members.contains(&validator.index) {
                if let Some(totals) = sets.get_mut(name.as_str()) {
                    totals.add(validator);
                }
            }
        }
    }

    let sets = sets
        .into_iter()
        .map(|(name, totals)| Ok((name.to_string(), GroupRewards::from_totals(totals)?)))
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(DayRewards { global: GroupRewards::from_totals(global)?, sets })
}
