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

//! The day's validator cohort.
//!
//! Records live in a single arena. Two indices map validator index and public key to arena
//! positions, so an update made through either lookup is seen through the other.

use std::collections::HashMap;

use alloy::primitives::U256;

use crate::{
    beacon::{BeaconApi, ValidatorEntry},
    chain::ChainDay,
    error::Result,
    types::{BlsPubkey, Epoch, Gwei, ValidatorIndex},
};

/// Per-validator working figures for one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub index: ValidatorIndex,
    pub pubkey: BlsPubkey,
    pub effective_balance_gwei: Gwei,
    pub start_balance_gwei: Gwei,
    pub end_balance_gwei: Gwei,
    pub deposits_sum_gwei: Gwei,
    /// Balance swept to the execution layer during the day.
    pub withdrawals_sum_gwei: Gwei,
    pub tx_fees_sum_wei: U256,
}

impl Validator {
    /// A fresh record from the end-of-day listing, with no start balance and nothing accrued.
    pub fn from_end_of_day(entry: &ValidatorEntry) -> Self {
        Self {
            index: entry.index,
            pubkey: entry.pubkey,
            effective_balance_gwei: entry.effective_balance,
            start_balance_gwei: 0,
            end_balance_gwei: entry.balance,
            deposits_sum_gwei: 0,
            withdrawals_sum_gwei: 0,
            tx_fees_sum_wei: U256::ZERO,
        }
    }
}

/// Whether a validator was active for the whole of `day`: activated no later than the day's
/// first epoch and exiting no earlier than its last epoch.
pub fn is_eligible(activation_epoch: Epoch, exit_epoch: Epoch, day: &ChainDay) -> bool {
    activation_epoch <= day.first_epoch && exit_epoch >= day.last_epoch
}

/// Validators eligible for a day, addressable by index and by public key.
#[derive(Debug, Clone, Default)]
pub struct Cohort {
    validators: Vec<Validator>,
    by_index: HashMap<ValidatorIndex, usize>,
    by_pubkey: HashMap<BlsPubkey, usize>,
}

impl Cohort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator. A record with the same index replaces the previous one.
    pub fn insert(&mut self, validator: Validator) {
        if let Some(&pos) = self.by_index.get(&validator.index) {
            self.by_pubkey.remove(&self.validators[pos].pubkey);
            self.by_pubkey.insert(validator.pubkey, pos);
            self.validators[pos] = validator;
            return;
        }
        let pos = self.validators.len();
        self.by_index.insert(validator.index, pos);
        self.by_pubkey.insert(validator.pubkey, pos);
        self.validators.push(validator);
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }

    pub fn get(&self, index: ValidatorIndex) -> Option<&Validator> {
        self.by_index.get(&index).map(|&pos| &self.validators[pos])
    }

    pub fn get_mut(&mut self, index: ValidatorIndex) -> Option<&mut Validator> {
        self.by_index.get(&index).map(|&pos| &mut self.validators[pos])
    }

    #[cfg(test)]
    pub(crate) fn get_by_pubkey(&self, pubkey: &BlsPubkey) -> Option<&Validator> {
        self.by_pubkey.get(pubkey).map(|&pos| &self.validators[pos])
    }

    pub fn get_by_pubkey_mut(&mut self, pubkey: &BlsPubkey) -> Option<&mut Validator> {
        self.by_pubkey.get(pubkey).map(|&pos| &mut self.validators[pos])
    }

    /// Credit a deposit to the validator owning `pubkey`. Returns the validator's index, or
    /// `None` if the key is not part of the cohort.
    pub fn credit_deposit(&mut self, pubkey: &BlsPubkey, amount: Gwei) -> Option<ValidatorIndex> {
        let validator = self.get_by_pubkey_mut(pubkey)?;
        validator.deposits_sum_gwei += amount;
        Some(validator.index)
    }

    /// Credit execution fees to the proposer at `index`. Returns false if it is not part of the
    /// cohort.
    pub fn credit_fees(&mut self, index: ValidatorIndex, fees_wei: U256) -> bool {
        match self.get_mut(index) {
            Some(validator) => {
                validator.tx_fees_sum_wei += fees_wei;
                true
            }
            None => false,
        }
    }

    /// Record a withdrawal swept from the validator at `index`. Returns false if it is not part
    /// of the cohort.
    pub fn credit_withdrawal(&mut self, index: ValidatorIndex, amount: Gwei) -> bool {
        match self.get_mut(index) {
            Some(validator) => {
                validator.withdrawals_sum_gwei += amount;
                true
            }
            None => false,
        }
    }
}

/// Build the cohort for `day`.
///
/// Eligibility and end balances come from the state at the first slot of the next day, start
/// balances from the state at the day's first slot. A cohort member missing from the start
/// listing keeps a start balance of zero.
pub async fn build_cohort<C>(client: &C, day: &ChainDay) -> Result<Cohort>
where
    C: BeaconApi + ?Sized,
{
    let end_of_day = client.validators(day.first_slot_of_next_day).await?;
    let listed = end_of_day.len();

    let mut cohort = Cohort::new();
    for entry in end_of_day
        .iter()
        .filter(|entry| is_eligible(entry.activation_epoch, entry.exit_epoch, day))
    {
        cohort.insert(Validator::from_end_of_day(entry));
    }

    let start_balances = client.validator_balances(day.first_slot).await?;
    let mut applied = 0usize;
    for (index, balance) in start_balances {
        if let Some(validator) = cohort.get_mut(index) {
            validator.start_balance_gwei = balance;
            applied += 1;
        }
    }

    tracing::debug!(
        "Cohort for day {}: {} of {} validators eligible, {} start balances applied",
        day.day,
        cohort.len(),
        listed,
        applied
    );
    if cohort.is_empty() {
        tracing::warn!("No validator was active for the whole of day {}", day.day);
    } else if applied < cohort.len() {
        tracing::warn!(
            "{} eligible validators have no start balance for day {}; counting it as zero",
            cohort.len() - applied,
            day.day
        );
    }

    Ok(cohort)
}
