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

//! In-memory beacon node for unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
pub(crate) use ethstore_test_utils::{legacy_tx, mock_pubkey as pubkey};

use crate::{
    beacon::{
        BeaconApi, BeaconError, ChainConfig, SignedBeaconBlock, ValidatorBalances, ValidatorEntry,
    },
    types::{Epoch, Gwei, Slot, ValidatorIndex},
};

pub(crate) fn validator_entry(
    index: ValidatorIndex,
    activation_epoch: Epoch,
    exit_epoch: Epoch,
    effective_balance: Gwei,
    balance: Gwei,
) -> ValidatorEntry {
    ValidatorEntry {
        index,
        pubkey: pubkey(index),
        effective_balance,
        activation_epoch,
        exit_epoch,
        balance,
    }
}

#[derive(Default)]
pub(crate) struct MemoryBeacon {
    config: ChainConfig,
    finalized_slot: Slot,
    genesis_time: u64,
    validators: HashMap<Slot, Vec<ValidatorEntry>>,
    balances: HashMap<Slot, ValidatorBalances>,
    blocks: HashMap<Slot, SignedBeaconBlock>,
    failing_slots: HashSet<Slot>,
    block_delay: Option<Duration>,
    requested: Mutex<Vec<Slot>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryBeacon {
    pub(crate) fn new(slots_per_epoch: u64, seconds_per_slot: u64) -> Self {
        let config = ChainConfig::from([
            ("SLOTS_PER_EPOCH".to_string(), slots_per_epoch.to_string().into()),
            ("SECONDS_PER_SLOT".to_string(), seconds_per_slot.to_string().into()),
        ]);
        Self { config, ..Default::default() }
    }

    pub(crate) fn with_finalized_slot(self, finalized_slot: Slot) -> Self {
        Self { finalized_slot, ..self }
    }

    pub(crate) fn with_genesis_time(self, genesis_time: u64) -> Self {
        Self { genesis_time, ..self }
    }

    pub(crate) fn with_validators(mut self, slot: Slot, validators: Vec<ValidatorEntry>) -> Self {
        self.validators.insert(slot, validators);
        self
    }

    pub(crate) fn with_balances(
        mut self,
        slot: Slot,
        balances: impl IntoIterator<Item = (ValidatorIndex, Gwei)>,
    ) -> Self {
        self.balances.insert(slot, balances.into_iter().collect());
        self
    }

    pub(crate) fn with_block(mut self, block: SignedBeaconBlock) -> Self {
        self.blocks.insert(block.slot, block);
        self
    }

    pub(crate) fn with_failing_slot(mut self, slot: Slot) -> Self {
        self.failing_slots.insert(slot);
        self
    }

    pub(crate) fn with_block_delay(self, delay: Duration) -> Self {
        Self { block_delay: Some(delay), ..self }
    }

    /// Slots whose block was requested, sorted.
    pub(crate) fn requested_slots(&self) -> Vec<Slot> {
        let mut slots = self.requested.lock().unwrap().clone();
        slots.sort_unstable();
        slots
    }

    /// Highest number of block requests observed in flight at once.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BeaconApi for MemoryBeacon {
    async fn chain_config(&self) -> Result<ChainConfig, BeaconError> {
        Ok(self.config.clone())
    }

    async fn finalized_slot(&self) -> Result<Slot, BeaconError> {
        Ok(self.finalized_slot)
    }

    async fn genesis_time(&self) -> Result<u64, BeaconError> {
        Ok(self.genesis_time)
    }

    async fn validators(&self, slot: Slot) -> Result<Vec<ValidatorEntry>, BeaconError> {
        self.validators
            .get(&slot)
            .cloned()
            .ok_or_else(|| BeaconError::Unavailable(format!("no state at slot {slot}")))
    }

    async fn validator_balances(&self, slot: Slot) -> Result<ValidatorBalances, BeaconError> {
        self.balances
            .get(&slot)
            .cloned()
            .ok_or_else(|| BeaconError::Unavailable(format!("no state at slot {slot}")))
    }

    async fn block(&self, slot: Slot) -> Result<Option<SignedBeaconBlock>, BeaconError> {
        self.requested.lock().unwrap().push(slot);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.block_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_slots.contains(&slot) {
            return Err(BeaconError::Unavailable(format!("block {slot} unavailable")));
        }
        Ok(self.blocks.get(&slot).cloned())
    }
}
