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

//! Concurrent scan of every block in a day.
//!
//! Each slot is fetched and decoded by its own task, with at most
//! [EthStoreConfig::max_concurrent_requests] in flight. Only the final merge into the cohort
//! takes the shared lock. The first failing task cancels the rest and its error is returned.

use std::sync::Arc;

use alloy::primitives::U256;
use tokio::{
    sync::{Mutex, Semaphore},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

use crate::{
    beacon::{BeaconApi, Deposit, ExecutionPayload, SignedBeaconBlock, Withdrawal},
    chain::ChainDay,
    cohort::Cohort,
    config::EthStoreConfig,
    error::{EthStoreError, Result},
    tx::decode_transaction,
    types::{Slot, ValidatorIndex},
};

const PROGRESS_INTERVAL: u64 = 1000;

/// Block formats the scanner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockVersion {
    Phase0,
    Altair,
    Bellatrix,
    Capella,
    Deneb,
    Electra,
    Fulu,
}

impl BlockVersion {
    /// Look up a fork name as reported by the beacon API.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "phase0" => Some(Self::Phase0),
            "altair" => Some(Self::Altair),
            "bellatrix" => Some(Self::Bellatrix),
            "capella" => Some(Self::Capella),
            "deneb" => Some(Self::Deneb),
            "electra" => Some(Self::Electra),
            "fulu" => Some(Self::Fulu),
            _ => None,
        }
    }

    /// Whether blocks of this version carry an execution payload.
    pub fn has_execution_payload(self) -> bool {
        !matches!(self, Self::Phase0 | Self::Altair)
    }

    /// Whether the execution payload sweeps withdrawals from validator balances.
    pub fn has_withdrawals(self) -> bool {
        self.has_execution_payload() && self != Self::Bellatrix
    }

    /// Whether the body carries execution-layer deposit requests.
    pub fn has_deposit_requests(self) -> bool {
        matches!(self, Self::Electra | Self::Fulu)
    }
}

/// What a single block adds to the cohort's running totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContribution {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    /// Sum of `gas_price * gas_used` over the block's transactions, in wei.
    pub tx_fees_wei: U256,
    /// Body deposits followed by execution-layer deposit requests.
    pub deposits: Vec<Deposit>,
    pub withdrawals: Vec<Withdrawal>,
}

/// Decode a fetched block into its contribution.
pub fn extract_contribution(slot: Slot, block: SignedBeaconBlock) -> Result<BlockContribution> {
    let Some(version) = BlockVersion::from_name(&block.version) else {
        return Err(EthStoreError::Format { slot, version: block.version });
    };

    let payload = if version.has_execution_payload() {
        match block.execution_payload {
            Some(payload) => payload,
            None => {
                return Err(EthStoreError::Format {
                    slot,
                    version: format!("{} (missing execution payload)", block.version),
                })
            }
        }
    } else {
        ExecutionPayload::default()
    };

    let mut tx_fees_wei = U256::ZERO;
    for (tx_index, raw) in payload.transactions.iter().enumerate() {
        let tx = decode_transaction(raw)
            .map_err(|source| EthStoreError::Decode { slot, tx_index, source })?;
        tx_fees_wei += tx.fee();
    }

    let mut deposits = block.deposits;
    if version.has_deposit_requests() {
        deposits.extend(block.deposit_requests);
    }
    let withdrawals = if version.has_withdrawals() { payload.withdrawals } else { Vec::new() };

    Ok(BlockContribution {
        slot,
        proposer_index: block.proposer_index,
        tx_fees_wei,
        deposits,
        withdrawals,
    })
}

/// Fetch the block at `slot`. A missed slot yields `Ok(None)`.
pub async fn fetch_contribution<C>(client: &C, slot: Slot) -> Result<Option<BlockContribution>>
where
    C: BeaconApi + ?Sized,
{
    match client.block(slot).await? {
        Some(block) => extract_contribution(slot, block).map(Some),
        None => {
            tracing::trace!("No block at slot {slot}");
            Ok(None)
        }
    }
}

/// Apply a block's contribution to the cohort.
///
/// Fees go to the proposer, deposits to the validator owning the deposited key, withdrawals to
/// the swept validator. Any of them is dropped if its target is not in the cohort.
pub fn merge_contribution(cohort: &mut Cohort, contribution: &BlockContribution, debug: bool) {
    if !contribution.tx_fees_wei.is_zero() {
        cohort.credit_fees(contribution.proposer_index, contribution.tx_fees_wei);
    }

    for deposit in &contribution.deposits {
        let Some(index) = cohort.credit_deposit(&deposit.pubkey, deposit.amount) else {
            continue;
        };
        if debug {
            tracing::debug!(
                "Deposit of {} Gwei at slot {} to validator {} ({})",
                deposit.amount,
                contribution.slot,
                index,
                deposit.pubkey
            );
        }
    }

    for withdrawal in &contribution.withdrawals {
        if cohort.credit_withdrawal(withdrawal.validator_index, withdrawal.amount) && debug {
            tracing::trace!(
                "Withdrawal of {} Gwei at slot {} from validator {}",
                withdrawal.amount,
                contribution.slot,
                withdrawal.validator_index
            );
        }
    }
}

/// Scan every slot of `day` and accumulate fees and deposits into `cohort`.
pub async fn scan_blocks<C>(
    client: Arc<C>,
    day: &ChainDay,
    cohort: Cohort,
    config: &EthStoreConfig,
) -> Result<Cohort>
where
    C: BeaconApi + 'static,
{
    let debug = config.debug();
    let cohort = Arc::new(Mutex::new(cohort));
    let permits = Arc::new(Semaphore::new(config.concurrency()));
    let cancel = CancellationToken::new();
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    for slot in day.slots() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = permits.clone().acquire_owned() => permit,
        };
        let Ok(permit) = permit else {
            break;
        };

        let done = slot - day.first_slot;
        if debug && done % PROGRESS_INTERVAL == 0 {
            tracing::debug!(
                "Checking blocks for deposits and txs: {:.0}% ({} of {}-{})",
                100.0 * done as f64 / day.slot_count() as f64,
                slot,
                day.first_slot,
                day.last_slot
            );
        }

        let client = client.clone();
        let cohort = cohort.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let _permit = permit;
            if cancel.is_cancelled() {
                return Ok(());
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                fetched = fetch_contribution(client.as_ref(), slot) => fetched,
            };

            match fetched {
                Ok(Some(contribution)) => {
                    merge_contribution(&mut *cohort.lock().await, &contribution, debug);
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(err) => {
                    cancel.cancel();
                    Err(err)
                }
            }
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(EthStoreError::from).and_then(|result| result);
        if let Err(err) = result {
            cancel.cancel();
            if first_error.is_none() {
                tracing::warn!("Aborting scan of day {}: {err}", day.day);
                first_error = Some(err);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let cohort = std::mem::take(&mut *cohort.lock().await);
    Ok(cohort)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy::primitives::Bytes;

    use super::*;
    use crate::{
        chain::ChainParams,
        cohort::Validator,
        testing::{legacy_tx, pubkey, validator_entry, MemoryBeacon},
    };

    /// Day 0 of a chain with 4 slots per day.
    fn test_day() -> ChainDay {
        ChainDay::new(0, &ChainParams::new(2, 21_600).unwrap(), 0).unwrap()
    }

    fn test_cohort(indices: &[u64]) -> Cohort {
        let mut cohort = Cohort::new();
        for &index in indices {
            cohort.insert(Validator::from_end_of_day(&validator_entry(index, 0, u64::MAX, 32, 32)));
        }
        cohort
    }

    fn block(slot: Slot, version: &str, proposer: ValidatorIndex) -> SignedBeaconBlock {
        SignedBeaconBlock {
            version: version.to_string(),
            slot,
            proposer_index: proposer,
            deposits: vec![],
            deposit_requests: vec![],
            execution_payload: Some(ExecutionPayload::default()),
        }
    }

    #[test]
    fn test_version_closure() {
        for name in ["phase0", "altair"] {
            assert!(!BlockVersion::from_name(name).unwrap().has_execution_payload());
        }
        for name in ["bellatrix", "capella", "deneb", "electra", "fulu"] {
            assert!(BlockVersion::from_name(name).unwrap().has_execution_payload());
        }
        assert_eq!(BlockVersion::from_name("gloas"), None);
        assert_eq!(BlockVersion::from_name("Deneb"), None);
    }

    #[test]
    fn test_fees_sum_over_transactions() {
        let mut b = block(1, "capella", 4);
        b.execution_payload = Some(ExecutionPayload {
            transactions: vec![legacy_tx(10, 1000), legacy_tx(7, 21_000), legacy_tx(1, 1)],
            ..Default::default()
        });
        let contribution = extract_contribution(1, b).unwrap();
        assert_eq!(contribution.proposer_index, 4);
        assert_eq!(contribution.tx_fees_wei, U256::from(10_000 + 147_000 + 1));
    }

    #[test]
    fn test_pre_merge_payload_is_ignored() {
        let mut b = block(1, "altair", 4);
        b.execution_payload = Some(ExecutionPayload {
            transactions: vec![Bytes::from_static(&[0xff])],
            ..Default::default()
        });
        let contribution = extract_contribution(1, b).unwrap();
        assert!(contribution.tx_fees_wei.is_zero());
    }

    #[test]
    fn test_unknown_version_is_format_error() {
        let err = extract_contribution(3, block(3, "gloas", 0)).unwrap_err();
        assert!(
            matches!(err, EthStoreError::Format { slot: 3, ref version } if version == "gloas")
        );
    }

    #[test]
    fn test_missing_payload_is_format_error() {
        let mut b = block(3, "deneb", 0);
        b.execution_payload = None;
        assert!(matches!(extract_contribution(3, b), Err(EthStoreError::Format { slot: 3, .. })));
    }

    #[test]
    fn test_bad_transaction_is_decode_error() {
        let mut b = block(2, "bellatrix", 0);
        b.execution_payload = Some(ExecutionPayload {
            transactions: vec![legacy_tx(1, 1), Bytes::from_static(&[0x02, 0x01, 0x02])],
            ..Default::default()
        });
        let err = extract_contribution(2, b).unwrap_err();
        assert!(matches!(err, EthStoreError::Decode { slot: 2, tx_index: 1, .. }));
    }

    #[test]
    fn test_merge_credits_proposer_and_known_keys_only() {
        let mut cohort = test_cohort(&[1, 2, 3]);
        let contribution = BlockContribution {
            slot: 2,
            proposer_index: 1,
            tx_fees_wei: U256::from(10_000),
            deposits: vec![
                Deposit { pubkey: pubkey(2), amount: 32 },
                Deposit { pubkey: pubkey(99), amount: 1_000 },
            ],
            withdrawals: vec![
                Withdrawal { validator_index: 3, amount: 5 },
                Withdrawal { validator_index: 99, amount: 7 },
            ],
        };
        merge_contribution(&mut cohort, &contribution, true);

        assert_eq!(cohort.get(1).unwrap().tx_fees_sum_wei, U256::from(10_000));
        assert_eq!(cohort.get(1).unwrap().deposits_sum_gwei, 0);
        assert_eq!(cohort.get(2).unwrap().deposits_sum_gwei, 32);
        assert!(cohort.get(2).unwrap().tx_fees_sum_wei.is_zero());
        let mut swept = Validator::from_end_of_day(&validator_entry(3, 0, u64::MAX, 32, 32));
        swept.withdrawals_sum_gwei = 5;
        assert_eq!(*cohort.get(3).unwrap(), swept);
    }

    #[test]
    fn test_capella_withdrawals_are_collected() {
        let mut b = block(5, "capella", 1);
        b.execution_payload = Some(ExecutionPayload {
            transactions: vec![],
            withdrawals: vec![Withdrawal { validator_index: 2, amount: 10_000_000 }],
        });
        let contribution = extract_contribution(5, b).unwrap();
        assert_eq!(
            contribution.withdrawals,
            vec![Withdrawal { validator_index: 2, amount: 10_000_000 }]
        );
    }

    #[test]
    fn test_withdrawals_before_capella_are_ignored() {
        let mut b = block(5, "bellatrix", 1);
        b.execution_payload = Some(ExecutionPayload {
            transactions: vec![],
            withdrawals: vec![Withdrawal { validator_index: 2, amount: 10_000_000 }],
        });
        assert!(extract_contribution(5, b).unwrap().withdrawals.is_empty());
    }

    #[test]
    fn test_deposit_requests_from_electra_on() {
        let request = Deposit { pubkey: pubkey(2), amount: 3 };
        for (version, expected) in [("deneb", 1), ("electra", 2), ("fulu", 2)] {
            let mut b = block(5, version, 1);
            b.deposits = vec![Deposit { pubkey: pubkey(1), amount: 1 }];
            b.deposit_requests = vec![request.clone()];
            let contribution = extract_contribution(5, b).unwrap();
            assert_eq!(contribution.deposits.len(), expected, "{version}");
        }
    }

    #[tokio::test]
    async fn test_scan_skips_missed_slots() {
        let day = test_day();
        let mut b = block(1, "deneb", 2);
        b.execution_payload =
            Some(ExecutionPayload { transactions: vec![legacy_tx(2, 50)], ..Default::default() });
        let node = Arc::new(MemoryBeacon::new(2, 21_600).with_block(b));

        let config = EthStoreConfig::default();
        let cohort = scan_blocks(node.clone(), &day, test_cohort(&[1, 2]), &config).await.unwrap();
        assert_eq!(cohort.get(2).unwrap().tx_fees_sum_wei, U256::from(100));
        assert!(cohort.get(1).unwrap().tx_fees_sum_wei.is_zero());
        // Every slot of the day, including the last one, was requested.
        assert_eq!(node.requested_slots(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_scan_accumulates_across_blocks() {
        let day = test_day();
        let mut node = MemoryBeacon::new(2, 21_600);
        for slot in day.slots() {
            let mut b = block(slot, "electra", 1);
            b.execution_payload = Some(ExecutionPayload {
                transactions: vec![legacy_tx(1, 1_000)],
                ..Default::default()
            });
            b.deposits = vec![Deposit { pubkey: pubkey(2), amount: 1 }];
            node = node.with_block(b);
        }

        let cohort =
            scan_blocks(Arc::new(node), &day, test_cohort(&[1, 2]), &EthStoreConfig::default())
                .await
                .unwrap();
        assert_eq!(cohort.get(1).unwrap().tx_fees_sum_wei, U256::from(4_000));
        assert_eq!(cohort.get(2).unwrap().deposits_sum_gwei, 4);
    }

    #[tokio::test]
    async fn test_scan_fails_on_fetch_error() {
        let day = test_day();
        let node = Arc::new(MemoryBeacon::new(2, 21_600).with_failing_slot(2));
        let err = scan_blocks(node, &day, test_cohort(&[1]), &EthStoreConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EthStoreError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_scan_fails_on_unknown_version() {
        let day = test_day();
        let node = Arc::new(MemoryBeacon::new(2, 21_600).with_block(block(3, "gloas", 1)));
        let err = scan_blocks(node, &day, test_cohort(&[1]), &EthStoreConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EthStoreError::Format { slot: 3, .. }));
    }

    #[tokio::test]
    async fn test_scan_respects_concurrency_limit() {
        let day = ChainDay::new(0, &ChainParams::new(32, 864).unwrap(), 0).unwrap();
        assert_eq!(day.slot_count(), 100);
        let node = Arc::new(MemoryBeacon::new(32, 864).with_block_delay(Duration::from_millis(5)));
        let config = EthStoreConfig::default().with_max_concurrent_requests(3);

        scan_blocks(node.clone(), &day, test_cohort(&[1]), &config).await.unwrap();
        assert_eq!(node.requested_slots().len(), 100);
        assert!(node.max_in_flight() <= 3);
        assert!(node.max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn test_scan_stops_issuing_fetches_after_failure() {
        let day = ChainDay::new(0, &ChainParams::new(32, 864).unwrap(), 0).unwrap();
        let node = Arc::new(
            MemoryBeacon::new(32, 864)
                .with_failing_slot(0)
                .with_block_delay(Duration::from_millis(20)),
        );
        let config = EthStoreConfig::default().with_max_concurrent_requests(1);

        let err = scan_blocks(node.clone(), &day, test_cohort(&[1]), &config).await.unwrap_err();
        assert!(matches!(err, EthStoreError::Fetch(_)));
        // With one request in flight at a time, nothing after the failing slot is fetched.
        assert_eq!(node.requested_slots(), vec![0]);
    }
}
