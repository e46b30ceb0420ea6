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

//! JSON shapes of the beacon REST API responses.

use alloy::primitives::Bytes;
use serde::Deserialize;

use super::{Deposit, ExecutionPayload, SignedBeaconBlock, ValidatorEntry, Withdrawal};
use crate::types::{BlsPubkey, Epoch, Gwei, Slot, ValidatorIndex};

/// The beacon API encodes integers as decimal strings. Plain JSON numbers are accepted too.
pub(crate) mod quoted_u64 {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum QuotedOrNumber {
        Quoted(String),
        Number(u64),
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match QuotedOrNumber::deserialize(deserializer)? {
            QuotedOrNumber::Quoted(s) => s.parse().map_err(de::Error::custom),
            QuotedOrNumber::Number(n) => Ok(n),
        }
    }

    /// Interpret an already-parsed JSON value the same way.
    pub(crate) fn from_value(value: &serde_json::Value) -> Option<u64> {
        match value {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Genesis {
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub genesis_time: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockHeader {
    pub header: SignedHeader,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignedHeader {
    pub message: HeaderMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HeaderMessage {
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub slot: Slot,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidatorResponse {
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub index: ValidatorIndex,
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub balance: Gwei,
    pub validator: ValidatorRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidatorRecord {
    pub pubkey: BlsPubkey,
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub effective_balance: Gwei,
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub activation_epoch: Epoch,
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub exit_epoch: Epoch,
}

impl From<ValidatorResponse> for ValidatorEntry {
    fn from(v: ValidatorResponse) -> Self {
        Self {
            index: v.index,
            pubkey: v.validator.pubkey,
            effective_balance: v.validator.effective_balance,
            activation_epoch: v.validator.activation_epoch,
            exit_epoch: v.validator.exit_epoch,
            balance: v.balance,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BalanceResponse {
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub index: ValidatorIndex,
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub balance: Gwei,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockResponse {
    pub version: String,
    pub data: SignedBlock,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignedBlock {
    pub message: BlockMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockMessage {
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub slot: Slot,
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub proposer_index: ValidatorIndex,
    pub body: BlockBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockBody {
    #[serde(default)]
    pub deposits: Vec<DepositResponse>,
    #[serde(default)]
    pub execution_payload: Option<ExecutionPayloadResponse>,
    #[serde(default)]
    pub execution_requests: Option<ExecutionRequestsResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DepositResponse {
    pub data: DepositData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DepositData {
    pub pubkey: BlsPubkey,
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub amount: Gwei,
}

impl From<DepositData> for Deposit {
    fn from(d: DepositData) -> Self {
        Self { pubkey: d.pubkey, amount: d.amount }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecutionPayloadResponse {
    #[serde(default)]
    pub transactions: Vec<Bytes>,
    #[serde(default)]
    pub withdrawals: Vec<WithdrawalResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WithdrawalResponse {
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub validator_index: ValidatorIndex,
    #[serde(deserialize_with = "quoted_u64::deserialize")]
    pub amount: Gwei,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecutionRequestsResponse {
    /// Same fields as a body deposit's `data`, plus ones the engine ignores.
    #[serde(default)]
    pub deposits: Vec<DepositData>,
}

impl From<BlockResponse> for SignedBeaconBlock {
    fn from(block: BlockResponse) -> Self {
        let message = block.data.message;
        let body = message.body;
        Self {
            version: block.version,
            slot: message.slot,
            proposer_index: message.proposer_index,
            deposits: body.deposits.into_iter().map(|d| d.data.into()).collect(),
            deposit_requests: body
                .execution_requests
                .map(|r| r.deposits.into_iter().map(Deposit::from).collect())
                .unwrap_or_default(),
            execution_payload: body.execution_payload.map(|p| ExecutionPayload {
                transactions: p.transactions,
                withdrawals: p
                    .withdrawals
                    .into_iter()
                    .map(|w| Withdrawal { validator_index: w.validator_index, amount: w.amount })
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_response_quoted_fields() {
        let json = serde_json::json!({
            "index": "7",
            "balance": "32001000000",
            "status": "active_ongoing",
            "validator": {
                "pubkey": format!("0x{}", "ab".repeat(48)),
                "withdrawal_credentials": format!("0x{}", "00".repeat(32)),
                "effective_balance": "32000000000",
                "slashed": false,
                "activation_eligibility_epoch": "0",
                "activation_epoch": "0",
                "exit_epoch": "18446744073709551615",
                "withdrawable_epoch": "18446744073709551615"
            }
        });
        let entry: ValidatorEntry =
            serde_json::from_value::<ValidatorResponse>(json).unwrap().into();
        assert_eq!(entry.index, 7);
        assert_eq!(entry.balance, 32_001_000_000);
        assert_eq!(entry.effective_balance, 32_000_000_000);
        assert_eq!(entry.exit_epoch, u64::MAX);
        assert_eq!(entry.pubkey, BlsPubkey::repeat_byte(0xab));
    }

    #[test]
    fn test_phase0_block_has_no_payload() {
        let json = serde_json::json!({
            "version": "phase0",
            "data": {
                "message": {
                    "slot": "12",
                    "proposer_index": 3,
                    "parent_root": format!("0x{}", "00".repeat(32)),
                    "body": {
                        "deposits": [{
                            "proof": [],
                            "data": {
                                "pubkey": format!("0x{}", "01".repeat(48)),
                                "amount": "1000000000"
                            }
                        }]
                    }
                },
                "signature": "0x"
            }
        });
        let block: SignedBeaconBlock =
            serde_json::from_value::<BlockResponse>(json).unwrap().into();
        assert_eq!(block.version, "phase0");
        assert_eq!(block.slot, 12);
        assert_eq!(block.proposer_index, 3);
        assert_eq!(block.deposits.len(), 1);
        assert_eq!(block.deposits[0].amount, 1_000_000_000);
        assert!(block.execution_payload.is_none());
    }

    #[test]
    fn test_electra_block_withdrawals_and_deposit_requests() {
        let json = serde_json::json!({
            "version": "electra",
            "data": {
                "message": {
                    "slot": "100",
                    "proposer_index": "9",
                    "body": {
                        "deposits": [],
                        "execution_payload": {
                            "transactions": [],
                            "withdrawals": [{
                                "index": "51",
                                "validator_index": "4",
                                "address": format!("0x{}", "00".repeat(20)),
                                "amount": "10000000"
                            }]
                        },
                        "execution_requests": {
                            "deposits": [{
                                "pubkey": format!("0x{}", "02".repeat(48)),
                                "withdrawal_credentials": format!("0x{}", "00".repeat(32)),
                                "amount": "2000000000",
                                "signature": format!("0x{}", "00".repeat(96)),
                                "index": "7"
                            }],
                            "withdrawals": [],
                            "consolidations": []
                        }
                    }
                }
            }
        });
        let block: SignedBeaconBlock =
            serde_json::from_value::<BlockResponse>(json).unwrap().into();
        assert!(block.deposits.is_empty());
        assert_eq!(
            block.deposit_requests,
            vec![Deposit { pubkey: BlsPubkey::repeat_byte(0x02), amount: 2_000_000_000 }]
        );
        let payload = block.execution_payload.unwrap();
        assert_eq!(
            payload.withdrawals,
            vec![Withdrawal { validator_index: 4, amount: 10_000_000 }]
        );
    }

    #[test]
    fn test_quoted_value_from_config() {
        assert_eq!(quoted_u64::from_value(&serde_json::json!("32")), Some(32));
        assert_eq!(quoted_u64::from_value(&serde_json::json!(12)), Some(12));
        assert_eq!(quoted_u64::from_value(&serde_json::json!("twelve")), None);
        assert_eq!(quoted_u64::from_value(&serde_json::json!([1, 2])), None);
    }
}
