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

//! Beacon node access.
//!
//! The engine talks to the chain only through [BeaconApi]. [BeaconClient] implements it on top
//! of the standard beacon REST API; tests substitute in-memory or mock-server backed nodes.

use std::collections::HashMap;

use alloy::primitives::Bytes;
use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::types::{BlsPubkey, Epoch, Gwei, Slot, ValidatorIndex};

pub mod client;
pub(crate) mod wire;

pub use client::BeaconClient;

/// Raw chain configuration as served by the node, keyed by constant name.
///
/// Values are kept as JSON so that the day resolver decides what counts as well-formed.
pub type ChainConfig = HashMap<String, serde_json::Value>;

/// Balances keyed by validator index.
pub type ValidatorBalances = HashMap<ValidatorIndex, Gwei>;

#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("HTTP error {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid beacon node url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("{url} returned {status}: {body}")]
    Status { url: Url, status: reqwest::StatusCode, body: String },

    #[error("{url} not found")]
    NotFound { url: Url },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: serde_json::Error,
    },

    #[error("beacon node unavailable: {0}")]
    Unavailable(String),
}

/// A validator as listed in a beacon state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorEntry {
    pub index: ValidatorIndex,
    pub pubkey: BlsPubkey,
    pub effective_balance: Gwei,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    /// Actual balance at the queried state.
    pub balance: Gwei,
}

/// A deposit included in a block body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub pubkey: BlsPubkey,
    pub amount: Gwei,
}

/// A withdrawal swept from a validator's balance by the execution payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub validator_index: ValidatorIndex,
    pub amount: Gwei,
}

/// Execution-layer payload carried by post-merge blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPayload {
    /// EIP-2718 encoded transactions, opaque to the beacon node.
    pub transactions: Vec<Bytes>,
    /// Balance sweeps, present from capella on.
    pub withdrawals: Vec<Withdrawal>,
}

/// The parts of a signed beacon block the engine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBeaconBlock {
    /// Fork name the node reported for this block, e.g. `"deneb"`.
    pub version: String,
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub deposits: Vec<Deposit>,
    /// Deposits requested by the execution layer (`execution_requests.deposits`), from electra on.
    pub deposit_requests: Vec<Deposit>,
    /// Present whenever the node served one, regardless of version.
    pub execution_payload: Option<ExecutionPayload>,
}

/// Read access to a beacon node.
#[async_trait]
pub trait BeaconApi: Send + Sync {
    /// The node's chain configuration (`/eth/v1/config/spec`).
    async fn chain_config(&self) -> Result<ChainConfig, BeaconError>;

    /// Slot of the latest finalized block header.
    async fn finalized_slot(&self) -> Result<Slot, BeaconError>;

    /// Genesis time in unix seconds.
    async fn genesis_time(&self) -> Result<u64, BeaconError>;

    /// Every validator in the state at `slot`.
    async fn validators(&self, slot: Slot) -> Result<Vec<ValidatorEntry>, BeaconError>;

    /// Every validator balance in the state at `slot`.
    async fn validator_balances(&self, slot: Slot) -> Result<ValidatorBalances, BeaconError>;

    /// The block proposed at `slot`, or `None` if the slot was missed.
    async fn block(&self, slot: Slot) -> Result<Option<SignedBeaconBlock>, BeaconError>;
}
