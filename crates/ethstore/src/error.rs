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

use alloy::eips::eip2718::Eip2718Error;
use thiserror::Error;

use crate::{beacon::BeaconError, types::Slot};

/// Every way a day computation can fail. Any of these aborts the whole day.
#[derive(Error, Debug)]
pub enum EthStoreError {
    #[error("chain config error: {0}")]
    Config(String),

    #[error("invalid day {input:?}: {reason}")]
    Validation { input: String, reason: String },

    #[error("beacon node request failed: {0}")]
    Fetch(#[from] BeaconError),

    #[error("unknown block version for block {slot}: {version}")]
    Format { slot: Slot, version: String },

    #[error("failed to decode transaction {tx_index} in block {slot}: {source}")]
    Decode {
        slot: Slot,
        tx_index: usize,
        #[source]
        source: Eip2718Error,
    },

    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("block scan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

pub type Result<T, E = EthStoreError> = std::result::Result<T, E>;
