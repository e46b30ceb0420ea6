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

//! Execution-layer transaction fee extraction.

use alloy::{
    consensus::{Transaction, TxEnvelope},
    eips::eip2718::{Decodable2718, Eip2718Error},
    primitives::U256,
};

/// Fee-relevant fields of a decoded transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxFee {
    /// Gas price for legacy and access-list transactions, the fee cap for dynamic-fee ones.
    pub gas_price: u128,
    /// Gas limit of the transaction. Block bodies carry no receipts, so this stands in for the
    /// gas actually consumed.
    pub gas_used: u64,
}

impl TxFee {
    /// `gas_price * gas_used`, in wei.
    pub fn fee(&self) -> U256 {
        U256::from(self.gas_price) * U256::from(self.gas_used)
    }
}

/// Decode an EIP-2718 encoded transaction as found in an execution payload.
pub fn decode_transaction(mut raw: &[u8]) -> Result<TxFee, Eip2718Error> {
    let tx = TxEnvelope::decode_2718(&mut raw)?;
    Ok(TxFee { gas_price: tx.max_fee_per_gas(), gas_used: tx.gas_limit() })
}
