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

//! Raw transaction and key builders.

use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy},
    eips::eip2718::Encodable2718,
    primitives::{Address, Bytes, FixedBytes, Signature, TxKind, U256},
};

fn dummy_signature() -> Signature {
    Signature::new(U256::from(1), U256::from(1), false)
}

/// EIP-2718 bytes of a legacy transaction with the given gas price and gas limit.
pub fn legacy_tx(gas_price: u128, gas_limit: u64) -> Bytes {
    let tx = TxLegacy {
        chain_id: Some(1),
        gas_price,
        gas_limit,
        to: TxKind::Call(Address::ZERO),
        ..Default::default()
    };
    TxEnvelope::from(tx.into_signed(dummy_signature())).encoded_2718().into()
}

/// EIP-2718 bytes of an EIP-1559 transaction with the given fee cap and gas limit.
pub fn dynamic_fee_tx(
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: u128,
    gas_limit: u64,
) -> Bytes {
    let tx = TxEip1559 {
        chain_id: 1,
        gas_limit,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        to: TxKind::Call(Address::ZERO),
        ..Default::default()
    };
    TxEnvelope::from(tx.into_signed(dummy_signature())).encoded_2718().into()
}

/// Deterministic BLS public key for a validator index.
pub fn mock_pubkey(index: u64) -> FixedBytes<48> {
    FixedBytes::left_padding_from(&index.to_be_bytes())
}
