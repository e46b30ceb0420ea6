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

//! Units and identifiers shared across the engine.

use alloy::primitives::FixedBytes;

/// Beacon chain slot number.
pub type Slot = u64;

/// Beacon chain epoch number.
pub type Epoch = u64;

/// Index of a validator in the beacon state registry.
pub type ValidatorIndex = u64;

/// Consensus-layer balance amount, denominated in gwei.
pub type Gwei = u64;

/// 48-byte BLS public key identifying a validator.
pub type BlsPubkey = FixedBytes<48>;

/// Number of wei in one gwei. Balances are tracked in gwei, execution fees in wei.
pub const GWEI_TO_WEI: u64 = 1_000_000_000;

/// Seconds in a calendar day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Days used to annualize a daily reward rate.
pub const DAYS_PER_YEAR: u64 = 365;
