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

//! Test utilities for ethstore.
//!
//! Provides a mock beacon node serving the REST endpoints the engine reads, and helpers to build
//! the raw transactions found in execution payloads.

pub mod beacon_mock;
pub mod transactions;

pub use beacon_mock::{BeaconMockServer, MockBlock, MockValidator};
pub use transactions::{dynamic_fee_tx, legacy_tx, mock_pubkey};
