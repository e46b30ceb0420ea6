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

//! Mock beacon node serving the subset of the beacon REST API read by the engine.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
};

use alloy::primitives::{Bytes, FixedBytes};
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, Request, ResponseTemplate,
};

use crate::transactions::mock_pubkey;

/// Validator record as listed by `states/{slot}/validators`.
#[derive(Debug, Clone)]
pub struct MockValidator {
    pub index: u64,
    pub pubkey: FixedBytes<48>,
    pub effective_balance: u64,
    pub activation_epoch: u64,
    pub exit_epoch: u64,
    pub balance: u64,
}

impl MockValidator {
    /// Validator with a pubkey derived from its index.
    pub fn new(
        index: u64,
        activation_epoch: u64,
        exit_epoch: u64,
        effective_balance: u64,
        balance: u64,
    ) -> Self {
        Self {
            index,
            pubkey: mock_pubkey(index),
            effective_balance,
            activation_epoch,
            exit_epoch,
            balance,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "index": self.index.to_string(),
            "balance": self.balance.to_string(),
            "status": "active_ongoing",
            "validator": {
                "pubkey": self.pubkey.to_string(),
                "effective_balance": self.effective_balance.to_string(),
                "activation_epoch": self.activation_epoch.to_string(),
                "exit_epoch": self.exit_epoch.to_string(),
            }
        })
    }
}

/// Signed block as served by `eth/v2/beacon/blocks/{slot}`.
#[derive(Debug, Clone)]
pub struct MockBlock {
    pub version: String,
    pub proposer_index: u64,
    pub deposits: Vec<(FixedBytes<48>, u64)>,
    /// `None` omits the execution payload from the body.
    pub transactions: Option<Vec<Bytes>>,
    /// `(validator_index, amount)` sweeps listed in the execution payload.
    pub withdrawals: Vec<(u64, u64)>,
    /// Served as `execution_requests.deposits`.
    pub deposit_requests: Vec<(FixedBytes<48>, u64)>,
}

impl MockBlock {
    /// Block of the given fork with an empty execution payload.
    pub fn new(version: impl Into<String>, proposer_index: u64) -> Self {
        Self {
            version: version.into(),
            proposer_index,
            deposits: Vec::new(),
            transactions: Some(Vec::new()),
            withdrawals: Vec::new(),
            deposit_requests: Vec::new(),
        }
    }

    pub fn with_deposit(mut self, pubkey: FixedBytes<48>, amount: u64) -> Self {
        self.deposits.push((pubkey, amount));
        self
    }

    pub fn with_transaction(mut self, raw: Bytes) -> Self {
        self.transactions.get_or_insert_with(Vec::new).push(raw);
        self
    }

    pub fn with_withdrawal(mut self, validator_index: u64, amount: u64) -> Self {
        self.withdrawals.push((validator_index, amount));
        self
    }

    pub fn with_deposit_request(mut self, pubkey: FixedBytes<48>, amount: u64) -> Self {
        self.deposit_requests.push((pubkey, amount));
        self
    }

    pub fn without_execution_payload(mut self) -> Self {
        self.transactions = None;
        self
    }

    fn to_json(&self, slot: u64) -> Value {
        let deposits: Vec<Value> = self
            .deposits
            .iter()
            .map(|(pubkey, amount)| {
                json!({
                    "proof": [],
                    "data": {
                        "pubkey": pubkey.to_string(),
                        "withdrawal_credentials": format!("0x{}", "00".repeat(32)),
                        "amount": amount.to_string(),
                        "signature": format!("0x{}", "00".repeat(96)),
                    }
                })
            })
            .collect();

        let mut body = json!({ "deposits": deposits });
        if let Some(transactions) = &self.transactions {
            let transactions: Vec<String> = transactions.iter().map(|tx| tx.to_string()).collect();
            let withdrawals: Vec<Value> = self
                .withdrawals
                .iter()
                .enumerate()
                .map(|(i, (validator_index, amount))| {
                    json!({
                        "index": i.to_string(),
                        "validator_index": validator_index.to_string(),
                        "address": format!("0x{}", "00".repeat(20)),
                        "amount": amount.to_string(),
                    })
                })
                .collect();
            body["execution_payload"] =
                json!({ "transactions": transactions, "withdrawals": withdrawals });
        }
        let has_requests = matches!(self.version.as_str(), "electra" | "fulu");
        if has_requests || !self.deposit_requests.is_empty() {
            let requests: Vec<Value> = self
                .deposit_requests
                .iter()
                .enumerate()
                .map(|(i, (pubkey, amount))| {
                    json!({
                        "pubkey": pubkey.to_string(),
                        "withdrawal_credentials": format!("0x{}", "00".repeat(32)),
                        "amount": amount.to_string(),
                        "signature": format!("0x{}", "00".repeat(96)),
                        "index": i.to_string(),
                    })
                })
                .collect();
            body["execution_requests"] =
                json!({ "deposits": requests, "withdrawals": [], "consolidations": [] });
        }

        json!({
            "version": self.version,
            "execution_optimistic": false,
            "finalized": true,
            "data": {
                "message": {
                    "slot": slot.to_string(),
                    "proposer_index": self.proposer_index.to_string(),
                    "body": body,
                }
            }
        })
    }
}

#[derive(Debug, Default)]
struct BeaconState {
    spec: BTreeMap<String, Value>,
    genesis_time: u64,
    finalized_slot: u64,
    /// Validator listings keyed by state slot.
    validators: HashMap<u64, Vec<MockValidator>>,
    /// Balance listings keyed by state slot.
    balances: HashMap<u64, Vec<(u64, u64)>>,
    blocks: HashMap<u64, MockBlock>,
    failing_slots: HashSet<u64>,
}

/// Mock beacon node answering the config, genesis, header, state and block endpoints.
///
/// Unknown states answer 404. Slots without a block answer 404 like a missed proposal.
pub struct BeaconMockServer {
    server: MockServer,
    state: Arc<Mutex<BeaconState>>,
}

impl BeaconMockServer {
    /// Start a mock node with the given chain parameters and a genesis time of zero.
    pub async fn new(slots_per_epoch: u64, seconds_per_slot: u64) -> Self {
        let server = MockServer::start().await;
        let mut state = BeaconState::default();
        state.spec.insert("SLOTS_PER_EPOCH".into(), json!(slots_per_epoch.to_string()));
        state.spec.insert("SECONDS_PER_SLOT".into(), json!(seconds_per_slot.to_string()));

        let mock_server = Self { server, state: Arc::new(Mutex::new(state)) };
        mock_server.setup_mocks().await;
        mock_server
    }

    /// Get the base URL of the mock server
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Set a raw value in the chain config served by `eth/v1/config/spec`.
    pub fn set_config_value(&self, key: &str, value: Value) {
        self.state.lock().unwrap().spec.insert(key.to_string(), value);
    }

    pub fn remove_config_value(&self, key: &str) {
        self.state.lock().unwrap().spec.remove(key);
    }

    pub fn set_genesis_time(&self, genesis_time: u64) {
        self.state.lock().unwrap().genesis_time = genesis_time;
    }

    pub fn set_finalized_slot(&self, slot: u64) {
        self.state.lock().unwrap().finalized_slot = slot;
    }

    /// Serve `validators` for the state at `slot`.
    pub fn set_validators(&self, slot: u64, validators: Vec<MockValidator>) {
        self.state.lock().unwrap().validators.insert(slot, validators);
    }

    /// Serve `(index, balance)` pairs for the state at `slot`.
    pub fn set_balances(&self, slot: u64, balances: Vec<(u64, u64)>) {
        self.state.lock().unwrap().balances.insert(slot, balances);
    }

    pub fn add_block(&self, slot: u64, block: MockBlock) {
        tracing::debug!("Mock beacon block at slot {} ({})", slot, block.version);
        self.state.lock().unwrap().blocks.insert(slot, block);
    }

    /// Answer the block request for `slot` with HTTP 500.
    pub fn fail_block(&self, slot: u64) {
        self.state.lock().unwrap().failing_slots.insert(slot);
    }

    /// Slots whose block was requested so far, sorted.
    pub async fn block_requests(&self) -> Vec<u64> {
        let mut slots: Vec<u64> = self
            .server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|req| req.url.path().strip_prefix("/eth/v2/beacon/blocks/"))
            .filter_map(|slot| slot.parse().ok())
            .collect();
        slots.sort_unstable();
        slots
    }

    /// Number of requests of any kind received so far.
    pub async fn request_count(&self) -> usize {
        self.server.received_requests().await.map(|r| r.len()).unwrap_or_default()
    }

    async fn setup_mocks(&self) {
        self.setup_spec_endpoint().await;
        self.setup_genesis_endpoint().await;
        self.setup_finalized_header_endpoint().await;
        self.setup_validators_endpoint().await;
        self.setup_balances_endpoint().await;
        self.setup_block_endpoint().await;
    }

    async fn setup_spec_endpoint(&self) {
        let state = self.state.clone();
        Mock::given(method("GET"))
            .and(path("/eth/v1/config/spec"))
            .respond_with(move |_req: &Request| {
                let spec = state.lock().unwrap().spec.clone();
                ResponseTemplate::new(200).set_body_json(json!({ "data": spec }))
            })
            .mount(&self.server)
            .await;
    }

    async fn setup_genesis_endpoint(&self) {
        let state = self.state.clone();
        Mock::given(method("GET"))
            .and(path("/eth/v1/beacon/genesis"))
            .respond_with(move |_req: &Request| {
                let genesis_time = state.lock().unwrap().genesis_time;
                ResponseTemplate::new(200).set_body_json(json!({
                    "data": {
                        "genesis_time": genesis_time.to_string(),
                        "genesis_validators_root": format!("0x{}", "00".repeat(32)),
                        "genesis_fork_version": "0x00000000",
                    }
                }))
            })
            .mount(&self.server)
            .await;
    }

    async fn setup_finalized_header_endpoint(&self) {
        let state = self.state.clone();
        Mock::given(method("GET"))
            .and(path("/eth/v1/beacon/headers/finalized"))
            .respond_with(move |_req: &Request| {
                let slot = state.lock().unwrap().finalized_slot;
                ResponseTemplate::new(200).set_body_json(json!({
                    "execution_optimistic": false,
                    "finalized": true,
                    "data": {
                        "root": format!("0x{}", "00".repeat(32)),
                        "canonical": true,
                        "header": { "message": { "slot": slot.to_string() } }
                    }
                }))
            })
            .mount(&self.server)
            .await;
    }

    async fn setup_validators_endpoint(&self) {
        let state = self.state.clone();
        Mock::given(method("GET"))
            .and(path_regex(r"^/eth/v1/beacon/states/[0-9]+/validators$"))
            .respond_with(move |req: &Request| {
                let Some(slot) = state_slot(req) else {
                    return ResponseTemplate::new(400);
                };
                match state.lock().unwrap().validators.get(&slot) {
                    Some(validators) => {
                        let data: Vec<Value> =
                            validators.iter().map(MockValidator::to_json).collect();
                        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
                    }
                    None => not_found("State not found"),
                }
            })
            .mount(&self.server)
            .await;
    }

    async fn setup_balances_endpoint(&self) {
        let state = self.state.clone();
        Mock::given(method("GET"))
            .and(path_regex(r"^/eth/v1/beacon/states/[0-9]+/validator_balances$"))
            .respond_with(move |req: &Request| {
                let Some(slot) = state_slot(req) else {
                    return ResponseTemplate::new(400);
                };
                match state.lock().unwrap().balances.get(&slot) {
                    Some(balances) => {
                        let data: Vec<Value> = balances
                            .iter()
                            .map(|(index, balance)| {
                                json!({
                                    "index": index.to_string(),
                                    "balance": balance.to_string(),
                                })
                            })
                            .collect();
                        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
                    }
                    None => not_found("State not found"),
                }
            })
            .mount(&self.server)
            .await;
    }

    async fn setup_block_endpoint(&self) {
        let state = self.state.clone();
        Mock::given(method("GET"))
            .and(path_regex(r"^/eth/v2/beacon/blocks/[0-9]+$"))
            .respond_with(move |req: &Request| {
                let Some(slot) = req
                    .url
                    .path()
                    .strip_prefix("/eth/v2/beacon/blocks/")
                    .and_then(|s| s.parse::<u64>().ok())
                else {
                    return ResponseTemplate::new(400);
                };
                let state = state.lock().unwrap();
                if state.failing_slots.contains(&slot) {
                    return ResponseTemplate::new(500)
                        .set_body_json(json!({ "code": 500, "message": "Internal server error" }));
                }
                match state.blocks.get(&slot) {
                    Some(block) => ResponseTemplate::new(200).set_body_json(block.to_json(slot)),
                    None => not_found("Block not found"),
                }
            })
            .mount(&self.server)
            .await;
    }
}

fn state_slot(req: &Request) -> Option<u64> {
    req.url.path().strip_prefix("/eth/v1/beacon/states/")?.split('/').next()?.parse().ok()
}

fn not_found(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({ "code": 404, "message": message }))
}
