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

//! [BeaconApi] over the standard beacon node REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::{
    wire::{
        BalanceResponse, BlockHeader, BlockResponse, DataEnvelope, Genesis, ValidatorResponse,
    },
    BeaconApi, BeaconError, ChainConfig, SignedBeaconBlock, ValidatorBalances, ValidatorEntry,
};
use crate::{config::EthStoreConfig, types::Slot};

/// HTTP client for a beacon node.
///
/// Requests are not retried; a failed request fails the caller.
#[derive(Debug, Clone)]
pub struct BeaconClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BeaconClient {
    /// Create a client for the node at `base_url`, applying `timeout` to every request.
    pub fn new(mut base_url: Url, timeout: Duration) -> Result<Self, BeaconError> {
        // Url::join replaces the last path segment unless the base ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Create a client from an address string and the engine configuration.
    pub fn from_config(address: &str, config: &EthStoreConfig) -> Result<Self, BeaconError> {
        Self::new(Url::parse(address)?, config.api_timeout)
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET `path` and decode the `data` envelope. A 404 yields `Ok(None)`.
    async fn get_optional<T>(&self, path: &str) -> Result<Option<T>, BeaconError>
    where
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        tracing::trace!("GET {url}");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = response.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            return Err(BeaconError::Status { url, status, body });
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| BeaconError::Decode { url, source })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BeaconError> {
        match self.get_optional(path).await? {
            Some(value) => Ok(value),
            None => Err(BeaconError::NotFound { url: self.base_url.join(path)? }),
        }
    }
}

#[async_trait]
impl BeaconApi for BeaconClient {
    async fn chain_config(&self) -> Result<ChainConfig, BeaconError> {
        let envelope: DataEnvelope<ChainConfig> = self.get("eth/v1/config/spec").await?;
        Ok(envelope.data)
    }

    async fn finalized_slot(&self) -> Result<Slot, BeaconError> {
        let envelope: DataEnvelope<BlockHeader> =
            self.get("eth/v1/beacon/headers/finalized").await?;
        Ok(envelope.data.header.message.slot)
    }

    async fn genesis_time(&self) -> Result<u64, BeaconError> {
        let envelope: DataEnvelope<Genesis> = self.get("eth/v1/beacon/genesis").await?;
        Ok(envelope.data.genesis_time)
    }

    async fn validators(&self, slot: Slot) -> Result<Vec<ValidatorEntry>, BeaconError> {
        let envelope: DataEnvelope<Vec<ValidatorResponse>> =
            self.get(&format!("eth/v1/beacon/states/{slot}/validators")).await?;
        Ok(envelope.data.into_iter().map(ValidatorEntry::from).collect())
    }

    async fn validator_balances(&self, slot: Slot) -> Result<ValidatorBalances, BeaconError> {
        let envelope: DataEnvelope<Vec<BalanceResponse>> =
            self.get(&format!("eth/v1/beacon/states/{slot}/validator_balances")).await?;
        Ok(envelope.data.into_iter().map(|b| (b.index, b.balance)).collect())
    }

    async fn block(&self, slot: Slot) -> Result<Option<SignedBeaconBlock>, BeaconError> {
        let block: Option<BlockResponse> =
            self.get_optional(&format!("eth/v2/beacon/blocks/{slot}")).await?;
        Ok(block.map(SignedBeaconBlock::from))
    }
}
