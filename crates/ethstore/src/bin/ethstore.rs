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

use std::{collections::HashMap, num::ParseIntError, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use ethstore::{calculate, EthStoreConfig};
use tracing_subscriber::filter::LevelFilter;
use url::Url;

/// Compute the staking APR of beacon chain validators for one day.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct EthStoreArgs {
    /// URL of the beacon node REST API.
    #[clap(short, long, env = "BEACON_URL")]
    beacon_url: Url,

    /// Day to compute, counted from genesis, or "finalized"/"latest" for the last fully
    /// finalized day.
    #[clap(short, long, env = "ETHSTORE_DAY", default_value = "finalized")]
    day: String,

    /// Named validator set, as NAME=INDEX[,INDEX...]. May be repeated.
    #[clap(long = "validator-set", value_parser = parse_validator_set)]
    validator_sets: Vec<(String, Vec<u64>)>,

    /// JSON file mapping validator set names to lists of validator indices.
    #[clap(long)]
    validator_sets_file: Option<PathBuf>,

    /// Beacon API request timeout in seconds.
    #[clap(long, env = "ETHSTORE_API_TIMEOUT", default_value = "120", value_parser = |arg: &str| -> Result<Duration, ParseIntError> {Ok(Duration::from_secs(arg.parse()?))})]
    api_timeout: Duration,

    /// Maximum number of concurrent block requests.
    #[clap(long, default_value = "10")]
    concurrency: usize,

    /// Increase diagnostic output. May be repeated.
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false)]
    log_json: bool,

    /// Pretty-print the result.
    #[clap(long, default_value_t = false)]
    pretty: bool,
}

fn parse_validator_set(arg: &str) -> Result<(String, Vec<u64>)> {
    let Some((name, indices)) = arg.split_once('=') else {
        bail!("expected NAME=INDEX[,INDEX...], got {arg:?}");
    };
    if name.is_empty() {
        bail!("validator set name must not be empty");
    }
    let indices = indices
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().with_context(|| format!("invalid validator index {s:?}")))
        .collect::<Result<Vec<_>>>()?;
    Ok((name.to_string(), indices))
}

impl EthStoreArgs {
    fn validator_sets(&self) -> Result<HashMap<String, Vec<u64>>> {
        let mut sets: HashMap<String, Vec<u64>> = match &self.validator_sets_file {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&contents).with_context(|| {
                    format!("failed to parse validator sets in {}", path.display())
                })?
            }
            None => HashMap::new(),
        };
        for (name, indices) in &self.validator_sets {
            sets.entry(name.clone()).or_default().extend(indices);
        }
        Ok(sets)
    }

    fn config(&self) -> EthStoreConfig {
        EthStoreConfig::default()
            .with_api_timeout(self.api_timeout)
            .with_max_concurrent_requests(self.concurrency)
            .with_debug_level(u64::from(self.verbose))
    }

    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = EthStoreArgs::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(args.log_level().into())
        .from_env_lossy();

    if args.log_json {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let validator_sets = args.validator_sets()?;
    let config = args.config();

    tracing::info!("Calculating day {} from {}", args.day, args.beacon_url);
    let result = calculate(args.beacon_url.as_str(), &args.day, &validator_sets, &config)
        .await
        .with_context(|| format!("failed to calculate day {}", args.day))?;

    match result.apr {
        Some(apr) => {
            tracing::info!("Day {}: APR {} over {} validators", result.day, apr, result.validators)
        }
        None => tracing::warn!("Day {}: no eligible validators", result.day),
    }

    let output = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");

    Ok(())
}
