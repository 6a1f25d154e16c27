// Copyright 2025 itscheems
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

//! Snapshot refresh command
//!
//! Recomputes the lot-status payload and publishes it to the cache and the
//! durable snapshot. Meant to run from a scheduler or after bulk edits.
//!
//! Usage: `lotmap-refresh [--silent] [--watch]`
//!
//! - `--silent`: print nothing on success
//! - `--watch`: keep refreshing every `refresh.interval_secs` until Ctrl-C
//!
//! When `refresh.gateway_url` is configured the command asks that gateway to
//! refresh, so the running process's cache is updated too.

use std::{process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Parser;
use lotmap_sdk::{Client, RefreshSummary};
use tokio::signal;
use tracing::{error, info};

use lotmap_snapshot::{
	CachePolicy, FileSnapshotStore, LotmapConfig, MokaLotStatusCache, PgLotStatusSource,
	SnapshotRefresher, logging::init_logging,
};

const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(300);

/// Recompute the lot-status snapshot and publish it
#[derive(Debug, Parser)]
#[command(name = "lotmap-refresh")]
#[command(version)]
struct RefreshArgs {
	/// Print nothing on success
	#[arg(short, long)]
	silent: bool,

	/// Refresh every `refresh.interval_secs` until interrupted
	#[arg(short, long)]
	watch: bool,
}

/// Where a refresh is carried out
enum Refresh {
	/// Query the database from this process
	Local(SnapshotRefresher),
	/// Ask a running gateway to refresh
	Remote(Client),
}

impl Refresh {
	fn from_config(config: &LotmapConfig) -> Result<Self> {
		if let Some(url) = config.refresh.gateway_url.as_deref().filter(|u| !u.is_empty()) {
			info!(target: "refresh", gateway = %url, "Refreshing through gateway");
			let client = Client::new(url).context("Failed to create gateway client")?;
			return Ok(Refresh::Remote(client));
		}

		let source =
			PgLotStatusSource::connect_lazy(&config.database).context("Failed to configure database")?;
		let cache = MokaLotStatusCache::new(CachePolicy::from_ttl(config.cache.ttl()));
		let store = FileSnapshotStore::new(config.snapshot.path.clone());
		info!(
			target: "refresh",
			snapshot = %store.path().display(),
			"Refreshing from database"
		);

		Ok(Refresh::Local(SnapshotRefresher::new(
			Arc::new(source),
			Arc::new(cache),
			Arc::new(store),
		)))
	}

	async fn run_once(&self) -> Result<RefreshSummary> {
		match self {
			Refresh::Local(refresher) => {
				let published = refresher.refresh().await?;
				if !published.persisted {
					bail!("Durable snapshot was not written");
				}
				Ok(RefreshSummary::from(published.payload.as_ref()))
			}
			Refresh::Remote(client) => client
				.refresh()
				.await
				.context("Gateway refresh failed"),
		}
	}
}

fn report(summary: &RefreshSummary, silent: bool) {
	if !silent {
		println!("Snapshot updated: {}", summary.updated_at.to_rfc3339());
	}
}

async fn watch(refresh: &Refresh, interval: Duration, silent: bool) -> Result<()> {
	let mut ticker = tokio::time::interval(interval);
	ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			_ = ticker.tick() => {
				match refresh.run_once().await {
					Ok(summary) => report(&summary, silent),
					// Keep watching; the next tick may succeed
					Err(e) => error!(target: "refresh", error = %e, "Refresh failed"),
				}
			}
			_ = signal::ctrl_c() => {
				info!(target: "refresh", "Interrupted, stopping");
				return Ok(());
			}
		}
	}
}

async fn run(args: RefreshArgs) -> Result<()> {
	let config = LotmapConfig::load().context("Failed to load configuration")?;
	let refresh = Refresh::from_config(&config)?;

	if args.watch {
		let interval = config.refresh.interval().unwrap_or(DEFAULT_WATCH_INTERVAL);
		info!(target: "refresh", interval_secs = interval.as_secs(), "Watching");
		return watch(&refresh, interval, args.silent).await;
	}

	let summary = refresh.run_once().await?;
	info!(
		target: "refresh",
		records = summary.count,
		updated_at = %summary.updated_at,
		"Refresh complete"
	);
	report(&summary, args.silent);
	Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
	let args = RefreshArgs::parse();

	if let Err(e) = init_logging("refresh") {
		eprintln!("Failed to initialize logging: {e:#}");
		return ExitCode::FAILURE;
	}

	match run(args).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!(target: "refresh", error = %format!("{e:#}"), "Refresh command failed");
			eprintln!("Refresh failed: {e:#}");
			ExitCode::FAILURE
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_no_args() {
		let args = RefreshArgs::try_parse_from(["lotmap-refresh"]).unwrap();
		assert!(!args.silent);
		assert!(!args.watch);
	}

	#[test]
	fn test_parse_flags() {
		let args = RefreshArgs::try_parse_from(["lotmap-refresh", "--silent", "--watch"]).unwrap();
		assert!(args.silent);
		assert!(args.watch);

		let args = RefreshArgs::try_parse_from(["lotmap-refresh", "-s"]).unwrap();
		assert!(args.silent);
		assert!(!args.watch);
	}

	#[test]
	fn test_parse_rejects_unknown() {
		let err = RefreshArgs::try_parse_from(["lotmap-refresh", "--force"]).unwrap_err();
		assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
	}

	#[test]
	fn test_args_definition() {
		use clap::CommandFactory;
		RefreshArgs::command().debug_assert();
	}
}
