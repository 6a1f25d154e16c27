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

use std::{sync::Arc, time::Duration};

use tokio::{
	sync::watch,
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
use tracing::{info, warn};

use super::SnapshotRefresher;

/// Configuration for the RefreshScheduler
#[derive(Debug, Clone)]
pub struct RefreshSchedulerConfig {
	/// Interval between refreshes
	pub interval: Duration,
}

impl Default for RefreshSchedulerConfig {
	fn default() -> Self {
		Self {
			interval: Duration::from_secs(300), // 5 minutes
		}
	}
}

/// RefreshScheduler - periodically republishes the lot-status snapshot
///
/// Runs as a background tokio task. The first refresh happens immediately,
/// which warms the cache and the durable snapshot at startup; later ones
/// follow the configured interval. A failed refresh is logged and the
/// previous cache entry and snapshot stay in place.
///
/// With an expiry-free cache this is what keeps served data current.
pub struct RefreshScheduler {
	handle: Option<JoinHandle<()>>,
	shutdown: watch::Sender<bool>,
}

impl RefreshScheduler {
	/// Start the scheduler on the current tokio runtime
	pub fn start(refresher: Arc<SnapshotRefresher>, config: RefreshSchedulerConfig) -> Self {
		let (shutdown, mut shutdown_rx) = watch::channel(false);

		let handle = tokio::spawn(async move {
			info!(
				target: "refresher",
				interval_secs = config.interval.as_secs(),
				"Refresh scheduler started"
			);

			let mut ticker = time::interval(config.interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = ticker.tick() => {
						// Errors are already logged by the refresher
						let _ = refresher.refresh().await;
					}
					changed = shutdown_rx.changed() => {
						if changed.is_err() || *shutdown_rx.borrow() {
							break;
						}
					}
				}
			}

			info!(target: "refresher", "Refresh scheduler stopped");
		});

		Self {
			handle: Some(handle),
			shutdown,
		}
	}

	/// Stop the scheduler and wait for an in-flight refresh to finish
	pub async fn shutdown(mut self) {
		info!(target: "refresher", "Shutting down refresh scheduler");
		self.shutdown.send_replace(true);

		if let Some(handle) = self.handle.take()
			&& let Err(e) = handle.await
		{
			warn!(target: "refresher", error = %e, "Refresh scheduler task failed");
		}
	}
}

impl Drop for RefreshScheduler {
	fn drop(&mut self) {
		self.shutdown.send_replace(true);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		cache::{CachePolicy, LotStatusCache, MokaLotStatusCache},
		source::{LotStatusSource, SourceError},
		store::MemorySnapshotStore,
	};
	use async_trait::async_trait;
	use lotmap_sdk::SnapshotPayload;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[derive(Default)]
	struct CountingSource {
		calls: AtomicU32,
	}

	#[async_trait]
	impl LotStatusSource for CountingSource {
		async fn fetch_current_status(&self) -> Result<SnapshotPayload, SourceError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(SnapshotPayload::new(vec![]))
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_scheduler_refreshes_on_interval() {
		let source = Arc::new(CountingSource::default());
		let cache = Arc::new(MokaLotStatusCache::new(CachePolicy::Explicit));
		let refresher = Arc::new(SnapshotRefresher::new(
			source.clone(),
			cache.clone(),
			Arc::new(MemorySnapshotStore::new()),
		));

		let scheduler = RefreshScheduler::start(
			refresher,
			RefreshSchedulerConfig {
				interval: Duration::from_secs(60),
			},
		);

		// Immediate first tick
		time::sleep(Duration::from_millis(10)).await;
		assert_eq!(source.calls.load(Ordering::SeqCst), 1);
		assert!(cache.get().await.is_some());

		time::sleep(Duration::from_secs(120)).await;
		assert_eq!(source.calls.load(Ordering::SeqCst), 3);

		scheduler.shutdown().await;

		time::sleep(Duration::from_secs(300)).await;
		assert_eq!(source.calls.load(Ordering::SeqCst), 3);
	}
}
