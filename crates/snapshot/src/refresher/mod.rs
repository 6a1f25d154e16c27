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

pub mod scheduler;

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use lotmap_sdk::SnapshotPayload;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
	cache::LotStatusCache,
	source::{LotStatusSource, SourceError},
	store::SnapshotStore,
};
pub use scheduler::{RefreshScheduler, RefreshSchedulerConfig};

/// Error types for refresh operations
#[derive(Debug, Error)]
pub enum RefreshError {
	#[error("Failed to read lot status: {0}")]
	Source(#[from] SourceError),
}

/// Result of publishing a payload
#[derive(Debug, Clone)]
pub struct Published {
	pub payload: Arc<SnapshotPayload>,
	/// Whether the durable snapshot was written
	pub persisted: bool,
}

/// Snapshot Refresh Orchestrator
///
/// The only writer of the volatile cache and the durable snapshot store.
/// Each refresh reads the source once and publishes a complete payload, so
/// concurrent refreshes only duplicate work; the last publish wins.
///
/// `updated_at` is kept at millisecond precision and strictly increases
/// across publishes from this process, so entity tags derived from it
/// change with every refresh.
pub struct SnapshotRefresher {
	source: Arc<dyn LotStatusSource>,
	cache: Arc<dyn LotStatusCache>,
	store: Arc<dyn SnapshotStore>,
	last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl SnapshotRefresher {
	pub fn new(
		source: Arc<dyn LotStatusSource>,
		cache: Arc<dyn LotStatusCache>,
		store: Arc<dyn SnapshotStore>,
	) -> Self {
		Self {
			source,
			cache,
			store,
			last_stamp: Mutex::new(None),
		}
	}

	pub fn source(&self) -> &Arc<dyn LotStatusSource> {
		&self.source
	}

	pub fn cache(&self) -> &Arc<dyn LotStatusCache> {
		&self.cache
	}

	pub fn store(&self) -> &Arc<dyn SnapshotStore> {
		&self.store
	}

	/// Recompute the payload from the source and publish it
	pub async fn refresh(&self) -> Result<Published, RefreshError> {
		let start = std::time::Instant::now();
		let payload = self.source.fetch_current_status().await.inspect_err(|e| {
			error!(target: "refresher", error = %e, "Refresh failed to read source");
		})?;

		let published = self.publish(payload).await;
		info!(
			target: "refresher",
			records = published.payload.len(),
			updated_at = %published.payload.updated_at,
			persisted = published.persisted,
			total_ms = start.elapsed().as_millis(),
			"Snapshot refreshed"
		);
		Ok(published)
	}

	/// Write a freshly fetched payload to the cache and the durable store
	///
	/// A durable write failure is logged and reported through
	/// `Published::persisted`; it never fails the publish.
	pub async fn publish(&self, payload: SnapshotPayload) -> Published {
		let payload = Arc::new(self.stamp(payload));

		self.cache.set(payload.clone(), None).await;

		let store = self.store.clone();
		let to_write = payload.clone();
		let persisted = match tokio::task::spawn_blocking(move || store.write(&to_write)).await {
			Ok(Ok(())) => {
				debug!(target: "refresher", updated_at = %payload.updated_at, "Durable snapshot updated");
				true
			}
			Ok(Err(e)) => {
				error!(target: "refresher", error = %e, "Failed to write durable snapshot");
				false
			}
			Err(e) => {
				error!(target: "refresher", error = %e, "Durable snapshot writer panicked");
				false
			}
		};

		Published { payload, persisted }
	}

	fn stamp(&self, mut payload: SnapshotPayload) -> SnapshotPayload {
		let mut last = self
			.last_stamp
			.lock()
			.unwrap_or_else(PoisonError::into_inner);

		let mut stamp = truncate_to_millis(payload.updated_at);
		if let Some(previous) = *last
			&& stamp <= previous
		{
			stamp = previous + TimeDelta::milliseconds(1);
		}

		*last = Some(stamp);
		payload.updated_at = stamp;
		payload
	}
}

fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
	DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		cache::{CachePolicy, MokaLotStatusCache},
		store::{MemorySnapshotStore, StoreError},
	};
	use async_trait::async_trait;
	use lotmap_sdk::LotStatusRecord;

	struct FixedSource {
		result: Result<SnapshotPayload, SourceError>,
	}

	#[async_trait]
	impl LotStatusSource for FixedSource {
		async fn fetch_current_status(&self) -> Result<SnapshotPayload, SourceError> {
			self.result.clone()
		}
	}

	struct FailingStore;

	impl SnapshotStore for FailingStore {
		fn write(&self, _payload: &SnapshotPayload) -> Result<(), StoreError> {
			Err(StoreError::Io(std::io::Error::other("disk full")))
		}

		fn read(&self) -> Option<SnapshotPayload> {
			None
		}
	}

	fn lot(code: &str) -> LotStatusRecord {
		LotStatusRecord {
			code: code.to_string(),
			block: "C".to_string(),
			lot_number: "3".to_string(),
			state_id: 1,
			state_name: "Disponible".to_string(),
			area: 90.0,
			perimeter: 38.0,
			price: None,
			description: None,
		}
	}

	fn refresher(
		result: Result<SnapshotPayload, SourceError>,
		store: Arc<dyn SnapshotStore>,
	) -> (SnapshotRefresher, Arc<MokaLotStatusCache>) {
		let cache = Arc::new(MokaLotStatusCache::new(CachePolicy::Explicit));
		let refresher = SnapshotRefresher::new(Arc::new(FixedSource { result }), cache.clone(), store);
		(refresher, cache)
	}

	#[tokio::test]
	async fn test_refresh_populates_cache_and_store() {
		let store = Arc::new(MemorySnapshotStore::new());
		let (refresher, cache) = refresher(Ok(SnapshotPayload::new(vec![lot("a-01")])), store.clone());

		let published = refresher.refresh().await.unwrap();

		assert!(published.persisted);
		assert_eq!(cache.get().await.unwrap().as_ref(), published.payload.as_ref());
		assert_eq!(store.read().as_ref(), Some(published.payload.as_ref()));
	}

	#[tokio::test]
	async fn test_refresh_source_failure_leaves_state_untouched() {
		let store = Arc::new(MemorySnapshotStore::new());
		let (refresher, cache) = refresher(Err(SourceError::Transient("timeout".into())), store.clone());

		let result = refresher.refresh().await;

		assert!(matches!(result, Err(RefreshError::Source(_))));
		assert!(cache.get().await.is_none());
		assert!(store.read().is_none());
	}

	#[tokio::test]
	async fn test_store_failure_is_swallowed() {
		let (refresher, cache) = refresher(Ok(SnapshotPayload::new(vec![lot("a-01")])), Arc::new(FailingStore));

		let published = refresher.refresh().await.unwrap();

		assert!(!published.persisted);
		assert!(cache.get().await.is_some());
	}

	#[tokio::test]
	async fn test_updated_at_strictly_increases() {
		let fixed = Utc::now();
		let (refresher, _cache) = refresher(
			Ok(SnapshotPayload::with_updated_at(vec![lot("a-01")], fixed)),
			Arc::new(MemorySnapshotStore::new()),
		);

		let first = refresher.refresh().await.unwrap();
		let second = refresher.refresh().await.unwrap();

		assert!(second.payload.updated_at > first.payload.updated_at);
		assert_eq!(
			second.payload.updated_at.timestamp_millis(),
			first.payload.updated_at.timestamp_millis() + 1
		);
	}
}
