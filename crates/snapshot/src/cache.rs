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

//! Volatile cache for the current lot-status payload
//!
//! The whole feed is cached under one well-known key. Two expiry modes are
//! supported and chosen by configuration:
//!
//! - **Expiring**: entries live for a fixed TTL, forcing periodic recomputation
//! - **Explicit**: entries live until replaced or invalidated, typically by a
//!   scheduled refresh

use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use async_trait::async_trait;
use lotmap_sdk::SnapshotPayload;
use moka::{Expiry, sync::Cache};

/// Key under which the whole payload is cached
pub const CACHE_KEY: &str = "lotes:status";

/// Expiry mode of cached payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
	Expiring(Duration),
	Explicit,
}

impl CachePolicy {
	pub fn from_ttl(ttl: Option<Duration>) -> Self {
		match ttl {
			Some(ttl) => CachePolicy::Expiring(ttl),
			None => CachePolicy::Explicit,
		}
	}

	fn default_ttl(&self) -> Option<Duration> {
		match self {
			CachePolicy::Expiring(ttl) => Some(*ttl),
			CachePolicy::Explicit => None,
		}
	}
}

/// Cache holding the last computed lot-status payload
///
/// Injected into the read path so the in-memory implementation can be
/// swapped for a shared one.
#[async_trait]
pub trait LotStatusCache: Send + Sync {
	/// Current payload, or `None` on miss
	async fn get(&self) -> Option<Arc<SnapshotPayload>>;

	/// Store a payload; `ttl` overrides the configured policy for this entry
	async fn set(&self, payload: Arc<SnapshotPayload>, ttl: Option<Duration>);

	/// Drop the cached payload
	async fn invalidate(&self);
}

#[derive(Clone)]
struct CachedPayload {
	payload: Arc<SnapshotPayload>,
	ttl: Option<Duration>,
}

/// Per-entry expiry: each insert carries its own lifetime
struct PayloadExpiry;

impl Expiry<&'static str, CachedPayload> for PayloadExpiry {
	fn expire_after_create(
		&self,
		_key: &&'static str,
		value: &CachedPayload,
		_created_at: Instant,
	) -> Option<Duration> {
		value.ttl
	}

	fn expire_after_update(
		&self,
		_key: &&'static str,
		value: &CachedPayload,
		_updated_at: Instant,
		_duration_until_expiry: Option<Duration>,
	) -> Option<Duration> {
		value.ttl
	}
}

/// In-process cache built on `moka::sync::Cache`
pub struct MokaLotStatusCache {
	cache: Cache<&'static str, CachedPayload>,
	policy: CachePolicy,
}

impl MokaLotStatusCache {
	pub fn new(policy: CachePolicy) -> Self {
		let cache = Cache::builder().expire_after(PayloadExpiry).build();

		Self { cache, policy }
	}

	pub fn policy(&self) -> CachePolicy {
		self.policy
	}
}

#[async_trait]
impl LotStatusCache for MokaLotStatusCache {
	async fn get(&self) -> Option<Arc<SnapshotPayload>> {
		self.cache.get(&CACHE_KEY).map(|entry| entry.payload)
	}

	async fn set(&self, payload: Arc<SnapshotPayload>, ttl: Option<Duration>) {
		let ttl = ttl.or(self.policy.default_ttl());
		self.cache.insert(CACHE_KEY, CachedPayload { payload, ttl });
	}

	async fn invalidate(&self) {
		self.cache.invalidate(&CACHE_KEY);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn payload() -> Arc<SnapshotPayload> {
		Arc::new(SnapshotPayload::new(vec![]))
	}

	#[tokio::test]
	async fn test_cold_cache_misses() {
		let cache = MokaLotStatusCache::new(CachePolicy::Explicit);
		assert!(cache.get().await.is_none());
	}

	#[tokio::test]
	async fn test_set_then_get_returns_same_payload() {
		let cache = MokaLotStatusCache::new(CachePolicy::Explicit);
		let payload = payload();

		cache.set(payload.clone(), None).await;

		let cached = cache.get().await.unwrap();
		assert!(Arc::ptr_eq(&cached, &payload));
	}

	#[tokio::test]
	async fn test_invalidate_clears_entry() {
		let cache = MokaLotStatusCache::new(CachePolicy::Explicit);
		cache.set(payload(), None).await;

		cache.invalidate().await;

		assert!(cache.get().await.is_none());
	}

	#[tokio::test]
	async fn test_expiring_policy_drops_entry() {
		let cache = MokaLotStatusCache::new(CachePolicy::Expiring(Duration::from_millis(50)));
		cache.set(payload(), None).await;
		assert!(cache.get().await.is_some());

		std::thread::sleep(Duration::from_millis(150));

		assert!(cache.get().await.is_none());
	}

	#[tokio::test]
	async fn test_per_entry_ttl_overrides_explicit_policy() {
		let cache = MokaLotStatusCache::new(CachePolicy::Explicit);
		cache.set(payload(), Some(Duration::from_millis(50))).await;

		std::thread::sleep(Duration::from_millis(150));

		assert!(cache.get().await.is_none());
	}

	#[tokio::test]
	async fn test_replacing_entry_resets_ttl() {
		let cache = MokaLotStatusCache::new(CachePolicy::Expiring(Duration::from_millis(50)));
		cache.set(payload(), Some(Duration::from_secs(60))).await;
		cache.set(payload(), None).await;

		std::thread::sleep(Duration::from_millis(150));

		assert!(cache.get().await.is_none());
	}

	#[test]
	fn test_policy_from_ttl() {
		assert_eq!(CachePolicy::from_ttl(None), CachePolicy::Explicit);
		assert_eq!(
			CachePolicy::from_ttl(Some(Duration::from_secs(300))),
			CachePolicy::Expiring(Duration::from_secs(300))
		);
	}
}
