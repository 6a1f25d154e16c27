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

//! Lot-status read path
//!
//! Every read walks a fixed chain and stops at the first usable payload:
//!
//! 1. Volatile cache
//! 2. Source, retried on transient failures up to the retry bound
//! 3. Durable snapshot (if fallback is enabled)
//!
//! A fresh source read is published through the refresher before it is
//! returned. Only when all three fail does the caller see an error.

use std::{sync::Arc, time::Duration};

use lotmap_sdk::{DataSource, ReadMode, SnapshotPayload};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
	config::{ReadConfig, RetryConfig},
	refresher::SnapshotRefresher,
	source::{FetchOutcome, SourceError},
};

/// Error types for the read path
#[derive(Debug, Error)]
pub enum ReadError {
	#[error("Lot status unavailable after {attempts} source attempt(s)")]
	Unavailable { attempts: u32 },
}

/// Bounded retry of transient source failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts, including the first; never less than 1
	pub max_attempts: u32,
	/// Pause between attempts
	pub delay: Duration,
}

impl RetryPolicy {
	pub fn new(max_attempts: u32, delay: Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			delay,
		}
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(3, Duration::from_millis(200))
	}
}

impl From<&RetryConfig> for RetryPolicy {
	fn from(config: &RetryConfig) -> Self {
		Self::new(config.max_attempts, Duration::from_millis(config.delay_ms))
	}
}

/// A payload together with where it came from
#[derive(Debug, Clone)]
pub struct Served {
	pub payload: Arc<SnapshotPayload>,
	pub source: DataSource,
}

struct FetchFailure {
	attempts: u32,
	error: SourceError,
}

/// Status Endpoint core: cache, then source with retry, then snapshot
pub struct LotStatusService {
	refresher: Arc<SnapshotRefresher>,
	retry: RetryPolicy,
	snapshot_fallback: bool,
}

impl LotStatusService {
	pub fn new(refresher: Arc<SnapshotRefresher>, retry: RetryPolicy, snapshot_fallback: bool) -> Self {
		Self {
			refresher,
			retry,
			snapshot_fallback,
		}
	}

	pub fn from_config(
		refresher: Arc<SnapshotRefresher>,
		retry: &RetryConfig,
		read: &ReadConfig,
	) -> Self {
		Self::new(refresher, RetryPolicy::from(retry), read.snapshot_fallback)
	}

	pub fn refresher(&self) -> &Arc<SnapshotRefresher> {
		&self.refresher
	}

	/// Serve the current lot status according to `mode`
	pub async fn read(&self, mode: ReadMode) -> Result<Served, ReadError> {
		match mode {
			ReadMode::Auto => self.read_auto().await,
			ReadMode::Db => self
				.read_source()
				.await
				.map_err(|failure| self.unavailable(failure)),
			ReadMode::Snapshot => self
				.read_snapshot()
				.await
				.ok_or(ReadError::Unavailable { attempts: 0 }),
		}
	}

	/// Single source query with no cache, retry, fallback or write-through
	pub async fn read_direct(&self) -> Result<Served, SourceError> {
		let payload = self.refresher.source().fetch_current_status().await?;
		Ok(Served {
			payload: Arc::new(payload),
			source: DataSource::Db,
		})
	}

	async fn read_auto(&self) -> Result<Served, ReadError> {
		if let Some(payload) = self.refresher.cache().get().await {
			debug!(target: "read_path", "Cache hit");
			return Ok(Served {
				payload,
				source: DataSource::Cache,
			});
		}

		let failure = match self.read_source().await {
			Ok(served) => return Ok(served),
			Err(failure) => failure,
		};

		if self.snapshot_fallback
			&& let Some(served) = self.read_snapshot().await
		{
			warn!(
				target: "read_path",
				attempts = failure.attempts,
				error = %failure.error,
				updated_at = %served.payload.updated_at,
				"Source unavailable, serving durable snapshot"
			);
			return Ok(served);
		}

		Err(self.unavailable(failure))
	}

	async fn read_source(&self) -> Result<Served, FetchFailure> {
		let (payload, attempts) = self.fetch_with_retry().await?;
		let published = self.refresher.publish(payload).await;

		if attempts > 1 {
			info!(target: "read_path", attempts, "Source recovered after retry");
		}
		Ok(Served {
			payload: published.payload,
			source: DataSource::Db,
		})
	}

	async fn fetch_with_retry(&self) -> Result<(SnapshotPayload, u32), FetchFailure> {
		let mut attempts = 0;
		loop {
			attempts += 1;
			let outcome = FetchOutcome::from(self.refresher.source().fetch_current_status().await);

			match outcome {
				FetchOutcome::Fresh(payload) => return Ok((payload, attempts)),
				FetchOutcome::Permanent(error) => {
					error!(target: "read_path", attempts, error = %error, "Source failed permanently");
					return Err(FetchFailure { attempts, error });
				}
				FetchOutcome::Transient(error) if attempts >= self.retry.max_attempts => {
					error!(target: "read_path", attempts, error = %error, "Source retries exhausted");
					return Err(FetchFailure { attempts, error });
				}
				FetchOutcome::Transient(error) => {
					warn!(
						target: "read_path",
						attempt = attempts,
						max_attempts = self.retry.max_attempts,
						delay_ms = self.retry.delay.as_millis(),
						error = %error,
						"Transient source failure, retrying"
					);
					tokio::time::sleep(self.retry.delay).await;
				}
			}
		}
	}

	async fn read_snapshot(&self) -> Option<Served> {
		let store = self.refresher.store().clone();
		let payload = match tokio::task::spawn_blocking(move || store.read()).await {
			Ok(payload) => payload?,
			Err(e) => {
				error!(target: "read_path", error = %e, "Durable snapshot reader panicked");
				return None;
			}
		};

		Some(Served {
			payload: Arc::new(payload),
			source: DataSource::Snapshot,
		})
	}

	fn unavailable(&self, failure: FetchFailure) -> ReadError {
		error!(
			target: "read_path",
			attempts = failure.attempts,
			error = %failure.error,
			snapshot_fallback = self.snapshot_fallback,
			"Lot status unavailable"
		);
		ReadError::Unavailable {
			attempts: failure.attempts,
		}
	}
}
