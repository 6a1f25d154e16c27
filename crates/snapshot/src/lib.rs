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

//! Lotmap Snapshot - lot-status read path and snapshot refresh
//!
//! This crate serves the current status of every lot in the map and keeps
//! two copies of it: a volatile cache for fast reads and a durable JSON
//! snapshot that survives database outages and restarts.
//!
//! Architecture:
//! - Source: the relational store of record, queried in one statement
//! - Cache: one payload under one key, expiring or explicitly refreshed
//! - Store: atomically replaced snapshot file
//! - Refresher: the only writer of cache and store
//! - Read path: cache, then source with bounded retry, then snapshot

pub mod cache;
pub mod config;
pub mod logging;
pub mod read_path;
pub mod refresher;
pub mod source;
pub mod store;

pub use cache::{CachePolicy, LotStatusCache, MokaLotStatusCache};
pub use config::LotmapConfig;
pub use read_path::{LotStatusService, ReadError, RetryPolicy, Served};
pub use refresher::{
	Published, RefreshError, RefreshScheduler, RefreshSchedulerConfig, SnapshotRefresher,
};
pub use source::{FetchOutcome, LotStatusSource, PgLotStatusSource, SourceError};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotError, SnapshotStore, StoreError};
