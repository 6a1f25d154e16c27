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

mod file;
mod memory;

use lotmap_sdk::SnapshotPayload;
use thiserror::Error;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

/// Error types for durable snapshot writes
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Failed to write snapshot: {0}")]
	Io(#[from] std::io::Error),
	#[error("Failed to serialize snapshot: {0}")]
	Serialize(#[from] serde_json::Error),
}

/// Reasons a stored snapshot cannot be served
///
/// Neither escapes `SnapshotStore::read`; they only shape the log line.
#[derive(Debug, Error)]
pub enum SnapshotError {
	#[error("No snapshot available")]
	NotFound,
	#[error("Unusable snapshot: {0}")]
	Unusable(String),
}

/// Durable Snapshot Store - last known-good payload
///
/// Holds exactly one payload. Writers replace it wholesale; readers see
/// either the previous or the new payload, never a mix of both.
///
/// This abstraction allows different backing stores:
/// - Local filesystem (production)
/// - In-memory (testing)
pub trait SnapshotStore: Send + Sync {
	/// Replace the stored payload
	fn write(&self, payload: &SnapshotPayload) -> Result<(), StoreError>;

	/// Load the stored payload
	///
	/// Returns `None` when nothing usable is stored: missing, unreadable,
	/// corrupt, or written with an unsupported schema version.
	fn read(&self) -> Option<SnapshotPayload>;
}
