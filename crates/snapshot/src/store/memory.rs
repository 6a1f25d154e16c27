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

use std::sync::{Mutex, PoisonError};

use lotmap_sdk::SnapshotPayload;

use super::{SnapshotStore, StoreError};

/// In-memory snapshot store
///
/// Nothing survives a restart. Suitable for:
/// - Development and testing
/// - Deployments that rely on the database alone
#[derive(Default)]
pub struct MemorySnapshotStore {
	snapshot: Mutex<Option<SnapshotPayload>>,
}

impl MemorySnapshotStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Start with a payload already stored
	pub fn with_payload(payload: SnapshotPayload) -> Self {
		Self {
			snapshot: Mutex::new(Some(payload)),
		}
	}
}

impl SnapshotStore for MemorySnapshotStore {
	fn write(&self, payload: &SnapshotPayload) -> Result<(), StoreError> {
		*self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload.clone());
		Ok(())
	}

	fn read(&self) -> Option<SnapshotPayload> {
		self.snapshot
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}
}
