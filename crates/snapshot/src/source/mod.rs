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

//! Source of truth for lot status
//!
//! The source reads the current state of every lot from the relational
//! store. It never writes. Failures are split into two classes:
//!
//! - **Transient**: connection-level trouble that may clear on retry
//! - **Permanent**: structural problems (schema mismatch, bad data) that
//!   will fail the same way every time

mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use lotmap_sdk::{LotStatusRecord, SnapshotPayload};
use thiserror::Error;
use tracing::warn;

pub use postgres::{PgLotStatusSource, classify_sqlx_error};

/// Error types for source reads
#[derive(Debug, Clone, Error)]
pub enum SourceError {
	#[error("Transient store error: {0}")]
	Transient(String),
	#[error("Permanent store error: {0}")]
	Permanent(String),
}

impl SourceError {
	pub fn is_transient(&self) -> bool {
		matches!(self, SourceError::Transient(_))
	}
}

/// Outcome of a single source fetch
///
/// The retry loop in the read path is driven by these variants.
#[derive(Debug)]
pub enum FetchOutcome {
	Fresh(SnapshotPayload),
	Transient(SourceError),
	Permanent(SourceError),
}

impl From<Result<SnapshotPayload, SourceError>> for FetchOutcome {
	fn from(result: Result<SnapshotPayload, SourceError>) -> Self {
		match result {
			Ok(payload) => FetchOutcome::Fresh(payload),
			Err(e) if e.is_transient() => FetchOutcome::Transient(e),
			Err(e) => FetchOutcome::Permanent(e),
		}
	}
}

/// Read-only view of the current lot status
#[async_trait]
pub trait LotStatusSource: Send + Sync {
	/// Read every lot with its current state in a single query
	async fn fetch_current_status(&self) -> Result<SnapshotPayload, SourceError>;
}

/// Bring raw records into payload form
///
/// Codes are trimmed and lowercased, records are ordered by code, and a
/// code that appears twice after lowercasing keeps only its first record.
pub fn canonicalize(records: Vec<LotStatusRecord>) -> Vec<LotStatusRecord> {
	let mut records: Vec<LotStatusRecord> = records
		.into_iter()
		.map(|mut record| {
			record.code = record.code.trim().to_lowercase();
			record
		})
		.collect();
	records.sort_by(|a, b| a.code.cmp(&b.code));

	let mut seen = HashSet::with_capacity(records.len());
	records.retain(|record| {
		if seen.insert(record.code.clone()) {
			true
		} else {
			warn!(target: "source", code = %record.code, "Duplicate lot code dropped");
			false
		}
	});

	records
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(code: &str, state_id: i32) -> LotStatusRecord {
		LotStatusRecord {
			code: code.to_string(),
			block: "A".to_string(),
			lot_number: "1".to_string(),
			state_id,
			state_name: "Disponible".to_string(),
			area: 100.0,
			perimeter: 40.0,
			price: Some(15_000.0),
			description: None,
		}
	}

	#[test]
	fn test_canonicalize_lowercases_and_orders() {
		let records = canonicalize(vec![record("B-02", 1), record(" A-01 ", 2)]);

		let codes: Vec<_> = records.iter().map(|r| r.code.as_str()).collect();
		assert_eq!(codes, vec!["a-01", "b-02"]);
	}

	#[test]
	fn test_canonicalize_keeps_first_duplicate() {
		let records = canonicalize(vec![record("A-01", 1), record("a-01", 3)]);

		assert_eq!(records.len(), 1);
		assert_eq!(records[0].state_id, 1);
	}

	#[test]
	fn test_fetch_outcome_classification() {
		let fresh = FetchOutcome::from(Ok(SnapshotPayload::new(vec![])));
		assert!(matches!(fresh, FetchOutcome::Fresh(_)));

		let transient = FetchOutcome::from(Err(SourceError::Transient("reset".into())));
		assert!(matches!(transient, FetchOutcome::Transient(_)));

		let permanent = FetchOutcome::from(Err(SourceError::Permanent("no column".into())));
		assert!(matches!(permanent, FetchOutcome::Permanent(_)));
	}
}
