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

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version of the lot-status payload
pub const SNAPSHOT_VERSION: u32 = 1;

/// Response header naming where the served payload came from
pub const DATA_SOURCE_HEADER: &str = "X-Data-Source";

/// Externally visible state of a single lot
///
/// Field names on the wire follow the map client's vocabulary
/// (`codigo`, `manzana`, ...). `code` is always lowercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotStatusRecord {
	/// Unique lot code, lowercased
	#[serde(rename = "codigo")]
	pub code: String,
	/// Block within the subdivision
	#[serde(rename = "manzana")]
	pub block: String,
	/// Lot number within the block
	#[serde(rename = "lote_numero")]
	pub lot_number: String,
	/// Sale/reservation state identifier, sent as a decimal string
	#[serde(rename = "estado", with = "state_id_string")]
	pub state_id: i32,
	/// Human readable state name
	#[serde(rename = "estado_nombre")]
	pub state_name: String,
	/// Lot area
	#[serde(rename = "area_lote")]
	pub area: f64,
	/// Lot perimeter
	#[serde(rename = "perimetro")]
	pub perimeter: f64,
	/// Price, `None` while not yet set
	#[serde(rename = "precio")]
	pub price: Option<f64>,
	/// Free text description
	#[serde(rename = "descripcion", default)]
	pub description: Option<String>,
}

mod state_id_string {
	use serde::{Deserialize, Deserializer, Serializer, de::Error};

	pub fn serialize<S: Serializer>(id: &i32, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(id)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.trim().parse().map_err(D::Error::custom)
	}
}

/// A complete, point-in-time lot-status snapshot
///
/// This is also the layout of the durable snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
	/// When this payload was computed
	pub updated_at: DateTime<Utc>,
	/// Schema version tag
	pub version: u32,
	/// Records ordered by code
	pub data: Vec<LotStatusRecord>,
}

impl SnapshotPayload {
	/// Build a payload stamped with the current time
	pub fn new(data: Vec<LotStatusRecord>) -> Self {
		Self::with_updated_at(data, Utc::now())
	}

	pub fn with_updated_at(data: Vec<LotStatusRecord>, updated_at: DateTime<Utc>) -> Self {
		Self {
			updated_at,
			version: SNAPSHOT_VERSION,
			data,
		}
	}

	/// Look up a lot by code, ignoring case
	pub fn find(&self, code: &str) -> Option<&LotStatusRecord> {
		let code = code.trim().to_lowercase();
		self.data.iter().find(|record| record.code == code)
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}

/// Where a served payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
	/// Volatile cache hit
	Cache,
	/// Fresh read from the relational store
	Db,
	/// Durable snapshot file (possibly stale)
	Snapshot,
}

impl DataSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			DataSource::Cache => "cache",
			DataSource::Db => "db",
			DataSource::Snapshot => "snapshot",
		}
	}
}

impl fmt::Display for DataSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DataSource {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"cache" => Ok(DataSource::Cache),
			"db" => Ok(DataSource::Db),
			"snapshot" => Ok(DataSource::Snapshot),
			other => Err(format!("unknown data source: {}", other)),
		}
	}
}

/// Read mode selected by the `source` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
	/// Cache, then database with retry, then durable snapshot
	#[default]
	Auto,
	/// Database with retry only; no cache and no snapshot fallback
	Db,
	/// Durable snapshot only
	Snapshot,
}

impl ReadMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			ReadMode::Auto => "auto",
			ReadMode::Db => "db",
			ReadMode::Snapshot => "snapshot",
		}
	}
}

/// Result of an administrative refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSummary {
	pub updated_at: DateTime<Utc>,
	pub version: u32,
	pub count: usize,
}

impl From<&SnapshotPayload> for RefreshSummary {
	fn from(payload: &SnapshotPayload) -> Self {
		Self {
			updated_at: payload.updated_at,
			version: payload.version,
			count: payload.len(),
		}
	}
}
