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

use async_trait::async_trait;
use lotmap_sdk::{LotStatusRecord, SnapshotPayload};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::debug;

use super::{LotStatusSource, SourceError, canonicalize};
use crate::config::DatabaseConfig;

/// Lots joined with their current state, decimals cast to float8
const LOT_STATUS_QUERY: &str = r#"
SELECT
	l.codigo,
	l.manzana,
	l.lote_numero,
	e.id AS estado_id,
	e.nombre AS estado_nombre,
	l.area_lote::float8 AS area_lote,
	l.perimetro::float8 AS perimetro,
	l.precio::float8 AS precio,
	l.descripcion
FROM database_lote l
JOIN database_estado_lote e ON e.id = l.estado_id
ORDER BY l.codigo
"#;

#[derive(Debug, sqlx::FromRow)]
struct LotStatusRow {
	codigo: String,
	manzana: String,
	lote_numero: String,
	estado_id: i32,
	estado_nombre: String,
	area_lote: f64,
	perimetro: f64,
	precio: Option<f64>,
	descripcion: Option<String>,
}

impl From<LotStatusRow> for LotStatusRecord {
	fn from(row: LotStatusRow) -> Self {
		Self {
			code: row.codigo,
			block: row.manzana,
			lot_number: row.lote_numero,
			state_id: row.estado_id,
			state_name: row.estado_nombre,
			area: row.area_lote,
			perimeter: row.perimetro,
			price: row.precio,
			description: row.descripcion,
		}
	}
}

/// PostgreSQL implementation of LotStatusSource.
pub struct PgLotStatusSource {
	pool: PgPool,
}

impl PgLotStatusSource {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Build a pool that connects on first use
	///
	/// The gateway must be able to start (and serve the durable snapshot)
	/// while the database is down, so no connection is made here.
	pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, SourceError> {
		let pool = PgPoolOptions::new()
			.max_connections(config.max_connections)
			.acquire_timeout(config.acquire_timeout())
			.connect_lazy(&config.url)
			.map_err(classify_sqlx_error)?;

		Ok(Self::new(pool))
	}
}

#[async_trait]
impl LotStatusSource for PgLotStatusSource {
	async fn fetch_current_status(&self) -> Result<SnapshotPayload, SourceError> {
		let rows: Vec<LotStatusRow> = sqlx::query_as(LOT_STATUS_QUERY)
			.fetch_all(&self.pool)
			.await
			.map_err(classify_sqlx_error)?;

		debug!(target: "source", rows = rows.len(), "Lot status query completed");

		let records = canonicalize(rows.into_iter().map(LotStatusRecord::from).collect());
		Ok(SnapshotPayload::new(records))
	}
}

/// Split sqlx failures into retryable and non-retryable errors
pub fn classify_sqlx_error(error: sqlx::Error) -> SourceError {
	let transient = match &error {
		sqlx::Error::Io(_)
		| sqlx::Error::Tls(_)
		| sqlx::Error::PoolTimedOut
		| sqlx::Error::PoolClosed
		| sqlx::Error::WorkerCrashed => true,
		sqlx::Error::Database(db) => db.code().is_some_and(|code| is_transient_sqlstate(&code)),
		_ => false,
	};

	if transient {
		SourceError::Transient(error.to_string())
	} else {
		SourceError::Permanent(error.to_string())
	}
}

/// SQLSTATE classes that describe the connection rather than the query:
/// `08` connection exception, `53` insufficient resources, `57P0x` shutdown
fn is_transient_sqlstate(code: &str) -> bool {
	code.starts_with("08") || code.starts_with("53") || code.starts_with("57P0")
}
