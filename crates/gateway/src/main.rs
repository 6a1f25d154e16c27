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

//! Lot Map Gateway Service
//!
//! HTTP front end of the lot-status feed. Serves the map client from the
//! volatile cache, the database, or the durable snapshot, whichever is the
//! freshest one available, and exposes an administrative refresh.

mod conditional;
mod config;
mod handlers;
mod middleware;
mod routes;
mod server;

use anyhow::{Context, Result};
use lotmap_snapshot::{LotmapConfig, logging::init_logging};
use tracing::info;

use crate::config::{GatewayRuntimeConfig, LOG_COMPONENT_NAME};
use server::GatewayServer;

#[actix_rt::main]
async fn main() -> Result<()> {
	// Initialize logging first
	init_logging(LOG_COMPONENT_NAME)?;

	let runtime = GatewayRuntimeConfig::from_env()?;
	let config = LotmapConfig::load().context("Failed to load configuration")?;
	info!(target: "server", "Starting Lot Map Gateway on {}", runtime.bind_addr);

	let server = GatewayServer::new(&config).context("Failed to create gateway server")?;

	info!(target: "server", "Gateway server initialized");

	server
		.serve(&runtime)
		.await
		.context("Failed to start gateway server")?;

	Ok(())
}
