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

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use lotmap_snapshot::{
	CachePolicy, FileSnapshotStore, LotStatusService, LotmapConfig, MokaLotStatusCache,
	PgLotStatusSource, RefreshScheduler, RefreshSchedulerConfig, SnapshotRefresher,
	config::HttpConfig,
};
use tracing::info;

use crate::{
	config::GatewayRuntimeConfig,
	middleware::{CorsMiddleware, LoggingMiddleware},
	routes::configure_routes,
};

/// Gateway server state
#[derive(Clone)]
pub struct GatewayState {
	pub service: Arc<LotStatusService>,
	pub http: HttpConfig,
}

impl GatewayState {
	pub fn new(service: Arc<LotStatusService>, http: HttpConfig) -> Self {
		Self { service, http }
	}
}

/// Gateway server
pub struct GatewayServer {
	state: GatewayState,
	scheduler: Option<RefreshSchedulerConfig>,
}

impl GatewayServer {
	/// Wire source, cache, durable store and read path from configuration
	///
	/// The database pool connects lazily, so the gateway starts and serves
	/// the durable snapshot while the database is down.
	pub fn new(config: &LotmapConfig) -> Result<Self> {
		let source =
			PgLotStatusSource::connect_lazy(&config.database).context("Failed to configure database")?;

		let policy = CachePolicy::from_ttl(config.cache.ttl());
		let cache = MokaLotStatusCache::new(policy);
		let store = FileSnapshotStore::new(config.snapshot.path.clone());
		info!(target: "server", "Cache policy: {:?}", policy);
		info!(target: "server", "Durable snapshot: {}", store.path().display());

		let refresher = Arc::new(SnapshotRefresher::new(
			Arc::new(source),
			Arc::new(cache),
			Arc::new(store),
		));
		let service = LotStatusService::from_config(refresher, &config.retry, &config.read);
		info!(
			target: "server",
			"Retry: {} attempts, {} ms apart; snapshot fallback: {}",
			config.retry.max_attempts,
			config.retry.delay_ms,
			config.read.snapshot_fallback
		);

		let scheduler = config
			.refresh
			.interval()
			.map(|interval| RefreshSchedulerConfig { interval });

		Ok(Self {
			state: GatewayState::new(Arc::new(service), config.http.clone()),
			scheduler,
		})
	}

	/// Start the HTTP server and run until it stops
	pub async fn serve(self, runtime: &GatewayRuntimeConfig) -> Result<()> {
		let scheduler = self.scheduler.map(|config| {
			RefreshScheduler::start(self.state.service.refresher().clone(), config)
		});

		let state = web::Data::new(self.state);
		info!(target: "server", "Workers: {}", runtime.workers);

		// actix-web stops on SIGINT/SIGTERM by itself
		HttpServer::new(move || {
			App::new()
				.app_data(state.clone())
				.wrap(CorsMiddleware)
				.wrap(LoggingMiddleware)
				.configure(configure_routes)
		})
		.workers(runtime.workers)
		.bind(runtime.bind_addr)
		.with_context(|| format!("Failed to bind {}", runtime.bind_addr))?
		.run()
		.await
		.context("HTTP server error")?;

		info!(target: "server", "Shutting down components...");
		if let Some(scheduler) = scheduler {
			scheduler.shutdown().await;
		}

		info!(target: "server", "Shutdown complete");
		Ok(())
	}
}
