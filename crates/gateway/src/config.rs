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

use std::{env, net::SocketAddr};

use anyhow::{Context, Result};

/// Log directory component name
pub const LOG_COMPONENT_NAME: &str = "gateway";

// Server configuration constants
/// Default HTTP server bind address (can be overridden by GATEWAY_BIND_ADDR environment variable)
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "lotmap-gateway";

/// HTTP server settings that are not part of the shared lotmap configuration
#[derive(Debug, Clone)]
pub struct GatewayRuntimeConfig {
	pub bind_addr: SocketAddr,
	pub workers: usize,
}

impl GatewayRuntimeConfig {
	pub fn from_env() -> Result<Self> {
		dotenv::dotenv().ok();

		let bind_addr_str =
			env::var("GATEWAY_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
		let bind_addr = bind_addr_str
			.parse()
			.with_context(|| format!("Invalid bind address: {}", bind_addr_str))?;

		let workers = env::var("GATEWAY_WORKERS")
			.ok()
			.and_then(|w| w.parse().ok())
			.filter(|w| *w > 0)
			.unwrap_or_else(num_cpus::get);

		Ok(Self { bind_addr, workers })
	}
}
