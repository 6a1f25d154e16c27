// Copyright 2025 chenjjiaa
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

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

/// Environment variable prefix for every configuration key
pub const ENV_PREFIX: &str = "LOTMAP";

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "LOTMAP_CONFIG";

/// Default database URL
pub const DEFAULT_DATABASE_URL: &str = "postgres://postgres@localhost:5432/lotmap";

/// Default durable snapshot location
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/lotes_snapshot.json";

/// Default cache entry lifetime in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default bound on source attempts per request
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default delay between source attempts in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;

/// Default `Cache-Control` value sent with lot-status responses
pub const DEFAULT_CACHE_CONTROL: &str = "no-cache";

/// Complete lot-status configuration
///
/// Loaded from built-in defaults, an optional file named by `LOTMAP_CONFIG`,
/// and `LOTMAP_*` environment variables (nested keys use `__`, e.g.
/// `LOTMAP_CACHE__TTL_SECS=60`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LotmapConfig {
	pub database: DatabaseConfig,
	pub snapshot: SnapshotFileConfig,
	pub cache: CacheConfig,
	pub retry: RetryConfig,
	pub read: ReadConfig,
	pub http: HttpConfig,
	pub refresh: RefreshConfig,
}

/// Relational store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
	pub url: String,
	pub max_connections: u32,
	/// How long a query waits for a pooled connection
	pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_DATABASE_URL.to_string(),
			max_connections: 5,
			acquire_timeout_ms: 3_000,
		}
	}
}

impl DatabaseConfig {
	pub fn acquire_timeout(&self) -> Duration {
		Duration::from_millis(self.acquire_timeout_ms)
	}
}

/// Durable snapshot file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotFileConfig {
	pub path: PathBuf,
}

impl Default for SnapshotFileConfig {
	fn default() -> Self {
		Self {
			path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
		}
	}
}

/// Volatile cache policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
	/// Entry lifetime; `None` or `0` keeps the entry until it is replaced
	/// or invalidated by a scheduled refresh
	pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			ttl_secs: Some(DEFAULT_CACHE_TTL_SECS),
		}
	}
}

impl CacheConfig {
	pub fn ttl(&self) -> Option<Duration> {
		self.ttl_secs.filter(|secs| *secs > 0).map(Duration::from_secs)
	}
}

/// Bounded retry of transient source failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub delay_ms: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
			delay_ms: DEFAULT_RETRY_DELAY_MS,
		}
	}
}

/// Read path behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
	/// Serve the durable snapshot when the source cannot be read
	pub snapshot_fallback: bool,
}

impl Default for ReadConfig {
	fn default() -> Self {
		Self {
			snapshot_fallback: true,
		}
	}
}

/// HTTP caching metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
	/// Answer `If-None-Match` / `If-Modified-Since` with 304
	pub conditional_requests: bool,
	pub cache_control: String,
}

impl Default for HttpConfig {
	fn default() -> Self {
		Self {
			conditional_requests: true,
			cache_control: DEFAULT_CACHE_CONTROL.to_string(),
		}
	}
}

/// Scheduled refresh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
	/// Interval of the scheduled refresh; disabled when unset or `0`
	pub interval_secs: Option<u64>,
	/// When set, the refresh command asks this gateway to refresh instead
	/// of querying the database itself
	pub gateway_url: Option<String>,
}

impl RefreshConfig {
	pub fn interval(&self) -> Option<Duration> {
		self.interval_secs
			.filter(|secs| *secs > 0)
			.map(Duration::from_secs)
	}
}

impl LotmapConfig {
	/// Load configuration from `LOTMAP_CONFIG` (if set) and the environment
	pub fn load() -> Result<Self, config::ConfigError> {
		dotenv::dotenv().ok();

		match std::env::var(CONFIG_FILE_ENV) {
			Ok(path) if !path.is_empty() => Self::from_file(&path),
			_ => Self::from_env(),
		}
	}

	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(environment())
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(environment())
			.build()?;

		cfg.try_deserialize()
	}
}

fn environment() -> config::Environment {
	config::Environment::with_prefix(ENV_PREFIX)
		.prefix_separator("_")
		.separator("__")
		.try_parsing(true)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = LotmapConfig::default();

		assert_eq!(config.retry.max_attempts, 3);
		assert_eq!(config.retry.delay_ms, 200);
		assert_eq!(config.cache.ttl(), Some(Duration::from_secs(300)));
		assert!(config.read.snapshot_fallback);
		assert!(config.http.conditional_requests);
		assert_eq!(config.refresh.interval(), None);
		assert_eq!(
			config.snapshot.path,
			PathBuf::from("data/lotes_snapshot.json")
		);
	}

	#[test]
	fn test_zero_ttl_disables_expiry() {
		let cache = CacheConfig { ttl_secs: Some(0) };
		assert_eq!(cache.ttl(), None);

		let cache = CacheConfig { ttl_secs: None };
		assert_eq!(cache.ttl(), None);
	}

	#[test]
	fn test_partial_file_keeps_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("lotmap.toml");
		std::fs::write(
			&path,
			"[retry]\nmax_attempts = 5\n\n[read]\nsnapshot_fallback = false\n",
		)
		.unwrap();

		let config = LotmapConfig::from_file(path.to_str().unwrap()).unwrap();

		assert_eq!(config.retry.max_attempts, 5);
		assert_eq!(config.retry.delay_ms, DEFAULT_RETRY_DELAY_MS);
		assert!(!config.read.snapshot_fallback);
		assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
	}
}
