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

use crate::types::{DATA_SOURCE_HEADER, DataSource, LotStatusRecord, ReadMode, RefreshSummary};
use reqwest::{Client as ReqwestClient, Response, StatusCode, Url, header};
use std::time::Duration;
use thiserror::Error;

/// Error types for client operations
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Server error: {0}")]
	Server(String),
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

/// Lot listing returned by the gateway together with its response metadata
#[derive(Debug, Clone)]
pub struct LotListing {
	pub lots: Vec<LotStatusRecord>,
	/// Value of the `X-Data-Source` header, if the server sent one
	pub source: Option<DataSource>,
	/// Entity tag to send back as `If-None-Match` on the next poll
	pub etag: Option<String>,
}

/// Client for the lot-status gateway
///
/// This is an async client interface using reqwest for HTTP communication.
pub struct Client {
	base_url: String,
	client: ReqwestClient,
}

impl Client {
	/// Create a new client with the given base URL
	pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
		Self::with_config(base_url, Duration::from_secs(30))
	}

	/// Create a new client with a custom request timeout
	pub fn with_config(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			base_url: base_url.into().trim_end_matches('/').to_string(),
			client,
		})
	}

	/// Fetch the full lot-status listing
	pub async fn list_lots(&self, mode: ReadMode) -> Result<LotListing, ClientError> {
		self.poll_lots(mode, None)
			.await?
			.ok_or_else(|| ClientError::InvalidResponse("Unexpected 304 without validator".into()))
	}

	/// Conditionally fetch the listing
	///
	/// Returns `Ok(None)` when the server answers `304 Not Modified` for the
	/// given entity tag.
	pub async fn poll_lots(
		&self,
		mode: ReadMode,
		etag: Option<&str>,
	) -> Result<Option<LotListing>, ClientError> {
		let url = format!("{}/lotes/", self.base_url);

		let mut request = self.client.get(&url).query(&[("source", mode.as_str())]);
		if let Some(etag) = etag {
			request = request.header(header::IF_NONE_MATCH, etag);
		}

		let response = request
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		if response.status() == StatusCode::NOT_MODIFIED {
			return Ok(None);
		}
		let response = ensure_success(response).await?;

		let source = response
			.headers()
			.get(DATA_SOURCE_HEADER)
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.parse().ok());
		let etag = response
			.headers()
			.get(header::ETAG)
			.and_then(|v| v.to_str().ok())
			.map(str::to_string);

		let lots: Vec<LotStatusRecord> = response
			.json()
			.await
			.map_err(|e| ClientError::Serialization(format!("Failed to parse response: {}", e)))?;

		Ok(Some(LotListing { lots, source, etag }))
	}

	/// Get a single lot by code
	///
	/// Returns `Ok(None)` when the gateway does not know the lot.
	pub async fn get_lot(&self, code: &str) -> Result<Option<LotStatusRecord>, ClientError> {
		let url = self.lot_url(code)?;

		let response = self
			.client
			.get(url)
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		let response = ensure_success(response).await?;

		let lot: LotStatusRecord = response
			.json()
			.await
			.map_err(|e| ClientError::Serialization(format!("Failed to parse response: {}", e)))?;

		Ok(Some(lot))
	}

	/// `{base}/lotes/{code}/` with `code` escaped as one path segment
	fn lot_url(&self, code: &str) -> Result<Url, ClientError> {
		let mut url = Url::parse(&self.base_url)
			.map_err(|e| ClientError::InvalidResponse(format!("Invalid base URL: {}", e)))?;
		url.path_segments_mut()
			.map_err(|_| ClientError::InvalidResponse("Base URL cannot carry a path".into()))?
			.pop_if_empty()
			.extend(["lotes", code, ""]);
		Ok(url)
	}

	/// Ask the gateway to recompute and republish the snapshot
	pub async fn refresh(&self) -> Result<RefreshSummary, ClientError> {
		let url = format!("{}/lotes/refresh/", self.base_url);

		let response = self
			.client
			.post(&url)
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;
		let response = ensure_success(response).await?;

		let summary: RefreshSummary = response
			.json()
			.await
			.map_err(|e| ClientError::Serialization(format!("Failed to parse response: {}", e)))?;

		Ok(summary)
	}

	/// Check gateway health
	pub async fn health_check(&self) -> Result<bool, ClientError> {
		let url = format!("{}/health", self.base_url);

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		Ok(response.status().is_success())
	}
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
	if response.status().is_success() {
		return Ok(response);
	}

	let status = response.status();
	let error_text = response
		.text()
		.await
		.unwrap_or_else(|_| format!("HTTP {}", status));
	Err(ClientError::Server(format!("{}: {}", status, error_text)))
}

/// Synchronous client wrapper
///
/// This wraps the async client and runs it in a tokio runtime.
/// For new code, prefer using the async Client directly.
pub struct SyncClient {
	client: Client,
	runtime: tokio::runtime::Runtime,
}

impl SyncClient {
	/// Create a new synchronous client
	pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
		let runtime = tokio::runtime::Runtime::new()
			.map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;
		Ok(Self {
			client: Client::new(base_url)?,
			runtime,
		})
	}

	/// Fetch the full lot-status listing (synchronous)
	pub fn list_lots(&self, mode: ReadMode) -> Result<LotListing, ClientError> {
		self.runtime.block_on(self.client.list_lots(mode))
	}

	/// Get a single lot by code (synchronous)
	pub fn get_lot(&self, code: &str) -> Result<Option<LotStatusRecord>, ClientError> {
		self.runtime.block_on(self.client.get_lot(code))
	}

	/// Trigger a snapshot refresh (synchronous)
	pub fn refresh(&self) -> Result<RefreshSummary, ClientError> {
		self.runtime.block_on(self.client.refresh())
	}
}
