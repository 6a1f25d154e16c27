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

use actix_web::{
	HttpRequest, HttpResponse, HttpResponseBuilder, Responder,
	http::{
		StatusCode,
		header::{self, ETag, LastModified},
	},
	web,
};
use lotmap_sdk::{DATA_SOURCE_HEADER, DataSource, ReadMode, RefreshSummary};
use lotmap_snapshot::{ReadError, RefreshError, Served, SourceError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::{conditional::Validators, config::SERVICE_NAME, server::GatewayState};

/// Error types for gateway operations
///
/// Display strings are what clients see; details stay in the logs.
#[derive(Debug, Error)]
pub enum GatewayError {
	#[error("lot status unavailable")]
	Unavailable(#[from] ReadError),
	#[error("lot not found")]
	NotFound,
	#[error("lot status source unavailable")]
	Source(#[from] SourceError),
	#[error("refresh failed")]
	Refresh(#[from] RefreshError),
}

impl actix_web::ResponseError for GatewayError {
	fn status_code(&self) -> StatusCode {
		match self {
			GatewayError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
			GatewayError::NotFound => StatusCode::NOT_FOUND,
			GatewayError::Source(_) | GatewayError::Refresh(_) => StatusCode::SERVICE_UNAVAILABLE,
		}
	}

	fn error_response(&self) -> HttpResponse {
		HttpResponse::build(self.status_code()).json(serde_json::json!({
			"error": self.to_string()
		}))
	}
}

#[derive(Debug, Default, Deserialize)]
pub struct LotsQuery {
	#[serde(default)]
	pub source: ReadMode,
}

/// Health check endpoint
pub async fn health() -> impl Responder {
	HttpResponse::Ok().json(serde_json::json!({
		"status": "ok",
		"service": SERVICE_NAME
	}))
}

/// Current status of every lot
pub async fn list_lots(
	state: web::Data<GatewayState>,
	query: web::Query<LotsQuery>,
	req: HttpRequest,
) -> Result<HttpResponse, GatewayError> {
	let served = state.service.read(query.source).await?;
	Ok(respond(&state, &req, &served, &served.payload.data))
}

/// Current status of one lot, looked up case-insensitively
pub async fn get_lot(
	state: web::Data<GatewayState>,
	path: web::Path<String>,
	req: HttpRequest,
) -> Result<HttpResponse, GatewayError> {
	let codigo = path.into_inner();
	let served = state.service.read(ReadMode::Auto).await?;

	let lot = served.payload.find(&codigo).ok_or(GatewayError::NotFound)?;
	Ok(respond(&state, &req, &served, lot))
}

/// Single source query, bypassing cache, retry and fallback
pub async fn list_lots_fast(state: web::Data<GatewayState>) -> Result<HttpResponse, GatewayError> {
	let served = state.service.read_direct().await.inspect_err(|e| {
		error!(target: "server", error = %e, "Fast path source query failed");
	})?;

	Ok(HttpResponse::Ok()
		.insert_header((header::CACHE_CONTROL, state.http.cache_control.clone()))
		.insert_header((DATA_SOURCE_HEADER, DataSource::Db.as_str()))
		.json(&served.payload.data))
}

/// Recompute the snapshot and republish it
pub async fn refresh(state: web::Data<GatewayState>) -> Result<HttpResponse, GatewayError> {
	let published = state.service.refresher().refresh().await?;
	Ok(HttpResponse::Ok().json(RefreshSummary::from(published.payload.as_ref())))
}

/// Build a cacheable response, answering conditional requests with 304
fn respond<T: Serialize + ?Sized>(
	state: &GatewayState,
	req: &HttpRequest,
	served: &Served,
	body: &T,
) -> HttpResponse {
	let validators = Validators::of(&served.payload);
	let not_modified = state.http.conditional_requests && validators.not_modified(req);

	let mut builder = if not_modified {
		HttpResponse::NotModified()
	} else {
		HttpResponse::Ok()
	};
	with_cache_headers(&mut builder, state, &validators, served.source);

	if not_modified {
		builder.finish()
	} else {
		builder.json(body)
	}
}

fn with_cache_headers(
	builder: &mut HttpResponseBuilder,
	state: &GatewayState,
	validators: &Validators,
	source: DataSource,
) {
	builder
		.insert_header(ETag(validators.etag.clone()))
		.insert_header(LastModified(validators.last_modified))
		.insert_header((header::CACHE_CONTROL, state.http.cache_control.clone()))
		.insert_header((DATA_SOURCE_HEADER, source.as_str()));
}
