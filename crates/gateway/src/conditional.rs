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

//! HTTP validators for lot-status payloads
//!
//! Validators are derived from the payload as a whole, so every response
//! built from the same payload (the full list or a single lot) carries the
//! same `ETag` and `Last-Modified`.

use std::time::SystemTime;

use actix_web::{
	HttpRequest,
	http::header::{self, EntityTag, Header, HttpDate, IfModifiedSince, IfNoneMatch},
};
use chrono::{DateTime, Utc};
use lotmap_sdk::SnapshotPayload;

#[derive(Debug, Clone, PartialEq)]
pub struct Validators {
	pub etag: EntityTag,
	pub last_modified: HttpDate,
	updated_at: DateTime<Utc>,
}

impl Validators {
	pub fn of(payload: &SnapshotPayload) -> Self {
		Self {
			etag: EntityTag::new_strong(format!(
				"v{}-{}",
				payload.version,
				payload.updated_at.timestamp_millis()
			)),
			last_modified: HttpDate::from(SystemTime::from(payload.updated_at)),
			updated_at: payload.updated_at,
		}
	}

	/// Whether the client's cached copy is still current
	///
	/// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted
	/// when it is absent.
	pub fn not_modified(&self, req: &HttpRequest) -> bool {
		if req.headers().contains_key(header::IF_NONE_MATCH) {
			return match IfNoneMatch::parse(req) {
				Ok(IfNoneMatch::Any) => true,
				Ok(IfNoneMatch::Items(tags)) => tags.iter().any(|tag| tag.weak_eq(&self.etag)),
				Err(_) => false,
			};
		}

		match IfModifiedSince::parse(req) {
			Ok(IfModifiedSince(since)) => {
				let since = DateTime::<Utc>::from(SystemTime::from(since));
				// HTTP dates carry whole seconds only
				self.updated_at.timestamp() <= since.timestamp()
			}
			Err(_) => false,
		}
	}
}
