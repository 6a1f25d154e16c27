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

use actix_web::web;

use crate::handlers;

/// Configure API routes for the gateway
///
/// - `/lotes/` - Lot-status feed for the map
/// - `/lotes/fast/` - Single-query diagnostic read
/// - `/lotes/refresh/` - Administrative refresh
/// - `/lotes/{codigo}/` - One lot
/// - `/health` - Health check endpoint
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
	// Fixed segments are registered before `{codigo}` so they win the match
	cfg.service(
		web::scope("/lotes")
			.route("/", web::get().to(handlers::list_lots))
			.route("/fast/", web::get().to(handlers::list_lots_fast))
			.route("/refresh/", web::post().to(handlers::refresh))
			.route("/{codigo}/", web::get().to(handlers::get_lot)),
	)
	.route("/health", web::get().to(handlers::health));
}
