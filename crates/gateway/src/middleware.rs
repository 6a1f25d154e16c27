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

use std::future::{Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::{
	Error,
	dev::{Service, ServiceRequest, ServiceResponse, Transform},
	http::header::{self, HeaderValue},
};
use lotmap_sdk::DATA_SOURCE_HEADER;
use tracing::{Instrument, error, info};

/// CORS middleware for actix-web
///
/// The map is rendered by a browser on another origin, which needs to read
/// the validators and the data source header.
pub struct CorsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for CorsMiddleware
where
	S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
	S::Future: 'static,
	B: 'static,
{
	type Response = ServiceResponse<B>;
	type Error = Error;
	type InitError = ();
	type Transform = CorsMiddlewareInner<S>;
	type Future = Ready<Result<Self::Transform, Self::InitError>>;

	fn new_transform(&self, service: S) -> Self::Future {
		ready(Ok(CorsMiddlewareInner {
			service: Rc::new(service),
		}))
	}
}

pub struct CorsMiddlewareInner<S> {
	service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for CorsMiddlewareInner<S>
where
	S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
	S::Future: 'static,
	B: 'static,
{
	type Response = ServiceResponse<B>;
	type Error = Error;
	type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

	fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.service.poll_ready(cx)
	}

	fn call(&self, req: ServiceRequest) -> Self::Future {
		let service = self.service.clone();

		Box::pin(async move {
			let mut res = service.call(req).await?;

			let headers = res.headers_mut();
			headers.insert(
				header::ACCESS_CONTROL_ALLOW_ORIGIN,
				HeaderValue::from_static("*"),
			);
			headers.insert(
				header::ACCESS_CONTROL_ALLOW_METHODS,
				HeaderValue::from_static("GET, POST, OPTIONS"),
			);
			headers.insert(
				header::ACCESS_CONTROL_ALLOW_HEADERS,
				HeaderValue::from_static("Content-Type, If-None-Match, If-Modified-Since"),
			);
			headers.insert(
				header::ACCESS_CONTROL_EXPOSE_HEADERS,
				HeaderValue::from_static("ETag, Last-Modified, X-Data-Source"),
			);

			Ok(res)
		})
	}
}

/// Logging middleware for actix-web
///
/// One line per request, including which tier served the lot status.
pub struct LoggingMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggingMiddleware
where
	S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
	S::Future: 'static,
	B: 'static,
{
	type Response = ServiceResponse<B>;
	type Error = Error;
	type InitError = ();
	type Transform = LoggingMiddlewareInner<S>;
	type Future = Ready<Result<Self::Transform, Self::InitError>>;

	fn new_transform(&self, service: S) -> Self::Future {
		ready(Ok(LoggingMiddlewareInner {
			service: Rc::new(service),
		}))
	}
}

pub struct LoggingMiddlewareInner<S> {
	service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggingMiddlewareInner<S>
where
	S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
	S::Future: 'static,
	B: 'static,
{
	type Response = ServiceResponse<B>;
	type Error = Error;
	type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

	fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.service.poll_ready(cx)
	}

	fn call(&self, req: ServiceRequest) -> Self::Future {
		let service = self.service.clone();
		let span = tracing::info_span!(
			"http_request",
			method = %req.method(),
			path = %req.path()
		);

		let fut = async move {
			let start = std::time::Instant::now();
			let res = service.call(req).await;
			let duration = start.elapsed();

			match &res {
				Ok(response) => {
					let data_source = response
						.headers()
						.get(DATA_SOURCE_HEADER)
						.and_then(|v| v.to_str().ok())
						.unwrap_or("-");
					info!(
						target: "server",
						status = response.status().as_u16(),
						data_source,
						duration_ms = duration.as_millis(),
						"Request completed"
					);
				}
				Err(e) => {
					error!(target: "server", error = %e, duration_ms = duration.as_millis(), "Request failed");
				}
			}

			res
		};

		Box::pin(fut.instrument(span))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use actix_web::{App, HttpResponse, test, web};

	#[actix_web::test]
	async fn test_cors_headers_added() {
		let app = test::init_service(
			App::new()
				.wrap(CorsMiddleware)
				.wrap(LoggingMiddleware)
				.route(
					"/",
					web::get().to(|| async {
						HttpResponse::Ok()
							.insert_header((DATA_SOURCE_HEADER, "cache"))
							.finish()
					}),
				),
		)
		.await;

		let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

		assert!(resp.status().is_success());
		let headers = resp.headers();
		assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
		assert_eq!(
			headers.get(header::ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(),
			"ETag, Last-Modified, X-Data-Source"
		);
		assert_eq!(headers.get(DATA_SOURCE_HEADER).unwrap(), "cache");
	}
}
