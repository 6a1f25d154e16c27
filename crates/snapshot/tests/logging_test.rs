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

//! Integration test for the logging system
//!
//! Only one subscriber can be installed per process, so this file holds a
//! single test.

use std::{fs, thread, time::Duration};

use lotmap_snapshot::logging::init_logging;
use tracing::info;

#[test]
fn test_logs_written_to_component_directory() {
	let root = tempfile::tempdir().unwrap();
	// SAFETY: set before any other thread of this test binary reads the environment
	unsafe {
		std::env::set_var("LOG_DIR", root.path());
		std::env::set_var("RUST_LOG", "info");
	}

	init_logging("logtest").unwrap();
	info!(target: "refresher", records = 3, "Snapshot refreshed");

	// The non-blocking writer flushes from a worker thread
	thread::sleep(Duration::from_millis(500));

	let component_dir = root.path().join("logtest");
	let files: Vec<_> = fs::read_dir(&component_dir)
		.unwrap()
		.filter_map(|entry| entry.ok())
		.map(|entry| entry.path())
		.collect();
	assert_eq!(files.len(), 1, "expected one daily log file, got {files:?}");

	let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
	assert!(name.starts_with("logtest"));
	assert!(name.ends_with(".log"));

	let content = fs::read_to_string(&files[0]).unwrap();
	assert!(content.contains("Snapshot refreshed"));
	assert!(content.contains("records=3"));

	// Second initialization is rejected instead of silently replacing the subscriber
	assert!(init_logging("logtest").is_err());
}
