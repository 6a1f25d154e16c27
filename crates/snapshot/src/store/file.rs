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

use std::{
	fs::{self, File},
	io::{BufReader, BufWriter, ErrorKind, Write},
	path::{Path, PathBuf},
};

use lotmap_sdk::{SNAPSHOT_VERSION, SnapshotPayload};
use tracing::{debug, warn};

use super::{SnapshotError, SnapshotStore, StoreError};

/// Snapshot store backed by a single JSON file
///
/// Writes go to a temp file in the same directory, are flushed and
/// fsynced, then renamed over the canonical path. The temp file is a
/// `tempfile::NamedTempFile`, so every early return removes it.
pub struct FileSnapshotStore {
	path: PathBuf,
}

impl FileSnapshotStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn dir(&self) -> &Path {
		match self.path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent,
			_ => Path::new("."),
		}
	}

	fn temp_prefix(&self) -> String {
		let name = self
			.path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| "snapshot".to_string());
		format!(".{}.", name)
	}

	/// Fill a temp file with `fill` and rename it over the snapshot
	///
	/// The canonical path is only touched by the final rename; an error
	/// from `fill` or any later step drops (and deletes) the temp file.
	fn replace_with<F>(&self, fill: F) -> Result<(), StoreError>
	where
		F: FnOnce(&mut dyn Write) -> Result<(), StoreError>,
	{
		let dir = self.dir();
		fs::create_dir_all(dir)?;

		let mut temp = tempfile::Builder::new()
			.prefix(&self.temp_prefix())
			.suffix(".tmp")
			.tempfile_in(dir)?;

		{
			let mut writer = BufWriter::new(temp.as_file_mut());
			fill(&mut writer)?;
			writer.flush()?;
		}
		temp.as_file().sync_all()?;

		temp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
		sync_dir(dir);
		Ok(())
	}

	fn load(&self) -> Result<SnapshotPayload, SnapshotError> {
		let file = match File::open(&self.path) {
			Ok(file) => file,
			Err(e) if e.kind() == ErrorKind::NotFound => return Err(SnapshotError::NotFound),
			Err(e) => return Err(SnapshotError::Unusable(format!("unreadable: {}", e))),
		};

		let payload: SnapshotPayload = serde_json::from_reader(BufReader::new(file))
			.map_err(|e| SnapshotError::Unusable(format!("corrupted: {}", e)))?;

		if payload.version != SNAPSHOT_VERSION {
			return Err(SnapshotError::Unusable(format!(
				"unsupported version {}",
				payload.version
			)));
		}

		Ok(payload)
	}
}

impl SnapshotStore for FileSnapshotStore {
	fn write(&self, payload: &SnapshotPayload) -> Result<(), StoreError> {
		self.replace_with(|writer| Ok(serde_json::to_writer(writer, payload)?))?;

		debug!(
			target: "store",
			path = %self.path.display(),
			records = payload.len(),
			updated_at = %payload.updated_at,
			"Snapshot written"
		);
		Ok(())
	}

	fn read(&self) -> Option<SnapshotPayload> {
		match self.load() {
			Ok(payload) => Some(payload),
			Err(SnapshotError::NotFound) => {
				debug!(target: "store", path = %self.path.display(), "No snapshot on disk");
				None
			}
			Err(e) => {
				warn!(target: "store", path = %self.path.display(), error = %e, "Ignoring unusable snapshot");
				None
			}
		}
	}
}

/// Persist the rename itself; failure only weakens durability, not atomicity
#[cfg(unix)]
fn sync_dir(dir: &Path) {
	if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
		debug!(target: "store", dir = %dir.display(), error = %e, "Directory fsync failed");
	}
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
	use super::*;
	use lotmap_sdk::LotStatusRecord;

	fn payload(codes: &[&str]) -> SnapshotPayload {
		SnapshotPayload::new(
			codes
				.iter()
				.map(|code| LotStatusRecord {
					code: code.to_string(),
					block: "B".to_string(),
					lot_number: "7".to_string(),
					state_id: 1,
					state_name: "Disponible".to_string(),
					area: 200.0,
					perimeter: 60.0,
					price: Some(30_000.0),
					description: None,
				})
				.collect(),
		)
	}

	fn leftover_temp_files(dir: &Path) -> usize {
		fs::read_dir(dir)
			.unwrap()
			.filter_map(|e| e.ok())
			.filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
			.count()
	}

	#[test]
	fn test_read_missing_is_none() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileSnapshotStore::new(dir.path().join("lotes_snapshot.json"));

		assert!(store.read().is_none());
	}

	#[test]
	fn test_write_creates_parent_directory() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileSnapshotStore::new(dir.path().join("data").join("lotes_snapshot.json"));

		store.write(&payload(&["a-01"])).unwrap();

		assert!(store.path().exists());
		assert_eq!(store.read().unwrap().len(), 1);
	}

	#[test]
	fn test_overwrite_leaves_no_temp_files() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileSnapshotStore::new(dir.path().join("lotes_snapshot.json"));

		store.write(&payload(&["a-01"])).unwrap();
		store.write(&payload(&["a-01", "a-02"])).unwrap();

		assert_eq!(store.read().unwrap().len(), 2);
		assert_eq!(leftover_temp_files(dir.path()), 0);
	}

	#[test]
	fn test_corrupt_file_is_none() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("lotes_snapshot.json");
		fs::write(&path, br#"{"updated_at": "2025-01-01T00:00:00Z", "version": 1, "da"#).unwrap();

		let store = FileSnapshotStore::new(path);
		assert!(store.read().is_none());
	}

	#[test]
	fn test_unknown_version_is_none() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("lotes_snapshot.json");
		fs::write(
			&path,
			br#"{"updated_at": "2025-01-01T00:00:00Z", "version": 99, "data": []}"#,
		)
		.unwrap();

		let store = FileSnapshotStore::new(path);
		assert!(matches!(store.load(), Err(SnapshotError::Unusable(_))));
		assert!(store.read().is_none());
	}

	#[test]
	fn test_interrupted_write_keeps_previous_snapshot() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("lotes_snapshot.json");
		let store = FileSnapshotStore::new(&path);
		let original = payload(&["a-01", "a-02"]);
		store.write(&original).unwrap();
		let before = fs::read(&path).unwrap();

		let result = store.replace_with(|writer| {
			writer.write_all(&before[..before.len() / 2])?;
			Err(StoreError::Io(std::io::Error::other("writer killed")))
		});

		assert!(result.is_err());
		assert_eq!(fs::read(&path).unwrap(), before);
		assert_eq!(store.read(), Some(original));
		assert_eq!(leftover_temp_files(dir.path()), 0);
	}

	#[test]
	fn test_stray_temp_file_is_ignored() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("lotes_snapshot.json");
		let store = FileSnapshotStore::new(&path);
		let original = payload(&["a-01"]);
		store.write(&original).unwrap();

		// Left behind by a process that died mid-write
		let full = serde_json::to_vec(&payload(&["a-01", "a-02", "a-03"])).unwrap();
		fs::write(
			dir.path().join(".lotes_snapshot.json.x7Kq2p.tmp"),
			&full[..full.len() / 2],
		)
		.unwrap();

		assert_eq!(store.read(), Some(original));

		let next = payload(&["b-01"]);
		store.write(&next).unwrap();
		assert_eq!(store.read(), Some(next));
	}

	#[test]
	fn test_failed_persist_removes_temp_file() {
		let dir = tempfile::tempdir().unwrap();

		// A non-empty directory on the rename target makes `persist` fail
		// after the temp file has been fully written.
		let blocked = FileSnapshotStore::new(dir.path().join("blocked"));
		fs::create_dir(blocked.path()).unwrap();
		fs::write(blocked.path().join("keep"), b"x").unwrap();

		assert!(blocked.write(&payload(&["b-01"])).is_err());
		assert!(blocked.path().is_dir());
		assert_eq!(leftover_temp_files(dir.path()), 0);
	}
}
