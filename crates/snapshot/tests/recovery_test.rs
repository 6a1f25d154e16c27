//! Durable snapshot recovery across restarts and outages

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU32, Ordering},
	},
	time::Duration,
};

use async_trait::async_trait;
use lotmap_sdk::{DataSource, LotStatusRecord, ReadMode, SnapshotPayload};
use lotmap_snapshot::{
	CachePolicy, FileSnapshotStore, LotStatusCache, LotStatusService, LotStatusSource,
	MokaLotStatusCache, ReadError, RetryPolicy, SnapshotRefresher, SnapshotStore, SourceError,
};

/// Database stand-in that can be taken offline
struct SwitchableSource {
	lots: Vec<LotStatusRecord>,
	online: AtomicBool,
	calls: AtomicU32,
}

impl SwitchableSource {
	fn new(lots: Vec<LotStatusRecord>) -> Arc<Self> {
		Arc::new(Self {
			lots,
			online: AtomicBool::new(true),
			calls: AtomicU32::new(0),
		})
	}

	fn go_offline(&self) {
		self.online.store(false, Ordering::SeqCst);
	}
}

#[async_trait]
impl LotStatusSource for SwitchableSource {
	async fn fetch_current_status(&self) -> Result<SnapshotPayload, SourceError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if self.online.load(Ordering::SeqCst) {
			Ok(SnapshotPayload::new(self.lots.clone()))
		} else {
			Err(SourceError::Transient("connection refused".into()))
		}
	}
}

fn lot(code: &str, state_id: i32, state_name: &str) -> LotStatusRecord {
	LotStatusRecord {
		code: code.to_string(),
		block: "A".to_string(),
		lot_number: code.rsplit('-').next().unwrap_or_default().to_string(),
		state_id,
		state_name: state_name.to_string(),
		area: 120.5,
		perimeter: 45.0,
		price: Some(15000.0),
		description: None,
	}
}

/// One gateway process: its own cache, sharing the snapshot file
fn process(
	source: Arc<SwitchableSource>,
	snapshot: &std::path::Path,
) -> (LotStatusService, Arc<MokaLotStatusCache>) {
	let cache = Arc::new(MokaLotStatusCache::new(CachePolicy::Explicit));
	let refresher = Arc::new(SnapshotRefresher::new(
		source,
		cache.clone(),
		Arc::new(FileSnapshotStore::new(snapshot)),
	));
	let service = LotStatusService::new(
		refresher,
		RetryPolicy::new(3, Duration::from_millis(200)),
		true,
	);
	(service, cache)
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_survives_restart_during_outage() {
	let dir = tempfile::tempdir().unwrap();
	let snapshot = dir.path().join("data").join("lotes_snapshot.json");
	let source = SwitchableSource::new(vec![lot("a-01", 2, "Reservado"), lot("a-02", 1, "Disponible")]);

	// First process reads from the database and persists the payload
	let (first, _) = process(source.clone(), &snapshot);
	let fresh = first.read(ReadMode::Auto).await.unwrap();
	assert_eq!(fresh.source, DataSource::Db);
	assert!(snapshot.exists());
	drop(first);

	// Database goes down, process restarts with a cold cache
	source.go_offline();
	let (second, cache) = process(source.clone(), &snapshot);
	assert!(cache.get().await.is_none());

	let served = second.read(ReadMode::Auto).await.unwrap();

	assert_eq!(served.source, DataSource::Snapshot);
	assert_eq!(served.payload, fresh.payload);
	assert_eq!(served.payload.find("A-01").unwrap().state_name, "Reservado");
	// One successful read, then three failed attempts
	assert_eq!(source.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_outage_without_snapshot_is_unavailable() {
	let dir = tempfile::tempdir().unwrap();
	let snapshot = dir.path().join("lotes_snapshot.json");
	let source = SwitchableSource::new(vec![lot("a-01", 2, "Reservado")]);
	source.go_offline();

	let (service, _) = process(source, &snapshot);

	let result = service.read(ReadMode::Auto).await;
	assert!(matches!(result, Err(ReadError::Unavailable { attempts: 3 })));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_replaces_snapshot_file() {
	let dir = tempfile::tempdir().unwrap();
	let snapshot = dir.path().join("lotes_snapshot.json");
	let source = SwitchableSource::new(vec![lot("b-07", 3, "Vendido")]);

	let (service, _) = process(source, &snapshot);
	let first = service.refresher().refresh().await.unwrap();
	let second = service.refresher().refresh().await.unwrap();
	assert!(first.persisted && second.persisted);

	let on_disk = FileSnapshotStore::new(&snapshot).read().unwrap();
	assert_eq!(on_disk.updated_at, second.payload.updated_at);
	assert!(on_disk.updated_at > first.payload.updated_at);

	// Only the snapshot itself remains; no temp files
	let entries = std::fs::read_dir(dir.path()).unwrap().count();
	assert_eq!(entries, 1);
}
