//! Extent Store Integration Tests
//!
//! End-to-end append/read behavior against real files under a temp
//! directory, with an in-memory extent catalog (file-backed where the test
//! is about surviving a restart).

use breakwater_catalog::SqliteExtentCatalog;
use breakwater_store::{DestinationConfig, Error, ExtentStore, StoreConfig};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn store_config(root: &Path) -> StoreConfig {
    StoreConfig {
        destinations: vec![DestinationConfig {
            id: "default".to_string(),
            root_path: root.join("extents"),
            max_concurrency: 4,
        }],
        ..Default::default()
    }
}

async fn open_store(root: &Path) -> Arc<ExtentStore> {
    let catalog = Arc::new(SqliteExtentCatalog::open_in_memory().await.unwrap());
    let store = ExtentStore::new(&store_config(root), catalog).unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn append_then_read_returns_exact_bytes() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path()).await;
    let cancel = CancellationToken::new();

    let descriptor = store.append(None, b"Hello World", &cancel).await.unwrap();
    assert_eq!(descriptor.count, 11);

    let bytes = store.read(&descriptor, &cancel).await.unwrap();
    assert_eq!(&bytes[..], b"Hello World");
}

#[tokio::test]
async fn operations_require_init_and_stop_after_close() {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(SqliteExtentCatalog::open_in_memory().await.unwrap());
    let store = ExtentStore::new(&store_config(dir.path()), catalog).unwrap();
    let cancel = CancellationToken::new();

    let result = store.append(None, b"x", &cancel).await;
    assert!(matches!(result, Err(Error::NotInitialized)));

    store.init().await.unwrap();
    let descriptor = store.append(None, b"x", &cancel).await.unwrap();

    store.close().await.unwrap();
    // Idempotent.
    store.close().await.unwrap();

    assert!(matches!(
        store.append(None, b"y", &cancel).await,
        Err(Error::Closed)
    ));
    assert!(matches!(
        store.read(&descriptor, &cancel).await,
        Err(Error::Closed)
    ));
}

#[tokio::test]
async fn same_bytes_twice_yield_distinct_descriptors() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path()).await;
    let cancel = CancellationToken::new();

    let a = store.append(None, b"payload", &cancel).await.unwrap();
    let b = store.append(None, b"payload", &cancel).await.unwrap();

    assert_ne!((a.extent_id.clone(), a.offset), (b.extent_id.clone(), b.offset));
    assert_eq!(a.count, b.count);

    assert_eq!(store.read(&a, &cancel).await.unwrap(), store.read(&b, &cancel).await.unwrap());
}

#[tokio::test]
async fn sequential_appends_pack_into_one_extent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path()).await;
    let cancel = CancellationToken::new();

    let a = store.append(None, b"aaaa", &cancel).await.unwrap();
    let b = store.append(None, b"bb", &cancel).await.unwrap();

    // Well below the rotation threshold: same file, back to back.
    assert_eq!(a.extent_id, b.extent_id);
    assert_eq!(a.offset, 0);
    assert_eq!(b.offset, 4);

    assert_eq!(&store.read(&b, &cancel).await.unwrap()[..], b"bb");
}

#[tokio::test]
async fn reaching_the_rotation_threshold_closes_the_extent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path()).await;
    let cancel = CancellationToken::new();

    // Default rotation threshold is 1 MiB.
    let big = vec![7u8; 1024 * 1024];
    let first = store.append(None, &big, &cancel).await.unwrap();
    let second = store.append(None, b"next", &cancel).await.unwrap();

    assert_ne!(first.extent_id, second.extent_id);
    assert_eq!(second.offset, 0);

    // The rotated extent stays readable.
    assert_eq!(store.read(&first, &cancel).await.unwrap().len(), big.len());
}

#[tokio::test]
async fn concurrent_appends_never_overlap() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path()).await;

    let mut handles = Vec::new();
    for task in 0u8..4 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let mut written = Vec::new();
            for i in 0..25usize {
                let payload = vec![task; task as usize * 31 + i * 7 + 1];
                let descriptor = store.append(None, &payload, &cancel).await.unwrap();
                written.push((descriptor, payload));
            }
            written
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }

    // Every write reads back exactly.
    let cancel = CancellationToken::new();
    for (descriptor, payload) in &all {
        assert_eq!(descriptor.count as usize, payload.len());
        let bytes = store.read(descriptor, &cancel).await.unwrap();
        assert_eq!(&bytes[..], &payload[..]);
    }

    // And no two completed appends share bytes.
    for (i, (a, _)) in all.iter().enumerate() {
        for (b, _) in &all[i + 1..] {
            assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
        }
    }
}

#[tokio::test]
async fn single_slot_destination_serializes_writers() {
    let dir = TempDir::new().unwrap();
    let mut config = store_config(dir.path());
    config.destinations[0].max_concurrency = 1;

    let catalog = Arc::new(SqliteExtentCatalog::open_in_memory().await.unwrap());
    let store = Arc::new(ExtentStore::new(&config, catalog).unwrap());
    store.init().await.unwrap();

    let payload = vec![1u8; 1024 * 1024];
    let (a, b) = {
        let cancel = CancellationToken::new();
        tokio::join!(
            store.append(None, &payload, &cancel),
            store.append(None, &payload, &cancel),
        )
    };

    // Both succeed; the second waited for the first to release, and the
    // 1 MiB append rotated its extent, so the ids differ.
    let a = a.unwrap();
    let b = b.unwrap();
    assert_ne!(a.extent_id, b.extent_id);
    assert_eq!(a.offset, 0);
    assert_eq!(b.offset, 0);
}

#[tokio::test]
async fn idle_extents_are_evicted_after_the_timeout() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path()).await;
    let cancel = CancellationToken::new();

    let before = store.append(None, b"warm", &cancel).await.unwrap();

    // Nothing to evict while the file is fresh.
    let idle_timeout = std::time::Duration::from_secs(600);
    let now = breakwater_core::now_ms();
    assert_eq!(store.writer_pool().evict_idle(now, idle_timeout).await, 0);

    // Pretend twenty minutes passed.
    let later = now + 20 * 60 * 1000;
    assert_eq!(store.writer_pool().evict_idle(later, idle_timeout).await, 1);

    // The evicted extent is closed; the next append opens a fresh one.
    let after = store.append(None, b"cold", &cancel).await.unwrap();
    assert_ne!(before.extent_id, after.extent_id);
    assert_eq!(after.offset, 0);

    // Evicted does not mean deleted: the old range still reads back.
    assert_eq!(&store.read(&before, &cancel).await.unwrap()[..], b"warm");
}

#[tokio::test]
async fn read_errors_are_distinct() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path()).await;
    let cancel = CancellationToken::new();

    let missing = breakwater_core::ExtentDescriptor::new("no-such-extent", 0, 1);
    assert!(matches!(
        store.read(&missing, &cancel).await,
        Err(Error::ExtentNotFound(_))
    ));

    let descriptor = store.append(None, b"short", &cancel).await.unwrap();
    let past_end = breakwater_core::ExtentDescriptor::new(descriptor.extent_id.clone(), 2, 100);
    assert!(matches!(
        store.read(&past_end, &cancel).await,
        Err(Error::RangeExceeded { .. })
    ));
}

#[tokio::test]
async fn cancelled_append_writes_nothing_new() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path()).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = store.append(None, b"doomed", &cancel).await;
    assert!(matches!(result, Err(Error::Cancelled)));

    // Whatever the pool did internally, no range was acknowledged, and a
    // fresh append starts a clean extent at offset zero.
    let live = CancellationToken::new();
    let descriptor = store.append(None, b"alive", &live).await.unwrap();
    assert_eq!(descriptor.offset, 0);
    assert_eq!(&store.read(&descriptor, &live).await.unwrap()[..], b"alive");
}

#[tokio::test]
async fn acknowledged_writes_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let mut config = store_config(dir.path());
    config.extent_catalog_path = dir.path().join("extents.sqlite");

    let mut written = Vec::new();
    {
        let store = ExtentStore::open(&config).await.unwrap();
        store.init().await.unwrap();
        let cancel = CancellationToken::new();

        for i in 0..20u32 {
            let payload = format!("record-{i}").into_bytes();
            let descriptor = store.append(None, &payload, &cancel).await.unwrap();
            written.push((descriptor, payload));
        }
        // No close: the process "crashes" here.
    }
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let store = ExtentStore::open(&config).await.unwrap();
    store.init().await.unwrap();
    let cancel = CancellationToken::new();

    for (descriptor, payload) in &written {
        let bytes = store.read(descriptor, &cancel).await.unwrap();
        assert_eq!(&bytes[..], &payload[..]);
    }

    // And the reopened store keeps appending without clobbering anything.
    let descriptor = store.append(None, b"after-restart", &cancel).await.unwrap();
    assert_eq!(
        &store.read(&descriptor, &cancel).await.unwrap()[..],
        b"after-restart"
    );
}

#[tokio::test]
async fn appends_spread_round_robin_across_destinations() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        destinations: vec![
            DestinationConfig {
                id: "ssd".to_string(),
                root_path: dir.path().join("ssd"),
                max_concurrency: 2,
            },
            DestinationConfig {
                id: "hdd".to_string(),
                root_path: dir.path().join("hdd"),
                max_concurrency: 2,
            },
        ],
        ..Default::default()
    };
    let catalog = Arc::new(SqliteExtentCatalog::open_in_memory().await.unwrap());
    let store = ExtentStore::new(&config, catalog).unwrap();
    store.init().await.unwrap();
    let cancel = CancellationToken::new();

    let a = store.append(None, b"one", &cancel).await.unwrap();
    let b = store.append(None, b"two", &cancel).await.unwrap();

    let catalog = store.catalog();
    let rec_a = catalog.get(&a.extent_id).await.unwrap().unwrap();
    let rec_b = catalog.get(&b.extent_id).await.unwrap().unwrap();
    assert_ne!(rec_a.destination_id, rec_b.destination_id);

    // Pinning a destination overrides the rotation.
    let pinned = store.append(Some("hdd"), b"three", &cancel).await.unwrap();
    let rec = catalog.get(&pinned.extent_id).await.unwrap().unwrap();
    assert_eq!(rec.destination_id, "hdd");

    assert!(matches!(
        store.append(Some("tape"), b"nope", &cancel).await,
        Err(Error::UnknownDestination(_))
    ));
}
