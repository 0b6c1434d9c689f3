//! Blob and Queue Protocol Tests
//!
//! The write-order contract end to end: payload bytes into extents first,
//! descriptors into the metadata catalogs second, plus the queue's payload
//! ceiling enforced before anything touches the store.

use breakwater_catalog::{ExtentFilter, MetadataDb, SqliteExtentCatalog};
use breakwater_store::{
    BlobService, DestinationConfig, Error, ExtentStore, QueueService, StoreConfig,
};
use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Fixture {
    _dir: TempDir,
    store: Arc<ExtentStore>,
    blobs: BlobService,
    queues: QueueService,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        destinations: vec![DestinationConfig {
            id: "default".to_string(),
            root_path: dir.path().join("extents"),
            max_concurrency: 4,
        }],
        ..Default::default()
    };

    let catalog = Arc::new(SqliteExtentCatalog::open_in_memory().await.unwrap());
    let store = Arc::new(ExtentStore::new(&config, catalog).unwrap());
    store.init().await.unwrap();

    let metadata = MetadataDb::open_in_memory().await.unwrap();
    let blobs = BlobService::new(Arc::clone(&store), metadata.blobs());
    let queues = QueueService::new(Arc::clone(&store), metadata.queues());

    Fixture {
        _dir: dir,
        store,
        blobs,
        queues,
    }
}

async fn extent_row_count(store: &ExtentStore) -> usize {
    store
        .catalog()
        .list(&ExtentFilter::default(), None, None)
        .await
        .unwrap()
        .records
        .len()
}

#[tokio::test]
async fn queue_message_at_the_limit_round_trips() {
    let f = fixture().await;
    let cancel = CancellationToken::new();

    // Exactly 64 KiB of (already base64-encoded) text.
    let text = "A".repeat(64 * 1024);
    let record = f
        .queues
        .put_message("acct", "jobs", &text, &cancel)
        .await
        .unwrap();
    assert_eq!(record.text_length, 64 * 1024);

    let peeked = f
        .queues
        .peek_messages("acct", "jobs", 32, &cancel)
        .await
        .unwrap();
    assert_eq!(peeked.len(), 1);
    assert_eq!(peeked[0].0.message_id, record.message_id);
    assert_eq!(peeked[0].1, Bytes::from(text.into_bytes()));
}

#[tokio::test]
async fn oversized_queue_message_writes_no_extent() {
    let f = fixture().await;
    let cancel = CancellationToken::new();

    let text = "A".repeat(64 * 1024 + 1);
    let result = f.queues.put_message("acct", "jobs", &text, &cancel).await;

    assert!(matches!(
        result,
        Err(Error::PayloadTooLarge {
            actual: 65537,
            limit: 65536,
        })
    ));

    // Rejected at the protocol boundary: the store never saw a byte.
    assert_eq!(extent_row_count(&f.store).await, 0);
    assert!(f
        .queues
        .peek_messages("acct", "jobs", 1, &cancel)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn peek_preserves_insertion_order_and_bodies() {
    let f = fixture().await;
    let cancel = CancellationToken::new();

    for body in ["Zmlyc3Q=", "c2Vjb25k", "dGhpcmQ="] {
        f.queues
            .put_message("acct", "q", body, &cancel)
            .await
            .unwrap();
    }

    let peeked = f.queues.peek_messages("acct", "q", 2, &cancel).await.unwrap();
    assert_eq!(peeked.len(), 2);
    assert_eq!(&peeked[0].1[..], b"Zmlyc3Q=");
    assert_eq!(&peeked[1].1[..], b"c2Vjb25k");

    // Peek consumed nothing.
    let all = f.queues.peek_messages("acct", "q", 10, &cancel).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn deleted_message_stops_appearing() {
    let f = fixture().await;
    let cancel = CancellationToken::new();

    let record = f
        .queues
        .put_message("acct", "q", "Ynllbm93", &cancel)
        .await
        .unwrap();

    f.queues
        .delete_message("acct", "q", &record.message_id)
        .await
        .unwrap();
    // Idempotent.
    f.queues
        .delete_message("acct", "q", &record.message_id)
        .await
        .unwrap();

    assert!(f
        .queues
        .peek_messages("acct", "q", 10, &cancel)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn small_blob_round_trips_in_one_block() {
    let f = fixture().await;
    let cancel = CancellationToken::new();

    let content = Bytes::from_static(b"tiny blob body");
    let record = f
        .blobs
        .put_blob("acct", "c", "tiny", content.clone(), &cancel)
        .await
        .unwrap();

    assert_eq!(record.parts.len(), 1);
    assert_eq!(record.content_length, content.len() as u64);

    let read_back = f
        .blobs
        .get_blob("acct", "c", "tiny", &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read_back, content);

    assert!(f
        .blobs
        .get_blob("acct", "c", "missing", &cancel)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn large_blob_splits_into_multiple_blocks() {
    let f = fixture().await;
    let cancel = CancellationToken::new();

    // 4 MiB blocks: 9 MiB + 3 bytes should produce three descriptors.
    let mut content = vec![0u8; 9 * 1024 * 1024 + 3];
    for (i, byte) in content.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    let content = Bytes::from(content);

    let record = f
        .blobs
        .put_blob("acct", "c", "big", content.clone(), &cancel)
        .await
        .unwrap();
    assert_eq!(record.parts.len(), 3);
    assert_eq!(
        record.parts.iter().map(|p| p.count).sum::<u64>(),
        content.len() as u64
    );

    let read_back = f
        .blobs
        .get_blob("acct", "c", "big", &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read_back, content);
}

#[tokio::test]
async fn overwriting_a_blob_serves_the_new_content() {
    let f = fixture().await;
    let cancel = CancellationToken::new();

    f.blobs
        .put_blob("acct", "c", "doc", Bytes::from_static(b"version one"), &cancel)
        .await
        .unwrap();
    f.blobs
        .put_blob("acct", "c", "doc", Bytes::from_static(b"v2"), &cancel)
        .await
        .unwrap();

    let read_back = f
        .blobs
        .get_blob("acct", "c", "doc", &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read_back, Bytes::from_static(b"v2"));
}

#[tokio::test]
async fn deleting_a_blob_only_removes_references() {
    let f = fixture().await;
    let cancel = CancellationToken::new();

    let record = f
        .blobs
        .put_blob("acct", "c", "doomed", Bytes::from_static(b"bytes"), &cancel)
        .await
        .unwrap();

    f.blobs.delete_blob("acct", "c", "doomed").await.unwrap();
    assert!(f
        .blobs
        .get_blob("acct", "c", "doomed", &cancel)
        .await
        .unwrap()
        .is_none());

    // Deletion is dereference-only: the extent row and bytes remain until
    // a garbage collection sweep proves them unreferenced.
    let row = f
        .store
        .catalog()
        .get(&record.parts[0].extent_id)
        .await
        .unwrap();
    assert!(row.is_some());
}
