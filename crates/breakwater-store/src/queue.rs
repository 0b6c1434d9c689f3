//! Queue Message Write/Read Path
//!
//! Queue messages follow the same lifecycle order as blobs: body bytes into
//! the extent store first, the descriptor into the queue catalog second,
//! acknowledgement last.
//!
//! The message size ceiling is enforced *before* any bytes reach the store:
//! an oversized body is rejected with `PayloadTooLarge` and writes nothing.
//! Message bodies arrive already base64-encoded by the client, so the limit
//! applies to the encoded text.

use crate::error::{Error, Result};
use crate::store::ExtentStore;
use breakwater_catalog::{QueueCatalog, QueueMessageRecord};
use breakwater_core::{now_ms, MAX_QUEUE_MESSAGE_BYTES};
use bytes::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct QueueService {
    store: Arc<ExtentStore>,
    catalog: QueueCatalog,
}

impl QueueService {
    pub fn new(store: Arc<ExtentStore>, catalog: QueueCatalog) -> Self {
        Self { store, catalog }
    }

    /// Enqueue a message body. Returns the stored record, including the
    /// assigned message id.
    pub async fn put_message(
        &self,
        account: &str,
        queue: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<QueueMessageRecord> {
        if text.len() > MAX_QUEUE_MESSAGE_BYTES {
            return Err(Error::PayloadTooLarge {
                actual: text.len(),
                limit: MAX_QUEUE_MESSAGE_BYTES,
            });
        }

        let part = self.store.append(None, text.as_bytes(), cancel).await?;

        let record = QueueMessageRecord {
            account: account.to_string(),
            queue: queue.to_string(),
            message_id: Uuid::new_v4().to_string(),
            inserted_ms: now_ms(),
            text_length: text.len() as u64,
            part,
        };
        self.catalog.put_message(&record).await?;

        tracing::debug!(
            account,
            queue,
            message_id = %record.message_id,
            text_length = record.text_length,
            "Message enqueued"
        );

        Ok(record)
    }

    /// Return up to `count` messages with their bodies, oldest first,
    /// without consuming them.
    pub async fn peek_messages(
        &self,
        account: &str,
        queue: &str,
        count: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<(QueueMessageRecord, Bytes)>> {
        let records = self.catalog.peek_messages(account, queue, count).await?;

        let mut messages = Vec::with_capacity(records.len());
        for record in records {
            let body = self.store.read(&record.part, cancel).await?;
            messages.push((record, body));
        }

        Ok(messages)
    }

    /// Drop a message record and its extent reference. Idempotent.
    pub async fn delete_message(&self, account: &str, queue: &str, message_id: &str) -> Result<()> {
        self.catalog.delete_message(account, queue, message_id).await?;
        Ok(())
    }
}
