//! Streamed key enumeration
//!
//! With `keys=stream` the store answers with a run of JSON objects, each
//! carrying a `keys` array. A spawned task reads the body as it arrives,
//! decodes every complete object and pushes its keys through a bounded
//! channel:
//!
//! ```text
//! Idle -> Requesting -> Streaming (0..n batches) -> Ended
//!                  \--> Failed (one error) -----> Ended
//! ```

use crate::{
    ClientError, Connection, Result,
    types::RequestDescriptor,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

const STREAM_KEYS: &str = "Stream Keys";

/// Batches buffered between the reader task and the consumer
const CHANNEL_CAPACITY: usize = 16;

#[derive(Deserialize)]
struct KeyChunk {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Incremental decoder for the streamed key format.
///
/// Objects may arrive concatenated, newline separated, or split across
/// transport chunks; only the unfinished tail is carried to the next push.
#[derive(Debug, Default)]
pub(crate) struct KeyBatchDecoder {
    pending: Vec<u8>,
}

impl KeyBatchDecoder {
    /// Feed one transport chunk.
    ///
    /// Returns every non-empty batch the chunk completes. When the store
    /// reports an error or the bytes stop parsing, the batches decoded before
    /// that point are still returned alongside the error.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> (Vec<Vec<String>>, Option<ClientError>) {
        self.pending.extend_from_slice(chunk);

        let mut batches = Vec::new();
        let mut consumed = 0;
        let mut failure = None;
        {
            let mut objects = serde_json::Deserializer::from_slice(&self.pending).into_iter::<KeyChunk>();
            loop {
                match objects.next() {
                    Some(Ok(object)) => {
                        consumed = objects.byte_offset();
                        if let Some(error) = object.error {
                            failure = Some(ClientError::InvalidResponse(format!(
                                "store aborted key stream: {}",
                                error
                            )));
                            break;
                        }
                        if !object.keys.is_empty() {
                            batches.push(object.keys);
                        }
                    }
                    Some(Err(e)) if e.is_eof() => break,
                    Some(Err(e)) => {
                        failure = Some(e.into());
                        break;
                    }
                    None => {
                        consumed = objects.byte_offset();
                        break;
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        (batches, failure)
    }

    /// Called at end of body; anything left over is a truncated object
    pub(crate) fn finish(self) -> Result<()> {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(ClientError::InvalidResponse(format!(
                "key stream ended inside an object ({} bytes left)",
                self.pending.len()
            )))
        }
    }
}

/// Keys of a bucket, delivered batch by batch as the store sends them.
///
/// Yields `Ok(batch)` zero or more times, then at most one `Err`, then ends.
/// Dropping the stream (or calling [`KeyStream::abort`]) stops the reader.
pub struct KeyStream {
    rx: mpsc::Receiver<Result<Vec<String>>>,
    task: JoinHandle<()>,
}

impl KeyStream {
    /// Start reading. Must be called from within a tokio runtime.
    pub(crate) fn spawn(connection: Connection, request: RequestDescriptor) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(async move {
            if let Err(e) = pump(&connection, request, &tx).await {
                warn!("Key stream failed: {}", e);
                let _ = tx.send(Err(e)).await;
            }
            debug!("Key stream ended");
        });
        Self { rx, task }
    }

    /// Stop reading; batches already buffered are still delivered
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Drain the stream into one list, failing on the first error
    pub async fn collect_keys(mut self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        while let Some(batch) = self.next().await {
            keys.extend(batch?);
        }
        Ok(keys)
    }
}

impl Stream for KeyStream {
    type Item = Result<Vec<String>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for KeyStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn pump(
    connection: &Connection,
    request: RequestDescriptor,
    tx: &mpsc::Sender<Result<Vec<String>>>,
) -> Result<()> {
    debug!("Key stream requesting {}", request.path);
    let response = connection.send(request).await?;

    let status = response.status().as_u16();
    if status != 200 {
        return Err(ClientError::protocol(STREAM_KEYS, status));
    }

    debug!("Key stream open");
    let mut decoder = KeyBatchDecoder::default();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let (batches, failure) = decoder.push(&chunk?);
        for batch in batches {
            if tx.send(Ok(batch)).await.is_err() {
                // Consumer went away
                return Ok(());
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
    }
    decoder.finish()
}

/// Handle for a callback-driven key listing
pub struct KeyStreamHandle {
    task: JoinHandle<()>,
}

impl KeyStreamHandle {
    pub(crate) fn spawn<D, E>(mut stream: KeyStream, mut on_data: D, on_end: E) -> Self
    where
        D: FnMut(Vec<String>) + Send + 'static,
        E: FnOnce(Option<ClientError>) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut failure = None;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(keys) => on_data(keys),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            on_end(failure);
        });
        Self { task }
    }

    /// Whether `on_end` has run (or the listing was aborted)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the listing. `on_end` is not called after an abort.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait until `on_end` has run
    pub async fn join(self) -> std::result::Result<(), JoinError> {
        self.task.await
    }
}
