//! Multi-source chunked download
//!
//! A file is split into fixed-size byte ranges pushed onto a shared
//! [`ChunkQueue`]. One worker task per source drains the queue, fetching
//! each claimed range with a `Range` request against its own account and
//! writing the bytes at the chunk's offset into one preallocated file.
//!
//! ## Design Notes
//!
//! - Each chunk is delivered to exactly one worker at a time. A worker whose
//!   request fails puts its chunk back and retires, so a healthy source can
//!   still claim it. Idle workers only exit once no chunk is in flight.
//! - Ranges are disjoint and written with positioned writes, so the file
//!   contents do not depend on claim order.
//! - The download succeeds iff the queue is empty once every worker exited.

use std::collections::VecDeque;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use multicloud_core::config::DEFAULT_CHUNK_SIZE;
use multicloud_core::domain::{
    partition, DataChunk, DomainError, FileDescriptor, OperationKind, RequestTemplate, Token,
};
use multicloud_core::ports::ProgressTracker;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::CloudClient;
use crate::mapping::PropertyMapping;
use crate::normalize::parse_error;
use crate::operation::{OperationContext, OperationHandler};
use crate::ops::require_file;
use crate::{MultiCloudError, Result};

// ============================================================================
// Sources and queue
// ============================================================================

/// One origin of the file being downloaded
#[derive(Debug, Clone)]
pub struct DownloadSource {
    /// Account label, used in logs
    pub account: String,
    /// The file as this account sees it
    pub file: FileDescriptor,
    /// The account provider's download template
    pub template: RequestTemplate,
    /// The account's access token
    pub token: Token,
}

impl DownloadSource {
    pub fn new(
        account: impl Into<String>,
        file: FileDescriptor,
        template: RequestTemplate,
        token: Token,
    ) -> Self {
        Self {
            account: account.into(),
            file,
            template,
            token,
        }
    }

    fn mapping(&self) -> PropertyMapping {
        let mut mapping = PropertyMapping::new();
        mapping.insert_opt("id", self.file.id.clone());
        mapping.insert_opt("path", self.file.path.clone());
        mapping.insert_opt("name", self.file.name.clone());
        mapping
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<DataChunk>,
    in_flight: usize,
}

/// FIFO of chunks still to be transferred
///
/// A claimed chunk stays accounted for until it is either completed or given
/// back, so idle workers keep waiting while another worker may still return
/// a chunk.
#[derive(Debug, Default)]
pub struct ChunkQueue {
    state: Mutex<QueueState>,
    changed: Notify,
}

impl ChunkQueue {
    pub fn new(chunks: impl IntoIterator<Item = DataChunk>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: chunks.into_iter().collect(),
                in_flight: 0,
            }),
            changed: Notify::new(),
        }
    }

    /// Claims the next pending chunk without waiting
    pub fn try_claim(&self) -> Option<DataChunk> {
        let mut state = self.lock();
        let chunk = state.pending.pop_front()?;
        state.in_flight += 1;
        Some(chunk)
    }

    /// Claims the next chunk
    ///
    /// Waits while the queue is empty but chunks are still in flight.
    /// Returns `None` once nothing is pending and nothing is in flight.
    pub async fn claim(&self) -> Option<DataChunk> {
        loop {
            let changed = self.changed.notified();
            {
                let mut state = self.lock();
                if let Some(chunk) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return Some(chunk);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }
            changed.await;
        }
    }

    /// Marks a claimed chunk as written
    pub fn complete(&self) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Returns a claimed chunk whose transfer failed
    pub fn give_back(&self, chunk: DataChunk) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.pending.push_back(chunk);
        }
        self.changed.notify_waiters();
    }

    /// Chunks not yet claimed
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Chunks claimed but neither completed nor given back
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Worker
// ============================================================================

struct Worker {
    account: String,
    client: CloudClient,
    template: RequestTemplate,
    mapping: PropertyMapping,
    total_size: u64,
    queue: Arc<ChunkQueue>,
    file: Arc<std::fs::File>,
    progress: Option<Arc<ProgressTracker>>,
    cancel: CancellationToken,
}

impl Worker {
    /// Drains the queue; returns the failure that made the worker retire
    async fn run(self) -> Option<String> {
        let mut transferred = 0usize;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let claimed = tokio::select! {
                chunk = self.queue.claim() => chunk,
                _ = self.cancel.cancelled() => None,
            };
            let Some(chunk) = claimed else {
                break;
            };

            debug!(account = %self.account, %chunk, "Claimed chunk");
            match self.fetch(chunk).await {
                Ok(()) => {
                    self.queue.complete();
                    transferred += 1;
                    if let Some(progress) = &self.progress {
                        progress.add_transferred(chunk.len());
                    }
                }
                Err(e) => {
                    warn!(account = %self.account, %chunk, error = %e, "Chunk transfer failed, retiring source");
                    self.queue.give_back(chunk);
                    return Some(format!("{}: {}", self.account, e));
                }
            }
        }
        debug!(account = %self.account, chunks = transferred, "Download worker finished");
        None
    }

    async fn fetch(&self, chunk: DataChunk) -> Result<()> {
        let request = self
            .client
            .prepare(&self.template, &self.mapping)?
            .header(RANGE, chunk.range_header());
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let error = parse_error(status.as_u16(), status.canonical_reason(), &body);
            return Err(MultiCloudError::UnexpectedResponse(format!(
                "{} for range {}",
                error, chunk
            )));
        }
        let whole_file = chunk.start == 0 && chunk.end == self.total_size;
        if status != StatusCode::PARTIAL_CONTENT && !whole_file {
            return Err(MultiCloudError::UnexpectedResponse(format!(
                "range {} answered with status {}",
                chunk,
                status.as_u16()
            )));
        }

        let mut buffer = Vec::with_capacity(chunk.len() as usize);
        let mut stream = response.bytes_stream();
        while let Some(piece) = stream.next().await {
            buffer.extend_from_slice(&piece?);
        }
        if buffer.len() as u64 != chunk.len() {
            return Err(MultiCloudError::UnexpectedResponse(format!(
                "range {} returned {} bytes",
                chunk,
                buffer.len()
            )));
        }

        let file = Arc::clone(&self.file);
        let offset = chunk.start;
        tokio::task::spawn_blocking(move || file.write_all_at(&buffer, offset))
            .await
            .map_err(std::io::Error::other)??;
        Ok(())
    }
}

// ============================================================================
// FileDownloadOp
// ============================================================================

/// Downloads one file from one or more equivalent sources
///
/// - **begin**: keeps the sources matching the first one by name and size,
///   partitions the file and preallocates the destination
/// - **execute**: runs one worker per source until the queue is drained
/// - **finish**: fails if any chunk was never written
pub struct FileDownloadOp {
    sources: Vec<DownloadSource>,
    destination: PathBuf,
    chunk_size: u64,
    progress: Option<Arc<ProgressTracker>>,
    queue: Arc<ChunkQueue>,
    file: Option<Arc<std::fs::File>>,
    failure: Option<String>,
}

impl FileDownloadOp {
    /// # Arguments
    /// * `sources` - Candidate origins; the first one is the reference
    /// * `destination` - Local file to write
    ///
    /// # Errors
    /// Returns a validation error when `sources` is empty or the reference
    /// is a folder.
    pub fn new(sources: Vec<DownloadSource>, destination: impl Into<PathBuf>) -> Result<Self> {
        let Some(reference) = sources.first() else {
            return Err(DomainError::MissingArgument("sources".to_string()).into());
        };
        require_file(&reference.file)?;

        Ok(Self {
            sources,
            destination: destination.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: None,
            queue: Arc::new(ChunkQueue::default()),
            file: None,
            failure: None,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Sources still taking part in the download
    pub fn sources(&self) -> &[DownloadSource] {
        &self.sources
    }

    /// Chunks not yet transferred
    pub fn remaining_chunks(&self) -> usize {
        self.queue.len()
    }

    fn reference(&self) -> &FileDescriptor {
        &self.sources[0].file
    }
}

#[async_trait::async_trait]
impl OperationHandler for FileDownloadOp {
    type Output = FileDescriptor;

    fn kind(&self) -> OperationKind {
        OperationKind::Download
    }

    async fn begin(&mut self, _ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        let reference = self.reference().clone();
        let before = self.sources.len();
        self.sources.retain(|source| source.file.same_identity(&reference));
        if self.sources.len() < before {
            warn!(
                dropped = before - self.sources.len(),
                file = %reference.label(),
                "Dropped download sources that do not match the reference file"
            );
        }

        let chunks = partition(reference.size, self.chunk_size)?;
        debug!(size = reference.size, chunks = chunks.len(), "Partitioned download");
        self.queue = Arc::new(ChunkQueue::new(chunks));

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.destination)
            .await?;
        file.set_len(reference.size).await?;
        self.file = Some(Arc::new(file.into_std().await));

        if let Some(progress) = &self.progress {
            progress.set_total_size(reference.size);
        }
        Ok(())
    }

    async fn execute(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        let Some(file) = self.file.clone() else {
            return Err(MultiCloudError::Request("download destination not prepared".to_string()));
        };
        let total_size = self.reference().size;

        let mut workers = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let worker = Worker {
                account: source.account.clone(),
                client: CloudClient::with_client(ctx.client().http().clone(), source.token.clone()),
                template: source.template.clone(),
                mapping: source.mapping(),
                total_size,
                queue: Arc::clone(&self.queue),
                file: Arc::clone(&file),
                progress: self.progress.clone(),
                cancel: ctx.cancellation().clone(),
            };
            workers.push(tokio::spawn(worker.run()));
        }
        info!(
            workers = workers.len(),
            chunks = self.queue.len(),
            destination = %self.destination.display(),
            "Started download"
        );

        for handle in workers {
            match handle.await {
                Ok(Some(reason)) => self.failure = Some(reason),
                Ok(None) => {}
                Err(e) => self.failure = Some(format!("download worker failed: {}", e)),
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish_transfer();
        }
        if ctx.is_cancelled() {
            return Err(MultiCloudError::Aborted);
        }
        Ok(())
    }

    async fn finish(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        let remaining = self.queue.len() + self.queue.in_flight();
        if remaining > 0 {
            return Err(MultiCloudError::Download {
                remaining,
                reason: self
                    .failure
                    .clone()
                    .unwrap_or_else(|| "no source could serve the chunk".to_string()),
            });
        }
        if let Some(file) = &self.file {
            file.sync_all()?;
        }

        let mut downloaded = self.reference().clone();
        downloaded.fill_missing();
        info!(file = %downloaded.label(), size = downloaded.size, "Download complete");
        ctx.set_result(downloaded);
        Ok(())
    }
}

impl std::fmt::Debug for FileDownloadOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownloadOp")
            .field("sources", &self.sources.len())
            .field("destination", &self.destination)
            .field("chunk_size", &self.chunk_size)
            .field("remaining", &self.queue.len())
            .finish()
    }
}
