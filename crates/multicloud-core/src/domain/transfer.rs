//! Transfer chunks and upload sessions

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Half-open byte range `[start, end)` of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataChunk {
    pub start: u64,
    pub end: u64,
}

impl DataChunk {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Inclusive last byte, as used by HTTP `Range` headers
    pub fn last_byte(&self) -> u64 {
        self.end.saturating_sub(1)
    }

    /// `Range` header value for this chunk
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.last_byte())
    }
}

impl std::fmt::Display for DataChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Splits `[0, size)` into contiguous chunks of `chunk_size` bytes
///
/// The last chunk is truncated to the remainder. A zero size yields no chunks.
///
/// # Errors
///
/// Returns [`DomainError::InvalidChunkSize`] when `chunk_size` is zero.
pub fn partition(size: u64, chunk_size: u64) -> Result<Vec<DataChunk>, DomainError> {
    if chunk_size == 0 {
        return Err(DomainError::InvalidChunkSize(chunk_size));
    }

    let mut chunks = Vec::with_capacity(size.div_ceil(chunk_size) as usize);
    let mut start = 0;
    while start < size {
        let end = (start + chunk_size).min(size);
        chunks.push(DataChunk::new(start, end));
        start = end;
    }
    Ok(chunks)
}

/// Provider upload session returned by the begin phase of an upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadSession {
    pub session_id: Option<String>,
    /// Number of bytes the provider has already accepted
    pub offset: u64,
    /// Session URL, when the provider hands one out in a header
    pub location: Option<String>,
}
