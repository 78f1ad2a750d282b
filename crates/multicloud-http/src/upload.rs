//! Session-based chunked upload
//!
//! An upload runs up to three provider requests, each from its own template:
//!
//! - **begin** opens a session, optionally sending the first chunk. The
//!   session comes from the JSON body or, for an empty body, from URI-style
//!   query parameters carried in response headers (e.g. `Location`).
//! - **execute** sends the next chunk while bytes remain. A template whose
//!   body is not the data sentinel is sent once. An offset reported by the
//!   provider must match the bytes sent so far.
//! - **finish** commits the upload, carrying whatever is left of the stream
//!   when its body is the data sentinel, and yields the uploaded file.
//!
//! ## Placeholders
//!
//! `name`, `id` (parent folder id), `path` (full destination path), `size`,
//! plus per request `offset`, `range_end`, `chunk_length`, `session_id` and
//! `session_location`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use multicloud_core::config::DEFAULT_CHUNK_SIZE;
use multicloud_core::domain::{
    DomainError, FileDescriptor, FileKind, OperationKind, ProviderTemplates, RequestBody,
    RequestTemplate, UploadSession,
};
use multicloud_core::ports::ProgressTracker;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::Response;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;
use url::Url;

use crate::mapping::PropertyMapping;
use crate::normalize::MAPPING_SEPARATOR;
use crate::operation::{Normalized, OperationContext, OperationHandler};
use crate::ops::{join_path, require_folder, require_name};
use crate::{MultiCloudError, Result};

/// Templates of the three upload requests; each one is optional
#[derive(Debug, Clone, Default)]
pub struct UploadTemplates {
    pub begin: Option<RequestTemplate>,
    pub execute: Option<RequestTemplate>,
    pub finish: Option<RequestTemplate>,
}

impl UploadTemplates {
    pub fn from_provider(provider: &ProviderTemplates) -> Self {
        Self {
            begin: provider.upload_begin.clone(),
            execute: provider.upload_execute.clone(),
            finish: provider.upload_finish.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.begin.is_none() && self.execute.is_none() && self.finish.is_none()
    }
}

fn sends_data(template: &RequestTemplate) -> bool {
    template.body.as_ref().is_some_and(RequestBody::is_data)
}

/// Uploads a stream of known size into a folder
pub struct FileUploadOp {
    templates: UploadTemplates,
    folder: FileDescriptor,
    name: String,
    size: u64,
    reader: Box<dyn AsyncRead + Send + Unpin>,
    chunk_size: u64,
    session: UploadSession,
    transferred: u64,
    progress: Option<Arc<ProgressTracker>>,
}

impl FileUploadOp {
    /// # Arguments
    /// * `templates` - The provider's upload templates
    /// * `folder` - Destination folder
    /// * `name` - Name of the new file
    /// * `size` - Number of bytes `reader` yields
    /// * `reader` - The content to upload
    ///
    /// # Errors
    /// Returns a validation error when no template is configured, `folder`
    /// is not a folder or `name` is blank.
    pub fn new(
        templates: UploadTemplates,
        folder: FileDescriptor,
        name: impl Into<String>,
        size: u64,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Result<Self> {
        if templates.is_empty() {
            return Err(MultiCloudError::MissingTemplate(OperationKind::UploadExecute));
        }
        let name = name.into();
        require_folder(&folder)?;
        require_name(&name)?;

        Ok(Self {
            templates,
            folder,
            name,
            size,
            reader: Box::new(reader),
            chunk_size: DEFAULT_CHUNK_SIZE,
            session: UploadSession::default(),
            transferred: 0,
            progress: None,
        })
    }

    /// # Errors
    /// Returns a validation error for a zero chunk size.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DomainError::InvalidChunkSize(chunk_size).into());
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    /// Bytes the provider has accepted so far
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    fn destination_path(&self) -> Option<String> {
        self.folder
            .path
            .as_deref()
            .map(|folder| join_path(folder, &self.name))
    }

    /// Descriptor for providers that answer without a body
    fn uploaded_file(&self) -> FileDescriptor {
        let mut file = FileDescriptor::new(self.name.clone(), FileKind::File).with_size(self.size);
        file.path = self.destination_path();
        file.fill_missing();
        file
    }

    /// Reads exactly `min(limit, remaining)` bytes from the stream
    async fn read_chunk(&mut self, limit: u64) -> Result<Vec<u8>> {
        let length = limit.min(self.size.saturating_sub(self.transferred));
        let mut buffer = Vec::with_capacity(length as usize);
        (&mut self.reader).take(length).read_to_end(&mut buffer).await?;
        if (buffer.len() as u64) < length {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "upload stream ended after {} of {} bytes",
                    self.transferred + buffer.len() as u64,
                    self.size
                ),
            )
            .into());
        }
        Ok(buffer)
    }

    /// Sends one templated request, attaching up to `limit` stream bytes
    /// when the template asks for data
    async fn dispatch<T>(
        &mut self,
        ctx: &mut OperationContext<T>,
        template: &RequestTemplate,
        limit: u64,
    ) -> Result<(Response, u64)> {
        let data = if sends_data(template) {
            Some(self.read_chunk(limit).await?)
        } else {
            None
        };
        let length = data.as_ref().map_or(0, |d| d.len() as u64);

        let mapping = ctx.mapping_mut();
        mapping.insert("offset", self.transferred.to_string());
        mapping.insert("chunk_length", length.to_string());
        mapping.insert(
            "range_end",
            (self.transferred + length).saturating_sub(1).to_string(),
        );

        let mut request = ctx.prepare(template)?;
        if let Some(data) = data {
            request = request.body(data);
        }
        debug!(offset = self.transferred, length, total = self.size, "Sending upload request");
        let response = ctx.send(request).await?;
        Ok((response, length))
    }

    fn advance<T>(&mut self, ctx: &mut OperationContext<T>, sent: u64) {
        self.transferred += sent;
        self.session.offset = self.transferred;
        if let Some(progress) = &self.progress {
            progress.add_transferred(sent);
        }
        ctx.mapping_mut().insert("offset", self.transferred.to_string());
    }

    /// Compares the provider's reported offset with the bytes sent
    ///
    /// The stream cannot rewind, so a disagreeing offset ends the upload.
    /// Zero means the provider reported none.
    fn confirm_offset(&self, reported: u64) -> Result<()> {
        if reported == 0 || reported == self.transferred {
            return Ok(());
        }
        Err(MultiCloudError::UnexpectedResponse(format!(
            "provider reports offset {} after {} bytes were sent",
            reported, self.transferred
        )))
    }

    fn adopt_session<T>(&mut self, ctx: &mut OperationContext<T>, session: UploadSession) {
        if session.session_id.is_some() {
            self.session.session_id = session.session_id;
        }
        if session.location.is_some() {
            self.session.location = session.location;
        }
        let mapping = ctx.mapping_mut();
        mapping.insert_opt("session_id", self.session.session_id.clone());
        mapping.insert_opt("session_location", self.session.location.clone());
    }
}

/// Reads a session out of response headers whose values are URLs
///
/// Query parameters of every URL-valued header are collected; `sessionId`
/// and `offset` are looked up under the names `mapping` assigns to them.
fn session_from_headers(headers: &HeaderMap, mapping: &BTreeMap<String, String>) -> UploadSession {
    let params: HashMap<String, String> = headers
        .values()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Url::parse(value).ok())
        .flat_map(|url| url.query_pairs().into_owned().collect::<Vec<_>>())
        .collect();

    let lookup = |field: &str| {
        mapping
            .get(field)
            .map_or(field, String::as_str)
            .split(MAPPING_SEPARATOR)
            .map(str::trim)
            .find_map(|name| params.get(name).cloned())
    };

    UploadSession {
        session_id: lookup("sessionId"),
        offset: lookup("offset").and_then(|v| v.parse().ok()).unwrap_or(0),
        location: headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}

#[async_trait::async_trait]
impl OperationHandler for FileUploadOp {
    type Output = FileDescriptor;

    fn kind(&self) -> OperationKind {
        OperationKind::UploadExecute
    }

    fn property_mapping(&self) -> PropertyMapping {
        let mut mapping = PropertyMapping::new()
            .with("name", self.name.clone())
            .with("size", self.size.to_string())
            .with("offset", "0");
        mapping.insert_opt("id", self.folder.id.clone());
        mapping.insert_opt("path", self.destination_path());
        mapping
    }

    async fn begin(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        if let Some(progress) = &self.progress {
            progress.set_total_size(self.size);
        }
        let Some(template) = self.templates.begin.clone() else {
            return Ok(());
        };

        let (response, sent) = self.dispatch(ctx, &template, self.chunk_size).await?;
        let session = match ctx.read_json::<UploadSession>(response, &template.response_mapping).await? {
            Normalized::ProviderError => return Ok(()),
            Normalized::Value(session) => session,
            Normalized::Empty => session_from_headers(ctx.response_headers(), &template.response_mapping),
            Normalized::Unparsable => UploadSession::default(),
        };
        debug!(session = ?session.session_id, location = ?session.location, "Upload session opened");
        let reported = session.offset;
        self.adopt_session(ctx, session);
        self.advance(ctx, sent);
        self.confirm_offset(reported)
    }

    async fn execute(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        let Some(template) = self.templates.execute.clone() else {
            return Ok(());
        };
        let streaming = sends_data(&template);

        loop {
            if streaming && self.transferred >= self.size {
                break;
            }
            if ctx.is_cancelled() {
                return Err(MultiCloudError::Aborted);
            }

            let (response, sent) = self.dispatch(ctx, &template, self.chunk_size).await?;
            let reported = match ctx.read_json::<UploadSession>(response, &template.response_mapping).await? {
                Normalized::ProviderError => return Ok(()),
                Normalized::Value(session) => {
                    let reported = session.offset;
                    self.adopt_session(ctx, session);
                    reported
                }
                Normalized::Empty | Normalized::Unparsable => 0,
            };
            self.advance(ctx, sent);
            self.confirm_offset(reported)?;

            if !streaming {
                break;
            }
        }
        Ok(())
    }

    async fn finish(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        let Some(template) = self.templates.finish.clone() else {
            if let Some(progress) = &self.progress {
                progress.finish_transfer();
            }
            ctx.set_result(self.uploaded_file());
            return Ok(());
        };

        let remaining = self.size.saturating_sub(self.transferred);
        let (response, sent) = self.dispatch(ctx, &template, remaining).await?;
        match ctx.read_json::<FileDescriptor>(response, &template.response_mapping).await? {
            Normalized::ProviderError => return Ok(()),
            Normalized::Value(mut file) => {
                file.kind.get_or_insert(FileKind::File);
                file.fill_missing();
                ctx.set_result(file);
            }
            Normalized::Empty => ctx.set_result(self.uploaded_file()),
            Normalized::Unparsable => {}
        }
        self.advance(ctx, sent);

        if let Some(progress) = &self.progress {
            progress.finish_transfer();
        }
        debug!(name = %self.name, bytes = self.transferred, "Upload finished");
        Ok(())
    }
}

impl std::fmt::Debug for FileUploadOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUploadOp")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("transferred", &self.transferred)
            .field("session", &self.session)
            .finish()
    }
}
