//! Operation runner
//!
//! Every provider call is an [`Operation`]: a linear three-phase lifecycle
//! `CREATED → BEGIN → EXECUTE → FINISH → DONE`. An [`OperationHandler`]
//! supplies the phase bodies; the runner owns the lifecycle, the
//! [`OperationContext`] each phase works through, and cancellation.
//!
//! ## Components
//!
//! - [`OperationHandler`] - Per-operation phase bodies (default no-op)
//! - [`OperationContext`] - Client, placeholder table, result and error slots
//! - [`Operation`] - Runs the phases once, in order
//! - [`OperationOutcome`] - The result/error pair handed back to callers
//!
//! ## Failure semantics
//!
//! A phase returning `Err` stops the run; the state records the failed
//! phase. A provider error response (HTTP status ≥ 400) is not an `Err`:
//! it is stored in the context and also stops the remaining phases.

use std::collections::BTreeMap;

use multicloud_core::domain::{OperationError, OperationKind, RequestTemplate};
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::CloudClient;
use crate::mapping::PropertyMapping;
use crate::normalize::{parse_error, ResponseNormalizer};
use crate::{MultiCloudError, Result};

// ============================================================================
// Lifecycle state
// ============================================================================

/// One phase of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationPhase {
    Begin,
    Execute,
    Finish,
}

impl OperationPhase {
    pub const ALL: [OperationPhase; 3] = [
        OperationPhase::Begin,
        OperationPhase::Execute,
        OperationPhase::Finish,
    ];
}

impl std::fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationPhase::Begin => write!(f, "begin"),
            OperationPhase::Execute => write!(f, "execute"),
            OperationPhase::Finish => write!(f, "finish"),
        }
    }
}

/// Lifecycle state of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Created,
    Running(OperationPhase),
    Done,
    /// Stopped by an error or a provider error response in this phase
    Failed(OperationPhase),
    /// Aborted before this phase started
    Aborted(OperationPhase),
}

impl OperationState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, OperationState::Created | OperationState::Running(_))
    }
}

// ============================================================================
// Context
// ============================================================================

/// How a response body turned out
#[derive(Debug)]
pub enum Normalized<R> {
    /// The body was decoded into a canonical value
    Value(R),
    /// Success status with an empty body
    Empty,
    /// Success status, but the body could not be decoded
    Unparsable,
    /// Error status; the error is stored on the context
    ProviderError,
}

/// Working state shared by the phases of one operation
#[derive(Debug)]
pub struct OperationContext<T> {
    client: CloudClient,
    mapping: PropertyMapping,
    result: Option<T>,
    error: Option<OperationError>,
    parse_failure: Option<String>,
    response_headers: HeaderMap,
    cancel: CancellationToken,
}

impl<T> OperationContext<T> {
    pub(crate) fn new(client: CloudClient, mapping: PropertyMapping) -> Self {
        Self {
            client,
            mapping,
            result: None,
            error: None,
            parse_failure: None,
            response_headers: HeaderMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn client(&self) -> &CloudClient {
        &self.client
    }

    pub fn mapping(&self) -> &PropertyMapping {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut PropertyMapping {
        &mut self.mapping
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn set_result(&mut self, result: T) {
        self.result = Some(result);
    }

    pub fn error(&self) -> Option<&OperationError> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, error: OperationError) {
        self.error = Some(error);
    }

    /// Headers of the most recent response
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Builds a request from a template with the current placeholder table
    pub fn prepare(&self, template: &RequestTemplate) -> Result<RequestBuilder> {
        self.client.prepare(template, &self.mapping)
    }

    /// Sends a request and records the response headers
    pub async fn send(&mut self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        debug!(
            status = response.status().as_u16(),
            url = %response.url().path(),
            "Received provider response"
        );
        self.response_headers = response.headers().clone();
        Ok(response)
    }

    /// Reads a response body and normalizes it with `mapping`
    ///
    /// Error statuses are parsed into an [`OperationError`] stored on the
    /// context. Undecodable success bodies are recorded as a parse failure
    /// and reported as [`Normalized::Unparsable`].
    pub async fn read_json<R: DeserializeOwned>(
        &mut self,
        response: Response,
        mapping: &BTreeMap<String, String>,
    ) -> Result<Normalized<R>> {
        let status = response.status();
        let body = response.bytes().await?;

        if status.as_u16() >= 400 {
            let error = parse_error(status.as_u16(), status.canonical_reason(), &body);
            warn!(code = error.code, message = ?error.message, "Provider returned an error");
            self.error = Some(error);
            return Ok(Normalized::ProviderError);
        }

        match ResponseNormalizer::new(mapping).decode::<R>(&body) {
            Ok(Some(value)) => Ok(Normalized::Value(value)),
            Ok(None) => Ok(Normalized::Empty),
            Err(e) => {
                warn!(error = %e, "Failed to decode provider response");
                self.parse_failure = Some(e.to_string());
                Ok(Normalized::Unparsable)
            }
        }
    }

    /// Prepares, sends and normalizes one templated request
    pub async fn request_json<R: DeserializeOwned>(
        &mut self,
        template: &RequestTemplate,
    ) -> Result<Normalized<R>> {
        let request = self.prepare(template)?;
        let response = self.send(request).await?;
        self.read_json(response, &template.response_mapping).await
    }
}

// ============================================================================
// Handler trait
// ============================================================================

/// Phase bodies of one concrete operation
///
/// Phases default to no-ops; most read-only operations only implement
/// [`OperationHandler::execute`].
#[async_trait::async_trait]
pub trait OperationHandler: Send {
    /// Canonical result type
    type Output: Send;

    /// Logical operation this handler implements
    fn kind(&self) -> OperationKind;

    /// Initial placeholder table
    fn property_mapping(&self) -> PropertyMapping {
        PropertyMapping::new()
    }

    async fn begin(&mut self, _ctx: &mut OperationContext<Self::Output>) -> Result<()> {
        Ok(())
    }

    async fn execute(&mut self, _ctx: &mut OperationContext<Self::Output>) -> Result<()> {
        Ok(())
    }

    async fn finish(&mut self, _ctx: &mut OperationContext<Self::Output>) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Operation
// ============================================================================

/// Result and error of a finished operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome<T> {
    pub state: OperationState,
    pub result: Option<T>,
    pub error: Option<OperationError>,
}

impl<T> OperationOutcome<T> {
    /// Whether the run completed without a provider error
    pub fn is_success(&self) -> bool {
        self.state == OperationState::Done && self.error.is_none()
    }
}

/// Runs an [`OperationHandler`] through its three phases, once
pub struct Operation<H: OperationHandler> {
    handler: H,
    ctx: OperationContext<H::Output>,
    state: OperationState,
}

impl<H: OperationHandler> Operation<H> {
    /// Creates an operation in the `Created` state
    ///
    /// # Arguments
    /// * `handler` - The concrete operation
    /// * `client` - Client carrying the account token
    pub fn new(handler: H, client: CloudClient) -> Self {
        let mapping = handler.property_mapping();
        Self {
            handler,
            ctx: OperationContext::new(client, mapping),
            state: OperationState::Created,
        }
    }

    /// Uses an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.ctx.cancel = token;
        self
    }

    /// Runs begin, execute and finish in order
    ///
    /// Cancellation is checked before each phase.
    ///
    /// # Errors
    /// - [`MultiCloudError::AlreadyExecuted`] on a second call
    /// - [`MultiCloudError::Aborted`] when cancelled between phases
    /// - Any error a phase returns
    pub async fn execute(&mut self) -> Result<()> {
        if self.state != OperationState::Created {
            return Err(MultiCloudError::AlreadyExecuted);
        }

        let kind = self.handler.kind();
        for phase in OperationPhase::ALL {
            if self.ctx.is_cancelled() {
                debug!(%kind, %phase, "Operation aborted");
                self.state = OperationState::Aborted(phase);
                return Err(MultiCloudError::Aborted);
            }

            self.state = OperationState::Running(phase);
            debug!(%kind, %phase, "Entering operation phase");

            let outcome = match phase {
                OperationPhase::Begin => self.handler.begin(&mut self.ctx).await,
                OperationPhase::Execute => self.handler.execute(&mut self.ctx).await,
                OperationPhase::Finish => self.handler.finish(&mut self.ctx).await,
            };

            if let Err(e) = outcome {
                warn!(%kind, %phase, error = %e, "Operation phase failed");
                self.state = OperationState::Failed(phase);
                return Err(e);
            }
            if self.ctx.error.is_some() {
                self.state = OperationState::Failed(phase);
                return Ok(());
            }
        }

        self.state = OperationState::Done;
        debug!(%kind, "Operation finished");
        Ok(())
    }

    /// Requests cancellation; checked before the next phase starts
    pub fn abort(&self) {
        self.ctx.cancel.cancel();
    }

    /// Token that aborts this operation from another task
    pub fn abort_handle(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    pub fn kind(&self) -> OperationKind {
        self.handler.kind()
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Canonical result, if the run produced one
    pub fn result(&self) -> Option<&H::Output> {
        self.ctx.result.as_ref()
    }

    /// Provider error of the run, if any
    pub fn error(&self) -> Option<&OperationError> {
        self.ctx.error.as_ref()
    }

    /// Description of a response body that could not be decoded
    pub fn parse_failure(&self) -> Option<&str> {
        self.ctx.parse_failure.as_deref()
    }

    /// Headers of the last response
    pub fn response_headers(&self) -> &HeaderMap {
        &self.ctx.response_headers
    }

    /// Consumes the operation into its outcome
    pub fn into_outcome(self) -> OperationOutcome<H::Output> {
        OperationOutcome {
            state: self.state,
            result: self.ctx.result,
            error: self.ctx.error,
        }
    }
}

impl<H: OperationHandler> std::fmt::Debug for Operation<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("kind", &self.handler.kind())
            .field("state", &self.state)
            .field("error", &self.ctx.error)
            .finish()
    }
}
