//! Gateway client contract and operation hooks.

use std::time::Duration;

use rcommon::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::{GatewayError, ModelRequest, ModelResponse, StreamHandle};

pub type GatewayFuture<'a, T> = BoxFuture<'a, T>;

/// Connection to an OpenAI-compatible chat-completions gateway.
///
/// Implementations never retry. `stream` returns immediately; all I/O happens on a
/// background task that stops as soon as `cancel` fires.
pub trait GatewayClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> GatewayFuture<'a, Result<ModelResponse, GatewayError>>;

    fn stream(&self, request: ModelRequest, cancel: CancellationToken) -> StreamHandle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOperation {
    Complete,
    Stream,
    ListModels,
}

impl GatewayOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Stream => "stream",
            Self::ListModels => "list_models",
        }
    }
}

/// Observation points around upstream calls. For streams, success means the upstream
/// accepted the request; body-level failures arrive on the stream's error channel.
pub trait GatewayHooks: Send + Sync {
    fn on_request_start(&self, _operation: GatewayOperation, _model: &str) {}

    fn on_request_success(&self, _operation: GatewayOperation, _model: &str, _elapsed: Duration) {
    }

    fn on_request_failure(
        &self,
        _operation: GatewayOperation,
        _model: &str,
        _elapsed: Duration,
        _error: &GatewayError,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGatewayHooks;

impl GatewayHooks for NoopGatewayHooks {}
