use std::time::Duration;

/// Convenience result type used across rayport.
pub type RayportResult<T> = Result<T, RayportError>;

/// Top-level error taxonomy shared by the worker runtime, the RPC transport and the orchestrator.
///
/// Errors raised inside a worker travel back over the transport unchanged, so the orchestrator
/// sees the same variant the worker produced.
#[derive(thiserror::Error, Debug)]
pub enum RayportError {
    /// The compute module failed to load or to initialize its runtime or thread pool.
    #[error("load error: {0}")]
    Load(String),

    /// An operation that needs a loaded compute module was invoked before `init`.
    #[error("call order error: worker is not loaded")]
    NotLoaded,

    /// `init` was invoked on a worker that is already loaded.
    #[error("call order error: worker is already loaded")]
    AlreadyLoaded,

    /// `render_image` was invoked before the thread pool was initialized.
    #[error("call order error: worker thread pool is not initialized")]
    NotPoolReady,

    /// `init_thread_pool` was invoked on a worker whose thread pool already exists.
    #[error("call order error: worker thread pool is already initialized")]
    AlreadyPoolReady,

    /// The compute module raised an internal failure while rendering.
    #[error("render error: {0}")]
    Render(String),

    /// The worker channel closed while a call was outstanding (or before it was issued).
    #[error("worker lost: {0}")]
    WorkerLost(String),

    /// A render call did not resolve within the configured timeout.
    #[error("render timeout: no reply after {0:?}")]
    RenderTimeout(Duration),

    /// Invalid user-provided options or request data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when marshaling or unmarshaling data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RayportError {
    /// Build a [`RayportError::Load`] value.
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Build a [`RayportError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`RayportError::WorkerLost`] value.
    pub fn worker_lost(msg: impl Into<String>) -> Self {
        Self::WorkerLost(msg.into())
    }

    /// Build a [`RayportError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`RayportError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` when the error ends the worker's pipeline.
    ///
    /// The only way to recover from a fatal error is a full bootstrap against a newly spawned
    /// worker.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::WorkerLost(_) | Self::RenderTimeout(_))
    }

    /// Return `true` for operations invoked out of the `init → init_thread_pool → render_image`
    /// sequence.
    pub fn is_call_order(&self) -> bool {
        matches!(
            self,
            Self::NotLoaded | Self::AlreadyLoaded | Self::NotPoolReady | Self::AlreadyPoolReady
        )
    }
}

impl From<serde_json::Error> for RayportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
