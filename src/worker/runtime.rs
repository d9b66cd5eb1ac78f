use std::num::NonZeroUsize;

use crate::compute::{ComputeLoader, ComputeModule, ImageBuffer};
use crate::foundation::error::{RayportError, RayportResult};
use crate::memory::{DEFAULT_PAGES, SharedMemoryHandle};
use crate::scene::model::RenderRequest;

/// Lifecycle of one worker. Only ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallState {
    /// No compute module yet.
    Unloaded,
    /// Compute module loaded and bound to shared memory.
    Loaded,
    /// Compute module thread pool built; render calls are accepted.
    ThreadPoolReady,
}

/// Hosts one compute module and enforces `init → init_thread_pool → render_image`.
///
/// The module lives in this struct, not in any process-wide slot: every worker owns its own.
/// Out-of-order calls are rejected without touching the module.
pub struct WorkerRuntime {
    name: String,
    loader: ComputeLoader,
    fallback_pages: u32,
    module: Option<Box<dyn ComputeModule>>,
    state: CallState,
}

impl WorkerRuntime {
    /// Create an unloaded runtime that will load its module through `loader`.
    pub fn new(name: impl Into<String>, loader: ComputeLoader) -> Self {
        Self {
            name: name.into(),
            loader,
            fallback_pages: DEFAULT_PAGES,
            module: None,
            state: CallState::Unloaded,
        }
    }

    /// Pages allocated by `init(None)`.
    pub fn with_fallback_pages(mut self, pages: u32) -> Self {
        self.fallback_pages = pages;
        self
    }

    /// Worker name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CallState {
        self.state
    }

    /// Fail unless the runtime has reached at least `needed`.
    pub fn require(&self, needed: CallState) -> RayportResult<()> {
        match (self.state, needed) {
            (have, needed) if have >= needed => Ok(()),
            (CallState::Unloaded, _) => Err(RayportError::NotLoaded),
            _ => Err(RayportError::NotPoolReady),
        }
    }

    /// Load the compute module and bind it to `memory`, or to a freshly allocated block when
    /// `None`.
    pub fn init(&mut self, memory: Option<SharedMemoryHandle>) -> RayportResult<()> {
        if self.state != CallState::Unloaded {
            return Err(RayportError::AlreadyLoaded);
        }

        let memory = match memory {
            Some(m) => m,
            None => SharedMemoryHandle::allocate(self.fallback_pages)
                .map_err(|e| RayportError::load(format!("allocate worker memory: {e}")))?,
        };
        let memory_id = memory.id();

        let mut module = (self.loader)().map_err(as_load_error)?;
        module.initialize_runtime(memory).map_err(as_load_error)?;

        self.module = Some(module);
        self.state = CallState::Loaded;
        tracing::info!(worker = %self.name, memory = memory_id.0, "compute module loaded");
        Ok(())
    }

    /// Build the compute module's thread pool with `concurrency` lanes.
    pub fn init_thread_pool(&mut self, concurrency: NonZeroUsize) -> RayportResult<()> {
        match self.state {
            CallState::Unloaded => return Err(RayportError::NotLoaded),
            CallState::ThreadPoolReady => return Err(RayportError::AlreadyPoolReady),
            CallState::Loaded => {}
        }
        let module = self.module.as_mut().ok_or(RayportError::NotLoaded)?;
        module
            .initialize_thread_pool(concurrency)
            .map_err(as_load_error)?;

        self.state = CallState::ThreadPoolReady;
        tracing::info!(worker = %self.name, concurrency = concurrency.get(), "thread pool ready");
        Ok(())
    }

    /// Render one frame. Module failures surface as [`RayportError::Render`].
    pub fn render_image(&mut self, request: &RenderRequest) -> RayportResult<ImageBuffer> {
        self.require(CallState::ThreadPoolReady)?;
        let module = self.module.as_mut().ok_or(RayportError::NotLoaded)?;
        module.render_image(request).map_err(|e| match e {
            RayportError::Render(_) => e,
            other => RayportError::render(other.to_string()),
        })
    }
}

fn as_load_error(e: RayportError) -> RayportError {
    match e {
        RayportError::Load(_) => e,
        other => RayportError::load(other.to_string()),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/worker/runtime.rs"]
mod tests;
