use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{RayportError, RayportResult};
use crate::memory::{DEFAULT_PAGES, MemoryLayout};
use crate::scene::model::RenderRequest;

/// Options controlling bootstrap and the render loop.
///
/// Every field has a default, so a JSON config only needs the fields it overrides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorOpts {
    /// Workers to spawn. Worker 0 is the leader and the only render target.
    pub worker_count: usize,
    /// Leader thread-pool lanes. `None` uses the host's available parallelism.
    pub concurrency: Option<usize>,
    /// Size of the shared memory block in 64 KiB pages.
    pub memory_pages: u32,
    /// Pause after each published frame before the next request.
    pub frame_delay_ms: u64,
    /// Give up on a render call after this long. `None` waits forever.
    pub render_timeout_ms: Option<u64>,
    /// Full re-bootstraps allowed after a worker is lost before the loop aborts.
    pub max_restarts: u32,
    /// Render errors tolerated in a row before the loop aborts.
    pub max_consecutive_failures: u32,
    /// Stop after this many published frames. `None` runs until stopped.
    pub max_frames: Option<u64>,
}

impl Default for OrchestratorOpts {
    fn default() -> Self {
        Self {
            worker_count: 1,
            concurrency: None,
            memory_pages: DEFAULT_PAGES,
            frame_delay_ms: 1,
            render_timeout_ms: None,
            max_restarts: 2,
            max_consecutive_failures: 3,
            max_frames: None,
        }
    }
}

impl OrchestratorOpts {
    /// Parse options from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> RayportResult<Self> {
        let opts: Self = serde_json::from_reader(r)
            .map_err(|e| RayportError::validation(format!("parse orchestrator config: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Parse options from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> RayportResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            RayportError::validation(format!(
                "open orchestrator config '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Reject settings bootstrap cannot honour.
    pub fn validate(&self) -> RayportResult<()> {
        if self.worker_count == 0 {
            return Err(RayportError::validation("worker_count must be >= 1"));
        }
        if self.concurrency == Some(0) {
            return Err(RayportError::validation(
                "concurrency must be >= 1 when set",
            ));
        }
        if self.render_timeout_ms == Some(0) {
            return Err(RayportError::validation(
                "render_timeout_ms must be >= 1 when set",
            ));
        }
        MemoryLayout::new(self.memory_pages)?;
        Ok(())
    }

    /// Grow [`OrchestratorOpts::memory_pages`] until one frame of `request` fits.
    ///
    /// Never shrinks a larger configured block. Fails when the frame would need more than
    /// [`crate::MAX_PAGES`].
    pub fn fit_frame(&mut self, request: &RenderRequest) -> RayportResult<()> {
        let needed = MemoryLayout::for_pixels(request.pixel_count())?;
        if needed.pages > self.memory_pages {
            tracing::debug!(
                from = self.memory_pages,
                to = needed.pages,
                "growing shared memory to fit frame"
            );
            self.memory_pages = needed.pages;
        }
        Ok(())
    }

    /// Lane count for the leader's thread pool.
    pub fn concurrency(&self) -> NonZeroUsize {
        self.concurrency
            .and_then(NonZeroUsize::new)
            .or_else(|| std::thread::available_parallelism().ok())
            .unwrap_or(NonZeroUsize::MIN)
    }

    /// [`OrchestratorOpts::frame_delay_ms`] as a duration.
    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    /// [`OrchestratorOpts::render_timeout_ms`] as a duration.
    pub fn render_timeout(&self) -> Option<Duration> {
        self.render_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/orchestrator/opts.rs"]
mod tests;
