//! The compute module capability consumed by each worker.
//!
//! The worker runtime only ever talks to a [`ComputeModule`] trait object: it loads one through a
//! [`ComputeLoader`], binds it to shared memory, asks it to build its thread pool and then asks it
//! for frames. [`RayTracerModule`] is the bundled implementation.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::foundation::error::{RayportError, RayportResult};
use crate::memory::SharedMemoryHandle;
use crate::scene::model::RenderRequest;

pub(crate) mod module;
pub(crate) mod tracer;

pub use module::RayTracerModule;

/// A rendered frame as RGBA8 pixels (straight alpha), tightly packed, row-major.
///
/// Ownership moves from the worker to the orchestrator when a render call resolves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBuffer {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, `width * height * 4` long.
    pub data: Vec<u8>,
}

impl ImageBuffer {
    /// Build a buffer, checking that `data` matches the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> RayportResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(RayportError::validation(format!(
                "image data is {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A `width x height` buffer with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            data: rgba.repeat(n),
        }
    }

    /// The pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// An opaque rendering engine hosted by one worker.
///
/// Implementations may assume the worker runtime calls these methods in order
/// (`initialize_runtime`, then `initialize_thread_pool`, then any number of `render_image`) and
/// never concurrently.
pub trait ComputeModule: Send {
    /// Bind the module to the memory block its allocator and lanes will use.
    fn initialize_runtime(&mut self, memory: SharedMemoryHandle) -> RayportResult<()>;

    /// Spin up `concurrency` internal lanes that share the bound memory.
    fn initialize_thread_pool(&mut self, concurrency: NonZeroUsize) -> RayportResult<()>;

    /// Render one full frame.
    fn render_image(&mut self, request: &RenderRequest) -> RayportResult<ImageBuffer>;
}

/// Factory that loads a fresh [`ComputeModule`] inside a worker.
///
/// Called once per worker during `init`; every worker gets its own module instance.
pub type ComputeLoader = Arc<dyn Fn() -> RayportResult<Box<dyn ComputeModule>> + Send + Sync>;

/// Wrap a closure as a [`ComputeLoader`].
pub fn loader<F>(f: F) -> ComputeLoader
where
    F: Fn() -> RayportResult<Box<dyn ComputeModule>> + Send + Sync + 'static,
{
    Arc::new(f)
}
