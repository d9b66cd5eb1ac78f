use std::num::NonZeroUsize;
use std::sync::atomic::Ordering;

use rayon::prelude::*;

use crate::compute::tracer::RayTracer;
use crate::compute::{ComputeLoader, ComputeModule, ImageBuffer};
use crate::foundation::error::{RayportError, RayportResult};
use crate::memory::SharedMemoryHandle;
use crate::scene::model::RenderRequest;

/// The bundled compute module: a CPU ray tracer whose lanes are a dedicated rayon pool.
///
/// Frames are traced straight into the bound [`SharedMemoryHandle`], one packed RGBA8 word per
/// pixel with each lane owning whole rows, then read back into an [`ImageBuffer`]. A frame must
/// therefore fit into the memory block.
#[derive(Default)]
pub struct RayTracerModule {
    memory: Option<SharedMemoryHandle>,
    pool: Option<rayon::ThreadPool>,
}

impl RayTracerModule {
    /// Create an unbound module.
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`ComputeLoader`] producing a fresh `RayTracerModule` per worker.
    pub fn loader() -> ComputeLoader {
        crate::compute::loader(|| Ok(Box::new(RayTracerModule::new())))
    }

    /// Number of lanes, once the thread pool exists.
    pub fn lanes(&self) -> Option<usize> {
        self.pool.as_ref().map(rayon::ThreadPool::current_num_threads)
    }
}

impl ComputeModule for RayTracerModule {
    fn initialize_runtime(&mut self, memory: SharedMemoryHandle) -> RayportResult<()> {
        if self.memory.is_some() {
            return Err(RayportError::load("ray tracer runtime is already bound"));
        }
        tracing::debug!(memory = memory.id().0, "ray tracer bound to shared memory");
        self.memory = Some(memory);
        Ok(())
    }

    fn initialize_thread_pool(&mut self, concurrency: NonZeroUsize) -> RayportResult<()> {
        if self.memory.is_none() {
            return Err(RayportError::load(
                "ray tracer thread pool requires a bound runtime",
            ));
        }
        if self.pool.is_some() {
            return Err(RayportError::load("ray tracer thread pool already exists"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.get())
            .thread_name(|i| format!("rayport-lane-{i}"))
            .build()
            .map_err(|e| RayportError::load(format!("failed to build rayon thread pool: {e}")))?;
        self.pool = Some(pool);
        Ok(())
    }

    fn render_image(&mut self, request: &RenderRequest) -> RayportResult<ImageBuffer> {
        request
            .validate()
            .map_err(|e| RayportError::render(e.to_string()))?;
        let (Some(memory), Some(pool)) = (self.memory.as_ref(), self.pool.as_ref()) else {
            return Err(RayportError::render("ray tracer is not initialized"));
        };

        let n = request.pixel_count();
        let words = memory.words();
        if n > words.len() {
            return Err(RayportError::render(format!(
                "frame of {n} pixels exceeds shared memory capacity of {} words",
                words.len()
            )));
        }
        let frame = &words[..n];
        let width = request.width as usize;
        let tracer = RayTracer::new(request);

        pool.install(|| {
            frame
                .par_chunks(width)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, word) in row.iter().enumerate() {
                        word.store(tracer.pixel_word(x as u32, y as u32), Ordering::Relaxed);
                    }
                });
        });

        // `install` returns after every lane has finished its rows.
        let mut data = Vec::with_capacity(n * 4);
        for word in frame {
            data.extend_from_slice(&word.load(Ordering::Relaxed).to_le_bytes());
        }
        ImageBuffer::new(request.width, request.height, data)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compute/module.rs"]
mod tests;
