#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rayport::{
    ComputeLoader, ComputeModule, ImageBuffer, RayportError, RayportResult, RenderRequest,
    SharedMemoryHandle,
};

/// What a [`StubModule`] saw, shared with the test.
#[derive(Default)]
pub struct StubLog {
    pub bound: Mutex<Vec<SharedMemoryHandle>>,
    pub pools: Mutex<Vec<usize>>,
    pub renders: Mutex<Vec<(Instant, Instant)>>,
}

impl StubLog {
    pub fn render_count(&self) -> usize {
        self.renders.lock().unwrap().len()
    }
}

/// Compute module that fills frames with a fixed colour and records every call.
pub struct StubModule {
    pub log: Arc<StubLog>,
    pub colour: [u8; 4],
    pub render_time: Duration,
    pub panic_on_render: bool,
}

impl ComputeModule for StubModule {
    fn initialize_runtime(&mut self, memory: SharedMemoryHandle) -> RayportResult<()> {
        self.log.bound.lock().unwrap().push(memory);
        Ok(())
    }

    fn initialize_thread_pool(&mut self, concurrency: NonZeroUsize) -> RayportResult<()> {
        self.log.pools.lock().unwrap().push(concurrency.get());
        Ok(())
    }

    fn render_image(&mut self, request: &RenderRequest) -> RayportResult<ImageBuffer> {
        if self.panic_on_render {
            panic!("stub module crashed");
        }
        let start = Instant::now();
        std::thread::sleep(self.render_time);
        let end = Instant::now();
        self.log.renders.lock().unwrap().push((start, end));
        if request.width > 4096 {
            return Err(RayportError::render("stub refuses huge frames"));
        }
        Ok(ImageBuffer::filled(request.width, request.height, self.colour))
    }
}

pub fn stub_loader(colour: [u8; 4], render_time: Duration) -> (ComputeLoader, Arc<StubLog>) {
    let log = Arc::new(StubLog::default());
    let l = Arc::clone(&log);
    let loader = rayport::loader(move || {
        Ok(Box::new(StubModule {
            log: Arc::clone(&l),
            colour,
            render_time,
            panic_on_render: false,
        }))
    });
    (loader, log)
}

pub fn panicking_loader() -> ComputeLoader {
    rayport::loader(|| {
        Ok(Box::new(StubModule {
            log: Arc::new(StubLog::default()),
            colour: [0; 4],
            render_time: Duration::ZERO,
            panic_on_render: true,
        }))
    })
}
