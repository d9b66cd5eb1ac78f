use crate::compute::{ComputeLoader, ImageBuffer};
use crate::foundation::error::{RayportError, RayportResult};
use crate::memory::SharedMemoryHandle;
use crate::orchestrator::opts::OrchestratorOpts;
use crate::scene::model::RenderRequest;
use crate::worker::handle::WorkerHandle;

/// Owns the shared memory and the worker pool, and sequences their startup.
///
/// Startup runs in a fixed order, each step awaited before the next:
/// 1. allocate the shared memory block,
/// 2. spawn `worker_count` workers,
/// 3. `init(memory)` on every worker,
/// 4. `init_thread_pool(concurrency)` on the leader (worker 0).
///
/// Only the leader receives render calls.
pub struct Orchestrator {
    opts: OrchestratorOpts,
    loader: ComputeLoader,
    memory: SharedMemoryHandle,
    workers: Vec<WorkerHandle>,
    restarts: u32,
}

impl Orchestrator {
    /// Validate `opts` and run the full startup sequence.
    #[tracing::instrument(skip(opts, loader), fields(workers = opts.worker_count, pages = opts.memory_pages))]
    pub fn start(opts: OrchestratorOpts, loader: ComputeLoader) -> RayportResult<Self> {
        opts.validate()?;
        let (memory, workers) = bootstrap(&opts, &loader)?;
        Ok(Self {
            opts,
            loader,
            memory,
            workers,
            restarts: 0,
        })
    }

    /// Options this orchestrator was started with.
    pub fn opts(&self) -> &OrchestratorOpts {
        &self.opts
    }

    /// The shared memory block of the current generation of workers.
    pub fn memory(&self) -> &SharedMemoryHandle {
        &self.memory
    }

    /// All live workers, leader first.
    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// Worker 0. Fails when a restart left the pool empty.
    pub fn leader(&self) -> RayportResult<&WorkerHandle> {
        self.workers
            .first()
            .ok_or_else(|| RayportError::worker_lost("no workers: last bootstrap failed"))
    }

    /// Full re-bootstraps performed so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Render one frame on the leader, honouring the configured render timeout.
    ///
    /// After a [`RayportError::RenderTimeout`] the leader is stalled and every later call fails
    /// with [`RayportError::WorkerLost`] until [`Orchestrator::restart`].
    #[tracing::instrument(skip(self, request), fields(width = request.width, height = request.height))]
    pub fn render_frame(&self, request: &RenderRequest) -> RayportResult<ImageBuffer> {
        self.leader()?
            .render_image(request, self.opts.render_timeout())
    }

    /// Abandon every worker and run the startup sequence again against fresh memory.
    ///
    /// Workers are abandoned rather than joined, since the reason for a restart is usually a
    /// worker that stopped answering.
    #[tracing::instrument(skip(self), fields(restarts = self.restarts))]
    pub fn restart(&mut self) -> RayportResult<()> {
        for worker in self.workers.drain(..) {
            worker.abandon();
        }
        self.restarts += 1;
        let (memory, workers) = bootstrap(&self.opts, &self.loader)?;
        self.memory = memory;
        self.workers = workers;
        tracing::info!(restarts = self.restarts, "orchestrator re-bootstrapped");
        Ok(())
    }

    /// Close every worker channel and join the worker threads. Stalled workers are abandoned.
    pub fn shutdown(mut self) {
        for worker in self.workers.drain(..) {
            release(worker);
        }
        tracing::info!("orchestrator shut down");
    }
}

fn bootstrap(
    opts: &OrchestratorOpts,
    loader: &ComputeLoader,
) -> RayportResult<(SharedMemoryHandle, Vec<WorkerHandle>)> {
    let memory = SharedMemoryHandle::allocate(opts.memory_pages)?;
    tracing::debug!(memory = memory.id().0, bytes = memory.layout().byte_len(), "shared memory allocated");

    let mut workers = Vec::with_capacity(opts.worker_count);
    for index in 0..opts.worker_count {
        match WorkerHandle::spawn_with_fallback_pages(index, loader.clone(), opts.memory_pages) {
            Ok(w) => workers.push(w),
            Err(e) => {
                workers.into_iter().for_each(release);
                return Err(e);
            }
        }
    }

    // Every worker loads in parallel; the step completes once all have answered.
    let pending: Vec<_> = workers
        .iter()
        .map(|w| w.submit_init(Some(&memory)))
        .collect();
    let mut first_err = None;
    for (worker, reply) in workers.iter().zip(pending) {
        if let Err(e) = reply.wait().and_then(|r| r.into_unit()) {
            tracing::error!(worker = worker.index(), error = %e, "worker init failed");
            first_err.get_or_insert(e);
        }
    }
    if let Some(e) = first_err {
        workers.into_iter().for_each(release);
        return Err(e);
    }

    let concurrency = opts.concurrency();
    let pool = match workers.first() {
        Some(leader) => leader.init_thread_pool(concurrency),
        None => Err(RayportError::validation("worker_count must be >= 1")),
    };
    if let Err(e) = pool {
        tracing::error!(error = %e, "leader thread pool init failed");
        workers.into_iter().for_each(release);
        return Err(e);
    }

    tracing::info!(
        workers = workers.len(),
        concurrency = concurrency.get(),
        memory = memory.id().0,
        "orchestrator ready"
    );
    Ok((memory, workers))
}

fn release(worker: WorkerHandle) {
    if worker.is_lost() {
        worker.abandon();
    } else {
        worker.shutdown();
    }
}
