use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::compute::{ComputeLoader, ImageBuffer};
use crate::foundation::error::{RayportError, RayportResult};
use crate::memory::{DEFAULT_PAGES, SharedMemoryHandle};
use crate::rpc::client::{PendingReply, RpcClient};
use crate::rpc::message::{RequestPayload, WorkerCall};
use crate::rpc::server::RpcServer;
use crate::scene::model::RenderRequest;
use crate::worker::runtime::WorkerRuntime;

/// Orchestrator-side owner of one worker thread and its RPC client.
pub struct WorkerHandle {
    index: usize,
    client: RpcClient,
    thread: Option<JoinHandle<()>>,
    // Set once a render call timed out; the worker thread may still be inside that call.
    stalled: AtomicBool,
}

impl WorkerHandle {
    /// Spawn worker `index` on its own named thread, hosting a module produced by `loader`.
    pub fn spawn(index: usize, loader: ComputeLoader) -> RayportResult<Self> {
        Self::spawn_with_fallback_pages(index, loader, DEFAULT_PAGES)
    }

    /// Like [`WorkerHandle::spawn`], with the page count used when `init` gets no memory.
    pub fn spawn_with_fallback_pages(
        index: usize,
        loader: ComputeLoader,
        fallback_pages: u32,
    ) -> RayportResult<Self> {
        let name = format!("rayport-worker-{index}");
        let (call_tx, call_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();

        let runtime = WorkerRuntime::new(name.clone(), loader).with_fallback_pages(fallback_pages);
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || RpcServer::new(runtime, call_rx, reply_tx).serve())
            .map_err(|e| {
                RayportError::Other(anyhow::Error::new(e).context(format!("spawn {name}")))
            })?;
        let client = RpcClient::connect(name, call_tx, reply_rx)?;

        tracing::debug!(worker = index, "worker spawned");
        Ok(Self {
            index,
            client,
            thread: Some(thread),
            stalled: AtomicBool::new(false),
        })
    }

    /// Position of this worker in the orchestrator's pool; 0 is the leader.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Worker name used in logs.
    pub fn name(&self) -> &str {
        self.client.name()
    }

    /// The underlying RPC client, for issuing raw calls.
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Issue `init` bound to `memory`. The handle is shared, not copied.
    pub fn submit_init(&self, memory: Option<&SharedMemoryHandle>) -> PendingReply {
        self.client.call(WorkerCall::Init {
            memory: memory.map(SharedMemoryHandle::share),
        })
    }

    /// `init` and wait for it.
    pub fn init(&self, memory: Option<&SharedMemoryHandle>) -> RayportResult<()> {
        self.submit_init(memory).wait()?.into_unit()
    }

    /// `init_thread_pool` and wait for it.
    pub fn init_thread_pool(&self, concurrency: NonZeroUsize) -> RayportResult<()> {
        self.ensure_responsive()?;
        self.client
            .call(WorkerCall::InitThreadPool {
                concurrency: concurrency.get(),
            })
            .wait()?
            .into_unit()
    }

    /// Marshal `request` and issue `render_image` without waiting.
    ///
    /// Fails with [`RayportError::WorkerLost`] once a render on this worker has timed out.
    pub fn submit_render(&self, request: &RenderRequest) -> RayportResult<PendingReply> {
        self.ensure_responsive()?;
        let request = RequestPayload::marshal(request)?;
        Ok(self.client.call(WorkerCall::RenderImage { request }))
    }

    /// `render_image` and wait for the frame, at most `timeout` when set.
    pub fn render_image(
        &self,
        request: &RenderRequest,
        timeout: Option<Duration>,
    ) -> RayportResult<ImageBuffer> {
        let pending = self.submit_render(request)?;
        let reply = match timeout {
            Some(t) => pending.wait_timeout(t).inspect_err(|e| {
                if matches!(e, RayportError::RenderTimeout(_)) {
                    self.stalled.store(true, Ordering::Release);
                    tracing::warn!(worker = self.index, "worker marked stalled until restart");
                }
            })?,
            None => pending.wait()?,
        };
        reply.into_image()
    }

    /// Return `true` once the worker channel has gone away or a render on it timed out.
    pub fn is_lost(&self) -> bool {
        self.is_stalled() || self.client.is_lost()
    }

    /// Return `true` once a render call on this worker has timed out.
    ///
    /// A stalled worker accepts no further calls; only a restart replaces it.
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    fn ensure_responsive(&self) -> RayportResult<()> {
        if self.is_stalled() {
            return Err(RayportError::worker_lost(format!(
                "{}: stalled after a render timeout, restart required",
                self.name()
            )));
        }
        Ok(())
    }

    /// Close the channel and join the worker thread.
    ///
    /// The worker finishes the call it is serving (if any) first, so only use this on a worker
    /// that is known to be responsive; see [`WorkerHandle::abandon`] otherwise.
    pub fn shutdown(mut self) {
        self.client.close();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!(worker = self.index, "worker thread had panicked");
        }
        self.client.join();
        tracing::debug!(worker = self.index, "worker shut down");
    }

    /// Close the channel and detach the worker thread without waiting.
    ///
    /// Used for lost or unresponsive workers: a thread stuck inside the compute module cannot be
    /// interrupted, but it exits as soon as it returns and finds its channel closed.
    pub fn abandon(mut self) {
        self.client.close();
        self.thread.take();
        tracing::debug!(worker = self.index, "worker abandoned");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/worker/handle.rs"]
mod tests;
