use std::num::NonZeroUsize;
use std::sync::mpsc;

use crate::foundation::error::{RayportError, RayportResult};
use crate::rpc::message::{Envelope, Reply, WorkerCall, WorkerReturn};
use crate::worker::runtime::{CallState, WorkerRuntime};

/// Worker-side end of one channel: answers envelopes strictly in arrival order.
pub(crate) struct RpcServer {
    runtime: WorkerRuntime,
    inbox: mpsc::Receiver<Envelope>,
    outbox: mpsc::Sender<Reply>,
}

impl RpcServer {
    pub(crate) fn new(
        runtime: WorkerRuntime,
        inbox: mpsc::Receiver<Envelope>,
        outbox: mpsc::Sender<Reply>,
    ) -> Self {
        Self {
            runtime,
            inbox,
            outbox,
        }
    }

    /// Serve until the orchestrator closes the channel. A panic inside the compute module
    /// unwinds through here and drops `outbox`, which the client reports as a lost worker.
    pub(crate) fn serve(mut self) {
        let worker = self.runtime.name().to_string();
        tracing::debug!(worker = %worker, "worker serving");

        while let Ok(Envelope { id, call }) = self.inbox.recv() {
            let op = call.name();
            let result = self.dispatch(call);
            if let Err(e) = &result {
                tracing::debug!(worker = %worker, call = id.0, op, error = %e, "call rejected");
            }
            if self.outbox.send(Reply { id, result }).is_err() {
                break;
            }
        }

        tracing::debug!(worker = %worker, state = ?self.runtime.state(), "worker exiting");
    }

    fn dispatch(&mut self, call: WorkerCall) -> RayportResult<WorkerReturn> {
        match call {
            WorkerCall::Init { memory } => self.runtime.init(memory).map(|()| WorkerReturn::Unit),
            WorkerCall::InitThreadPool { concurrency } => {
                let concurrency = NonZeroUsize::new(concurrency).ok_or_else(|| {
                    RayportError::validation("init_thread_pool concurrency must be >= 1")
                })?;
                self.runtime
                    .init_thread_pool(concurrency)
                    .map(|()| WorkerReturn::Unit)
            }
            WorkerCall::RenderImage { request } => {
                // Order violations are reported before the payload is even unmarshaled.
                self.runtime.require(CallState::ThreadPoolReady)?;
                let request = request.unmarshal()?;
                self.runtime.render_image(&request).map(WorkerReturn::Image)
            }
        }
    }
}
