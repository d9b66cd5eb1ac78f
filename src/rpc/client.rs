use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::foundation::error::{RayportError, RayportResult};
use crate::rpc::message::{CallId, Envelope, Reply, WorkerCall, WorkerReturn};

type Waiter = mpsc::SyncSender<RayportResult<WorkerReturn>>;

#[derive(Default)]
struct PendingCalls {
    waiters: HashMap<CallId, Waiter>,
    // Set once the reply channel closes; every later call fails immediately.
    lost: Option<String>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Orchestrator-side end of one worker channel.
///
/// [`RpcClient::call`] never blocks: it registers a waiter under a fresh [`CallId`], posts the
/// envelope and hands back a [`PendingReply`]. A router thread matches replies to waiters by id,
/// so several calls may be outstanding and resolve in any order the worker answers them.
///
/// When the worker side goes away (thread exit or panic) the router rejects every outstanding
/// waiter with [`RayportError::WorkerLost`], and all later calls fail the same way.
pub struct RpcClient {
    name: String,
    next_id: AtomicU64,
    outbox: Mutex<Option<mpsc::Sender<Envelope>>>,
    pending: Arc<Mutex<PendingCalls>>,
    router: Option<JoinHandle<()>>,
}

impl RpcClient {
    pub(crate) fn connect(
        name: impl Into<String>,
        outbox: mpsc::Sender<Envelope>,
        inbox: mpsc::Receiver<Reply>,
    ) -> RayportResult<Self> {
        let name = name.into();
        let pending = Arc::new(Mutex::new(PendingCalls::default()));
        let router = std::thread::Builder::new()
            .name(format!("{name}-router"))
            .spawn({
                let pending = Arc::clone(&pending);
                let name = name.clone();
                move || route_replies(&name, inbox, &pending)
            })
            .map_err(|e| {
                RayportError::Other(anyhow::Error::new(e).context("spawn rpc router thread"))
            })?;

        Ok(Self {
            name,
            next_id: AtomicU64::new(1),
            outbox: Mutex::new(Some(outbox)),
            pending,
            router: Some(router),
        })
    }

    /// Name of the worker this client talks to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Issue `call` and return a handle to its eventual reply.
    pub fn call(&self, call: WorkerCall) -> PendingReply {
        let id = CallId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let op = call.name();
        let (tx, rx) = mpsc::sync_channel(1);
        let reply = PendingReply {
            id,
            op,
            worker: self.name.clone(),
            rx,
        };

        {
            let mut pending = lock(&self.pending);
            if let Some(reason) = &pending.lost {
                let _ = tx.send(Err(RayportError::worker_lost(format!(
                    "{}: {reason}",
                    self.name
                ))));
                return reply;
            }
            pending.waiters.insert(id, tx);
        }

        let sent = match lock(&self.outbox).as_ref() {
            Some(outbox) => outbox.send(Envelope { id, call }).is_ok(),
            None => false,
        };
        if !sent && let Some(tx) = lock(&self.pending).waiters.remove(&id) {
            let _ = tx.send(Err(RayportError::worker_lost(format!(
                "{}: channel closed before '{op}' was sent",
                self.name
            ))));
        }

        tracing::trace!(worker = %self.name, call = id.0, op, "rpc call issued");
        reply
    }

    /// Number of calls issued but not yet answered.
    pub fn outstanding(&self) -> usize {
        lock(&self.pending).waiters.len()
    }

    /// Return `true` once the worker side of the channel has gone away.
    pub fn is_lost(&self) -> bool {
        lock(&self.pending).lost.is_some()
    }

    /// Close the sending half. The worker drains what it already received, then exits.
    pub fn close(&self) {
        lock(&self.outbox).take();
    }

    /// Close and wait for the router to observe the worker going away.
    ///
    /// Only call this once the worker thread has exited (or is known to be exiting); a worker
    /// stuck inside the compute module keeps the router alive.
    pub(crate) fn join(mut self) {
        self.close();
        if let Some(router) = self.router.take()
            && router.join().is_err()
        {
            tracing::error!(worker = %self.name, "rpc router thread panicked");
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn route_replies(name: &str, inbox: mpsc::Receiver<Reply>, pending: &Mutex<PendingCalls>) {
    for Reply { id, result } in inbox.iter() {
        let waiter = lock(pending).waiters.remove(&id);
        match waiter {
            // The caller may have stopped waiting (timeout); the result is discarded then.
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => tracing::warn!(worker = name, call = id.0, "dropping reply for unknown call"),
        }
    }

    let mut pending = lock(pending);
    pending.lost = Some("reply channel closed".to_string());
    let outstanding = pending.waiters.len();
    for (id, tx) in pending.waiters.drain() {
        let _ = tx.send(Err(RayportError::worker_lost(format!(
            "{name}: reply channel closed with call {} outstanding",
            id.0
        ))));
    }
    if outstanding > 0 {
        tracing::warn!(
            worker = name,
            outstanding,
            "worker channel closed, rejected outstanding calls"
        );
    } else {
        tracing::debug!(worker = name, "worker channel closed");
    }
}

/// The eventual reply to one [`RpcClient::call`].
#[must_use = "a pending reply does nothing unless waited on"]
#[derive(Debug)]
pub struct PendingReply {
    id: CallId,
    op: &'static str,
    worker: String,
    rx: mpsc::Receiver<RayportResult<WorkerReturn>>,
}

impl PendingReply {
    /// Correlation token of the call.
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Operation name of the call.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Block until the worker answers or the channel is lost.
    pub fn wait(self) -> RayportResult<WorkerReturn> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(mpsc::RecvError) => Err(self.lost()),
        }
    }

    /// Like [`PendingReply::wait`], but give up after `timeout` with
    /// [`RayportError::RenderTimeout`]. A reply arriving later is discarded.
    pub fn wait_timeout(self, timeout: Duration) -> RayportResult<WorkerReturn> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(worker = %self.worker, call = self.id.0, op = self.op, ?timeout, "rpc call timed out");
                Err(RayportError::RenderTimeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(self.lost()),
        }
    }

    fn lost(&self) -> RayportError {
        RayportError::worker_lost(format!(
            "{}: '{}' call {} was dropped without a reply",
            self.worker, self.op, self.id.0
        ))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/rpc/client.rs"]
mod tests;
