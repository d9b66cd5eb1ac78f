//! Rayport drives a compute-heavy rendering module on background worker threads.
//!
//! An orchestrating thread allocates one shared memory block, spawns workers, and walks each of
//! them through a fixed lifecycle before asking the leader for frames:
//!
//! - [`Orchestrator::start`]: allocate memory, spawn workers, `init(memory)` each, then
//!   `init_thread_pool(concurrency)` on the leader
//! - [`Orchestrator::render_frame`] or [`Orchestrator::run_render_loop`]: one request in flight,
//!   frames handed to a [`FramePublisher`]
//!
//! Workers host a [`ComputeModule`] through a [`WorkerRuntime`], which rejects calls made out of
//! order. Calls travel over a call-id-correlated channel ([`RpcClient`]); a worker that goes away
//! fails every outstanding call with [`RayportError::WorkerLost`]. [`RayTracerModule`] is the
//! bundled compute module.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod foundation;

pub(crate) mod compute;
pub(crate) mod memory;
pub(crate) mod orchestrator;
pub(crate) mod rpc;
pub(crate) mod scene;
pub(crate) mod worker;

pub use crate::foundation::core::{FrameIndex, Rgb};
pub use crate::foundation::error::{RayportError, RayportResult};
pub use crate::foundation::math::Vec3;

pub use crate::compute::{ComputeLoader, ComputeModule, ImageBuffer, RayTracerModule, loader};
pub use crate::memory::{
    DEFAULT_PAGES, MAX_PAGES, MemoryId, MemoryLayout, PAGE_SIZE, SharedMemoryHandle,
};
pub use crate::orchestrator::bootstrap::Orchestrator;
pub use crate::orchestrator::opts::OrchestratorOpts;
pub use crate::orchestrator::publish::{CollectingPublisher, FramePublisher, LatestFrame};
pub use crate::orchestrator::render_loop::{
    FRAME_TIME_WINDOW, FrameTimes, LoopState, LoopStats, RenderLoop, StopHandle,
};
pub use crate::orchestrator::source::{AnimatedScene, RequestSource};
pub use crate::rpc::client::{PendingReply, RpcClient};
pub use crate::rpc::message::{CallId, RequestPayload, WorkerCall, WorkerReturn};
pub use crate::scene::model::{
    Geometry, Light, MAX_REFLECTION_LIMIT, Material, Object, RenderRequest, Scene,
};
pub use crate::worker::handle::WorkerHandle;
pub use crate::worker::runtime::{CallState, WorkerRuntime};
