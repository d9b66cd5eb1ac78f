use crate::compute::ImageBuffer;
use crate::foundation::error::{RayportError, RayportResult};
use crate::memory::SharedMemoryHandle;
use crate::scene::model::RenderRequest;

/// Correlation token of one call on one channel. Monotonic per client, starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallId(pub u64);

/// A [`RenderRequest`] marshaled by value for one trip across the channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestPayload(Vec<u8>);

impl RequestPayload {
    /// Serialize `request` to JSON bytes.
    pub fn marshal(request: &RenderRequest) -> RayportResult<Self> {
        Ok(Self(serde_json::to_vec(request)?))
    }

    /// Rebuild the request on the receiving side.
    pub fn unmarshal(&self) -> RayportResult<RenderRequest> {
        Ok(serde_json::from_slice(&self.0)?)
    }

    /// Marshaled size in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return `true` for an empty payload (never produced by [`RequestPayload::marshal`]).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for RequestPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// The three operations a worker exposes. There are no others.
#[derive(Debug)]
pub enum WorkerCall {
    /// Load the compute module, bound to `memory` or to a self-allocated block when `None`.
    ///
    /// The handle crosses the channel by reference: the worker ends up holding the very block the
    /// orchestrator allocated.
    Init {
        /// Shared memory to bind to.
        memory: Option<SharedMemoryHandle>,
    },
    /// Build the compute module's thread pool with `concurrency` lanes (must be >= 1).
    InitThreadPool {
        /// Lane count.
        concurrency: usize,
    },
    /// Render one frame.
    RenderImage {
        /// The marshaled request.
        request: RequestPayload,
    },
}

impl WorkerCall {
    /// Operation name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::InitThreadPool { .. } => "init_thread_pool",
            Self::RenderImage { .. } => "render_image",
        }
    }
}

/// Successful result of a [`WorkerCall`].
#[derive(Debug)]
pub enum WorkerReturn {
    /// `init` and `init_thread_pool` return nothing.
    Unit,
    /// `render_image` returns the frame, moved (not copied) to the caller.
    Image(ImageBuffer),
}

impl WorkerReturn {
    /// Expect a [`WorkerReturn::Unit`].
    pub fn into_unit(self) -> RayportResult<()> {
        match self {
            Self::Unit => Ok(()),
            Self::Image(_) => Err(RayportError::serde("expected empty reply, got an image")),
        }
    }

    /// Expect a [`WorkerReturn::Image`].
    pub fn into_image(self) -> RayportResult<ImageBuffer> {
        match self {
            Self::Image(img) => Ok(img),
            Self::Unit => Err(RayportError::serde("expected image reply, got an empty one")),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) id: CallId,
    pub(crate) call: WorkerCall,
}

#[derive(Debug)]
pub(crate) struct Reply {
    pub(crate) id: CallId,
    pub(crate) result: RayportResult<WorkerReturn>,
}
