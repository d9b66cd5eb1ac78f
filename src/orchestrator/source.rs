use std::time::Duration;

use crate::foundation::core::FrameIndex;
use crate::foundation::error::RayportResult;
use crate::scene::model::RenderRequest;

/// Builds the request for each frame of the render loop.
///
/// `last_frame` is the wall time the previous frame took from request to publish, zero for the
/// first frame and after a failed render.
pub trait RequestSource {
    /// Produce the request for `frame`.
    fn next_request(
        &mut self,
        frame: FrameIndex,
        last_frame: Duration,
    ) -> RayportResult<RenderRequest>;
}

impl<F> RequestSource for F
where
    F: FnMut(FrameIndex, Duration) -> RayportResult<RenderRequest>,
{
    fn next_request(
        &mut self,
        frame: FrameIndex,
        last_frame: Duration,
    ) -> RayportResult<RenderRequest> {
        self(frame, last_frame)
    }
}

/// Repeats a base request, advancing its animation clock by real frame time when the scene spins.
#[derive(Clone, Debug)]
pub struct AnimatedScene {
    base: RenderRequest,
    time: f64,
}

impl AnimatedScene {
    /// Start from `base`; its `time` is the initial clock value.
    pub fn new(base: RenderRequest) -> Self {
        let time = base.time;
        Self { base, time }
    }

    /// Current animation time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }
}

impl RequestSource for AnimatedScene {
    fn next_request(
        &mut self,
        _frame: FrameIndex,
        last_frame: Duration,
    ) -> RayportResult<RenderRequest> {
        if self.base.scene.do_objects_spin {
            self.time += last_frame.as_secs_f64();
        }
        let mut req = self.base.clone();
        req.time = self.time;
        Ok(req)
    }
}
