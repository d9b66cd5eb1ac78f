use crate::compute::ImageBuffer;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::RayportResult;

/// Consumer of frames produced by the render loop.
///
/// Ordering contract: `publish` is called with strictly increasing [`FrameIndex`] values. Failed
/// renders never reach the publisher, so whatever it displays stays on the last good frame.
pub trait FramePublisher {
    /// Take one frame. The buffer is dropped by the loop once this returns.
    fn publish(&mut self, frame: FrameIndex, image: &ImageBuffer) -> RayportResult<()>;
}

impl<F> FramePublisher for F
where
    F: FnMut(FrameIndex, &ImageBuffer) -> RayportResult<()>,
{
    fn publish(&mut self, frame: FrameIndex, image: &ImageBuffer) -> RayportResult<()> {
        self(frame, image)
    }
}

/// Keeps only the most recent frame, like a display surface.
#[derive(Debug, Default)]
pub struct LatestFrame {
    latest: Option<(FrameIndex, ImageBuffer)>,
    published: u64,
}

impl LatestFrame {
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last published frame, if any.
    pub fn latest(&self) -> Option<(FrameIndex, &ImageBuffer)> {
        self.latest.as_ref().map(|(idx, img)| (*idx, img))
    }

    /// Take the last published frame out of the publisher.
    pub fn into_latest(self) -> Option<(FrameIndex, ImageBuffer)> {
        self.latest
    }

    /// Number of frames published so far.
    pub fn published(&self) -> u64 {
        self.published
    }
}

impl FramePublisher for LatestFrame {
    fn publish(&mut self, frame: FrameIndex, image: &ImageBuffer) -> RayportResult<()> {
        match &mut self.latest {
            // Reuse the pixel allocation between frames.
            Some((idx, buf)) => {
                *idx = frame;
                buf.width = image.width;
                buf.height = image.height;
                buf.data.clone_from(&image.data);
            }
            None => self.latest = Some((frame, image.clone())),
        }
        self.published += 1;
        Ok(())
    }
}

/// In-memory publisher for tests and debugging.
#[derive(Debug, Default)]
pub struct CollectingPublisher {
    /// Frames in publish order.
    pub frames: Vec<(FrameIndex, ImageBuffer)>,
}

impl CollectingPublisher {
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FramePublisher for CollectingPublisher {
    fn publish(&mut self, frame: FrameIndex, image: &ImageBuffer) -> RayportResult<()> {
        self.frames.push((frame, image.clone()));
        Ok(())
    }
}
