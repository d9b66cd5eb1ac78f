use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::foundation::core::FrameIndex;
use crate::foundation::error::RayportResult;
use crate::orchestrator::bootstrap::Orchestrator;
use crate::orchestrator::publish::FramePublisher;
use crate::orchestrator::source::RequestSource;

/// Window over which [`FrameTimes::average`] is taken.
pub const FRAME_TIME_WINDOW: Duration = Duration::from_secs(20);

/// Where the render loop currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Between frames, or not running.
    Idle,
    /// A render call is in flight on the leader.
    Requesting,
    /// A frame is being handed to the publisher.
    Publishing,
}

/// Cloneable flag that stops the render loop from scheduling further frames.
///
/// A render already in flight completes; its frame is discarded rather than published.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// A handle that has not been stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return `true` once [`StopHandle::stop`] was called on any clone.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters returned when the render loop exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames handed to the publisher.
    pub frames_published: u64,
    /// Render calls that failed with a non-fatal error.
    pub frames_failed: u64,
    /// Frames that rendered after a stop was requested and were dropped.
    pub frames_discarded: u64,
    /// Full re-bootstraps after a lost or unresponsive worker.
    pub restarts: u32,
    /// Sum of request-to-publish time over published frames.
    pub total_frame_time: Duration,
}

impl LoopStats {
    /// Mean request-to-publish time, `None` before the first frame.
    pub fn average_frame_time(&self) -> Option<Duration> {
        let n = u32::try_from(self.frames_published).ok()?;
        if n == 0 {
            return None;
        }
        Some(self.total_frame_time / n)
    }
}

/// Rolling history of frame times over a fixed window of wall time.
#[derive(Clone, Debug)]
pub struct FrameTimes {
    window: Duration,
    samples: VecDeque<(Instant, Duration)>,
}

impl Default for FrameTimes {
    fn default() -> Self {
        Self::new(FRAME_TIME_WINDOW)
    }
}

impl FrameTimes {
    /// An empty history keeping samples younger than `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Record a frame that finished at `at` after taking `took`.
    pub fn add(&mut self, at: Instant, took: Duration) {
        self.samples.push_back((at, took));
        while let Some((t, _)) = self.samples.front() {
            if at.saturating_duration_since(*t) <= self.window {
                break;
            }
            self.samples.pop_front();
        }
    }

    /// Mean over the samples in the window.
    pub fn average(&self) -> Option<Duration> {
        let n = u32::try_from(self.samples.len()).ok().filter(|n| *n > 0)?;
        let sum: Duration = self.samples.iter().map(|(_, d)| *d).sum();
        Some(sum / n)
    }

    /// Samples currently in the window.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Return `true` when no sample is in the window.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Continuous render loop with a single request in flight.
///
/// Each iteration asks the [`RequestSource`] for a request, renders it on the leader, publishes
/// the frame and sleeps `frame_delay` before the next one.
///
/// - A render error is logged and counted, and the loop carries on with a fresh request. More
///   than `max_consecutive_failures` in a row abort the loop.
/// - A lost or timed-out worker re-bootstraps the orchestrator, at most `max_restarts` times.
/// - The loop ends when the [`StopHandle`] is stopped or `max_frames` frames were published.
pub struct RenderLoop<'o> {
    orchestrator: &'o mut Orchestrator,
    stop: StopHandle,
    state: LoopState,
    stats: LoopStats,
    frame_times: FrameTimes,
}

impl<'o> RenderLoop<'o> {
    /// Prepare a loop over `orchestrator`, stopped through `stop`.
    pub fn new(orchestrator: &'o mut Orchestrator, stop: StopHandle) -> Self {
        Self {
            orchestrator,
            stop,
            state: LoopState::Idle,
            stats: LoopStats::default(),
            frame_times: FrameTimes::default(),
        }
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Recent frame-time history.
    pub fn frame_times(&self) -> &FrameTimes {
        &self.frame_times
    }

    /// Run until stopped, `max_frames` is reached or an unrecoverable error occurs.
    #[tracing::instrument(skip_all)]
    pub fn run(
        &mut self,
        source: &mut dyn RequestSource,
        publisher: &mut dyn FramePublisher,
    ) -> RayportResult<LoopStats> {
        let opts = self.orchestrator.opts().clone();
        let mut frame = FrameIndex(0);
        let mut last_frame = Duration::ZERO;
        let mut consecutive_failures = 0u32;

        tracing::info!(max_frames = ?opts.max_frames, "render loop started");
        loop {
            if self.stop.is_stopped() {
                break;
            }
            if opts
                .max_frames
                .is_some_and(|max| self.stats.frames_published >= max)
            {
                break;
            }

            self.state = LoopState::Requesting;
            let started = Instant::now();
            let request = source.next_request(frame, last_frame)?;
            let rendered = self.orchestrator.render_frame(&request);
            drop(request);

            match rendered {
                Ok(image) => {
                    consecutive_failures = 0;
                    if self.stop.is_stopped() {
                        self.stats.frames_discarded += 1;
                        tracing::debug!(frame = frame.0, "stop requested, discarding frame");
                        break;
                    }

                    self.state = LoopState::Publishing;
                    publisher.publish(frame, &image)?;
                    drop(image);

                    let now = Instant::now();
                    last_frame = now.duration_since(started);
                    self.frame_times.add(now, last_frame);
                    self.stats.frames_published += 1;
                    self.stats.total_frame_time += last_frame;
                    tracing::debug!(
                        frame = frame.0,
                        ms = last_frame.as_secs_f64() * 1000.0,
                        avg_ms = self
                            .frame_times
                            .average()
                            .map_or(0.0, |d| d.as_secs_f64() * 1000.0),
                        "frame published"
                    );
                    frame = frame.next();
                }
                Err(e) if e.is_fatal() => {
                    self.state = LoopState::Idle;
                    if self.stats.restarts >= opts.max_restarts {
                        tracing::error!(error = %e, restarts = self.stats.restarts, "worker lost, restart budget exhausted");
                        return Err(e);
                    }
                    tracing::error!(error = %e, "worker lost, re-bootstrapping");
                    self.stats.restarts += 1;
                    self.orchestrator.restart()?;
                    consecutive_failures = 0;
                    last_frame = Duration::ZERO;
                }
                Err(e) => {
                    self.stats.frames_failed += 1;
                    consecutive_failures += 1;
                    last_frame = Duration::ZERO;
                    if consecutive_failures > opts.max_consecutive_failures {
                        self.state = LoopState::Idle;
                        tracing::error!(error = %e, consecutive_failures, "render keeps failing, giving up");
                        return Err(e);
                    }
                    tracing::warn!(error = %e, frame = frame.0, consecutive_failures, "render failed, retrying");
                }
            }

            self.state = LoopState::Idle;
            if !opts.frame_delay().is_zero() {
                std::thread::sleep(opts.frame_delay());
            }
        }

        self.state = LoopState::Idle;
        tracing::info!(
            published = self.stats.frames_published,
            failed = self.stats.frames_failed,
            restarts = self.stats.restarts,
            "render loop stopped"
        );
        Ok(self.stats)
    }
}

impl Orchestrator {
    /// Run a [`RenderLoop`] over this orchestrator.
    pub fn run_render_loop(
        &mut self,
        source: &mut dyn RequestSource,
        publisher: &mut dyn FramePublisher,
        stop: &StopHandle,
    ) -> RayportResult<LoopStats> {
        RenderLoop::new(self, stop.clone()).run(source, publisher)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/orchestrator/render_loop.rs"]
mod tests;
