use std::num::NonZeroUsize;
use std::sync::atomic::AtomicUsize;

use super::*;
use crate::compute::{ComputeLoader, ComputeModule, ImageBuffer};
use crate::foundation::error::RayportError;
use crate::memory::SharedMemoryHandle;
use crate::orchestrator::opts::OrchestratorOpts;
use crate::orchestrator::publish::CollectingPublisher;
use crate::orchestrator::source::AnimatedScene;
use crate::scene::model::RenderRequest;

#[derive(Clone, Copy)]
enum Fault {
    None,
    ErrorOnOdd,
    AlwaysError,
    PanicOnSecond,
    AlwaysPanic,
    StallFirst,
}

struct FlakyModule {
    renders: Arc<AtomicUsize>,
    fault: Fault,
}

impl ComputeModule for FlakyModule {
    fn initialize_runtime(&mut self, _memory: SharedMemoryHandle) -> RayportResult<()> {
        Ok(())
    }

    fn initialize_thread_pool(&mut self, _concurrency: NonZeroUsize) -> RayportResult<()> {
        Ok(())
    }

    fn render_image(&mut self, request: &RenderRequest) -> RayportResult<ImageBuffer> {
        let n = self.renders.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::ErrorOnOdd if n % 2 == 1 => return Err(RayportError::render("odd frame")),
            Fault::AlwaysError => return Err(RayportError::render("broken")),
            Fault::PanicOnSecond if n == 1 => panic!("compute module crashed"),
            Fault::AlwaysPanic => panic!("compute module crashed"),
            Fault::StallFirst if n == 0 => std::thread::sleep(Duration::from_millis(400)),
            _ => {}
        }
        Ok(ImageBuffer::filled(request.width, request.height, [n as u8, 0, 0, 255]))
    }
}

fn flaky_loader(fault: Fault) -> (ComputeLoader, Arc<AtomicUsize>) {
    let renders = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&renders);
    let loader = crate::compute::loader(move || {
        Ok(Box::new(FlakyModule {
            renders: Arc::clone(&r),
            fault,
        }))
    });
    (loader, renders)
}

fn opts(max_frames: u64) -> OrchestratorOpts {
    OrchestratorOpts {
        concurrency: Some(1),
        memory_pages: 1,
        frame_delay_ms: 0,
        max_frames: Some(max_frames),
        ..OrchestratorOpts::default()
    }
}

fn run(
    opts: OrchestratorOpts,
    fault: Fault,
) -> (RayportResult<LoopStats>, CollectingPublisher, Orchestrator) {
    let (loader, _) = flaky_loader(fault);
    let mut orch = Orchestrator::start(opts, loader).unwrap();
    let mut source = AnimatedScene::new(RenderRequest::demo(2, 2));
    let mut publisher = CollectingPublisher::new();
    let result = orch.run_render_loop(&mut source, &mut publisher, &StopHandle::new());
    (result, publisher, orch)
}

#[test]
fn frame_times_keep_only_the_window() {
    let mut times = FrameTimes::new(Duration::from_secs(1));
    assert!(times.average().is_none());

    let t0 = Instant::now();
    times.add(t0, Duration::from_millis(100));
    times.add(t0 + Duration::from_millis(500), Duration::from_millis(300));
    assert_eq!(times.average(), Some(Duration::from_millis(200)));

    times.add(t0 + Duration::from_millis(1600), Duration::from_millis(50));
    assert_eq!(times.len(), 1);
    assert_eq!(times.average(), Some(Duration::from_millis(50)));
}

#[test]
fn loop_stats_average() {
    let mut stats = LoopStats::default();
    assert_eq!(stats.average_frame_time(), None);
    stats.frames_published = 4;
    stats.total_frame_time = Duration::from_millis(100);
    assert_eq!(stats.average_frame_time(), Some(Duration::from_millis(25)));
}

#[test]
fn stop_handle_is_shared_between_clones() {
    let stop = StopHandle::new();
    let other = stop.clone();
    assert!(!other.is_stopped());
    stop.stop();
    assert!(other.is_stopped());
}

#[test]
fn publishes_contiguous_frames_up_to_max() {
    let (result, publisher, orch) = run(opts(5), Fault::None);
    let stats = result.unwrap();
    assert_eq!(stats.frames_published, 5);
    assert_eq!(stats.frames_failed, 0);
    let indices: Vec<u64> = publisher.frames.iter().map(|(i, _)| i.0).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert!(stats.average_frame_time().is_some());
    orch.shutdown();
}

#[test]
fn stopped_handle_schedules_nothing() {
    let (loader, renders) = flaky_loader(Fault::None);
    let mut orch = Orchestrator::start(opts(10), loader).unwrap();
    let stop = StopHandle::new();
    stop.stop();

    let mut source = AnimatedScene::new(RenderRequest::demo(2, 2));
    let mut publisher = CollectingPublisher::new();
    let mut render_loop = RenderLoop::new(&mut orch, stop);
    let stats = render_loop.run(&mut source, &mut publisher).unwrap();
    assert_eq!(render_loop.state(), LoopState::Idle);
    assert_eq!(stats, LoopStats::default());
    assert_eq!(renders.load(Ordering::SeqCst), 0);
    orch.shutdown();
}

#[test]
fn render_errors_are_skipped() {
    let (result, publisher, orch) = run(opts(3), Fault::ErrorOnOdd);
    let stats = result.unwrap();
    assert_eq!(stats.frames_published, 3);
    assert_eq!(stats.frames_failed, 2);
    assert_eq!(stats.restarts, 0);
    // Published frames came from the even render calls only.
    let reds: Vec<u8> = publisher.frames.iter().map(|(_, img)| img.data[0]).collect();
    assert_eq!(reds, vec![0, 2, 4]);
    orch.shutdown();
}

#[test]
fn too_many_consecutive_errors_abort() {
    let o = OrchestratorOpts {
        max_consecutive_failures: 2,
        ..opts(3)
    };
    let (result, publisher, orch) = run(o, Fault::AlwaysError);
    let err = result.unwrap_err();
    assert!(matches!(err, RayportError::Render(_)), "{err}");
    assert!(publisher.frames.is_empty());
    orch.shutdown();
}

#[test]
fn lost_worker_triggers_rebootstrap() {
    let (loader, _) = flaky_loader(Fault::PanicOnSecond);
    let mut orch = Orchestrator::start(opts(3), loader).unwrap();
    let first_memory = orch.memory().id();

    let mut source = AnimatedScene::new(RenderRequest::demo(2, 2));
    let mut publisher = CollectingPublisher::new();
    let stats = orch
        .run_render_loop(&mut source, &mut publisher, &StopHandle::new())
        .unwrap();

    assert_eq!(stats.restarts, 1);
    assert_eq!(stats.frames_published, 3);
    assert_eq!(orch.restarts(), 1);
    assert_ne!(orch.memory().id(), first_memory);
    orch.shutdown();
}

#[test]
fn restart_budget_is_bounded() {
    let o = OrchestratorOpts {
        max_restarts: 1,
        ..opts(3)
    };
    let (result, publisher, orch) = run(o, Fault::AlwaysPanic);
    assert!(matches!(result, Err(RayportError::WorkerLost(_))));
    assert!(publisher.frames.is_empty());
    assert_eq!(orch.restarts(), 1);
    orch.shutdown();
}

#[test]
fn render_timeout_replaces_the_worker() {
    let o = OrchestratorOpts {
        render_timeout_ms: Some(50),
        ..opts(2)
    };
    let (result, publisher, orch) = run(o, Fault::StallFirst);
    let stats = result.unwrap();
    assert_eq!(stats.restarts, 1);
    assert_eq!(publisher.frames.len(), 2);
    orch.shutdown();
}

#[test]
fn timed_out_leader_refuses_work_until_restart() {
    let o = OrchestratorOpts {
        render_timeout_ms: Some(50),
        ..opts(1)
    };
    let (loader, renders) = flaky_loader(Fault::StallFirst);
    let mut orch = Orchestrator::start(o, loader).unwrap();
    let req = RenderRequest::demo(2, 2);

    let err = orch.render_frame(&req).unwrap_err();
    assert!(matches!(err, RayportError::RenderTimeout(_)), "{err}");
    assert!(orch.leader().unwrap().is_stalled());

    let started = Instant::now();
    let err = orch.render_frame(&req).unwrap_err();
    assert!(matches!(err, RayportError::WorkerLost(_)), "{err}");
    assert!(err.to_string().contains("restart required"));
    assert!(started.elapsed() < Duration::from_millis(200));

    // Outlast the stalled call: nothing was queued behind it.
    std::thread::sleep(Duration::from_millis(600));
    assert_eq!(renders.load(Ordering::SeqCst), 1);

    orch.restart().unwrap();
    assert!(!orch.leader().unwrap().is_stalled());
    let img = orch.render_frame(&req).unwrap();
    assert_eq!((img.width, img.height), (2, 2));
    orch.shutdown();
}

#[test]
fn shutdown_abandons_a_stalled_leader() {
    let o = OrchestratorOpts {
        render_timeout_ms: Some(50),
        ..opts(1)
    };
    let (loader, _) = flaky_loader(Fault::StallFirst);
    let orch = Orchestrator::start(o, loader).unwrap();
    assert!(matches!(
        orch.render_frame(&RenderRequest::demo(2, 2)),
        Err(RayportError::RenderTimeout(_))
    ));

    let started = Instant::now();
    orch.shutdown();
    assert!(started.elapsed() < Duration::from_millis(300));
}
