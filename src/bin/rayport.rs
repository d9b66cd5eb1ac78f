use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sha2::Digest as _;

#[derive(Parser, Debug)]
#[command(name = "rayport", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap the workers, render a single frame as a PNG and shut down.
    Frame(FrameArgs),
    /// Run the continuous render loop.
    Run(RunArgs),
    /// Write the built-in demo scene request as JSON.
    Scene(SceneArgs),
}

#[derive(clap::Args, Debug)]
struct SceneSource {
    /// Render request JSON. Defaults to the built-in demo scene.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Override the output width.
    #[arg(long)]
    width: Option<u32>,

    /// Override the output height.
    #[arg(long)]
    height: Option<u32>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    source: SceneSource,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Leader thread-pool lanes. Defaults to the available parallelism.
    #[arg(long)]
    threads: Option<usize>,

    /// Print the SHA-256 of the frame's RGBA bytes.
    #[arg(long)]
    digest: bool,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SceneSource,

    /// Orchestrator options JSON. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Stop after this many seconds.
    #[arg(long)]
    seconds: Option<f64>,

    /// Number of workers to spawn.
    #[arg(long)]
    workers: Option<usize>,

    /// Leader thread-pool lanes.
    #[arg(long)]
    threads: Option<usize>,

    /// Pause between frames, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Fail a render call that takes longer than this, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Write the last published frame as a PNG.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SceneArgs {
    /// Output JSON path.
    #[arg(long)]
    out: PathBuf,

    /// Output width.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Output height.
    #[arg(long, default_value_t = 480)]
    height: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Run(args) => cmd_run(args),
        Command::Scene(args) => cmd_scene(args),
    }
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let request = load_request(&args.source)?;
    let mut opts = rayport::OrchestratorOpts {
        concurrency: args.threads,
        ..rayport::OrchestratorOpts::default()
    };
    opts.fit_frame(&request).context("size shared memory")?;

    let orch = rayport::Orchestrator::start(opts, rayport::RayTracerModule::loader())
        .context("bootstrap workers")?;
    let frame = orch.render_frame(&request);
    orch.shutdown();
    let frame = frame.context("render frame")?;

    write_png(&args.out, &frame)?;
    if args.digest {
        println!("{}", sha256_hex(&frame.data));
    }
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let request = load_request(&args.source)?;
    let mut opts = match &args.config {
        Some(path) => rayport::OrchestratorOpts::from_path(path)?,
        None => rayport::OrchestratorOpts::default(),
    };
    if let Some(n) = args.workers {
        opts.worker_count = n;
    }
    if args.threads.is_some() {
        opts.concurrency = args.threads;
    }
    if let Some(d) = args.delay_ms {
        opts.frame_delay_ms = d;
    }
    if args.timeout_ms.is_some() {
        opts.render_timeout_ms = args.timeout_ms;
    }
    if args.frames.is_some() {
        opts.max_frames = args.frames;
    }
    opts.fit_frame(&request).context("size shared memory")?;

    let stop = rayport::StopHandle::new();
    if let Some(secs) = args.seconds {
        let secs = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid --seconds value {secs}"))?;
        let stop = stop.clone();
        std::thread::Builder::new()
            .name("rayport-timer".to_string())
            .spawn(move || {
                std::thread::sleep(secs);
                stop.stop();
            })
            .context("spawn timer thread")?;
    }

    let mut orch = rayport::Orchestrator::start(opts, rayport::RayTracerModule::loader())
        .context("bootstrap workers")?;
    let mut source = rayport::AnimatedScene::new(request);
    let mut publisher = rayport::LatestFrame::new();
    let result = orch.run_render_loop(&mut source, &mut publisher, &stop);
    orch.shutdown();
    let stats = result.context("render loop")?;

    let avg_ms = stats
        .average_frame_time()
        .map_or(0.0, |d| d.as_secs_f64() * 1000.0);
    eprintln!(
        "published {} frames ({} failed, {} restarts), average frame time {avg_ms:.2} ms",
        stats.frames_published, stats.frames_failed, stats.restarts
    );

    if let Some(out) = &args.out {
        let (_, frame) = publisher
            .into_latest()
            .context("no frame was published")?;
        write_png(out, &frame)?;
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

fn cmd_scene(args: SceneArgs) -> anyhow::Result<()> {
    let request = rayport::RenderRequest::demo(args.width, args.height);
    let json = serde_json::to_string_pretty(&request).context("serialize demo scene")?;
    ensure_parent(&args.out)?;
    std::fs::write(&args.out, json)
        .with_context(|| format!("write scene '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn load_request(source: &SceneSource) -> anyhow::Result<rayport::RenderRequest> {
    let mut request = match &source.scene {
        Some(path) => rayport::RenderRequest::from_path(path)?,
        None => rayport::RenderRequest::demo(640, 480),
    };
    if let Some(w) = source.width {
        request.width = w;
    }
    if let Some(h) = source.height {
        request.height = h;
    }
    request.validate()?;
    Ok(request)
}

fn write_png(path: &Path, frame: &rayport::ImageBuffer) -> anyhow::Result<()> {
    ensure_parent(path)?;
    image::save_buffer_with_format(
        path,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
