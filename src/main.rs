//! Headless runner: drives a fire with a fixed clock and logs what happens.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use hearth::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "hearth-runner", version, about = "Run the fire simulation headless")]
struct Cli {
    /// JSON config file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 600)]
    frames: u64,

    /// Simulated frames per second
    #[arg(long, default_value_t = 60.0)]
    fps: f32,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 800.0)]
    width: f32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 600.0)]
    height: f32,

    /// Run the GPU population's kernel on CPU threads
    #[arg(long)]
    cpu_only: bool,

    /// Print the default config as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

/// Totals over one simulated second.
#[derive(Default)]
struct Window {
    spawned: usize,
    died: usize,
    evicted: usize,
    gpu_misses: u32,
}

impl Window {
    fn absorb(&mut self, other: &Window) {
        self.spawned += other.spawned;
        self.died += other.died;
        self.evicted += other.evicted;
        self.gpu_misses += other.gpu_misses;
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.dump_config {
        return match serde_json::to_string_pretty(&FireConfig::default()) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("Failed to serialize config: {err}");
                ExitCode::FAILURE
            }
        };
    }

    let mut config = match &cli.config {
        Some(path) => match FireConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                error!("{}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => FireConfig::default(),
    };
    if cli.cpu_only {
        config.gpu.backend = BackendPreference::Cpu;
    }

    if !(cli.fps.is_finite() && cli.fps > 0.0) {
        error!("--fps must be positive");
        return ExitCode::FAILURE;
    }

    run(&cli, config);
    ExitCode::SUCCESS
}

fn run(cli: &Cli, config: FireConfig) {
    let viewport = Viewport::new(cli.width, cli.height);
    let mut sim = FireSimulation::new(config, viewport);
    let mut clock = Clock::fixed(1000.0 / cli.fps);
    let frames_per_second = cli.fps.round().max(1.0) as u64;

    info!(
        "Simulating {} frames at {} fps in {}x{} (GPU: {})",
        cli.frames,
        cli.fps,
        viewport.width,
        viewport.height,
        sim.gpu().backend_name().unwrap_or("off"),
    );

    let mut window = Window::default();
    let mut total = Window::default();
    let mut peak = 0;

    for _ in 0..cli.frames {
        let report = sim.frame(clock.tick());
        window.spawned += report.spawned;
        window.died += report.died;
        window.evicted += report.evicted;
        if report.gpu == GpuStatus::Unavailable {
            window.gpu_misses += 1;
        }
        peak = peak.max(report.live);

        if report.frame % frames_per_second == 0 {
            info!(
                "t={:>6.1}s live={:>5} spawned={:>4} died={:>4} evicted={:>4} gpu={:?} gpu_misses={}",
                clock.now_ms() / 1000.0,
                report.live,
                window.spawned,
                window.died,
                window.evicted,
                report.gpu,
                window.gpu_misses,
            );
            total.absorb(&window);
            window = Window::default();
        }
    }
    total.absorb(&window);

    let mut kinds = String::new();
    for kind in ParticleKind::ALL {
        let count = sim.pool().count_kind(kind);
        kinds.push_str(&format!(" {}={count}", kind.name()));
    }
    info!(
        "Done: {} frames, spawned={} died={} evicted={} peak={} live={} ({}) gpu_slots={} gpu_misses={}",
        clock.frame(),
        total.spawned,
        total.died,
        total.evicted,
        peak,
        sim.pool().len(),
        kinds.trim_start(),
        sim.gpu().count(),
        total.gpu_misses,
    );
}
