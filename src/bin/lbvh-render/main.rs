//! lbvh-render - render a swirling particle cloud through the frame pipeline.

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lbvh_render::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_DATE: &str = env!("LBVH_BUILD_DATE");
const BUILD_TIME: &str = env!("LBVH_BUILD_TIME");

/// Particles orbiting the Y axis, faster near the core, bobbing vertically.
struct Swirl {
    seeds: Vec<(f32, f32, f32, f32)>, // orbit radius, phase, height, particle radius
    time: f32,
}

impl Swirl {
    fn new(count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let seeds = (0..count)
            .map(|_| {
                let r = 0.2 + 1.6 * rng.gen::<f32>().sqrt();
                let a = rng.gen_range(0.0..std::f32::consts::TAU);
                let h = rng.gen_range(-0.4f32..0.4) * (2.0 - r).max(0.2);
                let size = rng.gen_range(0.008f32..0.025);
                (r, a, h, size)
            })
            .collect();
        Self { seeds, time: 0.0 }
    }
}

impl ParticleSource for Swirl {
    fn particle_count(&self) -> usize {
        self.seeds.len()
    }

    fn step(&mut self, dt: f32, out: &mut [Particle]) {
        self.time += dt;
        let t = self.time;
        for (p, &(r, a0, h, size)) in out.iter_mut().zip(&self.seeds) {
            let omega = 1.2 / (r + 0.3);
            let a = a0 + omega * t;
            let y = h + 0.1 * (3.0 * a0 + t).sin();
            let position = Vec3::new(r * a.cos(), y, r * a.sin());
            let velocity = Vec3::new(-a.sin(), 0.0, a.cos()) * (omega * r);
            *p = Particle::new(position, size, velocity);
        }
    }
}

struct Args {
    particles: usize,
    frames: u32,
    width: Option<u32>,
    height: Option<u32>,
    config: Option<PathBuf>,
    out: PathBuf,
    level: &'static str,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut args = Args {
        particles: 20_000,
        frames: 32,
        width: None,
        height: None,
        config: None,
        out: PathBuf::from("frame.exr"),
        level: "info",
    };

    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |name: &str| it.next().with_context(|| format!("missing value for {name}"));
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            "-V" | "--version" => {
                println!("lbvh-render {VERSION} (built {BUILD_DATE} {BUILD_TIME})");
                return Ok(None);
            }
            "-v" | "--verbose" => args.level = "debug",
            "-vv" | "--trace" => args.level = "trace",
            "-q" | "--quiet" => args.level = "warn",
            "-n" | "--particles" => args.particles = value("--particles")?.parse().context("--particles")?,
            "-f" | "--frames" => args.frames = value("--frames")?.parse().context("--frames")?,
            "--width" => args.width = Some(value("--width")?.parse().context("--width")?),
            "--height" => args.height = Some(value("--height")?.parse().context("--height")?),
            "-c" | "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "-o" | "--out" => args.out = PathBuf::from(value("--out")?),
            other => bail!("unknown argument '{other}' (see --help)"),
        }
    }
    Ok(Some(args))
}

fn print_help() {
    println!(
        "lbvh-render {VERSION}

Render a swirling particle cloud with a per-frame LBVH and temporal accumulation.

USAGE:
    lbvh-render [OPTIONS]

OPTIONS:
    -n, --particles <N>   Particle count [default: 20000]
    -f, --frames <N>      Frames to accumulate [default: 32]
        --width <PX>      Output width (overrides config)
        --height <PX>     Output height (overrides config)
    -c, --config <FILE>   Render config (JSON)
    -o, --out <FILE>      Output image, .exr or .hdr [default: frame.exr]
    -v, --verbose         Debug logging (-vv for trace)
    -q, --quiet           Warnings only
    -V, --version         Print version and build date
    -h, --help            Print this help

ENVIRONMENT:
    RUST_LOG              Log filter, overrides -v/-q
    LBVH_TRACE=1          Write a Chrome trace to trace.json (chrome-trace feature)"
    );
}

#[cfg(feature = "chrome-trace")]
type TraceGuard = Option<tracing_chrome::FlushGuard>;
#[cfg(not(feature = "chrome-trace"))]
type TraceGuard = ();

fn init_tracing(level: &str) -> TraceGuard {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false));

    #[cfg(feature = "chrome-trace")]
    let guard = if env::var("LBVH_TRACE").ok().as_deref() == Some("1") {
        let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .file("trace.json")
            .build();
        tracing::subscriber::set_global_default(registry.with(chrome_layer))
            .ok()
            .map(|_| guard)
    } else {
        let _ = tracing::subscriber::set_global_default(registry);
        None
    };

    #[cfg(not(feature = "chrome-trace"))]
    let guard = {
        let _ = tracing::subscriber::set_global_default(registry);
    };

    guard
}

/// Three lights circling the cloud at different heights.
fn animated_lights(t: f32) -> lbvh_render::Result<LightSet> {
    let lights = [
        PointLight::new(
            Vec3::new(2.5 * (0.4 * t).cos(), 1.5, 2.5 * (0.4 * t).sin()),
            Vec3::new(1.0, 0.85, 0.7),
            14.0,
            9.0,
        ),
        PointLight::new(
            Vec3::new(-2.0 * (0.25 * t).sin(), -1.0, 2.0 * (0.25 * t).cos()),
            Vec3::new(0.45, 0.6, 1.0),
            8.0,
            7.0,
        ),
        PointLight::new(Vec3::new(0.0, 3.0, 0.0), Vec3::ONE, 6.0, 6.0),
    ];
    LightSet::new(&lights)
}

fn main() -> anyhow::Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };
    let _trace_guard = init_tracing(args.level);

    let mut config = match &args.config {
        Some(path) => RenderConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RenderConfig::default(),
    };
    if let Some(w) = args.width {
        config.width = w;
    }
    if let Some(h) = args.height {
        config.height = h;
    }

    let (width, height) = (config.width, config.height);
    let mut pipeline = FramePipeline::new(config, args.particles)?;
    let mut scene = SceneBuffer::new(args.particles);
    let camera = Camera::look_at(
        Vec3::new(0.0, 1.6, -4.2),
        Vec3::ZERO,
        Vec3::Y,
        50f32.to_radians(),
        width as f32 / height as f32,
    );

    const DT: f32 = 1.0 / 60.0;
    let mut feed = SimulatorFeed::spawn(Swirl::new(args.particles, 0x5eed));
    feed.request_step(DT);

    tracing::info!(particles = args.particles, frames = args.frames, width, height, "rendering");
    let start = Instant::now();
    for frame in 0..args.frames {
        let snapshot = feed.wait_latest().context("simulator stopped unexpectedly")?;
        feed.request_step(DT);
        scene.upload(&snapshot.particles)?;

        let lights = animated_lights(frame as f32 * DT)?;
        pipeline.render(&FrameInput::new(scene.particles(), &lights, &camera))?;

        let stats = pipeline.last_stats();
        tracing::debug!(
            frame,
            step = snapshot.step,
            build_ms = stats.build.total().as_secs_f64() * 1000.0,
            trace_ms = stats.trace.as_secs_f64() * 1000.0,
            dispatches = stats.dispatches,
            reset = stats.reset,
            "frame done"
        );
    }
    feed.stop();

    let elapsed = start.elapsed().as_secs_f64();
    if args.frames > 0 {
        tracing::info!(
            "{} frames in {:.2}s ({:.1} ms/frame)",
            args.frames,
            elapsed,
            elapsed * 1000.0 / args.frames as f64
        );
    }

    save(pipeline.output(), &args.out)
}

#[cfg(feature = "export")]
fn save(image: &HdrImage, path: &std::path::Path) -> anyhow::Result<()> {
    image.save(path).with_context(|| format!("writing {}", path.display()))
}

#[cfg(not(feature = "export"))]
fn save(_image: &HdrImage, path: &std::path::Path) -> anyhow::Result<()> {
    bail!("cannot write {}: rebuild with --features export", path.display())
}
