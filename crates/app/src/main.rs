use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use shaded_core::{
    AppConfig, AudioPipeline, HeadlessRenderer, ShadedError, ShaderSource, UniformBridge,
};
use tracing_subscriber::EnvFilter;

fn main() -> shaded_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    run(&cli)
}

fn run(cli: &Cli) -> shaded_core::Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if cli.fps == 0 {
        return Err(ShadedError::config("--fps must be positive"));
    }
    let deadline = deadline_from(cli.duration)?;

    let shader = ShaderSource::load(&cli.shader)?;
    tracing::info!(shader = ?shader.path, bytes = shader.code.len(), "loaded fragment shader");

    let mut pipeline = match &cli.audio {
        Some(path) => AudioPipeline::open_file(&config, path)?,
        None => AudioPipeline::synthetic(&config),
    };
    tracing::info!(mode = ?pipeline.mode(), "starting audio pipeline");
    pipeline.start()?;

    let mut renderer = HeadlessRenderer::new(shader);
    let mut bridge = UniformBridge::new(&config);
    let stop = watch_stdin();
    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(cli.fps));

    tracing::info!("rendering, press Enter to stop");
    while !stop.load(Ordering::Relaxed) {
        let frame_start = Instant::now();
        let time = bridge.tick(&mut pipeline, &mut renderer)?;

        if deadline.is_some_and(|deadline| bridge.clock().elapsed() >= deadline) {
            break;
        }
        if renderer.frames() % u64::from(cli.fps) == 0 {
            tracing::debug!(
                time,
                buffered = pipeline.buffered(),
                peak = renderer.peak(),
                "frame stats"
            );
        }
        if let Some(rest) = frame_interval.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    pipeline.shutdown();
    tracing::info!(frames = renderer.frames(), "shut down");
    Ok(())
}

/// Converts `--duration` seconds into a run deadline. Negative, NaN, infinite
/// and out-of-range values are rejected instead of panicking.
fn deadline_from(duration: Option<f64>) -> shaded_core::Result<Option<Duration>> {
    duration
        .map(|secs| {
            Duration::try_from_secs_f64(secs).map_err(|err| {
                ShadedError::config(format!("invalid --duration {secs}: {err}"))
            })
        })
        .transpose()
}

/// Sets the returned flag once a line arrives on stdin. A closed stdin
/// leaves the flag untouched so `--duration` runs still complete.
fn watch_stdin() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    thread::spawn(move || {
        let mut line = String::new();
        if let Ok(read) = std::io::stdin().lock().read_line(&mut line) {
            if read > 0 {
                flag.store(true, Ordering::Relaxed);
            }
        }
    });
    stop
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive fragment shader viewer", long_about = None)]
struct Cli {
    /// Fragment shader to render.
    shader: PathBuf,
    /// Optional MP3 file to play and visualise. Without it a 440 Hz tone is used.
    audio: Option<PathBuf>,
    /// JSON configuration overriding the built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Target frame rate of the render loop.
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Stop after this many seconds instead of waiting for Enter.
    #[arg(long)]
    duration: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_becomes_deadline() {
        assert_eq!(deadline_from(None).unwrap(), None);
        assert_eq!(
            deadline_from(Some(2.5)).unwrap(),
            Some(Duration::from_millis(2500))
        );
        assert_eq!(deadline_from(Some(0.0)).unwrap(), Some(Duration::ZERO));
    }

    #[test]
    fn out_of_range_duration_is_a_config_error() {
        for secs in [1e20, -1.0, f64::NAN, f64::INFINITY] {
            let err = deadline_from(Some(secs)).unwrap_err();
            assert!(matches!(err, ShadedError::Config(_)), "{secs} gave {err}");
        }
    }
}
