use anyhow::{bail, Context, Result};
use clap::Parser;
use codescanner::simulated::{DeviceSpec, SimulatedCameraProvider, SimulatedView};
use codescanner::{CodeScannerBuilder, ScanResult, ScannerConfig, Size};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "codescanner")]
#[command(about = "Scan barcodes from a simulated camera preview")]
#[command(version)]
#[command(long_about = "Runs the camera preview lifecycle controller against a simulated \
camera that streams a still image as preview frames, and prints the first code the decoder \
recognises.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "codescanner.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Image fed to the simulated camera
    #[arg(
        short,
        long,
        value_name = "PATH",
        required_unless_present_any = ["print_config", "validate_config"],
        help = "Image streamed as preview frames"
    )]
    image: Option<PathBuf>,

    /// Preview frame rate
    #[arg(long, default_value_t = 10, help = "Frames per second delivered by the simulated camera")]
    fps: u32,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 10, help = "Seconds to wait for a code before failing")]
    timeout_secs: u64,

    /// Print results as JSON
    #[arg(long, help = "Print the decoded result as a JSON object")]
    json: bool,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without scanning")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily rolling files in this directory
    #[arg(long, value_name = "DIR", help = "Directory for rolling log files")]
    log_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting codescanner v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match ScannerConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let Some(image) = args.image.as_deref() else {
        bail!("--image is required");
    };
    let result = scan_image(&args, &config, image).await?;

    if args.json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        println!("{}: {}", result.format, result.text);
    }

    Ok(())
}

async fn scan_image(args: &Args, config: &ScannerConfig, image: &Path) -> Result<ScanResult> {
    if args.fps == 0 {
        bail!("--fps must be greater than 0");
    }

    let (size, frame) = load_preview_frame(image)?;
    info!("Streaming {} ({}) at {} fps", image.display(), size, args.fps);

    let provider = Arc::new(SimulatedCameraProvider::new(vec![DeviceSpec::still_image(0, size)]));
    let view = Arc::new(SimulatedView::new(size));

    let (results_tx, mut results_rx) = mpsc::unbounded_channel();
    let (scanner, mut main_loop) = CodeScannerBuilder::from_config(config)?
        .camera(0)
        .on_decoded(move |result: &ScanResult| {
            if results_tx.send(result.clone()).is_err() {
                debug!("Result receiver closed; dropping {} result", result.format);
            }
        })
        .build(provider.clone(), view);

    let cancel = CancellationToken::new();
    let feeder = tokio::spawn(feed_frames(
        Arc::clone(&provider),
        frame,
        Duration::from_secs(1) / args.fps,
        cancel.clone(),
    ));

    scanner.start_preview();

    let deadline = tokio::time::sleep(Duration::from_secs(args.timeout_secs));
    tokio::pin!(deadline);

    let outcome = loop {
        tokio::select! {
            result = results_rx.recv() => {
                match result {
                    Some(result) => break Ok(result),
                    None => break Err(anyhow::anyhow!("Scanner stopped before a code was found")),
                }
            }
            turn = main_loop.turn() => {
                match turn {
                    Ok(true) => {}
                    Ok(false) => break Err(anyhow::anyhow!("Scanner stopped before a code was found")),
                    Err(e) => break Err(e).context("Camera initialization failed"),
                }
            }
            _ = &mut deadline => {
                warn!("No code found within {}s", args.timeout_secs);
                break Err(anyhow::anyhow!("No code found within {}s", args.timeout_secs));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break Err(anyhow::anyhow!("Interrupted"));
            }
        }
    };

    cancel.cancel();
    if let Err(e) = feeder.await {
        warn!("Frame feeder task failed: {}", e);
    }
    // Let the posted stop run before tearing the session down
    main_loop.run_pending()?;
    scanner.release_resources();

    outcome
}

/// Deliver the frame at a fixed rate once the camera has been opened
async fn feed_frames(
    provider: Arc<SimulatedCameraProvider>,
    frame: Vec<u8>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    let mut delivered = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Some(camera) = provider.last_opened() {
                    if camera.deliver_frame(&frame) {
                        delivered += 1;
                    }
                }
            }
        }
    }

    debug!("Frame feeder stopped after {} frames", delivered);
}

/// Load an image as an NV21 preview frame (luminance plane, neutral chroma)
fn load_preview_frame(path: &Path) -> Result<(Size, Vec<u8>)> {
    let luma = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?
        .to_luma8();
    let size = Size::new(luma.width(), luma.height());

    let mut frame = luma.into_raw();
    let chroma = frame.len() / 2;
    frame.resize(frame.len() + chroma, 128);

    Ok((size, frame))
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("codescanner={}", log_level)));

    // Logs go to stderr so results on stdout stay machine readable
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match args.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "codescanner.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Codescanner Configuration File");
    println!("# Environment overrides use the CODESCANNER__ prefix,");
    println!("# e.g. CODESCANNER__SCANNER__FLASH=true");
    println!("# camera_index = 0 selects a device; unset picks the first back-facing camera");
    println!();
    println!("{}", ScannerConfig::default().to_toml()?);
    Ok(())
}
