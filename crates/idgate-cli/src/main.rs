//! `idgate` — capture-pipeline CLI: validate ID numbers, normalize stills,
//! run the capture gate over a frame directory, and submit to a server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use idgate_core::{is_valid_pin, Thresholds};
use idgate_imaging::{encode_image_payload, normalize, CropStrategy, NormalizeConfig};

mod engine;
mod source;

use engine::spawn_engine;
use source::{FileSource, SidecarAnalyzer};

#[derive(Parser)]
#[command(name = "idgate", about = "idgate capture and verification CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Scale-to-fit with black bars (desktop captures).
    Letterbox,
    /// Background-discarding crop with contrast boost (mobile captures).
    FaceWeighted,
}

impl From<StrategyArg> for CropStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Letterbox => CropStrategy::Letterbox,
            StrategyArg::FaceWeighted => CropStrategy::FaceWeighted,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Check an ID number against the GHA-########-# format.
    Validate {
        /// The ID number to check.
        pin: String,
    },
    /// Normalize a still image to submission geometry.
    Normalize {
        /// Source image path.
        input: PathBuf,
        /// Output JPEG path.
        output: PathBuf,
        #[arg(long, value_enum, default_value = "letterbox")]
        strategy: StrategyArg,
    },
    /// Run the capture gate over a directory of frames, then capture.
    Capture {
        /// Directory of frames (with optional *.faces.json sidecars).
        #[arg(long)]
        frames: PathBuf,
        /// Output path for the captured JPEG.
        #[arg(long, default_value = "capture.jpg")]
        output: PathBuf,
        #[arg(long, value_enum, default_value = "letterbox")]
        strategy: StrategyArg,
        /// Give up if the gate has not opened after this many seconds.
        #[arg(long, default_value_t = 30)]
        max_seconds: u64,
        /// ID number to submit with the capture (requires --server and --token).
        #[arg(long)]
        pin: Option<String>,
        /// Server base URL, e.g. http://localhost:8080.
        #[arg(long)]
        server: Option<String>,
        /// Bearer token for the server.
        #[arg(long)]
        token: Option<String>,
    },
    /// Query a server's health endpoint.
    Status {
        /// Server base URL.
        #[arg(long)]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate { pin } => {
            if is_valid_pin(&pin) {
                println!("{pin}: valid");
                Ok(())
            } else {
                bail!("{pin}: invalid — expected format GHA-########-#");
            }
        }
        Command::Normalize {
            input,
            output,
            strategy,
        } => run_normalize(&input, &output, strategy.into()),
        Command::Capture {
            frames,
            output,
            strategy,
            max_seconds,
            pin,
            server,
            token,
        } => {
            run_capture(
                &frames,
                &output,
                strategy.into(),
                max_seconds,
                pin,
                server,
                token,
            )
            .await
        }
        Command::Status { server } => run_status(server).await,
    }
}

fn run_normalize(input: &PathBuf, output: &PathBuf, strategy: CropStrategy) -> Result<()> {
    let source = image::open(input).with_context(|| format!("opening {}", input.display()))?;
    let jpeg = normalize(&source, strategy, &NormalizeConfig::default())?;
    std::fs::write(output, &jpeg).with_context(|| format!("writing {}", output.display()))?;
    println!("{} -> {} ({} bytes)", input.display(), output.display(), jpeg.len());
    Ok(())
}

async fn run_capture(
    frames: &PathBuf,
    output: &PathBuf,
    strategy: CropStrategy,
    max_seconds: u64,
    pin: Option<String>,
    server: Option<String>,
    token: Option<String>,
) -> Result<()> {
    if let Some(pin) = pin.as_deref() {
        if !is_valid_pin(pin) {
            bail!("{pin}: invalid — expected format GHA-########-#");
        }
    }

    let source = FileSource::new(frames)?;
    let analyzer = SidecarAnalyzer::new(frames)?;
    let handle = spawn_engine(
        Box::new(source),
        Box::new(analyzer),
        Thresholds::default(),
        NormalizeConfig::default(),
    );

    // Poll until the gate opens or we run out of patience
    let deadline = tokio::time::Instant::now() + Duration::from_secs(max_seconds);
    let captured = loop {
        let snap = handle.snapshot().await?;
        if snap.allowed {
            if let Some(expression) = snap.expression {
                eprintln!("gate open ({expression:?})");
            }
            break handle.capture(strategy).await?;
        }
        if let Some(hint) = snap.call_to_action {
            eprintln!("waiting: {hint}");
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("gate did not open within {max_seconds}s");
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    };

    std::fs::write(output, &captured.jpeg)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "captured {}x{} JPEG ({} bytes) -> {}",
        captured.width,
        captured.height,
        captured.jpeg.len(),
        output.display()
    );

    match (pin, server, token) {
        (Some(pin), Some(server), Some(token)) => {
            let payload = serde_json::json!({
                "pinNumber": pin,
                "imageData": encode_image_payload(&captured.jpeg),
            });
            let reply = tokio::task::spawn_blocking(move || submit(&server, &token, &payload))
                .await
                .context("submit task panicked")??;
            println!("{reply}");
            Ok(())
        }
        (None, None, None) => Ok(()),
        _ => bail!("submission needs --pin, --server and --token together"),
    }
}

/// POST the capture to the server's verify endpoint.
fn submit(server: &str, token: &str, payload: &serde_json::Value) -> Result<String> {
    let url = format!("{}/api/verify", server.trim_end_matches('/'));
    let mut response = ureq::post(&url)
        .header("authorization", &format!("Bearer {token}"))
        .send_json(payload)
        .with_context(|| format!("posting to {url}"))?;
    Ok(response.body_mut().read_to_string()?)
}

async fn run_status(server: String) -> Result<()> {
    let reply = tokio::task::spawn_blocking(move || -> Result<String> {
        let url = format!("{}/health", server.trim_end_matches('/'));
        let mut response = ureq::get(&url)
            .call()
            .with_context(|| format!("querying {url}"))?;
        Ok(response.body_mut().read_to_string()?)
    })
    .await
    .context("status task panicked")??;
    println!("{reply}");
    Ok(())
}
