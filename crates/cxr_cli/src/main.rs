//! cxr-rs CLI for serving the screening API and one-off predictions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cxr_imaging::save_heatmap;
use cxr_server::{run, Screener, ServerConfig};

#[derive(Parser)]
#[command(name = "cxr")]
#[command(author, version)]
#[command(about = "Chest X-ray TB screening - serve the API or predict on a single image")]
#[command(long_about = "cxr-rs: tuberculosis screening with Grad-CAM heatmaps.

EXAMPLES:
  # Serve the screening API on the default address
  cxr serve --model weights/tbnet

  # Serve with explanations enabled
  GEMINI_API_KEY=... cxr serve --model weights/tbnet --addr 0.0.0.0:8000

  # Screen one image and write the heatmap composite
  cxr predict --image scan.png --model weights/tbnet --output heatmap.png

  # Attribute a specific class instead of the predicted one
  cxr predict --image scan.png --target-class 1")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the screening HTTP server
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8000", value_name = "ADDR")]
        addr: SocketAddr,

        /// Weights record path (without extension); omit for an
        /// untrained model
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,

        /// Directory served under /static
        #[arg(long, default_value = "static", value_name = "DIR")]
        static_dir: PathBuf,

        /// Heatmap blend weight over the original scan
        #[arg(long, default_value = "0.45", value_name = "ALPHA")]
        alpha: f32,

        /// Explanation service API key
        #[arg(long, env = "GEMINI_API_KEY", value_name = "KEY")]
        api_key: Option<String>,
    },
    /// Screen a single image and save its heatmap composite
    Predict {
        /// Input image path
        #[arg(long, value_name = "FILE")]
        image: PathBuf,

        /// Weights record path (without extension); omit for an
        /// untrained model
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,

        /// Output path for the heatmap composite
        #[arg(long, default_value = "heatmap.png", value_name = "FILE")]
        output: PathBuf,

        /// Attribute this class instead of the predicted one
        #[arg(long, value_name = "CLASS")]
        target_class: Option<usize>,

        /// Heatmap blend weight over the original scan
        #[arg(long, default_value = "0.45", value_name = "ALPHA")]
        alpha: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Serve {
            addr,
            model,
            static_dir,
            alpha,
            api_key,
        } => handle_serve(addr, model, static_dir, alpha, api_key).await,
        Commands::Predict {
            image,
            model,
            output,
            target_class,
            alpha,
        } => handle_predict(image, model, output, target_class, alpha),
    }
}

fn load_screener(model: Option<&PathBuf>) -> Result<Screener> {
    match model {
        Some(path) => Screener::from_weights(path)
            .context(format!("Failed to load weights from {:?}", path)),
        None => {
            println!("No --model given: running with untrained weights.");
            println!("Predictions will be meaningless until a weights record is provided.\n");
            Ok(Screener::untrained())
        }
    }
}

async fn handle_serve(
    addr: SocketAddr,
    model: Option<PathBuf>,
    static_dir: PathBuf,
    alpha: f32,
    api_key: Option<String>,
) -> Result<()> {
    println!("=== cxr-rs Screening Server ===\n");
    println!("Configuration:");
    println!("  Address: {}", addr);
    println!("  Static dir: {:?}", static_dir);
    println!("  Heatmap alpha: {}", alpha);
    println!(
        "  Explanations: {}\n",
        if api_key.is_some() { "remote" } else { "offline" }
    );

    let screener = load_screener(model.as_ref())?;

    let mut config = ServerConfig::default()
        .with_address(addr)
        .with_static_dir(static_dir)
        .with_alpha(alpha);
    if let Some(key) = api_key {
        config = config.with_api_key(key);
    }

    run(config, screener).await.context("Server failed")
}

fn handle_predict(
    image: PathBuf,
    model: Option<PathBuf>,
    output: PathBuf,
    target_class: Option<usize>,
    alpha: f32,
) -> Result<()> {
    println!("=== cxr-rs Prediction ===\n");

    let bytes = std::fs::read(&image).context(format!("Failed to read image {:?}", image))?;
    let screener = load_screener(model.as_ref())?;

    let outcome = screener
        .screen_with_target(&bytes, target_class)
        .context("Screening failed")?;

    println!("Prediction: {}", outcome.prediction.label);
    println!("Confidence: {:.2}%", outcome.prediction.confidence * 100.0);
    println!(
        "Attribution: {}x{} map",
        outcome.heatmap.width(),
        outcome.heatmap.height()
    );

    save_heatmap(&outcome.heatmap, &output, Some(&outcome.original), alpha)
        .context(format!("Failed to save heatmap to {:?}", output))?;
    println!("\nSaved heatmap composite to {:?}", output);

    Ok(())
}
