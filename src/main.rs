use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod error;
mod models;
mod pipeline;
mod server;
mod services;
mod sources;
mod store;

use config::ServerConfig;
use pipeline::{ImagePipeline, ProcessOptions};

#[derive(Parser)]
#[command(name = "inkframe")]
#[command(about = "Display orchestrator for Spectra 6 e-paper art frames")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Run the image pipeline on a local file and write the device buffer
    Convert {
        /// Source image (PNG/JPEG/WEBP/SVG)
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the raw RGB888 buffer
        #[arg(short, long)]
        output: PathBuf,

        /// Also write a PNG preview of the quantized result
        #[arg(short, long)]
        preview: Option<PathBuf>,

        /// Rotation in degrees (0, 90, 180, 270)
        #[arg(short, long, default_value_t = 0)]
        rotation: u16,

        /// Zoom level (>= 1.0)
        #[arg(short, long, default_value_t = 1.0)]
        zoom: f32,

        /// Dither algorithm: floyd-steinberg, atkinson, none
        #[arg(short, long, default_value = "floyd-steinberg")]
        dither: String,

        /// Stretch contrast before quantization
        #[arg(long)]
        contrast: bool,

        /// Apply an unsharp mask before quantization
        #[arg(long)]
        sharpen: bool,
    },
    /// Print the effective environment configuration
    Status,
}

/// OpenAPI documentation for the device-facing protocol.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Inkframe API",
        description = "Display orchestrator for Spectra 6 e-paper art frames",
        version = "0.4.0",
        license(name = "MIT")
    ),
    paths(
        api::handle_current,
        api::handle_image_bin,
        api::device::handle_device_status,
        api::device::handle_drain_commands,
        api::firmware::handle_firmware_version,
    ),
    components(schemas(
        api::CurrentJsonResponse,
        models::StatusReport,
        models::DeviceStatus,
        models::QueuedCommand,
        models::CommandKind,
        services::FirmwareManifest,
    )),
    tags(
        (name = "Device", description = "Wake-cycle endpoints polled by the panel"),
        (name = "OTA", description = "Firmware distribution")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Convert {
            input,
            output,
            preview,
            rotation,
            zoom,
            dither,
            contrast,
            sharpen,
        }) => run_convert(input, output, preview, rotation, zoom, &dither, contrast, sharpen),
        Some(Commands::Status) => {
            run_status();
            Ok(())
        }
        Some(Commands::Serve) | None => run_server().await,
    }
}

#[allow(clippy::too_many_arguments)]
fn run_convert(
    input: PathBuf,
    output: PathBuf,
    preview: Option<PathBuf>,
    rotation: u16,
    zoom: f32,
    dither: &str,
    contrast: bool,
    sharpen: bool,
) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkframe=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let options = ProcessOptions {
        rotation: models::Rotation::try_from(rotation).map_err(|e| anyhow::anyhow!(e))?,
        zoom_level: zoom,
        dither: spectra_dither::DitherAlgorithm::parse(dither)
            .ok_or_else(|| anyhow::anyhow!("unknown dither algorithm '{dither}'"))?,
        enhance_contrast: contrast,
        sharpen,
        ..Default::default()
    };

    let bytes = std::fs::read(&input)?;
    let result = ImagePipeline::process_sync(&bytes, &options)
        .map_err(|e| anyhow::anyhow!("pipeline: {e}"))?;

    std::fs::write(&output, &result.pixels)?;
    println!(
        "Wrote {} ({} bytes, {}x{})",
        output.display(),
        result.pixels.len(),
        result.width,
        result.height
    );
    if let Some(preview_path) = preview {
        std::fs::write(&preview_path, &result.thumbnail_png)?;
        println!("Wrote preview {}", preview_path.display());
    }
    Ok(())
}

fn run_status() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    let config = ServerConfig::from_env();

    println!("Inkframe v{VERSION}");
    println!("Display orchestrator for Spectra 6 e-paper art frames\n");

    println!("Environment:");
    println!("  PORT          = {}", config.port);
    println!(
        "  API_KEY       = {}",
        if config.api_key.is_some() {
            "(set)"
        } else {
            "(not set - mutating endpoints open)"
        }
    );
    println!("  DATA_DIR      = {}", config.data_dir.display());
    println!("  DEVICE_ID     = {}", config.default_device_id);
    println!("  FIRMWARE_PATH = {}", config.firmware_path.display());
    println!(
        "  WEBHOOK_URL   = {}",
        config.webhook_url.as_deref().unwrap_or("(not set)")
    );
    println!("  PIPELINE_JOBS = {}", config.pipeline_jobs);

    println!("\nMuseum API keys:");
    let key_status = |key: &Option<String>| if key.is_some() { "set" } else { "missing" };
    println!("  RIJKS_API_KEY       = {}", key_status(&config.rijks_api_key));
    println!("  HARVARD_API_KEY     = {}", key_status(&config.harvard_api_key));
    println!(
        "  SMITHSONIAN_API_KEY = {}",
        key_status(&config.smithsonian_api_key)
    );

    println!("\nCommands:");
    println!("  inkframe serve     Start the HTTP server");
    println!("  inkframe convert   Run the pipeline on a local image");
    println!("\nRun 'inkframe --help' for more details.");
}

async fn run_server() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config::default_log_filter())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        data_dir = %config.data_dir.display(),
        api_key = config.api_key.is_some(),
        "Starting Inkframe"
    );

    let state = server::create_app_state(config)
        .await
        .map_err(|e| anyhow::anyhow!("startup: {e}"))?;

    let app = server::build_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Inkframe server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
