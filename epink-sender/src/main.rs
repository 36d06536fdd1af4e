//! epink-sender — entry point.
//!
//! ```text
//! epink-sender --image frame.png              Deliver one frame
//! epink-sender                                Deliver a blank (white) frame
//! epink-sender --image frame.png --dry-run    Encode only, print a summary
//! epink-sender --config <path>                Load a custom config TOML
//! epink-sender --gen-config                   Write default config to stdout
//! epink-sender --init-config                  Write default config to --config
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use epink_sender::canvas;
use epink_sender::config::SenderConfig;
use epink_sender::session::SenderSession;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "epink-sender", about = "Encode a frame and push it to an e-paper panel")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "epink-sender.toml")]
    config: PathBuf,

    /// Rendered frame; must match the panel size.
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Publish into memory instead of the broker.
    #[arg(long)]
    dry_run: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to the --config path and exit.
    #[arg(long)]
    init_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }
    if cli.init_config {
        SenderConfig::write_default(&cli.config)?;
        println!("Wrote {}", cli.config.display());
        return Ok(());
    }

    let config = SenderConfig::load(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("epink-sender v{}", env!("CARGO_PKG_VERSION"));
    if !cli.config.exists() {
        info!("no config at {}; using defaults", cli.config.display());
    }
    info!("panel: {}x{}", config.panel.width, config.panel.height);
    info!("codec: {:?} level {}", config.encoding.codec, config.encoding.level);
    if !cli.dry_run {
        info!(
            "broker: {}:{} topic {}",
            config.broker.host, config.broker.port, config.broker.topic
        );
    }

    let frame = match &cli.image {
        Some(path) => canvas::load_image(path)?,
        None => {
            info!("no --image given; sending a blank frame");
            canvas::blank(&config.pixel_format()?)
        }
    };

    let session = SenderSession::new(config).dry_run(cli.dry_run);
    let report = session.run(&frame).await?;
    let d = &report.delivery;

    println!(
        "packed {} B -> compressed {} B -> sealed {} B in {} parts (stride {} B)",
        d.packed_len, d.compressed_len, d.blob_len, d.report.parts, d.report.stride
    );
    if let Some(sink) = &report.captured {
        println!("dry run: {} records captured, nothing sent", sink.len());
    }

    Ok(())
}
