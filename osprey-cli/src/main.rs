//! Osprey CLI
//!
//! Concurrent OSINT aggregation for domains, emails, IPs, and usernames.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use osprey_core::{Category, SourceCatalog};
use osprey_engine::{export_intelligence, AggregationEngine, ExportFormat};
use osprey_sources::{build_client, HandlerRegistry};

mod render;

#[derive(Parser)]
#[command(name = "osprey")]
#[command(author, version, about = "Osprey: concurrent OSINT aggregation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a target across all eligible sources
    Scan {
        /// Target identifier (domain, email, IP, or username)
        target: String,

        /// Query category; detected from the target's shape when omitted
        #[arg(short, long)]
        category: Option<Category>,

        /// Catalog file overriding the embedded one
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Write the report as markdown to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also export session results (csv or json)
        #[arg(long)]
        export: Option<ExportFormat>,

        /// Export destination (default: osprey_export.<format>)
        #[arg(long)]
        export_path: Option<PathBuf>,
    },

    /// List the sources in the catalog
    Sources {
        /// Catalog file overriding the embedded one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Scan {
            target,
            category,
            catalog,
            output,
            export,
            export_path,
        } => {
            run_scan(&target, category, catalog, output, export, export_path).await?;
        }
        Commands::Sources { catalog } => {
            list_sources(catalog)?;
        }
    }

    Ok(())
}

async fn run_scan(
    target: &str,
    category: Option<Category>,
    catalog_path: Option<PathBuf>,
    output: Option<PathBuf>,
    export: Option<ExportFormat>,
    export_path: Option<PathBuf>,
) -> Result<()> {
    let catalog = Arc::new(SourceCatalog::load_or_default(catalog_path.as_deref()));
    if catalog.is_empty() {
        println!("⚠️  Catalog is empty - every scan will report zero sources");
    }

    let client = build_client(catalog.settings().default_timeout_secs)?;
    let engine = AggregationEngine::new(catalog, HandlerRegistry::with_defaults(client));

    let category = category.unwrap_or_else(|| Category::detect(target));
    println!("🔍 Scanning {target} as {category}\n");

    let report = engine.run(target, category).await;
    let rendered = render::render_report(&report);

    println!("{rendered}");

    if let Some(path) = output {
        fs::write(&path, &rendered)?;
        println!("📄 Report saved to {}", path.display());
    }

    if let Some(format) = export {
        let serialized = export_intelligence(engine.executor().cache(), format);
        let path =
            export_path.unwrap_or_else(|| PathBuf::from(format!("osprey_export.{format}")));
        fs::write(&path, serialized)?;
        println!("📦 Session results exported to {}", path.display());
    }

    Ok(())
}

fn list_sources(catalog_path: Option<PathBuf>) -> Result<()> {
    let catalog = SourceCatalog::load_or_default(catalog_path.as_deref());

    println!("📚 Source catalog ({} sources)\n", catalog.len());
    print!("{}", render::render_catalog(&catalog));

    let settings = catalog.settings();
    println!(
        "\nSettings: {} concurrent, {}s timeout, {} attempts, {}ms backoff base",
        settings.max_concurrent_requests,
        settings.default_timeout_secs,
        settings.retry_attempts,
        settings.backoff_base_ms
    );

    Ok(())
}
