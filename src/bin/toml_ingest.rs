use anyhow::Context;
use clap::Parser;
use csv_geo_ingest::core::ConfigProvider;
use csv_geo_ingest::core::Pipeline;
use csv_geo_ingest::utils::error::ErrorSeverity;
use csv_geo_ingest::utils::logger::{self, LogFormat};
use csv_geo_ingest::utils::validation::Validate;
use csv_geo_ingest::{CsvIngestPipeline, IngestConfig, IngestEngine, TomlConfig};
use tokio::runtime::Handle;

#[derive(Parser)]
#[command(name = "toml-ingest")]
#[command(about = "CSV to shapefile ingest driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "ingest-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - infer the schema and show it without writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_logger(LogFormat::Compact, args.verbose);

    tracing::info!("🚀 Starting TOML-based ingest");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let toml_config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    let mut config = toml_config.to_ingest_config();

    // 應用命令列覆蓋設定
    if let Some(monitor) = args.monitor {
        config.monitor = monitor;
        tracing::info!("🔧 Monitoring overridden to: {}", monitor);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, args.dry_run);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be written");
        return perform_dry_run(config).await;
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let monitor_enabled = config.monitor;
    let pipeline = CsvIngestPipeline::new(config).with_executor(Handle::current());
    let engine = IngestEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(report) => {
            println!("✅ Ingest completed successfully!");
            println!(
                "📄 {} features written, {} rows discarded",
                report.ingested,
                report.discarded.len()
            );
            println!("📁 Archive: {}", report.archive_path.display());
        }
        Err(e) => {
            tracing::error!(
                "❌ Ingest failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &IngestConfig, dry_run: bool) {
    let format = config.row_format();

    println!("📋 Configuration Summary:");
    println!("  Input: {}", config.input_path().display());
    println!("  Output: {}", config.output_dir().display());
    println!("  Destination: {}", config.destination_name());
    println!(
        "  Format: delimiter {:?}, quote {:?}, header {}, trim {}",
        format.delimiter, format.quote, format.has_header, format.trim
    );
    if let Some((lat, lon)) = config.lat_lon() {
        println!("  Geometry: POINT({} {})", lon, lat);
    }
    println!("  Batch Size: {}", config.batch_size());

    if dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

async fn perform_dry_run(config: IngestConfig) -> anyhow::Result<()> {
    let pipeline = CsvIngestPipeline::new(config);
    let schema = pipeline
        .infer_schema()
        .await
        .context("schema inference failed")?;

    println!("🔍 Dry Run Analysis:");
    println!("  Input: {}", pipeline.config().input_path().display());
    println!("  Schema: {}", schema.spec());
    for column in schema.columns() {
        println!("  {} -> {}", column.name, column.tag);
    }
    if let Some(field) = schema.default_temporal_field() {
        println!("  Default time field: {}", field);
    }
    if let Some(field) = schema.default_geometry_field() {
        println!("  Default geometry field: {}", field);
    }

    println!();
    println!("✅ Dry run analysis complete.");
    Ok(())
}
