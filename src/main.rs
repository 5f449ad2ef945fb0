use clap::Parser;
use csv_geo_ingest::utils::error::ErrorSeverity;
use csv_geo_ingest::utils::logger::{self, LogFormat};
use csv_geo_ingest::utils::validation::Validate;
use csv_geo_ingest::{CliConfig, CsvIngestPipeline, IngestEngine};
use tokio::runtime::Handle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(LogFormat::from_json_flag(cli.json), cli.verbose);

    tracing::info!("Starting csv-geo-ingest CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = cli.to_ingest_config();

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let monitor_enabled = config.monitor;
    let pipeline = CsvIngestPipeline::new(config).with_executor(Handle::current());
    let engine = IngestEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(report) => {
            tracing::info!("✅ Ingest completed successfully!");
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("✅ Ingest completed successfully!");
                println!("🧬 Schema: {}", report.schema_spec);
                println!(
                    "📄 {} features written, {} rows discarded",
                    report.ingested,
                    report.discarded.len()
                );
                for row in &report.discarded {
                    println!("  ⚠️ line {}: {}", row.line, row.reason);
                }
                println!("📁 Archive: {}", report.archive_path.display());
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Ingest failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
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
