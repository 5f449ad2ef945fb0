use crate::core::{IngestReport, Pipeline};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Runs one ingest: schema → parse → write → pack, strictly in order.
pub struct IngestEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> IngestEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<IngestReport> {
        tracing::info!("🚀 Starting ingest");

        let schema = self.pipeline.infer_schema().await?;
        let schema_spec = schema.spec();
        tracing::info!("🧬 Schema: {}", schema_spec);
        self.monitor.log_stage("schema");

        let outcome = self.pipeline.extract(&schema).await?;
        tracing::debug!(
            "{} features carry a composed point",
            outcome.features.iter().filter(|f| f.geometry.is_some()).count()
        );
        tracing::info!(
            "📄 Parsed {} features ({} rows discarded)",
            outcome.features.len(),
            outcome.discarded.len()
        );
        self.monitor.log_stage("parse");

        let archive_path = self.pipeline.load(&schema, &outcome).await?;
        tracing::info!("📁 Archive written to {}", archive_path.display());
        self.monitor.log_stage("load");
        self.monitor.log_final_stats();

        Ok(IngestReport {
            archive_path,
            schema_spec,
            ingested: outcome.features.len(),
            discarded: outcome.discarded,
        })
    }
}
