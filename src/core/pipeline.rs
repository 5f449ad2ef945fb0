use crate::adapters::shapefile::ShapefileStore;
use crate::core::archive::pack;
use crate::core::guesser::{guess_row, guess_row_task};
use crate::core::parser::{read_sample, FeatureParser};
use crate::core::schema::build_schema;
use crate::core::writer::write_features;
use crate::core::{ConfigProvider, ParseOutcome, Pipeline, TypeSchema};
use crate::domain::ports::FeatureStore;
use crate::utils::error::{IngestError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tokio::runtime::Handle;

/// CSV file → point shapefile → zip archive.
pub struct CsvIngestPipeline<C: ConfigProvider> {
    config: C,
    executor: Option<Handle>,
}

impl<C: ConfigProvider> CsvIngestPipeline<C> {
    pub fn new(config: C) -> Self {
        Self {
            config,
            executor: None,
        }
    }

    /// Run sample type guessing as a task on the given runtime.
    pub fn with_executor(mut self, executor: Handle) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    fn open_input(&self) -> Result<BufReader<File>> {
        let path = self.config.input_path();
        let file = File::open(path).map_err(|e| {
            IngestError::IoError(std::io::Error::new(
                e.kind(),
                format!("cannot open {}: {}", path.display(), e),
            ))
        })?;
        Ok(BufReader::new(file))
    }
}

/// Create the schema, write every feature in one transaction and close the
/// store, whatever the outcome of the write.
pub fn load_into<S: FeatureStore>(
    store: &mut S,
    schema: &TypeSchema,
    outcome: &ParseOutcome,
    batch_size: usize,
) -> Result<usize> {
    store.create_schema(&schema.spec())?;
    let written = write_features(store, outcome.features.as_slice(), batch_size);
    let closed = store.close();
    let written = written?;
    closed?;
    Ok(written)
}

#[async_trait::async_trait]
impl<C: ConfigProvider> Pipeline for CsvIngestPipeline<C> {
    async fn infer_schema(&self) -> Result<TypeSchema> {
        let name = self.config.destination_name();

        if let Some(spec) = self.config.schema_spec() {
            tracing::info!("Using explicit schema spec");
            return TypeSchema::from_spec(&name, spec);
        }

        let (field_names, sample) = read_sample(self.open_input()?, self.config.row_format())?;
        tracing::debug!("Sample row: {:?}", sample);

        let tags = match &self.executor {
            Some(handle) => guess_row_task(handle, sample).await.map_err(|e| {
                IngestError::IoError(std::io::Error::other(format!(
                    "type guessing task failed: {}",
                    e
                )))
            })??,
            None => guess_row(&sample)?,
        };

        build_schema(&name, &field_names, &tags)
    }

    async fn extract(&self, schema: &TypeSchema) -> Result<ParseOutcome> {
        // 先檢查 lat/lon 設定，失敗時不讀任何資料
        let parser = FeatureParser::new(
            schema,
            self.config.lat_lon(),
            self.config.row_format().clone(),
        )?;
        parser.parse(self.open_input()?)
    }

    async fn load(&self, schema: &TypeSchema, outcome: &ParseOutcome) -> Result<PathBuf> {
        let mut store = ShapefileStore::new(self.config.output_dir(), &self.config.destination_name())
            .with_composed_geometry(self.config.lat_lon().is_some());

        let written = load_into(&mut store, schema, outcome, self.config.batch_size())?;
        tracing::debug!("{} features committed", written);

        pack(store.artifacts())
    }
}
