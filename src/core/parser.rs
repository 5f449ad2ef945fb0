use crate::core::guesser::{guess_row, parse_as};
use crate::core::schema::build_schema;
use crate::domain::model::{
    DiscardedRow, Feature, ParseOutcome, RowFormat, TypeSchema, TypeTag, Value,
};
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::validate_single_byte_char;
use csv::{ByteRecord, ReaderBuilder, Terminator, Trim, WriterBuilder};
use geo_types::Point;
use std::io::Read;

impl RowFormat {
    pub fn reader_builder(&self) -> Result<ReaderBuilder> {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(validate_single_byte_char("delimiter", self.delimiter)?)
            .quote(validate_single_byte_char("quote", self.quote)?)
            .has_headers(self.has_header)
            // 欄位數不符交給逐列檢查處理
            .flexible(true)
            .trim(if self.trim { Trim::All } else { Trim::None });
        if let Some(separator) = self.record_separator {
            builder.terminator(Terminator::Any(validate_single_byte_char(
                "record_separator",
                separator,
            )?));
        }
        Ok(builder)
    }

    // 重組被丟棄的列，引號規則與輸入相同
    fn writer_builder(&self) -> Result<WriterBuilder> {
        let mut builder = WriterBuilder::new();
        builder
            .delimiter(validate_single_byte_char("delimiter", self.delimiter)?)
            .quote(validate_single_byte_char("quote", self.quote)?)
            .terminator(Terminator::Any(b'\n'));
        Ok(builder)
    }
}

fn read_failure(err: csv::Error) -> IngestError {
    if !err.is_io_error() {
        return IngestError::CsvError(err);
    }
    match err.into_kind() {
        csv::ErrorKind::Io(io) => IngestError::IoError(io),
        _ => IngestError::IoError(std::io::Error::other("csv reader failed")),
    }
}

/// Header names and the first data row. Without a header the names are
/// `field_1..field_n`.
pub fn read_sample<R: Read>(reader: R, format: &RowFormat) -> Result<(Vec<String>, Vec<String>)> {
    let mut builder = format.reader_builder()?;
    builder.has_headers(false);
    let mut csv_reader = builder.from_reader(reader);
    let mut records = csv_reader.records();

    let first = records
        .next()
        .transpose()
        .map_err(read_failure)?
        .ok_or_else(|| IngestError::config("input file is empty"))?;

    if !format.has_header {
        let names = (1..=first.len()).map(|i| format!("field_{}", i)).collect();
        return Ok((names, first.iter().map(str::to_string).collect()));
    }

    let sample = records
        .next()
        .transpose()
        .map_err(read_failure)?
        .ok_or_else(|| IngestError::config("input file has a header but no data row"))?;

    Ok((
        first.iter().map(str::to_string).collect(),
        sample.iter().map(str::to_string).collect(),
    ))
}

/// Infer the run's schema from the header and first data row of `reader`.
pub fn infer_schema<R: Read>(name: &str, reader: R, format: &RowFormat) -> Result<TypeSchema> {
    let (field_names, sample) = read_sample(reader, format)?;
    let tags = guess_row(&sample)?;
    tracing::debug!("Sample row {:?} inferred as {:?}", sample, tags);
    build_schema(name, &field_names, &tags)
}

/// Parses rows against a fixed schema, optionally composing a point from
/// two `Double` columns.
#[derive(Debug)]
pub struct FeatureParser<'a> {
    schema: &'a TypeSchema,
    format: RowFormat,
    // (lat, lon) column positions
    composition: Option<(usize, usize)>,
}

impl<'a> FeatureParser<'a> {
    /// Fails with a configuration error when a composition field is missing
    /// or not typed `Double`. No input is touched.
    pub fn new(
        schema: &'a TypeSchema,
        lat_lon: Option<(&str, &str)>,
        format: RowFormat,
    ) -> Result<Self> {
        let composition = match lat_lon {
            Some((lat, lon)) => Some((
                resolve_double_field(schema, lat)?,
                resolve_double_field(schema, lon)?,
            )),
            None => None,
        };
        format.reader_builder()?;

        Ok(Self {
            schema,
            format,
            composition,
        })
    }

    pub fn parse<R: Read>(&self, reader: R) -> Result<ParseOutcome> {
        let mut csv_reader = self.format.reader_builder()?.from_reader(reader);
        let mut record = ByteRecord::new();
        let mut outcome = ParseOutcome::default();

        while csv_reader.read_byte_record(&mut record).map_err(read_failure)? {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            match self.parse_record(&record) {
                Ok((values, geometry)) => {
                    let fid = format!("{}.{}", self.schema.name(), outcome.features.len() + 1);
                    outcome.features.push(Feature {
                        fid,
                        values,
                        geometry,
                    });
                }
                Err(message) => {
                    let raw = self.raw_row(&record);
                    tracing::warn!(
                        "Skipping row: {} [{}]",
                        IngestError::RowParseError {
                            line,
                            message: message.clone()
                        },
                        raw
                    );
                    outcome.discarded.push(DiscardedRow {
                        line,
                        raw,
                        reason: message,
                    });
                }
            }
        }

        tracing::info!(
            "Parsed {} features, discarded {} rows",
            outcome.features.len(),
            outcome.discarded.len()
        );
        Ok(outcome)
    }

    fn parse_record(
        &self,
        record: &ByteRecord,
    ) -> std::result::Result<(Vec<Value>, Option<Point<f64>>), String> {
        if record.len() != self.schema.len() {
            return Err(format!(
                "expected {} fields, found {}",
                self.schema.len(),
                record.len()
            ));
        }

        let values = record
            .iter()
            .zip(self.schema.columns())
            .map(|(field, column)| {
                let text = std::str::from_utf8(field)
                    .map_err(|_| format!("field '{}' is not valid UTF-8", column.name))?;
                parse_as(column.tag, text).ok_or_else(|| {
                    format!(
                        "'{}' is not a valid {} for field '{}'",
                        text, column.tag, column.name
                    )
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let geometry = self.composition.and_then(|(lat, lon)| {
            let lat = values[lat].as_f64()?;
            let lon = values[lon].as_f64()?;
            // x 是經度，y 是緯度
            Some(Point::new(lon, lat))
        });

        Ok((values, geometry))
    }

    /// The row as it would be written back in the input's format.
    fn raw_row(&self, record: &ByteRecord) -> String {
        let encoded = self.format.writer_builder().and_then(|builder| {
            let mut writer = builder.from_writer(Vec::new());
            writer.write_byte_record(record)?;
            writer
                .into_inner()
                .map_err(|e| IngestError::IoError(e.into_error()))
        });

        match encoded {
            Ok(mut bytes) => {
                if bytes.last() == Some(&b'\n') {
                    bytes.pop();
                }
                String::from_utf8_lossy(&bytes).into_owned()
            }
            Err(e) => {
                tracing::debug!("Could not re-encode discarded row: {}", e);
                record
                    .iter()
                    .map(String::from_utf8_lossy)
                    .collect::<Vec<_>>()
                    .join(&self.format.delimiter.to_string())
            }
        }
    }
}

fn resolve_double_field(schema: &TypeSchema, field: &str) -> Result<usize> {
    let index = schema.index_of(field).ok_or_else(|| {
        IngestError::config(format!("composition field '{}' is not in the schema", field))
    })?;
    let tag = schema.columns()[index].tag;
    if tag != TypeTag::Double {
        return Err(IngestError::config(format!(
            "composition field '{}' is typed {} but must be Double",
            field, tag
        )));
    }
    Ok(index)
}
