use crate::config::{IngestConfig, DEFAULT_BATCH_SIZE};
use crate::core::RowFormat;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "csv-geo-ingest")]
#[command(about = "Ingest a delimited text file into a zipped point shapefile")]
pub struct CliConfig {
    /// Input CSV file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory receiving the shapefile set and the archive
    #[arg(short, long, default_value = "./output")]
    pub output_dir: PathBuf,

    /// Destination name (defaults to the input file stem)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Explicit schema spec, e.g. "id:Integer,dtg:Date,lat:Double,lon:Double"
    #[arg(long)]
    pub spec: Option<String>,

    /// Latitude field used to compose the point geometry
    #[arg(long, requires = "lon")]
    pub lat: Option<String>,

    /// Longitude field used to compose the point geometry
    #[arg(long, requires = "lat")]
    pub lon: Option<String>,

    #[arg(long, default_value = ",")]
    pub delimiter: char,

    #[arg(long, default_value = "\"")]
    pub quote: char,

    /// Record separator (defaults to CR/LF line endings)
    #[arg(long)]
    pub record_separator: Option<char>,

    /// The first row is data, not a header
    #[arg(long)]
    pub no_header: bool,

    /// Trim whitespace around every field
    #[arg(long)]
    pub trim: bool,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per stage")]
    pub monitor: bool,

    #[arg(long, help = "Emit JSON logs and print the run report as JSON")]
    pub json: bool,
}

impl CliConfig {
    pub fn to_ingest_config(&self) -> IngestConfig {
        IngestConfig {
            input_path: self.input.clone(),
            output_dir: self.output_dir.clone(),
            name: self.name.clone(),
            spec: self.spec.clone(),
            lat_field: self.lat.clone(),
            lon_field: self.lon.clone(),
            format: RowFormat {
                delimiter: self.delimiter,
                quote: self.quote,
                record_separator: self.record_separator,
                has_header: !self.no_header,
                trim: self.trim,
            },
            batch_size: self.batch_size,
            monitor: self.monitor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigProvider;

    #[test]
    fn test_parse_cli_arguments() {
        let cli = CliConfig::try_parse_from([
            "csv-geo-ingest",
            "--input",
            "data/obs.csv",
            "--lat",
            "lat",
            "--lon",
            "lon",
            "--delimiter",
            ";",
            "--no-header",
        ])
        .unwrap();

        let config = cli.to_ingest_config();
        assert_eq!(config.destination_name(), "obs");
        assert_eq!(config.lat_lon(), Some(("lat", "lon")));
        assert_eq!(config.format.delimiter, ';');
        assert!(!config.format.has_header);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_lat_without_lon_is_rejected() {
        let result = CliConfig::try_parse_from(["csv-geo-ingest", "-i", "a.csv", "--lat", "lat"]);
        assert!(result.is_err());
    }
}
