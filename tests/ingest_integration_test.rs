use csv_geo_ingest::adapters::shapefile::{read_dbf, read_points};
use csv_geo_ingest::core::Pipeline;
use csv_geo_ingest::utils::validation::Validate;
use csv_geo_ingest::{
    CsvIngestPipeline, IngestConfig, IngestEngine, IngestError, TomlConfig, TypeTag,
};
use std::fs::File;
use std::path::Path;
use tempfile::TempDir;
use zip::ZipArchive;

const OBSERVATIONS: &str = "id,name,dtg,lat,lon\n\
    1,Alice,2014-01-01T00:00:00Z,42.0,-71.0\n\
    2,Bob,not-a-date,10.0,20.0\n";

fn write_input(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn archive_entries(path: &Path) -> Vec<String> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

fn extract_entry(archive: &Path, entry: &str, target: &Path) {
    let mut archive = ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut file = archive.by_name(entry).unwrap();
    let mut out = File::create(target).unwrap();
    std::io::copy(&mut file, &mut out).unwrap();
}

#[tokio::test]
async fn test_end_to_end_ingest_with_composed_geometry() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), "obs.csv", OBSERVATIONS);
    let output_dir = temp_dir.path().join("out");

    let config = IngestConfig::new(&input, &output_dir).with_lat_lon("lat", "lon");
    assert!(config.validate().is_ok());

    let engine = IngestEngine::new(CsvIngestPipeline::new(config));
    let report = engine.run().await.unwrap();

    assert_eq!(
        report.schema_spec,
        "id:Integer,name:String,dtg:Date:default=true,lat:Double,lon:Double"
    );
    assert_eq!(report.ingested, 1);
    assert_eq!(report.discarded.len(), 1);
    assert_eq!(report.discarded[0].line, 3);
    assert_eq!(report.archive_path, output_dir.join("obs.zip"));

    assert_eq!(
        archive_entries(&report.archive_path),
        vec!["obs.dbf", "obs.fix", "obs.prj", "obs.shp", "obs.shx"]
    );

    // the attribute table shipped inside the archive holds exactly one feature
    let extracted = temp_dir.path().join("from_archive.dbf");
    extract_entry(&report.archive_path, "obs.dbf", &extracted);
    let table = read_dbf(&extracted).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.column("id"), Some(vec!["1"]));
    assert_eq!(table.column("name"), Some(vec!["Alice"]));
    assert_eq!(table.column("dtg"), Some(vec!["20140101"]));

    let extracted = temp_dir.path().join("from_archive.shp");
    extract_entry(&report.archive_path, "obs.shp", &extracted);
    let points = read_points(&extracted).unwrap();
    assert_eq!(points.len(), 1);
    let point = points[0].unwrap();
    assert_eq!((point.x(), point.y()), (-71.0, 42.0));
}

#[tokio::test]
async fn test_rows_are_isolated_from_each_other() {
    let temp_dir = TempDir::new().unwrap();
    let csv = "id,score\n\
        1,1.5\n\
        2,oops\n\
        3\n\
        4,2.5\n";
    let input = write_input(temp_dir.path(), "scores.csv", csv);

    let pipeline = CsvIngestPipeline::new(IngestConfig::new(&input, temp_dir.path().join("out")));
    let schema = pipeline.infer_schema().await.unwrap();
    assert_eq!(schema.column("score").unwrap().tag, TypeTag::Double);

    let outcome = pipeline.extract(&schema).await.unwrap();
    let lines: Vec<u64> = outcome.discarded.iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![3, 4]);
    assert_eq!(outcome.features.len(), 2);

    let archive = pipeline.load(&schema, &outcome).await.unwrap();
    let table = read_dbf(archive.with_extension("dbf")).unwrap();
    assert_eq!(table.column("id"), Some(vec!["1", "4"]));
}

#[tokio::test]
async fn test_misconfigured_composition_fails_before_writing() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), "obs.csv", OBSERVATIONS);
    let output_dir = temp_dir.path().join("out");

    let config = IngestConfig::new(&input, &output_dir).with_lat_lon("latitude", "lon");
    let engine = IngestEngine::new(CsvIngestPipeline::new(config));

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, IngestError::ConfigurationError { .. }));
    assert!(!output_dir.join("obs.zip").exists());
}

#[tokio::test]
async fn test_point_column_becomes_default_geometry() {
    let temp_dir = TempDir::new().unwrap();
    let csv = "site,geom\nA,POINT (1.5 2.5)\nB,POINT (-3 4)\n";
    let input = write_input(temp_dir.path(), "sites.csv", csv);
    let output_dir = temp_dir.path().join("out");

    let engine = IngestEngine::new(CsvIngestPipeline::new(IngestConfig::new(&input, &output_dir)));
    let report = engine.run().await.unwrap();
    assert_eq!(report.schema_spec, "site:String,*geom:Point:srid=4326");

    let points = read_points(output_dir.join("sites.shp")).unwrap();
    let coords: Vec<(f64, f64)> = points.iter().map(|p| p.unwrap().x_y()).collect();
    assert_eq!(coords, vec![(1.5, 2.5), (-3.0, 4.0)]);
}

#[tokio::test]
async fn test_toml_configured_ingest() {
    let temp_dir = TempDir::new().unwrap();
    let csv = "id;label;lat;lon\n7;'a;b';1.0;2.0\n";
    let input = write_input(temp_dir.path(), "semi.csv", csv);
    let output_dir = temp_dir.path().join("out");

    let toml = format!(
        r#"
[source]
path = "{}"
delimiter = ";"
quote = "'"

[schema]
name = "semicolons"
lat_field = "lat"
lon_field = "lon"

[output]
dir = "{}"
batch_size = 10
"#,
        input.display(),
        output_dir.display()
    );
    let config = TomlConfig::from_toml_str(&toml).unwrap().to_ingest_config();
    assert!(config.validate().is_ok());

    let report = IngestEngine::new(CsvIngestPipeline::new(config))
        .run()
        .await
        .unwrap();
    assert_eq!(report.archive_path, output_dir.join("semicolons.zip"));
    assert_eq!(report.ingested, 1);

    let table = read_dbf(output_dir.join("semicolons.dbf")).unwrap();
    assert_eq!(table.column("label"), Some(vec!["a;b"]));
}
