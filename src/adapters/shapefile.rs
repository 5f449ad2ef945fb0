use crate::domain::model::{ArtifactSet, Feature, TypeSchema, TypeTag, Value};
use crate::domain::ports::FeatureStore;
use crate::utils::error::{IngestError, Result};
use chrono::Datelike;
use geo_types::Point;
use std::fs;
use std::path::{Path, PathBuf};

const SHP_FILE_CODE: i32 = 9994;
const SHP_VERSION: i32 = 1000;
const SHP_HEADER_LEN: usize = 100;
const SHAPE_NULL: i32 = 0;
const SHAPE_POINT: i32 = 1;

const DBF_VERSION: u8 = 0x03;
const DBF_HEADER_END: u8 = 0x0D;
const DBF_EOF: u8 = 0x1A;
const DBF_MAX_FIELDS: usize = 255;
const DBF_MAX_CHAR_LEN: usize = 254;
const DBF_NAME_LEN: usize = 10;

const FIX_VERSION: u8 = 1;

const WGS84_PRJ: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]";

/// Where each record's shape comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeSource {
    Composed,
    Column(usize),
    Absent,
}

/// Point shapefile writer. Features are buffered per transaction and the
/// whole file set is rewritten on commit.
#[derive(Debug)]
pub struct ShapefileStore {
    artifacts: ArtifactSet,
    composed_geometry: bool,
    schema: Option<TypeSchema>,
    committed: Vec<Feature>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct ShapefileTransaction {
    pending: Vec<Feature>,
}

impl ShapefileStore {
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            artifacts: ArtifactSet::new(dir.as_ref().join(format!("{}.shp", name))),
            composed_geometry: false,
            schema: None,
            committed: Vec::new(),
            closed: false,
        }
    }

    /// Use each feature's composed point as its shape.
    pub fn with_composed_geometry(mut self, composed: bool) -> Self {
        self.composed_geometry = composed;
        self
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    fn shape_source(&self, schema: &TypeSchema) -> ShapeSource {
        if self.composed_geometry {
            ShapeSource::Composed
        } else if let Some(index) = schema.default_geometry_index() {
            ShapeSource::Column(index)
        } else {
            ShapeSource::Absent
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(IngestError::write("shapefile store is closed"));
        }
        Ok(())
    }
}

impl FeatureStore for ShapefileStore {
    type Transaction = ShapefileTransaction;

    fn create_schema(&mut self, spec: &str) -> Result<()> {
        self.ensure_open()?;
        let name = self
            .artifacts
            .primary()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let schema = TypeSchema::from_spec(&name, spec)?;
        if let Some(dir) = self.artifacts.primary().parent() {
            fs::create_dir_all(dir)?;
        }
        tracing::debug!("Created shapefile schema {} at {:?}", spec, self.artifacts.primary());
        self.schema = Some(schema);
        Ok(())
    }

    fn begin(&mut self) -> Result<Self::Transaction> {
        self.ensure_open()?;
        if self.schema.is_none() {
            return Err(IngestError::write("schema must be created before writing"));
        }
        Ok(ShapefileTransaction::default())
    }

    fn add_features(&mut self, tx: &mut Self::Transaction, features: &[Feature]) -> Result<()> {
        let width = self.schema.as_ref().map(TypeSchema::len).unwrap_or_default();
        for feature in features {
            if feature.values.len() != width {
                return Err(IngestError::write(format!(
                    "feature {} has {} values, schema has {}",
                    feature.fid,
                    feature.values.len(),
                    width
                )));
            }
            if self.composed_geometry && feature.geometry.is_none() {
                return Err(IngestError::write(format!(
                    "feature {} has no composed geometry",
                    feature.fid
                )));
            }
        }
        tx.pending.extend_from_slice(features);
        Ok(())
    }

    fn commit(&mut self, tx: &mut Self::Transaction) -> Result<()> {
        self.ensure_open()?;
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| IngestError::write("schema must be created before writing"))?;
        let source = self.shape_source(schema);
        let all: Vec<&Feature> = self.committed.iter().chain(tx.pending.iter()).collect();

        let files = encode_artifacts(schema, source, &all)?;
        stage_and_swap(&self.artifacts, files)?;
        tracing::info!(
            "Wrote {} features to {}",
            all.len(),
            self.artifacts.primary().display()
        );

        self.committed.append(&mut tx.pending);
        Ok(())
    }

    fn rollback(&mut self, tx: &mut Self::Transaction) -> Result<()> {
        tracing::debug!("Discarding {} pending features", tx.pending.len());
        tx.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Write every file under a temporary name first, then rename into place.
/// Staged files that never reach their target are removed.
fn stage_and_swap(artifacts: &ArtifactSet, files: Vec<(&'static str, Vec<u8>)>) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (extension, bytes) in files {
        let target = artifacts.sibling(extension);
        let temp = artifacts.sibling(&format!("{}.tmp", extension));
        if let Err(e) = fs::write(&temp, &bytes) {
            staged.push((temp, target));
            discard_staged(&staged);
            return Err(e.into());
        }
        staged.push((temp, target));
    }

    for (i, (temp, target)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(temp, target) {
            tracing::error!(
                "Renaming {} into place failed after {} of {} files: {}",
                target.display(),
                i,
                staged.len(),
                e
            );
            discard_staged(&staged[i..]);
            return Err(e.into());
        }
    }
    Ok(())
}

fn discard_staged(staged: &[(PathBuf, PathBuf)]) {
    for (temp, _) in staged {
        match fs::remove_file(temp) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove staged file {}: {}", temp.display(), e),
        }
    }
}

fn encode_artifacts(
    schema: &TypeSchema,
    source: ShapeSource,
    features: &[&Feature],
) -> Result<Vec<(&'static str, Vec<u8>)>> {
    let shapes: Vec<Option<Point<f64>>> = features
        .iter()
        .map(|f| match source {
            ShapeSource::Composed => f.geometry,
            ShapeSource::Column(i) => f.values.get(i).and_then(Value::as_point),
            ShapeSource::Absent => None,
        })
        .collect();
    let shape_type = if source == ShapeSource::Absent {
        SHAPE_NULL
    } else {
        SHAPE_POINT
    };

    let (shp, shx, offsets) = encode_shapes(shape_type, &shapes);
    let dbf = encode_dbf(schema, source, features)?;
    let fix = encode_fix(features, &offsets)?;

    Ok(vec![
        ("shp", shp),
        ("shx", shx),
        ("dbf", dbf),
        ("prj", WGS84_PRJ.as_bytes().to_vec()),
        ("fix", fix),
    ])
}

fn put_be_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_le_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_le_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn shp_header(buf: &mut Vec<u8>, file_len_bytes: usize, shape_type: i32, bbox: [f64; 4]) {
    put_be_i32(buf, SHP_FILE_CODE);
    for _ in 0..5 {
        put_be_i32(buf, 0);
    }
    put_be_i32(buf, (file_len_bytes / 2) as i32);
    put_le_i32(buf, SHP_VERSION);
    put_le_i32(buf, shape_type);
    for v in bbox {
        put_le_f64(buf, v);
    }
    // z / m ranges
    for _ in 0..4 {
        put_le_f64(buf, 0.0);
    }
}

/// Returns the `.shp` bytes, the `.shx` bytes and each record's byte offset.
fn encode_shapes(shape_type: i32, shapes: &[Option<Point<f64>>]) -> (Vec<u8>, Vec<u8>, Vec<u64>) {
    let content_len = |shape: &Option<Point<f64>>| if shape.is_some() { 20 } else { 4 };
    let shp_len = SHP_HEADER_LEN + shapes.iter().map(|s| 8 + content_len(s)).sum::<usize>();
    let shx_len = SHP_HEADER_LEN + 8 * shapes.len();

    let bbox = shapes
        .iter()
        .flatten()
        .fold(None, |acc: Option<[f64; 4]>, p| {
            Some(match acc {
                None => [p.x(), p.y(), p.x(), p.y()],
                Some([xmin, ymin, xmax, ymax]) => [
                    xmin.min(p.x()),
                    ymin.min(p.y()),
                    xmax.max(p.x()),
                    ymax.max(p.y()),
                ],
            })
        })
        .unwrap_or([0.0; 4]);

    let mut shp = Vec::with_capacity(shp_len);
    let mut shx = Vec::with_capacity(shx_len);
    shp_header(&mut shp, shp_len, shape_type, bbox);
    shp_header(&mut shx, shx_len, shape_type, bbox);

    let mut offsets = Vec::with_capacity(shapes.len());
    for (i, shape) in shapes.iter().enumerate() {
        let offset = shp.len();
        let words = (content_len(shape) / 2) as i32;
        offsets.push(offset as u64);

        put_be_i32(&mut shx, (offset / 2) as i32);
        put_be_i32(&mut shx, words);

        put_be_i32(&mut shp, i as i32 + 1);
        put_be_i32(&mut shp, words);
        match shape {
            Some(p) => {
                put_le_i32(&mut shp, SHAPE_POINT);
                put_le_f64(&mut shp, p.x());
                put_le_f64(&mut shp, p.y());
            }
            None => put_le_i32(&mut shp, SHAPE_NULL),
        }
    }

    (shp, shx, offsets)
}

/// A dBase column descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfField {
    pub name: String,
    pub kind: char,
    pub length: u8,
    pub decimals: u8,
}

/// Attribute table read back from a `.dbf` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfTable {
    pub fields: Vec<DbfField>,
    pub rows: Vec<Vec<String>>,
}

impl DbfTable {
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        Some(self.rows.iter().map(|r| r[index].as_str()).collect())
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn dbf_field_names(columns: &[&str]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(columns.len());
    for column in columns {
        let mut candidate = truncate_bytes(column, DBF_NAME_LEN).to_string();
        let mut n = 1;
        while names.contains(&candidate) {
            let suffix = n.to_string();
            candidate = format!(
                "{}{}",
                truncate_bytes(column, DBF_NAME_LEN - suffix.len()),
                suffix
            );
            n += 1;
        }
        names.push(candidate);
    }
    names
}

/// Fixed-point when it fits and reads back exactly, shortest exponent form
/// otherwise.
fn format_double(v: f64, width: usize) -> String {
    let fixed = format!("{:.15}", v);
    if fixed.len() <= width && fixed.parse::<f64>().ok() == Some(v) {
        fixed
    } else {
        format!("{:e}", v)
    }
}

fn dbf_text(value: &Value, kind: char) -> String {
    match (value, kind) {
        (Value::Double(v), _) => format_double(*v, 33),
        (Value::Time(t), 'D') => format!("{:04}{:02}{:02}", t.year(), t.month(), t.day()),
        (other, _) => other.to_string(),
    }
}

fn encode_dbf(schema: &TypeSchema, source: ShapeSource, features: &[&Feature]) -> Result<Vec<u8>> {
    let columns: Vec<usize> = (0..schema.len())
        .filter(|i| source != ShapeSource::Column(*i))
        .collect();
    if columns.len() > DBF_MAX_FIELDS {
        return Err(IngestError::write(format!(
            "dbf supports at most {} attributes, got {}",
            DBF_MAX_FIELDS,
            columns.len()
        )));
    }

    let names = dbf_field_names(
        &columns
            .iter()
            .map(|i| schema.columns()[*i].name.as_str())
            .collect::<Vec<_>>(),
    );
    let fields: Vec<DbfField> = columns
        .iter()
        .zip(names)
        .map(|(i, name)| {
            let (kind, length, decimals) = match schema.columns()[*i].tag {
                TypeTag::Integer => ('N', 20, 0),
                TypeTag::Double => ('N', 33, 15),
                TypeTag::Time => ('D', 8, 0),
                TypeTag::Point | TypeTag::String => {
                    let longest = features
                        .iter()
                        .map(|f| f.values[*i].to_string().len())
                        .max()
                        .unwrap_or(1);
                    ('C', longest.clamp(1, DBF_MAX_CHAR_LEN) as u8, 0)
                }
            };
            DbfField {
                name,
                kind,
                length,
                decimals,
            }
        })
        .collect();

    let header_len = 32 + 32 * fields.len() + 1;
    let record_len = 1 + fields.iter().map(|f| f.length as usize).sum::<usize>();
    let record_count = u32::try_from(features.len())
        .map_err(|_| IngestError::write("too many features for a dbf file"))?;
    let (header_len, record_len) = match (u16::try_from(header_len), u16::try_from(record_len)) {
        (Ok(h), Ok(r)) => (h, r),
        _ => return Err(IngestError::write("dbf record layout is too wide")),
    };

    let today = chrono::Utc::now();
    let mut buf = Vec::with_capacity(header_len as usize + record_len as usize * features.len() + 1);
    buf.push(DBF_VERSION);
    buf.push((today.year() - 1900).clamp(0, 255) as u8);
    buf.push(today.month() as u8);
    buf.push(today.day() as u8);
    buf.extend_from_slice(&record_count.to_le_bytes());
    buf.extend_from_slice(&header_len.to_le_bytes());
    buf.extend_from_slice(&record_len.to_le_bytes());
    buf.extend_from_slice(&[0u8; 20]);

    for field in &fields {
        let mut name = [0u8; 11];
        name[..field.name.len()].copy_from_slice(field.name.as_bytes());
        buf.extend_from_slice(&name);
        buf.push(field.kind as u8);
        buf.extend_from_slice(&[0u8; 4]);
        buf.push(field.length);
        buf.push(field.decimals);
        buf.extend_from_slice(&[0u8; 14]);
    }
    buf.push(DBF_HEADER_END);

    for feature in features {
        buf.push(b' ');
        for (i, field) in columns.iter().zip(&fields) {
            let text = dbf_text(&feature.values[*i], field.kind);
            let text = truncate_bytes(&text, field.length as usize);
            let padding = field.length as usize - text.len();
            if field.kind == 'N' {
                buf.resize(buf.len() + padding, b' ');
                buf.extend_from_slice(text.as_bytes());
            } else {
                buf.extend_from_slice(text.as_bytes());
                buf.resize(buf.len() + padding, b' ');
            }
        }
    }
    buf.push(DBF_EOF);

    Ok(buf)
}

fn encode_fix(features: &[&Feature], offsets: &[u64]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.push(FIX_VERSION);
    buf.extend_from_slice(&(features.len() as u64).to_be_bytes());
    for (feature, offset) in features.iter().zip(offsets) {
        let len = u16::try_from(feature.fid.len())
            .map_err(|_| IngestError::write(format!("feature id too long: {}", feature.fid)))?;
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(feature.fid.as_bytes());
        buf.extend_from_slice(&offset.to_be_bytes());
    }
    Ok(buf)
}

fn corrupt(path: &Path, what: &str) -> IngestError {
    IngestError::IoError(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("{}: {}", path.display(), what),
    ))
}

fn read_u16_le(bytes: &[u8], at: usize) -> usize {
    u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize
}

/// Read the attribute table of a `.dbf` file. Values are trimmed.
pub fn read_dbf(path: impl AsRef<Path>) -> Result<DbfTable> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    if bytes.len() < 33 {
        return Err(corrupt(path, "truncated dbf header"));
    }

    let record_count =
        u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let header_len = read_u16_le(&bytes, 8);
    let record_len = read_u16_le(&bytes, 10);
    if bytes.len() < header_len + record_count * record_len {
        return Err(corrupt(path, "truncated dbf records"));
    }

    let mut fields = Vec::new();
    let mut at = 32;
    while at + 32 <= header_len && bytes[at] != DBF_HEADER_END {
        let raw_name = &bytes[at..at + 11];
        let name_len = raw_name.iter().position(|b| *b == 0).unwrap_or(11);
        fields.push(DbfField {
            name: String::from_utf8_lossy(&raw_name[..name_len]).into_owned(),
            kind: bytes[at + 11] as char,
            length: bytes[at + 16],
            decimals: bytes[at + 17],
        });
        at += 32;
    }

    let rows = (0..record_count)
        .map(|r| {
            let mut pos = header_len + r * record_len + 1;
            fields
                .iter()
                .map(|f| {
                    let cell = &bytes[pos..pos + f.length as usize];
                    pos += f.length as usize;
                    String::from_utf8_lossy(cell).trim().to_string()
                })
                .collect()
        })
        .collect();

    Ok(DbfTable { fields, rows })
}

/// Read the shapes of a point `.shp` file; null shapes come back as `None`.
pub fn read_points(path: impl AsRef<Path>) -> Result<Vec<Option<Point<f64>>>> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    if bytes.len() < SHP_HEADER_LEN {
        return Err(corrupt(path, "truncated shp header"));
    }

    let read_f64 = |at: usize| {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[at..at + 8]);
        f64::from_le_bytes(raw)
    };

    let mut points = Vec::new();
    let mut at = SHP_HEADER_LEN;
    while at + 12 <= bytes.len() {
        let words = i32::from_be_bytes([bytes[at + 4], bytes[at + 5], bytes[at + 6], bytes[at + 7]]);
        let content = at + 8;
        let next = content + (words.max(0) as usize) * 2;
        if next > bytes.len() {
            return Err(corrupt(path, "truncated shp record"));
        }
        let shape_type = i32::from_le_bytes([
            bytes[content],
            bytes[content + 1],
            bytes[content + 2],
            bytes[content + 3],
        ]);
        points.push(match shape_type {
            SHAPE_POINT if next >= content + 20 => {
                Some(Point::new(read_f64(content + 4), read_f64(content + 12)))
            }
            SHAPE_NULL => None,
            _ => return Err(corrupt(path, "unsupported shape type")),
        });
        at = next;
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::build_schema;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn schema() -> TypeSchema {
        build_schema(
            "obs",
            &["id", "name", "dtg", "lat", "lon"],
            &[
                TypeTag::Integer,
                TypeTag::String,
                TypeTag::Time,
                TypeTag::Double,
                TypeTag::Double,
            ],
        )
        .unwrap()
    }

    fn feature(id: i64, name: &str, lat: f64, lon: f64) -> Feature {
        Feature {
            fid: format!("obs.{}", id),
            values: vec![
                Value::Integer(id),
                Value::String(name.to_string()),
                Value::Time(chrono::Utc.with_ymd_and_hms(2014, 1, 2, 3, 4, 5).unwrap()),
                Value::Double(lat),
                Value::Double(lon),
            ],
            geometry: Some(Point::new(lon, lat)),
        }
    }

    #[test]
    fn test_commit_writes_full_artifact_set() {
        let dir = TempDir::new().unwrap();
        let mut store = ShapefileStore::new(dir.path(), "obs").with_composed_geometry(true);
        store.create_schema(&schema().spec()).unwrap();

        let mut tx = store.begin().unwrap();
        store
            .add_features(&mut tx, &[feature(1, "Alice", 42.0, -71.0), feature(2, "Bob", 10.0, 20.0)])
            .unwrap();
        store.commit(&mut tx).unwrap();
        store.release(tx);

        for sibling in store.artifacts().siblings() {
            assert!(sibling.exists(), "{:?} missing", sibling);
        }

        let points = read_points(store.artifacts().sibling("shp")).unwrap();
        assert_eq!(points, vec![Some(Point::new(-71.0, 42.0)), Some(Point::new(20.0, 10.0))]);

        let table = read_dbf(store.artifacts().sibling("dbf")).unwrap();
        let names: Vec<&str> = table.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "dtg", "lat", "lon"]);
        assert_eq!(table.column("id").unwrap(), vec!["1", "2"]);
        assert_eq!(table.column("name").unwrap(), vec!["Alice", "Bob"]);
        assert_eq!(table.column("dtg").unwrap(), vec!["20140102", "20140102"]);
        assert_eq!(table.column("lat").unwrap()[0].parse::<f64>().unwrap(), 42.0);

        let shx = fs::read(store.artifacts().sibling("shx")).unwrap();
        assert_eq!(shx.len(), 100 + 2 * 8);
    }

    #[test]
    fn test_rollback_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = ShapefileStore::new(dir.path(), "obs").with_composed_geometry(true);
        store.create_schema(&schema().spec()).unwrap();

        let mut tx = store.begin().unwrap();
        store.add_features(&mut tx, &[feature(1, "Alice", 1.0, 2.0)]).unwrap();
        store.rollback(&mut tx).unwrap();
        store.release(tx);

        assert!(!store.artifacts().sibling("shp").exists());
        assert_eq!(store.committed_len(), 0);
    }

    #[test]
    fn test_default_geometry_column_becomes_the_shape() {
        let dir = TempDir::new().unwrap();
        let mut store = ShapefileStore::new(dir.path(), "places");
        store
            .create_schema("name:String,*geom:Point:srid=4326,alt:Point:srid=4326")
            .unwrap();

        let mut tx = store.begin().unwrap();
        store
            .add_features(
                &mut tx,
                &[Feature {
                    fid: "places.1".into(),
                    values: vec![
                        Value::String("home".into()),
                        Value::Point(Point::new(1.0, 2.0)),
                        Value::Point(Point::new(3.0, 4.0)),
                    ],
                    geometry: None,
                }],
            )
            .unwrap();
        store.commit(&mut tx).unwrap();

        let points = read_points(store.artifacts().sibling("shp")).unwrap();
        assert_eq!(points, vec![Some(Point::new(1.0, 2.0))]);
        let table = read_dbf(store.artifacts().sibling("dbf")).unwrap();
        assert_eq!(table.fields.len(), 2);
        assert_eq!(table.column("alt").unwrap(), vec!["POINT (3 4)"]);
    }

    #[test]
    fn test_no_geometry_writes_null_shapes() {
        let dir = TempDir::new().unwrap();
        let mut store = ShapefileStore::new(dir.path(), "plain");
        store.create_schema("id:Integer").unwrap();
        let mut tx = store.begin().unwrap();
        store
            .add_features(
                &mut tx,
                &[Feature {
                    fid: "plain.1".into(),
                    values: vec![Value::Integer(7)],
                    geometry: None,
                }],
            )
            .unwrap();
        store.commit(&mut tx).unwrap();
        assert_eq!(read_points(store.artifacts().sibling("shp")).unwrap(), vec![None]);
    }

    #[test]
    fn test_long_field_names_are_truncated_and_unique() {
        let names = dbf_field_names(&["temperature_min", "temperature_max", "id"]);
        assert_eq!(names, vec!["temperatur", "temperatu1", "id"]);
    }

    #[test]
    fn test_composed_store_rejects_features_without_geometry() {
        let dir = TempDir::new().unwrap();
        let mut store = ShapefileStore::new(dir.path(), "obs").with_composed_geometry(true);
        store.create_schema(&schema().spec()).unwrap();
        let mut tx = store.begin().unwrap();
        let mut f = feature(1, "Alice", 1.0, 2.0);
        f.geometry = None;
        assert!(store.add_features(&mut tx, &[f]).is_err());
    }

    #[test]
    fn test_tiny_and_huge_doubles_survive_the_dbf() {
        let dir = TempDir::new().unwrap();
        let mut store = ShapefileStore::new(dir.path(), "tiny");
        store.create_schema("v:Double").unwrap();

        let values = [1.5e-20, -3.25e-300, 1.0e25, 0.1];
        let features: Vec<Feature> = values
            .iter()
            .enumerate()
            .map(|(i, v)| Feature {
                fid: format!("tiny.{}", i + 1),
                values: vec![Value::Double(*v)],
                geometry: None,
            })
            .collect();

        let mut tx = store.begin().unwrap();
        store.add_features(&mut tx, &features).unwrap();
        store.commit(&mut tx).unwrap();
        store.release(tx);

        let table = read_dbf(store.artifacts().sibling("dbf")).unwrap();
        let read: Vec<f64> = table
            .column("v")
            .unwrap()
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(read, values);
    }

    #[test]
    fn test_failed_swap_leaves_no_staged_files() {
        let dir = TempDir::new().unwrap();
        let mut store = ShapefileStore::new(dir.path(), "obs").with_composed_geometry(true);
        store.create_schema(&schema().spec()).unwrap();

        // a non-empty directory where the dbf should go blocks its rename
        let blocker = store.artifacts().sibling("dbf");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        let mut tx = store.begin().unwrap();
        store.add_features(&mut tx, &[feature(1, "Alice", 1.0, 2.0)]).unwrap();
        assert!(store.commit(&mut tx).is_err());
        store.release(tx);

        let leftovers: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "staged files left: {:?}", leftovers);
        assert_eq!(store.committed_len(), 0);
    }
}
