use chrono::{DateTime, Utc};
use geo_types::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Inferred semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Integer,
    Double,
    Time,
    Point,
    String,
}

impl TypeTag {
    /// Guessing order. `String` is last and always matches.
    pub const PRIORITY: [TypeTag; 5] = [
        TypeTag::Integer,
        TypeTag::Double,
        TypeTag::Time,
        TypeTag::Point,
        TypeTag::String,
    ];

    /// Name used in schema spec strings.
    pub fn spec_name(&self) -> &'static str {
        match self {
            TypeTag::Integer => "Integer",
            TypeTag::Double => "Double",
            TypeTag::Time => "Date",
            TypeTag::Point => "Point",
            TypeTag::String => "String",
        }
    }

    pub fn from_spec_name(name: &str) -> Option<TypeTag> {
        match name.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" | "long" => Some(TypeTag::Integer),
            "double" | "float" => Some(TypeTag::Double),
            "date" | "timestamp" => Some(TypeTag::Time),
            "point" | "geometry" => Some(TypeTag::Point),
            "string" | "text" => Some(TypeTag::String),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Double(f64),
    Time(DateTime<Utc>),
    Point(Point<f64>),
    String(String),
}

impl Value {
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Integer(_) => TypeTag::Integer,
            Value::Double(_) => TypeTag::Double,
            Value::Time(_) => TypeTag::Time,
            Value::Point(_) => TypeTag::Point,
            Value::String(_) => TypeTag::String,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<Point<f64>> {
        match self {
            Value::Point(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Time(t) => write!(f, "{}", t.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
            Value::Point(p) => write!(f, "POINT ({} {})", p.x(), p.y()),
            Value::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub tag: TypeTag,
}

/// Column layout of one ingest run. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    name: String,
    columns: Vec<Column>,
    default_temporal: Option<usize>,
    default_geometry: Option<usize>,
}

impl TypeSchema {
    pub(crate) fn from_parts(
        name: String,
        columns: Vec<Column>,
        default_temporal: Option<usize>,
        default_geometry: Option<usize>,
    ) -> Self {
        Self {
            name,
            columns,
            default_temporal,
            default_geometry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == field)
    }

    pub fn column(&self, field: &str) -> Option<&Column> {
        self.index_of(field).map(|i| &self.columns[i])
    }

    pub fn default_temporal_index(&self) -> Option<usize> {
        self.default_temporal
    }

    pub fn default_geometry_index(&self) -> Option<usize> {
        self.default_geometry
    }

    pub fn default_temporal_field(&self) -> Option<&str> {
        self.default_temporal.map(|i| self.columns[i].name.as_str())
    }

    pub fn default_geometry_field(&self) -> Option<&str> {
        self.default_geometry.map(|i| self.columns[i].name.as_str())
    }
}

/// A parsed row, values aligned with [`TypeSchema::columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub fid: String,
    pub values: Vec<Value>,
    /// Only set when lat/lon composition is configured.
    pub geometry: Option<Point<f64>>,
}

impl Feature {
    pub fn value(&self, schema: &TypeSchema, field: &str) -> Option<&Value> {
        schema.index_of(field).and_then(|i| self.values.get(i))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn as_slice(&self) -> &[Feature] {
        &self.features
    }
}

/// A row dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscardedRow {
    pub line: u64,
    pub raw: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub features: FeatureCollection,
    pub discarded: Vec<DiscardedRow>,
}

/// Delimited-text layout of the input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowFormat {
    pub delimiter: char,
    pub quote: char,
    /// `None` accepts `\n`, `\r` and `\r\n`.
    pub record_separator: Option<char>,
    pub has_header: bool,
    pub trim: bool,
}

impl Default for RowFormat {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            record_separator: None,
            has_header: true,
            trim: false,
        }
    }
}

/// Primary output file plus the siblings sharing its base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    primary: PathBuf,
}

impl ArtifactSet {
    pub const SIBLING_EXTENSIONS: [&'static str; 5] = ["dbf", "fix", "prj", "shp", "shx"];
    pub const ARCHIVE_EXTENSION: &'static str = "zip";

    pub fn new(primary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
        }
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn sibling(&self, extension: &str) -> PathBuf {
        self.primary.with_extension(extension)
    }

    pub fn siblings(&self) -> impl Iterator<Item = PathBuf> + '_ {
        Self::SIBLING_EXTENSIONS.iter().map(|ext| self.sibling(ext))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.sibling(Self::ARCHIVE_EXTENSION)
    }
}

/// Result of a complete ingest run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub archive_path: PathBuf,
    pub schema_spec: String,
    pub ingested: usize,
    pub discarded: Vec<DiscardedRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_set_paths() {
        let artifacts = ArtifactSet::new("/tmp/out/foo.shp");
        let names: Vec<String> = artifacts
            .siblings()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["foo.dbf", "foo.fix", "foo.prj", "foo.shp", "foo.shx"]);
        assert_eq!(artifacts.archive_path(), PathBuf::from("/tmp/out/foo.zip"));
    }

    #[test]
    fn test_type_tag_spec_names() {
        for tag in TypeTag::PRIORITY {
            assert_eq!(TypeTag::from_spec_name(tag.spec_name()), Some(tag));
        }
        assert_eq!(TypeTag::from_spec_name("Long"), Some(TypeTag::Integer));
        assert_eq!(TypeTag::from_spec_name("Polygon"), None);
    }

    #[test]
    fn test_point_value_renders_as_wkt() {
        let value = Value::Point(Point::new(-71.0, 42.5));
        assert_eq!(value.to_string(), "POINT (-71 42.5)");
    }
}
