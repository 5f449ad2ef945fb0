use crate::domain::model::{Column, TypeSchema, TypeTag};
use crate::utils::error::{IngestError, Result};
use std::collections::HashSet;

const POINT_SRID: &str = "srid=4326";
const DEFAULT_MARKER: &str = "default=true";
const GEOMETRY_MARKER: char = '*';

/// Build the schema of a run from the header names and the sample row's tags.
///
/// The first `Time` column becomes the default temporal attribute and the
/// first `Point` column the default geometry; later points are secondary.
pub fn build_schema<S: AsRef<str>>(
    name: &str,
    field_names: &[S],
    tags: &[TypeTag],
) -> Result<TypeSchema> {
    if field_names.len() != tags.len() {
        return Err(IngestError::config(format!(
            "{} field names but {} inferred types",
            field_names.len(),
            tags.len()
        )));
    }

    let columns = field_names
        .iter()
        .zip(tags)
        .map(|(field, tag)| Column {
            name: field.as_ref().trim().to_string(),
            tag: *tag,
        })
        .collect::<Vec<_>>();

    assemble(name, columns, None, None)
}

/// Fold the columns into a schema, honouring explicit default positions.
fn assemble(
    name: &str,
    columns: Vec<Column>,
    explicit_temporal: Option<usize>,
    explicit_geometry: Option<usize>,
) -> Result<TypeSchema> {
    if columns.is_empty() {
        return Err(IngestError::config("schema has no columns"));
    }

    let (default_temporal, default_geometry) = {
        let mut seen = HashSet::new();
        columns.iter().enumerate().try_fold(
            (explicit_temporal, explicit_geometry),
            |(temporal, geometry), (i, column)| {
                validate_field_name(&column.name)?;
                if !seen.insert(column.name.as_str()) {
                    return Err(IngestError::config(format!(
                        "duplicate field name '{}'",
                        column.name
                    )));
                }
                Ok(match column.tag {
                    TypeTag::Time => (temporal.or(Some(i)), geometry),
                    TypeTag::Point => (temporal, geometry.or(Some(i))),
                    _ => (temporal, geometry),
                })
            },
        )?
    };

    Ok(TypeSchema::from_parts(
        name.to_string(),
        columns,
        default_temporal,
        default_geometry,
    ))
}

fn validate_field_name(field: &str) -> Result<()> {
    if field.is_empty() {
        return Err(IngestError::config("empty field name"));
    }
    if field.contains([':', ',', ';', GEOMETRY_MARKER]) {
        return Err(IngestError::config(format!(
            "field name '{}' contains a reserved character",
            field
        )));
    }
    Ok(())
}

impl TypeSchema {
    /// Render the `name:Type` spec string consumed by feature stores.
    pub fn spec(&self) -> String {
        self.columns()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let mut token = String::new();
                if self.default_geometry_index() == Some(i) {
                    token.push(GEOMETRY_MARKER);
                }
                token.push_str(&column.name);
                token.push(':');
                token.push_str(column.tag.spec_name());
                if column.tag == TypeTag::Point {
                    token.push(':');
                    token.push_str(POINT_SRID);
                }
                if self.default_temporal_index() == Some(i) {
                    token.push(':');
                    token.push_str(DEFAULT_MARKER);
                }
                token
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse an explicit spec string, e.g. `id:Integer,dtg:Date,*geom:Point:srid=4326`.
    pub fn from_spec(name: &str, spec: &str) -> Result<TypeSchema> {
        let mut columns = Vec::new();
        let mut explicit_temporal = None;
        let mut explicit_geometry = None;

        for (i, token) in spec.split(',').map(str::trim).enumerate() {
            if token.is_empty() {
                return Err(IngestError::config(format!(
                    "empty attribute at position {} in spec '{}'",
                    i, spec
                )));
            }

            let (is_default_geometry, token) = match token.strip_prefix(GEOMETRY_MARKER) {
                Some(rest) => (true, rest),
                None => (false, token),
            };

            let mut parts = token.split(':').map(str::trim);
            let field = parts.next().unwrap_or_default();
            let type_name = parts.next().ok_or_else(|| {
                IngestError::config(format!("attribute '{}' has no type", token))
            })?;
            let tag = TypeTag::from_spec_name(type_name).ok_or_else(|| {
                IngestError::config(format!(
                    "unknown type '{}' for attribute '{}'",
                    type_name, field
                ))
            })?;

            for option in parts {
                match option {
                    DEFAULT_MARKER if tag == TypeTag::Time => {
                        if explicit_temporal.replace(i).is_some() {
                            return Err(IngestError::config(
                                "more than one default temporal attribute",
                            ));
                        }
                    }
                    POINT_SRID if tag == TypeTag::Point => {}
                    other => {
                        return Err(IngestError::config(format!(
                            "unsupported option '{}' on attribute '{}'",
                            other, field
                        )))
                    }
                }
            }

            if is_default_geometry {
                if tag != TypeTag::Point {
                    return Err(IngestError::config(format!(
                        "default geometry '{}' must be a Point",
                        field
                    )));
                }
                if explicit_geometry.replace(i).is_some() {
                    return Err(IngestError::config("more than one default geometry"));
                }
            }

            columns.push(Column {
                name: field.to_string(),
                tag,
            });
        }

        assemble(name, columns, explicit_temporal, explicit_geometry)
    }
}
