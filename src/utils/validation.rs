use crate::utils::error::{IngestError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(IngestError::config(format!(
            "{}: path cannot be empty",
            field_name
        )));
    }

    if path.contains('\0') {
        return Err(IngestError::config(format!(
            "{}: path contains null bytes",
            field_name
        )));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(IngestError::config(format!(
            "{}: value {} must be at least {}",
            field_name, value, min_value
        )));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(IngestError::config(format!(
            "{}: value cannot be empty or whitespace-only",
            field_name
        )));
    }
    Ok(())
}

/// csv 只接受單一 byte 的分隔符號
pub fn validate_single_byte_char(field_name: &str, value: char) -> Result<u8> {
    if value.is_ascii() {
        Ok(value as u8)
    } else {
        Err(IngestError::config(format!(
            "{}: '{}' is not a single-byte ASCII character",
            field_name, value
        )))
    }
}

/// lat/lon 必須同時提供且不可相同
pub fn validate_lat_lon(lat: Option<&str>, lon: Option<&str>) -> Result<Option<(String, String)>> {
    match (lat, lon) {
        (None, None) => Ok(None),
        (Some(lat), Some(lon)) => {
            validate_non_empty_string("lat_field", lat)?;
            validate_non_empty_string("lon_field", lon)?;
            if lat == lon {
                return Err(IngestError::config(format!(
                    "lat_field and lon_field must differ, both are '{}'",
                    lat
                )));
            }
            Ok(Some((lat.to_string(), lon.to_string())))
        }
        _ => Err(IngestError::config(
            "lat_field and lon_field must be given together",
        )),
    }
}
