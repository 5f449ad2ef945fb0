use crate::domain::model::{TypeTag, Value};
use crate::utils::error::{IngestError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use geo_types::Point;
use regex::Regex;
use std::sync::LazyLock;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// One parsing strategy: try to read a raw cell as a given type.
pub trait ValueParser: Send + Sync {
    fn tag(&self) -> TypeTag;
    fn parse(&self, raw: &str) -> Option<Value>;
}

struct IntegerParser;
struct DoubleParser;
struct TimeParser;
struct PointParser;
struct StringParser;

impl ValueParser for IntegerParser {
    fn tag(&self) -> TypeTag {
        TypeTag::Integer
    }

    fn parse(&self, raw: &str) -> Option<Value> {
        raw.trim().parse::<i64>().ok().map(Value::Integer)
    }
}

impl ValueParser for DoubleParser {
    fn tag(&self) -> TypeTag {
        TypeTag::Double
    }

    fn parse(&self, raw: &str) -> Option<Value> {
        parse_finite(raw).map(Value::Double)
    }
}

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

impl ValueParser for TimeParser {
    fn tag(&self) -> TypeTag {
        TypeTag::Time
    }

    fn parse(&self, raw: &str) -> Option<Value> {
        let s = raw.trim();
        if let Ok(t) = DateTime::parse_from_rfc3339(s) {
            return Some(Value::Time(t.with_timezone(&Utc)));
        }
        // 沒有時區的時間一律當作 UTC
        for format in NAIVE_DATETIME_FORMATS {
            if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
                return Some(Value::Time(t.and_utc()));
            }
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| Value::Time(t.and_utc()))
    }
}

static WKT_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*POINT\s*\(\s*(\S+)\s+(\S+)\s*\)\s*$").expect("valid WKT point regex")
});

impl ValueParser for PointParser {
    fn tag(&self) -> TypeTag {
        TypeTag::Point
    }

    fn parse(&self, raw: &str) -> Option<Value> {
        let caps = WKT_POINT.captures(raw)?;
        let x = parse_finite(&caps[1])?;
        let y = parse_finite(&caps[2])?;
        Some(Value::Point(Point::new(x, y)))
    }
}

impl ValueParser for StringParser {
    fn tag(&self) -> TypeTag {
        TypeTag::String
    }

    fn parse(&self, raw: &str) -> Option<Value> {
        Some(Value::String(raw.to_string()))
    }
}

/// Strategies in guessing priority order.
static PARSERS: [&dyn ValueParser; 5] = [
    &IntegerParser,
    &DoubleParser,
    &TimeParser,
    &PointParser,
    &StringParser,
];

// `f64::from_str` accepts "nan" and "inf"; those stay strings here.
fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parser_for(tag: TypeTag) -> &'static dyn ValueParser {
    match tag {
        TypeTag::Integer => PARSERS[0],
        TypeTag::Double => PARSERS[1],
        TypeTag::Time => PARSERS[2],
        TypeTag::Point => PARSERS[3],
        TypeTag::String => PARSERS[4],
    }
}

/// Parse a raw cell against an already declared type.
pub fn parse_as(tag: TypeTag, raw: &str) -> Option<Value> {
    parser_for(tag).parse(raw)
}

/// First strategy that accepts `raw`, in priority order.
pub fn guess(raw: &str) -> Result<(Value, TypeTag)> {
    PARSERS
        .iter()
        .find_map(|parser| parser.parse(raw).map(|value| (value, parser.tag())))
        .ok_or_else(|| IngestError::TypeInferenceError {
            value: raw.to_string(),
        })
}

pub fn guess_row<S: AsRef<str>>(values: &[S]) -> Result<Vec<TypeTag>> {
    values
        .iter()
        .map(|v| guess(v.as_ref()).map(|(_, tag)| tag))
        .collect()
}

/// Runs [`guess_row`] on the given runtime instead of an ambient pool.
pub fn guess_row_task(handle: &Handle, values: Vec<String>) -> JoinHandle<Result<Vec<TypeTag>>> {
    handle.spawn_blocking(move || guess_row(&values))
}
