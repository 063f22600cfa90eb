//! Field schema and per-source parsing settings

use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::{CoreError, CoreResult};

/// Default column delimiter of station exports
pub const DEFAULT_DELIMITER: char = ';';

/// Token marking a field without a recorded value
pub const DEFAULT_SENTINEL: &str = "---";

/// Timestamp formats tried in order when no explicit format is configured.
/// The second entry covers older exports.
pub const DEFAULT_TIME_FORMATS: &[&str] = &["%d-%m-%Y %H:%M", "%d.%m.%Y %H:%M:%S"];

/// Name of the ordering field in the default schema
pub const TIME_KEY: &str = "Time";

/// Column layout of a station export, in file order
pub const DEFAULT_FIELD_NAMES: &[&str] = &[
    "No",
    "Time",
    "MeasureInterval",
    "HumidityInside",
    "TemperatureInside",
    "HumidityOutside",
    "TemperatureOutside",
    "PressureAbsolute",
    "WindSpeed",
    "WindGustSpeed",
    "WindDirection",
    "PressureRelative",
    "DewPoint",
    "WindChill",
    "RainfallHourly",
    "RainfallDaily",
    "RainfallWeekly",
    "RainfallMonthly",
    "RainfallTotal",
    "WindLevel",
    "WindGustLevel",
];

const TEXT_FIELDS: &[&str] = &["WindDirection"];
const INTEGER_FIELDS: &[&str] = &["No"];

/// Declared type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Timestamp,
}

impl ValueKind {
    /// Kind of a field by name; anything not listed is a float
    pub fn for_field(name: &str) -> Self {
        if name == TIME_KEY {
            ValueKind::Timestamp
        } else if TEXT_FIELDS.contains(&name) {
            ValueKind::Text
        } else if INTEGER_FIELDS.contains(&name) {
            ValueKind::Integer
        } else {
            ValueKind::Float
        }
    }
}

/// One named, typed column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: ValueKind,
}

/// Ordered field layout shared by all records of a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    time_index: usize,
}

impl Schema {
    /// Build a schema from field names, resolving each kind once.
    ///
    /// Exactly one field must carry the timestamp kind.
    pub fn from_names<I, S>(names: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<FieldSpec> = names
            .into_iter()
            .map(|n| {
                let name = n.as_ref().to_string();
                let kind = ValueKind::for_field(&name);
                FieldSpec { name, kind }
            })
            .collect();
        Self::new(fields)
    }

    /// Build a schema from explicit field specs
    pub fn new(fields: Vec<FieldSpec>) -> CoreResult<Self> {
        let mut time_fields = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind == ValueKind::Timestamp)
            .map(|(i, _)| i);

        let time_index = time_fields
            .next()
            .ok_or_else(|| CoreError::Format("schema has no timestamp field".into()))?;
        if time_fields.next().is_some() {
            return Err(CoreError::Format(
                "schema declares more than one timestamp field".into(),
            ));
        }

        Ok(Self { fields, time_index })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field, or `CoreError::Key`
    pub fn index_of(&self, key: &str) -> CoreResult<usize> {
        self.fields
            .iter()
            .position(|f| f.name == key)
            .ok_or_else(|| CoreError::Key(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.name == key)
    }

    pub fn time_index(&self) -> usize {
        self.time_index
    }

    pub fn time_key(&self) -> &str {
        &self.fields[self.time_index].name
    }
}

impl Default for Schema {
    fn default() -> Self {
        let fields = DEFAULT_FIELD_NAMES
            .iter()
            .map(|name| FieldSpec {
                name: (*name).to_string(),
                kind: ValueKind::for_field(name),
            })
            .collect();
        Self {
            fields,
            time_index: 1,
        }
    }
}

/// A strftime-style timestamp format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormat(String);

impl TimeFormat {
    pub fn new(format: impl Into<String>) -> Self {
        Self(format.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(&self, token: &str) -> CoreResult<NaiveDateTime> {
        NaiveDateTime::parse_from_str(token, &self.0).map_err(|e| {
            CoreError::Format(format!(
                "timestamp '{}' does not match format '{}': {}",
                token, self.0, e
            ))
        })
    }

    pub fn format(&self, time: &NaiveDateTime) -> String {
        time.format(&self.0).to_string()
    }

    /// Pick the first candidate that parses `token`. No guessing beyond
    /// the candidate list.
    pub fn resolve<S: AsRef<str>>(token: &str, candidates: &[S]) -> CoreResult<Self> {
        candidates
            .iter()
            .map(|c| Self::new(c.as_ref()))
            .find(|f| f.parse(token).is_ok())
            .ok_or_else(|| {
                CoreError::Format(format!(
                    "no known time format matches '{}' (tried {})",
                    token,
                    candidates
                        .iter()
                        .map(|c| c.as_ref())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

/// Everything needed to parse and re-serialize lines of one source file
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFormat {
    pub schema: Arc<Schema>,
    pub delimiter: char,
    pub sentinel: String,
    pub time_format: TimeFormat,
}

impl RecordFormat {
    pub fn new(schema: Arc<Schema>, time_format: TimeFormat) -> Self {
        Self {
            schema,
            delimiter: DEFAULT_DELIMITER,
            sentinel: DEFAULT_SENTINEL.to_string(),
            time_format,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }
}

impl Default for RecordFormat {
    fn default() -> Self {
        Self::new(
            Arc::new(Schema::default()),
            TimeFormat::new(DEFAULT_TIME_FORMATS[0]),
        )
    }
}
