//! Parsed station lines

use chrono::NaiveDateTime;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::schema::{FieldSpec, RecordFormat, Schema, TimeFormat, ValueKind};
use crate::{CoreError, CoreResult};

/// A single typed field value
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    /// Sentinel in the source; never coerced to zero
    Missing,
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    fn parse(token: &str, field: &FieldSpec, format: &RecordFormat) -> CoreResult<Self> {
        if token == format.sentinel {
            return Ok(FieldValue::Missing);
        }

        let invalid = |e: &dyn std::fmt::Display| {
            CoreError::Format(format!(
                "field '{}': cannot parse '{}': {}",
                field.name, token, e
            ))
        };

        match field.kind {
            ValueKind::Text => Ok(FieldValue::Text(token.to_string())),
            ValueKind::Integer => token
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|e| invalid(&e)),
            ValueKind::Float => token
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|e| invalid(&e)),
            ValueKind::Timestamp => format
                .time_format
                .parse(token.trim())
                .map(FieldValue::Timestamp),
        }
    }

    fn write(&self, format: &RecordFormat, time_format: &TimeFormat, out: &mut String) {
        match self {
            FieldValue::Text(v) => out.push_str(v),
            FieldValue::Integer(v) => out.push_str(&v.to_string()),
            // Debug keeps a trailing ".0" and round-trips exactly
            FieldValue::Float(v) => out.push_str(&format!("{:?}", v)),
            FieldValue::Timestamp(t) => out.push_str(&time_format.format(t)),
            FieldValue::Missing => out.push_str(&format.sentinel),
        }
    }

    /// Equality that treats two NaN floats with the same bits as equal
    fn same_as(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Float(a), FieldValue::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

/// One measurement line with one value per schema field.
///
/// Records carry no ordering traits of their own; order them with
/// [`by_time`] and search them with [`time_cmp`].
#[derive(Debug, Clone)]
pub struct Record {
    format: Arc<RecordFormat>,
    time: NaiveDateTime,
    values: Vec<FieldValue>,
}

impl Record {
    /// Parse one delimited line.
    ///
    /// Lines shorter than the schema get `Missing` for the trailing fields;
    /// surplus tokens are ignored.
    pub fn parse(line: &str, format: &Arc<RecordFormat>) -> CoreResult<Self> {
        let schema = &format.schema;
        let mut tokens = line.split(format.delimiter);

        let values = schema
            .fields()
            .iter()
            .map(|field| match tokens.next() {
                Some(token) => FieldValue::parse(token, field, format),
                None => Ok(FieldValue::Missing),
            })
            .collect::<CoreResult<Vec<_>>>()?;

        let time = values[schema.time_index()].as_time().ok_or_else(|| {
            CoreError::Format(format!("line has no '{}' value: {}", schema.time_key(), line))
        })?;

        Ok(Self {
            format: Arc::clone(format),
            time,
            values,
        })
    }

    /// Ordering key
    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    pub fn format(&self) -> &Arc<RecordFormat> {
        &self.format
    }

    pub fn schema(&self) -> &Schema {
        &self.format.schema
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn get(&self, key: &str) -> CoreResult<&FieldValue> {
        let index = self.schema().index_of(key)?;
        Ok(&self.values[index])
    }

    /// Replace a single non-key field
    pub fn set(&mut self, key: &str, value: FieldValue) -> CoreResult<()> {
        let index = self.schema().index_of(key)?;
        if index == self.schema().time_index() {
            return Err(CoreError::Format(format!(
                "'{}' is the ordering key and cannot be replaced",
                key
            )));
        }
        self.values[index] = value;
        Ok(())
    }

    /// Apply `f` to a single non-key field in place
    pub fn update<F>(&mut self, index: usize, f: F) -> CoreResult<()>
    where
        F: FnOnce(&FieldValue) -> FieldValue,
    {
        let schema = self.schema();
        if index >= self.values.len() {
            return Err(CoreError::Key(format!("field index {}", index)));
        }
        if index == schema.time_index() {
            return Err(CoreError::Format(format!(
                "'{}' is the ordering key and cannot be replaced",
                schema.time_key()
            )));
        }
        self.values[index] = f(&self.values[index]);
        Ok(())
    }

    /// Delimited line that parses back into an identical record
    pub fn serialize(&self) -> String {
        self.serialize_with(&self.format.time_format)
    }

    /// Like [`Record::serialize`], but writes the timestamp in `time_format`
    pub fn serialize_with(&self, time_format: &TimeFormat) -> String {
        let mut out = String::with_capacity(self.values.len() * 6);
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                out.push(self.format.delimiter);
            }
            value.write(&self.format, time_format, &mut out);
        }
        out
    }

    /// Field-for-field comparison, unlike [`by_time`]. NaN floats compare
    /// equal to themselves.
    pub fn same_fields(&self, other: &Record) -> bool {
        self.schema() == other.schema()
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.same_as(b))
    }
}

/// Order two records by timestamp only
pub fn by_time(a: &Record, b: &Record) -> Ordering {
    a.time.cmp(&b.time)
}

/// Order a record against a bare timestamp
pub fn time_cmp(record: &Record, time: &NaiveDateTime) -> Ordering {
    record.time.cmp(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DEFAULT_FIELD_NAMES;
    use chrono::NaiveDate;

    const SAMPLE: &str = "1;11-03-2019 11:31;63;46;19.1;98;1.1;987.5;2.0;3.1;NW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;0.0;2;2";

    fn default_format() -> Arc<RecordFormat> {
        Arc::new(RecordFormat::default())
    }

    #[test]
    fn test_parse_typed_fields() {
        let record = Record::parse(SAMPLE, &default_format()).unwrap();

        assert_eq!(record.get("No").unwrap(), &FieldValue::Integer(1));
        assert_eq!(
            record.time(),
            NaiveDate::from_ymd_opt(2019, 3, 11)
                .unwrap()
                .and_hms_opt(11, 31, 0)
                .unwrap()
        );
        assert_eq!(
            record.get("WindDirection").unwrap(),
            &FieldValue::Text("NW".into())
        );
        assert_eq!(
            record.get("TemperatureOutside").unwrap().as_f64(),
            Some(1.1)
        );
        assert_eq!(record.get("WindGustLevel").unwrap().as_f64(), Some(2.0));
    }

    #[test]
    fn test_sentinel_is_missing_for_every_kind() {
        let line = "---;11-03-2019 11:31;---;46;---;98;1.1;987.5;2.0;3.1;---;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;0.0;2;2";
        let record = Record::parse(line, &default_format()).unwrap();

        assert!(record.get("No").unwrap().is_missing());
        assert!(record.get("MeasureInterval").unwrap().is_missing());
        assert!(record.get("TemperatureInside").unwrap().is_missing());
        assert!(record.get("WindDirection").unwrap().is_missing());
    }

    #[test]
    fn test_short_line_pads_missing() {
        let line = "7;11-03-2019 11:31;63;46;19.1;98;1.1;987.5;2.0;3.1;NW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;0.0";
        let record = Record::parse(line, &default_format()).unwrap();

        assert_eq!(record.values().len(), DEFAULT_FIELD_NAMES.len());
        assert!(record.get("WindLevel").unwrap().is_missing());
        assert!(record.get("WindGustLevel").unwrap().is_missing());
    }

    #[test]
    fn test_malformed_values_are_format_errors() {
        let format = default_format();
        let bad_float = SAMPLE.replace("19.1", "warm");
        assert!(matches!(
            Record::parse(&bad_float, &format),
            Err(CoreError::Format(_))
        ));

        let bad_time = SAMPLE.replace("11-03-2019 11:31", "2019/03/11");
        assert!(matches!(
            Record::parse(&bad_time, &format),
            Err(CoreError::Format(_))
        ));

        let missing_time = SAMPLE.replace("11-03-2019 11:31", "---");
        assert!(matches!(
            Record::parse(&missing_time, &format),
            Err(CoreError::Format(_))
        ));

        assert!(Record::parse("", &format).is_err());
    }

    #[test]
    fn test_get_unknown_key() {
        let record = Record::parse(SAMPLE, &default_format()).unwrap();
        assert_eq!(record.get("Sunshine"), Err(CoreError::Key("Sunshine".into())));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let format = default_format();
        let line = "12;01-01-2019 00:05;---;46;19.1;98;-3.25;987.5;2.7777777777777777;3.1;SSW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;1234.5;2;---";
        let record = Record::parse(line, &format).unwrap();
        let text = record.serialize();

        insta::assert_snapshot!(text, @"12;01-01-2019 00:05;---;46.0;19.1;98.0;-3.25;987.5;2.7777777777777777;3.1;SSW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;1234.5;2.0;---");

        let reparsed = Record::parse(&text, &format).unwrap();
        assert!(reparsed.same_fields(&record));
        assert_eq!(reparsed.serialize(), text);
    }

    #[test]
    fn test_roundtrip_with_legacy_format_and_custom_delimiter() {
        let schema = Arc::new(Schema::from_names(["No", "Time", "TemperatureOutside"]).unwrap());
        let format = Arc::new(
            RecordFormat::new(schema, TimeFormat::new("%d.%m.%Y %H:%M:%S"))
                .with_delimiter(',')
                .with_sentinel("n/a"),
        );
        let record = Record::parse("3,02.01.2019 10:00:30,n/a", &format).unwrap();
        assert!(record.get("TemperatureOutside").unwrap().is_missing());
        assert_eq!(record.serialize(), "3,02.01.2019 10:00:30,n/a");
    }

    #[test]
    fn test_set_preserves_other_fields() {
        let mut record = Record::parse(SAMPLE, &default_format()).unwrap();
        let before = record.clone();

        record.set("WindSpeed", FieldValue::Float(7.2)).unwrap();
        assert_eq!(record.get("WindSpeed").unwrap().as_f64(), Some(7.2));
        assert_eq!(record.get("WindGustSpeed"), before.get("WindGustSpeed"));
        assert_eq!(record.time(), before.time());

        assert!(record.set("Time", FieldValue::Missing).is_err());
        assert!(matches!(
            record.set("Sunshine", FieldValue::Missing),
            Err(CoreError::Key(_))
        ));
    }

    #[test]
    fn test_comparison_uses_time_only() {
        let format = default_format();
        let a = Record::parse(SAMPLE, &format).unwrap();
        let b = Record::parse(&SAMPLE.replace("19.1", "25.0"), &format).unwrap();
        let later = Record::parse(&SAMPLE.replace("11:31", "11:41"), &format).unwrap();

        assert_eq!(by_time(&a, &b), Ordering::Equal);
        assert!(!a.same_fields(&b));
        assert_eq!(by_time(&a, &later), Ordering::Less);
        assert_eq!(time_cmp(&later, &a.time()), Ordering::Greater);
    }

    #[test]
    fn test_update_rejects_time_and_out_of_range() {
        let mut record = Record::parse(SAMPLE, &default_format()).unwrap();
        let wind = record.schema().index_of("WindSpeed").unwrap();

        record
            .update(wind, |v| FieldValue::Float(v.as_f64().unwrap() * 2.0))
            .unwrap();
        assert_eq!(record.get("WindSpeed").unwrap().as_f64(), Some(4.0));

        let time_index = record.schema().time_index();
        assert!(matches!(
            record.update(time_index, |_| FieldValue::Missing),
            Err(CoreError::Format(_))
        ));
        assert!(matches!(
            record.update(99, |_| FieldValue::Missing),
            Err(CoreError::Key(_))
        ));
        assert!(record.get("Time").unwrap().as_time().is_some());
    }

    #[test]
    fn test_nan_token_roundtrips() {
        let format = default_format();
        let record = Record::parse(&SAMPLE.replace("19.1", "NaN"), &format).unwrap();
        let reparsed = Record::parse(&record.serialize(), &format).unwrap();

        assert!(reparsed.same_fields(&record));
        assert!(record.get("TemperatureInside").unwrap().as_f64().unwrap().is_nan());
    }

    #[test]
    fn test_serialize_with_other_time_format() {
        let record = Record::parse(SAMPLE, &default_format()).unwrap();
        let legacy = TimeFormat::new("%d.%m.%Y %H:%M:%S");
        let text = record.serialize_with(&legacy);

        assert!(text.starts_with("1;11.03.2019 11:31:00;63.0;"));
        assert_eq!(text.replace("11.03.2019 11:31:00", "11-03-2019 11:31"), record.serialize());
    }

    #[test]
    fn test_values_serialize_as_json() {
        let record = Record::parse(&SAMPLE.replace(";2;2", ";2;---"), &default_format()).unwrap();
        let json = serde_json::to_string(&record.values()[..3]).unwrap();
        assert_eq!(json, r#"[1,"2019-03-11T11:31:00",63.0]"#);

        assert_eq!(
            serde_json::to_value(record.get("WindGustLevel").unwrap()).unwrap(),
            serde_json::Value::Null
        );
        assert_eq!(
            serde_json::to_value(record.get("WindDirection").unwrap()).unwrap(),
            serde_json::json!("NW")
        );
    }
}
