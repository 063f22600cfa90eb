//! Unit detection from export headers and conversion to standard units

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::record::{FieldValue, Record};
use crate::CoreResult;

/// Scalar conversion between two units
pub type Conversion = fn(f64) -> f64;

fn identity(value: f64) -> f64 {
    value
}

fn kmh_to_ms(value: f64) -> f64 {
    value / 3.6
}

fn ms_to_kmh(value: f64) -> f64 {
    value * 3.6
}

fn mm_to_m(value: f64) -> f64 {
    value / 1000.0
}

fn m_to_mm(value: f64) -> f64 {
    value * 1000.0
}

fn is_pressure_alias(unit: &str) -> bool {
    unit.eq_ignore_ascii_case("hpa")
}

/// Conversion function for a unit pair, `None` if the pair is unknown
pub fn lookup_conversion(from: &str, to: &str) -> Option<Conversion> {
    if from == to || (is_pressure_alias(from) && is_pressure_alias(to)) {
        return Some(identity);
    }

    match (from, to) {
        ("km/h", "m/s") => Some(kmh_to_ms),
        ("m/s", "km/h") => Some(ms_to_kmh),
        ("mm", "m") => Some(mm_to_m),
        ("m", "mm") => Some(m_to_mm),
        _ => None,
    }
}

/// Convert a single value; unknown pairs return the value unchanged
pub fn convert(value: f64, from: &str, to: &str) -> f64 {
    lookup_conversion(from, to).unwrap_or(identity)(value)
}

/// Unit text inside the trailing parentheses of a header column
pub fn header_unit(column: &str) -> Option<&str> {
    let column = column.trim_end();
    let inner = column.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    Some(inner[open + 1..].trim())
}

/// Per-column source units, aligned with the schema by position
pub fn header_units(header: &str, delimiter: char) -> Vec<Option<String>> {
    header
        .split(delimiter)
        .map(|column| header_unit(column).map(str::to_string))
        .collect()
}

/// Target unit per field key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardUnits(HashMap<String, String>);

impl StandardUnits {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn with(mut self, key: impl Into<String>, unit: impl Into<String>) -> Self {
        self.0.insert(key.into(), unit.into());
        self
    }

    pub fn unit_for(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl Default for StandardUnits {
    /// Speeds in m/s, rainfall in mm, pressures in hPa
    fn default() -> Self {
        let mut units = Self::new();
        for key in ["WindSpeed", "WindGustSpeed"] {
            units = units.with(key, "m/s");
        }
        for key in [
            "RainfallHourly",
            "RainfallDaily",
            "RainfallWeekly",
            "RainfallMonthly",
            "RainfallTotal",
        ] {
            units = units.with(key, "mm");
        }
        for key in ["PressureAbsolute", "PressureRelative"] {
            units = units.with(key, "hPa");
        }
        units
    }
}

/// Rewrite record values into standard units using the units found in
/// the file's header. Unknown unit pairs are left as-is and reported.
pub fn normalize(
    records: &mut [Record],
    header: &str,
    delimiter: char,
    standard: &StandardUnits,
) -> CoreResult<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let schema = first.format().schema.clone();
    let source_units = header_units(header, delimiter);

    for (index, field) in schema.fields().iter().enumerate() {
        let Some(Some(from)) = source_units.get(index) else {
            continue;
        };
        let Some(to) = standard.unit_for(&field.name) else {
            continue;
        };

        let conversion = match lookup_conversion(from, to) {
            Some(c) => c,
            None => {
                warn!(
                    field = %field.name,
                    from = %from,
                    to = %to,
                    "No conversion for unit pair, values kept unchanged"
                );
                continue;
            }
        };
        if from == to {
            continue;
        }

        debug!(field = %field.name, from = %from, to = %to, "Converting column");
        for record in records.iter_mut() {
            record.update(index, |value| match value.as_f64() {
                Some(v) => FieldValue::Float(conversion(v)),
                None => value.clone(),
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordFormat;
    use std::sync::Arc;

    const HEADER: &str = "No;Zeit;Intervall(mi);innen Luftfeuchtigkeit(%);innen Temperatur(°C);außen Luftfeuchtigkeit(%);außen Temperatur(°C);absolut Luftdruck(Hpa);Wind(km/h);Windbö(km/h);Richtung;relative Luftdruck(Hpa);Taupunkt(°C);Windauskühlung(°C);Stunde Niederschlag(mm);24 Stunde Niederschlag(mm);Woche Niederschlag(mm);Monat Niederschlag(mm);Total Niederschlag(mm);Wind Level(bft);Windbö Level(bft)";

    #[test]
    fn test_header_unit_extraction() {
        assert_eq!(header_unit("Wind(km/h)"), Some("km/h"));
        assert_eq!(header_unit("absolut Luftdruck(Hpa) "), Some("Hpa"));
        assert_eq!(header_unit("Richtung"), None);
        assert_eq!(header_unit("Zeit"), None);

        let units = header_units(HEADER, ';');
        assert_eq!(units.len(), 21);
        assert_eq!(units[8].as_deref(), Some("km/h"));
        assert_eq!(units[10], None);
    }

    #[test]
    fn test_conversion_roundtrips() {
        for (a, b) in [("km/h", "m/s"), ("mm", "m")] {
            for x in [0.0, 1.0, 10.0, 123.456, -7.5] {
                let back = convert(convert(x, a, b), b, a);
                assert!((back - x).abs() < 1e-9, "{a}->{b}->{a}: {x} became {back}");
            }
        }
    }

    #[test]
    fn test_pressure_alias_is_identity() {
        assert!(lookup_conversion("Hpa", "hPa").is_some());
        assert_eq!(convert(1013.5, "Hpa", "hPa"), 1013.5);
    }

    #[test]
    fn test_unknown_pair_falls_back_to_identity() {
        assert!(lookup_conversion("mph", "m/s").is_none());
        assert_eq!(convert(5.0, "mph", "m/s"), 5.0);
    }

    #[test]
    fn test_normalize_wind_speed() {
        let format = Arc::new(RecordFormat::default());
        let line = "1;11-03-2019 11:31;63;46;19.1;98;1.1;987.5;10.0;---;NW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;0.0;2;2";
        let mut records = vec![Record::parse(line, &format).unwrap()];

        normalize(&mut records, HEADER, ';', &StandardUnits::default()).unwrap();

        let wind = records[0].get("WindSpeed").unwrap().as_f64().unwrap();
        assert!((wind - 10.0 / 3.6).abs() < 1e-12);
        assert!((wind - 2.78).abs() < 0.01);
        assert!(records[0].get("WindGustSpeed").unwrap().is_missing());
        assert_eq!(
            records[0].get("PressureAbsolute").unwrap().as_f64(),
            Some(987.5)
        );
        assert_eq!(
            records[0].get("TemperatureOutside").unwrap().as_f64(),
            Some(1.1)
        );
    }
}
