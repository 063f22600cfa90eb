//! Display labels for field keys

/// Prefix that marks a fitted trend series next to its source column
pub const TREND_LABEL_PREFIX: &str = "Trend: ";

const LABELS: &[(&str, &str)] = &[
    ("No", "Nummer"),
    ("Time", "Zeit"),
    ("MeasureInterval", "Messintervall"),
    ("HumidityInside", "Luftfeuchtigkeit innen"),
    ("TemperatureInside", "Temperatur innen"),
    ("HumidityOutside", "Luftfeuchtigkeit aussen"),
    ("TemperatureOutside", "Temperatur aussen"),
    ("PressureAbsolute", "Absoluter Luftdruck"),
    ("WindSpeed", "Windgeschwindigkeit"),
    ("WindGustSpeed", "Windböengeschwindigkeit"),
    ("WindDirection", "Windrichtung"),
    ("PressureRelative", "Relativer Luftdruck"),
    ("DewPoint", "Taupunkt"),
    ("WindChill", "Windauskühlung"),
    ("RainfallHourly", "Stündlicher Regenfall"),
    ("RainfallDaily", "Täglicher Regenfall"),
    ("RainfallWeekly", "Wöchentlicher Regenfall"),
    ("RainfallMonthly", "Monatlicher Regenfall"),
    ("RainfallTotal", "Gesamter Regenfall"),
    ("WindLevel", "Windlevel"),
    ("WindGustLevel", "Windböenlevel"),
];

/// How a projected column should be labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelStyle {
    #[default]
    Plain,
    Trend,
}

/// Label for a key; keys without a label pass through
pub fn label_for(key: &str) -> &str {
    LABELS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, label)| *label)
        .unwrap_or(key)
}

pub fn styled_label(key: &str, style: LabelStyle) -> String {
    match style {
        LabelStyle::Plain => label_for(key).to_string(),
        LabelStyle::Trend => format!("{}{}", TREND_LABEL_PREFIX, label_for(key)),
    }
}

/// Reverse lookup. The trend prefix is stripped first; unknown labels
/// pass through unchanged.
pub fn key_for(label: &str) -> &str {
    let bare = label.strip_prefix(TREND_LABEL_PREFIX).unwrap_or(label);
    LABELS
        .iter()
        .find(|(_, l)| *l == bare)
        .map(|(key, _)| *key)
        .unwrap_or(label)
}

pub fn labels_for<S: AsRef<str>>(keys: &[S], style: LabelStyle) -> Vec<String> {
    keys.iter().map(|k| styled_label(k.as_ref(), style)).collect()
}

pub fn keys_for<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    labels.iter().map(|l| key_for(l.as_ref()).to_string()).collect()
}

/// Axis title for several series: labels joined with '/'
pub fn axis_title<S: AsRef<str>>(labels: &[S]) -> Option<String> {
    if labels.is_empty() {
        return None;
    }
    Some(
        labels
            .iter()
            .map(|l| l.as_ref())
            .collect::<Vec<_>>()
            .join("/"),
    )
}
