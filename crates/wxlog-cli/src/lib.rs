use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use wxlog_archive::{default_window, Dataset, Projection};
use wxlog_config::AppConfig;
use wxlog_core::{
    label_for, styled_label, FieldValue, LabelStyle, StandardUnits, TrendError, ValueKind,
    DEFAULT_SENTINEL,
};
use wxlog_ingest::{DatasetBuilder, IngestOptions};

/// Formats accepted for `--from` / `--to` besides the display format
const TIME_ARG_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Ingest `directory` (or the configured one) into a fresh dataset
pub fn load_dataset(config: &AppConfig, directory: Option<&Path>) -> Result<(IngestOptions, Dataset)> {
    let options = config
        .ingest_options(directory)
        .context("Invalid source configuration")?;
    let dataset = DatasetBuilder::new(options.clone())
        .build()
        .with_context(|| format!("Failed to ingest {}", options.directory.display()))?;
    Ok((options, dataset))
}

/// Parse a command-line timestamp
pub fn parse_time_arg(value: &str, display_format: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    for format in std::iter::once(display_format).chain(TIME_ARG_FORMATS.iter().copied()) {
        if let Ok(t) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(t);
        }
    }
    if let Some(t) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(t);
    }
    bail!("Unrecognized time '{}'", value)
}

/// Window covering the whole dataset
pub fn full_window(dataset: &Dataset) -> (NaiveDateTime, NaiveDateTime) {
    match (dataset.earliest(), dataset.latest()) {
        // start is exclusive, so step back to include the first record
        (Some(first), Some(last)) => (first - Duration::seconds(1), last),
        _ => default_window(),
    }
}

pub fn write_labels<W: Write>(dataset: &Dataset, out: &mut W) -> Result<()> {
    for label in dataset.possible_labels() {
        writeln!(out, "{}", label)?;
    }
    Ok(())
}

pub fn write_range<W: Write>(dataset: &Dataset, display_format: &str, out: &mut W) -> Result<()> {
    match (dataset.earliest(), dataset.latest()) {
        (Some(first), Some(last)) => writeln!(
            out,
            "{} {}",
            first.format(display_format),
            last.format(display_format)
        )?,
        _ => writeln!(out, "no data")?,
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// Labels or keys, in output order
    pub columns: Vec<String>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub fit_degree: Option<usize>,
    pub json: bool,
}

/// Fitted curve for one projected column
#[derive(Debug, Clone, Serialize)]
pub struct TrendSeries {
    pub key: String,
    pub label: String,
    pub times: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct QueryOutput<'a> {
    #[serde(flatten)]
    projection: &'a Projection,
    trends: &'a [TrendSeries],
}

pub fn run_query<W: Write>(
    dataset: &Dataset,
    request: &QueryRequest,
    display_format: &str,
    out: &mut W,
) -> Result<()> {
    if request.columns.is_empty() {
        bail!("At least one column must be selected");
    }

    let schema = dataset.schema();
    let mut keys = vec![schema.time_key().to_string()];
    keys.extend(dataset.keys_from_labels(&request.columns));

    let (default_from, default_to) = full_window(dataset);
    let from = request.from.unwrap_or(default_from);
    let to = request.to.unwrap_or(default_to);

    let projection = dataset
        .project(&keys, from, to)
        .context("Query failed")?;

    let trends = match request.fit_degree {
        Some(degree) => fit_columns(dataset, &projection, degree)?,
        None => Vec::new(),
    };

    if request.json {
        let output = QueryOutput {
            projection: &projection,
            trends: &trends,
        };
        serde_json::to_writer_pretty(&mut *out, &output)?;
        writeln!(out)?;
        return Ok(());
    }

    let sentinel = dataset
        .get(0)
        .map(|r| r.format().sentinel.clone())
        .unwrap_or_else(|| DEFAULT_SENTINEL.to_string());
    write_table(&projection, &trends, display_format, &sentinel, out)
}

fn fit_columns(dataset: &Dataset, projection: &Projection, degree: usize) -> Result<Vec<TrendSeries>> {
    let schema = dataset.schema();
    let times = projection.times().unwrap_or_default();
    let mut trends = Vec::new();

    for (column, key) in projection.keys.iter().enumerate().skip(1) {
        let kind = schema.index_of(key).map(|i| schema.fields()[i].kind)?;
        if !matches!(kind, ValueKind::Float | ValueKind::Integer) {
            tracing::warn!(column = %key, "Skipping trend for non-numeric column");
            continue;
        }

        match dataset.fit(&times, &projection.column_f64(column), degree) {
            Ok((times, values)) => trends.push(TrendSeries {
                key: key.clone(),
                label: styled_label(key, LabelStyle::Trend),
                times,
                values,
            }),
            Err(wxlog_archive::QueryError::Trend(TrendError::Underdetermined { points, .. })) => {
                tracing::warn!(column = %key, points, degree, "Too few points for trend");
            }
            Err(wxlog_archive::QueryError::Trend(TrendError::Singular)) => {
                tracing::warn!(column = %key, degree, "Trend system is singular, column skipped");
            }
            Err(e) => return Err(e).with_context(|| format!("Trend fit for '{}' failed", key)),
        }
    }
    Ok(trends)
}

fn cell(value: &FieldValue, display_format: &str, sentinel: &str) -> String {
    match value {
        FieldValue::Text(v) => v.clone(),
        FieldValue::Integer(v) => v.to_string(),
        FieldValue::Float(v) => v.to_string(),
        FieldValue::Timestamp(t) => t.format(display_format).to_string(),
        FieldValue::Missing => sentinel.to_string(),
    }
}

/// Delimited table: projected columns, then one column per trend with
/// blanks where a point was dropped from the fit
fn write_table<W: Write>(
    projection: &Projection,
    trends: &[TrendSeries],
    display_format: &str,
    sentinel: &str,
    out: &mut W,
) -> Result<()> {
    let mut header = projection.labels.clone();
    header.extend(trends.iter().map(|t| t.label.clone()));
    writeln!(out, "{}", header.join(";"))?;

    let times = projection.times().unwrap_or_default();
    let mut cursors = vec![0usize; trends.len()];

    for (row_index, row) in projection.rows.iter().enumerate() {
        let mut cells: Vec<String> = row
            .iter()
            .map(|v| cell(v, display_format, sentinel))
            .collect();
        for (trend, cursor) in trends.iter().zip(cursors.iter_mut()) {
            let time = times.get(row_index);
            if *cursor < trend.times.len() && time == Some(&trend.times[*cursor]) {
                cells.push(format!("{:.3}", trend.values[*cursor]));
                *cursor += 1;
            } else {
                cells.push(String::new());
            }
        }
        writeln!(out, "{}", cells.join(";"))?;
    }
    Ok(())
}

/// Write the merged series as an export file that ingests back unchanged.
///
/// Sources may mix timestamp formats, but a file is read with a single
/// one, so every row is written in the first record's format.
pub fn export<W: Write>(dataset: &Dataset, options: &IngestOptions, out: &mut W) -> Result<usize> {
    let header = export_header(dataset, options.delimiter, &options.standard_units);
    writeln!(out, "{}", header)?;

    let Some(first) = dataset.get(0) else {
        return Ok(0);
    };
    let time_format = &first.format().time_format;
    for record in dataset.records() {
        writeln!(out, "{}", record.serialize_with(time_format))?;
    }
    Ok(dataset.len())
}

fn export_header(dataset: &Dataset, delimiter: char, units: &StandardUnits) -> String {
    let delimiter = dataset
        .get(0)
        .map(|r| r.format().delimiter)
        .unwrap_or(delimiter);
    dataset
        .schema()
        .names()
        .map(|name| match units.unit_for(name) {
            Some(unit) => format!("{}({})", label_for(name), unit),
            None => label_for(name).to_string(),
        })
        .collect::<Vec<_>>()
        .join(delimiter.to_string().as_str())
}
