//! Range slicing, column projection and label translation

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, instrument};
use wxlog_core::{
    fit, keys_for, label_for, labels_for, time_cmp, FieldValue, LabelStyle, Record,
};

use crate::{Dataset, QueryError, QueryResult};

/// Selected columns of a time window, in record order
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Projection {
    pub keys: Vec<String>,
    pub labels: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
    #[serde(skip)]
    time_column: Option<usize>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Timestamps of the rows, if the time key was projected
    pub fn times(&self) -> Option<Vec<NaiveDateTime>> {
        let column = self.time_column?;
        self.rows.iter().map(|row| row[column].as_time()).collect()
    }

    /// Numeric column with missing or non-numeric cells as NaN
    pub fn column_f64(&self, column: usize) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| {
                row.get(column)
                    .and_then(FieldValue::as_f64)
                    .unwrap_or(f64::NAN)
            })
            .collect()
    }
}

/// Window used when the caller gives no range
pub fn default_window() -> (NaiveDateTime, NaiveDateTime) {
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    let end = NaiveDate::from_ymd_opt(3000, 12, 31).and_then(|d| d.and_hms_opt(0, 0, 0));
    (
        start.unwrap_or(NaiveDateTime::MIN),
        end.unwrap_or(NaiveDateTime::MAX),
    )
}

impl Dataset {
    /// Half-open index range of records with `start < time <= end`
    pub fn slice(&self, start: NaiveDateTime, end: NaiveDateTime) -> QueryResult<(usize, usize)> {
        if start >= end {
            return Err(QueryError::Range { start, end });
        }

        let records = self.records();
        if self.is_sorted() {
            let first = records.partition_point(|r| time_cmp(r, &start).is_le());
            let last = records.partition_point(|r| time_cmp(r, &end).is_le());
            return Ok((first, last));
        }

        let after = |from: usize, bound: &NaiveDateTime| {
            records[from..]
                .iter()
                .position(|r| time_cmp(r, bound).is_gt())
                .map_or(records.len(), |i| from + i)
        };
        let first = after(0, &start);
        Ok((first, after(first, &end)))
    }

    /// Values of `keys` for every record in the window, with plain labels
    pub fn project<S: AsRef<str>>(
        &self,
        keys: &[S],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> QueryResult<Projection> {
        self.project_with(keys, start, end, LabelStyle::Plain)
    }

    /// Projection over the whole default window
    pub fn project_all<S: AsRef<str>>(&self, keys: &[S]) -> QueryResult<Projection> {
        let (start, end) = default_window();
        self.project(keys, start, end)
    }

    #[instrument(skip(self, keys), fields(key_count = keys.len()))]
    pub fn project_with<S: AsRef<str>>(
        &self,
        keys: &[S],
        start: NaiveDateTime,
        end: NaiveDateTime,
        style: LabelStyle,
    ) -> QueryResult<Projection> {
        let schema = self.schema();
        let indices = keys
            .iter()
            .map(|k| schema.index_of(k.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let time_column = indices.iter().position(|&i| i == schema.time_index());

        let (first, last) = self.slice(start, end)?;
        let rows: Vec<Vec<FieldValue>> = self.records()[first..last]
            .iter()
            .map(|record: &Record| {
                indices
                    .iter()
                    .map(|&i| record.values()[i].clone())
                    .collect()
            })
            .collect();

        debug!(rows = rows.len(), first, last, "Projected window");

        Ok(Projection {
            keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            labels: labels_for(keys, style),
            rows,
            time_column,
        })
    }

    /// Labels of every field except the timestamp, in schema order
    pub fn possible_labels(&self) -> Vec<String> {
        let schema = self.schema();
        schema
            .names()
            .filter(|name| *name != schema.time_key())
            .map(|name| label_for(name).to_string())
            .collect()
    }

    /// Reverse label lookup; unknown labels pass through
    pub fn keys_from_labels<S: AsRef<str>>(&self, labels: &[S]) -> Vec<String> {
        keys_for(labels)
    }

    /// Polynomial trend of `values` over `times`
    pub fn fit(
        &self,
        times: &[NaiveDateTime],
        values: &[f64],
        degree: usize,
    ) -> QueryResult<(Vec<NaiveDateTime>, Vec<f64>)> {
        Ok(fit(times, values, degree)?)
    }
}
