//! Ordered record storage

use chrono::NaiveDateTime;
use std::collections::HashSet;
use wxlog_core::{by_time, Record, Schema};

/// All records of one ingestion run.
///
/// Built once and replaced wholesale on the next run; never merged.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
    sorted: bool,
}

impl Dataset {
    /// Take records that are already in ascending time order
    pub fn from_sorted(records: Vec<Record>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].time() <= w[1].time()));
        Self {
            records,
            sorted: true,
        }
    }

    /// Keep records in the order given. Range lookups fall back to a
    /// linear scan.
    pub fn from_unsorted(records: Vec<Record>) -> Self {
        Self {
            records,
            sorted: false,
        }
    }

    /// Stable sort by timestamp, then optionally drop exact duplicates
    pub fn from_records(mut records: Vec<Record>, dedupe: bool) -> Self {
        records.sort_by(by_time);
        if dedupe {
            records = dedupe_records(records);
        }
        Self::from_sorted(records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Schema of the stored records, or the default layout when empty
    pub fn schema(&self) -> Schema {
        self.records
            .first()
            .map(|r| r.schema().clone())
            .unwrap_or_default()
    }

    pub fn earliest(&self) -> Option<NaiveDateTime> {
        if self.sorted {
            self.records.first().map(Record::time)
        } else {
            self.records.iter().map(Record::time).min()
        }
    }

    pub fn latest(&self) -> Option<NaiveDateTime> {
        if self.sorted {
            self.records.last().map(Record::time)
        } else {
            self.records.iter().map(Record::time).max()
        }
    }
}

/// Drop records whose serialized line was already seen, keeping the first.
///
/// Records sharing a timestamp but differing in any other field are kept.
pub fn dedupe_records(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.serialize()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wxlog_core::RecordFormat;

    fn record(format: &Arc<RecordFormat>, time: &str, temp: &str) -> Record {
        let line = format!(
            "1;{};63;46;19.1;98;{};987.5;2.0;3.1;NW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;0.0;2;2",
            time, temp
        );
        Record::parse(&line, format).unwrap()
    }

    #[test]
    fn test_from_records_sorts_and_dedupes() {
        let format = Arc::new(RecordFormat::default());
        let records = vec![
            record(&format, "03-01-2019 00:00", "1.0"),
            record(&format, "01-01-2019 00:00", "1.0"),
            record(&format, "03-01-2019 00:00", "1.0"),
            record(&format, "02-01-2019 00:00", "1.0"),
        ];

        let dataset = Dataset::from_records(records, true);
        assert_eq!(dataset.len(), 3);
        assert!(dataset
            .records()
            .windows(2)
            .all(|w| w[0].time() < w[1].time()));
    }

    #[test]
    fn test_same_time_different_payload_is_kept() {
        let format = Arc::new(RecordFormat::default());
        let records = vec![
            record(&format, "01-01-2019 00:00", "1.0"),
            record(&format, "01-01-2019 00:00", "2.0"),
        ];

        let dataset = Dataset::from_records(records, true);
        assert_eq!(dataset.len(), 2);
        // Stable sort keeps file order among equal timestamps
        assert_eq!(
            dataset.get(0).unwrap().get("TemperatureOutside").unwrap().as_f64(),
            Some(1.0)
        );
    }

    #[test]
    fn test_bounds() {
        let format = Arc::new(RecordFormat::default());
        let first = record(&format, "01-01-2019 00:00", "1.0");
        let last = record(&format, "05-01-2019 12:00", "1.0");

        let unsorted = Dataset::from_unsorted(vec![last.clone(), first.clone()]);
        assert_eq!(unsorted.earliest(), Some(first.time()));
        assert_eq!(unsorted.latest(), Some(last.time()));

        let empty = Dataset::default();
        assert_eq!(empty.earliest(), None);
        assert_eq!(empty.schema(), Schema::default());
    }
}
