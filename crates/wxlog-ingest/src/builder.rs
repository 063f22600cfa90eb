//! Directory-to-dataset ingestion

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use wxlog_archive::Dataset;
use wxlog_core::{
    normalize, CoreError, Record, RecordFormat, Schema, StandardUnits, TimeFormat,
    DEFAULT_DELIMITER, DEFAULT_SENTINEL, DEFAULT_TIME_FORMATS,
};

use crate::discovery::{discover_files, DEFAULT_EXTENSIONS};
use crate::{IngestError, IngestResult};

/// Everything that controls one ingestion run
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub directory: PathBuf,
    pub extensions: Vec<String>,
    pub delimiter: char,
    pub schema: Arc<Schema>,
    pub sentinel: String,
    /// Fixed timestamp format; skips detection when set
    pub time_format: Option<String>,
    /// Candidates tried in order when `time_format` is unset
    pub time_formats: Vec<String>,
    pub sort: bool,
    pub dedupe: bool,
    pub standard_units: StandardUnits,
}

impl IngestOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            delimiter: DEFAULT_DELIMITER,
            schema: Arc::new(Schema::default()),
            sentinel: DEFAULT_SENTINEL.to_string(),
            time_format: None,
            time_formats: DEFAULT_TIME_FORMATS.iter().map(|s| s.to_string()).collect(),
            sort: true,
            dedupe: true,
            standard_units: StandardUnits::default(),
        }
    }

    pub fn with_ordering(mut self, sort: bool, dedupe: bool) -> Self {
        self.sort = sort;
        self.dedupe = dedupe;
        self
    }

    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = Some(format.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    /// Reject flag combinations before touching the filesystem
    pub fn validate(&self) -> IngestResult<()> {
        if self.dedupe && !self.sort {
            return Err(IngestError::Config(
                "removing duplicates requires sorting".into(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(IngestError::Config("no file extensions configured".into()));
        }
        if self.time_format.is_none() && self.time_formats.is_empty() {
            return Err(IngestError::Config("no time format candidates".into()));
        }
        Ok(())
    }
}

pub struct DatasetBuilder {
    options: IngestOptions,
}

impl DatasetBuilder {
    pub fn new(options: IngestOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Read every matching file and merge the records.
    ///
    /// Either the whole directory ingests cleanly or the first bad line is
    /// returned as an error; no partial dataset escapes.
    #[instrument(skip(self), fields(dir = %self.options.directory.display()))]
    pub fn build(&self) -> IngestResult<Dataset> {
        self.options.validate()?;

        let files = discover_files(&self.options.directory, &self.options.extensions);
        if files.is_empty() {
            info!("No matching export files found");
            return Ok(Dataset::default());
        }

        let mut records = Vec::new();
        for path in &files {
            records.extend(self.read_file(path)?);
        }
        let total = records.len();

        let dataset = if self.options.sort {
            Dataset::from_records(records, self.options.dedupe)
        } else {
            Dataset::from_unsorted(records)
        };

        info!(
            files = files.len(),
            parsed = total,
            kept = dataset.len(),
            "Dataset built"
        );
        Ok(dataset)
    }

    /// Parse and normalize a single export file
    pub fn read_file(&self, path: &Path) -> IngestResult<Vec<Record>> {
        let bytes = fs::read(path).map_err(|e| IngestError::Io(path.to_path_buf(), e))?;
        // Exports are not reliably UTF-8; only header unit text can be affected
        let content = String::from_utf8_lossy(&bytes);
        let records = self.parse_source(path, &content)?;
        info!(file = %path.display(), records = records.len(), "Ingested export file");
        Ok(records)
    }

    /// Parse the full text of one export. Line 1 is the header.
    pub fn parse_source(&self, path: &Path, content: &str) -> IngestResult<Vec<Record>> {
        let mut lines = content.lines();
        let header = lines.next().unwrap_or_default();

        let data_lines: Vec<(usize, &str)> = lines
            .enumerate()
            .map(|(i, line)| (i + 2, line.trim_matches('\0').trim_end()))
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();

        let Some(&(first_line, first)) = data_lines.first() else {
            return Ok(Vec::new());
        };

        let at_line = |line: usize| {
            let path = path.to_path_buf();
            move |source: CoreError| IngestError::Parse { path, line, source }
        };

        let time_format = self.resolve_time_format(first).map_err(at_line(first_line))?;
        debug!(file = %path.display(), format = time_format.as_str(), "Resolved time format");

        let format = Arc::new(
            RecordFormat::new(Arc::clone(&self.options.schema), time_format)
                .with_delimiter(self.options.delimiter)
                .with_sentinel(self.options.sentinel.clone()),
        );

        let mut records = data_lines
            .iter()
            .map(|&(number, line)| Record::parse(line, &format).map_err(at_line(number)))
            .collect::<IngestResult<Vec<_>>>()?;

        normalize(
            &mut records,
            header,
            self.options.delimiter,
            &self.options.standard_units,
        )
        .map_err(at_line(1))?;

        Ok(records)
    }

    /// One format per source file, detected from its first data line
    fn resolve_time_format(&self, line: &str) -> Result<TimeFormat, CoreError> {
        if let Some(explicit) = &self.options.time_format {
            return Ok(TimeFormat::new(explicit.as_str()));
        }

        let schema = &self.options.schema;
        let token = line
            .split(self.options.delimiter)
            .nth(schema.time_index())
            .ok_or_else(|| {
                CoreError::Format(format!("line has no '{}' column", schema.time_key()))
            })?;
        TimeFormat::resolve(token.trim(), &self.options.time_formats)
    }
}

/// Build a dataset from `directory` with default options
pub fn build_dataset(directory: impl Into<PathBuf>) -> IngestResult<Dataset> {
    DatasetBuilder::new(IngestOptions::new(directory)).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "No;Zeit;Intervall(mi);innen Luftfeuchtigkeit(%);innen Temperatur(°C);außen Luftfeuchtigkeit(%);außen Temperatur(°C);absolut Luftdruck(Hpa);Wind(m/s);Windbö(m/s);Richtung;relative Luftdruck(Hpa);Taupunkt(°C);Windauskühlung(°C);Stunde Niederschlag(mm);24 Stunde Niederschlag(mm);Woche Niederschlag(mm);Monat Niederschlag(mm);Total Niederschlag(mm);Wind Level(bft);Windbö Level(bft)";

    fn builder() -> DatasetBuilder {
        DatasetBuilder::new(IngestOptions::new("unused"))
    }

    #[test]
    fn test_skips_header_and_blank_lines() {
        let content = format!(
            "{HEADER}\r\n1;11-03-2019 11:31;63;46;19.1;98;1.1;987.5;2.0;3.1;NW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;0.0;2;2\r\n   \r\n\0\0\0\n2;11-03-2019 11:41;63;46;19.1;98;1.3;987.5;2.0;3.1;NW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;0.0;2;2  \n"
        );
        let records = builder()
            .parse_source(Path::new("a.txt"), &content)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("WindGustLevel").unwrap().as_f64(), Some(2.0));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let records = builder()
            .parse_source(Path::new("a.txt"), HEADER)
            .unwrap();
        assert!(records.is_empty());
        assert!(builder().parse_source(Path::new("a.txt"), "").unwrap().is_empty());
    }

    #[test]
    fn test_legacy_time_format_detected_per_file() {
        let content = format!(
            "{HEADER}\n1;11.03.2019 11:31:00;63;46;19.1;98;1.1;987.5;2.0;3.1;NW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;0.0;2;2\n"
        );
        let records = builder()
            .parse_source(Path::new("legacy.txt"), &content)
            .unwrap();
        assert_eq!(records[0].format().time_format.as_str(), "%d.%m.%Y %H:%M:%S");
    }

    #[test]
    fn test_mixed_formats_in_one_file_fail() {
        let content = format!(
            "{HEADER}\n1;11-03-2019 11:31;63;46;19.1;98;1.1;987.5;2.0;3.1;NW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;0.0;2;2\n2;11.03.2019 11:41:00;63;46;19.1;98;1.1;987.5;2.0;3.1;NW;1013.5;0.8;-0.5;0.0;0.0;0.0;0.0;0.0;2;2\n"
        );
        let err = builder()
            .parse_source(Path::new("mixed.txt"), &content)
            .unwrap_err();
        match err {
            IngestError::Parse { line, source, .. } => {
                assert_eq!(line, 3);
                assert!(matches!(source, CoreError::Format(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dedupe_without_sort_is_rejected() {
        let options = IngestOptions::new("unused").with_ordering(false, true);
        assert!(matches!(
            DatasetBuilder::new(options).build(),
            Err(IngestError::Config(_))
        ));
    }
}
