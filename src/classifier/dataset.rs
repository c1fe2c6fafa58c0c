//! Labeled training examples
//!
//! Every record has exactly three fields. Two file formats are accepted,
//! picked by extension:
//!
//! ```text
//! {"code_before": "...", "code_after": "...", "error_introduced": 0}   (JSON Lines)
//!
//! code_before,code_after,error_introduced                              (.csv)
//! "print('hi')","print('hi there')",0
//! ```
//!
//! The store is append-only; records are never rewritten in place.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::DatasetError;

/// Default dataset file name
pub const DATASET_FILE: &str = "training_data.jsonl";

/// Column order of CSV datasets
const CSV_HEADER: [&str; 3] = ["code_before", "code_after", "error_introduced"];

/// On-disk layout of a dataset file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    JsonLines,
    Csv,
}

impl DatasetFormat {
    /// `.csv` files are CSV with a header row; anything else is JSON Lines.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => DatasetFormat::Csv,
            _ => DatasetFormat::JsonLines,
        }
    }
}

/// A before/after pair and whether applying it broke something
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabeledExample {
    pub code_before: String,
    pub code_after: String,
    #[serde(with = "binary_label")]
    pub error_introduced: bool,
}

impl LabeledExample {
    pub fn new(
        code_before: impl Into<String>,
        code_after: impl Into<String>,
        error_introduced: bool,
    ) -> Self {
        Self {
            code_before: code_before.into(),
            code_after: code_after.into(),
            error_introduced,
        }
    }
}

/// The label is stored as the integer 0 or 1.
mod binary_label {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(D::Error::custom(format!(
                "error_introduced must be 0 or 1, got {other}"
            ))),
        }
    }
}

/// File-backed store of labeled examples
#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
    format: DatasetFormat,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = DatasetFormat::from_path(&path);
        Self { path, format }
    }

    /// `<data_dir>/saferefactor/training_data.jsonl`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("saferefactor")
            .join(DATASET_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> DatasetFormat {
        self.format
    }

    fn io_error(&self, source: std::io::Error) -> DatasetError {
        DatasetError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn invalid_record(&self, line: usize, message: impl std::fmt::Display) -> DatasetError {
        DatasetError::InvalidRecord {
            path: self.path.clone(),
            line,
            message: message.to_string(),
        }
    }

    pub fn append(&self, example: &LabeledExample) -> Result<(), DatasetError> {
        self.append_all(std::slice::from_ref(example)).map(|_| ())
    }

    /// Append several examples; returns how many were written.
    pub fn append_all(&self, examples: &[LabeledExample]) -> Result<usize, DatasetError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        match self.format {
            DatasetFormat::JsonLines => {
                for example in examples {
                    let json = serde_json::to_string(example)?;
                    writeln!(file, "{json}").map_err(|e| self.io_error(e))?;
                }
            }
            DatasetFormat::Csv => {
                let is_new = file.metadata().map_err(|e| self.io_error(e))?.len() == 0;
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(file);
                if is_new {
                    writer.write_record(CSV_HEADER)?;
                }
                for example in examples {
                    writer.serialize(example)?;
                }
                writer.flush().map_err(|e| self.io_error(e))?;
            }
        }
        Ok(examples.len())
    }

    /// Every record in file order. A missing file is an empty dataset;
    /// blank lines are skipped; any other bad line is an error naming it.
    pub fn load_all(&self) -> Result<Vec<LabeledExample>, DatasetError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        match self.format {
            DatasetFormat::JsonLines => self.load_json_lines(file),
            DatasetFormat::Csv => self.load_csv(file),
        }
    }

    fn load_json_lines(&self, file: File) -> Result<Vec<LabeledExample>, DatasetError> {
        let reader = BufReader::new(file);
        let mut examples = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| self.io_error(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let example = serde_json::from_str::<LabeledExample>(&line)
                .map_err(|e| self.invalid_record(i + 1, e))?;
            examples.push(example);
        }
        Ok(examples)
    }

    /// Quoted fields may span several lines; errors name the line the
    /// record starts on (the header is line 1).
    fn load_csv(&self, file: File) -> Result<Vec<LabeledExample>, DatasetError> {
        let mut reader = csv::ReaderBuilder::new().from_reader(file);
        let record_line = |e: &csv::Error| e.position().map_or(1, |p| p.line() as usize);

        let headers = reader
            .headers()
            .map_err(|e| self.invalid_record(record_line(&e), e))?
            .clone();
        let missing: Vec<&str> = CSV_HEADER
            .iter()
            .copied()
            .filter(|column| !headers.iter().any(|h| h == *column))
            .collect();
        if !missing.is_empty() {
            return Err(self.invalid_record(
                1,
                format!("missing column(s): {}", missing.join(", ")),
            ));
        }

        let mut examples = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| self.invalid_record(record_line(&e), e))?;
            let line = record.position().map_or(1, |p| p.line() as usize);
            let example = record
                .deserialize::<LabeledExample>(Some(&headers))
                .map_err(|e| self.invalid_record(line, e))?;
            examples.push(example);
        }
        Ok(examples)
    }

    pub fn stats(&self) -> Result<DatasetStats, DatasetError> {
        let examples = self.load_all()?;
        let errors = examples.iter().filter(|e| e.error_introduced).count();
        Ok(DatasetStats {
            total: examples.len(),
            errors,
            safe: examples.len() - errors,
        })
    }
}

/// Label counts for a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetStats {
    pub total: usize,
    pub errors: usize,
    pub safe: usize,
}

impl std::fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pct = |n: usize| {
            if self.total > 0 {
                n as f64 / self.total as f64 * 100.0
            } else {
                0.0
            }
        };
        writeln!(f, "Training data:")?;
        writeln!(f, "  Total examples:     {}", self.total)?;
        writeln!(
            f,
            "  Error introduced:   {} ({:.1}%)",
            self.errors,
            pct(self.errors)
        )?;
        write!(f, "  Safe:               {} ({:.1}%)", self.safe, pct(self.safe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DatasetStore::new(dir.path().join("data").join("examples.jsonl"));
        store
            .append(&LabeledExample::new("x = 1", "x = 2", false))
            .expect("append");
        store
            .append_all(&[
                LabeledExample::new("a", "b", true),
                LabeledExample::new("c", "d", false),
            ])
            .expect("append");

        let loaded = store.load_all().expect("load");
        assert_eq!(loaded.len(), 3);
        assert!(loaded[1].error_introduced);

        let stats = store.stats().expect("stats");
        assert_eq!((stats.total, stats.errors, stats.safe), (3, 1, 2));
    }

    #[test]
    fn test_label_is_written_as_integer() {
        let json = serde_json::to_string(&LabeledExample::new("a", "b", true)).expect("encode");
        assert_eq!(
            json,
            r#"{"code_before":"a","code_after":"b","error_introduced":1}"#
        );
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DatasetStore::new(dir.path().join("none.jsonl"));
        assert!(store.load_all().expect("load").is_empty());
    }

    #[test]
    fn test_invalid_label_names_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.jsonl");
        std::fs::write(
            &path,
            "{\"code_before\":\"a\",\"code_after\":\"b\",\"error_introduced\":0}\n\n{\"code_before\":\"a\",\"code_after\":\"b\",\"error_introduced\":2}\n",
        )
        .expect("write");
        let err = DatasetStore::new(&path).load_all().expect_err("label 2");
        match err {
            DatasetError::InvalidRecord { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("0 or 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(DatasetFormat::from_path(Path::new("d.csv")), DatasetFormat::Csv);
        assert_eq!(DatasetFormat::from_path(Path::new("d.CSV")), DatasetFormat::Csv);
        assert_eq!(DatasetFormat::from_path(Path::new("d.jsonl")), DatasetFormat::JsonLines);
        assert_eq!(DatasetFormat::from_path(Path::new("data")), DatasetFormat::JsonLines);
    }

    #[test]
    fn test_load_csv_with_quoted_multiline_snippets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        std::fs::write(
            &path,
            "code_before,code_after,error_introduced\n\
             \"print('hello')\",\"print('hello world')\",0\n\
             \"x = 0\nif x == 0:\n    print('Zero')\",\"x = 0\nif x == 0:\n    print('Changed')\",1\n",
        )
        .expect("write");

        let loaded = DatasetStore::new(&path).load_all().expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], LabeledExample::new("print('hello')", "print('hello world')", false));
        assert_eq!(loaded[1].code_before, "x = 0\nif x == 0:\n    print('Zero')");
        assert!(loaded[1].error_introduced);
    }

    #[test]
    fn test_csv_invalid_label_names_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "code_before,code_after,error_introduced\na,b,1\n\"c\nd\",e,0\nf,g,2\n",
        )
        .expect("write");
        let err = DatasetStore::new(&path).load_all().expect_err("label 2");
        match err {
            DatasetError::InvalidRecord { line, message, .. } => {
                assert_eq!(line, 5);
                assert!(message.contains("0 or 1"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_csv_missing_column_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cols.csv");
        std::fs::write(&path, "code_before,label\na,0\n").expect("write");
        let err = DatasetStore::new(&path).load_all().expect_err("columns");
        match err {
            DatasetError::InvalidRecord { line, message, .. } => {
                assert_eq!(line, 1);
                assert!(message.contains("code_after"));
                assert!(message.contains("error_introduced"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_csv_append_writes_header_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.csv");
        let store = DatasetStore::new(&path);
        store
            .append(&LabeledExample::new("x = 1", "x = 2", false))
            .expect("append");
        store
            .append(&LabeledExample::new("a, b = f()", "a = f()\nb = g()", true))
            .expect("append");

        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text.matches("code_before,code_after,error_introduced").count(), 1);
        let loaded = store.load_all().expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].code_after, "a = f()\nb = g()");
        assert!(loaded[1].error_introduced);
    }

    #[test]
    fn test_extra_and_missing_fields_rejected() {
        let extra = r#"{"code_before":"a","code_after":"b","error_introduced":0,"x":1}"#;
        assert!(serde_json::from_str::<LabeledExample>(extra).is_err());
        let missing = r#"{"code_before":"a","error_introduced":0}"#;
        assert!(serde_json::from_str::<LabeledExample>(missing).is_err());
    }
}
