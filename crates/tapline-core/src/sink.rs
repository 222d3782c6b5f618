//! Output sinks: JSON lines and Parquet
//!
//! File targets are written to `<path>.tmp` and renamed on finalize, so an
//! interrupted run never leaves a truncated file under the final name.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::Serialize;

/// `<path>.tmp`
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

/// Create `<path>.tmp`, replacing a stale one.
fn create_tmp(path: &Path) -> io::Result<(File, PathBuf)> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = tmp_path(path);
    if tmp.exists() {
        log::warn!("Removing stale tmp file: {}", tmp.display());
        fs::remove_file(&tmp)?;
    }
    Ok((File::create(&tmp)?, tmp))
}

/// Newline-delimited JSON writer (stdout or file)
pub struct JsonlSink {
    writer: BufWriter<Box<dyn Write>>,
    /// (tmp, final) when writing to a file
    target: Option<(PathBuf, PathBuf)>,
    row_count: usize,
}

impl std::fmt::Debug for JsonlSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlSink")
            .field("target", &self.target.as_ref().map(|(_, p)| p))
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

impl JsonlSink {
    pub fn stdout() -> Self {
        Self {
            writer: BufWriter::new(Box::new(io::stdout())),
            target: None,
            row_count: 0,
        }
    }

    pub fn create(path: &Path) -> io::Result<Self> {
        let (file, tmp) = create_tmp(path)?;
        Ok(Self {
            writer: BufWriter::new(Box::new(file)),
            target: Some((tmp, path.to_path_buf())),
            row_count: 0,
        })
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record).map_err(io::Error::other)?;
        self.writer.write_all(b"\n")?;
        self.row_count += 1;
        Ok(())
    }

    /// Flush and, for file targets, rename tmp → final
    pub fn finalize(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        if let Some((tmp, path)) = self.target.take() {
            drop(self.writer);
            fs::rename(&tmp, &path)?;
        }
        Ok(self.row_count)
    }
}

/// Buffered parquet writer with atomic tmp→rename
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    row_count: usize,
}

impl std::fmt::Debug for ParquetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSink")
            .field("final_path", &self.final_path)
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

impl ParquetSink {
    pub fn create(path: &Path, schema: &Schema, zstd_level: i32) -> io::Result<Self> {
        let level = ZstdLevel::try_new(zstd_level)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let (file, tmp_path) = create_tmp(path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(level))
            .build();
        let writer = ArrowWriter::try_new(file, Arc::new(schema.clone()), Some(props))
            .map_err(io::Error::other)?;

        Ok(Self {
            writer,
            tmp_path,
            final_path: path.to_path_buf(),
            row_count: 0,
        })
    }

    pub fn write_batch(&mut self, batch: &RecordBatch) -> io::Result<()> {
        self.row_count += batch.num_rows();
        self.writer.write(batch).map_err(io::Error::other)
    }

    /// Flush footer and rename tmp → final
    pub fn finalize(self) -> io::Result<usize> {
        let row_count = self.row_count;
        self.writer.close().map_err(io::Error::other)?;
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(row_count)
    }
}

/// Check if a completed parquet file exists and has a valid footer
pub fn is_valid_parquet(path: &Path) -> bool {
    match File::open(path) {
        Ok(file) => parquet::file::reader::SerializedFileReader::new(file).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("out/attendees.jsonl")),
            PathBuf::from("out/attendees.jsonl.tmp")
        );
    }

    #[test]
    fn jsonl_file_renamed_on_finalize() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");

        let mut sink = JsonlSink::create(&path).unwrap();
        sink.write(&json!({"eventid": 1})).unwrap();
        sink.write(&json!({"eventid": 2})).unwrap();
        assert!(!path.exists());
        assert!(tmp_path(&path).exists());

        assert_eq!(sink.finalize().unwrap(), 2);
        assert!(!tmp_path(&path).exists());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"eventid\":1}\n{\"eventid\":2}\n");
    }

    #[test]
    fn stale_tmp_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jsonl");
        std::fs::write(tmp_path(&path), b"stale").unwrap();

        let sink = JsonlSink::create(&path).unwrap();
        assert_eq!(sink.finalize().unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn is_valid_parquet_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        assert!(!is_valid_parquet(&dir.path().join("nope.parquet")));
        let path = dir.path().join("bad.parquet");
        std::fs::write(&path, b"this is not parquet").unwrap();
        assert!(!is_valid_parquet(&path));
    }

    #[test]
    fn parquet_sink_roundtrip_file() {
        let dir = TempDir::new().unwrap();
        let schema = Schema::new(vec![Field::new("id", DataType::Int64, false)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema.clone()),
            vec![Arc::new(Int64Array::from(vec![1, 2, 3]))],
        )
        .unwrap();

        let path = dir.path().join("report_results.parquet");
        let mut sink = ParquetSink::create(&path, &schema, 3).unwrap();
        sink.write_batch(&batch).unwrap();
        assert_eq!(sink.finalize().unwrap(), 3);
        assert!(is_valid_parquet(&path));
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn parquet_sink_rejects_bad_level() {
        let dir = TempDir::new().unwrap();
        let schema = Schema::new(vec![Field::new("id", DataType::Int64, false)]);
        let err = ParquetSink::create(&dir.path().join("x.parquet"), &schema, 99).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
