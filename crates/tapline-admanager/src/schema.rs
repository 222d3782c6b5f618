//! Arrow schema and accumulator for the report results stream

use std::sync::{Arc, LazyLock};

use arrow::array::{ArrayRef, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use tapline_core::Accumulator;

use crate::report_results::ReportResultRecord;

pub static REPORT_RESULTS: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("result_name", DataType::Utf8, false),
        Field::new("report_id", DataType::Utf8, false),
        Field::new("report_name", DataType::Utf8, false),
        Field::new("report_display_name", DataType::Utf8, false),
        // JSON text
        Field::new("report_definition", DataType::Utf8, true),
        Field::new("report_definition_dimensions", DataType::Utf8, true),
        Field::new("report_definition_metrics", DataType::Utf8, true),
        Field::new("report_results_dimension", DataType::Utf8, true),
        Field::new("report_results_metrics", DataType::Utf8, true),
        // %Y-%m-%dT%H:%M:%SZ
        Field::new("run_time", DataType::Utf8, false),
    ]))
});

/// One row per configured report, so batches stay small
const INITIAL_CAPACITY: usize = 16;

pub fn report_results() -> &'static Schema {
    &REPORT_RESULTS
}

pub struct ReportResultAccumulator {
    result_name: Vec<String>,
    report_id: Vec<String>,
    report_name: Vec<String>,
    report_display_name: Vec<String>,
    report_definition: Vec<String>,
    report_definition_dimensions: Vec<String>,
    report_definition_metrics: Vec<String>,
    report_results_dimension: Vec<String>,
    report_results_metrics: Vec<String>,
    run_time: Vec<String>,
}

impl ReportResultAccumulator {
    pub fn new() -> Self {
        let cap = INITIAL_CAPACITY;
        Self {
            result_name: Vec::with_capacity(cap),
            report_id: Vec::with_capacity(cap),
            report_name: Vec::with_capacity(cap),
            report_display_name: Vec::with_capacity(cap),
            report_definition: Vec::with_capacity(cap),
            report_definition_dimensions: Vec::with_capacity(cap),
            report_definition_metrics: Vec::with_capacity(cap),
            report_results_dimension: Vec::with_capacity(cap),
            report_results_metrics: Vec::with_capacity(cap),
            run_time: Vec::with_capacity(cap),
        }
    }
}

impl Default for ReportResultAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

fn strings(v: &mut Vec<String>) -> ArrayRef {
    Arc::new(StringArray::from(std::mem::take(v)))
}

impl Accumulator for ReportResultAccumulator {
    type Row = ReportResultRecord;

    fn push(&mut self, row: ReportResultRecord) {
        self.result_name.push(row.result_name);
        self.report_id.push(row.report_id);
        self.report_name.push(row.report_name);
        self.report_display_name.push(row.report_display_name);
        self.report_definition.push(row.report_definition);
        self.report_definition_dimensions
            .push(row.report_definition_dimensions);
        self.report_definition_metrics.push(row.report_definition_metrics);
        self.report_results_dimension.push(row.report_results_dimension);
        self.report_results_metrics.push(row.report_results_metrics);
        self.run_time.push(row.run_time);
    }

    fn len(&self) -> usize {
        self.result_name.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays = vec![
            strings(&mut self.result_name),
            strings(&mut self.report_id),
            strings(&mut self.report_name),
            strings(&mut self.report_display_name),
            strings(&mut self.report_definition),
            strings(&mut self.report_definition_dimensions),
            strings(&mut self.report_definition_metrics),
            strings(&mut self.report_results_dimension),
            strings(&mut self.report_results_metrics),
            strings(&mut self.run_time),
        ];
        RecordBatch::try_new(REPORT_RESULTS.clone(), arrays)
    }
}

#[cfg(test)]
mod tests {
    use tapline_core::{ParquetSink, is_valid_parquet, write_batched};
    use tempfile::TempDir;

    use super::*;

    fn record(name: &str) -> ReportResultRecord {
        ReportResultRecord {
            result_name: format!("networks/1/reports/{name}/results/1"),
            report_id: name.to_string(),
            report_name: format!("networks/1/reports/{name}"),
            report_display_name: name.to_string(),
            report_definition: "{}".to_string(),
            report_definition_dimensions: "[]".to_string(),
            report_definition_metrics: "[]".to_string(),
            report_results_dimension: "[]".to_string(),
            report_results_metrics: "[]".to_string(),
            run_time: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn schema_has_record_fields() {
        let schema = report_results();
        assert_eq!(schema.fields().len(), 10);
        assert!(schema.field_with_name("report_results_metrics").is_ok());
        assert!(schema.field_with_name("run_time").is_ok());
    }

    #[test]
    fn batch_matches_schema() {
        let mut acc = ReportResultAccumulator::new();
        acc.push(record("1"));
        acc.push(record("2"));
        let batch = acc.take_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().as_ref(), report_results());
        assert!(acc.is_empty());
    }

    #[test]
    fn writes_parquet() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report_results.parquet");
        let mut sink = ParquetSink::create(&path, report_results(), 3).unwrap();
        let mut acc = ReportResultAccumulator::new();

        let n = write_batched([record("1"), record("2")], &mut acc, |b| sink.write_batch(b)).unwrap();
        assert_eq!(n, 2);
        assert_eq!(sink.finalize().unwrap(), 2);
        assert!(is_valid_parquet(&path));
    }
}
