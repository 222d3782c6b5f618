//! Batch accumulator trait and a generic drain loop into Arrow batches

use arrow::array::RecordBatch;
use arrow::error::ArrowError;

/// Default batch size for flushing accumulated rows into a `RecordBatch`.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Columnar buffer for typed rows.
pub trait Accumulator {
    type Row;

    fn push(&mut self, row: Self::Row);

    /// Number of rows currently buffered
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer should be flushed
    fn is_full(&self) -> bool {
        self.len() >= DEFAULT_BATCH_SIZE
    }

    /// Take buffered rows as a RecordBatch, resetting internal state
    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError>;
}

/// Push every row, flushing full batches and the final partial one.
///
/// Returns the number of rows written.
pub fn write_batched<A: Accumulator>(
    rows: impl IntoIterator<Item = A::Row>,
    acc: &mut A,
    mut write_batch: impl FnMut(&RecordBatch) -> std::io::Result<()>,
) -> std::io::Result<usize> {
    let mut written = 0usize;
    for row in rows {
        acc.push(row);
        written += 1;
        if acc.is_full() {
            write_batch(&acc.take_batch().map_err(std::io::Error::other)?)?;
        }
    }
    if !acc.is_empty() {
        write_batch(&acc.take_batch().map_err(std::io::Error::other)?)?;
    }
    Ok(written)
}
