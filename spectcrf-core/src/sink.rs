//! Output collaborator interface.

use crate::error::{Error, Result};
use crate::record::DetectionRecord;
use crate::soa::RecordBatch;

/// Receives finalized records, in event order.
pub trait RecordSink {
    /// Accepts one retained record.
    ///
    /// # Errors
    /// Returns an error if the record cannot be stored.
    fn write_record(&mut self, record: &DetectionRecord) -> Result<()>;

    /// Flushes and closes the destination. Called once at end of acquisition.
    ///
    /// # Errors
    /// Returns an error if the final flush fails.
    fn close(&mut self) -> Result<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write_record(&mut self, record: &DetectionRecord) -> Result<()> {
        (**self).write_record(record)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Sink that keeps records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    batch: RecordBatch,
    closed: bool,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far.
    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Records received so far, rebuilt as structs.
    #[must_use]
    pub fn records(&self) -> Vec<DetectionRecord> {
        (0..self.batch.len())
            .filter_map(|i| self.batch.get(i))
            .collect()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RecordSink for MemorySink {
    fn write_record(&mut self, record: &DetectionRecord) -> Result<()> {
        if self.closed {
            return Err(Error::SinkClosed);
        }
        self.batch.push(record);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
