//! Record sinks backed by output files.

use crate::writer::DataFileWriter;
use crate::{Error, Result};
use spectcrf_core::{DetectionRecord, RecordBatch, RecordMode, RecordSink};
use std::path::Path;

/// Default number of records buffered before a write.
pub const DEFAULT_CHUNK_RECORDS: usize = 10_000;

/// On-disk format of a record output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Binary,
    Hdf5,
}

impl OutputFormat {
    /// Chooses the format from the file extension.
    ///
    /// Unknown extensions fall back to binary with a warning.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Self::Csv,
            Some("bin" | "dat") => Self::Binary,
            Some("h5" | "hdf5" | "nxs") => Self::Hdf5,
            other => {
                log::warn!(
                    "unknown output extension {:?}; writing binary records",
                    other.unwrap_or("")
                );
                Self::Binary
            }
        }
    }
}

/// Sink that buffers records and writes them as CSV or binary.
pub struct FileRecordSink {
    writer: DataFileWriter,
    format: OutputFormat,
    buffer: RecordBatch,
    chunk_records: usize,
    written: usize,
    closed: bool,
}

impl FileRecordSink {
    /// Creates the output file; CSV output starts with its header row.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or `format` is HDF5.
    pub fn create<P: AsRef<Path>>(path: P, format: OutputFormat, mode: RecordMode) -> Result<Self> {
        if format == OutputFormat::Hdf5 {
            return Err(Error::InvalidFormat(
                "HDF5 output is written by Hdf5RecordSink".to_string(),
            ));
        }
        let mut writer = DataFileWriter::create(path, mode)?;
        if format == OutputFormat::Csv {
            writer.write_csv_header()?;
        }
        Ok(Self {
            writer,
            format,
            buffer: RecordBatch::with_capacity(DEFAULT_CHUNK_RECORDS),
            chunk_records: DEFAULT_CHUNK_RECORDS,
            written: 0,
            closed: false,
        })
    }

    /// Sets the number of records buffered before a write (at least 1).
    #[must_use]
    pub fn with_chunk_records(mut self, chunk_records: usize) -> Self {
        self.chunk_records = chunk_records.max(1);
        self
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Records written to the file so far, excluding the buffered ones.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Records waiting in the buffer.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        match self.format {
            OutputFormat::Csv => self.writer.write_records_csv(&self.buffer)?,
            _ => self.writer.write_records_binary(&self.buffer)?,
        }
        self.written += self.buffer.len();
        self.buffer.clear();
        Ok(())
    }
}

impl RecordSink for FileRecordSink {
    fn write_record(&mut self, record: &DetectionRecord) -> spectcrf_core::Result<()> {
        if self.closed {
            return Err(spectcrf_core::Error::SinkClosed);
        }
        self.buffer.push(record);
        if self.buffer.len() >= self.chunk_records {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn close(&mut self) -> spectcrf_core::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_buffer()?;
        self.writer.flush()?;
        self.closed = true;
        log::debug!("closed record output after {} record(s)", self.written);
        Ok(())
    }
}

/// Opens the sink matching the extension of `path`.
///
/// # Errors
/// Returns an error if the file cannot be created, or if HDF5 output is
/// requested from a build without the `hdf5` feature.
pub fn open_record_sink<P: AsRef<Path>>(path: P, mode: RecordMode) -> Result<Box<dyn RecordSink>> {
    let path = path.as_ref();
    let format = OutputFormat::from_path(path);
    log::info!("writing {format:?} records to {}", path.display());
    match format {
        #[cfg(feature = "hdf5")]
        OutputFormat::Hdf5 => Ok(Box::new(crate::hdf5::Hdf5RecordSink::create(
            path,
            crate::hdf5::RecordWriteOptions::new(mode),
        )?)),
        #[cfg(not(feature = "hdf5"))]
        OutputFormat::Hdf5 => Err(Error::InvalidFormat(format!(
            "{}: HDF5 output requires the hdf5 feature",
            path.display()
        ))),
        _ => Ok(Box::new(FileRecordSink::create(path, format, mode)?)),
    }
}
