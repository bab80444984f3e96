//! spectcrf-io: File I/O for spectcrf.
//!
//! Memory-mapped step-trace replay, JSON actor settings, and record sinks
//! writing CSV, little-endian binary or (with the `hdf5` feature) HDF5.
//!

mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
pub mod settings;
mod sink;
mod writer;

pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{read_records_hdf5, Hdf5RecordSink, RecordData, RecordWriteOptions};
pub use reader::{
    parse_trace, replay, replay_entries, MappedFileReader, MappedTraceReader, TraceEntry,
    TraceSummary,
};
pub use settings::ActorSettings;
pub use sink::{open_record_sink, FileRecordSink, OutputFormat, DEFAULT_CHUNK_RECORDS};
pub use writer::{DataFileWriter, PER_EVENT_ROW_BYTES, PER_PASS_ROW_BYTES};
