//! Memory-mapped step-trace readers.
//!
//! A trace is a recording of the host callbacks, one JSON object per line:
//!
//! ```text
//! {"type":"step","track_id":1,"process":"compt","volume":"collimator",...}
//! {"type":"end_of_event","event_id":0}
//! {"type":"end_of_acquisition"}
//! ```

use crate::{Error, Result};
use memmap2::Mmap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use spectcrf_core::{StepEvent, StepHandler};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the entire file
/// into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            Error::MmapError(format!("{}: {e}", path.as_ref().display()))
        })?;
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One recorded host callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEntry {
    Step(StepEvent),
    EndOfEvent { event_id: i32 },
    EndOfAcquisition,
}

/// Totals of a replayed or inspected trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceSummary {
    pub steps: usize,
    pub events: usize,
    pub distinct_tracks: usize,
    pub has_end_of_acquisition: bool,
}

impl TraceSummary {
    /// Counts the entries of a parsed trace.
    #[must_use]
    pub fn of(entries: &[TraceEntry]) -> Self {
        let mut summary = Self::default();
        let mut tracks = HashSet::new();
        for entry in entries {
            match entry {
                TraceEntry::Step(step) => {
                    summary.steps += 1;
                    tracks.insert(step.track_id);
                }
                TraceEntry::EndOfEvent { .. } => summary.events += 1,
                TraceEntry::EndOfAcquisition => summary.has_end_of_acquisition = true,
            }
        }
        summary.distinct_tracks = tracks.len();
        summary
    }
}

/// A JSON-lines step trace with memory-mapped I/O.
pub struct MappedTraceReader {
    reader: MappedFileReader,
}

impl MappedTraceReader {
    /// Opens a trace file for reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        Ok(Self { reader })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Parses every entry of the trace, in file order.
    ///
    /// Lines are parsed in parallel; the result keeps the order of the file.
    ///
    /// # Errors
    /// Returns an error naming the first (lowest) line that fails to parse.
    pub fn read_entries(&self) -> Result<Vec<TraceEntry>> {
        parse_trace(self.reader.as_bytes())
    }
}

/// Parses a JSON-lines trace held in memory.
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
/// Returns an error naming the first (lowest) line that fails to parse.
pub fn parse_trace(data: &[u8]) -> Result<Vec<TraceEntry>> {
    let lines: Vec<(usize, &[u8])> = data
        .split(|&b| b == b'\n')
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_ascii()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with(b"#"))
        .collect();

    // collect() on an indexed parallel iterator keeps the input order
    let parsed: Vec<Result<TraceEntry>> = lines
        .par_iter()
        .map(|&(line, text)| {
            serde_json::from_slice(text).map_err(|source| Error::Json { line, source })
        })
        .collect();

    parsed.into_iter().collect()
}

/// Drives `handler` through the recorded callbacks, in order.
///
/// Replay stops at the first end-of-acquisition entry. A trace without one
/// still ends the acquisition once all entries are consumed.
///
/// # Errors
/// Returns an error if the handler fails to hand a record to its sink.
pub fn replay<H: StepHandler>(entries: &[TraceEntry], handler: &mut H) -> Result<TraceSummary> {
    replay_entries(entries, handler)?;
    handler.on_acquisition_end()?;
    let replayed = entries
        .iter()
        .position(|entry| matches!(entry, TraceEntry::EndOfAcquisition))
        .map_or(entries.len(), |index| index + 1);
    Ok(TraceSummary::of(&entries[..replayed]))
}

/// Like [`replay`] but leaves the acquisition open, so several traces can
/// feed one handler. Stops at an end-of-acquisition entry without passing
/// it on.
///
/// # Errors
/// Returns an error if the handler fails to hand a record to its sink.
pub fn replay_entries<H: StepHandler>(entries: &[TraceEntry], handler: &mut H) -> Result<()> {
    for (index, entry) in entries.iter().enumerate() {
        match entry {
            TraceEntry::Step(step) => handler.on_step(step),
            TraceEntry::EndOfEvent { event_id } => handler.on_event_end(*event_id)?,
            TraceEntry::EndOfAcquisition => {
                let rest = entries.len() - index - 1;
                if rest > 0 {
                    log::warn!("ignoring {rest} trace entries after end of acquisition");
                }
                break;
            }
        }
    }
    Ok(())
}
