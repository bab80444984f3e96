//! HDF5 record output (`CrfEventStats` group).
//!
//! Every output column becomes one extendable, chunked 1-D dataset of the
//! group. Volume names are stored as fixed 32-byte strings.

use crate::{Error, Result};
use hdf5::types::{FixedUnicode, H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ndarray::{s, ArrayView1};
use spectcrf_core::{DetectionRecord, RecordBatch, RecordMode, RecordSink, VolumeName};
use std::path::Path;
use std::str::FromStr;

/// Name of the group holding the record columns.
pub const GROUP_NAME: &str = "CrfEventStats";

type StoredName = FixedUnicode<32>;

/// Record write configuration.
#[derive(Clone, Debug)]
pub struct RecordWriteOptions {
    pub mode: RecordMode,
    pub chunk_records: usize,
    pub compression: Option<u8>,
    pub shuffle: bool,
}

impl RecordWriteOptions {
    /// Default chunking and compression for `mode`.
    #[must_use]
    pub fn new(mode: RecordMode) -> Self {
        Self {
            mode,
            chunk_records: crate::sink::DEFAULT_CHUNK_RECORDS,
            compression: Some(4),
            shuffle: true,
        }
    }
}

/// Records read back from an HDF5 file.
#[derive(Clone, Debug)]
pub struct RecordData {
    pub mode: RecordMode,
    pub batch: RecordBatch,
}

/// Streaming record sink writing one dataset per column.
pub struct Hdf5RecordSink {
    file: File,
    writer: RecordColumnWriter,
    buffer: RecordBatch,
    chunk_records: usize,
    closed: bool,
}

impl Hdf5RecordSink {
    /// Creates the file and its empty datasets.
    ///
    /// # Errors
    /// Returns an error if the HDF5 file or datasets cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, options: RecordWriteOptions) -> Result<Self> {
        let chunk_records = options.chunk_records.max(1);
        let file = File::create(path)?;
        set_attr_str_file(&file, "spectcrf_format_version", "0.1")?;

        let group = file.create_group(GROUP_NAME)?;
        set_attr_str_group(&group, "record_mode", mode_name(options.mode))?;

        let writer = RecordColumnWriter::new(&group, &options, chunk_records)?;
        Ok(Self {
            file,
            writer,
            buffer: RecordBatch::with_capacity(chunk_records),
            chunk_records,
            closed: false,
        })
    }

    /// Appends a whole batch.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer.append_batch(batch)
    }

    /// Records written to the file so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.writer.record_count
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.writer.append_batch(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }
}

impl RecordSink for Hdf5RecordSink {
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
        self.file.flush().map_err(Error::from)?;
        self.closed = true;
        Ok(())
    }
}

/// Writes all `batches` to a new file.
///
/// # Errors
/// Returns an error if HDF5 I/O fails.
pub fn write_records_hdf5<'a, P, I>(path: P, batches: I, options: RecordWriteOptions) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a RecordBatch>,
{
    let mut sink = Hdf5RecordSink::create(path, options)?;
    for batch in batches {
        sink.write_batch(batch)?;
    }
    Ok(())
}

/// Reads records back from a file written by [`Hdf5RecordSink`].
///
/// Columns absent from the file's layout are filled with defaults.
///
/// # Errors
/// Returns an error if HDF5 I/O fails or the layout is not recognized.
pub fn read_records_hdf5<P: AsRef<Path>>(path: P) -> Result<RecordData> {
    let file = File::open(path)?;
    let group = file.group(GROUP_NAME)?;
    let mode = match read_attr_string(&group, "record_mode")?.as_str() {
        "per_pass" => RecordMode::PerPass,
        "per_event" => RecordMode::PerEvent,
        other => {
            return Err(Error::InvalidFormat(format!("unknown record mode {other:?}")));
        }
    };

    let event_id = read_dataset_vec::<i32>(&group, "event_id")?;
    let n = event_id.len();
    let mut batch = RecordBatch {
        event_id,
        in_x_mm: read_dataset_vec(&group, "in_x_mm")?,
        in_y_mm: read_dataset_vec(&group, "in_y_mm")?,
        in_phi_rad: read_dataset_vec(&group, "in_phi_rad")?,
        in_theta_rad: read_dataset_vec(&group, "in_theta_rad")?,
        in_energy_mev: read_dataset_vec(&group, "in_energy_MeV")?,
        detected_x_mm: read_dataset_vec(&group, "detected_x_mm")?,
        detected_y_mm: read_dataset_vec(&group, "detected_y_mm")?,
        detected_energy_mev: read_dataset_vec(&group, "detected_energy_MeV")?,
        compton_num: read_dataset_vec(&group, "compton_num")?,
        rayleigh_num: read_dataset_vec(&group, "rayleigh_num")?,
        compton_volume: read_names(&group, "compton_volume")?,
        rayleigh_volume: read_names(&group, "rayleigh_volume")?,
        ..RecordBatch::default()
    };
    match mode {
        RecordMode::PerPass => {
            batch.photon_id = read_dataset_vec(&group, "photon_id")?;
            batch.crystal_pass = read_dataset_vec(&group, "crystal_pass")?;
            batch.primary_hit = vec![false; n];
            batch.secondary_hit = vec![false; n];
        }
        RecordMode::PerEvent => {
            batch.photon_id = vec![0; n];
            batch.crystal_pass = vec![0; n];
            batch.primary_hit = read_flags(&group, "primary_hit")?;
            batch.secondary_hit = read_flags(&group, "secondary_hit")?;
        }
    }

    Ok(RecordData { mode, batch })
}

struct RecordColumnWriter {
    mode: RecordMode,
    event_id: Dataset,
    in_x: Dataset,
    in_y: Dataset,
    in_phi: Dataset,
    in_theta: Dataset,
    in_energy: Dataset,
    // photon_id + crystal_pass, or primary_hit + secondary_hit
    branch_a: Dataset,
    branch_b: Dataset,
    detected_x: Dataset,
    detected_y: Dataset,
    detected_energy: Dataset,
    compton_num: Dataset,
    rayleigh_num: Dataset,
    compton_volume: Dataset,
    rayleigh_volume: Dataset,
    record_count: usize,
}

impl RecordColumnWriter {
    fn new(group: &Group, options: &RecordWriteOptions, chunk: usize) -> Result<Self> {
        let create = |name: &str, units: Option<&str>| -> Result<Dataset> {
            let ds = create_extendable_dataset::<f64>(group, name, chunk, options)?;
            if let Some(units) = units {
                set_dataset_units(&ds, units)?;
            }
            Ok(ds)
        };

        let event_id = create_extendable_dataset::<i32>(group, "event_id", chunk, options)?;
        set_dataset_units(&event_id, "id")?;

        let (branch_a, branch_b) = match options.mode {
            RecordMode::PerPass => {
                let photon_id =
                    create_extendable_dataset::<i32>(group, "photon_id", chunk, options)?;
                set_dataset_units(&photon_id, "id")?;
                let crystal_pass =
                    create_extendable_dataset::<u32>(group, "crystal_pass", chunk, options)?;
                (photon_id, crystal_pass)
            }
            RecordMode::PerEvent => (
                create_extendable_dataset::<u8>(group, "primary_hit", chunk, options)?,
                create_extendable_dataset::<u8>(group, "secondary_hit", chunk, options)?,
            ),
        };

        Ok(Self {
            mode: options.mode,
            event_id,
            in_x: create("in_x_mm", Some("mm"))?,
            in_y: create("in_y_mm", Some("mm"))?,
            in_phi: create("in_phi_rad", Some("rad"))?,
            in_theta: create("in_theta_rad", Some("rad"))?,
            in_energy: create("in_energy_MeV", Some("MeV"))?,
            branch_a,
            branch_b,
            detected_x: create("detected_x_mm", Some("mm"))?,
            detected_y: create("detected_y_mm", Some("mm"))?,
            detected_energy: create("detected_energy_MeV", Some("MeV"))?,
            compton_num: create_extendable_dataset::<u32>(group, "compton_num", chunk, options)?,
            rayleigh_num: create_extendable_dataset::<u32>(group, "rayleigh_num", chunk, options)?,
            compton_volume: create_extendable_dataset::<StoredName>(
                group,
                "compton_volume",
                chunk,
                options,
            )?,
            rayleigh_volume: create_extendable_dataset::<StoredName>(
                group,
                "rayleigh_volume",
                chunk,
                options,
            )?,
            record_count: 0,
        })
    }

    fn append_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let count = batch.len();
        if count == 0 {
            return Ok(());
        }
        let start = self.record_count;

        append_slice(&self.event_id, start, &batch.event_id)?;
        append_slice(&self.in_x, start, &batch.in_x_mm)?;
        append_slice(&self.in_y, start, &batch.in_y_mm)?;
        append_slice(&self.in_phi, start, &batch.in_phi_rad)?;
        append_slice(&self.in_theta, start, &batch.in_theta_rad)?;
        append_slice(&self.in_energy, start, &batch.in_energy_mev)?;
        match self.mode {
            RecordMode::PerPass => {
                append_slice(&self.branch_a, start, &batch.photon_id)?;
                append_slice(&self.branch_b, start, &batch.crystal_pass)?;
            }
            RecordMode::PerEvent => {
                append_slice(&self.branch_a, start, &to_flags(&batch.primary_hit))?;
                append_slice(&self.branch_b, start, &to_flags(&batch.secondary_hit))?;
            }
        }
        append_slice(&self.detected_x, start, &batch.detected_x_mm)?;
        append_slice(&self.detected_y, start, &batch.detected_y_mm)?;
        append_slice(&self.detected_energy, start, &batch.detected_energy_mev)?;
        append_slice(&self.compton_num, start, &batch.compton_num)?;
        append_slice(&self.rayleigh_num, start, &batch.rayleigh_num)?;
        append_slice(&self.compton_volume, start, &to_stored_names(&batch.compton_volume)?)?;
        append_slice(&self.rayleigh_volume, start, &to_stored_names(&batch.rayleigh_volume)?)?;

        self.record_count = start + count;
        Ok(())
    }
}

fn mode_name(mode: RecordMode) -> &'static str {
    match mode {
        RecordMode::PerPass => "per_pass",
        RecordMode::PerEvent => "per_event",
    }
}

fn to_flags(values: &[bool]) -> Vec<u8> {
    values.iter().map(|&v| u8::from(v)).collect()
}

fn to_stored_names(names: &[VolumeName]) -> Result<Vec<StoredName>> {
    names
        .iter()
        .map(|name| {
            StoredName::from_str(name.as_str())
                .map_err(|e| Error::InvalidFormat(format!("volume name {name:?}: {e}")))
        })
        .collect()
}

fn read_flags(group: &Group, name: &str) -> Result<Vec<bool>> {
    Ok(read_dataset_vec::<u8>(group, name)?
        .into_iter()
        .map(|v| v != 0)
        .collect())
}

fn read_names(group: &Group, name: &str) -> Result<Vec<VolumeName>> {
    Ok(read_dataset_vec::<StoredName>(group, name)?
        .iter()
        .map(|s| VolumeName::new(s.as_str()))
        .collect())
}

fn create_extendable_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    chunk_records: usize,
    options: &RecordWriteOptions,
) -> Result<Dataset> {
    let mut builder = group
        .new_dataset::<T>()
        .shape((0..,))
        .chunk((chunk_records,));

    if let Some(level) = options.compression {
        builder = builder.deflate(level);
    }

    if options.shuffle {
        builder = builder.shuffle();
    }

    Ok(builder.create(name)?)
}

fn append_slice<T: H5Type>(dataset: &Dataset, offset: usize, data: &[T]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let new_len = offset + data.len();
    dataset.resize((new_len,))?;
    let view = ArrayView1::from(data);
    dataset.write_slice(view, s![offset..new_len])?;
    Ok(())
}

fn set_dataset_units(dataset: &Dataset, units: &str) -> Result<()> {
    let value = to_var_len_unicode(units)?;
    dataset
        .new_attr::<VarLenUnicode>()
        .create("units")?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_group(group: &Group, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn read_attr_string(group: &Group, name: &str) -> Result<String> {
    let value: VarLenUnicode = group.attr(name)?.read_scalar()?;
    Ok(value.to_string())
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use tempfile::NamedTempFile;

    fn sample(event_id: i32, pass: u32) -> DetectionRecord {
        DetectionRecord {
            event_id: Some(event_id),
            incoming_x_mm: 12.0,
            incoming_energy_mev: 0.1405,
            photon_id: 1,
            crystal_pass: pass,
            detected_energy_mev: 0.05,
            rayleigh_num: 2,
            rayleigh_volume: VolumeName::new("collimator_septa"),
            secondary_hit: true,
            ..DetectionRecord::default()
        }
    }

    fn options(mode: RecordMode) -> RecordWriteOptions {
        RecordWriteOptions {
            mode,
            chunk_records: 2,
            compression: None,
            shuffle: false,
        }
    }

    #[test]
    fn test_hdf5_record_roundtrip() {
        let mut batch = RecordBatch::default();
        batch.push(&sample(0, 0));
        batch.push(&sample(0, 1));
        batch.push(&sample(4, 0));

        let file = NamedTempFile::new().unwrap();
        write_records_hdf5(file.path(), [&batch], options(RecordMode::PerPass)).unwrap();
        let data = read_records_hdf5(file.path()).unwrap();

        assert_eq!(data.mode, RecordMode::PerPass);
        assert_eq!(data.batch.event_id, vec![0, 0, 4]);
        assert_eq!(data.batch.crystal_pass, vec![0, 1, 0]);
        assert_eq!(data.batch.in_x_mm, vec![12.0; 3]);
        assert_eq!(data.batch.rayleigh_volume[1].as_str(), "collimator_septa");
        assert_eq!(data.batch.compton_volume[1].as_str(), "");
    }

    #[test]
    fn test_hdf5_sink_per_event_layout() {
        let file = NamedTempFile::new().unwrap();
        let mut sink = Hdf5RecordSink::create(file.path(), options(RecordMode::PerEvent)).unwrap();
        for event_id in 0..5 {
            sink.write_record(&sample(event_id, 0)).unwrap();
        }
        sink.close().unwrap();
        assert_eq!(sink.written(), 5);
        drop(sink);

        let data = read_records_hdf5(file.path()).unwrap();
        assert_eq!(data.mode, RecordMode::PerEvent);
        assert_eq!(data.batch.len(), 5);
        assert_eq!(data.batch.secondary_hit, vec![true; 5]);
        assert_eq!(data.batch.primary_hit, vec![false; 5]);
        assert_eq!(data.batch.get(4).unwrap().event_id, Some(4));
    }

    #[test]
    fn test_hdf5_units_attribute() {
        let file = NamedTempFile::new().unwrap();
        write_records_hdf5(
            file.path(),
            std::iter::empty::<&RecordBatch>(),
            options(RecordMode::PerPass),
        )
        .unwrap();

        let h5 = File::open(file.path()).unwrap();
        let group = h5.group(GROUP_NAME).unwrap();
        let units: VarLenUnicode = group
            .dataset("detected_energy_MeV")
            .unwrap()
            .attr("units")
            .unwrap()
            .read_scalar()
            .unwrap();
        assert_eq!(units.as_str(), "MeV");
    }
}
