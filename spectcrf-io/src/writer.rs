//! File writers for detection records.

use crate::Result;
use spectcrf_core::{RecordBatch, RecordMode, MAX_VOLUME_NAME};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Bytes per binary row in [`RecordMode::PerPass`] layout.
pub const PER_PASS_ROW_BYTES: usize = 4 + 5 * 8 + 4 + 4 + 3 * 8 + 4 + 4 + 2 * MAX_VOLUME_NAME;

/// Bytes per binary row in [`RecordMode::PerEvent`] layout.
pub const PER_EVENT_ROW_BYTES: usize = 4 + 5 * 8 + 1 + 1 + 3 * 8 + 4 + 4 + 2 * MAX_VOLUME_NAME;

/// Writer for record output files.
///
/// Column order follows [`RecordMode::columns`].
pub struct DataFileWriter {
    writer: BufWriter<File>,
    mode: RecordMode,
}

impl DataFileWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, mode: RecordMode) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer, mode })
    }

    /// Writes the CSV header row.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn write_csv_header(&mut self) -> Result<()> {
        writeln!(self.writer, "{}", self.mode.columns().join(","))?;
        Ok(())
    }

    /// Writes records as CSV rows.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn write_records_csv(&mut self, batch: &RecordBatch) -> Result<()> {
        for i in 0..batch.len() {
            write!(
                self.writer,
                "{},{},{},{},{},{},",
                batch.event_id[i],
                batch.in_x_mm[i],
                batch.in_y_mm[i],
                batch.in_phi_rad[i],
                batch.in_theta_rad[i],
                batch.in_energy_mev[i],
            )?;
            match self.mode {
                RecordMode::PerPass => write!(
                    self.writer,
                    "{},{},",
                    batch.photon_id[i], batch.crystal_pass[i]
                )?,
                RecordMode::PerEvent => write!(
                    self.writer,
                    "{},{},",
                    u8::from(batch.primary_hit[i]),
                    u8::from(batch.secondary_hit[i])
                )?,
            }
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{}",
                batch.detected_x_mm[i],
                batch.detected_y_mm[i],
                batch.detected_energy_mev[i],
                batch.compton_num[i],
                batch.rayleigh_num[i],
                csv_field(batch.compton_volume[i].as_str()),
                csv_field(batch.rayleigh_volume[i].as_str()),
            )?;
        }
        Ok(())
    }

    /// Writes records as binary data.
    ///
    /// Little-endian rows: i32 event id, five f64 incoming values, then
    /// i32 photon id + u32 pass (per pass) or u8 primary + u8 secondary hit
    /// (per event), three f64 detected values, two u32 scatter counts and
    /// two zero-padded 32-byte volume names.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn write_records_binary(&mut self, batch: &RecordBatch) -> Result<()> {
        for i in 0..batch.len() {
            self.writer.write_all(&batch.event_id[i].to_le_bytes())?;
            self.writer.write_all(&batch.in_x_mm[i].to_le_bytes())?;
            self.writer.write_all(&batch.in_y_mm[i].to_le_bytes())?;
            self.writer.write_all(&batch.in_phi_rad[i].to_le_bytes())?;
            self.writer.write_all(&batch.in_theta_rad[i].to_le_bytes())?;
            self.writer.write_all(&batch.in_energy_mev[i].to_le_bytes())?;
            match self.mode {
                RecordMode::PerPass => {
                    self.writer.write_all(&batch.photon_id[i].to_le_bytes())?;
                    self.writer.write_all(&batch.crystal_pass[i].to_le_bytes())?;
                }
                RecordMode::PerEvent => {
                    self.writer.write_all(&[u8::from(batch.primary_hit[i])])?;
                    self.writer.write_all(&[u8::from(batch.secondary_hit[i])])?;
                }
            }
            self.writer.write_all(&batch.detected_x_mm[i].to_le_bytes())?;
            self.writer.write_all(&batch.detected_y_mm[i].to_le_bytes())?;
            self.writer
                .write_all(&batch.detected_energy_mev[i].to_le_bytes())?;
            self.writer.write_all(&batch.compton_num[i].to_le_bytes())?;
            self.writer.write_all(&batch.rayleigh_num[i].to_le_bytes())?;
            self.writer
                .write_all(&batch.compton_volume[i].to_padded_bytes())?;
            self.writer
                .write_all(&batch.rayleigh_volume[i].to_padded_bytes())?;
        }
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Quotes a text field when it holds a delimiter, quote or line break
/// (RFC 4180); embedded quotes are doubled.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use spectcrf_core::{DetectionRecord, VolumeName};
    use tempfile::NamedTempFile;

    fn batch() -> RecordBatch {
        let mut batch = RecordBatch::with_capacity(2);
        batch.push(&DetectionRecord {
            event_id: Some(3),
            incoming_x_mm: 1.5,
            incoming_energy_mev: 0.14,
            photon_id: 1,
            detected_x_mm: -2.5,
            detected_energy_mev: 0.1,
            compton_num: 1,
            compton_volume: VolumeName::new("collimator"),
            primary_hit: true,
            ..DetectionRecord::default()
        });
        batch.push(&DetectionRecord {
            event_id: Some(3),
            photon_id: 1,
            crystal_pass: 1,
            ..DetectionRecord::default()
        });
        batch
    }

    #[test]
    fn test_write_records_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = DataFileWriter::create(file.path(), RecordMode::PerPass).unwrap();
        writer.write_csv_header().unwrap();
        writer.write_records_csv(&batch()).unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("event_id,in_x_mm,in_y_mm"));
        assert!(lines[0].contains("photon_id,crystal_pass"));
        assert_eq!(lines[1], "3,1.5,0,0,0,0.14,1,0,-2.5,0,0.1,1,0,collimator,");
        assert_eq!(lines[2], "3,0,0,0,0,0,1,1,0,0,0,0,0,,");
    }

    #[test]
    fn test_write_records_csv_per_event() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = DataFileWriter::create(file.path(), RecordMode::PerEvent).unwrap();
        writer.write_csv_header().unwrap();
        writer.write_records_csv(&batch()).unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].contains("primary_hit,secondary_hit"));
        assert!(!lines[0].contains("photon_id"));
        assert_eq!(lines[1], "3,1.5,0,0,0,0.14,1,0,-2.5,0,0.1,1,0,collimator,");
    }

    #[test]
    fn test_csv_quotes_volume_names() {
        let mut batch = RecordBatch::with_capacity(1);
        batch.push(&DetectionRecord {
            event_id: Some(0),
            compton_num: 1,
            compton_volume: VolumeName::new("septa,row1"),
            rayleigh_volume: VolumeName::new("say \"hi\""),
            ..DetectionRecord::default()
        });

        let file = NamedTempFile::new().unwrap();
        let mut writer = DataFileWriter::create(file.path(), RecordMode::PerPass).unwrap();
        writer.write_csv_header().unwrap();
        writer.write_records_csv(&batch).unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[1],
            r#"0,0,0,0,0,0,0,0,0,0,0,1,0,"septa,row1","say ""hi""""#
        );
        // commas inside quotes do not split columns
        let delimiters: usize = lines[1]
            .split('"')
            .step_by(2)
            .map(|part| part.matches(',').count())
            .sum();
        assert_eq!(delimiters + 1, RecordMode::PerPass.columns().len());
    }

    #[test]
    fn test_csv_field() {
        assert!(matches!(csv_field("collimator"), Cow::Borrowed("collimator")));
        assert_eq!(csv_field("a\nb"), "\"a\nb\"");
        assert_eq!(csv_field(""), "");
    }

    #[test]
    fn test_write_records_binary() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = DataFileWriter::create(file.path(), RecordMode::PerPass).unwrap();
        writer.write_records_binary(&batch()).unwrap();
        writer.flush().unwrap();

        let data = std::fs::read(file.path()).unwrap();
        assert_eq!(data.len(), 2 * PER_PASS_ROW_BYTES);
        assert_eq!(i32::from_le_bytes(data[0..4].try_into().unwrap()), 3);
        assert_eq!(f64::from_le_bytes(data[4..12].try_into().unwrap()), 1.5);
        let name_start = PER_PASS_ROW_BYTES - 2 * MAX_VOLUME_NAME;
        assert_eq!(&data[name_start..name_start + 10], b"collimator");
        assert_eq!(data[name_start + 10], 0);
    }

    #[test]
    fn test_binary_row_sizes() {
        assert_eq!(PER_PASS_ROW_BYTES, 148);
        assert_eq!(PER_EVENT_ROW_BYTES, 142);
    }
}
