//! Structure of Arrays (`SoA`) buffer for finalized records.
//!
//! Output writers consume records column by column, so the sink adapters
//! buffer them in a `RecordBatch` rather than a `Vec<DetectionRecord>`.

use crate::record::{DetectionRecord, VolumeName};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A batch of finalized records stored in Structure of Arrays (`SoA`) format.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecordBatch {
    pub event_id: Vec<i32>,
    pub in_x_mm: Vec<f64>,
    pub in_y_mm: Vec<f64>,
    pub in_phi_rad: Vec<f64>,
    pub in_theta_rad: Vec<f64>,
    pub in_energy_mev: Vec<f64>,
    pub photon_id: Vec<i32>,
    pub crystal_pass: Vec<u32>,
    pub detected_x_mm: Vec<f64>,
    pub detected_y_mm: Vec<f64>,
    pub detected_energy_mev: Vec<f64>,
    pub compton_num: Vec<u32>,
    pub rayleigh_num: Vec<u32>,
    pub compton_volume: Vec<VolumeName>,
    pub rayleigh_volume: Vec<VolumeName>,
    pub primary_hit: Vec<bool>,
    pub secondary_hit: Vec<bool>,
}

impl RecordBatch {
    /// Creates a new empty batch with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            event_id: Vec::with_capacity(capacity),
            in_x_mm: Vec::with_capacity(capacity),
            in_y_mm: Vec::with_capacity(capacity),
            in_phi_rad: Vec::with_capacity(capacity),
            in_theta_rad: Vec::with_capacity(capacity),
            in_energy_mev: Vec::with_capacity(capacity),
            photon_id: Vec::with_capacity(capacity),
            crystal_pass: Vec::with_capacity(capacity),
            detected_x_mm: Vec::with_capacity(capacity),
            detected_y_mm: Vec::with_capacity(capacity),
            detected_energy_mev: Vec::with_capacity(capacity),
            compton_num: Vec::with_capacity(capacity),
            rayleigh_num: Vec::with_capacity(capacity),
            compton_volume: Vec::with_capacity(capacity),
            rayleigh_volume: Vec::with_capacity(capacity),
            primary_hit: Vec::with_capacity(capacity),
            secondary_hit: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.event_id.len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.event_id.is_empty()
    }

    /// Clears all columns.
    pub fn clear(&mut self) {
        self.event_id.clear();
        self.in_x_mm.clear();
        self.in_y_mm.clear();
        self.in_phi_rad.clear();
        self.in_theta_rad.clear();
        self.in_energy_mev.clear();
        self.photon_id.clear();
        self.crystal_pass.clear();
        self.detected_x_mm.clear();
        self.detected_y_mm.clear();
        self.detected_energy_mev.clear();
        self.compton_num.clear();
        self.rayleigh_num.clear();
        self.compton_volume.clear();
        self.rayleigh_volume.clear();
        self.primary_hit.clear();
        self.secondary_hit.clear();
    }

    /// Pushes a finalized record. Records without an event id are stored with `-1`.
    pub fn push(&mut self, record: &DetectionRecord) {
        self.event_id.push(record.event_id.unwrap_or(-1));
        self.in_x_mm.push(record.incoming_x_mm);
        self.in_y_mm.push(record.incoming_y_mm);
        self.in_phi_rad.push(record.incoming_phi_rad);
        self.in_theta_rad.push(record.incoming_theta_rad);
        self.in_energy_mev.push(record.incoming_energy_mev);
        self.photon_id.push(record.photon_id);
        self.crystal_pass.push(record.crystal_pass);
        self.detected_x_mm.push(record.detected_x_mm);
        self.detected_y_mm.push(record.detected_y_mm);
        self.detected_energy_mev.push(record.detected_energy_mev);
        self.compton_num.push(record.compton_num);
        self.rayleigh_num.push(record.rayleigh_num);
        self.compton_volume.push(record.compton_volume.clone());
        self.rayleigh_volume.push(record.rayleigh_volume.clone());
        self.primary_hit.push(record.primary_hit);
        self.secondary_hit.push(record.secondary_hit);
    }

    /// Rebuilds the record at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<DetectionRecord> {
        if index >= self.len() {
            return None;
        }
        Some(DetectionRecord {
            event_id: Some(self.event_id[index]),
            incoming_x_mm: self.in_x_mm[index],
            incoming_y_mm: self.in_y_mm[index],
            incoming_phi_rad: self.in_phi_rad[index],
            incoming_theta_rad: self.in_theta_rad[index],
            incoming_energy_mev: self.in_energy_mev[index],
            photon_id: self.photon_id[index],
            crystal_pass: self.crystal_pass[index],
            detected_x_mm: self.detected_x_mm[index],
            detected_y_mm: self.detected_y_mm[index],
            detected_energy_mev: self.detected_energy_mev[index],
            compton_num: self.compton_num[index],
            rayleigh_num: self.rayleigh_num[index],
            compton_volume: self.compton_volume[index].clone(),
            rayleigh_volume: self.rayleigh_volume[index].clone(),
            primary_hit: self.primary_hit[index],
            secondary_hit: self.secondary_hit[index],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::ProcessKind;

    #[test]
    fn test_record_batch_operations() {
        let mut record = DetectionRecord {
            event_id: Some(7),
            photon_id: 3,
            crystal_pass: 1,
            ..DetectionRecord::default()
        };
        record.register_out_of_crystal_scatter(ProcessKind::Compton, "collimator");

        let mut batch = RecordBatch::with_capacity(4);
        assert!(batch.is_empty());
        batch.push(&record);
        batch.push(&DetectionRecord::default());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.event_id, vec![7, -1]);

        assert_eq!(batch.get(0), Some(record));
        assert!(batch.get(2).is_none());

        assert_eq!(batch.compton_volume[0].as_str(), "collimator");

        batch.clear();
        assert!(batch.is_empty());
    }
}
