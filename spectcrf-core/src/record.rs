//! Detection records: the unit of output.

use crate::frame::{OrientationFrame, Placement};
use crate::step::{ProcessKind, StepEvent};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Capacity of stored volume names, in bytes.
pub const MAX_VOLUME_NAME: usize = 32;

/// Volume name with a fixed byte capacity of [`MAX_VOLUME_NAME`].
///
/// Longer names are truncated on a UTF-8 character boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub struct VolumeName(String);

impl VolumeName {
    /// Stores `name`, truncating it to the fixed capacity.
    #[must_use]
    pub fn new(name: &str) -> Self {
        if name.len() <= MAX_VOLUME_NAME {
            return Self(name.to_string());
        }
        let mut end = MAX_VOLUME_NAME;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        log::warn!("volume name {name:?} truncated to {MAX_VOLUME_NAME} bytes");
        Self(name[..end].to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Zero-padded fixed-width byte form.
    #[must_use]
    pub fn to_padded_bytes(&self) -> [u8; MAX_VOLUME_NAME] {
        let mut out = [0u8; MAX_VOLUME_NAME];
        let bytes = self.0.as_bytes();
        out[..bytes.len()].copy_from_slice(bytes);
        out
    }
}

impl From<String> for VolumeName {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl From<VolumeName> for String {
    fn from(name: VolumeName) -> Self {
        name.0
    }
}

impl fmt::Display for VolumeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One photon branch's view of the detector during one crystal pass.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectionRecord {
    /// Assigned at finalization; `None` while the record is open.
    pub event_id: Option<i32>,

    // incoming photon on the detector, camera frame
    pub incoming_x_mm: f64,
    pub incoming_y_mm: f64,
    pub incoming_phi_rad: f64,
    pub incoming_theta_rad: f64,
    pub incoming_energy_mev: f64,

    pub photon_id: i32,
    pub crystal_pass: u32,

    /// Energy-weighted centroid of in-crystal interactions.
    pub detected_x_mm: f64,
    pub detected_y_mm: f64,
    /// Sum of in-crystal deposits; zero if the photon was not detected.
    pub detected_energy_mev: f64,

    // out-of-crystal scatters attributed to this pass
    pub compton_num: u32,
    pub rayleigh_num: u32,
    pub compton_volume: VolumeName,
    pub rayleigh_volume: VolumeName,

    pub primary_hit: bool,
    pub secondary_hit: bool,
}

impl DetectionRecord {
    /// Opens the first record of a history from the originating step's vertex.
    ///
    /// A step without vertex data leaves the incoming fields at zero.
    #[must_use]
    pub fn open_primary(step: &StepEvent, placement: &Placement, frame: &OrientationFrame) -> Self {
        let mut record = Self {
            photon_id: step.track_id,
            ..Self::default()
        };

        let Some(vertex) = step.vertex else {
            log::warn!(
                "first step of track {} carries no vertex; incoming fields left at zero",
                step.track_id
            );
            return record;
        };

        let position = placement.transform_point(vertex.position);
        let direction = placement.transform_axis(vertex.direction);
        let (x, y) = frame.to_local(position);
        let (phi, theta) = frame.to_spherical_local(direction);

        record.incoming_x_mm = x;
        record.incoming_y_mm = y;
        record.incoming_phi_rad = phi;
        record.incoming_theta_rad = theta;
        record.incoming_energy_mev = vertex.kinetic_energy_mev;
        record
    }

    /// Opens a record continuing `parent`'s incident photon.
    ///
    /// `track_id` of `None` keeps the parent's photon (a new pass); `Some`
    /// starts a secondary branch.
    #[must_use]
    pub fn open_child(parent: &Self, track_id: Option<i32>, pass_increment: u32) -> Self {
        Self {
            incoming_x_mm: parent.incoming_x_mm,
            incoming_y_mm: parent.incoming_y_mm,
            incoming_phi_rad: parent.incoming_phi_rad,
            incoming_theta_rad: parent.incoming_theta_rad,
            incoming_energy_mev: parent.incoming_energy_mev,
            photon_id: track_id.unwrap_or(parent.photon_id),
            crystal_pass: parent.crystal_pass + pass_increment,
            ..Self::default()
        }
    }

    /// Folds an in-crystal deposit into the running energy-weighted centroid.
    pub fn accumulate_in_crystal(&mut self, energy_mev: f64, local_xy: (f64, f64)) {
        let total = self.detected_energy_mev + energy_mev;
        if total <= 0.0 {
            // zero-energy deposit into an empty record: nothing to weight
            return;
        }
        let (x, y) = local_xy;
        self.detected_x_mm = (self.detected_x_mm * self.detected_energy_mev + x * energy_mev) / total;
        self.detected_y_mm = (self.detected_y_mm * self.detected_energy_mev + y * energy_mev) / total;
        self.detected_energy_mev = total;
    }

    /// Counts an out-of-crystal scatter; only Compton and Rayleigh are counted.
    pub fn register_out_of_crystal_scatter(&mut self, process: ProcessKind, volume: &str) {
        match process {
            ProcessKind::Compton => {
                self.compton_num += 1;
                self.compton_volume = VolumeName::new(volume);
            }
            ProcessKind::Rayleigh => {
                self.rayleigh_num += 1;
                self.rayleigh_volume = VolumeName::new(volume);
            }
            ProcessKind::PhotoElectric | ProcessKind::Other => {}
        }
    }

    /// True if any energy was detected in the crystal.
    #[inline]
    #[must_use]
    pub fn is_detected(&self) -> bool {
        self.detected_energy_mev > 0.0
    }

    /// Same incident-photon kinematics as `other`.
    #[must_use]
    pub fn same_incoming(&self, other: &Self) -> bool {
        self.incoming_x_mm == other.incoming_x_mm
            && self.incoming_y_mm == other.incoming_y_mm
            && self.incoming_phi_rad == other.incoming_phi_rad
            && self.incoming_theta_rad == other.incoming_theta_rad
            && self.incoming_energy_mev == other.incoming_energy_mev
    }
}

impl fmt::Display for DetectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(event_id=")?;
        match self.event_id {
            Some(id) => write!(f, "{id}")?,
            None => write!(f, "-")?,
        }
        write!(
            f,
            ",in_x_mm={},in_y_mm={},in_phi_rad={},in_theta_rad={},in_energy_MeV={}",
            self.incoming_x_mm,
            self.incoming_y_mm,
            self.incoming_phi_rad,
            self.incoming_theta_rad,
            self.incoming_energy_mev
        )?;
        write!(
            f,
            ",photon_id={},crystal_pass={},detected_x_mm={},detected_y_mm={},detected_energy_MeV={}",
            self.photon_id,
            self.crystal_pass,
            self.detected_x_mm,
            self.detected_y_mm,
            self.detected_energy_mev
        )?;
        write!(
            f,
            ",compton_num={},rayleigh_num={},compton_volume={},rayleigh_volume={})",
            self.compton_num, self.rayleigh_num, self.compton_volume, self.rayleigh_volume
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::frame::Vec3;
    use crate::step::TrackVertex;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_centroid_two_deposits() {
        let mut record = DetectionRecord::default();
        record.accumulate_in_crystal(0.1, (10.0, -2.0));
        record.accumulate_in_crystal(0.3, (2.0, 6.0));

        // (10*0.1 + 2*0.3) / 0.4 = 4.0 ; (-2*0.1 + 6*0.3) / 0.4 = 4.0
        assert_abs_diff_eq!(record.detected_x_mm, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(record.detected_y_mm, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(record.detected_energy_mev, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_centroid_is_order_independent() {
        let deposits = [(0.05, (1.0, 2.0)), (0.08, (-3.0, 4.5)), (0.01, (7.0, 7.0))];

        let mut forward = DetectionRecord::default();
        for (e, xy) in deposits {
            forward.accumulate_in_crystal(e, xy);
        }
        let mut backward = DetectionRecord::default();
        for (e, xy) in deposits.into_iter().rev() {
            backward.accumulate_in_crystal(e, xy);
        }

        assert_abs_diff_eq!(forward.detected_x_mm, backward.detected_x_mm, epsilon = 1e-9);
        assert_abs_diff_eq!(forward.detected_y_mm, backward.detected_y_mm, epsilon = 1e-9);
        assert_abs_diff_eq!(
            forward.detected_energy_mev,
            backward.detected_energy_mev,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_zero_deposit_keeps_centroid_finite() {
        let mut record = DetectionRecord::default();
        record.accumulate_in_crystal(0.0, (5.0, 5.0));
        assert_eq!(record.detected_energy_mev, 0.0);
        assert!(!record.detected_x_mm.is_nan());
        assert!(!record.is_detected());
    }

    #[test]
    fn test_scatter_registration() {
        let mut record = DetectionRecord::default();
        record.register_out_of_crystal_scatter(ProcessKind::Compton, "collimator");
        record.register_out_of_crystal_scatter(ProcessKind::Compton, "shielding");
        record.register_out_of_crystal_scatter(ProcessKind::Rayleigh, "collimator");
        record.register_out_of_crystal_scatter(ProcessKind::PhotoElectric, "collimator");
        record.register_out_of_crystal_scatter(ProcessKind::Other, "collimator");

        assert_eq!(record.compton_num, 2);
        assert_eq!(record.rayleigh_num, 1);
        assert_eq!(record.compton_volume.as_str(), "shielding");
        assert_eq!(record.rayleigh_volume.as_str(), "collimator");
    }

    #[test]
    fn test_open_primary_from_vertex() {
        let step = StepEvent::gamma(1, "compt", "collimator", Vec3::default()).with_vertex(
            TrackVertex {
                position: Vec3::new(12.0, -7.0, -300.0),
                direction: Vec3::new(0.0, 0.0, 1.0),
                kinetic_energy_mev: 0.1405,
            },
        );
        let record = DetectionRecord::open_primary(
            &step,
            &Placement::identity(),
            &OrientationFrame::default(),
        );

        assert_eq!(record.incoming_x_mm, 12.0);
        assert_eq!(record.incoming_y_mm, -7.0);
        assert_abs_diff_eq!(record.incoming_theta_rad, 0.0, epsilon = 1e-12);
        assert_eq!(record.incoming_energy_mev, 0.1405);
        assert_eq!(record.photon_id, 1);
        assert_eq!(record.crystal_pass, 0);
        assert!(record.event_id.is_none());
    }

    #[test]
    fn test_open_child_inherits_incoming() {
        let mut parent = DetectionRecord {
            incoming_x_mm: 1.0,
            incoming_y_mm: 2.0,
            incoming_phi_rad: 0.3,
            incoming_theta_rad: 0.4,
            incoming_energy_mev: 0.14,
            photon_id: 1,
            crystal_pass: 2,
            ..DetectionRecord::default()
        };
        parent.accumulate_in_crystal(0.05, (3.0, 3.0));
        parent.register_out_of_crystal_scatter(ProcessKind::Compton, "collimator");

        let pass = DetectionRecord::open_child(&parent, None, 1);
        assert!(pass.same_incoming(&parent));
        assert_eq!(pass.photon_id, 1);
        assert_eq!(pass.crystal_pass, 3);
        assert_eq!(pass.detected_energy_mev, 0.0);
        assert_eq!(pass.compton_num, 0);

        let branch = DetectionRecord::open_child(&parent, Some(4), 0);
        assert!(branch.same_incoming(&parent));
        assert_eq!(branch.photon_id, 4);
        assert_eq!(branch.crystal_pass, 2);
    }

    #[test]
    fn test_volume_name_truncation() {
        let long = "a".repeat(40);
        let name = VolumeName::new(&long);
        assert_eq!(name.as_str().len(), MAX_VOLUME_NAME);

        // multi-byte character straddling the limit
        let tricky = format!("{}é", "b".repeat(31));
        let name = VolumeName::new(&tricky);
        assert_eq!(name.as_str(), "b".repeat(31));

        let padded = VolumeName::new("crystal").to_padded_bytes();
        assert_eq!(&padded[..7], b"crystal");
        assert!(padded[7..].iter().all(|&b| b == 0));
    }
}
