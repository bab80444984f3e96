//! Actor configuration surface and construction-time validation.

use crate::error::ConfigError;
use crate::frame::{OrientationFrame, Placement, Vec3};
use crate::volume::{VolumeTree, WORLD};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a particle history is reduced into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RecordMode {
    /// One record per photon branch per crystal pass.
    #[default]
    PerPass,
    /// A single record per history (`max_records_per_event = 1`), with
    /// primary/secondary hit flags in place of photon id and pass.
    PerEvent,
}

impl RecordMode {
    /// Output column names for this mode, in order.
    #[must_use]
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::PerPass => &[
                "event_id",
                "in_x_mm",
                "in_y_mm",
                "in_phi_rad",
                "in_theta_rad",
                "in_energy_MeV",
                "photon_id",
                "crystal_pass",
                "detected_x_mm",
                "detected_y_mm",
                "detected_energy_MeV",
                "compton_num",
                "rayleigh_num",
                "compton_volume",
                "rayleigh_volume",
            ],
            Self::PerEvent => &[
                "event_id",
                "in_x_mm",
                "in_y_mm",
                "in_phi_rad",
                "in_theta_rad",
                "in_energy_MeV",
                "primary_hit",
                "secondary_hit",
                "detected_x_mm",
                "detected_y_mm",
                "detected_energy_MeV",
                "compton_num",
                "rayleigh_num",
                "compton_volume",
                "rayleigh_volume",
            ],
        }
    }
}

/// Mutable actor configuration, set through plain setters before construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorConfig {
    /// Actor name used by [`Self::describe`].
    pub name: String,
    attached_volume: Option<String>,
    crystal_volume: Option<String>,
    frame: OrientationFrame,
    placement: Placement,
    debug_level: i32,
    roulette_factor: u32,
    record_mode: RecordMode,
    output: Option<PathBuf>,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self::new("crf")
    }
}

impl ActorConfig {
    /// Creates an unattached configuration with default orientation.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attached_volume: None,
            crystal_volume: None,
            frame: OrientationFrame::default(),
            placement: Placement::identity(),
            debug_level: 0,
            roulette_factor: 1,
            record_mode: RecordMode::PerPass,
            output: None,
        }
    }

    /// Attaches the actor to a volume.
    pub fn attach_to(&mut self, volume: &str) {
        self.attached_volume = Some(volume.to_string());
    }

    /// Binds the crystal volume. An unresolved name warns and leaves the crystal unset.
    pub fn set_crystal_volume(&mut self, name: &str, geometry: &VolumeTree) {
        if geometry.find(name).is_some() {
            self.crystal_volume = Some(name.to_string());
        } else {
            log::warn!("CRF actor: cannot find crystal volume with name {name}");
            self.crystal_volume = None;
        }
    }

    pub fn set_orientation_x(&mut self, v: Vec3) {
        self.frame.set_x(v);
    }

    pub fn set_orientation_y(&mut self, v: Vec3) {
        self.frame.set_y(v);
    }

    pub fn set_debug_level(&mut self, level: i32) {
        self.debug_level = level;
    }

    /// Sets the roulette factor `N`; values below 1 are silently ignored.
    pub fn set_roulette_factor(&mut self, factor: i64) {
        if let Ok(factor) = u32::try_from(factor) {
            if factor >= 1 {
                self.roulette_factor = factor;
            }
        }
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    pub fn set_record_mode(&mut self, mode: RecordMode) {
        self.record_mode = mode;
    }

    pub fn set_output<P: AsRef<Path>>(&mut self, path: P) {
        self.output = Some(path.as_ref().to_path_buf());
    }

    /// Builder form of [`Self::attach_to`].
    #[must_use]
    pub fn with_attached(mut self, volume: &str) -> Self {
        self.attach_to(volume);
        self
    }

    /// Builder form of [`Self::set_crystal_volume`].
    #[must_use]
    pub fn with_crystal(mut self, name: &str, geometry: &VolumeTree) -> Self {
        self.set_crystal_volume(name, geometry);
        self
    }

    /// Builder form of [`Self::set_roulette_factor`].
    #[must_use]
    pub fn with_roulette_factor(mut self, factor: i64) -> Self {
        self.set_roulette_factor(factor);
        self
    }

    /// Builder form of [`Self::set_record_mode`].
    #[must_use]
    pub fn with_record_mode(mut self, mode: RecordMode) -> Self {
        self.record_mode = mode;
        self
    }

    /// Builder form of [`Self::set_output`].
    #[must_use]
    pub fn with_output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.set_output(path);
        self
    }

    #[must_use]
    pub fn attached_volume(&self) -> Option<&str> {
        self.attached_volume.as_deref()
    }

    #[must_use]
    pub fn crystal_volume(&self) -> Option<&str> {
        self.crystal_volume.as_deref()
    }

    #[must_use]
    pub fn frame(&self) -> &OrientationFrame {
        &self.frame
    }

    #[must_use]
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    #[must_use]
    pub fn debug_level(&self) -> i32 {
        self.debug_level
    }

    #[must_use]
    pub fn roulette_factor(&self) -> u32 {
        self.roulette_factor
    }

    #[must_use]
    pub fn record_mode(&self) -> RecordMode {
        self.record_mode
    }

    #[must_use]
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Human-readable dump of the configuration.
    ///
    /// The orientation is printed as a matrix whose columns are X, Y and Z.
    #[must_use]
    pub fn describe(&self) -> String {
        let (x, y, z) = (self.frame.x(), self.frame.y(), self.frame.z());
        let mut out = String::new();
        let _ = writeln!(out, "CRF actor: {}", self.name);
        let _ = writeln!(
            out,
            "Attached volume: {}",
            self.attached_volume.as_deref().unwrap_or("NULL")
        );
        let _ = writeln!(
            out,
            "Crystal volume: {}",
            self.crystal_volume.as_deref().unwrap_or("NULL")
        );
        let _ = writeln!(out, "Orientation:");
        let _ = writeln!(out, "{} {} {}", x.x, y.x, z.x);
        let _ = writeln!(out, "{} {} {}", x.y, y.y, z.y);
        let _ = writeln!(out, "{} {} {}", x.z, y.z, z.z);
        let _ = writeln!(out, "Debug level: {}", self.debug_level);
        let _ = writeln!(out, "Roulette factor: {}", self.roulette_factor);
        let _ = writeln!(out, "Record mode: {:?}", self.record_mode);
        let _ = writeln!(
            out,
            "Output: {}",
            self.output
                .as_deref()
                .map_or_else(|| "NULL".to_string(), |p| p.display().to_string())
        );
        out
    }

    /// Runs the construction-time checks.
    ///
    /// # Errors
    /// Returns the first fatal misconfiguration found.
    pub fn validate(&self, geometry: &VolumeTree) -> Result<ValidatedConfig, ConfigError> {
        let attached = self
            .attached_volume
            .as_deref()
            .ok_or(ConfigError::NotAttached)?;
        if attached == WORLD {
            return Err(ConfigError::AttachedToWorld);
        }
        if geometry.find(attached).is_none() {
            return Err(ConfigError::UnknownVolume(attached.to_string()));
        }

        let crystal = self
            .crystal_volume
            .as_deref()
            .ok_or(ConfigError::MissingCrystal)?;
        if geometry.find(crystal).is_none() {
            return Err(ConfigError::UnknownVolume(crystal.to_string()));
        }

        let mut found = false;
        for volume in geometry.ancestors(crystal) {
            if volume.name == attached {
                found = true;
                break;
            }
            if volume.copies > 1 {
                return Err(ConfigError::RepeatedVolume {
                    name: volume.name.clone(),
                    copies: volume.copies,
                });
            }
        }
        // the crystal itself is not its own descendant
        if !found || crystal == attached {
            return Err(ConfigError::NotDescendant {
                crystal: crystal.to_string(),
                attached: attached.to_string(),
            });
        }

        let output = self.output.clone().ok_or(ConfigError::MissingOutput)?;

        Ok(ValidatedConfig {
            name: self.name.clone(),
            attached_volume: attached.to_string(),
            crystal_volume: crystal.to_string(),
            frame: self.frame,
            placement: self.placement,
            debug_level: self.debug_level,
            roulette_factor: self.roulette_factor,
            record_mode: self.record_mode,
            output,
        })
    }
}

/// Configuration that passed [`ActorConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub name: String,
    pub attached_volume: String,
    pub crystal_volume: String,
    pub frame: OrientationFrame,
    pub placement: Placement,
    pub debug_level: i32,
    pub roulette_factor: u32,
    pub record_mode: RecordMode,
    pub output: PathBuf,
}
