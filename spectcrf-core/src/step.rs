//! Step events delivered by the transport engine and their classification.

use crate::frame::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Particle species of the track that produced a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ParticleKind {
    /// The tracked neutral massless quantum.
    #[default]
    Gamma,
    Electron,
    Positron,
    /// Any other species.
    #[cfg_attr(feature = "serde", serde(other))]
    Other,
}

/// Interaction that defined a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    Compton,
    PhotoElectric,
    Rayleigh,
    Other,
}

impl ProcessKind {
    /// Maps an engine process name (long or short alias) to a process kind.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "Compton" | "compt" => Self::Compton,
            "PhotoElectric" | "phot" => Self::PhotoElectric,
            "RayleighScattering" | "Rayleigh" | "Rayl" => Self::Rayleigh,
            _ => Self::Other,
        }
    }

    /// True for the processes that deposit energy when they happen in the crystal.
    #[inline]
    #[must_use]
    pub fn deposits(self) -> bool {
        matches!(self, Self::Compton | Self::PhotoElectric)
    }

    /// True for the processes counted as out-of-crystal scatters.
    #[inline]
    #[must_use]
    pub fn scatters(self) -> bool {
        matches!(self, Self::Compton | Self::Rayleigh)
    }
}

/// Creation point of a track, available on its first step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackVertex {
    /// World position (mm).
    pub position: Vec3,
    /// World unit momentum direction.
    pub direction: Vec3,
    /// Kinetic energy at creation (MeV).
    pub kinetic_energy_mev: f64,
}

/// One discrete interaction notification.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepEvent {
    /// Track producing this step.
    pub track_id: i32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub particle: ParticleKind,
    /// Name of the electromagnetic process that defined the step, if any.
    #[cfg_attr(feature = "serde", serde(default))]
    pub process: Option<String>,
    /// Total energy deposited by the step (MeV).
    #[cfg_attr(feature = "serde", serde(default))]
    pub energy_deposited_mev: f64,
    /// Post-step position in world coordinates (mm).
    pub position: Vec3,
    /// Pre-step position in world coordinates (mm).
    pub pre_step_position: Vec3,
    /// Name of the post-step volume.
    pub volume: String,
    /// Track vertex data; the engine attaches it at least to a track's first step.
    #[cfg_attr(feature = "serde", serde(default))]
    pub vertex: Option<TrackVertex>,
}

impl StepEvent {
    /// Creates a gamma step at `position` inside `volume`.
    ///
    /// The pre-step position defaults to `position`; adjust with the `with_*` methods.
    #[must_use]
    pub fn gamma(track_id: i32, process: &str, volume: &str, position: Vec3) -> Self {
        Self {
            track_id,
            particle: ParticleKind::Gamma,
            process: Some(process.to_string()),
            energy_deposited_mev: 0.0,
            position,
            pre_step_position: position,
            volume: volume.to_string(),
            vertex: None,
        }
    }

    /// Sets the deposited energy.
    #[must_use]
    pub fn with_deposit(mut self, energy_mev: f64) -> Self {
        self.energy_deposited_mev = energy_mev;
        self
    }

    /// Sets the pre-step position.
    #[must_use]
    pub fn with_pre_step(mut self, position: Vec3) -> Self {
        self.pre_step_position = position;
        self
    }

    /// Attaches track vertex data.
    #[must_use]
    pub fn with_vertex(mut self, vertex: TrackVertex) -> Self {
        self.vertex = Some(vertex);
        self
    }

    /// Sets the particle species.
    #[must_use]
    pub fn with_particle(mut self, particle: ParticleKind) -> Self {
        self.particle = particle;
        self
    }

    /// The driving process, `Other` when absent or unrecognized.
    #[must_use]
    pub fn process_kind(&self) -> ProcessKind {
        self.process
            .as_deref()
            .map_or(ProcessKind::Other, ProcessKind::from_name)
    }
}

/// Result of classifying a step against the configured crystal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepClass {
    pub process: ProcessKind,
    pub in_sensitive_volume: bool,
}

impl StepClass {
    /// Steps the aggregator must not react to.
    #[inline]
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.process == ProcessKind::Other
    }
}

/// Classifies a step: process kind, and whether its post-step volume is the crystal.
#[must_use]
pub fn classify(step: &StepEvent, crystal: &str) -> StepClass {
    StepClass {
        process: step.process_kind(),
        in_sensitive_volume: step.volume == crystal,
    }
}
