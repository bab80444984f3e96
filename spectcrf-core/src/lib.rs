//! spectcrf-core: Core types and aggregation for camera-response-function simulation.
//!
//! A transport engine reports discrete interaction steps for each simulated
//! particle history. This crate reduces them into detection records: where the
//! incident photon entered the camera, where and how much energy it deposited
//! in the crystal, and how often it scattered on the way.
//!

pub mod aggregator;
pub mod config;
pub mod error;
pub mod frame;
pub mod record;
pub mod roulette;
pub mod sink;
pub mod soa;
pub mod step;
pub mod volume;

pub use aggregator::{AggregatorStatistics, EventAggregator, StepHandler};
pub use config::{ActorConfig, RecordMode, ValidatedConfig};
pub use error::{ConfigError, Error, Result};
pub use frame::{OrientationFrame, Placement, Vec3};
pub use record::{DetectionRecord, VolumeName, MAX_VOLUME_NAME};
pub use roulette::{RouletteThinner, Verdict};
pub use sink::{MemorySink, RecordSink};
pub use soa::RecordBatch;
pub use step::{classify, ParticleKind, ProcessKind, StepClass, StepEvent, TrackVertex};
pub use volume::{Volume, VolumeTree, WORLD};
