//! Per-history aggregation of step events into detection records.
//!
//! The host engine drives an [`EventAggregator`] through the [`StepHandler`]
//! callbacks: every step of a history, then one end-of-event notification,
//! and finally one end-of-acquisition notification.
//!
//! Within a history the aggregator keeps an append-only list of records and
//! the index of the one currently open. A new record is opened when
//!
//! 1. the first relevant step of the history arrives (from its vertex),
//! 2. a step comes from a different track than the current record's photon
//!    (a secondary branch, same pass, incoming kinematics inherited),
//! 3. a photon steps outside the crystal after depositing energy in it
//!    (a new pass of the same photon).
//!
//! At end of event all records receive the event id and go through the
//! roulette thinner into the sink, in the order they were opened.

use crate::config::{ActorConfig, RecordMode, ValidatedConfig};
use crate::error::Result;
use crate::record::DetectionRecord;
use crate::roulette::{RouletteThinner, Verdict};
use crate::sink::RecordSink;
use crate::step::{classify, ParticleKind, StepEvent};
use crate::volume::VolumeTree;

/// Host-facing callbacks. The host calls them sequentially from one thread.
pub trait StepHandler {
    /// One physical interaction.
    fn on_step(&mut self, step: &StepEvent);

    /// End of one particle history.
    ///
    /// # Errors
    /// Returns an error if the output collaborator fails.
    fn on_event_end(&mut self, event_id: i32) -> Result<()>;

    /// End of the whole acquisition; closes the output.
    ///
    /// # Errors
    /// Returns an error if the output collaborator fails to close.
    fn on_acquisition_end(&mut self) -> Result<()>;
}

/// Counters accumulated over an acquisition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorStatistics {
    pub steps_seen: u64,
    pub steps_ignored: u64,
    pub events: u64,
    pub records_opened: u64,
    pub records_written: u64,
    pub records_dropped: u64,
}

/// Records of the history being processed.
#[derive(Debug, Clone)]
struct EventRecords {
    records: Vec<DetectionRecord>,
    current: usize,
    primary_track: i32,
}

impl EventRecords {
    fn new(first: DetectionRecord) -> Self {
        let primary_track = first.photon_id;
        Self {
            records: vec![first],
            current: 0,
            primary_track,
        }
    }

    fn current(&self) -> &DetectionRecord {
        &self.records[self.current]
    }

    fn current_mut(&mut self) -> &mut DetectionRecord {
        &mut self.records[self.current]
    }

    /// Closes the current record and opens a child of it.
    fn open_child(&mut self, track_id: Option<i32>, pass_increment: u32) {
        let child = DetectionRecord::open_child(self.current(), track_id, pass_increment);
        self.records.push(child);
        self.current = self.records.len() - 1;
    }
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Idle,
    Recording(EventRecords),
}

/// Reduces the step stream of each particle history into detection records.
pub struct EventAggregator<S: RecordSink> {
    config: ValidatedConfig,
    thinner: RouletteThinner,
    sink: S,
    state: State,
    stats: AggregatorStatistics,
    closed: bool,
}

impl<S: RecordSink> EventAggregator<S> {
    /// Creates an aggregator from a validated configuration.
    pub fn new(config: ValidatedConfig, sink: S) -> Self {
        let thinner = RouletteThinner::new(config.roulette_factor);
        Self {
            config,
            thinner,
            sink,
            state: State::Idle,
            stats: AggregatorStatistics::default(),
            closed: false,
        }
    }

    /// Validates `config` against `geometry` and creates the aggregator.
    ///
    /// # Errors
    /// Returns the fatal configuration error found by validation.
    pub fn construct(config: &ActorConfig, geometry: &VolumeTree, sink: S) -> Result<Self> {
        let validated = config.validate(geometry)?;
        log::debug!(
            "CRF actor {} constructed on {} (crystal {})",
            validated.name,
            validated.attached_volume,
            validated.crystal_volume
        );
        Ok(Self::new(validated, sink))
    }

    #[must_use]
    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    #[must_use]
    pub fn statistics(&self) -> AggregatorStatistics {
        self.stats
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the aggregator and returns its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// True between the first relevant step of a history and its end of event.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        matches!(self.state, State::Recording(_))
    }

    /// Records of the history in progress, in opening order.
    #[must_use]
    pub fn open_records(&self) -> &[DetectionRecord] {
        match &self.state {
            State::Idle => &[],
            State::Recording(event) => &event.records,
        }
    }

    /// The record currently open for mutation.
    #[must_use]
    pub fn current_record(&self) -> Option<&DetectionRecord> {
        match &self.state {
            State::Idle => None,
            State::Recording(event) => Some(event.current()),
        }
    }

    #[must_use]
    pub fn thinner(&self) -> &RouletteThinner {
        &self.thinner
    }

    /// Changes `N` mid-acquisition; restarts the roulette rotation. Values below 1 are ignored.
    pub fn set_roulette_factor(&mut self, factor: i64) {
        self.thinner.set_factor(factor);
    }

    pub fn set_debug_level(&mut self, level: i32) {
        self.config.debug_level = level;
    }

    /// Discards the history in progress and restarts the roulette rotation.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.thinner.reset();
    }

    fn open_history(&self, step: &StepEvent) -> EventRecords {
        if self.config.debug_level > 1 {
            if let Some(vertex) = step.vertex {
                let dir = self.config.placement.transform_axis(vertex.direction);
                let (phi, theta) = self.config.frame.to_spherical_local(dir);
                log::debug!("start_dir=({},{})", dir.phi(), dir.theta());
                log::debug!("start_local_dir=({phi},{theta})");
            }
        }
        EventRecords::new(DetectionRecord::open_primary(
            step,
            &self.config.placement,
            &self.config.frame,
        ))
    }

    fn finalize(&mut self, event_id: i32, records: Vec<DetectionRecord>) -> Result<()> {
        for mut record in records {
            record.event_id = Some(event_id);
            if self.config.debug_level > 0 {
                log::info!("{record}");
            }
            match self.thinner.decide(&record) {
                Verdict::Retain => {
                    self.sink.write_record(&record)?;
                    self.stats.records_written += 1;
                }
                Verdict::Drop => self.stats.records_dropped += 1,
            }
        }
        Ok(())
    }
}

impl<S: RecordSink> StepHandler for EventAggregator<S> {
    fn on_step(&mut self, step: &StepEvent) {
        self.stats.steps_seen += 1;

        let class = classify(step, &self.config.crystal_volume);
        if step.particle != ParticleKind::Gamma || class.is_ignored() {
            self.stats.steps_ignored += 1;
            return;
        }

        if let State::Idle = self.state {
            // first EM step of the history is taken as the primary photon
            self.state = State::Recording(self.open_history(step));
            self.stats.records_opened += 1;
        }
        let State::Recording(event) = &mut self.state else {
            return;
        };

        let per_pass = self.config.record_mode == RecordMode::PerPass;

        if per_pass && step.track_id != event.current().photon_id {
            event.open_child(Some(step.track_id), 0);
            self.stats.records_opened += 1;
        }

        if class.in_sensitive_volume {
            if class.process.deposits() {
                let local = self
                    .config
                    .placement
                    .transform_point(step.pre_step_position);
                let xy = self.config.frame.to_local(local);
                let energy = step.energy_deposited_mev;
                let is_primary = step.track_id == event.primary_track;

                let current = event.current_mut();
                current.accumulate_in_crystal(energy, xy);
                if energy > 0.0 {
                    if is_primary {
                        current.primary_hit = true;
                    } else {
                        current.secondary_hit = true;
                    }
                }
            }
        } else {
            if per_pass && event.current().is_detected() {
                // stepped out of the crystal after depositing in it
                event.open_child(None, 1);
                self.stats.records_opened += 1;
            }
            if class.process.scatters() {
                event
                    .current_mut()
                    .register_out_of_crystal_scatter(class.process, &step.volume);
            }
        }
    }

    fn on_event_end(&mut self, event_id: i32) -> Result<()> {
        self.stats.events += 1;
        match std::mem::take(&mut self.state) {
            State::Idle => Ok(()),
            State::Recording(event) => self.finalize(event_id, event.records),
        }
    }

    fn on_acquisition_end(&mut self) -> Result<()> {
        if let State::Recording(event) = std::mem::take(&mut self.state) {
            log::warn!(
                "acquisition ended inside a history; discarding {} open record(s)",
                event.records.len()
            );
        }
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        log::debug!(
            "CRF actor {}: {} event(s), {} record(s) written, {} dropped by roulette",
            self.config.name,
            self.stats.events,
            self.stats.records_written,
            self.stats.records_dropped
        );
        self.sink.close()
    }
}
