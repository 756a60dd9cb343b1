//! Per-event hit aggregation.
//!
//! The recorder sees every photon the transport engine accepts on a
//! detector and turns them into rows of the two output tables:
//!
//! - `PhotonHits`: one row per accepted photon, emitted as the hit arrives
//! - `TotalHits`: one row per detector that saw at least one photon, emitted
//!   when the event ends
//!
//! Exactly one event is open at a time. A hit reported against any location
//! other than the sensitive surface poisons the event: the recorder drops its
//! counts, returns to idle and reports a [`ConsistencyError`].

use std::collections::BTreeMap;

use log::{debug, warn};

use super::tables::{PhotonHitRow, TableSink, TotalHitsRow};
use crate::error::{ConsistencyError, TeststandError};
use crate::units::{photon_wavelength, Energy, Length, LengthExt, Time, TimeExt};

/// Which output tables are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Emit one `PhotonHits` row per accepted photon
    pub photon_hits: bool,
    /// Emit `TotalHits` rows at event end
    pub integral_light: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            photon_hits: true,
            integral_light: true,
        }
    }
}

impl CaptureSettings {
    /// Build from the two suppression flags of the command line.
    pub fn from_disable_flags(
        disable_photon_timestamps: bool,
        disable_integral_light: bool,
    ) -> Self {
        Self {
            photon_hits: !disable_photon_timestamps,
            integral_light: !disable_integral_light,
        }
    }
}

/// A photon accepted by a detector, as delivered by the transport engine.
///
/// Only valid for the duration of the hit callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotonHit<'a> {
    pub detector_id: u32,
    /// Physical volume the photon was absorbed in
    pub location: &'a str,
    pub wavelength: Length,
    /// Global time since the start of the event
    pub time: Time,
}

impl<'a> PhotonHit<'a> {
    /// Engines report the deposited photon energy rather than the wavelength.
    pub fn from_energy_deposit(
        detector_id: u32,
        location: &'a str,
        energy: Energy,
        time: Time,
    ) -> Self {
        Self {
            detector_id,
            location,
            wavelength: photon_wavelength(energy),
            time,
        }
    }
}

/// Recorder lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecorderState {
    /// Between events
    #[default]
    Idle,
    /// An event is open and hits are being counted per detector
    Accumulating {
        event_id: u32,
        counts: BTreeMap<u32, u64>,
    },
}

/// Turns per-photon hits into the two output tables
#[derive(Debug, Clone)]
pub struct HitRecorder {
    expected_location: String,
    settings: CaptureSettings,
    state: RecorderState,
}

impl HitRecorder {
    /// Create a recorder accepting hits on `expected_location` only.
    pub fn new(expected_location: impl Into<String>, settings: CaptureSettings) -> Self {
        Self {
            expected_location: expected_location.into(),
            settings,
            state: RecorderState::Idle,
        }
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings
    }

    pub fn expected_location(&self) -> &str {
        &self.expected_location
    }

    /// Identifier of the open event, if any.
    pub fn open_event(&self) -> Option<u32> {
        match &self.state {
            RecorderState::Idle => None,
            RecorderState::Accumulating { event_id, .. } => Some(*event_id),
        }
    }

    /// Open a new event with an empty aggregate.
    pub fn begin_event(&mut self, event_id: u32) -> Result<(), ConsistencyError> {
        if let Some(open) = self.open_event() {
            return Err(ConsistencyError::EventAlreadyOpen {
                open,
                requested: event_id,
            });
        }
        self.state = RecorderState::Accumulating {
            event_id,
            counts: BTreeMap::new(),
        };
        Ok(())
    }

    /// Count one photon and, when raw capture is on, emit its row.
    pub fn record_hit(
        &mut self,
        hit: &PhotonHit<'_>,
        sink: &mut dyn TableSink,
    ) -> Result<(), TeststandError> {
        let RecorderState::Accumulating { event_id, counts } = &mut self.state else {
            return Err(ConsistencyError::NoOpenEvent {
                detector_id: hit.detector_id,
            }
            .into());
        };
        let event_id = *event_id;

        if hit.location != self.expected_location {
            let error = ConsistencyError::UnexpectedSurface {
                event_id,
                detector_id: hit.detector_id,
                expected: self.expected_location.clone(),
                actual: hit.location.to_string(),
            };
            warn!("Dropping event {event_id}: {error}");
            self.state = RecorderState::Idle;
            return Err(error.into());
        }

        *counts.entry(hit.detector_id).or_insert(0) += 1;

        if self.settings.photon_hits {
            sink.push_photon_hit(PhotonHitRow {
                event_id,
                detector_id: hit.detector_id,
                wavelength_nm: hit.wavelength.as_nanometers(),
                time_ns: hit.time.as_nanoseconds(),
            })?;
        }

        Ok(())
    }

    /// Close the open event, emitting its aggregate in ascending detector
    /// order. Returns the closed event id.
    pub fn end_event(&mut self, sink: &mut dyn TableSink) -> Result<u32, TeststandError> {
        let RecorderState::Accumulating { event_id, counts } = std::mem::take(&mut self.state)
        else {
            return Err(ConsistencyError::NoEventToEnd.into());
        };

        if self.settings.integral_light {
            for (detector_id, hit_count) in counts.iter().filter(|(_, count)| **count > 0) {
                sink.push_total_hits(TotalHitsRow {
                    event_id,
                    detector_id: *detector_id,
                    hit_count: *hit_count,
                })?;
            }
        }

        debug!(
            "Event {event_id} closed: {} detectors hit, {} photons",
            counts.len(),
            counts.values().sum::<u64>()
        );
        Ok(event_id)
    }

    /// Discard the open event without emitting anything.
    pub fn abort_event(&mut self) -> Option<u32> {
        match std::mem::take(&mut self.state) {
            RecorderState::Idle => None,
            RecorderState::Accumulating { event_id, .. } => Some(event_id),
        }
    }
}
