//! Row types of the two output tables and the sink they are emitted into.

use serde::{Deserialize, Serialize};

use crate::error::OutputError;

/// One detected photon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotonHitRow {
    #[serde(rename = "evtID")]
    pub event_id: u32,
    #[serde(rename = "det_uid")]
    pub detector_id: u32,
    #[serde(rename = "wavelength_in_nm")]
    pub wavelength_nm: f64,
    #[serde(rename = "time_in_ns")]
    pub time_ns: f64,
}

impl PhotonHitRow {
    pub const TABLE: &'static str = "PhotonHits";
    pub const COLUMNS: [&'static str; 4] = ["evtID", "det_uid", "wavelength_in_nm", "time_in_ns"];
}

/// Hit count of one detector over one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHitsRow {
    #[serde(rename = "evtID")]
    pub event_id: u32,
    #[serde(rename = "det_uid")]
    pub detector_id: u32,
    pub hit_count: u64,
}

impl TotalHitsRow {
    pub const TABLE: &'static str = "TotalHits";
    pub const COLUMNS: [&'static str; 3] = ["evtID", "det_uid", "hit_count"];
}

/// Destination for table rows emitted by a recorder.
pub trait TableSink {
    fn push_photon_hit(&mut self, row: PhotonHitRow) -> Result<(), OutputError>;
    fn push_total_hits(&mut self, row: TotalHitsRow) -> Result<(), OutputError>;
}

/// Both tables held in memory.
///
/// Used as a plain sink in tests and as the result of reading an artifact
/// back from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitTables {
    pub photon_hits: Vec<PhotonHitRow>,
    pub total_hits: Vec<TotalHitsRow>,
}

impl HitTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Photon rows belonging to one event.
    pub fn photon_hits_for(&self, event_id: u32) -> impl Iterator<Item = &PhotonHitRow> {
        self.photon_hits
            .iter()
            .filter(move |row| row.event_id == event_id)
    }

    /// Aggregate rows belonging to one event.
    pub fn total_hits_for(&self, event_id: u32) -> impl Iterator<Item = &TotalHitsRow> {
        self.total_hits
            .iter()
            .filter(move |row| row.event_id == event_id)
    }

    pub fn is_empty(&self) -> bool {
        self.photon_hits.is_empty() && self.total_hits.is_empty()
    }

    pub fn clear(&mut self) {
        self.photon_hits.clear();
        self.total_hits.clear();
    }
}

impl TableSink for HitTables {
    fn push_photon_hit(&mut self, row: PhotonHitRow) -> Result<(), OutputError> {
        self.photon_hits.push(row);
        Ok(())
    }

    fn push_total_hits(&mut self, row: TotalHitsRow) -> Result<(), OutputError> {
        self.total_hits.push(row);
        Ok(())
    }
}
