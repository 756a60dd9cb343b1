//! Error kinds for the test stand core.
//!
//! Three fatal kinds exist: configuration problems abort before any run,
//! consistency faults abort the run in progress, and output failures abort
//! the worker that owns the artifact. Nothing here is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or missing static configuration. Raised before any run starts.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Calibration table could not be opened or read.
    #[error("calibration resource {path} could not be read: {source}")]
    CalibrationUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A calibration row is not two finite numeric fields.
    #[error("calibration resource {source_name}, line {line}: {reason}")]
    MalformedCalibrationRow {
        source_name: String,
        line: usize,
        reason: String,
    },

    /// Fewer than two usable samples were found.
    #[error("calibration resource {source_name} yields {count} valid samples, at least 2 are required")]
    TooFewCalibrationSamples { source_name: String, count: usize },

    /// Two samples map to the same photon energy.
    #[error("calibration resource {source_name} lists wavelength {wavelength_nm} nm more than once")]
    DuplicateCalibrationSample {
        source_name: String,
        wavelength_nm: f64,
    },

    /// Wavelength must be strictly positive to convert to energy.
    #[error("calibration resource {source_name}: wavelength {wavelength_nm} nm is not positive")]
    NonPositiveWavelength {
        source_name: String,
        wavelength_nm: f64,
    },

    /// Efficiency percent outside [0, 100].
    #[error("calibration resource {source_name}: efficiency {percent}% at {wavelength_nm} nm is outside [0, 100]")]
    EfficiencyOutOfRange {
        source_name: String,
        wavelength_nm: f64,
        percent: f64,
    },

    /// Property curve construction failure (material tables).
    #[error("property curve {name}: {reason}")]
    InvalidPropertyCurve { name: String, reason: String },

    /// Layer width is negative or not finite.
    #[error("layer {layer} has invalid width {width_mm} mm")]
    InvalidLayerWidth { layer: String, width_mm: f64 },

    /// Profile control points are structurally invalid.
    #[error("invalid shell profile: {0}")]
    InvalidProfile(String),

    /// Base radius or height of the sensitive shell is unusable.
    #[error("invalid base {dimension}: {value_mm} mm")]
    InvalidBaseDimension {
        dimension: &'static str,
        value_mm: f64,
    },

    /// An outer shell does not strictly enclose the shell beneath it.
    #[error(
        "shell {outer} does not enclose shell {inner} at control point {index} \
         (outer radius {outer_mm} mm, inner radius {inner_mm} mm)"
    )]
    DegenerateShell {
        inner: String,
        outer: String,
        index: usize,
        inner_mm: f64,
        outer_mm: f64,
    },

    /// A layer between the sensitive surface and the outside blocks optical photons.
    #[error("layer {layer} uses {material}, which is opaque to optical photons")]
    OpaqueLayer { layer: String, material: String },

    /// Shell stack extends beyond the world volume.
    #[error("detector extent {extent_mm} mm exceeds the world half-size {limit_mm} mm along {axis}")]
    EnclosureTooSmall {
        axis: &'static str,
        extent_mm: f64,
        limit_mm: f64,
    },

    /// Material name not present in the catalog.
    #[error("unknown material {0}")]
    UnknownMaterial(String),

    /// Worker count must be at least one.
    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    /// Output base filename is empty.
    #[error("output filename must not be empty")]
    EmptyOutputName,

    /// Configuration file could not be read.
    #[error("configuration file {path} could not be read: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be written.
    #[error("configuration file {path} could not be written: {source}")]
    ConfigUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Layer width override does not list one width per configured layer.
    #[error("{actual} layer widths given for {expected} configured layers")]
    LayerCountMismatch { expected: usize, actual: usize },

    /// Configuration file is not valid JSON for the expected schema.
    #[error("configuration file {path} could not be parsed: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The hit stream disagrees with the geometry or the event lifecycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsistencyError {
    /// A hit arrived on a volume other than the sensitive surface.
    #[error(
        "event {event_id}: detector {detector_id} reported a hit on {actual}, \
         expected sensitive surface {expected}"
    )]
    UnexpectedSurface {
        event_id: u32,
        detector_id: u32,
        expected: String,
        actual: String,
    },

    /// A hit was delivered while no event was open.
    #[error("detector {detector_id} reported a hit with no open event")]
    NoOpenEvent { detector_id: u32 },

    /// An event was begun while another was still open.
    #[error("event {requested} begun while event {open} is still open")]
    EventAlreadyOpen { open: u32, requested: u32 },

    /// An event end arrived with no open event.
    #[error("event end received with no open event")]
    NoEventToEnd,
}

/// The output artifact could not be opened, written or finalized.
#[derive(Error, Debug)]
pub enum OutputError {
    /// Artifact file could not be created.
    #[error("failed to open output artifact {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A table row or header could not be written.
    #[error("failed to write {table} table to {path}: {source}")]
    Write {
        table: &'static str,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Flushing or closing the artifact failed.
    #[error("failed to finalize output artifact {path}: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading an artifact back failed.
    #[error("failed to read output artifact {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// Table access outside an open run or event.
    #[error("output session misuse: {0}")]
    Lifecycle(String),
}

/// Umbrella error returned by the run driver.
#[derive(Error, Debug)]
pub enum TeststandError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
