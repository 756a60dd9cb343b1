//! Photomultiplier test stand simulation core
//!
//! This crate derives the nested shell geometry of an encapsulated
//! photomultiplier from a handful of layer widths, binds the photocathode
//! quantum efficiency to its sensitive surface, and records the photons an
//! external transport engine reports into per-run output artifacts.

pub mod config;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod optics;
pub mod recording;
pub mod shared_args;
pub mod units;

// Re-exports for easier access
pub use config::TeststandConfig;
pub use driver::{
    run_parallel, run_sequential, EventProgress, EventSource, HitSink, PhotonGun,
    PhotonGunConfig, ProgressCallback, RunPlan, RunWorker, WorkerOutcome,
};
pub use error::{ConfigurationError, ConsistencyError, OutputError, TeststandError};
pub use geometry::{DerivedShell, DetectorGeometry, LayerSpec, Profile, ShellGeometryBuilder};
pub use optics::{load_calibration, CalibrationCurve, MaterialCatalog, MaterialKind};
pub use recording::{
    read_artifact, CaptureSettings, HitRecorder, HitTables, OutputNaming, PhotonHit,
    RunSession, RunSummary,
};
