//! Hit recording: table rows, per-event aggregation and the run artifact

pub mod artifact;
pub mod hit_recorder;
pub mod session;
pub mod tables;

pub use artifact::{read_artifact, totals_sidecar_path, ArtifactStats, ArtifactWriter};
pub use hit_recorder::{CaptureSettings, HitRecorder, PhotonHit, RecorderState};
pub use session::{OutputNaming, RunSession, RunSummary};
pub use tables::{HitTables, PhotonHitRow, TableSink, TotalHitsRow};
