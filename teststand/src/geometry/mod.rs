//! Detector geometry: revolution profile, nested shells and the dark box

pub mod enclosure;
pub mod profile;
pub mod shell;

pub use enclosure::{BackPlate, Enclosure, WorldBox};
pub use profile::{Profile, ProfilePoint};
pub use shell::{
    DerivedShell, DetectorGeometry, LayerSpec, ShellGeometryBuilder, SENSITIVE_SHELL_NAME,
};
