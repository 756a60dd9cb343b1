//! Optical models: photocathode calibration, material properties and the
//! detecting surface

pub mod calibration;
pub mod materials;
pub mod surface;

pub use calibration::{load_calibration, parse_calibration, CalibrationCurve, EnergyCurve};
pub use materials::{MaterialCatalog, MaterialKind, OpticalMaterial};
pub use surface::{SensitiveSurface, SurfaceFinish, SurfaceType};
