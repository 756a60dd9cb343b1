//! Optical skin surface of the sensitive photocathode volume.

use super::calibration::{CalibrationCurve, EnergyCurve};
use crate::error::ConfigurationError;
use crate::units::{photon_energy, Energy, Length, LengthExt};

/// Boundary type between the last transparent layer and the photocathode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceType {
    DielectricMetal,
}

/// Surface roughness model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFinish {
    Polished,
}

/// Detecting boundary of the innermost shell.
///
/// Photons reaching this surface are absorbed and counted with the
/// probability given by the calibration curve. Nothing is reflected.
#[derive(Debug, Clone)]
pub struct SensitiveSurface {
    /// Surface name
    pub name: String,
    /// Physical volume the surface wraps; hits must report this location
    pub volume: String,
    pub surface_type: SurfaceType,
    pub finish: SurfaceFinish,
    reflectivity: EnergyCurve,
    efficiency: CalibrationCurve,
}

impl SensitiveSurface {
    /// Wrap a volume in a polished, non-reflecting detecting surface.
    pub fn new(
        volume: impl Into<String>,
        efficiency: CalibrationCurve,
    ) -> Result<Self, ConfigurationError> {
        let reflectivity = EnergyCurve::flat(
            "PMTSurface REFLECTIVITY",
            photon_energy(Length::from_nanometers(600.0)),
            photon_energy(Length::from_nanometers(100.0)),
            0.0,
        )?;

        Ok(Self {
            name: "PMTSurface".to_string(),
            volume: volume.into(),
            surface_type: SurfaceType::DielectricMetal,
            finish: SurfaceFinish::Polished,
            reflectivity,
            efficiency,
        })
    }

    /// Probability that a photon of this energy is detected on arrival.
    pub fn detection_probability(&self, energy: Energy) -> f64 {
        self.efficiency.efficiency_at(energy)
    }

    /// Reflectivity at a photon energy.
    pub fn reflectivity_at(&self, energy: Energy) -> f64 {
        self.reflectivity.value_at(energy)
    }

    /// Calibration bound to this surface.
    pub fn calibration(&self) -> &CalibrationCurve {
        &self.efficiency
    }
}
