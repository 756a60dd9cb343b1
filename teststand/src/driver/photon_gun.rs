//! Stand-in event source for running the recording chain without a
//! transport engine.
//!
//! Each event fires a fixed number of photons at the photocathode. Their
//! wavelengths are uniform in a band and their arrival times uniform in a
//! window. A photon is detected with the probability the calibration gives
//! for its wavelength. There is no tracking through the layers.
//!
//! The generator for each event is seeded from the base seed and the global
//! event id, so output does not depend on how events are spread over workers.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{EventSource, HitSink};
use crate::error::TeststandError;
use crate::geometry::DetectorGeometry;
use crate::recording::PhotonHit;
use crate::units::{Length, LengthExt, Time, TimeExt};

/// Photon gun settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotonGunConfig {
    pub photons_per_event: u32,
    pub wavelength_min_nm: f64,
    pub wavelength_max_nm: f64,
    /// Arrival times are drawn from [0, time_window_ns)
    pub time_window_ns: f64,
    /// Number of detectors sharing the photocathode
    pub detectors: u32,
    pub seed: u64,
}

impl Default for PhotonGunConfig {
    fn default() -> Self {
        Self {
            photons_per_event: 100,
            wavelength_min_nm: 280.0,
            wavelength_max_nm: 650.0,
            time_window_ns: 100.0,
            detectors: 1,
            seed: 42,
        }
    }
}

/// Calibration-weighted photon source
pub struct PhotonGun<'g> {
    geometry: &'g DetectorGeometry,
    config: PhotonGunConfig,
}

impl<'g> PhotonGun<'g> {
    pub fn new(geometry: &'g DetectorGeometry, config: PhotonGunConfig) -> Self {
        Self { geometry, config }
    }

    pub fn config(&self) -> &PhotonGunConfig {
        &self.config
    }

    fn event_rng(&self, event_id: u32) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(u64::from(event_id)))
    }
}

impl EventSource for PhotonGun<'_> {
    fn generate(&mut self, event_id: u32, sink: &mut dyn HitSink) -> Result<(), TeststandError> {
        let mut rng = self.event_rng(event_id);
        let location = self.geometry.sensitive_volume();
        let calibration = self.geometry.calibration();
        let (low, high) = (self.config.wavelength_min_nm, self.config.wavelength_max_nm);

        for _ in 0..self.config.photons_per_event {
            let wavelength = if high > low {
                Length::from_nanometers(rng.gen_range(low..high))
            } else {
                Length::from_nanometers(low)
            };
            let detected = rng.gen::<f64>() < calibration.efficiency_at_wavelength(wavelength);
            let time_ns = rng.gen::<f64>() * self.config.time_window_ns;
            let detector_id = if self.config.detectors > 1 {
                rng.gen_range(0..self.config.detectors)
            } else {
                0
            };

            if detected {
                sink.deliver(&PhotonHit {
                    detector_id,
                    location,
                    wavelength,
                    time: Time::from_nanoseconds(time_ns),
                })?;
            }
        }
        Ok(())
    }
}
