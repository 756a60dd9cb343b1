//! Common utilities for test stand integration tests

use std::collections::HashMap;

use teststand::driver::{EventSource, HitSink};
use teststand::geometry::{DetectorGeometry, LayerSpec, ShellGeometryBuilder};
use teststand::optics::{load_calibration, MaterialCatalog, MaterialKind};
use teststand::recording::PhotonHit;
use teststand::units::{Length, LengthExt, Time, TimeExt};
use teststand::TeststandError;

/// One scripted photon
#[derive(Debug, Clone)]
pub struct ScriptedHit {
    pub detector_id: u32,
    pub location: String,
    pub wavelength_nm: f64,
    pub time_ns: f64,
}

impl ScriptedHit {
    /// Photon on the sensitive photocathode
    pub fn on_cathode(detector_id: u32, wavelength_nm: f64, time_ns: f64) -> Self {
        Self::on(detector_id, "PMT_phys", wavelength_nm, time_ns)
    }

    pub fn on(detector_id: u32, location: &str, wavelength_nm: f64, time_ns: f64) -> Self {
        Self {
            detector_id,
            location: location.to_string(),
            wavelength_nm,
            time_ns,
        }
    }
}

/// Replays a fixed list of hits per event id; events without a script are empty
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    events: HashMap<u32, Vec<ScriptedHit>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event_id: u32, hits: Vec<ScriptedHit>) -> Self {
        self.events.insert(event_id, hits);
        self
    }
}

impl EventSource for ScriptedSource {
    fn generate(&mut self, event_id: u32, sink: &mut dyn HitSink) -> Result<(), TeststandError> {
        for hit in self.events.get(&event_id).into_iter().flatten() {
            sink.deliver(&PhotonHit {
                detector_id: hit.detector_id,
                location: &hit.location,
                wavelength: Length::from_nanometers(hit.wavelength_nm),
                time: Time::from_nanoseconds(hit.time_ns),
            })?;
        }
        Ok(())
    }
}

/// The standard test stand: 127 mm photocathode, window, oil and capsule,
/// with the bundled R7081 quantum efficiency.
pub fn teststand_geometry() -> DetectorGeometry {
    let calibration = load_calibration(test_helpers::r7081_qe_table()).unwrap();
    ShellGeometryBuilder::new(Length::from_millimeters(127.0), Length::from_millimeters(-80.0))
        .layers([
            LayerSpec::new("Window", MaterialKind::PyrexGlass, Length::from_millimeters(3.0)),
            LayerSpec::new("Oil", MaterialKind::MineralOil, Length::from_millimeters(1.5)),
            LayerSpec::new("Capsule", MaterialKind::Pet, Length::from_millimeters(0.3)),
        ])
        .build(MaterialCatalog::standard().unwrap(), calibration)
        .unwrap()
}
