mod common;

use approx::assert_relative_eq;
use common::teststand_geometry;
use tempfile::TempDir;
use teststand::config::TeststandConfig;
use teststand::optics::load_calibration;
use teststand::units::{Length, LengthExt};
use teststand::ConfigurationError;

#[test]
fn test_bundled_quantum_efficiency() {
    let curve = load_calibration(test_helpers::r7081_qe_table()).unwrap();
    assert_eq!(curve.curve().len(), 35);

    let at = |nm: f64| curve.efficiency_at_wavelength(Length::from_nanometers(nm));
    assert_relative_eq!(at(380.0), 0.255, epsilon = 1e-9);
    assert_relative_eq!(at(385.0), 0.2545, epsilon = 1e-4);

    // Clamped outside the tabulated 280-650 nm band
    assert_relative_eq!(at(200.0), 0.01, epsilon = 1e-12);
    assert_relative_eq!(at(800.0), 0.002, epsilon = 1e-12);
}

#[test]
fn test_standard_teststand_geometry() {
    let geometry = teststand_geometry();
    let apex: Vec<f64> = geometry.shells().iter().map(|s| s.r_outer()[0]).collect();

    assert_eq!(geometry.shells().len(), 4);
    assert_relative_eq!(apex[0], 127.0, epsilon = 1e-9);
    assert_relative_eq!(apex[3], 131.8, epsilon = 1e-9);
    assert!(geometry.sensitive_shell().is_sensitive());
    assert_eq!(geometry.sensitive_volume(), "PMT_phys");
    assert_eq!(geometry.outermost_shell().volume_name(), "Capsule_phys");
}

#[test]
fn test_default_config_builds_the_same_geometry() {
    let mut config = TeststandConfig::default();
    config.calibration_path = test_helpers::r7081_qe_table();

    let calibration = load_calibration(&config.calibration_path).unwrap();
    let geometry = config
        .geometry_builder()
        .unwrap()
        .build(teststand::MaterialCatalog::standard().unwrap(), calibration)
        .unwrap();

    let reference = teststand_geometry();
    assert_eq!(geometry.shells(), reference.shells());
}

#[test]
fn test_config_file_with_zero_width_layer_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("teststand.json");

    let mut config = TeststandConfig::default();
    config.set_layer_widths(&[3.0, 0.0, 0.3]).unwrap();
    config.save_to_file(&path).unwrap();

    let loaded = TeststandConfig::load_from_file(&path).unwrap();
    let result = loaded.geometry_builder().unwrap().derive_shells();
    assert!(matches!(
        result,
        Err(ConfigurationError::DegenerateShell { ref outer, .. }) if outer == "Oil"
    ));
}

#[test]
fn test_missing_calibration_is_fatal() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        load_calibration(dir.path().join("absent.csv")),
        Err(ConfigurationError::CalibrationUnreadable { .. })
    ));

    let empty = dir.path().join("empty.csv");
    std::fs::write(&empty, "").unwrap();
    assert!(matches!(
        load_calibration(&empty),
        Err(ConfigurationError::TooFewCalibrationSamples { count: 0, .. })
    ));
}
