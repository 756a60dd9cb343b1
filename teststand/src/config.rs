//! Static configuration of a test stand simulation.
//!
//! Everything here is fixed before the first run starts. The configuration
//! is a JSON document; every field has a default so a partial file only
//! needs to name what it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::driver::PhotonGunConfig;
use crate::error::ConfigurationError;
use crate::geometry::{LayerSpec, Profile, ProfilePoint, ShellGeometryBuilder};
use crate::optics::MaterialKind;
use crate::recording::{CaptureSettings, OutputNaming};
use crate::units::{Length, LengthExt};

/// One material layer as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    pub material: MaterialKind,
    pub width_mm: f64,
}

impl LayerConfig {
    pub fn new(name: &str, material: MaterialKind, width_mm: f64) -> Self {
        Self {
            name: name.to_string(),
            material,
            width_mm,
        }
    }

    pub fn to_spec(&self) -> LayerSpec {
        LayerSpec::new(
            self.name.clone(),
            self.material,
            Length::from_millimeters(self.width_mm),
        )
    }
}

/// Sensitive core dimensions and the layers wrapped around it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub base_radius_mm: f64,
    /// Negative values point the tube along −z
    pub base_height_mm: f64,
    /// Custom revolution profile; the hemispherical one when absent
    pub profile: Option<Vec<ProfilePoint>>,
    /// Innermost first
    pub layers: Vec<LayerConfig>,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            base_radius_mm: 127.0,
            base_height_mm: -80.0,
            profile: None,
            layers: vec![
                LayerConfig::new("Window", MaterialKind::PyrexGlass, 3.0),
                LayerConfig::new("Oil", MaterialKind::MineralOil, 1.5),
                LayerConfig::new("Capsule", MaterialKind::Pet, 0.3),
            ],
        }
    }
}

/// Output artifact settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Base filename; the run index is inserted before the extension
    pub filename: PathBuf,
    pub disable_photon_timestamps: bool,
    pub disable_integral_light: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::from("output.csv"),
            disable_photon_timestamps: false,
            disable_integral_light: false,
        }
    }
}

/// Complete test stand configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeststandConfig {
    pub geometry: GeometryConfig,
    /// Photocathode quantum efficiency table
    pub calibration_path: PathBuf,
    pub output: OutputConfig,
    /// Number of concurrent run workers
    pub workers: usize,
    pub photon_gun: PhotonGunConfig,
}

impl Default for TeststandConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryConfig::default(),
            calibration_path: PathBuf::from("data/R7081_QEWhitespace.csv"),
            output: OutputConfig::default(),
            workers: 1,
            photon_gun: PhotonGunConfig::default(),
        }
    }
}

impl TeststandConfig {
    /// Load from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let json =
            std::fs::read_to_string(path).map_err(|source| ConfigurationError::ConfigUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&json).map_err(|source| ConfigurationError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigurationError> {
        let path = path.as_ref();
        let unwritable = |source| ConfigurationError::ConfigUnwritable {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| unwritable(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        std::fs::write(path, json).map_err(unwritable)
    }

    /// Checks that need no geometry: worker count and output name.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.workers == 0 {
            return Err(ConfigurationError::InvalidWorkerCount(self.workers));
        }
        self.output_naming()?;
        Ok(())
    }

    /// Replace the layer widths in order, keeping names and materials.
    pub fn set_layer_widths(&mut self, widths_mm: &[f64]) -> Result<(), ConfigurationError> {
        if widths_mm.len() != self.geometry.layers.len() {
            return Err(ConfigurationError::LayerCountMismatch {
                expected: self.geometry.layers.len(),
                actual: widths_mm.len(),
            });
        }
        for (layer, &width_mm) in self.geometry.layers.iter_mut().zip(widths_mm) {
            layer.width_mm = width_mm;
        }
        Ok(())
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings::from_disable_flags(
            self.output.disable_photon_timestamps,
            self.output.disable_integral_light,
        )
    }

    pub fn output_naming(&self) -> Result<OutputNaming, ConfigurationError> {
        OutputNaming::new(&self.output.filename)
    }

    /// Geometry builder for the configured core, profile and layers.
    pub fn geometry_builder(&self) -> Result<ShellGeometryBuilder, ConfigurationError> {
        let mut builder = ShellGeometryBuilder::new(
            Length::from_millimeters(self.geometry.base_radius_mm),
            Length::from_millimeters(self.geometry.base_height_mm),
        )
        .layers(self.geometry.layers.iter().map(LayerConfig::to_spec));

        if let Some(points) = &self.geometry.profile {
            builder = builder.with_profile(Profile::new(points.clone())?);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TeststandConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.output.filename, PathBuf::from("output.csv"));
        let widths: Vec<f64> = config.geometry.layers.iter().map(|l| l.width_mm).collect();
        assert_eq!(widths, vec![3.0, 1.5, 0.3]);
        assert_eq!(config.capture_settings(), CaptureSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("teststand.json");

        let mut config = TeststandConfig::default();
        config.workers = 4;
        config.output.disable_integral_light = true;
        config.save_to_file(&path).unwrap();

        let loaded = TeststandConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(
            &path,
            r#"{
                "workers": 2,
                "geometry": {
                    "layers": [{ "name": "Glass", "material": "PyrexGlass", "width_mm": 2.0 }]
                },
                "output": { "filename": "scan.dat" }
            }"#,
        )
        .unwrap();

        let config = TeststandConfig::load_from_file(&path).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.geometry.base_radius_mm, 127.0);
        assert_eq!(config.geometry.layers.len(), 1);
        assert!(!config.output.disable_photon_timestamps);
        assert_eq!(config.output_naming().unwrap().extension(), "dat");
    }

    #[test]
    fn test_pet_material_name() {
        let layer: LayerConfig =
            serde_json::from_str(r#"{ "name": "Capsule", "material": "PET", "width_mm": 0.3 }"#)
                .unwrap();
        assert_eq!(layer.material, MaterialKind::Pet);
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            TeststandConfig::load_from_file(dir.path().join("absent.json")),
            Err(ConfigurationError::ConfigUnreadable { .. })
        ));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ workers: ").unwrap();
        assert!(matches!(
            TeststandConfig::load_from_file(&path),
            Err(ConfigurationError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = TeststandConfig::default();
        config.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidWorkerCount(0))
        ));

        let mut config = TeststandConfig::default();
        config.output.filename = PathBuf::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::EmptyOutputName)
        ));
    }

    #[test]
    fn test_layer_width_override() {
        let mut config = TeststandConfig::default();
        config.set_layer_widths(&[1.0, 2.0, 0.5]).unwrap();
        let shells = config.geometry_builder().unwrap().derive_shells().unwrap();
        assert_eq!(shells.last().unwrap().r_outer()[0], 130.5);

        assert!(matches!(
            config.set_layer_widths(&[1.0]),
            Err(ConfigurationError::LayerCountMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_custom_profile() {
        let mut config = TeststandConfig::default();
        config.geometry.profile = Some(vec![
            ProfilePoint::new(0.0, 1.0),
            ProfilePoint::new(1.0, 0.0),
        ]);
        let shells = config.geometry_builder().unwrap().derive_shells().unwrap();
        assert_eq!(shells[0].z_planes().len(), 2);

        config.geometry.profile = Some(vec![ProfilePoint::new(0.0, 1.0)]);
        assert!(matches!(
            config.geometry_builder(),
            Err(ConfigurationError::InvalidProfile(_))
        ));
    }
}
