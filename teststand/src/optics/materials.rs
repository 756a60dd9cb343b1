//! Optical material catalog for the photomultiplier enclosure.
//!
//! Each shell of the enclosure is filled with one of these materials. Only
//! the properties the host transport engine needs at optical energies are
//! carried: refractive index and bulk absorption length, both over photon
//! energy. Materials without a refractive index are opaque to optical
//! photons and may not sit between the sensitive surface and the outside.
//!
//! The tabulated optical range spans 100-600 nm. Values are flat where the
//! literature gives a single figure.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::calibration::EnergyCurve;
use crate::error::ConfigurationError;
use crate::units::{Energy, Length, LengthExt};

/// Lower and upper edge of the tabulated optical range in nanometers
const OPTICAL_RANGE_NM: (f64, f64) = (600.0, 100.0);

/// Glass-like absorption: transparent down to ~350 nm, opaque below 280 nm.
const GLASS_ABSORPTION_MM: [(f64, f64); 4] =
    [(600.0, 100.0), (350.0, 100.0), (280.0, 0.1), (100.0, 0.1)];

/// Materials used by the test stand geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    /// Borosilicate PMT window glass
    PyrexGlass,
    /// Optical coupling oil between window and capsule
    MineralOil,
    /// Polyethylene terephthalate capsule
    #[serde(rename = "PET")]
    Pet,
    /// Dark box fill
    Air,
    /// Sensitive core fill; the surface, not the bulk, decides detection
    Vacuum,
    /// Back plate
    StainlessSteel,
}

impl MaterialKind {
    /// Canonical material name.
    pub fn name(&self) -> &'static str {
        match self {
            MaterialKind::PyrexGlass => "PyrexGlass",
            MaterialKind::MineralOil => "MineralOil",
            MaterialKind::Pet => "PET",
            MaterialKind::Air => "Air",
            MaterialKind::Vacuum => "Vacuum",
            MaterialKind::StainlessSteel => "StainlessSteel",
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bulk and optical properties of one material
#[derive(Debug, Clone)]
pub struct OpticalMaterial {
    pub kind: MaterialKind,
    /// Density in g/cm³
    pub density_g_cm3: f64,
    /// Elemental composition as (symbol, atoms per formula unit), empty for
    /// materials taken whole from a reference database
    pub composition: Vec<(&'static str, u32)>,
    /// Refractive index over photon energy; `None` means opaque
    refractive_index: Option<EnergyCurve>,
    /// Absorption length in millimeters over photon energy; `None` means no bulk absorption
    absorption_length_mm: Option<EnergyCurve>,
}

impl OpticalMaterial {
    fn new(kind: MaterialKind, density_g_cm3: f64) -> Self {
        Self {
            kind,
            density_g_cm3,
            composition: Vec::new(),
            refractive_index: None,
            absorption_length_mm: None,
        }
    }

    fn with_composition(mut self, composition: &[(&'static str, u32)]) -> Self {
        self.composition = composition.to_vec();
        self
    }

    fn with_flat_index(mut self, index: f64) -> Result<Self, ConfigurationError> {
        let name = format!("{} RINDEX", self.kind);
        self.refractive_index = Some(EnergyCurve::from_wavelengths(
            &name,
            &[(OPTICAL_RANGE_NM.0, index), (OPTICAL_RANGE_NM.1, index)],
        )?);
        Ok(self)
    }

    fn with_absorption(mut self, table_mm: &[(f64, f64)]) -> Result<Self, ConfigurationError> {
        let name = format!("{} ABSLENGTH", self.kind);
        self.absorption_length_mm = Some(EnergyCurve::from_wavelengths(&name, table_mm)?);
        Ok(self)
    }

    /// Refractive index at a photon energy, `None` for opaque materials.
    pub fn refractive_index_at(&self, energy: Energy) -> Option<f64> {
        self.refractive_index
            .as_ref()
            .map(|curve| curve.value_at(energy))
    }

    /// Bulk absorption length at a photon energy, `None` when not absorbing.
    pub fn absorption_length_at(&self, energy: Energy) -> Option<Length> {
        self.absorption_length_mm
            .as_ref()
            .map(|curve| Length::from_millimeters(curve.value_at(energy)))
    }

    /// Whether optical photons can propagate through the material.
    pub fn is_transparent(&self) -> bool {
        self.refractive_index.is_some()
    }
}

/// Lookup table of every material the geometry may reference
#[derive(Debug, Clone)]
pub struct MaterialCatalog {
    materials: HashMap<MaterialKind, OpticalMaterial>,
}

impl MaterialCatalog {
    /// The standard test stand catalog.
    pub fn standard() -> Result<Self, ConfigurationError> {
        let materials = vec![
            // NIST Pyrex: 4% B, 53% O, 2.8% Na, 1.1% Al, 37.7% Si, 0.3% K
            OpticalMaterial::new(MaterialKind::PyrexGlass, 2.23)
                .with_flat_index(1.474)?
                .with_absorption(&GLASS_ABSORPTION_MM)?,
            OpticalMaterial::new(MaterialKind::MineralOil, 0.838)
                .with_composition(&[("C", 1), ("H", 2)])
                .with_flat_index(1.467)?
                .with_absorption(&GLASS_ABSORPTION_MM)?,
            OpticalMaterial::new(MaterialKind::Pet, 1.38)
                .with_composition(&[("C", 10), ("H", 8), ("O", 4)])
                .with_flat_index(1.575)?
                .with_absorption(&GLASS_ABSORPTION_MM)?,
            OpticalMaterial::new(MaterialKind::Air, 0.001_204_79).with_flat_index(1.0)?,
            OpticalMaterial::new(MaterialKind::Vacuum, 1e-25),
            OpticalMaterial::new(MaterialKind::StainlessSteel, 8.0),
        ];

        Ok(Self {
            materials: materials
                .into_iter()
                .map(|material| (material.kind, material))
                .collect(),
        })
    }

    /// Material properties for a kind.
    pub fn get(&self, kind: MaterialKind) -> Option<&OpticalMaterial> {
        self.materials.get(&kind)
    }

    /// Material properties for a kind that the catalog must contain.
    pub fn require(&self, kind: MaterialKind) -> Result<&OpticalMaterial, ConfigurationError> {
        self.get(kind)
            .ok_or_else(|| ConfigurationError::UnknownMaterial(kind.to_string()))
    }
}
