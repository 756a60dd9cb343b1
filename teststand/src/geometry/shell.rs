//! Nested shell geometry of the photomultiplier enclosure.
//!
//! The tube is modelled as a stack of solids of revolution sharing one
//! [`Profile`]. The innermost shell is the sensitive photocathode volume.
//! Every further layer (window glass, coupling oil, capsule, ...) wraps the
//! previous one and is thicker by its own width:
//!
//! ```text
//! cumulative_k = Σ width_j  for j ≤ k        (0 for the sensitive core)
//! height_k     = base_height + sign(base_height) · cumulative_k
//! z_k[i]       = height_k · height_fraction[i]
//! r_k[i]       = base_radius · radius_fraction[i] + cumulative_k   (i < N-1)
//! r_k[N-1]     = 0
//! ```
//!
//! Growing the height with the accumulated width keeps every shell a scaled
//! copy of the core rather than a shifted one. The closing point stays on the
//! axis for every shell so each solid is closed.
//!
//! After derivation each adjacent pair must satisfy `outer.r[i] > inner.r[i]`
//! at every non-closing point. A pair that touches anywhere else means two
//! coincident surfaces and is rejected rather than silently adjusted.

use log::{debug, info};

use super::enclosure::Enclosure;
use super::profile::Profile;
use crate::error::ConfigurationError;
use crate::optics::{CalibrationCurve, MaterialCatalog, MaterialKind, SensitiveSurface};
use crate::units::{Length, LengthExt};

/// Name of the sensitive photocathode shell
pub const SENSITIVE_SHELL_NAME: &str = "PMT";

/// One material layer wrapped around the shells beneath it
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub material: MaterialKind,
    pub width: Length,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>, material: MaterialKind, width: Length) -> Self {
        Self {
            name: name.into(),
            material,
            width,
        }
    }
}

/// Polycone description of one shell, in millimetres
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedShell {
    name: String,
    material: MaterialKind,
    sensitive: bool,
    /// Sum of all layer widths up to and including this shell
    cumulative_width_mm: f64,
    /// Signed axial length of the shell
    height_mm: f64,
    z_planes: Vec<f64>,
    r_inner: Vec<f64>,
    r_outer: Vec<f64>,
}

impl DerivedShell {
    fn derive(
        name: &str,
        material: MaterialKind,
        sensitive: bool,
        profile: &Profile,
        base_radius_mm: f64,
        base_height_mm: f64,
        cumulative_width_mm: f64,
    ) -> Self {
        let height_mm = base_height_mm + base_height_mm.signum() * cumulative_width_mm;
        let terminal = profile.terminal_index();

        let z_planes = profile
            .points()
            .iter()
            .map(|point| height_mm * point.height_fraction)
            .collect();

        let r_outer = profile
            .points()
            .iter()
            .enumerate()
            .map(|(i, point)| {
                if i == terminal {
                    0.0
                } else {
                    base_radius_mm * point.radius_fraction + cumulative_width_mm
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            material,
            sensitive,
            cumulative_width_mm,
            height_mm,
            z_planes,
            r_inner: vec![0.0; profile.len()],
            r_outer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical volume name reported by the transport engine for this shell.
    pub fn volume_name(&self) -> String {
        format!("{}_phys", self.name)
    }

    pub fn material(&self) -> MaterialKind {
        self.material
    }

    /// Whether this is the photocathode shell carrying the calibration.
    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    pub fn cumulative_width_mm(&self) -> f64 {
        self.cumulative_width_mm
    }

    pub fn height_mm(&self) -> f64 {
        self.height_mm
    }

    pub fn z_planes(&self) -> &[f64] {
        &self.z_planes
    }

    pub fn r_inner(&self) -> &[f64] {
        &self.r_inner
    }

    pub fn r_outer(&self) -> &[f64] {
        &self.r_outer
    }

    /// Largest outer radius of the shell.
    pub fn max_radius_mm(&self) -> f64 {
        self.r_outer.iter().copied().fold(0.0, f64::max)
    }
}

/// Derives the shell stack from a base profile and an ordered layer list
#[derive(Debug, Clone)]
pub struct ShellGeometryBuilder {
    profile: Profile,
    base_radius: Length,
    base_height: Length,
    core_material: MaterialKind,
    layers: Vec<LayerSpec>,
}

impl ShellGeometryBuilder {
    /// Start from the sensitive core. A negative height points the tube
    /// along −z.
    pub fn new(base_radius: Length, base_height: Length) -> Self {
        Self {
            profile: Profile::hemispherical(),
            base_radius,
            base_height,
            core_material: MaterialKind::Vacuum,
            layers: Vec::new(),
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_core_material(mut self, material: MaterialKind) -> Self {
        self.core_material = material;
        self
    }

    /// Append a layer outside every layer added so far.
    pub fn layer(mut self, layer: LayerSpec) -> Self {
        self.layers.push(layer);
        self
    }

    /// Append several layers, innermost first.
    pub fn layers<I: IntoIterator<Item = LayerSpec>>(mut self, layers: I) -> Self {
        self.layers.extend(layers);
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn base_radius(&self) -> Length {
        self.base_radius
    }

    /// Derive every shell, sensitive core first, then each layer outward.
    pub fn derive_shells(&self) -> Result<Vec<DerivedShell>, ConfigurationError> {
        let base_radius_mm = self.base_radius.as_millimeters();
        let base_height_mm = self.base_height.as_millimeters();

        if !(base_radius_mm > 0.0) || !base_radius_mm.is_finite() {
            return Err(ConfigurationError::InvalidBaseDimension {
                dimension: "radius",
                value_mm: base_radius_mm,
            });
        }
        if base_height_mm == 0.0 || !base_height_mm.is_finite() {
            return Err(ConfigurationError::InvalidBaseDimension {
                dimension: "height",
                value_mm: base_height_mm,
            });
        }

        for layer in &self.layers {
            let width_mm = layer.width.as_millimeters();
            if !(width_mm >= 0.0) || !width_mm.is_finite() {
                return Err(ConfigurationError::InvalidLayerWidth {
                    layer: layer.name.clone(),
                    width_mm,
                });
            }
        }

        let mut shells = Vec::with_capacity(self.layers.len() + 1);
        shells.push(DerivedShell::derive(
            SENSITIVE_SHELL_NAME,
            self.core_material,
            true,
            &self.profile,
            base_radius_mm,
            base_height_mm,
            0.0,
        ));

        let mut cumulative_width_mm = 0.0;
        for layer in &self.layers {
            cumulative_width_mm += layer.width.as_millimeters();
            shells.push(DerivedShell::derive(
                &layer.name,
                layer.material,
                false,
                &self.profile,
                base_radius_mm,
                base_height_mm,
                cumulative_width_mm,
            ));
        }

        check_nesting(&shells, self.profile.terminal_index())?;

        for shell in &shells {
            debug!(
                "Shell {} ({}): height {:.3} mm, apex radius {:.3} mm",
                shell.name, shell.material, shell.height_mm, shell.r_outer[0]
            );
        }

        Ok(shells)
    }

    /// Derive the shells, bind the calibration to the sensitive core and
    /// place the stack in the dark box.
    pub fn build(
        &self,
        catalog: MaterialCatalog,
        calibration: CalibrationCurve,
    ) -> Result<DetectorGeometry, ConfigurationError> {
        let shells = self.derive_shells()?;

        for shell in shells.iter().filter(|shell| !shell.is_sensitive()) {
            if !catalog.require(shell.material)?.is_transparent() {
                return Err(ConfigurationError::OpaqueLayer {
                    layer: shell.name.clone(),
                    material: shell.material.to_string(),
                });
            }
        }

        let enclosure = Enclosure::dark_box(self.base_radius);
        // Shells are non-empty: the core is always present
        let outermost = &shells[shells.len() - 1];
        enclosure.check_fits(outermost.max_radius_mm(), outermost.height_mm())?;

        let surface = SensitiveSurface::new(shells[0].volume_name(), calibration)?;

        info!(
            "Built {} shells, outermost {} reaches {:.3} mm radius; hits expected on {}",
            shells.len(),
            outermost.name(),
            outermost.max_radius_mm(),
            surface.volume
        );

        Ok(DetectorGeometry {
            shells,
            surface,
            enclosure,
            catalog,
        })
    }
}

fn check_nesting(shells: &[DerivedShell], terminal: usize) -> Result<(), ConfigurationError> {
    for pair in shells.windows(2) {
        let (inner, outer) = (&pair[0], &pair[1]);
        for index in 0..terminal {
            if !(outer.r_outer[index] > inner.r_outer[index]) {
                return Err(ConfigurationError::DegenerateShell {
                    inner: inner.name.clone(),
                    outer: outer.name.clone(),
                    index,
                    inner_mm: inner.r_outer[index],
                    outer_mm: outer.r_outer[index],
                });
            }
        }
        if !(outer.height_mm.abs() > inner.height_mm.abs()) {
            return Err(ConfigurationError::DegenerateShell {
                inner: inner.name.clone(),
                outer: outer.name.clone(),
                index: terminal,
                inner_mm: inner.height_mm,
                outer_mm: outer.height_mm,
            });
        }
    }
    Ok(())
}

/// Immutable detector description shared by every run worker
#[derive(Debug, Clone)]
pub struct DetectorGeometry {
    shells: Vec<DerivedShell>,
    surface: SensitiveSurface,
    enclosure: Enclosure,
    catalog: MaterialCatalog,
}

impl DetectorGeometry {
    /// Shells ordered from the sensitive core outward.
    pub fn shells(&self) -> &[DerivedShell] {
        &self.shells
    }

    pub fn sensitive_shell(&self) -> &DerivedShell {
        &self.shells[0]
    }

    pub fn outermost_shell(&self) -> &DerivedShell {
        &self.shells[self.shells.len() - 1]
    }

    /// Maximum radius and signed axial length of the outermost shell.
    pub fn outer_extent_mm(&self) -> (f64, f64) {
        let outermost = self.outermost_shell();
        (outermost.max_radius_mm(), outermost.height_mm())
    }

    /// Location every accepted hit must report.
    pub fn sensitive_volume(&self) -> &str {
        &self.surface.volume
    }

    pub fn surface(&self) -> &SensitiveSurface {
        &self.surface
    }

    pub fn calibration(&self) -> &CalibrationCurve {
        self.surface.calibration()
    }

    pub fn enclosure(&self) -> &Enclosure {
        &self.enclosure
    }

    pub fn catalog(&self) -> &MaterialCatalog {
        &self.catalog
    }
}
