//! Dark box world volume and the steel back plate the tube rests on.

use crate::error::ConfigurationError;
use crate::optics::MaterialKind;
use crate::units::{Length, LengthExt};

/// Axis-aligned world box, stored as half extents
#[derive(Debug, Clone, PartialEq)]
pub struct WorldBox {
    pub half_x_mm: f64,
    pub half_y_mm: f64,
    pub half_z_mm: f64,
    pub material: MaterialKind,
}

/// Disc behind the photocathode, placed in the world next to the shell stack
#[derive(Debug, Clone, PartialEq)]
pub struct BackPlate {
    pub radius_mm: f64,
    pub half_thickness_mm: f64,
    /// Centre of the disc along the tube axis
    pub z_center_mm: f64,
    pub material: MaterialKind,
}

/// Everything placed around the shell stack
#[derive(Debug, Clone, PartialEq)]
pub struct Enclosure {
    pub world: WorldBox,
    pub back_plate: BackPlate,
}

impl Enclosure {
    /// The 38 × 42 × 100 cm dark box with a back plate sized to the tube.
    pub fn dark_box(base_radius: Length) -> Self {
        let half_thickness_mm = Length::from_centimeters(0.5).as_millimeters();
        Self {
            world: WorldBox {
                half_x_mm: Length::from_meters(0.19).as_millimeters(),
                half_y_mm: Length::from_meters(0.21).as_millimeters(),
                half_z_mm: Length::from_meters(0.5).as_millimeters(),
                material: MaterialKind::Air,
            },
            back_plate: BackPlate {
                radius_mm: 1.2 * base_radius.as_millimeters(),
                half_thickness_mm,
                z_center_mm: half_thickness_mm,
                material: MaterialKind::StainlessSteel,
            },
        }
    }

    /// Check that a solid of revolution with the given maximum radius and
    /// axial extent, and the back plate, sit inside the world box.
    pub fn check_fits(&self, radius_mm: f64, height_mm: f64) -> Result<(), ConfigurationError> {
        let transverse_limit = self.world.half_x_mm.min(self.world.half_y_mm);
        let plate_far_face = self.back_plate.z_center_mm.abs() + self.back_plate.half_thickness_mm;

        let checks = [
            ("transverse", radius_mm, transverse_limit),
            ("transverse", self.back_plate.radius_mm, transverse_limit),
            ("axial", height_mm.abs(), self.world.half_z_mm),
            ("axial", plate_far_face, self.world.half_z_mm),
        ];

        for (axis, extent_mm, limit_mm) in checks {
            if extent_mm > limit_mm {
                return Err(ConfigurationError::EnclosureTooSmall {
                    axis,
                    extent_mm,
                    limit_mm,
                });
            }
        }

        Ok(())
    }
}
