//! Type-safe physical units for the test stand
//!
//! Strongly-typed quantities from the `uom` crate are used at every API
//! boundary where a unit mix-up would silently corrupt geometry or output:
//! layer widths, photon wavelengths and energies, and hit times. Internal
//! geometry arrays stay in plain millimetres once a value has crossed in.

use uom::si::energy::electronvolt;
use uom::si::length::{centimeter, meter, millimeter, nanometer};
use uom::si::time::nanosecond;

/// Type alias for length measurements with convenient methods
pub type Length = uom::si::f64::Length;

/// Type alias for photon energies
pub type Energy = uom::si::f64::Energy;

/// Type alias for hit timestamps
pub type Time = uom::si::f64::Time;

/// h·c expressed in eV·nm, used for photon wavelength/energy conversion
pub const HC_EV_NM: f64 = 1239.841939;

/// Extension trait for length conversions used by geometry and optics
pub trait LengthExt {
    /// Create length from nanometers (wavelengths)
    fn from_nanometers(nm: f64) -> Self;

    /// Get length in nanometers
    fn as_nanometers(&self) -> f64;

    /// Create length from millimeters
    fn from_millimeters(mm: f64) -> Self;

    /// Get length in millimeters
    fn as_millimeters(&self) -> f64;

    /// Create length from centimeters
    fn from_centimeters(cm: f64) -> Self;

    /// Get length in centimeters
    fn as_centimeters(&self) -> f64;

    /// Create length from meters
    fn from_meters(m: f64) -> Self;

    /// Get length in meters
    fn as_meters(&self) -> f64;
}

/// Extension trait for photon energies
pub trait EnergyExt {
    /// Create energy from electronvolts
    fn from_electronvolts(ev: f64) -> Self;

    /// Get energy in electronvolts
    fn as_electronvolts(&self) -> f64;
}

/// Extension trait for hit timestamps
pub trait TimeExt {
    /// Create time from nanoseconds
    fn from_nanoseconds(ns: f64) -> Self;

    /// Get time in nanoseconds
    fn as_nanoseconds(&self) -> f64;
}

impl LengthExt for Length {
    fn from_nanometers(nm: f64) -> Self {
        Length::new::<nanometer>(nm)
    }

    fn as_nanometers(&self) -> f64 {
        self.get::<nanometer>()
    }

    fn from_millimeters(mm: f64) -> Self {
        Length::new::<millimeter>(mm)
    }

    fn as_millimeters(&self) -> f64 {
        self.get::<millimeter>()
    }

    fn from_centimeters(cm: f64) -> Self {
        Length::new::<centimeter>(cm)
    }

    fn as_centimeters(&self) -> f64 {
        self.get::<centimeter>()
    }

    fn from_meters(m: f64) -> Self {
        Length::new::<meter>(m)
    }

    fn as_meters(&self) -> f64 {
        self.get::<meter>()
    }
}

impl EnergyExt for Energy {
    fn from_electronvolts(ev: f64) -> Self {
        Energy::new::<electronvolt>(ev)
    }

    fn as_electronvolts(&self) -> f64 {
        self.get::<electronvolt>()
    }
}

impl TimeExt for Time {
    fn from_nanoseconds(ns: f64) -> Self {
        Time::new::<nanosecond>(ns)
    }

    fn as_nanoseconds(&self) -> f64 {
        self.get::<nanosecond>()
    }
}

/// Photon energy for a vacuum wavelength, E = hc/λ.
pub fn photon_energy(wavelength: Length) -> Energy {
    Energy::from_electronvolts(HC_EV_NM / wavelength.as_nanometers())
}

/// Photon wavelength for an energy, λ = hc/E.
pub fn photon_wavelength(energy: Energy) -> Length {
    Length::from_nanometers(HC_EV_NM / energy.as_electronvolts())
}
